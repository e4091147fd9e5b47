use std::fmt;
use tantivy::tokenizer::{LowerCaser, RemoveLongFilter, SimpleTokenizer, TextAnalyzer, TokenStream};

/// Tokens of this many bytes or more are dropped; they are almost always
/// base64 blobs or hashes rather than words.
pub const MAX_TOKEN_LEN: usize = 40;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzedToken {
	pub term: String,
	pub position: u32,
}

/// Splits text on non-alphanumeric characters and lower-cases the pieces.
///
/// The same analyzer must be used for indexing and for query parsing, otherwise
/// query terms will not line up with the postings.
#[derive(Clone)]
pub struct Analyzer {
	inner: TextAnalyzer,
}

impl Analyzer {
	pub fn standard() -> Self {
		let inner = TextAnalyzer::builder(SimpleTokenizer::default())
			.filter(RemoveLongFilter::limit(MAX_TOKEN_LEN))
			.filter(LowerCaser)
			.build();
		Self { inner }
	}

	pub fn analyze(&self, text: &str) -> Vec<AnalyzedToken> {
		// token_stream needs &mut; clones are cheap and keep Analyzer shareable
		let mut analyzer = self.inner.clone();
		let mut stream = analyzer.token_stream(text);
		let mut tokens = Vec::new();
		while stream.advance() {
			let token = stream.token();
			tokens.push(AnalyzedToken { term: token.text.clone(), position: token.position as u32 });
		}
		tokens
	}

	pub fn terms(&self, text: &str) -> Vec<String> {
		self.analyze(text).into_iter().map(|t| t.term).collect()
	}
}

impl Default for Analyzer {
	fn default() -> Self { Self::standard() }
}

impl fmt::Debug for Analyzer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str("Analyzer(simple+remove_long+lowercase)")
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lowercases_and_splits_on_punctuation() {
		let analyzer = Analyzer::standard();
		assert_eq!(analyzer.terms("Is Lucinity is not a library?"), vec!["is", "lucinity", "is", "not", "a", "library"]);
		assert_eq!(analyzer.terms("BM25Similarity, e-mail"), vec!["bm25similarity", "e", "mail"]);
	}

	#[test]
	fn positions_are_sequential() {
		let tokens = Analyzer::standard().analyze("search  the library");
		let positions: Vec<u32> = tokens.iter().map(|t| t.position).collect();
		assert_eq!(positions, vec![0, 1, 2]);
	}

	#[test]
	fn same_input_same_tokens() {
		let analyzer = Analyzer::standard();
		let text = "Grüße aus KÖLN, 2024!";
		assert_eq!(analyzer.terms(text), analyzer.terms(text));
		assert_eq!(analyzer.terms(text), vec!["grüße", "aus", "köln", "2024"]);
	}

	#[test]
	fn overlong_tokens_are_dropped() {
		let long = "x".repeat(MAX_TOKEN_LEN + 1);
		assert_eq!(Analyzer::standard().terms(&format!("keep {long} this")), vec!["keep", "this"]);
	}

	#[test]
	fn whitespace_only_yields_nothing() {
		assert!(Analyzer::standard().analyze(" \t\n").is_empty());
	}
}
