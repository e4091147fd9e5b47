//! Query model and the query-string parser.
//!
//! The parser accepts a subset of the classic Lucene syntax:
//!
//! - `word` adds an optional (SHOULD) clause; several bare words are OR-ed
//! - `+word` / `-word` / `!word` / `NOT word` make a clause required or prohibited
//! - `a AND b` (or `&&`) makes both neighbours required; `OR` / `||` is the default
//! - `"a phrase"` matches consecutive terms; a trailing `~N` slop is ignored
//! - `field:word` targets `field`; only the content field has postings
//! - `( ... )` groups clauses, `^2.5` boosts the preceding clause
//!
//! Text inside a clause runs through the same [`Analyzer`] used at index time.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;

use lexdb_core::{ParseError, CONTENT_FIELD};

use crate::analysis::Analyzer;

#[derive(Parser)]
#[grammar = "query.pest"]
struct QueryGrammar;

#[derive(Debug, Clone, PartialEq)]
pub enum Query {
	Term { field: String, term: String },
	/// Terms with their position relative to the first term of the phrase.
	Phrase { field: String, terms: Vec<(u32, String)> },
	Boolean { must: Vec<Query>, should: Vec<Query>, must_not: Vec<Query> },
	/// Every document, with a constant score of 1.
	MatchAll,
	Boosted { query: Box<Query>, boost: f32 },
	/// Matches nothing.
	Empty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occur {
	Must,
	Should,
	MustNot,
}

impl Query {
	pub fn term(field: impl Into<String>, term: impl Into<String>) -> Self {
		Query::Term { field: field.into(), term: term.into() }
	}

	/// OR of the given clauses.
	pub fn any_of(queries: Vec<Query>) -> Self {
		Query::Boolean { must: Vec::new(), should: queries, must_not: Vec::new() }
	}

	/// Matches the same documents as `self`, plus every other document at the
	/// constant match-all score.
	pub fn or_match_all(self) -> Self { Query::any_of(vec![self, Query::MatchAll]) }

	pub fn boosted(self, boost: f32) -> Self {
		if boost == 1.0 {
			self
		} else {
			Query::Boosted { query: Box::new(self), boost }
		}
	}

	/// Collapses a clause list: nothing is `Empty`, a lone positive clause is
	/// returned as is, anything else becomes a `Boolean`.
	pub fn from_clauses(mut clauses: Vec<(Occur, Query)>) -> Self {
		if clauses.is_empty() {
			return Query::Empty;
		}
		if clauses.len() == 1 && clauses[0].0 != Occur::MustNot {
			return clauses.swap_remove(0).1;
		}
		let mut must = Vec::new();
		let mut should = Vec::new();
		let mut must_not = Vec::new();
		for (occur, query) in clauses {
			match occur {
				Occur::Must => must.push(query),
				Occur::Should => should.push(query),
				Occur::MustNot => must_not.push(query),
			}
		}
		Query::Boolean { must, should, must_not }
	}
}

/// A parsed query together with the field bare terms were resolved against.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedQuery {
	pub field: String,
	pub query: Query,
}

impl ParsedQuery {
	pub fn into_query(self) -> Query { self.query }
}

#[derive(Debug, Clone)]
pub struct QueryParser {
	field: String,
	analyzer: Analyzer,
}

impl QueryParser {
	pub fn new(field: impl Into<String>, analyzer: Analyzer) -> Self { Self { field: field.into(), analyzer } }

	pub fn for_content(analyzer: Analyzer) -> Self { Self::new(CONTENT_FIELD, analyzer) }

	pub fn field(&self) -> &str { &self.field }

	pub fn parse(&self, text: &str) -> Result<ParsedQuery, ParseError> {
		if text.trim().is_empty() {
			return Err(ParseError::Empty);
		}
		let mut pairs = QueryGrammar::parse(Rule::query, text).map_err(|e| ParseError::Syntax(e.to_string()))?;
		let query = match pairs.next() {
			Some(root) => self.build_elements(root.into_inner(), &self.field)?,
			None => Query::Empty,
		};
		Ok(ParsedQuery { field: self.field.clone(), query })
	}

	fn build_elements(&self, pairs: Pairs<'_, Rule>, field: &str) -> Result<Query, ParseError> {
		let mut clauses: Vec<(Occur, Query)> = Vec::new();
		let mut and_pending = false;
		let mut not_pending = false;

		for pair in pairs {
			match pair.as_rule() {
				Rule::conjunction => {
					and_pending = matches!(pair.as_str(), "AND" | "&&");
				}
				Rule::not_keyword => not_pending = true,
				Rule::clause => {
					let (modifier, query) = self.build_clause(pair, field)?;
					if and_pending {
						if let Some(previous) = clauses.last_mut() {
							if previous.0 == Occur::Should {
								previous.0 = Occur::Must;
							}
						}
					}
					let occur = match modifier {
						Some(Occur::MustNot) => Occur::MustNot,
						_ if not_pending => Occur::MustNot,
						Some(Occur::Must) => Occur::Must,
						_ if and_pending => Occur::Must,
						_ => Occur::Should,
					};
					and_pending = false;
					not_pending = false;
					if let Some(query) = query {
						clauses.push((occur, query));
					}
				}
				_ => {}
			}
		}
		Ok(Query::from_clauses(clauses))
	}

	fn build_clause(&self, pair: Pair<'_, Rule>, default_field: &str) -> Result<(Option<Occur>, Option<Query>), ParseError> {
		let mut modifier = None;
		let mut field = default_field.to_string();
		let mut query = None;
		let mut boost = 1.0f32;

		for inner in pair.into_inner() {
			match inner.as_rule() {
				Rule::modifier => {
					modifier = Some(if inner.as_str() == "+" { Occur::Must } else { Occur::MustNot });
				}
				Rule::field_prefix => {
					if let Some(name) = inner.into_inner().find(|p| p.as_rule() == Rule::field_name) {
						field = name.as_str().to_string();
					}
				}
				Rule::term => query = self.term_query(&field, &unescape(inner.as_str())),
				Rule::phrase => {
					let text = inner.into_inner().find(|p| p.as_rule() == Rule::phrase_text).map(|p| unescape(p.as_str()));
					query = self.phrase_query(&field, text.as_deref().unwrap_or(""));
				}
				Rule::group => {
					query = match self.build_elements(inner.into_inner(), &field)? {
						Query::Empty => None,
						q => Some(q),
					};
				}
				Rule::boost => {
					let value = inner.into_inner().find(|p| p.as_rule() == Rule::boost_value).map_or("", |p| p.as_str());
					boost = value.parse::<f32>().map_err(|e| ParseError::Syntax(format!("invalid boost '{value}': {e}")))?;
				}
				_ => {}
			}
		}
		Ok((modifier, query.map(|q| q.boosted(boost))))
	}

	fn term_query(&self, field: &str, text: &str) -> Option<Query> {
		let mut terms: Vec<Query> = self.analyzer.terms(text).into_iter().map(|t| Query::term(field, t)).collect();
		match terms.len() {
			0 => None,
			1 => terms.pop(),
			_ => Some(Query::any_of(terms)),
		}
	}

	fn phrase_query(&self, field: &str, text: &str) -> Option<Query> {
		let tokens = self.analyzer.analyze(text);
		let first = tokens.first()?.position;
		if tokens.len() == 1 {
			return Some(Query::term(field, tokens[0].term.clone()));
		}
		let terms = tokens.into_iter().map(|t| (t.position - first, t.term)).collect();
		Some(Query::Phrase { field: field.to_string(), terms })
	}
}

fn unescape(raw: &str) -> String {
	let mut out = String::with_capacity(raw.len());
	let mut chars = raw.chars();
	while let Some(c) = chars.next() {
		if c == '\\' {
			if let Some(escaped) = chars.next() {
				out.push(escaped);
				continue;
			}
		}
		out.push(c);
	}
	out
}
