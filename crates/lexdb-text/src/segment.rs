//! Immutable in-memory segments.
//!
//! A segment owns a contiguous, ascending range of doc ids together with the
//! postings of their content field. Segments are never modified after
//! `SegmentBuilder::build`; merging produces a new segment.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

use lexdb_core::{DocId, FieldValue, Metadata, TOKEN_COUNT_FIELD};

use crate::analysis::AnalyzedToken;

/// Everything persisted for one document, as written to the document log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredDocument {
	pub doc_id: DocId,
	pub content: String,
	pub token_count: i32,
	pub metadata: Metadata,
}

impl StoredDocument {
	/// All stored fields except `content`, with `token-count` included.
	pub fn stored_metadata(&self) -> Metadata {
		let mut metadata = self.metadata.clone();
		metadata.insert(TOKEN_COUNT_FIELD.to_string(), FieldValue::Int(self.token_count));
		metadata
	}
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Posting {
	pub doc_id: DocId,
	pub positions: Vec<u32>,
}

impl Posting {
	pub fn term_freq(&self) -> u32 { self.positions.len() as u32 }
}

#[derive(Debug, Clone)]
struct DocEntry {
	stored: Arc<StoredDocument>,
	field_len: u32,
}

#[derive(Debug, Default)]
pub struct Segment {
	postings: HashMap<String, Vec<Posting>>,
	docs: Vec<DocEntry>,
	total_field_len: u64,
}

impl Segment {
	pub fn num_docs(&self) -> usize { self.docs.len() }

	pub fn total_field_len(&self) -> u64 { self.total_field_len }

	pub fn first_doc_id(&self) -> Option<DocId> { self.docs.first().map(|d| d.stored.doc_id) }

	pub fn postings(&self, term: &str) -> &[Posting] {
		self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
	}

	pub fn doc_freq(&self, term: &str) -> u64 { self.postings(term).len() as u64 }

	fn entry(&self, doc_id: DocId) -> Option<&DocEntry> {
		self.docs.binary_search_by_key(&doc_id, |d| d.stored.doc_id).ok().map(|i| &self.docs[i])
	}

	pub fn document(&self, doc_id: DocId) -> Option<&StoredDocument> {
		self.entry(doc_id).map(|e| e.stored.as_ref())
	}

	pub fn field_len(&self, doc_id: DocId) -> Option<u32> { self.entry(doc_id).map(|e| e.field_len) }

	pub fn doc_ids(&self) -> impl Iterator<Item = DocId> + '_ { self.docs.iter().map(|d| d.stored.doc_id) }

	/// Concatenates segments that are already in ascending doc id order.
	pub fn merge(segments: &[Arc<Segment>]) -> Segment {
		let mut merged = Segment::default();
		for segment in segments {
			for (term, postings) in &segment.postings {
				merged.postings.entry(term.clone()).or_default().extend(postings.iter().cloned());
			}
			merged.docs.extend(segment.docs.iter().cloned());
			merged.total_field_len += segment.total_field_len;
		}
		merged
	}
}

#[derive(Debug, Default)]
pub struct SegmentBuilder {
	segment: Segment,
}

impl SegmentBuilder {
	pub fn new() -> Self { Self::default() }

	pub fn is_empty(&self) -> bool { self.segment.docs.is_empty() }

	pub fn last_doc_id(&self) -> Option<DocId> { self.segment.docs.last().map(|d| d.stored.doc_id) }

	/// Doc ids must be added in ascending order.
	pub fn add(&mut self, stored: StoredDocument, tokens: &[AnalyzedToken]) {
		debug_assert!(self.last_doc_id().map_or(true, |last| last < stored.doc_id));
		let doc_id = stored.doc_id;
		let mut by_term: HashMap<&str, Vec<u32>> = HashMap::new();
		for token in tokens {
			by_term.entry(token.term.as_str()).or_default().push(token.position);
		}
		for (term, positions) in by_term {
			self.segment.postings.entry(term.to_string()).or_default().push(Posting { doc_id, positions });
		}
		let field_len = tokens.len() as u32;
		self.segment.total_field_len += u64::from(field_len);
		self.segment.docs.push(DocEntry { stored: Arc::new(stored), field_len });
	}

	pub fn build(self) -> Segment { self.segment }
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::analysis::Analyzer;

	fn stored(doc_id: DocId, content: &str) -> StoredDocument {
		StoredDocument { doc_id, content: content.to_string(), token_count: 1, metadata: Metadata::new() }
	}

	fn segment_of(docs: &[(DocId, &str)]) -> Segment {
		let analyzer = Analyzer::standard();
		let mut builder = SegmentBuilder::new();
		for (id, text) in docs {
			builder.add(stored(*id, text), &analyzer.analyze(text));
		}
		builder.build()
	}

	#[test]
	fn postings_record_positions_and_lengths() {
		let segment = segment_of(&[(0, "to be or not to be"), (1, "be quick")]);
		assert_eq!(segment.num_docs(), 2);
		assert_eq!(segment.total_field_len(), 8);
		assert_eq!(segment.postings("be").len(), 2);
		assert_eq!(segment.postings("be")[0], Posting { doc_id: 0, positions: vec![1, 5] });
		assert_eq!(segment.postings("be")[1].term_freq(), 1);
		assert_eq!(segment.field_len(1), Some(2));
		assert!(segment.postings("missing").is_empty());
	}

	#[test]
	fn merge_keeps_doc_order_and_postings() {
		let a = Arc::new(segment_of(&[(0, "alpha beta")]));
		let b = Arc::new(segment_of(&[(1, "beta gamma"), (2, "beta")]));
		let merged = Segment::merge(&[a, b]);
		assert_eq!(merged.doc_ids().collect::<Vec<_>>(), vec![0, 1, 2]);
		let ids: Vec<DocId> = merged.postings("beta").iter().map(|p| p.doc_id).collect();
		assert_eq!(ids, vec![0, 1, 2]);
		assert_eq!(merged.document(1).map(|d| d.content.as_str()), Some("beta gamma"));
		assert_eq!(merged.total_field_len(), 5);
	}

	#[test]
	fn stored_metadata_includes_token_count() {
		let doc = StoredDocument { doc_id: 0, content: "x".into(), token_count: 7, metadata: Metadata::new() };
		assert_eq!(doc.stored_metadata()[TOKEN_COUNT_FIELD], FieldValue::Int(7));
		assert!(!doc.stored_metadata().contains_key("content"));
	}
}
