use std::cmp::Ordering;
use std::collections::{BTreeMap, BinaryHeap, HashMap};

use lexdb_core::{DocId, CONTENT_FIELD};

use crate::query::Query;
use crate::scorer::{Bm25, CorpusStats};
use crate::store::Snapshot;

/// Constant score contributed by [`Query::MatchAll`].
pub const MATCH_ALL_SCORE: f32 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredHit {
	pub doc_id: DocId,
	pub score: f32,
	/// 0-based position in the result list.
	pub rank: usize,
}

type Scores = BTreeMap<DocId, f32>;

impl Snapshot {
	/// The `limit` best matches of `query`, best first. Equal scores are ordered
	/// by ascending doc id.
	pub fn search(&self, query: &Query, limit: usize) -> Vec<ScoredHit> {
		if limit == 0 || self.num_docs() == 0 {
			return Vec::new();
		}
		let scorer = Bm25::new(CorpusStats::of(self));
		let scores = Evaluator { snapshot: self, scorer }.eval(query);
		let hits = top_k(scores, limit);
		tracing::debug!(matches = hits.len(), limit, version = self.version(), "search complete");
		hits
	}
}

struct Evaluator<'a> {
	snapshot: &'a Snapshot,
	scorer: Bm25,
}

impl Evaluator<'_> {
	fn eval(&self, query: &Query) -> Scores {
		match query {
			Query::Term { field, term } => self.term(field, term),
			Query::Phrase { field, terms } => self.phrase(field, terms),
			Query::Boolean { must, should, must_not } => self.boolean(must, should, must_not),
			Query::MatchAll => self.snapshot.doc_ids().map(|id| (id, MATCH_ALL_SCORE)).collect(),
			Query::Boosted { query, boost } => {
				let mut scores = self.eval(query);
				scores.values_mut().for_each(|s| *s *= boost);
				scores
			}
			Query::Empty => Scores::new(),
		}
	}

	fn field_len(&self, doc_id: DocId) -> u32 { self.snapshot.field_len(doc_id).unwrap_or(0) }

	fn term(&self, field: &str, term: &str) -> Scores {
		if field != CONTENT_FIELD {
			return Scores::new();
		}
		let idf = self.scorer.idf(self.snapshot.doc_freq(term));
		self.snapshot
			.postings(term)
			.map(|p| (p.doc_id, self.scorer.score(idf, p.term_freq(), self.field_len(p.doc_id))))
			.collect()
	}

	fn phrase(&self, field: &str, terms: &[(u32, String)]) -> Scores {
		let Some(((first_offset, first_term), rest)) = terms.split_first() else { return Scores::new() };
		if field != CONTENT_FIELD {
			return Scores::new();
		}

		let rest_positions: Vec<(u32, HashMap<DocId, &[u32]>)> = rest
			.iter()
			.map(|(offset, term)| {
				let by_doc: HashMap<DocId, &[u32]> = self.snapshot.postings(term).map(|p| (p.doc_id, p.positions.as_slice())).collect();
				(*offset, by_doc)
			})
			.collect();
		let idf: f32 = terms.iter().map(|(_, term)| self.scorer.idf(self.snapshot.doc_freq(term))).sum();

		let mut scores = Scores::new();
		'docs: for posting in self.snapshot.postings(first_term) {
			let mut others = Vec::with_capacity(rest_positions.len());
			for (offset, by_doc) in &rest_positions {
				match by_doc.get(&posting.doc_id) {
					Some(positions) => others.push((*offset, *positions)),
					None => continue 'docs,
				}
			}
			let freq = posting
				.positions
				.iter()
				.filter_map(|p| p.checked_sub(*first_offset))
				.filter(|start| others.iter().all(|(offset, positions)| positions.binary_search(&(start + offset)).is_ok()))
				.count() as u32;
			if freq > 0 {
				scores.insert(posting.doc_id, self.scorer.score(idf, freq, self.field_len(posting.doc_id)));
			}
		}
		scores
	}

	fn boolean(&self, must: &[Query], should: &[Query], must_not: &[Query]) -> Scores {
		let mut scores = if must.is_empty() {
			let mut union = Scores::new();
			for clause in should {
				for (doc_id, score) in self.eval(clause) {
					*union.entry(doc_id).or_insert(0.0) += score;
				}
			}
			union
		} else {
			let mut required = must.iter().map(|clause| self.eval(clause));
			let mut acc = required.next().unwrap_or_default();
			for clause_scores in required {
				acc = acc
					.into_iter()
					.filter_map(|(doc_id, score)| clause_scores.get(&doc_id).map(|s| (doc_id, score + s)))
					.collect();
			}
			for clause in should {
				for (doc_id, score) in self.eval(clause) {
					if let Some(total) = acc.get_mut(&doc_id) {
						*total += score;
					}
				}
			}
			acc
		};
		for clause in must_not {
			for doc_id in self.eval(clause).keys() {
				scores.remove(doc_id);
			}
		}
		scores
	}
}

/// Heap entry ordered so that the worst hit sits at the top.
#[derive(Debug, PartialEq)]
struct Candidate {
	doc_id: DocId,
	score: f32,
}

impl Eq for Candidate {}

impl Ord for Candidate {
	fn cmp(&self, other: &Self) -> Ordering {
		other.score.total_cmp(&self.score).then(self.doc_id.cmp(&other.doc_id))
	}
}

impl PartialOrd for Candidate {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}

fn top_k(scores: Scores, limit: usize) -> Vec<ScoredHit> {
	let mut heap = BinaryHeap::with_capacity(limit.min(scores.len()) + 1);
	for (doc_id, score) in scores {
		heap.push(Candidate { doc_id, score });
		if heap.len() > limit {
			heap.pop();
		}
	}
	heap.into_sorted_vec()
		.into_iter()
		.enumerate()
		.map(|(rank, c)| ScoredHit { doc_id: c.doc_id, score: c.score, rank })
		.collect()
}
