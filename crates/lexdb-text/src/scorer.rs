//! BM25 relevance.
//!
//! ```text
//! idf(t)    = ln(1 + (N - df + 0.5) / (df + 0.5))
//! score(t)  = idf(t) * tf * (k1 + 1) / (tf + k1 * (1 - b + b * dl / avgdl))
//! ```
//!
//! `N`, `df` and `avgdl` come from the snapshot being searched, so scores are
//! only comparable within one search.

use crate::store::Snapshot;

pub const DEFAULT_K1: f32 = 1.2;
pub const DEFAULT_B: f32 = 0.75;

/// Corpus-level statistics captured once per search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorpusStats {
	pub num_docs: u64,
	pub avg_field_len: f32,
}

impl CorpusStats {
	pub fn of(snapshot: &Snapshot) -> Self {
		Self { num_docs: snapshot.num_docs(), avg_field_len: snapshot.avg_field_len() }
	}
}

#[derive(Debug, Clone, Copy)]
pub struct Bm25 {
	k1: f32,
	b: f32,
	stats: CorpusStats,
}

impl Bm25 {
	pub fn new(stats: CorpusStats) -> Self { Self::with_params(stats, DEFAULT_K1, DEFAULT_B) }

	pub fn with_params(stats: CorpusStats, k1: f32, b: f32) -> Self { Self { k1, b, stats } }

	pub fn idf(&self, doc_freq: u64) -> f32 {
		let n = self.stats.num_docs as f32;
		let df = doc_freq as f32;
		(1.0 + (n - df + 0.5) / (df + 0.5)).ln()
	}

	/// Score of one matching clause in one document. `idf` may be a sum of
	/// per-term idfs for phrases.
	pub fn score(&self, idf: f32, term_freq: u32, field_len: u32) -> f32 {
		if term_freq == 0 {
			return 0.0;
		}
		let tf = term_freq as f32;
		let avg_len = if self.stats.avg_field_len > 0.0 { self.stats.avg_field_len } else { 1.0 };
		let norm = 1.0 - self.b + self.b * field_len as f32 / avg_len;
		idf * tf * (self.k1 + 1.0) / (tf + self.k1 * norm)
	}
}
