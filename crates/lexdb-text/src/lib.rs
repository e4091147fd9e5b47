//! lexdb-text
//!
//! Inverted-index storage and BM25 search over the `content` field. Documents
//! are appended to a checksummed log (`log`), indexed into immutable segments
//! (`segment`) and served through point-in-time snapshots (`store`). Query
//! strings are parsed by `query` and ranked by `search`.
pub mod analysis;
pub mod log;
pub mod query;
pub mod scorer;
pub mod search;
pub mod segment;
pub mod store;

pub use analysis::Analyzer;
pub use query::{Occur, ParsedQuery, Query, QueryParser};
pub use search::{ScoredHit, MATCH_ALL_SCORE};
pub use store::{IndexStore, Snapshot, StoreOptions, StoredDocument};
