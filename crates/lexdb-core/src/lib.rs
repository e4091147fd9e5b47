//! lexdb-core
//!
//! Shared vocabulary for the lexdb crates: the document model, the error
//! taxonomy, collaborator traits, configuration loading and plain-text
//! ingestion helpers.

pub mod config;
pub mod data_processor;
pub mod error;
pub mod traits;
pub mod types;

pub use error::{ConfigError, IndexError, ParseError, RetrievalError};
pub use traits::{ContentRetriever, TokenCounter};
pub use types::{
    DocId, Document, FieldValue, Metadata, RetrievedContent, CONTENT_FIELD, TOKEN_COUNT_FIELD,
};
