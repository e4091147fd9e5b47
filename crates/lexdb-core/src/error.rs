use thiserror::Error;

use crate::types::DocId;

/// Failures while writing to, or opening, an index store.
///
/// These always reach the caller: a document that could not be committed is
/// never reported as added.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to encode log record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Metadata field '{0}' is reserved")]
    ReservedField(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Token counting failed: {0}")]
    TokenCount(String),

    #[error("Index at {0} is already open in another store")]
    Locked(String),

    #[error("Corrupt index at {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Malformed query text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Query text is empty")]
    Empty,

    #[error("Syntax error in query: {0}")]
    Syntax(String),
}

/// Anything that goes wrong inside the retrieve pipeline.
///
/// `Retriever::retrieve` logs these and answers with an empty list.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Document {0} is missing from the snapshot")]
    MissingDocument(DocId),

    #[error("Document {doc_id} has an invalid token count")]
    InvalidTokenCount { doc_id: DocId },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to get '{key}': {source}")]
    Extract {
        key: String,
        #[source]
        source: Box<figment::Error>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

pub type Result<T, E = IndexError> = std::result::Result<T, E>;
