//! Domain types shared by the index store, the retriever and the CLI.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Name of the single tokenized, searchable field.
pub const CONTENT_FIELD: &str = "content";
/// Name of the stored field holding the approximate token count of the content.
pub const TOKEN_COUNT_FIELD: &str = "token-count";

pub type DocId = u64;
pub type Metadata = BTreeMap<String, FieldValue>;

/// A typed scalar stored alongside a document.
///
/// The variant is persisted with the value, so a `Float` written at index time
/// comes back as a `Float`, never as a `Double` or a string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Str(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Str(_) => "string",
            FieldValue::Int(_) => "int",
            FieldValue::Long(_) => "long",
            FieldValue::Float(_) => "float",
            FieldValue::Double(_) => "double",
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        match self {
            FieldValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Int(v) => Some(i64::from(*v)),
            FieldValue::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(f64::from(*v)),
            FieldValue::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// NaN and infinities cannot be persisted faithfully.
    pub fn is_finite(&self) -> bool {
        match self {
            FieldValue::Float(v) => v.is_finite(),
            FieldValue::Double(v) => v.is_finite(),
            _ => true,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Str(v) => write!(f, "{v}"),
            FieldValue::Int(v) => write!(f, "{v}"),
            FieldValue::Long(v) => write!(f, "{v}"),
            FieldValue::Float(v) => write!(f, "{v}"),
            FieldValue::Double(v) => write!(f, "{v}"),
        }
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self { FieldValue::Str(v) }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self { FieldValue::Str(v.to_string()) }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self { FieldValue::Int(v) }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self { FieldValue::Long(v) }
}

impl From<f32> for FieldValue {
    fn from(v: f32) -> Self { FieldValue::Float(v) }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self { FieldValue::Double(v) }
}

/// One unit of indexing: the searchable `content` plus caller metadata.
///
/// Every call to `IndexStore::add` creates a new, independent entry; there is
/// no notion of updating a previously added document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    pub metadata: Metadata,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), metadata: Metadata::new() }
    }

    /// Adds a metadata field, replacing any earlier value under the same name.
    pub fn with_metadata(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.metadata.insert(name.into(), value.into());
        self
    }

    pub fn with_metadata_map(mut self, metadata: Metadata) -> Self {
        self.metadata.extend(metadata);
        self
    }
}

/// A ranked piece of content handed back to the caller.
///
/// `metadata` holds every stored field except `content`, including
/// `token-count`. `score` is only comparable with scores from the same call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedContent {
    pub text: String,
    pub metadata: Metadata,
    pub score: f32,
}

impl RetrievedContent {
    pub fn token_count(&self) -> Option<i32> {
        self.metadata.get(TOKEN_COUNT_FIELD).and_then(FieldValue::as_i32)
    }
}
