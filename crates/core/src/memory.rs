//! Memory domain types and the two storage seams.
//!
//! A memory is a piece of text plus a metadata record. The store embeds the
//! text with an [`Embedder`] and persists it in a [`VectorIndex`]. The index
//! only understands flat scalar metadata, so structured fields are flattened
//! on the way in and restored on the way out.

use crate::error::MemoryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_FORMAT: &str = "markdown";

fn default_format() -> String {
    DEFAULT_FORMAT.to_string()
}

/// The application-level metadata attached to every memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetadata {
    /// Free-form tag such as `note`, `task`, `conversation`, `personality_core`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default = "default_format")]
    pub format: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_ids: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra: Option<serde_json::Map<String, serde_json::Value>>,
}

impl MemoryMetadata {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            format: default_format(),
            title: None,
            created_at: None,
            modified_at: None,
            tags: None,
            project_id: None,
            related_ids: None,
            source: None,
            extra: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = format.into();
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_extra(mut self, extra: serde_json::Map<String, serde_json::Value>) -> Self {
        self.extra = Some(extra);
        self
    }
}

/// A stored memory as returned to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub id: String,
    pub document: String,
    pub metadata: MemoryMetadata,

    /// Cosine distance to the query; only set on search results.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

/// A scalar metadata value, the only kind the index accepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl Scalar {
    /// Convert a JSON value, or `None` if it is null or structured.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Int)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::Text(s.clone())),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Bool(b) => serde_json::Value::Bool(*b),
            Self::Int(i) => serde_json::Value::from(*i),
            Self::Float(f) => serde_json::Value::from(*f),
            Self::Text(s) => serde_json::Value::String(s.clone()),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for Scalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

/// Metadata in the shape the index stores: string keys, scalar values.
pub type FlatMetadata = BTreeMap<String, Scalar>;

/// Exact-match constraint over flat metadata; every pair must match.
pub type MetadataFilter = BTreeMap<String, Scalar>;

/// Whether `metadata` satisfies every pair in `filter`.
pub fn matches_filter(metadata: &FlatMetadata, filter: &MetadataFilter) -> bool {
    filter
        .iter()
        .all(|(key, expected)| metadata.get(key) == Some(expected))
}

/// A row in the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: String,
    pub document: String,
    pub embedding: Vec<f32>,
    pub metadata: FlatMetadata,
}

/// One nearest-neighbor result.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexHit {
    pub id: String,
    pub document: String,
    pub metadata: FlatMetadata,
    pub distance: f32,
}

/// Text-to-vector oracle.
///
/// Must be deterministic for identical input within a process.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// A human-readable name (e.g., "hashing", "openrouter:text-embedding-3-small").
    fn name(&self) -> &str;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, MemoryError>;
}

/// Nearest-neighbor store over embeddings with flat metadata.
///
/// Implementations must tolerate concurrent calls from independent requests.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    /// Insert an entry, replacing any entry with the same id.
    async fn upsert(&self, entry: IndexEntry) -> Result<(), MemoryError>;

    /// The `k` entries closest to `embedding`, ordered by increasing distance.
    async fn query(
        &self,
        embedding: &[f32],
        k: usize,
        filter: Option<&MetadataFilter>,
    ) -> Result<Vec<IndexHit>, MemoryError>;

    /// Fetch entries by id. Missing ids are skipped.
    async fn get(&self, ids: &[String]) -> Result<Vec<IndexEntry>, MemoryError>;

    /// All entries in insertion order.
    async fn list(&self) -> Result<Vec<IndexEntry>, MemoryError>;

    /// Delete entries by id and return how many existed.
    async fn delete(&self, ids: &[String]) -> Result<usize, MemoryError>;

    async fn count(&self) -> Result<usize, MemoryError>;
}
