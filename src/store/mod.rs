pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;

/// A stored chunk: a bounded substring of a source document's text together
/// with its embedding vector and ownership metadata. Never mutated in place;
/// re-indexing a document replaces its chunk set wholesale.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkRecord {
    pub id: String,
    pub content: String,
    pub embedding: Vec<f32>,
    pub parent_doc_id: String,
    pub parent_type: String,
    /// Title snapshot copied from the source document at index time.
    pub title_reference: Option<String>,
    pub owner: i64,
    pub created_at: String,
}

/// Payload for creating a chunk; the store assigns id and created_at.
#[derive(Debug, Clone)]
pub struct NewChunk {
    pub content: String,
    pub embedding: Vec<f32>,
    pub parent_doc_id: String,
    pub parent_type: String,
    pub title_reference: Option<String>,
    pub owner: i64,
}

/// Conjunctive predicate over chunk records. An empty filter matches every
/// chunk.
#[derive(Debug, Clone, Default)]
pub struct ChunkFilter {
    pub parent_doc_id: Option<String>,
    pub parent_type: Option<String>,
    pub owner: Option<i64>,
}

impl ChunkFilter {
    /// All chunks derived from one `(document, content type)` pair.
    pub fn for_document(document_id: &str, content_type: &str) -> Self {
        Self {
            parent_doc_id: Some(document_id.to_string()),
            parent_type: Some(content_type.to_string()),
            owner: None,
        }
    }

    /// All chunks derived from a document regardless of content type.
    pub fn for_document_any_type(document_id: &str) -> Self {
        Self {
            parent_doc_id: Some(document_id.to_string()),
            parent_type: None,
            owner: None,
        }
    }

    /// All chunks owned by `owner`, optionally narrowed to one content type.
    pub fn for_owner(owner: i64, content_type: Option<&str>) -> Self {
        Self {
            parent_doc_id: None,
            parent_type: content_type.map(str::to_string),
            owner: Some(owner),
        }
    }

    pub fn matches(&self, chunk: &ChunkRecord) -> bool {
        if let Some(doc_id) = &self.parent_doc_id {
            if &chunk.parent_doc_id != doc_id {
                return false;
            }
        }
        if let Some(parent_type) = &self.parent_type {
            if &chunk.parent_type != parent_type {
                return false;
            }
        }
        if let Some(owner) = self.owner {
            if chunk.owner != owner {
                return false;
            }
        }
        true
    }
}

/// Read access to the host content store. Documents are opaque field maps
/// addressed by `(content_type, document_id)`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find(
        &self,
        content_type: &str,
        document_id: &str,
    ) -> AppResult<Option<serde_json::Value>>;
}

/// Persistence for chunk records.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn create(&self, chunk: NewChunk) -> AppResult<ChunkRecord>;
    async fn find_many(&self, filter: &ChunkFilter) -> AppResult<Vec<ChunkRecord>>;
    /// Returns the number of chunks removed.
    async fn delete_many(&self, filter: &ChunkFilter) -> AppResult<u64>;
}
