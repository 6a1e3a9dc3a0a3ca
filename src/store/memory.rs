use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use uuid::Uuid;

use super::{ChunkFilter, ChunkRecord, ChunkStore, DocumentStore, NewChunk};
use crate::db::now_iso;
use crate::error::{AppError, AppResult};

/// In-memory document store keyed by `(content_type, document_id)`.
#[derive(Default)]
pub struct MemoryDocumentStore {
    docs: Mutex<HashMap<(String, String), serde_json::Value>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, content_type: &str, document_id: &str, fields: serde_json::Value) {
        self.docs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((content_type.to_string(), document_id.to_string()), fields);
    }

    pub fn remove(&self, content_type: &str, document_id: &str) {
        self.docs
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(content_type.to_string(), document_id.to_string()));
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn find(
        &self,
        content_type: &str,
        document_id: &str,
    ) -> AppResult<Option<serde_json::Value>> {
        let docs = self.docs.lock().unwrap_or_else(|e| e.into_inner());
        Ok(docs
            .get(&(content_type.to_string(), document_id.to_string()))
            .cloned())
    }
}

/// In-memory chunk store: a flat list scanned per filter, mirroring the
/// no-pagination read path of the SQLite store.
#[derive(Default)]
pub struct MemoryChunkStore {
    chunks: Mutex<Vec<ChunkRecord>>,
}

impl MemoryChunkStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ChunkStore for MemoryChunkStore {
    async fn create(&self, chunk: NewChunk) -> AppResult<ChunkRecord> {
        let record = ChunkRecord {
            id: Uuid::new_v4().to_string(),
            content: chunk.content,
            embedding: chunk.embedding,
            parent_doc_id: chunk.parent_doc_id,
            parent_type: chunk.parent_type,
            title_reference: chunk.title_reference,
            owner: chunk.owner,
            created_at: now_iso(),
        };
        self.chunks
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(record.clone());
        Ok(record)
    }

    async fn find_many(&self, filter: &ChunkFilter) -> AppResult<Vec<ChunkRecord>> {
        let chunks = self.chunks.lock().unwrap_or_else(|e| e.into_inner());
        Ok(chunks.iter().filter(|c| filter.matches(c)).cloned().collect())
    }

    async fn delete_many(&self, filter: &ChunkFilter) -> AppResult<u64> {
        let mut chunks = self.chunks.lock().unwrap_or_else(|e| e.into_inner());
        let before = chunks.len();
        chunks.retain(|c| !filter.matches(c));
        Ok((before - chunks.len()) as u64)
    }
}

/// Document store that fails every read. Exercises the hydration fallback
/// path in search tests.
pub struct FailingDocumentStore;

#[async_trait]
impl DocumentStore for FailingDocumentStore {
    async fn find(
        &self,
        _content_type: &str,
        _document_id: &str,
    ) -> AppResult<Option<serde_json::Value>> {
        Err(AppError::Db("document store unavailable".into()))
    }
}
