use async_trait::async_trait;
use rusqlite::{params, params_from_iter, ToSql};
use uuid::Uuid;

use super::{ChunkFilter, ChunkRecord, ChunkStore, DocumentStore, NewChunk};
use crate::db::{now_iso, Database};
use crate::error::{AppError, AppResult};

/// Document store backed by the shared SQLite database.
#[derive(Clone)]
pub struct SqliteDocumentStore {
    db: Database,
}

impl SqliteDocumentStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Insert or replace a host document. Not part of the capability trait:
    /// the search core only reads documents; this populates the host table.
    pub fn upsert(
        &self,
        content_type: &str,
        document_id: &str,
        fields: &serde_json::Value,
    ) -> AppResult<()> {
        let conn = self.db.conn.lock()?;
        let now = now_iso();
        let fields_json = serde_json::to_string(fields)?;
        conn.execute(
            "INSERT INTO documents (content_type, document_id, fields, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?4)
             ON CONFLICT (content_type, document_id)
             DO UPDATE SET fields = ?3, updated_at = ?4",
            params![content_type, document_id, fields_json, now],
        )?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for SqliteDocumentStore {
    async fn find(
        &self,
        content_type: &str,
        document_id: &str,
    ) -> AppResult<Option<serde_json::Value>> {
        let conn = self.db.conn.lock()?;
        let mut stmt = conn.prepare(
            "SELECT fields FROM documents WHERE content_type = ?1 AND document_id = ?2",
        )?;
        let mut rows = stmt.query(params![content_type, document_id])?;
        match rows.next()? {
            Some(row) => {
                let raw: String = row.get(0)?;
                let fields = serde_json::from_str(&raw)
                    .map_err(|e| AppError::Db(format!("corrupt document fields: {e}")))?;
                Ok(Some(fields))
            }
            None => Ok(None),
        }
    }
}

/// Chunk store backed by the shared SQLite database. Embeddings are stored
/// as JSON arrays in a TEXT column.
#[derive(Clone)]
pub struct SqliteChunkStore {
    db: Database,
}

impl SqliteChunkStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/// Renders a `ChunkFilter` as a WHERE clause plus its positional params.
fn where_clause(filter: &ChunkFilter) -> (String, Vec<&dyn ToSql>) {
    let mut clauses: Vec<&str> = Vec::new();
    let mut values: Vec<&dyn ToSql> = Vec::new();

    if let Some(doc_id) = &filter.parent_doc_id {
        clauses.push("parent_doc_id = ?");
        values.push(doc_id);
    }
    if let Some(parent_type) = &filter.parent_type {
        clauses.push("parent_type = ?");
        values.push(parent_type);
    }
    if let Some(owner) = &filter.owner {
        clauses.push("owner = ?");
        values.push(owner);
    }

    let sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    (sql, values)
}

fn row_to_chunk(row: &rusqlite::Row<'_>) -> rusqlite::Result<(ChunkRecord, String)> {
    let raw_embedding: String = row.get(2)?;
    Ok((
        ChunkRecord {
            id: row.get(0)?,
            content: row.get(1)?,
            embedding: Vec::new(),
            parent_doc_id: row.get(3)?,
            parent_type: row.get(4)?,
            title_reference: row.get(5)?,
            owner: row.get(6)?,
            created_at: row.get(7)?,
        },
        raw_embedding,
    ))
}

const CHUNK_COLUMNS: &str =
    "id, content, embedding, parent_doc_id, parent_type, title_reference, owner, created_at";

#[async_trait]
impl ChunkStore for SqliteChunkStore {
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
        let embedding_json = serde_json::to_string(&record.embedding)?;

        let conn = self.db.conn.lock()?;
        conn.execute(
            "INSERT INTO chunks (id, content, embedding, parent_doc_id, parent_type, title_reference, owner, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                record.id,
                record.content,
                embedding_json,
                record.parent_doc_id,
                record.parent_type,
                record.title_reference,
                record.owner,
                record.created_at,
            ],
        )?;
        Ok(record)
    }

    async fn find_many(&self, filter: &ChunkFilter) -> AppResult<Vec<ChunkRecord>> {
        let conn = self.db.conn.lock()?;
        let (clause, values) = where_clause(filter);
        let mut stmt =
            conn.prepare(&format!("SELECT {CHUNK_COLUMNS} FROM chunks{clause}"))?;
        let rows = stmt.query_map(params_from_iter(values), row_to_chunk)?;

        let mut chunks = Vec::new();
        for row in rows {
            let (mut chunk, raw_embedding) = row?;
            chunk.embedding = serde_json::from_str(&raw_embedding)
                .map_err(|e| AppError::Db(format!("corrupt embedding for chunk {}: {e}", chunk.id)))?;
            chunks.push(chunk);
        }
        Ok(chunks)
    }

    async fn delete_many(&self, filter: &ChunkFilter) -> AppResult<u64> {
        let conn = self.db.conn.lock()?;
        let (clause, values) = where_clause(filter);
        let removed = conn.execute(
            &format!("DELETE FROM chunks{clause}"),
            params_from_iter(values),
        )?;
        Ok(removed as u64)
    }
}
