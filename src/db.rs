// ============================================
// DATABASE — SQLite persistence layer
// Chunk records, host documents, and API tokens
// ============================================

use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

/// Thread-safe database handle shared by the stores and the auth layer.
#[derive(Clone)]
pub struct Database {
    pub conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database at `path` and run all migrations.
    pub fn init(path: &Path) -> Result<Self, String> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create data directory: {e}"))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| format!("Failed to open database: {e}"))?;

        // Enable WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(|e| format!("Failed to set pragmas: {e}"))?;

        let db = Self { conn: Arc::new(Mutex::new(conn)) };
        db.migrate()?;
        Ok(db)
    }

    /// Run schema migrations. Idempotent — safe to call on every launch.
    fn migrate(&self) -> Result<(), String> {
        let conn = self.conn.lock().map_err(|e| e.to_string())?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS _meta (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );"
        ).map_err(|e| format!("Migration _meta failed: {e}"))?;

        // Check current schema version
        let version: i64 = conn
            .query_row(
                "SELECT COALESCE((SELECT value FROM _meta WHERE key = 'schema_version'), '0')",
                [],
                |row| row.get::<_, String>(0),
            )
            .map_err(|e| format!("Failed to read schema version: {e}"))?
            .parse()
            .unwrap_or(0);

        if version < 1 {
            self.migrate_v1(&conn)?;
        }

        Ok(())
    }

    /// V1: chunk records, host document table, API tokens.
    fn migrate_v1(&self, conn: &Connection) -> Result<(), String> {
        conn.execute_batch(
            "
            -- Chunk records: one row per embedded chunk. The embedding is a
            -- JSON array of floats, fixed length per deployment.
            CREATE TABLE IF NOT EXISTS chunks (
                id              TEXT PRIMARY KEY,
                content         TEXT NOT NULL,
                embedding       TEXT NOT NULL,
                parent_doc_id   TEXT NOT NULL,
                parent_type     TEXT NOT NULL,
                title_reference TEXT,
                owner           INTEGER NOT NULL,
                created_at      TEXT NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_chunks_owner ON chunks(owner);
            CREATE INDEX IF NOT EXISTS idx_chunks_parent ON chunks(parent_doc_id, parent_type);

            -- Host documents: opaque field maps addressed by (type, id)
            CREATE TABLE IF NOT EXISTS documents (
                content_type TEXT NOT NULL,
                document_id  TEXT NOT NULL,
                fields       TEXT NOT NULL,
                created_at   TEXT NOT NULL,
                updated_at   TEXT NOT NULL,
                PRIMARY KEY (content_type, document_id)
            );

            -- API tokens: SHA-256 digest of the bearer token, never cleartext
            CREATE TABLE IF NOT EXISTS api_tokens (
                token_hash TEXT PRIMARY KEY,
                owner      INTEGER NOT NULL,
                label      TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL
            );

            INSERT OR REPLACE INTO _meta (key, value) VALUES ('schema_version', '1');
            "
        ).map_err(|e| format!("Migration v1 failed: {e}"))?;
        Ok(())
    }
}

/// Current UTC time as an RFC 3339 string with millisecond precision.
pub fn now_iso() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}
