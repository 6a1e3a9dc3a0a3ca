use rusqlite::params;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::db::{now_iso, Database};
use crate::error::{AppError, AppResult};

/// SHA-256 hex digest of a token. Only digests are persisted.
pub fn hash_token(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Mint a new API token for `owner` and store its digest. The cleartext is
/// returned exactly once; it cannot be recovered later.
pub fn issue_token(db: &Database, owner: i64, label: &str) -> AppResult<String> {
    let token = format!("ss_{}", Uuid::new_v4().simple());
    let conn = db.conn.lock()?;
    conn.execute(
        "INSERT INTO api_tokens (token_hash, owner, label, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![hash_token(&token), owner, label, now_iso()],
    )?;
    Ok(token)
}

/// Resolve an `Authorization` header to the calling owner's id.
/// Returns `Unauthorized` when the header is missing or the token unknown.
pub fn authenticate(db: &Database, authorization_header: Option<&str>) -> AppResult<i64> {
    let header = authorization_header
        .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".into()))?;
    let token = header.strip_prefix("Bearer ").unwrap_or(header);
    let presented_hash = hash_token(token);

    let conn = db.conn.lock()?;
    let mut stmt = conn.prepare("SELECT token_hash, owner FROM api_tokens")?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
    })?;

    // Scan and compare digests in constant time rather than keying the
    // lookup on the presented value
    for row in rows {
        let (stored_hash, owner) = row?;
        if constant_time_eq(presented_hash.as_bytes(), stored_hash.as_bytes()) {
            return Ok(owner);
        }
    }

    Err(AppError::Unauthorized("Invalid token".into()))
}

/// Constant-time byte comparison to prevent timing attacks.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
