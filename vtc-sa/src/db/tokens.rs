//! Bearer token issue and lookup
//!
//! Tokens are random 32-byte values shown once at issue time. Only their
//! SHA-256 digest is stored.

use chrono::{DateTime, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use vtc_common::time::{from_db_opt, to_db_string};
use vtc_common::Result;

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

/// SHA-256 hex digest of a token
pub fn hash_token(token: &str) -> String {
    to_hex(&Sha256::digest(token.as_bytes()))
}

/// Issue a new token for an owner and return it in clear
pub async fn issue_token(
    pool: &SqlitePool,
    owner_id: &str,
    expires_at: Option<DateTime<Utc>>,
) -> Result<String> {
    let mut raw = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut raw);
    let token = to_hex(&raw);

    sqlx::query(
        "INSERT INTO access_tokens (token_hash, owner_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
    )
    .bind(hash_token(&token))
    .bind(owner_id)
    .bind(to_db_string(Utc::now()))
    .bind(expires_at.map(to_db_string))
    .execute(pool)
    .await?;

    Ok(token)
}

/// Owner of a token, or `None` when the token is unknown or expired
pub async fn owner_for_token(pool: &SqlitePool, token: &str) -> Result<Option<String>> {
    let row = sqlx::query("SELECT owner_id, expires_at FROM access_tokens WHERE token_hash = ?")
        .bind(hash_token(token))
        .fetch_optional(pool)
        .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    if let Some(expires_at) = from_db_opt(row.get("expires_at"))? {
        if expires_at <= Utc::now() {
            return Ok(None);
        }
    }

    Ok(Some(row.get("owner_id")))
}
