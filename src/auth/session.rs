use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rusqlite::{params, OptionalExtension};

use crate::db::repository::RepositoryError;
use crate::state::DbPool;

/// Create a new session for a user. Returns the access token and its expiry.
pub fn create_session(
    pool: &DbPool,
    user_id: &str,
    hours: u64,
) -> Result<(String, DateTime<Utc>), RepositoryError> {
    let conn = pool.get()?;

    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();
    let now = Utc::now();
    let expires_at = now + Duration::hours(hours as i64);

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, user_id, token, expires_at, now],
    )?;

    Ok((token, expires_at))
}

/// The user behind an unexpired token.
pub fn session_user(pool: &DbPool, token: &str) -> Result<Option<String>, RepositoryError> {
    let conn = pool.get()?;

    let row: Option<(String, DateTime<Utc>)> = conn
        .query_row(
            "SELECT user_id, expires_at FROM sessions WHERE token = ?1",
            params![token],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    Ok(row
        .filter(|(_, expires_at)| *expires_at > Utc::now())
        .map(|(user_id, _)| user_id))
}

/// Delete a session by token. Returns the owning user when one was removed.
pub fn delete_session(pool: &DbPool, token: &str) -> Result<Option<String>, RepositoryError> {
    let conn = pool.get()?;

    let user_id: Option<String> = conn
        .query_row(
            "DELETE FROM sessions WHERE token = ?1 RETURNING user_id",
            params![token],
            |row| row.get(0),
        )
        .optional()?;
    Ok(user_id)
}

/// Delete every session. Returns the number removed.
pub fn delete_all_sessions(pool: &DbPool) -> Result<u64, RepositoryError> {
    let conn = pool.get()?;
    let rows = conn.execute("DELETE FROM sessions", [])?;
    Ok(rows as u64)
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let bytes: [u8; 32] = rand::thread_rng().gen();
    hex::encode(bytes)
}
