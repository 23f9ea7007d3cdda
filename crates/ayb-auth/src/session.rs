//! User session issuance and verification backed by `_ayb_sessions`.

use crate::token::{generate_opaque_token, hash_token};
use ayb_error::{ApiError, ApiResult};
use chrono::{DateTime, Duration, Utc};
use deadpool_postgres::Client;
use uuid::Uuid;

pub const SESSION_TTL_HOURS: i64 = 24 * 14;

#[derive(Debug, Clone)]
pub struct Session {
    pub id: Uuid,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
}

/// Mints a session, persists only its hash, and returns the plaintext token
/// to hand back to the caller — the one and only time it exists unhashed.
pub async fn create_session(client: &Client, user_id: Uuid) -> ApiResult<(Session, String)> {
    let token = generate_opaque_token();
    let token_hash = hash_token(&token);
    let expires_at = Utc::now() + Duration::hours(SESSION_TTL_HOURS);

    let row = client
        .query_one(
            "INSERT INTO _ayb_sessions (user_id, token_hash, expires_at)
             VALUES ($1, $2, $3)
             RETURNING id",
            &[&user_id, &token_hash, &expires_at],
        )
        .await
        .map_err(ApiError::from)?;

    Ok((
        Session {
            id: row.get("id"),
            user_id,
            expires_at,
        },
        token,
    ))
}

/// Looks up a session by its plaintext cookie value. Expired sessions are
/// treated as not found rather than lazily deleted here — a sweeper owns
/// cleanup so the hot auth path stays read-only.
pub async fn resolve_session(client: &Client, token: &str) -> ApiResult<Option<Session>> {
    let token_hash = hash_token(token);
    let row = client
        .query_opt(
            "SELECT id, user_id, expires_at FROM _ayb_sessions
             WHERE token_hash = $1 AND expires_at > now()",
            &[&token_hash],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(row.map(|row| Session {
        id: row.get("id"),
        user_id: row.get("user_id"),
        expires_at: row.get("expires_at"),
    }))
}

pub async fn delete_session(client: &Client, token: &str) -> ApiResult<()> {
    let token_hash = hash_token(token);
    client
        .execute("DELETE FROM _ayb_sessions WHERE token_hash = $1", &[&token_hash])
        .await
        .map_err(ApiError::from)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_ttl_is_two_weeks() {
        assert_eq!(SESSION_TTL_HOURS, 336);
    }
}
