//! User signup and credential lookup, backed by `_ayb_users`.

use crate::password::{hash_password, verify_password};
use ayb_error::{ApiError, ApiResult};
use chrono::{DateTime, Utc};
use deadpool_postgres::Client;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
}

/// Creates a user with a freshly hashed password. Email uniqueness is
/// case-insensitive; the database's unique index is the source of truth,
/// this just surfaces its violation as a normal conflict.
pub async fn create_user(client: &Client, email: &str, password: &str) -> ApiResult<User> {
    let password_hash = hash_password(password)?;
    let row = client
        .query_one(
            "INSERT INTO _ayb_users (email, password_hash)
             VALUES (lower($1), $2)
             RETURNING id, email, email_verified, created_at",
            &[&email, &password_hash],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        email_verified: row.get("email_verified"),
        created_at: row.get("created_at"),
    })
}

/// Verifies `email`/`password` against the stored hash. A missing user and
/// a wrong password are indistinguishable to the caller (§7).
pub async fn authenticate(client: &Client, email: &str, password: &str) -> ApiResult<User> {
    let row = client
        .query_opt(
            "SELECT id, email, password_hash, email_verified, created_at
             FROM _ayb_users WHERE email = lower($1)",
            &[&email],
        )
        .await
        .map_err(ApiError::from)?;

    let Some(row) = row else {
        return Err(ApiError::unauthenticated("invalid email or password"));
    };

    let stored_hash: String = row.get("password_hash");
    if !verify_password(password, &stored_hash) {
        return Err(ApiError::unauthenticated("invalid email or password"));
    }

    Ok(User {
        id: row.get("id"),
        email: row.get("email"),
        email_verified: row.get("email_verified"),
        created_at: row.get("created_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_struct_carries_no_password_material() {
        let user = User {
            id: Uuid::nil(),
            email: "a@example.com".to_string(),
            email_verified: false,
            created_at: Utc::now(),
        };
        assert_eq!(user.email, "a@example.com");
    }
}
