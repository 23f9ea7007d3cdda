//! API key issuance, lookup, and revocation. Keys are shown in plaintext
//! exactly once, at creation; every other path sees only the hash.

use crate::principal::{Principal, PrincipalKind, Scope};
use crate::token::hash_token;
use ayb_error::{ApiError, ApiResult};
use deadpool_postgres::Client;
use rand::RngCore;
use uuid::Uuid;

const KEY_PREFIX: &str = "ayb_";

#[derive(Debug, Clone)]
pub struct CreatedApiKey {
    pub id: Uuid,
    /// Full plaintext secret (`ayb_<random>`) — only ever returned once.
    pub plaintext: String,
}

pub struct NewApiKey<'a> {
    pub user_id: Uuid,
    pub app_id: Option<Uuid>,
    pub name: &'a str,
    pub scope: Scope,
    pub allowed_tables: Option<Vec<String>>,
}

fn scope_str(scope: Scope) -> &'static str {
    match scope {
        Scope::All => "*",
        Scope::ReadOnly => "readonly",
        Scope::ReadWrite => "readwrite",
    }
}

fn generate_key_body() -> String {
    let mut bytes = [0u8; 24];
    rand::thread_rng().fill_bytes(&mut bytes);
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, bytes)
}

pub async fn create_api_key(client: &Client, new_key: NewApiKey<'_>) -> ApiResult<CreatedApiKey> {
    let body = generate_key_body();
    let plaintext = format!("{KEY_PREFIX}{body}");
    let key_prefix = plaintext.chars().take(12).collect::<String>();
    let key_hash = hash_token(&plaintext);

    let row = client
        .query_one(
            "INSERT INTO _ayb_api_keys
                (user_id, app_id, name, key_hash, key_prefix, scope, allowed_tables)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING id",
            &[
                &new_key.user_id,
                &new_key.app_id,
                &new_key.name,
                &key_hash,
                &key_prefix,
                &scope_str(new_key.scope),
                &new_key.allowed_tables,
            ],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(CreatedApiKey {
        id: row.get("id"),
        plaintext,
    })
}

/// Resolves a bearer token of the form `ayb_<...>` into a [`Principal`].
/// Returns `Ok(None)` for anything that isn't a recognizable, live key —
/// expired, revoked, and simply-unknown keys are indistinguishable to the
/// caller by design (§7: no enumeration signal).
pub async fn resolve_api_key(client: &Client, bearer: &str) -> ApiResult<Option<Principal>> {
    if !bearer.starts_with(KEY_PREFIX) {
        return Ok(None);
    }
    let key_prefix = bearer.chars().take(12).collect::<String>();
    let key_hash = hash_token(bearer);

    let row = client
        .query_opt(
            "SELECT id, user_id, app_id, scope, allowed_tables
             FROM _ayb_api_keys
             WHERE key_prefix = $1 AND key_hash = $2
               AND revoked_at IS NULL
               AND (expires_at IS NULL OR expires_at > now())",
            &[&key_prefix, &key_hash],
        )
        .await
        .map_err(ApiError::from)?;

    let Some(row) = row else {
        return Ok(None);
    };

    let scope_field: String = row.get("scope");
    let scope = Scope::from_str_field(&scope_field)
        .ok_or_else(|| ApiError::internal("api key has an unrecognized scope value"))?;

    let key_id: Uuid = row.get("id");
    let _ = client
        .execute(
            "UPDATE _ayb_api_keys SET last_used_at = now() WHERE id = $1",
            &[&key_id],
        )
        .await;

    Ok(Some(Principal {
        kind: PrincipalKind::ApiKey,
        user_id: row.get("user_id"),
        app_id: row.get("app_id"),
        scope,
        allowed_tables: row.get("allowed_tables"),
        oauth_scopes: None,
        key_id: Some(key_id),
    }))
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct ApiKeySummary {
    pub id: Uuid,
    pub name: String,
    pub key_prefix: String,
    pub scope: String,
    pub allowed_tables: Option<Vec<String>>,
    pub revoked: bool,
    pub last_used_at: Option<chrono::DateTime<chrono::Utc>>,
}

pub async fn list_api_keys(client: &Client, user_id: Uuid) -> ApiResult<Vec<ApiKeySummary>> {
    let rows = client
        .query(
            "SELECT id, name, key_prefix, scope, allowed_tables, revoked_at, last_used_at
             FROM _ayb_api_keys WHERE user_id = $1 ORDER BY name",
            &[&user_id],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(rows
        .into_iter()
        .map(|row| ApiKeySummary {
            id: row.get("id"),
            name: row.get("name"),
            key_prefix: row.get("key_prefix"),
            scope: row.get("scope"),
            allowed_tables: row.get("allowed_tables"),
            revoked: row.get::<_, Option<chrono::DateTime<chrono::Utc>>>("revoked_at").is_some(),
            last_used_at: row.get("last_used_at"),
        })
        .collect())
}

pub async fn revoke_api_key(client: &Client, key_id: Uuid) -> ApiResult<()> {
    let rows = client
        .execute(
            "UPDATE _ayb_api_keys SET revoked_at = now() WHERE id = $1 AND revoked_at IS NULL",
            &[&key_id],
        )
        .await
        .map_err(ApiError::from)?;
    if rows == 0 {
        return Err(ApiError::not_found("api key not found"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_body_is_not_empty_and_varies() {
        assert_ne!(generate_key_body(), generate_key_body());
    }

    #[test]
    fn scope_str_round_trips() {
        assert_eq!(scope_str(Scope::All), "*");
        assert_eq!(Scope::from_str_field("*"), Some(Scope::All));
    }
}
