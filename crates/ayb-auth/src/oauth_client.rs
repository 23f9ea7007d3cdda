//! OAuth client registry — the admin CRUD surface over `_ayb_oauth_clients`.
//! Confidential clients get a secret shown once at creation, like an API key;
//! public clients never have one.

use crate::token::{generate_opaque_token, hash_token};
use ayb_error::{ApiError, ApiResult};
use deadpool_postgres::Client;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    Confidential,
    Public,
}

impl ClientType {
    #[must_use]
    pub fn as_db_str(self) -> &'static str {
        match self {
            Self::Confidential => "confidential",
            Self::Public => "public",
        }
    }

    #[must_use]
    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "confidential" => Some(Self::Confidential),
            "public" => Some(Self::Public),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OAuthClient {
    pub client_id: String,
    pub app_id: Option<Uuid>,
    pub name: String,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub client_type: ClientType,
    pub revoked: bool,
}

pub struct NewOAuthClient<'a> {
    pub app_id: Option<Uuid>,
    pub name: &'a str,
    pub redirect_uris: Vec<String>,
    pub scopes: Vec<String>,
    pub client_type: ClientType,
}

pub struct CreatedOAuthClient {
    pub client: OAuthClient,
    /// Only present for confidential clients, and only returned once.
    pub client_secret: Option<String>,
}

fn row_to_client(row: &tokio_postgres::Row) -> ApiResult<OAuthClient> {
    let client_type_str: String = row.get("client_type");
    let client_type = ClientType::from_db_str(&client_type_str)
        .ok_or_else(|| ApiError::internal("oauth client has an unrecognized client_type"))?;
    Ok(OAuthClient {
        client_id: row.get("client_id"),
        app_id: row.get("app_id"),
        name: row.get("name"),
        redirect_uris: row.get("redirect_uris"),
        scopes: row.get("scopes"),
        client_type,
        revoked: row.get::<_, Option<chrono::DateTime<chrono::Utc>>>("revoked_at").is_some(),
    })
}

pub async fn register_client(client: &Client, new_client: NewOAuthClient<'_>) -> ApiResult<CreatedOAuthClient> {
    let client_id = Uuid::new_v4().to_string();
    let secret = match new_client.client_type {
        ClientType::Confidential => Some(generate_opaque_token()),
        ClientType::Public => None,
    };
    let secret_hash = secret.as_deref().map(hash_token);

    client
        .execute(
            "INSERT INTO _ayb_oauth_clients
                (client_id, client_secret_hash, app_id, name, redirect_uris, scopes, client_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &client_id,
                &secret_hash,
                &new_client.app_id,
                &new_client.name,
                &new_client.redirect_uris,
                &new_client.scopes,
                &new_client.client_type.as_db_str(),
            ],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(CreatedOAuthClient {
        client: OAuthClient {
            client_id,
            app_id: new_client.app_id,
            name: new_client.name.to_string(),
            redirect_uris: new_client.redirect_uris,
            scopes: new_client.scopes,
            client_type: new_client.client_type,
            revoked: false,
        },
        client_secret: secret,
    })
}

pub async fn list_clients(client: &Client) -> ApiResult<Vec<OAuthClient>> {
    let rows = client
        .query(
            "SELECT client_id, app_id, name, redirect_uris, scopes, client_type, revoked_at
             FROM _ayb_oauth_clients ORDER BY name",
            &[],
        )
        .await
        .map_err(ApiError::from)?;
    rows.iter().map(row_to_client).collect()
}

pub async fn get_client(client: &Client, client_id: &str) -> ApiResult<OAuthClient> {
    let row = client
        .query_opt(
            "SELECT client_id, app_id, name, redirect_uris, scopes, client_type, revoked_at
             FROM _ayb_oauth_clients WHERE client_id = $1",
            &[&client_id],
        )
        .await
        .map_err(ApiError::from)?
        .ok_or_else(|| ApiError::not_found("oauth client not found"))?;
    row_to_client(&row)
}

pub async fn revoke_client(client: &Client, client_id: &str) -> ApiResult<()> {
    let rows = client
        .execute(
            "UPDATE _ayb_oauth_clients SET revoked_at = now() WHERE client_id = $1 AND revoked_at IS NULL",
            &[&client_id],
        )
        .await
        .map_err(ApiError::from)?;
    if rows == 0 {
        return Err(ApiError::not_found("oauth client not found"));
    }
    Ok(())
}

/// Exact string equality against the registered set (§3: `OAuthClient`
/// invariant) — no wildcard or prefix matching.
#[must_use]
pub fn redirect_uri_is_registered(registered: &[String], candidate: &str) -> bool {
    registered.iter().any(|uri| uri == candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_type_round_trips() {
        assert_eq!(ClientType::from_db_str("public"), Some(ClientType::Public));
        assert_eq!(ClientType::Confidential.as_db_str(), "confidential");
    }

    #[test]
    fn redirect_uri_match_is_exact() {
        let registered = vec!["https://app.example.com/callback".to_string()];
        assert!(redirect_uri_is_registered(&registered, "https://app.example.com/callback"));
        assert!(!redirect_uri_is_registered(&registered, "https://app.example.com/callback/"));
    }
}
