//! OAuth2 authorization-code grant with PKCE, plus refresh-token rotation.
//!
//! This is the authorization *server* role: it issues codes and tokens to
//! clients, the inverse of consuming a third-party provider's OIDC flow.

use crate::token::{generate_opaque_token, hash_token};
use ayb_error::{ApiError, ApiResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::{DateTime, Duration, Utc};
use deadpool_postgres::Client;
use sha2::{Digest, Sha256};
use uuid::Uuid;

pub const AUTHORIZATION_CODE_TTL_MINUTES: i64 = 10;
pub const ACCESS_TOKEN_TTL_MINUTES: i64 = 60;
pub const REFRESH_TOKEN_TTL_DAYS: i64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeChallengeMethod {
    S256,
    Plain,
}

impl CodeChallengeMethod {
    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "S256" => Some(Self::S256),
            "plain" => Some(Self::Plain),
            _ => None,
        }
    }
}

/// `BASE64URL(SHA-256(verifier)) == challenge` for S256; exact match for
/// plain. The source treats PKCE as required for public clients even though
/// RFC 7636 allows it conditionally (open question (b), resolved to "keep
/// requiring it").
#[must_use]
pub fn verify_pkce(verifier: &str, challenge: &str, method: CodeChallengeMethod) -> bool {
    match method {
        CodeChallengeMethod::Plain => verifier == challenge,
        CodeChallengeMethod::S256 => {
            let digest = Sha256::digest(verifier.as_bytes());
            URL_SAFE_NO_PAD.encode(digest) == challenge
        }
    }
}

pub struct NewAuthorization<'a> {
    pub client_id: &'a str,
    pub user_id: Uuid,
    pub redirect_uri: &'a str,
    pub scope: &'a str,
    pub code_challenge: &'a str,
    pub code_challenge_method: CodeChallengeMethod,
}

/// Issues a one-shot authorization code with ≥256 bits of entropy.
pub async fn create_authorization(client: &Client, new_auth: NewAuthorization<'_>) -> ApiResult<String> {
    let code = generate_opaque_token();
    let expires_at = Utc::now() + Duration::minutes(AUTHORIZATION_CODE_TTL_MINUTES);
    let method = match new_auth.code_challenge_method {
        CodeChallengeMethod::S256 => "S256",
        CodeChallengeMethod::Plain => "plain",
    };

    client
        .execute(
            "INSERT INTO _ayb_oauth_authorizations
                (code, client_id, user_id, redirect_uri, scope, code_challenge,
                 code_challenge_method, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            &[
                &code,
                &new_auth.client_id,
                &new_auth.user_id,
                &new_auth.redirect_uri,
                &new_auth.scope,
                &new_auth.code_challenge,
                &method,
                &expires_at,
            ],
        )
        .await
        .map_err(ApiError::from)?;

    Ok(code)
}

pub struct ConsumedAuthorization {
    pub user_id: Uuid,
    pub scope: String,
}

/// Atomically validates and consumes a code: a second attempt against the
/// same code always fails with `invalid_grant`, never partially succeeds.
pub async fn consume_authorization(
    client: &Client,
    code: &str,
    client_id: &str,
    redirect_uri: &str,
    code_verifier: &str,
) -> ApiResult<ConsumedAuthorization> {
    let row = client
        .query_opt(
            "UPDATE _ayb_oauth_authorizations
             SET consumed_at = now()
             WHERE code = $1 AND client_id = $2 AND redirect_uri = $3
               AND consumed_at IS NULL AND expires_at > now()
             RETURNING user_id, scope, code_challenge, code_challenge_method",
            &[&code, &client_id, &redirect_uri],
        )
        .await
        .map_err(ApiError::from)?;

    let Some(row) = row else {
        return Err(ApiError::invalid_request("invalid_grant"));
    };

    let challenge: String = row.get("code_challenge");
    let method_str: String = row.get("code_challenge_method");
    let method = CodeChallengeMethod::parse(&method_str)
        .ok_or_else(|| ApiError::internal("unrecognized code_challenge_method in storage"))?;

    if !verify_pkce(code_verifier, &challenge, method) {
        return Err(ApiError::invalid_request("invalid_grant"));
    }

    Ok(ConsumedAuthorization {
        user_id: row.get("user_id"),
        scope: row.get("scope"),
    })
}

pub struct IssuedTokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

pub async fn issue_token_pair(
    client: &Client,
    client_id: &str,
    user_id: Uuid,
    scope: &str,
) -> ApiResult<IssuedTokenPair> {
    let access_token = generate_opaque_token();
    let refresh_token = generate_opaque_token();
    let access_expires = Utc::now() + Duration::minutes(ACCESS_TOKEN_TTL_MINUTES);
    let refresh_expires = Utc::now() + Duration::days(REFRESH_TOKEN_TTL_DAYS);

    insert_token(client, &access_token, client_id, user_id, scope, access_expires, "access").await?;
    insert_token(client, &refresh_token, client_id, user_id, scope, refresh_expires, "refresh").await?;

    Ok(IssuedTokenPair {
        access_token,
        refresh_token,
        expires_in: ACCESS_TOKEN_TTL_MINUTES * 60,
    })
}

async fn insert_token(
    client: &Client,
    token: &str,
    client_id: &str,
    user_id: Uuid,
    scope: &str,
    expires_at: DateTime<Utc>,
    kind: &str,
) -> ApiResult<()> {
    client
        .execute(
            "INSERT INTO _ayb_oauth_tokens (hash, kind, client_id, user_id, scope, expires_at)
             VALUES ($1, $2, $3, $4, $5, $6)",
            &[&hash_token(token), &kind, &client_id, &user_id, &scope, &expires_at],
        )
        .await
        .map_err(ApiError::from)?;
    Ok(())
}

/// Looks up and revokes the refresh token in one statement, then mints a
/// fresh pair — rotation means the old refresh token can never be replayed.
pub async fn rotate_refresh_token(
    client: &Client,
    refresh_token: &str,
    client_id: &str,
) -> ApiResult<IssuedTokenPair> {
    let row = client
        .query_opt(
            "UPDATE _ayb_oauth_tokens
             SET revoked_at = now()
             WHERE hash = $1 AND client_id = $2 AND kind = 'refresh'
               AND revoked_at IS NULL AND expires_at > now()
             RETURNING user_id, scope",
            &[&hash_token(refresh_token), &client_id],
        )
        .await
        .map_err(ApiError::from)?;

    let Some(row) = row else {
        return Err(ApiError::invalid_request("invalid_grant"));
    };

    issue_token_pair(client, client_id, row.get("user_id"), row.get("scope")).await
}

/// Resolves a bearer access token into its `(user_id, scope)`, for the
/// identity resolver's OAuth precedence step.
pub async fn resolve_access_token(client: &Client, token: &str) -> ApiResult<Option<(Uuid, String)>> {
    let row = client
        .query_opt(
            "SELECT user_id, scope FROM _ayb_oauth_tokens
             WHERE hash = $1 AND kind = 'access' AND revoked_at IS NULL AND expires_at > now()",
            &[&hash_token(token)],
        )
        .await
        .map_err(ApiError::from)?;
    Ok(row.map(|row| (row.get("user_id"), row.get("scope"))))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s256_pkce_verifies_matching_verifier() {
        let verifier = "a-very-secret-verifier-string-value";
        let digest = Sha256::digest(verifier.as_bytes());
        let challenge = URL_SAFE_NO_PAD.encode(digest);
        assert!(verify_pkce(verifier, &challenge, CodeChallengeMethod::S256));
    }

    #[test]
    fn s256_pkce_rejects_mismatched_verifier() {
        assert!(!verify_pkce("verifier", "not-the-right-challenge", CodeChallengeMethod::S256));
    }

    #[test]
    fn plain_pkce_is_exact_match() {
        assert!(verify_pkce("same", "same", CodeChallengeMethod::Plain));
        assert!(!verify_pkce("same", "different", CodeChallengeMethod::Plain));
    }

    #[test]
    fn code_challenge_method_parses_known_values_only() {
        assert_eq!(CodeChallengeMethod::parse("S256"), Some(CodeChallengeMethod::S256));
        assert_eq!(CodeChallengeMethod::parse("bogus"), None);
    }
}
