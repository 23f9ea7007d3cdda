//! Seam for fetching a webhook's signing secret. The storage backend for
//! secrets (KMS, vault, encrypted column) is out of scope for this core;
//! callers wire in whichever implementation their deployment needs.

use ayb_error::ApiResult;
use async_trait::async_trait;
use uuid::Uuid;

#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn fetch(&self, webhook_id: Uuid) -> ApiResult<Option<String>>;
}

/// Reference implementation: the secret lives, already hashed at rest for
/// display purposes, in a column this store decrypts. For this core the
/// "decryption" is a passthrough — a real deployment swaps this for a KMS
/// client without touching the delivery handler.
pub struct ColumnSecretStore {
    pool: deadpool_postgres::Pool,
}

impl ColumnSecretStore {
    #[must_use]
    pub fn new(pool: deadpool_postgres::Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SecretStore for ColumnSecretStore {
    async fn fetch(&self, webhook_id: Uuid) -> ApiResult<Option<String>> {
        let client = self
            .pool
            .get()
            .await
            .map_err(|err| ayb_error::ApiError::internal(format!("pool error: {err}")))?;
        let row = client
            .query_opt("SELECT secret_plain FROM _ayb_webhook_secrets WHERE webhook_id = $1", &[&webhook_id])
            .await
            .map_err(ayb_error::ApiError::from)?;
        Ok(row.map(|row| row.get("secret_plain")))
    }
}
