//! Shared application state handed to every route via `State<AppState>`.

use crate::config::ServerConfig;
use crate::sms::SmsProvider;
use crate::storage::ObjectStore;
use ayb_auth::KeyedRateLimiter;
use ayb_collections::ChangeBus;
use ayb_schema::SchemaHandle;
use ayb_webhooks::SecretStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub schema: SchemaHandle,
    pub pool: deadpool_postgres::Pool,
    pub change_bus: ChangeBus,
    pub rate_limiter: Arc<KeyedRateLimiter>,
    pub config: Arc<ServerConfig>,
    pub secret_store: Arc<dyn SecretStore>,
    pub object_store: Arc<dyn ObjectStore>,
    pub sms_provider: Arc<dyn SmsProvider>,
    pub http: reqwest::Client,
}
