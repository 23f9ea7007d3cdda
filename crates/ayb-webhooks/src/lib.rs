//! Outbound webhook engine: HMAC signing, a secret storage seam, and the
//! dispatch/delivery pipeline fed by the collections change bus (§4.4.7, §5).

pub mod delivery;
pub mod secret_store;
pub mod signature;

pub use delivery::{deliver, list_enabled, run_dispatch_loop, send_test_delivery, Webhook, WebhookDelivery};
pub use secret_store::{ColumnSecretStore, SecretStore};
pub use signature::{sign, verify};
