//! Identity resolution, sessions, API keys, rate limiting, and the OAuth2
//! authorization server.

pub mod api_key;
pub mod identity;
pub mod oauth;
pub mod oauth_client;
pub mod password;
pub mod principal;
pub mod rate_limit;
pub mod session;
pub mod token;
pub mod user;

pub use identity::{oauth_scope_covers, resolve_identity, IdentityRequest};
pub use principal::{Principal, PrincipalKind, Scope};
pub use rate_limit::{KeyedRateLimiter, RateLimitDecision};
pub use user::{authenticate, create_user, User};
