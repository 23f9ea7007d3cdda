//! Request-scoped middleware: identity resolution, rate limiting, and the
//! RLS connection setup that every data-path handler rides on top of.

use crate::state::AppState;
use ayb_auth::{resolve_identity, IdentityRequest, Principal};
use ayb_db::RlsContext;
use ayb_error::ApiError;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::{IntoResponse, Response},
};

fn bearer_token(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}

fn session_cookie(req: &Request) -> Option<&str> {
    req.headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| {
            cookies.split(';').map(str::trim).find_map(|pair| pair.strip_prefix("ayb_session="))
        })
}

fn admin_token_header(req: &Request) -> Option<&str> {
    req.headers().get("x-admin-token").and_then(|v| v.to_str().ok())
}

/// Resolves the caller's [`Principal`] and inserts it into request
/// extensions so every downstream handler can pull it out with a plain
/// extractor rather than re-deriving it from raw headers.
pub async fn identity_middleware(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let is_admin_route = req.uri().path().starts_with("/api/admin");
    let identity_req = IdentityRequest {
        bearer_token: bearer_token(&req),
        session_cookie: session_cookie(&req),
        admin_token: admin_token_header(&req),
        is_admin_route,
    };

    let principal = match state.pool.get().await {
        Ok(client) => resolve_identity(&client, identity_req, &state.config.admin_token)
            .await
            .unwrap_or_else(|_| Principal::anonymous()),
        Err(_) => Principal::anonymous(),
    };

    req.extensions_mut().insert(principal);
    next.run(req).await
}

/// Keyed on `(user_id | app_id | remote identity)`; anonymous callers all
/// share one bucket per the spec's default-deny-by-volume posture.
pub async fn rate_limit_middleware(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let principal = req.extensions().get::<Principal>().cloned();
    let key = match &principal {
        Some(p) if p.user_id.is_some() => p.user_id.unwrap().to_string(),
        Some(p) if p.key_id.is_some() => p.key_id.unwrap().to_string(),
        _ => "anonymous".to_string(),
    };

    let decision = state
        .rate_limiter
        .check(&key, state.config.rate_limit_rps, state.config.rate_limit_window_seconds);

    if !decision.allowed {
        return ApiError::rate_limited(decision.retry_after_secs).into_response();
    }

    next.run(req).await
}

/// Gate for every `/api/admin/*` route beyond the `status` probe: the
/// identity middleware may have resolved an admin principal from the
/// `x-admin-token` header, a session, or an API key, but only an admin
/// principal may pass here.
pub async fn require_admin_middleware(req: Request, next: Next) -> Response {
    let is_admin = req.extensions().get::<Principal>().is_some_and(Principal::is_admin);
    if !is_admin {
        return ApiError::forbidden("admin access required").into_response();
    }
    next.run(req).await
}

#[must_use]
pub fn rls_context_for(principal: &Principal) -> RlsContext {
    if principal.is_admin() {
        RlsContext::admin()
    } else {
        RlsContext {
            user_id: principal.rls_user_id(),
            is_admin: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ayb_auth::PrincipalKind;

    #[test]
    fn admin_principal_maps_to_admin_rls_context() {
        let ctx = rls_context_for(&Principal::admin());
        assert!(ctx.is_admin);
    }

    #[test]
    fn anonymous_principal_has_no_rls_user() {
        let ctx = rls_context_for(&Principal::anonymous());
        assert!(ctx.user_id.is_none());
        assert!(!ctx.is_admin);
    }

    #[test]
    fn user_principal_carries_its_user_id_into_rls_context() {
        let mut principal = Principal::anonymous();
        principal.kind = PrincipalKind::User;
        principal.user_id = Some(uuid::Uuid::nil());
        let ctx = rls_context_for(&principal);
        assert_eq!(ctx.user_id, Some(uuid::Uuid::nil()));
    }
}
