//! Router assembly: wires every `routes::*` handler onto its path, layers
//! on the identity/rate-limit middleware and the tower-http stack, and owns
//! the `TcpListener`/`axum::serve` loop.

use crate::routes;
use crate::state::AppState;
use crate::{middleware as ayb_middleware, config::ServerConfig};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use std::time::Duration;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

pub struct Server {
    router: Router,
    config: ServerConfig,
}

impl Server {
    #[must_use]
    pub fn build(state: AppState) -> Self {
        let config = (*state.config).clone();

        let public_routes = Router::new()
            .route("/api/health", get(routes::health::health))
            .route("/api/auth/signup", post(routes::auth::signup))
            .route("/api/auth/login", post(routes::auth::login))
            .route("/api/auth/logout", post(routes::auth::logout))
            .route("/oauth/token", post(routes::oauth::token))
            .route("/api/admin/login", post(routes::admin::login));

        let collections_routes = Router::new()
            .route("/api/collections/{table}", get(routes::collections::list).post(routes::collections::create))
            .route(
                "/api/collections/{table}/{id}",
                get(routes::collections::get).patch(routes::collections::update).delete(routes::collections::delete),
            )
            .route("/api/collections/{table}/batch", post(routes::collections::batch));

        let auth_routes = Router::new()
            .route("/api/auth/api-keys", get(routes::auth::list_api_keys).post(routes::auth::create_api_key))
            .route("/api/auth/api-keys/{id}", axum::routing::delete(routes::auth::revoke_api_key))
            .route("/oauth/authorize", post(routes::oauth::authorize));

        let admin_status_route = Router::new().route("/api/admin/status", get(routes::health::admin_status));

        let admin_routes = Router::new()
            .route("/api/admin/schema/refresh", post(routes::admin::refresh_schema))
            .route("/api/admin/sql", post(routes::sql::run_query))
            .route(
                "/api/admin/oauth/clients",
                get(routes::oauth::list_clients).post(routes::oauth::register_client),
            )
            .route("/api/admin/oauth/clients/{client_id}", axum::routing::delete(routes::oauth::revoke_client))
            .route("/api/admin/rls/{table}", get(routes::rls::status))
            .route(
                "/api/admin/rls/{table}/enabled",
                put(routes::rls::set_enabled),
            )
            .route(
                "/api/admin/rls/{table}/policies",
                get(routes::rls::list_policies).post(routes::rls::create_policy),
            )
            .route(
                "/api/admin/rls/{table}/policies/{policy_name}",
                axum::routing::delete(routes::rls::delete_policy),
            )
            .route(
                "/api/admin/webhooks",
                get(routes::webhooks::list).post(routes::webhooks::create),
            )
            .route(
                "/api/admin/webhooks/{id}",
                put(routes::webhooks::set_enabled).delete(routes::webhooks::delete),
            )
            .route("/api/admin/webhooks/{id}/test", post(routes::webhooks::send_test))
            .route("/api/admin/webhooks/{id}/deliveries", get(routes::webhooks::deliveries))
            .route("/api/admin/jobs", get(routes::jobs::list).post(routes::jobs::enqueue))
            .route("/api/admin/jobs/{id}", get(routes::jobs::get))
            .route("/api/admin/jobs/{id}/retry", post(routes::jobs::retry))
            .route("/api/admin/jobs/{id}/cancel", post(routes::jobs::cancel))
            .route("/api/admin/queue/stats", get(routes::jobs::stats))
            .route(
                "/api/admin/schedules",
                get(routes::jobs::list_schedules).post(routes::jobs::create_schedule),
            )
            .route(
                "/api/admin/schedules/{id}",
                put(routes::jobs::set_schedule_enabled).delete(routes::jobs::delete_schedule),
            )
            .route(
                "/api/admin/email/templates/{key}",
                get(routes::email::get_template).put(routes::email::upsert_template),
            )
            .route("/api/admin/email/preview", post(routes::email::preview))
            .route(
                "/api/admin/sms",
                get(routes::sms::list).post(routes::sms::send),
            )
            .route("/api/admin/sms/stats", get(routes::sms::daily_stats))
            .layer(axum::middleware::from_fn(ayb_middleware::require_admin_middleware));

        let storage_routes = Router::new()
            .route("/api/storage/{bucket}", get(routes::storage::list))
            .route(
                "/api/storage/{bucket}/{key}",
                put(routes::storage::put).get(routes::storage::get).delete(routes::storage::delete),
            );

        let app_routes = public_routes
            .merge(collections_routes)
            .merge(auth_routes)
            .merge(admin_status_route)
            .merge(admin_routes)
            .merge(storage_routes)
            .layer(from_fn_with_state(state.clone(), ayb_middleware::rate_limit_middleware))
            .layer(from_fn_with_state(state.clone(), ayb_middleware::identity_middleware));

        let mut router = app_routes
            .layer(TimeoutLayer::new(Duration::from_secs(30)))
            .layer(RequestBodyLimitLayer::new(config.request_body_limit_bytes))
            .layer(CompressionLayer::new());

        if config.enable_request_tracing {
            router = router.layer(TraceLayer::new_for_http());
        }

        if config.enable_cors {
            router = router.layer(CorsLayer::permissive());
        }

        Self {
            router: router.with_state(state),
            config,
        }
    }

    pub async fn serve(self) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;
        tracing::info!(addr = %self.config.bind_addr, "ayb-server listening");
        axum::serve(listener, self.router).await
    }
}
