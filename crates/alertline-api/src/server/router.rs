//! Application router.

use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::{RequestBodyTimeoutLayer, TimeoutLayer};
use tower_http::trace::TraceLayer;

use super::ServerState;
use crate::auth::auth_middleware;
use crate::handlers::{basic, reports};

/// Largest accepted request body.
pub const MAX_REQUEST_BODY_SIZE: usize = 1024 * 1024;

/// Request limits applied to every route.
#[derive(Debug, Clone, Copy)]
pub struct RouterLimits {
    /// Whole request handling. Zero disables the limit.
    pub request_timeout: Duration,
    /// Receiving the request body. Zero disables the limit.
    pub body_timeout: Duration,
}

impl Default for RouterLimits {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(
                alertline_core::config::defaults::SERVER_WRITE_TIMEOUT_SECS,
            ),
            body_timeout: Duration::ZERO,
        }
    }
}

pub fn create_router(state: ServerState, limits: RouterLimits) -> Router {
    let public_routes = Router::new().route("/api/health", get(basic::health_handler));

    let protected_routes = Router::new()
        .route("/api/ping", get(basic::ping_handler))
        .route("/api/report", post(reports::submit_report_handler))
        .route("/api/report/:report_id", get(reports::get_report_handler))
        .route("/api/reports", get(reports::list_reports_handler))
        .route("/api/resolve/:group_id", post(reports::resolve_group_handler))
        .route("/api/sources", get(reports::sources_handler))
        .route("/api/overview", get(reports::overview_handler))
        .route("/api/notifiers", get(reports::notifiers_handler))
        .route_layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let mut router = public_routes.merge(protected_routes);

    if !limits.body_timeout.is_zero() {
        router = router.layer(RequestBodyTimeoutLayer::new(limits.body_timeout));
    }
    if !limits.request_timeout.is_zero() {
        router = router.layer(TimeoutLayer::new(limits.request_timeout));
    }

    router
        .layer(RequestBodyLimitLayer::new(MAX_REQUEST_BODY_SIZE))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
