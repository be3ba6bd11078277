//! Request and event audit logging for axum services.
//!
//! [`app`] wraps a host router with the capture middleware and mounts the
//! admin API. [`services::LogbookService`] is the entry point for recording
//! application events directly.

pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repositories;
pub mod services;
pub mod state;
pub mod utils;

use axum::{http::Method, middleware as axum_middleware, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Host routes plus the admin API, with request ids, capture, tracing and
/// CORS layered on top.
pub fn app(host: Router<AppState>, state: AppState) -> Router {
    let prefix = state.config.logbook.route_prefix.clone();

    host.merge(handlers::admin_routes(&prefix))
        .layer(axum_middleware::from_fn_with_state(
            state.clone(),
            middleware::capture_exchange,
        ))
        .layer(axum_middleware::from_fn(middleware::request_id))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(
                    CorsLayer::new()
                        .allow_origin(Any)
                        .allow_methods([
                            Method::GET,
                            Method::POST,
                            Method::PUT,
                            Method::PATCH,
                            Method::DELETE,
                            Method::OPTIONS,
                        ])
                        .allow_headers(Any)
                        .max_age(std::time::Duration::from_secs(24 * 60 * 60)),
                ),
        )
        .with_state(state)
}
