use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers;
use crate::auth::require_admin;
use crate::state::AppState;

/// Create the main application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Public routes (guests may listen)
    let radio_routes = Router::new()
        .route("/health", get(handlers::health_check))
        .route("/radio/events", get(handlers::radio::radio_events))
        .route("/radio/active-listeners", get(handlers::radio::active_listeners))
        .route(
            "/radio/update-playing-state",
            post(handlers::radio::update_playing_state),
        )
        .route("/radio/now-playing", get(handlers::radio::now_playing))
        .route("/radio/stream-url", get(handlers::radio::stream_url))
        .route(
            "/webhooks/radio-update",
            post(handlers::radio::radio_update_webhook),
        );

    // Admin routes
    let admin_routes = Router::new()
        .route("/admin/listeners", get(handlers::admin::listener_stats))
        .layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let api_routes = Router::new().merge(radio_routes).merge(admin_routes);

    Router::new()
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
