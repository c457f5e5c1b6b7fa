use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use super::handlers;
use super::state::AppState;

// Service routes: info, health and the natural-language query endpoint
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(handlers::api::service_info))
        .route("/health", get(handlers::api::health))
        .route("/query", post(handlers::api::nl_query))
}

pub fn build_router(state: Arc<AppState>) -> Router {
    api_routes()
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
