use super::handlers;
use super::state::AppState;
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Recording control
        .route(
            "/screens/:screen_id/recording",
            post(handlers::set_recording),
        )
        .route("/screens/:screen_id/capture", post(handlers::capture_now))
        .route("/screens/:screen_id", delete(handlers::close_session))
        // Session queries
        .route("/screens/:screen_id/status", get(handlers::get_status))
        .route("/screens/:screen_id/emotions", get(handlers::get_emotions))
        // UI clients run on other origins
        .layer(CorsLayer::permissive())
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
