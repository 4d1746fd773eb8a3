//! HTTP API server

use axum::{
    routing::{get, post, put},
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod error;
pub mod handlers;
pub mod state;
pub mod validation;

pub use error::ApiError;
pub use state::AppState;

/// Build the API router using the provided application state
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .route(
            "/habits",
            get(handlers::missing_user_id).post(handlers::create_habit),
        )
        .route("/habits/", get(handlers::missing_user_id))
        .route("/habits/:user_id", get(handlers::list_habits))
        .route("/logs/event", post(handlers::log_event))
        .route("/logs/session/start", post(handlers::start_session))
        .route("/logs/session/end", put(handlers::end_session))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
