//! Route modules for the relay server

pub mod health;
pub mod relay;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Full relay application with CORS and request tracing
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/health", health::router())
        .merge(relay::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
