pub mod routes;

use crate::state::AppState;
use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

/// The complete application: routes, permissive CORS for the browser
/// front-end, and per-request tracing spans.
pub fn app(state: AppState) -> Router {
    routes::routes(state.max_upload_bytes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
