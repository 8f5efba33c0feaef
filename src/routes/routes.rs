//! Defines routes for the wardrobe API.
//!
//! ## Structure
//! - `POST   /api/subir-prenda` — upload + classify a garment photo (multipart)
//! - `GET    /api/prendas`      — list a user's garments (`usuario_id`, `tipo`)
//! - `DELETE /api/prendas/{id}` — delete a garment and its cleaned image
//! - `POST   /api/fashion`      — styling advice over the user's wardrobe
//! - `GET    /files/{*key}`     — objects of the local storage backend
//! - `GET    /healthz`, `/readyz`

use crate::{
    handlers::{
        fashion_handlers::fashion_advice,
        file_handlers::get_file,
        garment_handlers::{delete_garment, list_garments, upload_garment},
        health_handlers::{healthz, readyz},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{delete, get, post},
};

/// Build the router. Handlers share `AppState`; layers such as CORS and
/// tracing are added by the caller.
pub fn routes(max_upload_bytes: usize) -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/api/subir-prenda",
            post(upload_garment).layer(DefaultBodyLimit::max(max_upload_bytes)),
        )
        .route("/api/prendas", get(list_garments))
        .route("/api/prendas/{id}", delete(delete_garment))
        .route("/api/fashion", post(fashion_advice))
        .route("/files/{*key}", get(get_file))
}
