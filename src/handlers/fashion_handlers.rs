//! `POST /api/fashion` — wardrobe-aware styling advice.

use crate::{errors::AppError, state::AppState};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Deserialize)]
pub struct FashionRequest {
    pub usuario_id: Option<String>,
    pub mensaje: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct FashionResponse {
    pub respuesta: String,
}

pub async fn fashion_advice(
    State(state): State<AppState>,
    payload: Result<Json<FashionRequest>, JsonRejection>,
) -> Result<Json<FashionResponse>, AppError> {
    // an unreadable body is treated as one with no fields
    let payload = match payload {
        Ok(Json(payload)) => payload,
        Err(rejection) => {
            tracing::debug!("fashion body rejected: {}", rejection.body_text());
            FashionRequest::default()
        }
    };
    let respuesta = state
        .wardrobe
        .fashion_advice(payload.usuario_id, payload.mensaje)
        .await?;
    Ok(Json(FashionResponse { respuesta }))
}
