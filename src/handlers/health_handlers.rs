//! Health & readiness handlers.
//!
//! - GET /healthz  -> simple liveness ("ok")
//! - GET /readyz   -> readiness that checks the record store and the upload dir

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::collections::HashMap;
use tokio::fs;
use uuid::Uuid;

/// `GET /healthz`
///
/// Liveness probe. Never performs I/O.
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok".into(),
        }),
    )
}

/// `GET /readyz`
///
/// 1. Pings the garment store.
/// 2. Writes, reads back and deletes a probe file in the upload directory,
///    since multipart uploads are spooled there.
///
/// HTTP 200 when every check passes, 503 otherwise.
pub async fn readyz(State(state): State<AppState>) -> impl IntoResponse {
    let store_check = match state.wardrobe.store.ping().await {
        Ok(()) => (true, None::<String>),
        Err(e) => (false, Some(format!("error: {}", e))),
    };

    let upload_check = match fs::create_dir_all(&state.upload_dir).await {
        Err(e) => (false, Some(format!("could not create upload dir: {}", e))),
        Ok(()) => {
            let tmp_path = state.upload_dir.join(format!(".readyz-{}", Uuid::new_v4()));
            match fs::write(&tmp_path, b"readyz").await {
                Ok(_) => {
                    let read = fs::read(&tmp_path).await;
                    let _ = fs::remove_file(&tmp_path).await; // best-effort cleanup
                    match read {
                        Ok(bytes) if bytes == b"readyz" => (true, None),
                        Ok(_) => (false, Some("file content mismatch".to_string())),
                        Err(e) => (false, Some(format!("could not read tmp file: {}", e))),
                    }
                }
                Err(e) => (false, Some(format!("could not write tmp file: {}", e))),
            }
        }
    };

    let overall_ok = store_check.0 && upload_check.0;

    let mut checks = HashMap::new();
    checks.insert(
        "store",
        CheckStatus {
            ok: store_check.0,
            error: store_check.1,
        },
    );
    checks.insert(
        "upload_dir",
        CheckStatus {
            ok: upload_check.0,
            error: upload_check.1,
        },
    );

    let body = ReadyResponse {
        status: if overall_ok { "ok" } else { "error" }.into(),
        checks,
    };

    let status = if overall_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ReadyResponse {
    status: String,
    checks: HashMap<&'static str, CheckStatus>,
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    error: Option<String>,
}
