//! HTTP handlers for garment upload, listing and deletion.
//! File fields are spooled to disk chunk by chunk rather than buffered by
//! the extractor; the pipeline itself lives in `WardrobeService`.

use crate::{
    errors::AppError,
    models::garment::Garment,
    services::wardrobe_service::{SpooledFile, UploadOutcome, UploadRequest},
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, Query, State,
        multipart::{Field, MultipartError, MultipartRejection},
    },
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::path::Path as FsPath;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use uuid::Uuid;

/// Multipart field carrying the photo.
const IMAGE_FIELD: &str = "imagen";

/// Query params accepted by `GET /api/prendas`.
#[derive(Debug, Deserialize)]
pub struct ListGarmentsQuery {
    pub usuario_id: Option<String>,
    pub tipo: Option<String>,
}

/// `POST /api/subir-prenda`
pub async fn upload_garment(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadOutcome>, AppError> {
    let multipart = multipart.map_err(|rejection| AppError::Rejected {
        status: rejection.status(),
        message: rejection.body_text(),
    })?;
    let request = read_upload_form(&state.upload_dir, multipart).await?;
    let outcome = state.wardrobe.upload_garment(request).await?;
    Ok(Json(outcome))
}

/// `GET /api/prendas?usuario_id=&tipo=`
pub async fn list_garments(
    State(state): State<AppState>,
    Query(q): Query<ListGarmentsQuery>,
) -> Result<Json<Vec<Garment>>, AppError> {
    let garments = state.wardrobe.list_garments(q.usuario_id, q.tipo).await?;
    Ok(Json(garments))
}

/// `DELETE /api/prendas/{id}`
pub async fn delete_garment(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, AppError> {
    state.wardrobe.delete_garment(&id).await?;
    Ok(Json(json!({ "mensaje": "Prenda eliminada correctamente" })))
}

/// Collect the upload form. On any multipart error the spooled file, if
/// one was written, is removed before returning.
async fn read_upload_form(
    upload_dir: &FsPath,
    mut multipart: Multipart,
) -> Result<UploadRequest, AppError> {
    let mut request = UploadRequest::default();

    let result = async {
        while let Some(field) = multipart.next_field().await.map_err(invalid_form)? {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                IMAGE_FIELD if request.file.is_none() && field.file_name().is_some() => {
                    request.file = Some(spool_field(upload_dir, field).await?);
                }
                "usuario_id" => request.usuario_id = Some(field.text().await.map_err(invalid_form)?),
                "genero" => request.genero = Some(field.text().await.map_err(invalid_form)?),
                "tipo" => request.tipo = Some(field.text().await.map_err(invalid_form)?),
                "imagen_url" => request.imagen_url = Some(field.text().await.map_err(invalid_form)?),
                other => tracing::debug!("ignoring multipart field `{}`", other),
            }
        }
        Ok::<(), AppError>(())
    }
    .await;

    if let Err(err) = result {
        if let Some(file) = &request.file {
            file.discard().await;
        }
        return Err(err);
    }
    Ok(request)
}

/// Stream one file field into `{upload_dir}/.upload-{uuid}`.
async fn spool_field(upload_dir: &FsPath, mut field: Field<'_>) -> Result<SpooledFile, AppError> {
    fs::create_dir_all(upload_dir)
        .await
        .map_err(|e| AppError::internal(format!("could not create upload dir: {}", e)))?;

    let spooled = SpooledFile {
        path: upload_dir.join(format!(".upload-{}", Uuid::new_v4())),
        original_name: field.file_name().map(str::to_string),
        content_type: field.content_type().map(str::to_string),
    };

    let write = async {
        let mut file = File::create(&spooled.path)
            .await
            .map_err(|e| AppError::internal(format!("could not spool upload: {}", e)))?;
        let mut size = 0u64;
        while let Some(chunk) = field.chunk().await.map_err(invalid_form)? {
            size += chunk.len() as u64;
            file.write_all(&chunk)
                .await
                .map_err(|e| AppError::internal(format!("could not spool upload: {}", e)))?;
        }
        file.flush()
            .await
            .map_err(|e| AppError::internal(format!("could not spool upload: {}", e)))?;
        Ok::<u64, AppError>(size)
    }
    .await;

    match write {
        Ok(size) => {
            tracing::debug!("spooled {} bytes to {}", size, spooled.path.display());
            Ok(spooled)
        }
        Err(err) => {
            spooled.discard().await;
            Err(err)
        }
    }
}

fn invalid_form(err: MultipartError) -> AppError {
    AppError::Rejected {
        status: err.status(),
        message: err.body_text(),
    }
}
