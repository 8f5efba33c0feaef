//! WardrobeService — the garment pipeline and its companion operations.
//!
//! Upload: intake → storage upload → background removal → vision
//! classification → one or many inserts. Every step depends on the one
//! before it, so they run strictly in sequence; only the per-garment inserts
//! of a multi-garment photo run concurrently.

use crate::{
    errors::AppError,
    models::{
        detection::{DetectedGarment, NO_GARMENT_DESCRIPTION, extract_detections},
        garment::{DEFAULT_GENERO, DEFAULT_TIPO, Garment, NewGarment},
    },
    services::{
        background_removal::BackgroundRemover,
        completion::{CompletionClient, CompletionRequest},
        garment_store::GarmentStore,
        storage_service::{ObjectStorage, key_from_url},
    },
};
use bytes::Bytes;
use chrono::Utc;
use futures::future::try_join_all;
use serde::Serialize;
use std::{path::PathBuf, sync::Arc};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

pub const CLASSIFY_PROMPT: &str =
    r#"Devuelve JSON {"prendas":[{"nombre":"","color":"","tipo":""}]} según la imagen."#;
pub const ADVISOR_PERSONA: &str = "Eres un asesor de moda profesional.";
pub const NO_ANSWER: &str = "Sin respuesta";

const COMPLETION_MAX_TOKENS: u32 = 300;
const CLASSIFY_TEMPERATURE: f64 = 0.0;
const ADVICE_TEMPERATURE: f64 = 0.7;

/// A multipart file field spooled to disk for the duration of one request.
#[derive(Debug)]
pub struct SpooledFile {
    pub path: PathBuf,
    pub original_name: Option<String>,
    pub content_type: Option<String>,
}

impl SpooledFile {
    /// Extension of the original file name, if it has one.
    pub fn extension(&self) -> Option<&str> {
        self.original_name
            .as_deref()?
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && !ext.contains('/'))
    }

    /// Remove the spooled copy. Missing files are ignored.
    pub async fn discard(&self) {
        if let Err(err) = fs::remove_file(&self.path).await {
            if err.kind() != std::io::ErrorKind::NotFound {
                warn!("could not remove temp upload {}: {}", self.path.display(), err);
            }
        }
    }
}

/// Inputs of `POST /api/subir-prenda`. Blank text fields count as absent.
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub usuario_id: Option<String>,
    pub genero: Option<String>,
    pub tipo: Option<String>,
    pub imagen_url: Option<String>,
    pub file: Option<SpooledFile>,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(untagged)]
pub enum UploadOutcome {
    /// Several garments in one photo, each stored as its own record.
    Outfit {
        mensaje: String,
        #[serde(rename = "prendasDetectadas")]
        prendas_detectadas: Vec<DetectedGarment>,
    },
    /// Zero or one garment, stored as a single record.
    Single {
        mensaje: String,
        descripcion: String,
        #[serde(rename = "prendasDetectadas")]
        prendas_detectadas: Vec<DetectedGarment>,
        imagen_url: String,
    },
}

#[derive(Clone)]
pub struct WardrobeService {
    pub storage: Arc<dyn ObjectStorage>,
    pub background: Arc<dyn BackgroundRemover>,
    pub completions: Arc<dyn CompletionClient>,
    pub store: Arc<dyn GarmentStore>,
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl WardrobeService {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        background: Arc<dyn BackgroundRemover>,
        completions: Arc<dyn CompletionClient>,
        store: Arc<dyn GarmentStore>,
    ) -> Self {
        Self {
            storage,
            background,
            completions,
            store,
        }
    }

    /// Run the full upload pipeline for one request.
    pub async fn upload_garment(&self, req: UploadRequest) -> Result<UploadOutcome, AppError> {
        let Some(usuario_id) = non_blank(req.usuario_id) else {
            if let Some(file) = &req.file {
                file.discard().await;
            }
            return Err(AppError::missing("usuario_id"));
        };
        let genero = non_blank(req.genero).unwrap_or_else(|| DEFAULT_GENERO.to_string());
        let tipo = non_blank(req.tipo).unwrap_or_else(|| DEFAULT_TIPO.to_string());

        let working_url = match req.file {
            Some(file) => Some(self.store_original(&usuario_id, file).await?),
            None => non_blank(req.imagen_url),
        };
        let Some(working_url) = working_url else {
            return Err(AppError::MissingImage);
        };

        info!("removing background of {}", working_url);
        let clean = self.background.remove_background(&working_url).await?;

        let clean_key = format!("{}_{}_clean.png", usuario_id, Utc::now().timestamp_millis());
        self.storage.upload(&clean_key, clean, "image/png").await?;
        let clean_url = self.storage.public_url(&clean_key);
        info!("clean image uploaded: {}", clean_url);

        let detections = self.classify(&clean_url).await?;

        if detections.len() > 1 {
            let inserts = detections.iter().map(|garment| {
                self.store.insert(NewGarment {
                    usuario_id: usuario_id.clone(),
                    tipo: DEFAULT_TIPO.to_string(),
                    genero: genero.clone(),
                    imagen_url: clean_url.clone(),
                    descripcion: garment.description(),
                    metadata_ia: garment.to_value(),
                    created_at: Utc::now(),
                })
            });
            try_join_all(inserts).await?;
            info!("stored {} garments from one outfit for {}", detections.len(), usuario_id);

            return Ok(UploadOutcome::Outfit {
                mensaje: "Outfit detectado, prendas guardadas individualmente.".into(),
                prendas_detectadas: detections,
            });
        }

        let descripcion = detections
            .first()
            .map(DetectedGarment::description)
            .unwrap_or_else(|| NO_GARMENT_DESCRIPTION.to_string());
        let metadata_ia = serde_json::Value::Array(
            detections.iter().map(DetectedGarment::to_value).collect(),
        );

        self.store
            .insert(NewGarment {
                usuario_id,
                tipo,
                genero,
                imagen_url: clean_url.clone(),
                descripcion: descripcion.clone(),
                metadata_ia,
                created_at: Utc::now(),
            })
            .await?;

        Ok(UploadOutcome::Single {
            mensaje: "Prenda analizada correctamente.".into(),
            descripcion,
            prendas_detectadas: detections,
            imagen_url: clean_url,
        })
    }

    /// Upload the caller's original file and return its public URL. The
    /// spooled copy is removed whatever the upload outcome.
    async fn store_original(&self, usuario_id: &str, file: SpooledFile) -> Result<String, AppError> {
        let key = match file.extension() {
            Some(ext) => format!("{}_{}.{}", usuario_id, Utc::now().timestamp_millis(), ext),
            None => format!("{}_{}", usuario_id, Utc::now().timestamp_millis()),
        };
        let content_type = file
            .content_type
            .clone()
            .unwrap_or_else(|| "application/octet-stream".to_string());

        let uploaded = match fs::read(&file.path).await {
            Ok(data) => self.storage.upload(&key, Bytes::from(data), &content_type).await,
            Err(err) => Err(err.into()),
        };
        file.discard().await;
        uploaded?;

        debug!("original upload stored as {}", key);
        Ok(self.storage.public_url(&key))
    }

    /// Ask the vision model what is in the image. Unparseable output means
    /// no detections, never an error.
    async fn classify(&self, image_url: &str) -> Result<Vec<DetectedGarment>, AppError> {
        let raw = self
            .completions
            .complete(CompletionRequest {
                system: None,
                prompt: CLASSIFY_PROMPT.to_string(),
                image_url: Some(image_url.to_string()),
                max_tokens: COMPLETION_MAX_TOKENS,
                temperature: CLASSIFY_TEMPERATURE,
            })
            .await?
            .unwrap_or_default();

        match extract_detections(&raw) {
            Ok(detections) => Ok(detections),
            Err(err) => {
                warn!("could not parse AI JSON ({}): {}", err, raw);
                Ok(Vec::new())
            }
        }
    }

    /// Records of a user, newest first.
    pub async fn list_garments(
        &self,
        usuario_id: Option<String>,
        tipo: Option<String>,
    ) -> Result<Vec<Garment>, AppError> {
        let usuario_id = non_blank(usuario_id).ok_or_else(|| AppError::missing("usuario_id"))?;
        let garments = self.store.list(&usuario_id, tipo.as_deref()).await?;
        Ok(garments)
    }

    /// Delete a record and, best-effort, its cleaned image.
    ///
    /// Unknown ids succeed without touching storage.
    pub async fn delete_garment(&self, id: &str) -> Result<(), AppError> {
        let Ok(id) = Uuid::parse_str(id) else {
            debug!("delete of non-uuid id `{}` matches nothing", id);
            return Ok(());
        };

        let image_url = match self.store.image_url(id).await {
            Ok(url) => url,
            Err(err) => {
                warn!("lookup of garment {} failed, skipping storage delete: {}", id, err);
                None
            }
        };

        if let Some(key) = image_url.as_deref().and_then(key_from_url) {
            // storage failures never block the row deletion
            if let Err(err) = self.storage.delete(&key).await {
                warn!("storage delete of {} failed: {}", key, err);
            }
        }

        self.store.delete(id).await?;
        info!("garment {} deleted", id);
        Ok(())
    }

    /// Ask the advisor persona about the user's wardrobe.
    pub async fn fashion_advice(
        &self,
        usuario_id: Option<String>,
        mensaje: Option<String>,
    ) -> Result<String, AppError> {
        let (Some(usuario_id), Some(mensaje)) = (non_blank(usuario_id), non_blank(mensaje)) else {
            return Err(AppError::MissingParameter("Faltan datos.".into()));
        };

        let contexto = self
            .store
            .summaries(&usuario_id)
            .await?
            .iter()
            .map(|summary| summary.context_line())
            .collect::<Vec<_>>()
            .join("\n");

        let answer = self
            .completions
            .complete(CompletionRequest {
                system: Some(ADVISOR_PERSONA.to_string()),
                prompt: format!(
                    "Estas son las prendas del usuario:\n{}\n\nPregunta: {}",
                    contexto, mensaje
                ),
                image_url: None,
                max_tokens: COMPLETION_MAX_TOKENS,
                temperature: ADVICE_TEMPERATURE,
            })
            .await?;

        Ok(answer
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| NO_ANSWER.to_string()))
    }
}
