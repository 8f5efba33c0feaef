//! Represents a classified garment persisted in the `prendas` table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

pub const DEFAULT_TIPO: &str = "prenda";
pub const DEFAULT_GENERO: &str = "unisex";

/// A single garment record.
///
/// Rows are immutable once inserted: there is no update path, only
/// insertion by the upload pipeline and deletion by id.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Garment {
    /// Identifier assigned by the store on insert.
    pub id: Uuid,

    /// Owner of the garment. Not validated against any user table.
    pub usuario_id: String,

    /// Garment category (e.g. "camisa"); `prenda` when unknown.
    pub tipo: String,

    pub genero: String,

    /// Public URL of the background-removed image. Never the original upload.
    pub imagen_url: String,

    /// Human readable summary synthesized from the AI classification.
    pub descripcion: String,

    /// Raw AI classification: one object, or the whole detection array.
    #[sqlx(json)]
    pub metadata_ia: serde_json::Value,

    /// Set by the upload pipeline, not by the store.
    pub created_at: DateTime<Utc>,
}

/// Insert payload; the store assigns `id`.
#[derive(Clone, Debug)]
pub struct NewGarment {
    pub usuario_id: String,
    pub tipo: String,
    pub genero: String,
    pub imagen_url: String,
    pub descripcion: String,
    pub metadata_ia: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// The subset of columns fed to the fashion advisor as context.
#[derive(Serialize, Clone, FromRow, Debug)]
pub struct GarmentSummary {
    pub tipo: Option<String>,
    pub descripcion: String,
    pub genero: Option<String>,
}

impl GarmentSummary {
    /// `• (tipo) descripcion`
    pub fn context_line(&self) -> String {
        let tipo = self
            .tipo
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or("sin tipo");
        format!("• ({}) {}", tipo, self.descripcion)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_line_falls_back_when_tipo_missing() {
        let summary = GarmentSummary {
            tipo: None,
            descripcion: "Camisa (azul) - casual".into(),
            genero: Some("unisex".into()),
        };
        assert_eq!(summary.context_line(), "• (sin tipo) Camisa (azul) - casual");
    }

    #[test]
    fn context_line_uses_tipo() {
        let summary = GarmentSummary {
            tipo: Some("abrigo".into()),
            descripcion: "Parka (negro) - invierno".into(),
            genero: None,
        };
        assert_eq!(summary.context_line(), "• (abrigo) Parka (negro) - invierno");
    }
}
