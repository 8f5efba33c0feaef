use crate::services::{storage_service::LocalStorage, wardrobe_service::WardrobeService};
use std::path::PathBuf;

/// Shared, immutable state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub wardrobe: WardrobeService,

    /// Set when objects live on local disk and are served by `/files`.
    pub files: Option<LocalStorage>,

    /// Where multipart file fields are spooled during a request.
    pub upload_dir: PathBuf,

    pub max_upload_bytes: usize,
}
