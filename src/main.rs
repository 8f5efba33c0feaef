use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, path::Path, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use wardrobe_backend::{
    config::{AppConfig, StorageConfig},
    routes,
    services::{
        background_removal::RemoveBgClient,
        completion::OpenAiClient,
        garment_store::SqliteGarmentStore,
        storage_service::{LocalStorage, ObjectStorage},
        supabase_storage::SupabaseStorage,
        wardrobe_service::WardrobeService,
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!("Starting wardrobe-backend with config: {:?}", cfg);

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let connect_options = SqliteConnectOptions::from_str(db_url)
        .with_context(|| format!("parsing database URL `{}`", db_url))?
        .create_if_missing(true);

    // Create parent directory if needed
    let db_path = connect_options.get_filename();
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }

    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?,
    );

    let store = SqliteGarmentStore::new(db.clone());
    store.migrate().await?;

    // --- Handle migration mode ---
    if migrate {
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Initialize provider clients ---
    let http = reqwest::Client::builder()
        .build()
        .context("Failed to create HTTP client")?;

    let (storage, files): (Arc<dyn ObjectStorage>, Option<LocalStorage>) = match &cfg.storage {
        StorageConfig::Supabase {
            url,
            service_key,
            bucket,
        } => (
            Arc::new(SupabaseStorage::new(
                http.clone(),
                url,
                service_key.clone(),
                bucket.clone(),
            )) as Arc<dyn ObjectStorage>,
            None,
        ),
        StorageConfig::Local {
            dir,
            public_base_url,
        } => {
            if !Path::new(dir).exists() {
                std::fs::create_dir_all(dir)?;
                tracing::info!("Created storage directory at {}", dir);
            }
            let local = LocalStorage::new(dir, public_base_url.clone());
            (Arc::new(local.clone()) as Arc<dyn ObjectStorage>, Some(local))
        }
    };

    let background = Arc::new(RemoveBgClient::new(
        http.clone(),
        cfg.removebg_url.clone(),
        cfg.removebg_api_key.clone(),
    ));
    let completions = Arc::new(OpenAiClient::new(
        http,
        &cfg.openai_base_url,
        cfg.openai_api_key.clone(),
        cfg.openai_model.clone(),
    ));

    let state = AppState {
        wardrobe: WardrobeService::new(storage, background, completions, Arc::new(store)),
        files,
        upload_dir: cfg.upload_dir.clone().into(),
        max_upload_bytes: cfg.max_upload_bytes,
    };

    // --- Build router ---
    let app = routes::app(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Backend listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
