use crate::services::{background_removal::REMOVE_BG_URL, completion};
use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use std::{env, fmt};

const DEFAULT_PORT: u16 = 5001;
const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Where garment images are stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StorageBackend {
    Supabase,
    Local,
}

#[derive(Clone, PartialEq)]
pub enum StorageConfig {
    Supabase {
        url: String,
        service_key: String,
        bucket: String,
    },
    Local {
        dir: String,
        public_base_url: String,
    },
}

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone, PartialEq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub upload_dir: String,
    pub max_upload_bytes: usize,
    pub storage: StorageConfig,
    pub removebg_url: String,
    pub removebg_api_key: String,
    pub openai_base_url: String,
    pub openai_api_key: String,
    pub openai_model: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Wardrobe backend: garment upload, classification and advice")]
pub struct Args {
    /// Host to bind to (overrides HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Database URL (overrides DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Directory for temporary multipart uploads (overrides UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<String>,

    /// Storage backend for images (overrides STORAGE_BACKEND)
    #[arg(long, value_enum)]
    pub storage_backend: Option<StorageBackend>,

    /// Directory for the local storage backend (overrides STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse `.env`, environment variables and CLI args into AppConfig and
    /// the migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        dotenvy::dotenv().ok();

        // Parse CLI once
        let args = Args::parse();
        let migrate = args.migrate;
        let cfg = Self::resolve(args, |name| env::var(name).ok())?;
        Ok((cfg, migrate))
    }

    /// Merge CLI args over values read through `var`, over defaults.
    pub fn resolve(args: Args, var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| var(name).filter(|v| !v.trim().is_empty());
        let required = |name: &str| {
            var(name).with_context(|| format!("missing required environment variable {}", name))
        };

        let env_port = match var("PORT") {
            Some(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing PORT value `{}`", value))?,
            None => DEFAULT_PORT,
        };
        let port = args.port.unwrap_or(env_port);

        let max_upload_bytes = match var("MAX_UPLOAD_BYTES") {
            Some(value) => value
                .parse::<usize>()
                .with_context(|| format!("parsing MAX_UPLOAD_BYTES value `{}`", value))?,
            None => DEFAULT_MAX_UPLOAD_BYTES,
        };

        let backend = match args.storage_backend {
            Some(backend) => backend,
            None => match var("STORAGE_BACKEND").as_deref() {
                None => StorageBackend::Supabase,
                Some(value) => StorageBackend::from_str(value, true).map_err(|_| {
                    anyhow::anyhow!("unknown STORAGE_BACKEND `{}` (expected supabase or local)", value)
                })?,
            },
        };

        let storage = match backend {
            StorageBackend::Supabase => StorageConfig::Supabase {
                url: required("SUPABASE_URL")?,
                service_key: required("SUPABASE_SERVICE_KEY")?,
                bucket: var("STORAGE_BUCKET").unwrap_or_else(|| "prendas".into()),
            },
            StorageBackend::Local => StorageConfig::Local {
                dir: args
                    .storage_dir
                    .or_else(|| var("STORAGE_DIR"))
                    .unwrap_or_else(|| "./data/objects".into()),
                public_base_url: var("PUBLIC_BASE_URL")
                    .unwrap_or_else(|| format!("http://localhost:{}", port)),
            },
        };

        if max_upload_bytes == 0 {
            bail!("MAX_UPLOAD_BYTES must be greater than zero");
        }

        Ok(Self {
            host: args
                .host
                .or_else(|| var("HOST"))
                .unwrap_or_else(|| "0.0.0.0".into()),
            port,
            database_url: args
                .database_url
                .or_else(|| var("DATABASE_URL"))
                .unwrap_or_else(|| "sqlite://./data/wardrobe.db".into()),
            upload_dir: args
                .upload_dir
                .or_else(|| var("UPLOAD_DIR"))
                .unwrap_or_else(|| "uploads".into()),
            max_upload_bytes,
            storage,
            removebg_url: var("REMOVEBG_URL").unwrap_or_else(|| REMOVE_BG_URL.into()),
            removebg_api_key: required("REMOVEBG_API_KEY")?,
            openai_base_url: var("OPENAI_BASE_URL")
                .unwrap_or_else(|| completion::DEFAULT_BASE_URL.into()),
            openai_api_key: required("OPENAI_API_KEY")?,
            openai_model: var("OPENAI_MODEL").unwrap_or_else(|| completion::DEFAULT_MODEL.into()),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// Credentials are never printed; the config is logged at startup.
impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database_url", &self.database_url)
            .field("upload_dir", &self.upload_dir)
            .field("max_upload_bytes", &self.max_upload_bytes)
            .field("storage", &self.storage)
            .field("removebg_url", &self.removebg_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("openai_model", &self.openai_model)
            .finish_non_exhaustive()
    }
}

impl fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageConfig::Supabase { url, bucket, .. } => f
                .debug_struct("Supabase")
                .field("url", url)
                .field("bucket", bucket)
                .finish_non_exhaustive(),
            StorageConfig::Local {
                dir,
                public_base_url,
            } => f
                .debug_struct("Local")
                .field("dir", dir)
                .field("public_base_url", public_base_url)
                .finish(),
        }
    }
}
