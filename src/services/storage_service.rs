//! src/services/storage_service.rs
//!
//! Object storage seam plus the local-disk backend. Payloads live under
//! `base_path/{shard}/{shard}/{key}` and are served back through
//! `GET /files/{key}`, so the public URL of every object ends with its key.

use crate::errors::{ProviderError, ProviderResult};
use async_trait::async_trait;
use bytes::Bytes;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
};
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::debug;
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

/// Storage for original and background-removed images.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Store `data` under `key`. Existing keys are not overwritten.
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> ProviderResult<()>;

    /// Public URL an object is (or would be) reachable at.
    fn public_url(&self, key: &str) -> String;

    async fn delete(&self, key: &str) -> ProviderResult<()>;
}

/// Storage key of an object given its public URL: the final path segment,
/// percent-decoded.
pub fn key_from_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let segment = path.rsplit('/').next().filter(|key| !key.is_empty())?;
    let key = urlencoding::decode(segment).ok()?.into_owned();
    Some(key)
}

/// Encode a key as a single URL path segment, so `?`, `#` and `/` stay
/// part of the key.
pub fn encode_key(key: &str) -> String {
    urlencoding::encode(key).into_owned()
}

/// Reject keys that could escape the storage root.
pub fn ensure_key_safe(key: &str) -> ProviderResult<()> {
    if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
        return Err(ProviderError::InvalidKey);
    }
    if key.starts_with('/') || key.contains("..") {
        return Err(ProviderError::InvalidKey);
    }
    if key
        .bytes()
        .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
    {
        return Err(ProviderError::InvalidKey);
    }
    Ok(())
}

/// Guess a content type from the key's extension, for serving local files.
pub fn content_type_for_key(key: &str) -> &'static str {
    let ext = key
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "heic" => "image/heic",
        _ => "application/octet-stream",
    }
}

/// Disk-backed [`ObjectStorage`] for development and single-node setups.
#[derive(Clone, Debug)]
pub struct LocalStorage {
    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// Externally reachable origin of this server, e.g. `http://localhost:5001`.
    pub public_base_url: String,
}

impl LocalStorage {
    pub fn new(base_path: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Two-level shard for a key: the first two bytes of MD5(key) as hex.
    fn object_shards(key: &str) -> (String, String) {
        let digest = md5::compute(key);
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(key);
        let mut path = self.base_path.clone();
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    /// Open an object for streaming out.
    pub async fn open(&self, key: &str) -> ProviderResult<File> {
        ensure_key_safe(key)?;
        let path = self.object_path(key);
        File::open(&path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                ProviderError::NotFound(key.to_string())
            } else {
                ProviderError::Io(err)
            }
        })
    }

    /// Remove empty shard directories up to (not including) `stop`.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

#[async_trait]
impl ObjectStorage for LocalStorage {
    /// Writes to a temp file, fsyncs, then renames into place.
    async fn upload(&self, key: &str, data: Bytes, _content_type: &str) -> ProviderResult<()> {
        ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        if fs::try_exists(&file_path).await? {
            return Err(ProviderError::Storage(format!(
                "object `{}` already exists",
                key
            )));
        }

        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            io::Error::new(ErrorKind::Other, "object path missing parent directory")
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let write = async {
            let mut file = File::create(&tmp_path).await?;
            file.write_all(&data).await?;
            file.flush().await?;
            file.sync_all().await?;
            fs::rename(&tmp_path, &file_path).await
        };
        if let Err(err) = write.await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(ProviderError::Io(err));
        }

        debug!("stored {} ({} bytes) at {}", key, data.len(), file_path.display());
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/files/{}", self.public_base_url, encode_key(key))
    }

    async fn delete(&self, key: &str) -> ProviderResult<()> {
        ensure_key_safe(key)?;
        let file_path = self.object_path(key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            Err(err) => return Err(ProviderError::Io(err)),
        }

        if let Some(parent) = file_path.parent() {
            self.prune_empty_dirs(parent, &self.base_path).await;
        }
        Ok(())
    }
}
