//! Shared harness for router-level tests: in-memory provider fakes, an
//! in-memory SQLite store and a hand-rolled multipart body builder.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::sqlite::SqlitePoolOptions;
use std::{
    collections::HashMap,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
};
use tempfile::TempDir;
use uuid::Uuid;
use wardrobe_backend::{
    errors::{ProviderError, ProviderResult},
    models::garment::{Garment, GarmentSummary, NewGarment},
    routes,
    services::{
        background_removal::BackgroundRemover,
        completion::{CompletionClient, CompletionRequest},
        garment_store::{GarmentStore, SqliteGarmentStore, StoreError, StoreResult},
        storage_service::{ObjectStorage, encode_key},
        wardrobe_service::WardrobeService,
    },
    state::AppState,
};

pub const CDN: &str = "https://cdn.test/prendas";
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024;
pub const CLEAN_PNG: &[u8] = b"\x89PNG\r\n\x1a\nclean";

#[derive(Default)]
pub struct MemoryStorage {
    pub objects: Mutex<HashMap<String, (Bytes, String)>>,
    pub deleted: Mutex<Vec<String>>,
    pub fail_uploads: Mutex<bool>,
    /// Fail only uploads whose key ends with this suffix.
    pub fail_uploads_ending: Mutex<Option<String>>,
    pub fail_deletes: Mutex<bool>,
}

impl MemoryStorage {
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<_> = self.objects.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects
            .lock()
            .unwrap()
            .get(key)
            .map(|(_, ct)| ct.clone())
    }
}

#[async_trait]
impl ObjectStorage for MemoryStorage {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> ProviderResult<()> {
        if *self.fail_uploads.lock().unwrap() {
            return Err(ProviderError::Storage("bucket unavailable".into()));
        }
        if let Some(suffix) = self.fail_uploads_ending.lock().unwrap().as_deref() {
            if key.ends_with(suffix) {
                return Err(ProviderError::Storage(format!("upload of {} refused", key)));
            }
        }
        self.objects
            .lock()
            .unwrap()
            .insert(key.to_string(), (data, content_type.to_string()));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", CDN, encode_key(key))
    }

    async fn delete(&self, key: &str) -> ProviderResult<()> {
        self.deleted.lock().unwrap().push(key.to_string());
        if *self.fail_deletes.lock().unwrap() {
            return Err(ProviderError::Storage("delete refused".into()));
        }
        self.objects.lock().unwrap().remove(key);
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeRemover {
    pub calls: Mutex<Vec<String>>,
    pub failure: Mutex<Option<(u16, String)>>,
}

#[async_trait]
impl BackgroundRemover for FakeRemover {
    async fn remove_background(&self, image_url: &str) -> ProviderResult<Bytes> {
        self.calls.lock().unwrap().push(image_url.to_string());
        if let Some((status, body)) = self.failure.lock().unwrap().clone() {
            return Err(ProviderError::BackgroundRemoval { status, body });
        }
        Ok(Bytes::from_static(CLEAN_PNG))
    }
}

#[derive(Default)]
pub struct ScriptedCompletions {
    pub reply: Mutex<Option<String>>,
    pub failure: Mutex<Option<String>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedCompletions {
    pub fn set_reply(&self, reply: Option<&str>) {
        *self.reply.lock().unwrap() = reply.map(str::to_string);
    }
}

#[async_trait]
impl CompletionClient for ScriptedCompletions {
    async fn complete(&self, request: CompletionRequest) -> ProviderResult<Option<String>> {
        self.requests.lock().unwrap().push(request);
        if let Some(message) = self.failure.lock().unwrap().clone() {
            return Err(ProviderError::Completion(message));
        }
        Ok(self.reply.lock().unwrap().clone())
    }
}

/// SQLite store that can be told to fail its n-th insert (1-based).
pub struct FlakyStore {
    pub inner: SqliteGarmentStore,
    pub fail_insert_at: Mutex<Option<usize>>,
    inserts: AtomicUsize,
}

impl FlakyStore {
    pub fn new(inner: SqliteGarmentStore) -> Self {
        Self {
            inner,
            fail_insert_at: Mutex::new(None),
            inserts: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl GarmentStore for FlakyStore {
    async fn insert(&self, garment: NewGarment) -> StoreResult<Garment> {
        let n = self.inserts.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_insert_at.lock().unwrap() == Some(n) {
            return Err(StoreError::Sqlx(sqlx::Error::Protocol(
                "disk I/O error".into(),
            )));
        }
        self.inner.insert(garment).await
    }

    async fn list(&self, usuario_id: &str, tipo: Option<&str>) -> StoreResult<Vec<Garment>> {
        self.inner.list(usuario_id, tipo).await
    }

    async fn summaries(&self, usuario_id: &str) -> StoreResult<Vec<GarmentSummary>> {
        self.inner.summaries(usuario_id).await
    }

    async fn image_url(&self, id: Uuid) -> StoreResult<Option<String>> {
        self.inner.image_url(id).await
    }

    async fn delete(&self, id: Uuid) -> StoreResult<()> {
        self.inner.delete(id).await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.inner.ping().await
    }
}

pub struct Harness {
    pub app: Router,
    pub storage: Arc<MemoryStorage>,
    pub remover: Arc<FakeRemover>,
    pub completions: Arc<ScriptedCompletions>,
    pub store: Arc<FlakyStore>,
    pub upload_dir: TempDir,
    pub max_upload_bytes: usize,
}

impl Harness {
    pub async fn new() -> Self {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let sqlite = SqliteGarmentStore::new(Arc::new(pool));
        sqlite.migrate().await.unwrap();
        let store = Arc::new(FlakyStore::new(sqlite));

        let storage = Arc::new(MemoryStorage::default());
        let remover = Arc::new(FakeRemover::default());
        let completions = Arc::new(ScriptedCompletions::default());
        let upload_dir = tempfile::tempdir().unwrap();

        let state = AppState {
            wardrobe: WardrobeService::new(
                storage.clone(),
                remover.clone(),
                completions.clone(),
                store.clone(),
            ),
            files: None,
            upload_dir: upload_dir.path().to_path_buf(),
            max_upload_bytes: MAX_UPLOAD_BYTES,
        };

        Self {
            app: routes::app(state),
            storage,
            remover,
            completions,
            store,
            upload_dir,
            max_upload_bytes: MAX_UPLOAD_BYTES,
        }
    }

    pub fn spooled_files(&self) -> usize {
        std::fs::read_dir(self.upload_dir.path()).unwrap().count()
    }
}

/// Minimal `multipart/form-data` encoder.
pub struct MultipartBody {
    boundary: &'static str,
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self {
            boundary: "----wardrobe-test-boundary",
            body: Vec::new(),
        }
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, name, value
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                self.boundary, name, filename, content_type
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn into_request(mut self, uri: &str) -> Request<Body> {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        Request::post(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={}", self.boundary),
            )
            .body(Body::from(self.body))
            .unwrap()
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn body_json(body: Body) -> Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}
