//! Supabase Storage backend, spoken to over its REST API.

use crate::errors::{ProviderError, ProviderResult};
use crate::services::storage_service::{ObjectStorage, encode_key};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header};
use serde_json::json;

pub struct SupabaseStorage {
    client: Client,
    base_url: String,
    service_key: String,
    bucket: String,
}

impl SupabaseStorage {
    pub fn new(client: Client, base_url: &str, service_key: String, bucket: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            service_key,
            bucket,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/{}/{}",
            self.base_url,
            self.bucket,
            encode_key(key)
        )
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        request
            .bearer_auth(&self.service_key)
            .header("apikey", &self.service_key)
    }
}

async fn ensure_success(op: &str, resp: reqwest::Response) -> ProviderResult<()> {
    if resp.status().is_success() {
        return Ok(());
    }
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    Err(ProviderError::Storage(format!("{} failed ({}): {}", op, status, body)))
}

#[async_trait]
impl ObjectStorage for SupabaseStorage {
    async fn upload(&self, key: &str, data: Bytes, content_type: &str) -> ProviderResult<()> {
        let size = data.len();
        let resp = self
            .authorized(self.client.post(self.object_url(key)))
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "max-age=3600")
            .header("x-upsert", "false")
            .body(data)
            .send()
            .await?;
        ensure_success("upload", resp).await?;

        tracing::info!("Supabase upload: bucket={}, key={}, size={}", self.bucket, key, size);
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{}/{}",
            self.base_url,
            self.bucket,
            encode_key(key)
        )
    }

    async fn delete(&self, key: &str) -> ProviderResult<()> {
        let url = format!("{}/storage/v1/object/{}", self.base_url, self.bucket);
        let resp = self
            .authorized(self.client.delete(url))
            .json(&json!({ "prefixes": [key] }))
            .send()
            .await?;
        ensure_success("delete", resp).await?;

        tracing::info!("Supabase delete: bucket={}, key={}", self.bucket, key);
        Ok(())
    }
}
