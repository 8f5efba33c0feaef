//! Background removal through the remove.bg HTTP API.

use crate::errors::{ProviderError, ProviderResult};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, multipart::Form};

pub const REMOVE_BG_URL: &str = "https://api.remove.bg/v1.0/removebg";

#[async_trait]
pub trait BackgroundRemover: Send + Sync {
    /// PNG bytes of the image at `image_url` with its background removed.
    async fn remove_background(&self, image_url: &str) -> ProviderResult<Bytes>;
}

pub struct RemoveBgClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl RemoveBgClient {
    pub fn new(client: Client, endpoint: impl Into<String>, api_key: String) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[async_trait]
impl BackgroundRemover for RemoveBgClient {
    async fn remove_background(&self, image_url: &str) -> ProviderResult<Bytes> {
        let form = Form::new()
            .text("image_url", image_url.to_string())
            .text("size", "auto");

        let resp = self
            .client
            .post(&self.endpoint)
            .header("X-Api-Key", &self.api_key)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            tracing::error!("remove.bg rejected {}: {} {}", image_url, status, body);
            return Err(ProviderError::BackgroundRemoval { status, body });
        }

        let bytes = resp.bytes().await?;
        tracing::debug!("remove.bg returned {} bytes for {}", bytes.len(), image_url);
        Ok(bytes)
    }
}
