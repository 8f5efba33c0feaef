//! Chat / vision completions against an OpenAI-compatible API.

use crate::errors::{ProviderError, ProviderResult};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// A single-turn completion request.
#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system: Option<String>,
    pub prompt: String,
    /// Attached as an image part of the user turn (vision mode).
    pub image_url: Option<String>,
    pub max_tokens: u32,
    pub temperature: f64,
}

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Text of the first choice; `None` when the provider returned no content.
    async fn complete(&self, request: CompletionRequest) -> ProviderResult<Option<String>>;
}

pub struct OpenAiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiClient {
    pub fn new(client: Client, base_url: &str, api_key: String, model: String) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    fn body(&self, request: &CompletionRequest) -> ChatRequest {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &request.system {
            messages.push(json!({ "role": "system", "content": system }));
        }

        let content = match &request.image_url {
            Some(url) => json!([
                { "type": "text", "text": request.prompt },
                { "type": "image_url", "image_url": { "url": url } },
            ]),
            None => Value::String(request.prompt.clone()),
        };
        messages.push(json!({ "role": "user", "content": content }));

        ChatRequest {
            model: self.model.clone(),
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Value>,
    max_tokens: u32,
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, request: CompletionRequest) -> ProviderResult<Option<String>> {
        let url = format!("{}/chat/completions", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&self.body(&request))
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Completion(format!("{}: {}", status, body)));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Completion(format!("parse error: {}", e)))?;

        Ok(parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenAiClient {
        OpenAiClient::new(
            Client::new(),
            &server.uri(),
            "sk-test".into(),
            DEFAULT_MODEL.into(),
        )
    }

    fn reply(content: Value) -> ResponseTemplate {
        ResponseTemplate::new(200).set_body_json(json!({
            "choices": [{ "index": 0, "message": { "role": "assistant", "content": content } }]
        }))
    }

    #[tokio::test]
    async fn vision_request_attaches_image_part() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({
                "model": "gpt-4o-mini",
                "max_tokens": 300,
                "temperature": 0.0,
                "messages": [{
                    "role": "user",
                    "content": [
                        { "type": "text", "text": "describe" },
                        { "type": "image_url", "image_url": { "url": "http://cdn/a_clean.png" } }
                    ]
                }]
            })))
            .respond_with(reply(json!("{\"prendas\":[]}")))
            .expect(1)
            .mount(&server)
            .await;

        let text = client(&server)
            .complete(CompletionRequest {
                system: None,
                prompt: "describe".into(),
                image_url: Some("http://cdn/a_clean.png".into()),
                max_tokens: 300,
                temperature: 0.0,
            })
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("{\"prendas\":[]}"));
    }

    #[tokio::test]
    async fn chat_request_sends_system_then_user_with_exact_temperature() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_string_contains("\"temperature\":0.7}"))
            .and(body_partial_json(json!({
                "messages": [
                    { "role": "system", "content": "persona" },
                    { "role": "user", "content": "hola" }
                ]
            })))
            .respond_with(reply(json!("Usa la camisa azul.")))
            .mount(&server)
            .await;

        let text = client(&server)
            .complete(CompletionRequest {
                system: Some("persona".into()),
                prompt: "hola".into(),
                image_url: None,
                max_tokens: 300,
                temperature: 0.7,
            })
            .await
            .unwrap();
        assert_eq!(text.as_deref(), Some("Usa la camisa azul."));
    }

    #[tokio::test]
    async fn null_content_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(reply(Value::Null))
            .mount(&server)
            .await;

        let text = client(&server)
            .complete(CompletionRequest {
                system: None,
                prompt: "x".into(),
                image_url: None,
                max_tokens: 10,
                temperature: 0.0,
            })
            .await
            .unwrap();
        assert_eq!(text, None);
    }

    #[tokio::test]
    async fn error_status_is_completion_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .mount(&server)
            .await;

        let err = client(&server)
            .complete(CompletionRequest {
                system: None,
                prompt: "x".into(),
                image_url: None,
                max_tokens: 10,
                temperature: 0.0,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Completion(ref m) if m.contains("bad key")));
    }
}
