//! OpenAI-compatible chat completions backend.
//!
//! Works with: OpenAI, OpenRouter, Ollama, vLLM, Together AI, Groq, and any
//! endpoint exposing `/v1/chat/completions`.
//!
//! The assembled prompt already carries persona, history and web context, so
//! it is sent as a single user message.

use async_trait::async_trait;
use lyria_core::error::GenerationError;
use lyria_core::generation::{GenerationBackend, GenerationParams};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

use crate::http;

pub struct OpenAiCompatBackend {
    id: String,
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAiCompatBackend {
    /// Create a new OpenAI-compatible backend.
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            id: id.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            client: http::client(timeout)?,
        })
    }

    fn request_body(&self, prompt: &str, params: &GenerationParams) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": params.temperature,
            "top_p": params.top_p,
            "max_tokens": params.max_new_tokens,
            "stream": false,
        });

        if !params.stop.is_empty() {
            body["stop"] = serde_json::json!(params.stop);
        }

        body
    }
}

/// Extract the first choice's text from a chat completions payload.
pub fn extract_choice_text(body: &str) -> Result<String, GenerationError> {
    let api_response: ApiResponse = serde_json::from_str(body).map_err(|e| {
        GenerationError::MalformedResponse(format!("Failed to parse response: {e}"))
    })?;

    let choice = api_response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::MalformedResponse("No choices in response".into()))?;

    choice
        .message
        .content
        .ok_or_else(|| GenerationError::MalformedResponse("Choice has no content".into()))
}

#[async_trait]
impl GenerationBackend for OpenAiCompatBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url);

        debug!(backend = %self.id, model = %self.model, "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.request_body(prompt, params))
            .send()
            .await
            .map_err(http::transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(http::transport_error)?;

        if status != 200 {
            warn!(backend = %self.id, status, "Backend returned error");
            return Err(http::status_error(status, body));
        }

        extract_choice_text(&body)
    }
}

// ── OpenAI API wire types ─────────────────────────────────────────────────

#[derive(Deserialize)]
struct ApiResponse {
    #[serde(default)]
    choices: Vec<ApiChoice>,
}

#[derive(Deserialize)]
struct ApiChoice {
    message: ApiMessage,
}

#[derive(Deserialize)]
struct ApiMessage {
    #[serde(default)]
    content: Option<String>,
}
