//! Hugging Face Inference API backend.
//!
//! Sends the raw prompt as `inputs` and asks for only the continuation
//! (`return_full_text: false`). The API answers in one of two shapes:
//!
//! ```json
//! [{"generated_text": "..."}]
//! {"generated_text": "..."}
//! ```
//!
//! While a cold model is being loaded it returns HTTP 503 with
//! `{"error": "Model ... is currently loading", "estimated_time": 20.0}`,
//! which maps to the retryable [`GenerationError::ModelLoading`].

use async_trait::async_trait;
use lyria_core::error::GenerationError;
use lyria_core::generation::{GenerationBackend, GenerationParams};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::http;

pub struct HfInferenceBackend {
    id: String,
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl HfInferenceBackend {
    /// Create a backend for a model endpoint such as
    /// `https://api-inference.huggingface.co/models/gpt2`.
    pub fn new(
        id: impl Into<String>,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, GenerationError> {
        Ok(Self {
            id: id.into(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            client: http::client(timeout)?,
        })
    }

    fn request_body(prompt: &str, params: &GenerationParams) -> Value {
        let mut parameters = serde_json::json!({
            "max_new_tokens": params.max_new_tokens,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "return_full_text": false,
        });
        if !params.stop.is_empty() {
            parameters["stop"] = serde_json::json!(params.stop);
        }

        serde_json::json!({
            "inputs": prompt,
            "parameters": parameters,
            "options": { "wait_for_model": true },
        })
    }
}

/// Pull the generated text out of any payload shape the API is known to use.
pub fn extract_generated_text(payload: &Value) -> Result<String, GenerationError> {
    let candidate = match payload {
        Value::Array(items) => items.first().and_then(|first| first.get("generated_text")),
        Value::Object(map) => {
            if let Some(err) = map.get("error") {
                return Err(payload_error(err, map.get("estimated_time")));
            }
            map.get("generated_text")
        }
        _ => None,
    };

    match candidate.and_then(Value::as_str) {
        Some(text) => Ok(text.to_string()),
        None => Err(GenerationError::MalformedResponse(http::truncate_for_log(
            &payload.to_string(),
            200,
        ))),
    }
}

fn payload_error(err: &Value, estimated_time: Option<&Value>) -> GenerationError {
    let message = err
        .as_str()
        .map(String::from)
        .unwrap_or_else(|| err.to_string());

    if message.to_lowercase().contains("loading") {
        GenerationError::ModelLoading {
            estimated_secs: estimated_time.and_then(Value::as_f64).unwrap_or(0.0),
        }
    } else {
        GenerationError::ApiError {
            status_code: 200,
            message,
        }
    }
}

#[async_trait]
impl GenerationBackend for HfInferenceBackend {
    fn id(&self) -> &str {
        &self.id
    }

    async fn invoke(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, GenerationError> {
        debug!(
            backend = %self.id,
            prompt_chars = prompt.chars().count(),
            "Sending inference request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&Self::request_body(prompt, params))
            .send()
            .await
            .map_err(http::transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(http::transport_error)?;

        if status == 503 {
            let estimated_secs = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.get("estimated_time").and_then(Value::as_f64))
                .unwrap_or(0.0);
            return Err(GenerationError::ModelLoading { estimated_secs });
        }

        if !(200..300).contains(&status) {
            warn!(backend = %self.id, status, "Inference API returned error");
            return Err(http::status_error(status, body));
        }

        let payload: Value = serde_json::from_str(&body).map_err(|e| {
            GenerationError::MalformedResponse(format!("Failed to parse response: {e}"))
        })?;

        extract_generated_text(&payload)
    }
}
