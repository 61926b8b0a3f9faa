//! Generation backend trait: the abstraction over remote text generators.
//!
//! A backend takes a fully assembled prompt string and returns plain text.
//! Each adapter owns its wire format: whatever shape the remote API responds
//! with, the adapter normalizes it to a `String` before returning, and reports
//! an unrecognized shape as [`GenerationError::MalformedResponse`].
//!
//! Backends are arranged in an ordered chain by configuration; the dispatcher
//! in `lyria-providers` walks that chain without knowing which services are
//! behind it.

use crate::error::{ErrorClass, GenerationError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The `backend_used` value reported when every backend failed.
pub const OFFLINE_BACKEND: &str = "offline";

/// Sampling parameters forwarded to every backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum number of new tokens to generate
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    /// Temperature (0.0 = deterministic)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Nucleus sampling threshold
    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_max_new_tokens() -> u32 {
    512
}
fn default_temperature() -> f32 {
    0.3
}
fn default_top_p() -> f32 {
    0.95
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            temperature: default_temperature(),
            top_p: default_top_p(),
            stop: Vec::new(),
        }
    }
}

/// The outcome of a dispatch: always has text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// The normalized, non-empty answer
    pub text: String,

    /// Id of the backend that produced the text, or [`OFFLINE_BACKEND`]
    pub backend_used: String,
}

impl GenerationResult {
    pub fn is_offline(&self) -> bool {
        self.backend_used == OFFLINE_BACKEND
    }
}

/// The core generation trait.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Stable identifier for this backend (used in logs and results).
    fn id(&self) -> &str;

    /// Generate text for `prompt`. The returned text is already extracted
    /// from the backend's payload.
    async fn invoke(
        &self,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<String, GenerationError>;

    /// Decide whether an error from this backend is worth retrying.
    fn classify_error(&self, error: &GenerationError) -> ErrorClass {
        error.class()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl GenerationBackend for Echo {
        fn id(&self) -> &str {
            "echo"
        }

        async fn invoke(
            &self,
            prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<String, GenerationError> {
            Ok(prompt.to_string())
        }
    }

    #[test]
    fn params_defaults() {
        let params = GenerationParams::default();
        assert_eq!(params.max_new_tokens, 512);
        assert!((params.temperature - 0.3).abs() < f32::EPSILON);
        assert!((params.top_p - 0.95).abs() < f32::EPSILON);
        assert!(params.stop.is_empty());
    }

    #[test]
    fn default_classification_delegates_to_error() {
        let backend = Echo;
        assert_eq!(
            backend.classify_error(&GenerationError::Timeout("x".into())),
            ErrorClass::Retryable
        );
        assert_eq!(
            backend.classify_error(&GenerationError::EmptyResponse),
            ErrorClass::Fatal
        );
    }

    #[tokio::test]
    async fn trait_object_invocation() {
        let backend: Box<dyn GenerationBackend> = Box::new(Echo);
        let out = backend.invoke("hi", &GenerationParams::default()).await.unwrap();
        assert_eq!(out, "hi");
    }

    #[test]
    fn offline_result_flag() {
        let result = GenerationResult {
            text: "x".into(),
            backend_used: OFFLINE_BACKEND.into(),
        };
        assert!(result.is_offline());
    }
}
