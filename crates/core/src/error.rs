//! Error types for the Lyria domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error enum. None of these ever reach the
//! caller of the orchestrator: generation errors drive the dispatcher's
//! fallback chain and search errors collapse to "no web context".

use thiserror::Error;

/// How the dispatcher should react to a failed backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient: retry the same backend (after backoff) while attempts remain.
    Retryable,
    /// Permanent: skip straight to the next backend.
    Fatal,
}

#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Model is loading, estimated {estimated_secs:.0}s")]
    ModelLoading { estimated_secs: f64 },

    #[error("Rate limited by backend, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Unexpected response shape: {0}")]
    MalformedResponse(String),

    #[error("Backend returned no usable text")]
    EmptyResponse,

    #[error("Backend not configured: {0}")]
    NotConfigured(String),
}

impl GenerationError {
    /// Default classification used by backends that don't override
    /// [`crate::GenerationBackend::classify_error`].
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::ModelLoading { .. }
            | Self::RateLimited { .. }
            | Self::Timeout(_)
            | Self::Network(_) => ErrorClass::Retryable,
            Self::ApiError { status_code, .. } if *status_code >= 500 => ErrorClass::Retryable,
            Self::ApiError { .. }
            | Self::AuthenticationFailed(_)
            | Self::MalformedResponse(_)
            | Self::EmptyResponse
            | Self::NotConfigured(_) => ErrorClass::Fatal,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum SearchError {
    #[error("Search provider not configured: {0}")]
    NotConfigured(String),

    #[error("Search request failed: {0}")]
    Request(String),

    #[error("Search provider returned status {0}")]
    Status(u16),

    #[error("Search timed out after {0}ms")]
    Timeout(u64),

    #[error("Failed to parse search response: {0}")]
    Parse(String),
}
