//! Shared HTTP plumbing for the remote backends.

use lyria_core::error::GenerationError;
use std::time::Duration;

/// Build a client with a per-request timeout.
pub(crate) fn client(timeout: Duration) -> Result<reqwest::Client, GenerationError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| GenerationError::NotConfigured(format!("Failed to create HTTP client: {e}")))
}

/// Map a transport-level failure.
pub(crate) fn transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout(e.to_string())
    } else {
        GenerationError::Network(e.to_string())
    }
}

/// Map a non-success HTTP status to the error taxonomy.
pub(crate) fn status_error(status: u16, body: String) -> GenerationError {
    match status {
        429 => GenerationError::RateLimited {
            retry_after_secs: 5,
        },
        401 | 403 => GenerationError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ),
        _ => GenerationError::ApiError {
            status_code: status,
            message: truncate_for_log(&body, 300),
        },
    }
}

/// Keep error bodies short enough for a log line.
pub(crate) fn truncate_for_log(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
