//! Conversation history and memory as seen by the pipeline.
//!
//! Both are owned by the caller's storage layer. The pipeline only reads them:
//! history is an ordered slice (most recent last), memory is an opaque value
//! passed through untouched.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One question/answer exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    /// What the user asked
    #[serde(alias = "pergunta")]
    pub question: String,

    /// What the assistant answered
    #[serde(alias = "resposta")]
    pub answer: String,

    /// When the exchange happened
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    /// Create a turn stamped with the current time.
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Caller-supplied long-term memory. Opaque to the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Memory(pub serde_json::Value);

impl Memory {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// `true` for `null`, empty arrays, empty objects and empty strings.
    pub fn is_empty(&self) -> bool {
        match &self.0 {
            serde_json::Value::Null => true,
            serde_json::Value::Array(a) => a.is_empty(),
            serde_json::Value::Object(o) => o.is_empty(),
            serde_json::Value::String(s) => s.is_empty(),
            _ => false,
        }
    }
}
