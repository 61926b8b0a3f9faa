//! Search provider trait: ranked web results with optional snippets.

use crate::error::SearchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A single ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    #[serde(default)]
    pub title: String,

    #[serde(default, alias = "link")]
    pub url: String,

    /// Text excerpt, when the provider returned one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

/// A web search API.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Human-readable provider name (e.g., "serpapi").
    fn name(&self) -> &str;

    /// Return at most `limit` results, best first.
    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<SearchHit>, SearchError>;
}
