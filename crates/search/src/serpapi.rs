//! SerpApi Google search provider.
//!
//! `GET https://serpapi.com/search?q=…&hl=pt-br&gl=br&api_key=…` and read
//! `organic_results[].{title, link, snippet}`.

use async_trait::async_trait;
use lyria_core::error::SearchError;
use lyria_core::search::{SearchHit, SearchProvider};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub struct SerpApiProvider {
    endpoint: String,
    api_key: String,
    language: String,
    country: String,
    client: reqwest::Client,
}

impl SerpApiProvider {
    pub fn new(
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SearchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SearchError::NotConfigured(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            language: "pt-br".into(),
            country: "br".into(),
            client,
        })
    }

    /// Override the `hl` / `gl` locale parameters.
    pub fn with_locale(mut self, language: impl Into<String>, country: impl Into<String>) -> Self {
        self.language = language.into();
        self.country = country.into();
        self
    }

    /// Query string for one search. `num` asks the provider to cap results too.
    fn query_params(&self, query: &str, limit: usize) -> Vec<(&'static str, String)> {
        vec![
            ("q", query.to_string()),
            ("hl", self.language.clone()),
            ("gl", self.country.clone()),
            ("num", limit.to_string()),
            ("api_key", self.api_key.clone()),
        ]
    }
}

/// Parse a SerpApi response body into at most `limit` hits.
pub fn parse_results(body: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
    let response: SerpResponse =
        serde_json::from_str(body).map_err(|e| SearchError::Parse(e.to_string()))?;

    if let Some(error) = response.error {
        return Err(SearchError::Request(error));
    }

    Ok(response
        .organic_results
        .into_iter()
        .take(limit)
        .map(|r| SearchHit {
            title: r.title,
            url: r.link,
            snippet: r.snippet,
        })
        .collect())
}

#[async_trait]
impl SearchProvider for SerpApiProvider {
    fn name(&self) -> &str {
        "serpapi"
    }

    async fn search(
        &self,
        query: &str,
        limit: usize,
    ) -> std::result::Result<Vec<SearchHit>, SearchError> {
        debug!(provider = "serpapi", query_chars = query.chars().count(), "Searching");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&self.query_params(query, limit))
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        if !(200..300).contains(&status) {
            return Err(SearchError::Status(status));
        }

        let body = response
            .text()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        parse_results(&body, limit)
    }
}

// ── SerpApi wire types ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct SerpResponse {
    #[serde(default)]
    organic_results: Vec<OrganicResult>,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OrganicResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    snippet: Option<String>,
}
