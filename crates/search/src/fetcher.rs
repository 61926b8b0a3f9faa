//! Web context fetcher.
//!
//! Turns a search into a short snippet string for the prompt. Every failure
//! mode (provider error, timeout, no usable snippets) collapses to `None`.

use lyria_core::error::SearchError;
use lyria_core::search::{SearchHit, SearchProvider};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default outer deadline for one fetch.
pub const DEFAULT_DEADLINE: Duration = Duration::from_secs(5);

pub struct WebContextFetcher {
    provider: Arc<dyn SearchProvider>,
    deadline: Duration,
    max_snippets: usize,
    max_chars: usize,
}

impl WebContextFetcher {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self {
            provider,
            deadline: DEFAULT_DEADLINE,
            max_snippets: 2,
            max_chars: 500,
        }
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn with_max_snippets(mut self, max_snippets: usize) -> Self {
        self.max_snippets = max_snippets.max(1);
        self
    }

    pub fn with_max_chars(mut self, max_chars: usize) -> Self {
        self.max_chars = max_chars;
        self
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    async fn search_within_deadline(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SearchHit>, SearchError> {
        tokio::time::timeout(self.deadline, self.provider.search(query, limit))
            .await
            .unwrap_or_else(|_| Err(SearchError::Timeout(self.deadline.as_millis() as u64)))
    }

    /// Fetch a context string for `query`. Never errors.
    pub async fn fetch(&self, query: &str) -> Option<String> {
        // Some results carry no snippet; over-fetch so two usable ones remain.
        let limit = self.max_snippets * 2;

        let hits = match self.search_within_deadline(query, limit).await {
            Ok(hits) => hits,
            Err(e) => {
                warn!(provider = %self.provider.name(), error = %e, "Web search failed");
                return None;
            }
        };

        let joined = hits
            .iter()
            .filter_map(|h| h.snippet.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .take(self.max_snippets)
            .collect::<Vec<_>>()
            .join(" ");

        let context = truncate_chars(&joined, self.max_chars).trim_end();
        if context.is_empty() {
            debug!(hits = hits.len(), "No usable snippets");
            return None;
        }

        debug!(chars = context.chars().count(), "Web context fetched");
        Some(context.to_string())
    }
}

/// Prefix of `s` with at most `max` characters.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tokio::time::Instant;

    struct StubProvider {
        result: Result<Vec<SearchHit>, SearchError>,
        last_limit: Mutex<Option<usize>>,
    }

    impl StubProvider {
        fn ok(snippets: &[Option<&str>]) -> Self {
            let hits = snippets
                .iter()
                .enumerate()
                .map(|(i, s)| SearchHit {
                    title: format!("r{i}"),
                    url: format!("https://example.org/{i}"),
                    snippet: s.map(String::from),
                })
                .collect();
            Self {
                result: Ok(hits),
                last_limit: Mutex::new(None),
            }
        }

        fn err(e: SearchError) -> Self {
            Self {
                result: Err(e),
                last_limit: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl SearchProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn search(
            &self,
            _query: &str,
            limit: usize,
        ) -> std::result::Result<Vec<SearchHit>, SearchError> {
            *self.last_limit.lock().unwrap() = Some(limit);
            self.result.clone()
        }
    }

    struct HangingProvider;

    #[async_trait]
    impl SearchProvider for HangingProvider {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn search(
            &self,
            _query: &str,
            _limit: usize,
        ) -> std::result::Result<Vec<SearchHit>, SearchError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn joins_first_two_snippets() {
        let provider = Arc::new(StubProvider::ok(&[
            Some("Dólar fecha em alta."),
            Some("  Ibovespa sobe 1%.  "),
            Some("Terceiro resultado."),
        ]));
        let fetcher = WebContextFetcher::new(provider.clone());

        let ctx = fetcher.fetch("cotação do dólar hoje").await;
        assert_eq!(ctx.as_deref(), Some("Dólar fecha em alta. Ibovespa sobe 1%."));
        assert_eq!(*provider.last_limit.lock().unwrap(), Some(4));
    }

    #[tokio::test]
    async fn skips_empty_snippets() {
        let provider = Arc::new(StubProvider::ok(&[None, Some("   "), Some("útil")]));
        let ctx = WebContextFetcher::new(provider).fetch("q").await;
        assert_eq!(ctx.as_deref(), Some("útil"));
    }

    #[tokio::test]
    async fn no_snippets_is_none() {
        let provider = Arc::new(StubProvider::ok(&[None, Some("")]));
        assert!(WebContextFetcher::new(provider).fetch("q").await.is_none());
        let empty = Arc::new(StubProvider::ok(&[]));
        assert!(WebContextFetcher::new(empty).fetch("q").await.is_none());
    }

    #[tokio::test]
    async fn provider_error_is_none() {
        let provider = Arc::new(StubProvider::err(SearchError::Status(401)));
        assert!(WebContextFetcher::new(provider).fetch("q").await.is_none());
    }

    #[tokio::test]
    async fn trims_to_max_chars_on_char_boundary() {
        let provider = Arc::new(StubProvider::ok(&[Some("ação ação ação")]));
        let ctx = WebContextFetcher::new(provider)
            .with_max_chars(6)
            .fetch("q")
            .await;
        assert_eq!(ctx.as_deref(), Some("ação a"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_none_within_deadline() {
        let fetcher = WebContextFetcher::new(Arc::new(HangingProvider))
            .with_deadline(Duration::from_millis(500));

        let start = Instant::now();
        assert!(fetcher.fetch("q").await.is_none());
        assert!(start.elapsed() <= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn hung_search_reports_timeout_error() {
        let fetcher = WebContextFetcher::new(Arc::new(HangingProvider))
            .with_deadline(Duration::from_millis(750));

        match fetcher.search_within_deadline("q", 4).await {
            Err(SearchError::Timeout(ms)) => assert_eq!(ms, 750),
            other => panic!("Expected Timeout, got: {other:?}"),
        }
    }
}
