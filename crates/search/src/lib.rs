//! Web search for Lyria.
//!
//! [`SerpApiProvider`] implements `lyria_core::SearchProvider`;
//! [`WebContextFetcher`] turns its results into a prompt-ready snippet.

pub mod fetcher;
pub mod serpapi;

pub use fetcher::WebContextFetcher;
pub use serpapi::SerpApiProvider;

use lyria_config::SearchConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Build the fetcher from configuration, reading the key from the environment.
pub fn build_from_config(config: &SearchConfig) -> Option<WebContextFetcher> {
    build_with(config, |name| std::env::var(name).ok())
}

/// Build the fetcher using `lookup` for environment variables.
///
/// Returns `None` when search is disabled or no API key is available; the
/// pipeline then answers without web context.
pub fn build_with(
    config: &SearchConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<WebContextFetcher> {
    if !config.enabled {
        debug!("Web search disabled");
        return None;
    }

    let Some(api_key) = config.resolve_api_key_with(lookup) else {
        warn!(
            env = config.api_key_env.as_deref().unwrap_or("-"),
            "Web search has no API key, continuing without it"
        );
        return None;
    };

    let deadline = Duration::from_millis(config.timeout_ms);
    let provider = match SerpApiProvider::new(&config.api_url, api_key, deadline) {
        Ok(p) => p.with_locale(&config.language, &config.country),
        Err(e) => {
            warn!(error = %e, "Web search unavailable");
            return None;
        }
    };

    Some(
        WebContextFetcher::new(Arc::new(provider))
            .with_deadline(deadline)
            .with_max_snippets(config.max_snippets)
            .with_max_chars(config.max_chars),
    )
}
