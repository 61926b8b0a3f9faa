//! Build the fallback chain from configuration.
//!
//! Backends are added in the order they appear in `[[backends]]`. An entry
//! without a resolvable credential is left out of the chain and reported in
//! [`BuiltChain::excluded`] so `lyria doctor` can explain it.

use lyria_config::{AppConfig, BackendConfig, BackendKind};
use lyria_core::generation::GenerationBackend;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::dispatcher::{Dispatcher, RetryPolicy};
use crate::hf_inference::HfInferenceBackend;
use crate::openai_compat::OpenAiCompatBackend;

/// A backend that was configured but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcludedBackend {
    pub id: String,
    pub reason: String,
}

/// The result of building the chain.
pub struct BuiltChain {
    pub dispatcher: Dispatcher,
    /// Ids of the backends in the chain, in priority order
    pub active: Vec<String>,
    pub excluded: Vec<ExcludedBackend>,
}

/// Build the dispatcher, reading credentials from the process environment.
pub fn build_from_config(config: &AppConfig) -> BuiltChain {
    build_with(config, |name| std::env::var(name).ok())
}

/// Build the dispatcher using `lookup` for environment variables.
pub fn build_with(config: &AppConfig, lookup: impl Fn(&str) -> Option<String>) -> BuiltChain {
    let mut dispatcher = Dispatcher::new();
    let mut active = Vec::new();
    let mut excluded = Vec::new();

    for entry in &config.backends {
        match build_backend(entry, &lookup) {
            Ok(backend) => {
                debug!(backend = %entry.id, kind = ?entry.kind, "Backend added to chain");
                dispatcher = dispatcher.add(backend, policy_for(entry));
                active.push(entry.id.clone());
            }
            Err(reason) => {
                warn!(backend = %entry.id, %reason, "Backend excluded from chain");
                excluded.push(ExcludedBackend {
                    id: entry.id.clone(),
                    reason,
                });
            }
        }
    }

    BuiltChain {
        dispatcher,
        active,
        excluded,
    }
}

/// Retry policy for a configured backend.
pub fn policy_for(entry: &BackendConfig) -> RetryPolicy {
    RetryPolicy {
        timeout: Duration::from_secs(entry.timeout_secs),
        max_attempts: entry.max_attempts.max(1),
        backoff: Duration::from_millis(entry.backoff_ms),
    }
}

fn build_backend(
    entry: &BackendConfig,
    lookup: &impl Fn(&str) -> Option<String>,
) -> Result<Arc<dyn GenerationBackend>, String> {
    let api_key = entry.resolve_api_key_with(lookup).ok_or_else(|| match &entry.api_key_env {
        Some(var) => format!("no credential (set {var} or api_key)"),
        None => "no credential (set api_key)".to_string(),
    })?;

    let timeout = Duration::from_secs(entry.timeout_secs);

    let backend: Arc<dyn GenerationBackend> = match entry.kind {
        BackendKind::HfInference => Arc::new(
            HfInferenceBackend::new(&entry.id, &entry.api_url, api_key, timeout)
                .map_err(|e| e.to_string())?,
        ),
        BackendKind::OpenaiCompat => {
            let model = entry
                .model
                .as_deref()
                .ok_or_else(|| "openai_compat backend needs a model".to_string())?;
            Arc::new(
                OpenAiCompatBackend::new(&entry.id, &entry.api_url, api_key, model, timeout)
                    .map_err(|e| e.to_string())?,
            )
        }
    };

    Ok(backend)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(vars: &'static [(&'static str, &'static str)]) -> impl Fn(&str) -> Option<String> {
        move |name| {
            vars.iter()
                .find(|(k, _)| *k == name)
                .map(|(_, v)| v.to_string())
        }
    }

    #[test]
    fn default_chain_with_all_credentials() {
        let config = AppConfig::default();
        let built = build_with(
            &config,
            env(&[("HUGGING_FACE_API_KEY", "hf_x"), ("OPENROUTER_API_KEY", "sk-or-x")]),
        );
        assert_eq!(built.active, vec!["huggingface", "openrouter"]);
        assert!(built.excluded.is_empty());
        assert_eq!(built.dispatcher.backend_ids(), vec!["huggingface", "openrouter"]);
    }

    #[test]
    fn missing_credentials_are_excluded() {
        let config = AppConfig::default();
        let built = build_with(&config, env(&[("OPENROUTER_API_KEY", "sk-or-x")]));
        assert_eq!(built.active, vec!["openrouter"]);
        assert_eq!(built.excluded.len(), 1);
        assert_eq!(built.excluded[0].id, "huggingface");
        assert!(built.excluded[0].reason.contains("HUGGING_FACE_API_KEY"));
    }

    #[test]
    fn no_credentials_yields_empty_chain() {
        let built = build_with(&AppConfig::default(), env(&[]));
        assert!(built.dispatcher.is_empty());
        assert_eq!(built.excluded.len(), 2);
    }

    #[test]
    fn inline_key_wins() {
        let mut config = AppConfig::default();
        config.backends[0].api_key = Some("hf_inline".into());
        let built = build_with(&config, env(&[]));
        assert_eq!(built.active, vec!["huggingface"]);
    }

    #[test]
    fn policy_mirrors_config() {
        let mut entry = AppConfig::default().backends[0].clone();
        entry.max_attempts = 0;
        let policy = policy_for(&entry);
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.timeout, Duration::from_secs(entry.timeout_secs));
        assert_eq!(policy.backoff, Duration::from_millis(entry.backoff_ms));
    }
}
