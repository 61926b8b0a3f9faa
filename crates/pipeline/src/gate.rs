//! Built-in augmentation gates.
//!
//! The production classifier lives outside this crate and plugs in through
//! `lyria_core::AugmentationGate`. These gates cover the CLI and tests.

use lyria_config::{GateConfig, GateMode};
use lyria_core::gate::AugmentationGate;
use std::sync::Arc;

/// Always answers the same way.
#[derive(Debug, Clone, Copy)]
pub struct StaticGate(pub bool);

impl AugmentationGate for StaticGate {
    fn should_augment(&self, _query: &str) -> bool {
        self.0
    }
}

/// Augments when the query contains a time-sensitive keyword.
///
/// Matching is case-insensitive and whole-word: `hoje` matches
/// "O que aconteceu hoje?" but not "hojeriza".
#[derive(Debug, Clone)]
pub struct KeywordGate {
    keywords: Vec<Vec<String>>,
}

impl KeywordGate {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| words(k.as_ref()))
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }
}

impl AugmentationGate for KeywordGate {
    fn should_augment(&self, query: &str) -> bool {
        let query = words(query);
        self.keywords
            .iter()
            .any(|kw| query.windows(kw.len()).any(|w| w == kw.as_slice()))
    }
}

fn words(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Build the gate selected in configuration.
pub fn from_config(config: &GateConfig) -> Arc<dyn AugmentationGate> {
    match config.mode {
        GateMode::Keywords => Arc::new(KeywordGate::new(&config.keywords)),
        GateMode::Always => Arc::new(StaticGate(true)),
        GateMode::Never => Arc::new(StaticGate(false)),
    }
}
