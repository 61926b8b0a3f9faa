//! Configuration loading, validation, and management for Lyria.
//!
//! Loads configuration from `~/.lyria/config.toml` with environment
//! variable overrides. Validates all settings at startup.
//!
//! Credentials are never required: a generation backend whose key can't be
//! resolved is simply left out of the chain when providers are built, and a
//! search provider without a key disables web augmentation.

use lyria_core::generation::GenerationParams;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.lyria/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Persona used when the caller doesn't name one
    #[serde(default = "default_persona")]
    pub default_persona: String,

    /// Sampling parameters and request deadline
    #[serde(default)]
    pub generation: GenerationConfig,

    /// Ordered generation backends (first = primary)
    #[serde(default = "default_backends")]
    pub backends: Vec<BackendConfig>,

    /// Web search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Web augmentation gate settings
    #[serde(default)]
    pub gate: GateConfig,

    /// Prompt size limits
    #[serde(default)]
    pub prompt: PromptBudget,

    /// Interactive chat settings
    #[serde(default)]
    pub chat: ChatConfig,
}

fn default_persona() -> String {
    "professor".into()
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    #[serde(flatten)]
    pub params: GenerationParams,

    /// Upper bound on one dispatch across the whole backend chain.
    /// When it elapses the offline responder answers.
    #[serde(default = "default_request_deadline_secs")]
    pub request_deadline_secs: u64,
}

fn default_request_deadline_secs() -> u64 {
    120
}

/// Largest accepted `generation.request_deadline_secs` (one hour).
pub const MAX_REQUEST_DEADLINE_SECS: u64 = 3600;

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            params: GenerationParams::default(),
            request_deadline_secs: default_request_deadline_secs(),
        }
    }
}

/// Wire protocol spoken by a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Hugging Face Inference API (`inputs` + `parameters`)
    HfInference,
    /// Any OpenAI-compatible `/chat/completions` endpoint
    OpenaiCompat,
}

/// One entry of the generation fallback chain.
#[derive(Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Unique id, reported as `backend_used`
    pub id: String,

    pub kind: BackendKind,

    /// Endpoint URL. For `hf_inference` this is the full model URL;
    /// for `openai_compat` the API base (…/v1).
    pub api_url: String,

    /// Inline credential (takes precedence over `api_key_env`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the credential
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Model name (required by `openai_compat`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Per-attempt timeout
    #[serde(default = "default_backend_timeout_secs")]
    pub timeout_secs: u64,

    /// Attempts before moving on (1 = no retry)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base backoff between attempts; attempt `n` waits `n × backoff_ms`
    #[serde(default = "default_backoff_ms")]
    pub backoff_ms: u64,
}

fn default_backend_timeout_secs() -> u64 {
    60
}
fn default_max_attempts() -> u32 {
    2
}
fn default_backoff_ms() -> u64 {
    1000
}

impl BackendConfig {
    /// Resolve the credential using `lookup` for environment variables.
    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        resolve_secret(&self.api_key, &self.api_key_env, lookup)
    }
}

impl std::fmt::Debug for BackendConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackendConfig")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("api_key_env", &self.api_key_env)
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_attempts", &self.max_attempts)
            .field("backoff_ms", &self.backoff_ms)
            .finish()
    }
}

fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig {
            id: "huggingface".into(),
            kind: BackendKind::HfInference,
            api_url: "https://api-inference.huggingface.co/models/gpt2".into(),
            api_key: None,
            api_key_env: Some("HUGGING_FACE_API_KEY".into()),
            model: None,
            timeout_secs: default_backend_timeout_secs(),
            max_attempts: default_max_attempts(),
            backoff_ms: 2000,
        },
        BackendConfig {
            id: "openrouter".into(),
            kind: BackendKind::OpenaiCompat,
            api_url: "https://openrouter.ai/api/v1".into(),
            api_key: None,
            api_key_env: Some("OPENROUTER_API_KEY".into()),
            model: Some("meta-llama/llama-3.1-8b-instruct".into()),
            timeout_secs: 45,
            max_attempts: default_max_attempts(),
            backoff_ms: default_backoff_ms(),
        },
    ]
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_search_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_search_key_env", skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Interface language (`hl`)
    #[serde(default = "default_language")]
    pub language: String,

    /// Result country (`gl`)
    #[serde(default = "default_country")]
    pub country: String,

    /// Single-attempt deadline; search is best-effort
    #[serde(default = "default_search_timeout_ms")]
    pub timeout_ms: u64,

    /// How many snippets to keep
    #[serde(default = "default_max_snippets")]
    pub max_snippets: usize,

    /// Cap on the joined snippet text, in characters
    #[serde(default = "default_search_max_chars")]
    pub max_chars: usize,
}

fn default_true() -> bool {
    true
}
fn default_search_url() -> String {
    "https://serpapi.com/search".into()
}
fn default_search_key_env() -> Option<String> {
    Some("KEY_SERP_API".into())
}
fn default_language() -> String {
    "pt-br".into()
}
fn default_country() -> String {
    "br".into()
}
fn default_search_timeout_ms() -> u64 {
    5000
}
fn default_max_snippets() -> usize {
    2
}
fn default_search_max_chars() -> usize {
    500
}

impl SearchConfig {
    pub fn resolve_api_key_with(&self, lookup: impl Fn(&str) -> Option<String>) -> Option<String> {
        resolve_secret(&self.api_key, &self.api_key_env, lookup)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: default_search_url(),
            api_key: None,
            api_key_env: default_search_key_env(),
            language: default_language(),
            country: default_country(),
            timeout_ms: default_search_timeout_ms(),
            max_snippets: default_max_snippets(),
            max_chars: default_search_max_chars(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("enabled", &self.enabled)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("api_key_env", &self.api_key_env)
            .field("language", &self.language)
            .field("country", &self.country)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_snippets", &self.max_snippets)
            .field("max_chars", &self.max_chars)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Augment when the query mentions a time-sensitive keyword
    #[default]
    Keywords,
    Always,
    Never,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub mode: GateMode,

    #[serde(default = "default_gate_keywords")]
    pub keywords: Vec<String>,
}

fn default_gate_keywords() -> Vec<String> {
    [
        "hoje", "agora", "atual", "atualmente", "recente", "recentes", "último", "última",
        "notícia", "notícias", "cotação", "preço", "previsão", "placar", "resultado",
        "lançamento", "esta semana", "este ano",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::default(),
            keywords: default_gate_keywords(),
        }
    }
}

/// How the persona text is shortened to fit its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersonaTrim {
    /// Keep only the communication-style section when present
    #[default]
    StyleSection,
    /// Plain left-truncation by character count
    Head,
}

/// Characters every prompt spends on labels and separators, excluding
/// history. Used by [`PromptBudget::validate`].
pub const FRAMING_CHARS: usize = 64;

/// Extra framing characters per history turn (`U: `, `L: `, newlines).
pub const FRAMING_CHARS_PER_TURN: usize = 8;

/// Room that a valid budget must leave for the user's query.
pub const MIN_QUERY_CHARS: usize = 200;

/// Character limits for prompt assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PromptBudget {
    /// Cap on the persona segment
    #[serde(default = "default_persona_max")]
    pub persona_max: usize,

    /// How many trailing turns of history to include
    #[serde(default = "default_history_turns")]
    pub history_turns: usize,

    /// Cap on each question and each answer of a history turn
    #[serde(default = "default_history_turn_max")]
    pub history_turn_max: usize,

    /// Cap on the web context segment
    #[serde(default = "default_web_max")]
    pub web_max: usize,

    /// Hard limit on the whole prompt
    #[serde(default = "default_ceiling")]
    pub ceiling: usize,

    #[serde(default)]
    pub persona_trim: PersonaTrim,
}

fn default_persona_max() -> usize {
    400
}
fn default_history_turns() -> usize {
    3
}
fn default_history_turn_max() -> usize {
    100
}
fn default_web_max() -> usize {
    200
}
fn default_ceiling() -> usize {
    1600
}

impl Default for PromptBudget {
    fn default() -> Self {
        Self {
            persona_max: default_persona_max(),
            history_turns: default_history_turns(),
            history_turn_max: default_history_turn_max(),
            web_max: default_web_max(),
            ceiling: default_ceiling(),
            persona_trim: PersonaTrim::default(),
        }
    }
}

impl PromptBudget {
    /// Worst-case size of every segment except the query.
    pub fn reserved_chars(&self) -> usize {
        self.persona_max
            + self.history_turns * (2 * self.history_turn_max + FRAMING_CHARS_PER_TURN)
            + self.web_max
            + FRAMING_CHARS
    }

    /// Check that the segment caps leave room for a query under the ceiling.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let needed = self.reserved_chars() + MIN_QUERY_CHARS;
        if needed > self.ceiling {
            return Err(ConfigError::ValidationError(format!(
                "prompt segment limits need {needed} chars (including {MIN_QUERY_CHARS} for the query) \
                 but prompt.ceiling is {}",
                self.ceiling
            )));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// How many past turns the interactive session keeps
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

fn default_history_limit() -> usize {
    12
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_limit: default_history_limit(),
        }
    }
}

/// Inline value first, then the named environment variable. Blank values
/// count as missing.
fn resolve_secret(
    inline: &Option<String>,
    env_name: &Option<String>,
    lookup: impl Fn(&str) -> Option<String>,
) -> Option<String> {
    inline
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| env_name.as_deref().and_then(&lookup))
        .filter(|k| !k.trim().is_empty())
}

impl AppConfig {
    /// Load from `path`, then apply environment overrides.
    ///
    /// `LYRIA_PERSONA` overrides `default_persona`. Backend and search
    /// credentials are read from their `api_key_env` variables when providers
    /// are built, not here.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        Self::load_with(path, |name| std::env::var(name).ok())
    }

    /// Load from `path`, resolving environment overrides through `lookup`.
    pub fn load_with(
        path: &Path,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = Self::load_from(path)?;

        if let Some(persona) = lookup("LYRIA_PERSONA").filter(|p| !p.trim().is_empty()) {
            config.default_persona = persona;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".lyria")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let params = &self.generation.params;
        if params.temperature < 0.0 || params.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "generation.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if params.top_p <= 0.0 || params.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "generation.top_p must be in (0.0, 1.0]".into(),
            ));
        }

        let deadline = self.generation.request_deadline_secs;
        if deadline == 0 || deadline > MAX_REQUEST_DEADLINE_SECS {
            return Err(ConfigError::ValidationError(format!(
                "generation.request_deadline_secs must be in 1..={MAX_REQUEST_DEADLINE_SECS}"
            )));
        }

        let mut seen = HashSet::new();
        for backend in &self.backends {
            if !seen.insert(backend.id.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate backend id '{}'",
                    backend.id
                )));
            }
            if backend.max_attempts == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "backend '{}': max_attempts must be >= 1",
                    backend.id
                )));
            }
            if backend.timeout_secs == 0 {
                return Err(ConfigError::ValidationError(format!(
                    "backend '{}': timeout_secs must be > 0",
                    backend.id
                )));
            }
            if backend.kind == BackendKind::OpenaiCompat && backend.model.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "backend '{}': openai_compat backends need a model",
                    backend.id
                )));
            }
        }

        if self.search.max_snippets == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_snippets must be >= 1".into(),
            ));
        }

        self.prompt.validate()
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_persona: default_persona(),
            generation: GenerationConfig::default(),
            backends: default_backends(),
            search: SearchConfig::default(),
            gate: GateConfig::default(),
            prompt: PromptBudget::default(),
            chat: ChatConfig::default(),
        }
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.default_persona, "professor");
        assert_eq!(config.backends.len(), 2);
        assert_eq!(config.backends[0].kind, BackendKind::HfInference);
        assert_eq!(config.search.max_snippets, 2);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.backends.len(), config.backends.len());
        assert_eq!(parsed.prompt, config.prompt);
        assert_eq!(parsed.generation.params, config.generation.params);
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.generation.params.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn duplicate_backend_ids_rejected() {
        let mut config = AppConfig::default();
        let dup = config.backends[0].clone();
        config.backends.push(dup);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate"));
    }

    #[test]
    fn zero_attempts_rejected() {
        let mut config = AppConfig::default();
        config.backends[0].max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn request_deadline_bounds() {
        let mut config = AppConfig::default();
        config.generation.request_deadline_secs = 0;
        assert!(config.validate().is_err());

        config.generation.request_deadline_secs = MAX_REQUEST_DEADLINE_SECS;
        assert!(config.validate().is_ok());

        config.generation.request_deadline_secs = i64::MAX as u64;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("request_deadline_secs"));
    }

    #[test]
    fn oversized_budget_rejected() {
        let budget = PromptBudget {
            persona_max: 2000,
            ..PromptBudget::default()
        };
        assert!(budget.validate().is_err());
        assert!(PromptBudget::default().validate().is_ok());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = AppConfig::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_ok());
        assert_eq!(result.unwrap().default_persona, "professor");
    }

    #[test]
    fn loads_custom_backend_chain() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
default_persona = "social"

[generation]
max_new_tokens = 256
temperature = 0.5

[[backends]]
id = "local"
kind = "openai_compat"
api_url = "http://localhost:11434/v1"
api_key = "ollama"
model = "llama3"
timeout_secs = 20
max_attempts = 3

[prompt]
persona_trim = "head"
"#
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_persona, "social");
        assert_eq!(config.generation.params.max_new_tokens, 256);
        assert!((config.generation.params.top_p - 0.95).abs() < f32::EPSILON);
        assert_eq!(config.backends.len(), 1);
        assert_eq!(config.backends[0].max_attempts, 3);
        assert_eq!(config.backends[0].backoff_ms, 1000);
        assert_eq!(config.prompt.persona_trim, PersonaTrim::Head);
    }

    #[test]
    fn persona_env_override() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "default_persona = \"social\"\n").unwrap();

        let env = |name: &str| (name == "LYRIA_PERSONA").then(|| "empresarial".to_string());
        let config = AppConfig::load_with(file.path(), env).unwrap();
        assert_eq!(config.default_persona, "empresarial");

        let config = AppConfig::load_with(file.path(), |_| None).unwrap();
        assert_eq!(config.default_persona, "social");

        let blank = |_: &str| Some("  ".to_string());
        let config = AppConfig::load_with(file.path(), blank).unwrap();
        assert_eq!(config.default_persona, "social");

        let missing = Path::new("/nonexistent/config.toml");
        let config = AppConfig::load_with(missing, env).unwrap();
        assert_eq!(config.default_persona, "empresarial");
    }

    #[test]
    fn invalid_file_reports_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "backends = 3").unwrap();
        match AppConfig::load_from(file.path()) {
            Err(ConfigError::ParseError { .. }) => {}
            other => panic!("Expected ParseError, got: {other:?}"),
        }
    }

    #[test]
    fn api_key_resolution_order() {
        let mut backend = default_backends().remove(0);
        let env = |name: &str| (name == "HUGGING_FACE_API_KEY").then(|| "hf_env".to_string());

        assert_eq!(backend.resolve_api_key_with(env).as_deref(), Some("hf_env"));

        backend.api_key = Some("hf_inline".into());
        assert_eq!(backend.resolve_api_key_with(env).as_deref(), Some("hf_inline"));

        backend.api_key = Some("   ".into());
        backend.api_key_env = Some("UNSET_VAR".into());
        assert_eq!(backend.resolve_api_key_with(env), None);
    }

    #[test]
    fn debug_redacts_secrets() {
        let mut backend = default_backends().remove(0);
        backend.api_key = Some("hf_secret_value".into());
        let out = format!("{backend:?}");
        assert!(!out.contains("hf_secret_value"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn default_toml_generation() {
        let toml_str = AppConfig::default_toml();
        assert!(toml_str.contains("huggingface"));
        assert!(toml_str.contains("serpapi.com"));
    }
}
