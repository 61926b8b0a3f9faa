pub mod ask;
pub mod chat;
pub mod config_cmd;
pub mod doctor;
pub mod personas;

use lyria_config::AppConfig;
use lyria_core::persona::PersonaId;
use std::path::{Path, PathBuf};

/// Path of the config file in effect.
pub fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| AppConfig::config_dir().join("config.toml"))
}

/// Load the config from `explicit` or the default location.
pub fn load_config(explicit: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    let path = config_path(explicit);
    AppConfig::load_with_env(&path).map_err(|e| format!("Failed to load config: {e}").into())
}

/// The persona for a session: an explicit flag must name a real persona,
/// the configured default falls back to Professor.
pub fn resolve_persona(
    flag: Option<&str>,
    config: &AppConfig,
) -> Result<PersonaId, Box<dyn std::error::Error>> {
    match flag {
        Some(name) => Ok(name.parse::<PersonaId>()?),
        None => Ok(config.default_persona.parse().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Falling back to the professor persona");
            PersonaId::default()
        })),
    }
}
