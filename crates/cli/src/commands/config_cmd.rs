//! `lyria config`: Configuration management commands.

use lyria_config::AppConfig;
use std::path::Path;

const REDACTED: &str = "***";

/// Copy of `config` that is safe to print.
fn redacted(config: &AppConfig) -> AppConfig {
    let mut config = config.clone();
    for backend in &mut config.backends {
        if backend.api_key.is_some() {
            backend.api_key = Some(REDACTED.into());
        }
    }
    if config.search.api_key.is_some() {
        config.search.api_key = Some(REDACTED.into());
    }
    config
}

pub async fn show(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let toml_str = toml::to_string_pretty(&redacted(&config))?;
    println!("{toml_str}");
    Ok(())
}

pub async fn path(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", super::config_path(config_path).display());
    Ok(())
}

pub async fn init(
    config_path: Option<&Path>,
    force: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let path = super::config_path(config_path);

    if path.exists() && !force {
        println!("  Config file already exists: {}", path.display());
        println!("  Use --force to overwrite it.");
        return Ok(());
    }

    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(&path, AppConfig::default_toml())?;

    println!("✅ Wrote {}", path.display());
    println!();
    println!("  Credentials are read from the environment:");
    println!("    HUGGING_FACE_API_KEY   Hugging Face Inference API");
    println!("    OPENROUTER_API_KEY     OpenRouter fallback");
    println!("    KEY_SERP_API           SerpApi web search");
    println!();
    println!("  Run `lyria doctor` to check what is usable.");
    Ok(())
}

pub async fn validate(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match super::load_config(config_path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");
            println!();
            println!("   Persona:    {}", config.default_persona);
            println!(
                "   Backends:   {}",
                config
                    .backends
                    .iter()
                    .map(|b| b.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let search = if config.search.enabled {
                "enabled"
            } else {
                "disabled"
            };
            println!("   Search:     {search}");
            println!(
                "   Prompt:     {} chars ceiling ({} reserved)",
                config.prompt.ceiling,
                config.prompt.reserved_chars()
            );
            println!("   Deadline:   {}s", config.generation.request_deadline_secs);
            Ok(())
        }
        Err(e) => {
            println!("   ❌ {e}");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secrets_are_redacted() {
        let mut config = AppConfig::default();
        config.backends[0].api_key = Some("hf_secret".into());
        config.search.api_key = Some("serp_secret".into());

        let rendered = toml::to_string_pretty(&redacted(&config)).unwrap();
        assert!(!rendered.contains("hf_secret"));
        assert!(!rendered.contains("serp_secret"));
        assert!(rendered.contains(REDACTED));
        // The original is untouched.
        assert_eq!(config.backends[0].api_key.as_deref(), Some("hf_secret"));
    }
}
