//! `lyria doctor`: Diagnose backends, search and configuration.

use lyria_config::{AppConfig, GateMode};
use lyria_providers::chain::{self, ExcludedBackend};
use std::path::Path;

/// What `doctor` found, independent of how it is printed.
#[derive(Debug)]
struct Report {
    active: Vec<String>,
    excluded: Vec<ExcludedBackend>,
    search_ready: bool,
    search_note: String,
}

impl Report {
    fn issues(&self) -> usize {
        usize::from(self.active.is_empty()) + usize::from(!self.search_ready)
    }
}

fn diagnose(config: &AppConfig, lookup: impl Fn(&str) -> Option<String> + Copy) -> Report {
    let built = chain::build_with(config, lookup);

    let (search_ready, search_note) = if !config.search.enabled {
        (false, "disabled in config".to_string())
    } else if config.search.resolve_api_key_with(lookup).is_some() {
        let search = &config.search;
        (
            true,
            format!("{} ({}-{})", search.api_url, search.language, search.country),
        )
    } else {
        (
            false,
            format!(
                "no API key (set {})",
                config.search.api_key_env.as_deref().unwrap_or("search.api_key")
            ),
        )
    };

    Report {
        active: built.active,
        excluded: built.excluded,
        search_ready,
        search_note,
    }
}

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("Lyria Doctor — System Diagnostics");
    println!("=================================\n");

    let path = super::config_path(config_path);
    let config = if path.exists() {
        match AppConfig::load_with_env(&path) {
            Ok(config) => {
                println!("  ✅ Config file valid ({})", path.display());
                config
            }
            Err(e) => {
                println!("  ❌ Config file invalid: {e}");
                println!("\n  Fix the file or run `lyria config init --force`.");
                return Ok(());
            }
        }
    } else {
        println!("  ⚠️  No config file, using defaults (`lyria config init` creates one)");
        AppConfig::default()
    };

    let report = diagnose(&config, |name| std::env::var(name).ok());

    println!();
    println!("  Generation chain:");
    if report.active.is_empty() {
        println!("    ❌ No usable backend — every answer will come from the offline responder");
    }
    for (i, id) in report.active.iter().enumerate() {
        println!("    ✅ {}. {id}", i + 1);
    }
    for excluded in &report.excluded {
        println!("    ⚠️  {} excluded: {}", excluded.id, excluded.reason);
    }

    println!();
    if report.search_ready {
        println!("  ✅ Web search: {}", report.search_note);
    } else {
        println!("  ⚠️  Web search unavailable: {}", report.search_note);
    }

    let gate = match config.gate.mode {
        GateMode::Keywords => format!("keywords ({} terms)", config.gate.keywords.len()),
        GateMode::Always => "always".to_string(),
        GateMode::Never => "never".to_string(),
    };
    println!("  ✅ Augmentation gate: {gate}");
    println!(
        "  ✅ Prompt budget: {} chars ceiling, {} history turns",
        config.prompt.ceiling, config.prompt.history_turns
    );

    println!();
    match report.issues() {
        0 => println!("  🎉 All checks passed!"),
        n => println!("  ⚠️  {n} issue(s) found. See above for details."),
    }

    Ok(())
}
