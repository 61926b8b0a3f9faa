//! Lyria CLI: the main entry point.
//!
//! Commands:
//! - `ask`: Answer a single question
//! - `chat`: Interactive conversation with in-memory history
//! - `personas`: List the available personas
//! - `doctor`: Report which backends and services are usable
//! - `config`: Show, locate, create or validate the config file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "lyria",
    about = "Lyria — persona-conditioned answers with web context and backend fallback",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file to use instead of ~/.lyria/config.toml
    #[arg(short, long, global = true, env = "LYRIA_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Answer a single question
    Ask {
        /// The question
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Persona: professor, empresarial or social
        #[arg(short, long)]
        persona: Option<String>,

        /// Force web augmentation on
        #[arg(long, conflicts_with = "no_web")]
        web: bool,

        /// Force web augmentation off
        #[arg(long)]
        no_web: bool,

        /// Print the full answer record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Start an interactive conversation
    Chat {
        /// Persona: professor, empresarial or social
        #[arg(short, long)]
        persona: Option<String>,
    },

    /// List the available personas
    Personas,

    /// Diagnose backends, search and configuration
    Doctor,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (secrets redacted)
    Show,
    /// Print the config file path
    Path,
    /// Write a starter config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// Validate the config file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so answers on stdout stay clean.
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Ask {
            question,
            persona,
            web,
            no_web,
            json,
        } => {
            let augment = match (web, no_web) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::ask::run(config_path, question.join(" "), persona, augment, json).await?
        }
        Commands::Chat { persona } => commands::chat::run(config_path, persona).await?,
        Commands::Personas => commands::personas::run(config_path).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config_cmd::show(config_path).await?,
            ConfigAction::Path => commands::config_cmd::path(config_path).await?,
            ConfigAction::Init { force } => commands::config_cmd::init(config_path, force).await?,
            ConfigAction::Validate => commands::config_cmd::validate(config_path).await?,
        },
    }

    Ok(())
}
