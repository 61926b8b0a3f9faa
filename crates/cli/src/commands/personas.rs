//! `lyria personas`: List the persona catalog.

use lyria_core::persona::PersonaId;
use std::path::Path;

pub async fn run(config_path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let default = super::resolve_persona(None, &config)?;

    println!("Available personas:\n");
    for persona in PersonaId::all() {
        let marker = if *persona == default { "*" } else { " " };
        println!("  {marker} {:<12} {}", persona.as_str(), persona.summary());
    }
    println!("\n  * default (set default_persona or LYRIA_PERSONA to change)");

    Ok(())
}
