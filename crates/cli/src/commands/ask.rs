//! `lyria ask`: Answer a single question without history.

use lyria_pipeline::{AnswerOptions, AnswerRequest, Orchestrator};
use std::path::Path;

pub async fn run(
    config_path: Option<&Path>,
    question: String,
    persona: Option<String>,
    augment: Option<bool>,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let persona = super::resolve_persona(persona.as_deref(), &config)?;
    let orchestrator = Orchestrator::from_config(&config);

    let request = AnswerRequest::new(question)
        .with_persona(persona)
        .with_options(AnswerOptions {
            augment,
            ..AnswerOptions::default()
        });

    let answer = orchestrator.answer_detailed(&request).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&answer)?);
    } else {
        println!("{}", answer.text);
    }

    Ok(())
}
