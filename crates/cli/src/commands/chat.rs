//! `lyria chat`: Interactive conversation.
//!
//! History lives only for the session and is capped at `chat.history_limit`
//! turns; the prompt itself uses the last `prompt.history_turns` of them.

use lyria_core::conversation::ConversationTurn;
use lyria_core::persona::PersonaId;
use lyria_pipeline::{AnswerRequest, Orchestrator};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// One line of user input, classified.
#[derive(Debug, PartialEq, Eq)]
enum Input<'a> {
    Empty,
    Exit,
    SwitchPersona(&'a str),
    Question(&'a str),
}

fn parse_input(line: &str) -> Input<'_> {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }
    if matches!(
        line.to_lowercase().as_str(),
        "sair" | "exit" | "quit" | "/sair" | "/exit" | "/quit"
    ) {
        return Input::Exit;
    }
    if let Some(rest) = line.strip_prefix("/persona") {
        return Input::SwitchPersona(rest.trim());
    }
    Input::Question(line)
}

/// Append a turn and drop the oldest beyond `limit`.
fn push_turn(history: &mut Vec<ConversationTurn>, turn: ConversationTurn, limit: usize) {
    history.push(turn);
    if history.len() > limit {
        let excess = history.len() - limit;
        history.drain(..excess);
    }
}

pub async fn run(
    config_path: Option<&Path>,
    persona: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config(config_path)?;
    let mut persona = super::resolve_persona(persona.as_deref(), &config)?;
    let orchestrator = Orchestrator::from_config(&config);

    let backends = orchestrator.dispatcher().backend_ids();
    println!();
    println!("  Lyria — modo interativo");
    println!();
    println!("  Persona:   {persona}");
    if backends.is_empty() {
        println!("  Backends:  nenhum (respostas offline; veja `lyria doctor`)");
    } else {
        println!("  Backends:  {}", backends.join(" → "));
    }
    println!(
        "  Web:       {}",
        if orchestrator.has_web_search() { "ativada" } else { "desativada" }
    );
    println!();
    println!("  Digite sua pergunta e pressione Enter.");
    println!("  '/persona <nome>' troca a persona; 'sair' encerra.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut history: Vec<ConversationTurn> = Vec::new();

    loop {
        print!("  Você > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };

        match parse_input(&line) {
            Input::Empty => continue,
            Input::Exit => break,
            Input::SwitchPersona(name) => match name.parse::<PersonaId>() {
                Ok(p) => {
                    persona = p;
                    println!("  Persona alterada para {persona}.\n");
                }
                Err(e) => eprintln!("  [Erro] {e}\n"),
            },
            Input::Question(question) => {
                let request = AnswerRequest::new(question)
                    .with_persona(persona)
                    .with_history(history.clone());

                eprint!("  ...");
                let answer = orchestrator.answer(&request).await;
                eprint!("\r     \r");

                println!();
                for line in answer.lines() {
                    println!("  Lyria > {line}");
                }
                println!();

                push_turn(
                    &mut history,
                    ConversationTurn::new(question, answer),
                    config.chat.history_limit,
                );
            }
        }
    }

    println!();
    println!("  Até logo!");
    println!();

    Ok(())
}
