//! Prompt assembly: a character-bounded prompt from four layers.
//!
//! Layers, in output order:
//!
//! 1. **Persona**: condensed to its communication-style section, capped
//! 2. **History** (`Contexto:`): last N turns, oldest first, each field capped
//! 3. **Web** (`Info atual:`): only when a snippet was fetched
//! 4. **Query** (`Usuário:`): followed by the answer delimiter `Lyria:`
//!
//! If the capped layers still exceed the ceiling, content is removed in a
//! fixed order: history turns (oldest first), then web, then persona, then
//! the query. The delimiter is never removed.
//!
//! All lengths are Unicode scalar values. Assembly is deterministic.

use lyria_config::{PersonaTrim, PromptBudget};
use lyria_core::conversation::ConversationTurn;
use lyria_core::persona::ASSISTANT_NAME;
use serde::{Deserialize, Serialize};

const STYLE_START: &str = "ESTILO DE COMUNICAÇÃO:";
const STYLE_END: &str = "RESTRIÇÕES";
const HISTORY_HEADER: &str = "Contexto:";
const USER_LABEL: &str = "U:";
const ASSISTANT_LABEL: &str = "L:";
const WEB_LABEL: &str = "Info atual:";
const QUERY_LABEL: &str = "Usuário:";

/// The assembled prompt plus what was kept and dropped.
#[derive(Debug, Clone)]
pub struct AssembledPrompt {
    pub text: String,
    pub stats: PromptStats,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptStats {
    /// Final prompt length in characters.
    pub chars: usize,
    pub ceiling: usize,
    pub turns_included: usize,
    /// Selected turns removed to meet the ceiling.
    pub turns_dropped: usize,
    pub web_included: bool,
    /// The query itself had to be cut.
    pub query_truncated: bool,
}

/// Stateless prompt builder. Create one and reuse it.
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    budget: PromptBudget,
}

impl PromptAssembler {
    pub fn new(budget: PromptBudget) -> Self {
        Self { budget }
    }

    /// Build the prompt text.
    pub fn assemble(
        &self,
        query: &str,
        history: &[ConversationTurn],
        web_context: Option<&str>,
        persona_text: &str,
    ) -> String {
        self.assemble_detailed(query, history, web_context, persona_text)
            .text
    }

    /// Build the prompt and report how the budget was spent.
    pub fn assemble_detailed(
        &self,
        query: &str,
        history: &[ConversationTurn],
        web_context: Option<&str>,
        persona_text: &str,
    ) -> AssembledPrompt {
        let budget = &self.budget;

        let start = history.len().saturating_sub(budget.history_turns);
        let mut layers = Layers {
            persona: persona_segment(persona_text, budget),
            turns: history[start..]
                .iter()
                .map(|t| {
                    (
                        truncate_chars(t.question.trim(), budget.history_turn_max).to_string(),
                        truncate_chars(t.answer.trim(), budget.history_turn_max).to_string(),
                    )
                })
                .collect(),
            web: web_context
                .map(|w| truncate_chars(w.trim(), budget.web_max).trim_end().to_string())
                .filter(|w| !w.is_empty()),
            query: query.trim().to_string(),
        };

        let selected = layers.turns.len();
        let mut query_truncated = false;

        // Oldest history first.
        while layers.overflow(budget.ceiling) > 0 && !layers.turns.is_empty() {
            layers.turns.remove(0);
        }

        let overflow = layers.overflow(budget.ceiling);
        if overflow > 0 {
            if let Some(web) = layers.web.take() {
                let keep = web.chars().count().saturating_sub(overflow);
                let shrunk = truncate_chars(&web, keep).trim_end().to_string();
                layers.web = (!shrunk.is_empty()).then_some(shrunk);
            }
        }

        let overflow = layers.overflow(budget.ceiling);
        if overflow > 0 {
            let keep = layers.persona.chars().count().saturating_sub(overflow);
            layers.persona = truncate_chars(&layers.persona, keep).trim_end().to_string();
        }

        let overflow = layers.overflow(budget.ceiling);
        if overflow > 0 {
            let keep = layers.query.chars().count().saturating_sub(overflow);
            layers.query = truncate_chars(&layers.query, keep).to_string();
            query_truncated = true;
        }

        let mut text = layers.render();
        let len = text.chars().count();
        if len > budget.ceiling {
            // Only reachable when the ceiling is smaller than the bare labels.
            text = tail_chars(&text, budget.ceiling).to_string();
        }

        let stats = PromptStats {
            chars: text.chars().count(),
            ceiling: budget.ceiling,
            turns_included: layers.turns.len(),
            turns_dropped: selected - layers.turns.len(),
            web_included: layers.web.is_some(),
            query_truncated,
        };

        AssembledPrompt { text, stats }
    }
}

/// Free-function form of [`PromptAssembler::assemble`].
pub fn assemble(
    query: &str,
    history: &[ConversationTurn],
    web_context: Option<&str>,
    persona_text: &str,
    budget: &PromptBudget,
) -> String {
    PromptAssembler::new(budget.clone()).assemble(query, history, web_context, persona_text)
}

struct Layers {
    persona: String,
    turns: Vec<(String, String)>,
    web: Option<String>,
    query: String,
}

impl Layers {
    fn render(&self) -> String {
        let mut out = String::new();

        if !self.persona.is_empty() {
            out.push_str(&self.persona);
            out.push('\n');
        }

        if !self.turns.is_empty() {
            out.push_str(HISTORY_HEADER);
            out.push('\n');
            for (question, answer) in &self.turns {
                out.push_str(&format!("{USER_LABEL} {question}\n{ASSISTANT_LABEL} {answer}\n"));
            }
        }

        if let Some(web) = &self.web {
            out.push_str(&format!("{WEB_LABEL} {web}\n"));
        }

        out.push_str(&format!("{QUERY_LABEL} {}\n{ASSISTANT_NAME}:", self.query));
        out
    }

    fn overflow(&self, ceiling: usize) -> usize {
        self.render().chars().count().saturating_sub(ceiling)
    }
}

/// Persona text shortened per the budget's trim strategy.
fn persona_segment(persona_text: &str, budget: &PromptBudget) -> String {
    let segment = match budget.persona_trim {
        PersonaTrim::StyleSection => match style_section(persona_text) {
            Some(section) => format!("Você é {ASSISTANT_NAME}. {section}"),
            None => persona_text.trim().to_string(),
        },
        PersonaTrim::Head => persona_text.trim().to_string(),
    };
    truncate_chars(&segment, budget.persona_max).trim_end().to_string()
}

/// The `ESTILO DE COMUNICAÇÃO:` block, up to the restrictions header.
fn style_section(text: &str) -> Option<&str> {
    let start = text.find(STYLE_START)?;
    let rest = &text[start..];
    let end = rest.find(STYLE_END).unwrap_or(rest.len());
    let section = rest[..end].trim();
    (!section.is_empty()).then_some(section)
}

/// Prefix of `s` with at most `max` characters.
fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Suffix of `s` with at most `max` characters.
fn tail_chars(s: &str, max: usize) -> &str {
    let len = s.chars().count();
    match s.char_indices().nth(len.saturating_sub(max)) {
        Some((idx, _)) => &s[idx..],
        None => "",
    }
}
