//! Orchestrator: the per-request façade.
//!
//! gate → (fetcher) → persona → assembler → dispatcher. Operational failures
//! never surface: search errors become "no web context" and generation
//! failures end in the offline responder.

use lyria_config::{AppConfig, PromptBudget};
use lyria_core::conversation::{ConversationTurn, Memory};
use lyria_core::gate::AugmentationGate;
use lyria_core::generation::GenerationParams;
use lyria_core::persona::{PersonaId, persona_text};
use lyria_providers::{DispatchRequest, Dispatcher};
use lyria_search::WebContextFetcher;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::assembler::{PromptAssembler, PromptStats};
use crate::gate::{self, StaticGate};

/// Default bound on one whole request.
pub const DEFAULT_REQUEST_DEADLINE: Duration = Duration::from_secs(120);

/// Per-request overrides.
#[derive(Debug, Clone, Default)]
pub struct AnswerOptions {
    /// Replaces the orchestrator's request deadline
    pub deadline: Option<Duration>,
    /// Skip the gate and force web augmentation on or off
    pub augment: Option<bool>,
    /// Replaces the orchestrator's generation parameters
    pub params: Option<GenerationParams>,
}

/// Everything the caller supplies for one question.
#[derive(Debug, Clone, Default)]
pub struct AnswerRequest {
    pub query: String,
    /// Prior turns, most recent last
    pub history: Vec<ConversationTurn>,
    pub memory: Memory,
    pub persona: PersonaId,
    pub options: AnswerOptions,
}

impl AnswerRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Self::default()
        }
    }

    pub fn with_persona(mut self, persona: PersonaId) -> Self {
        self.persona = persona;
        self
    }

    pub fn with_history(mut self, history: Vec<ConversationTurn>) -> Self {
        self.history = history;
        self
    }

    pub fn with_memory(mut self, memory: Memory) -> Self {
        self.memory = memory;
        self
    }

    pub fn with_options(mut self, options: AnswerOptions) -> Self {
        self.options = options;
        self
    }
}

/// The answer and how it was produced.
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Backend id, or `"offline"`
    pub backend_used: String,
    pub request_id: String,
    pub web_context_used: bool,
    pub prompt: PromptStats,
}

pub struct Orchestrator {
    gate: Arc<dyn AugmentationGate>,
    fetcher: Option<WebContextFetcher>,
    dispatcher: Dispatcher,
    assembler: PromptAssembler,
    params: GenerationParams,
    deadline: Duration,
}

impl Orchestrator {
    /// An orchestrator with no web search and default budgets.
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self {
            gate: Arc::new(StaticGate(false)),
            fetcher: None,
            dispatcher,
            assembler: PromptAssembler::new(PromptBudget::default()),
            params: GenerationParams::default(),
            deadline: DEFAULT_REQUEST_DEADLINE,
        }
    }

    /// Wire every component from configuration. Backends and search read
    /// their credentials from the environment.
    pub fn from_config(config: &AppConfig) -> Self {
        let chain = lyria_providers::build_from_config(config);
        info!(
            active = ?chain.active,
            excluded = chain.excluded.len(),
            "Generation chain ready"
        );

        let mut orchestrator = Self::new(chain.dispatcher)
            .with_gate(gate::from_config(&config.gate))
            .with_budget(config.prompt.clone())
            .with_params(config.generation.params.clone())
            .with_deadline(Duration::from_secs(config.generation.request_deadline_secs));

        if let Some(fetcher) = lyria_search::build_from_config(&config.search) {
            orchestrator = orchestrator.with_fetcher(fetcher);
        }
        orchestrator
    }

    pub fn with_gate(mut self, gate: Arc<dyn AugmentationGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn with_fetcher(mut self, fetcher: WebContextFetcher) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_budget(mut self, budget: PromptBudget) -> Self {
        self.assembler = PromptAssembler::new(budget);
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn has_web_search(&self) -> bool {
        self.fetcher.is_some()
    }

    /// Answer a question. Never fails and never returns empty text.
    pub async fn answer(&self, request: &AnswerRequest) -> String {
        self.answer_detailed(request).await.text
    }

    /// Answer a question and report which backend answered.
    pub async fn answer_detailed(&self, request: &AnswerRequest) -> Answer {
        let request_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "answer",
            request_id = %request_id,
            persona = %request.persona.as_str()
        );
        self.run(request, request_id).instrument(span).await
    }

    async fn run(&self, request: &AnswerRequest, request_id: String) -> Answer {
        let started = Instant::now();
        let bound = request.options.deadline.unwrap_or(self.deadline);
        // A bound past the clock's range means no deadline at all.
        let deadline = started.checked_add(bound);
        if deadline.is_none() {
            debug!(bound_secs = bound.as_secs(), "Request deadline out of range, ignoring it");
        }
        let query = request.query.as_str();

        if !request.memory.is_empty() {
            debug!("Caller memory supplied (not rendered into the prompt)");
        }

        let augment = request
            .options
            .augment
            .unwrap_or_else(|| self.gate.should_augment(query));

        let web_context = match (&self.fetcher, augment) {
            (Some(fetcher), true) => fetcher.fetch(query).await,
            (None, true) => {
                debug!("Augmentation requested but web search is not configured");
                None
            }
            (_, false) => None,
        };

        let assembled = self.assembler.assemble_detailed(
            query,
            &request.history,
            web_context.as_deref(),
            persona_text(request.persona),
        );
        debug!(
            chars = assembled.stats.chars,
            ceiling = assembled.stats.ceiling,
            turns = assembled.stats.turns_included,
            turns_dropped = assembled.stats.turns_dropped,
            web = assembled.stats.web_included,
            "Prompt assembled"
        );

        let params = request.options.params.as_ref().unwrap_or(&self.params);
        let dispatch = DispatchRequest {
            deadline,
            ..DispatchRequest::new(&assembled.text, query, params)
        };
        let result = self.dispatcher.generate(&dispatch).await;

        info!(
            backend = %result.backend_used,
            augmented = augment,
            web_context = web_context.is_some(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Answer produced"
        );

        Answer {
            text: result.text,
            backend_used: result.backend_used,
            request_id,
            web_context_used: web_context.is_some(),
            prompt: assembled.stats,
        }
    }
}
