//! The Lyria answering pipeline.
//!
//! [`Orchestrator::answer`] composes the augmentation gate, the web context
//! fetcher, the persona registry, the [`PromptAssembler`] and the generation
//! dispatcher into one call that always produces an answer.

pub mod assembler;
pub mod gate;
pub mod orchestrator;

pub use assembler::{AssembledPrompt, PromptAssembler, PromptStats, assemble};
pub use gate::{KeywordGate, StaticGate};
pub use orchestrator::{Answer, AnswerOptions, AnswerRequest, Orchestrator};
