//! # Lyria Core
//!
//! Domain types, traits, and error definitions for the Lyria answering
//! pipeline. This crate has no HTTP or runtime dependencies; it defines the
//! seams that the provider, search, and pipeline crates implement against.
//!
//! Every external collaborator is a trait here:
//! - [`GenerationBackend`]: a remote (or stub) text generator
//! - [`SearchProvider`]: a web search API returning ranked snippets
//! - [`AugmentationGate`]: the "does this query need the web?" classifier

pub mod conversation;
pub mod error;
pub mod gate;
pub mod generation;
pub mod persona;
pub mod search;

// Re-export key types at crate root for ergonomics
pub use conversation::{ConversationTurn, Memory};
pub use error::{ErrorClass, GenerationError, SearchError};
pub use gate::AugmentationGate;
pub use generation::{GenerationBackend, GenerationParams, GenerationResult, OFFLINE_BACKEND};
pub use persona::{ASSISTANT_NAME, PersonaId, UnknownPersona, persona_text};
pub use search::{SearchHit, SearchProvider};
