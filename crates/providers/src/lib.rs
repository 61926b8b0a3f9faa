//! Generation backends for Lyria.
//!
//! All remote backends implement `lyria_core::GenerationBackend`. The
//! [`Dispatcher`] tries them in priority order and falls back to the
//! [`OfflineResponder`] when none can answer.

pub mod chain;
pub mod dispatcher;
pub mod hf_inference;
mod http;
pub mod offline;
pub mod openai_compat;

pub use chain::{BuiltChain, ExcludedBackend, build_from_config};
pub use dispatcher::{DispatchRequest, Dispatcher, RetryPolicy};
pub use hf_inference::HfInferenceBackend;
pub use offline::OfflineResponder;
pub use openai_compat::OpenAiCompatBackend;
