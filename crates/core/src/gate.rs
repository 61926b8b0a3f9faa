//! Web augmentation gate: decides whether a query needs live web context.
//!
//! The real classifier lives outside this workspace; the pipeline consumes it
//! only through this boolean contract. Simple built-in gates live in
//! `lyria-pipeline::gate`.

/// Decides, once per request, whether to fetch web context.
pub trait AugmentationGate: Send + Sync {
    fn should_augment(&self, query: &str) -> bool;
}

impl<F> AugmentationGate for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn should_augment(&self, query: &str) -> bool {
        self(query)
    }
}
