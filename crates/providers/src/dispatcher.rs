//! Generation dispatcher: ordered fallback chain with per-backend retries.
//!
//! The dispatcher walks its chain as a small state machine:
//!
//! ```text
//! Trying(i, n) ──ok──────────────────────────────▶ Done
//!      │ retryable, n < max_attempts ─ backoff ──▶ Trying(i, n+1)
//!      │ retryable exhausted / fatal ────────────▶ Trying(i+1, 1)
//!      │ deadline elapsed ───────────────────────▶ Offline
//! Trying(len, _) ────────────────────────────────▶ Offline
//! ```
//!
//! `Offline` is terminal and always succeeds, so [`Dispatcher::generate`]
//! never returns an error.

use lyria_core::error::{ErrorClass, GenerationError};
use lyria_core::generation::{
    GenerationBackend, GenerationParams, GenerationResult, OFFLINE_BACKEND,
};
use lyria_core::persona::ASSISTANT_NAME;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::offline::OfflineResponder;

/// Timeout and retry settings for one chain entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Deadline for a single attempt
    pub timeout: Duration,
    /// Total attempts on this backend (≥ 1)
    pub max_attempts: u32,
    /// Attempt `n` is followed by a `n × backoff` pause
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_attempts: 2,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Everything needed for one dispatch.
#[derive(Debug, Clone, Copy)]
pub struct DispatchRequest<'a> {
    /// The assembled prompt sent to every backend
    pub prompt: &'a str,
    /// The user's raw question, used by the offline responder
    pub query: &'a str,
    pub params: &'a GenerationParams,
    /// When reached, the in-flight attempt is dropped and the offline reply is used
    pub deadline: Option<Instant>,
}

impl<'a> DispatchRequest<'a> {
    pub fn new(prompt: &'a str, query: &'a str, params: &'a GenerationParams) -> Self {
        Self {
            prompt,
            query,
            params,
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// A single entry in the fallback chain.
struct ChainEntry {
    backend: Arc<dyn GenerationBackend>,
    policy: RetryPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OfflineReason {
    EmptyChain,
    Exhausted,
    DeadlineElapsed,
}

enum State {
    Trying { index: usize, attempt: u32 },
    Done { text: String, backend: String },
    Offline(OfflineReason),
}

/// Tries backends in order and falls back to the offline responder.
pub struct Dispatcher {
    chain: Vec<ChainEntry>,
    offline: OfflineResponder,
    echo_labels: Vec<String>,
}

impl Dispatcher {
    /// Create a dispatcher with no backends (every call answers offline).
    pub fn new() -> Self {
        Self {
            chain: Vec::new(),
            offline: OfflineResponder::new(),
            echo_labels: vec![format!("{ASSISTANT_NAME}:")],
        }
    }

    /// Add a backend to the end of the chain.
    pub fn add(mut self, backend: Arc<dyn GenerationBackend>, policy: RetryPolicy) -> Self {
        self.chain.push(ChainEntry { backend, policy });
        self
    }

    /// Add a backend with [`RetryPolicy::default`].
    pub fn add_default(self, backend: Arc<dyn GenerationBackend>) -> Self {
        self.add(backend, RetryPolicy::default())
    }

    /// Number of backends in the chain.
    pub fn len(&self) -> usize {
        self.chain.len()
    }

    /// Whether the chain is empty.
    pub fn is_empty(&self) -> bool {
        self.chain.is_empty()
    }

    /// Backend ids in priority order.
    pub fn backend_ids(&self) -> Vec<&str> {
        self.chain.iter().map(|e| e.backend.id()).collect()
    }

    /// Produce an answer. Never fails and never returns empty text.
    pub async fn generate(&self, request: &DispatchRequest<'_>) -> GenerationResult {
        let mut state = if self.chain.is_empty() {
            State::Offline(OfflineReason::EmptyChain)
        } else {
            State::Trying { index: 0, attempt: 1 }
        };

        loop {
            state = match state {
                State::Trying { index, .. } if index >= self.chain.len() => {
                    State::Offline(OfflineReason::Exhausted)
                }
                State::Trying { index, attempt } => self.attempt(index, attempt, request).await,
                State::Done { text, backend } => {
                    return GenerationResult {
                        text,
                        backend_used: backend,
                    };
                }
                State::Offline(reason) => {
                    warn!(?reason, backends = self.chain.len(), "Dispatch: answering offline");
                    return GenerationResult {
                        text: self.offline.respond(request.query).to_string(),
                        backend_used: OFFLINE_BACKEND.to_string(),
                    };
                }
            };
        }
    }

    /// Run one attempt against `chain[index]` and decide the next state.
    async fn attempt(&self, index: usize, attempt: u32, request: &DispatchRequest<'_>) -> State {
        let entry = &self.chain[index];
        let backend_id = entry.backend.id();

        let mut budget = entry.policy.timeout;
        let mut deadline_bound = false;
        if let Some(deadline) = request.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return State::Offline(OfflineReason::DeadlineElapsed);
            }
            if remaining < budget {
                budget = remaining;
                deadline_bound = true;
            }
        }

        info!(
            backend = %backend_id,
            position = index + 1,
            total = self.chain.len(),
            attempt,
            max_attempts = entry.policy.max_attempts,
            "Dispatch: trying backend"
        );

        let error = match tokio::time::timeout(
            budget,
            entry.backend.invoke(request.prompt, request.params),
        )
        .await
        {
            Ok(Ok(raw)) => match strip_echo(&raw, request.prompt, &self.echo_labels) {
                Some(text) => {
                    return State::Done {
                        text,
                        backend: backend_id.to_string(),
                    };
                }
                None => GenerationError::EmptyResponse,
            },
            Ok(Err(e)) => e,
            Err(_) if deadline_bound => {
                warn!(backend = %backend_id, "Dispatch: request deadline elapsed mid-call");
                return State::Offline(OfflineReason::DeadlineElapsed);
            }
            Err(_) => GenerationError::Timeout(format!(
                "Backend '{}' timed out after {}ms",
                backend_id,
                budget.as_millis()
            )),
        };

        let class = entry.backend.classify_error(&error);
        let next = next_state(index, attempt, entry.policy.max_attempts, class);

        warn!(
            backend = %backend_id,
            attempt,
            error = %error,
            class = ?class,
            "Dispatch: backend failed"
        );

        if let State::Trying { index: next_index, .. } = next {
            if next_index == index {
                let pause = retry_pause(entry.policy.backoff, attempt);
                return self.backoff(pause, request.deadline, next).await;
            }
        }
        next
    }

    /// Sleep before a retry unless the pause would run past the deadline.
    async fn backoff(&self, pause: Duration, deadline: Option<Instant>, next: State) -> State {
        if let Some(deadline) = deadline {
            let wakes = Instant::now().checked_add(pause);
            if wakes.is_none_or(|at| at >= deadline) {
                return State::Offline(OfflineReason::DeadlineElapsed);
            }
        }
        tokio::time::sleep(pause).await;
        next
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Linear backoff for the given attempt, saturating instead of overflowing.
fn retry_pause(backoff: Duration, attempt: u32) -> Duration {
    backoff.saturating_mul(attempt)
}

/// Transition after a failed attempt.
fn next_state(index: usize, attempt: u32, max_attempts: u32, class: ErrorClass) -> State {
    match class {
        ErrorClass::Retryable if attempt < max_attempts => State::Trying {
            index,
            attempt: attempt + 1,
        },
        _ => State::Trying {
            index: index + 1,
            attempt: 1,
        },
    }
}

/// Remove an echoed prompt and leading speaker labels. Returns `None` when
/// nothing is left.
pub fn strip_echo(raw: &str, prompt: &str, labels: &[String]) -> Option<String> {
    let mut text = raw.strip_prefix(prompt).unwrap_or(raw).trim_start();

    let trimmed_prompt = prompt.trim();
    if !trimmed_prompt.is_empty() {
        text = text.strip_prefix(trimmed_prompt).unwrap_or(text).trim_start();
    }

    while let Some(rest) = labels.iter().find_map(|l| text.strip_prefix(l.as_str())) {
        text = rest.trim_start();
    }

    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use lyria_core::generation::GenerationBackend;
    use std::sync::Mutex;

    /// A mock backend that always fails with the same error.
    struct FailingBackend {
        id: String,
        error: GenerationError,
        call_count: Mutex<usize>,
    }

    impl FailingBackend {
        fn new(id: &str, error: GenerationError) -> Self {
            Self {
                id: id.into(),
                error,
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl GenerationBackend for FailingBackend {
        fn id(&self) -> &str {
            &self.id
        }

        async fn invoke(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<String, GenerationError> {
            *self.call_count.lock().unwrap() += 1;
            Err(self.error.clone())
        }
    }

    /// A mock backend that returns a fixed reply.
    struct FixedBackend {
        id: String,
        reply: String,
        call_count: Mutex<usize>,
    }

    impl FixedBackend {
        fn new(id: &str, reply: &str) -> Self {
            Self {
                id: id.into(),
                reply: reply.into(),
                call_count: Mutex::new(0),
            }
        }

        fn calls(&self) -> usize {
            *self.call_count.lock().unwrap()
        }
    }

    #[async_trait]
    impl GenerationBackend for FixedBackend {
        fn id(&self) -> &str {
            &self.id
        }

        async fn invoke(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<String, GenerationError> {
            *self.call_count.lock().unwrap() += 1;
            Ok(self.reply.clone())
        }
    }

    /// Fails with a retryable error `failures` times, then succeeds.
    struct FlakyBackend {
        failures: usize,
        call_count: Mutex<usize>,
    }

    #[async_trait]
    impl GenerationBackend for FlakyBackend {
        fn id(&self) -> &str {
            "flaky"
        }

        async fn invoke(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<String, GenerationError> {
            let mut count = self.call_count.lock().unwrap();
            *count += 1;
            if *count <= self.failures {
                Err(GenerationError::ModelLoading { estimated_secs: 1.0 })
            } else {
                Ok("warmed up".into())
            }
        }
    }

    /// A mock backend that hangs forever (for timeout testing).
    struct HangingBackend;

    #[async_trait]
    impl GenerationBackend for HangingBackend {
        fn id(&self) -> &str {
            "hanging"
        }

        async fn invoke(
            &self,
            _prompt: &str,
            _params: &GenerationParams,
        ) -> std::result::Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Err(GenerationError::Timeout("unreachable".into()))
        }
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            timeout: Duration::from_secs(10),
            max_attempts,
            backoff: Duration::from_millis(100),
        }
    }

    fn transient() -> GenerationError {
        GenerationError::RateLimited { retry_after_secs: 5 }
    }

    fn permanent() -> GenerationError {
        GenerationError::AuthenticationFailed("bad key".into())
    }

    async fn run(dispatcher: &Dispatcher, query: &str) -> GenerationResult {
        let params = GenerationParams::default();
        dispatcher
            .generate(&DispatchRequest::new("PROMPT\nLyria:", query, &params))
            .await
    }

    #[tokio::test(start_paused = true)]
    async fn first_backend_succeeds() {
        let b1 = Arc::new(FixedBackend::new("primary", "one"));
        let b2 = Arc::new(FixedBackend::new("secondary", "two"));

        let dispatcher = Dispatcher::new()
            .add(b1.clone(), policy(2))
            .add(b2.clone(), policy(2));

        let result = run(&dispatcher, "Oi").await;
        assert_eq!(result.text, "one");
        assert_eq!(result.backend_used, "primary");
        assert_eq!(b1.calls(), 1);
        assert_eq!(b2.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failure_escalates_and_skips_the_rest() {
        let b1 = Arc::new(FailingBackend::new("primary", transient()));
        let b2 = Arc::new(FixedBackend::new("secondary", "from secondary"));
        let b3 = Arc::new(FixedBackend::new("tertiary", "from tertiary"));

        let dispatcher = Dispatcher::new()
            .add(b1.clone(), policy(3))
            .add(b2.clone(), policy(3))
            .add(b3.clone(), policy(3));

        let result = run(&dispatcher, "Oi").await;
        assert_eq!(result.text, "from secondary");
        assert_eq!(result.backend_used, "secondary");
        assert_eq!(b1.calls(), 3);
        assert_eq!(b2.calls(), 1);
        assert_eq!(b3.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_count_equals_attempt_cap() {
        for cap in 1..=4 {
            let b1 = Arc::new(FailingBackend::new("primary", transient()));
            let dispatcher = Dispatcher::new().add(b1.clone(), policy(cap));
            let result = run(&dispatcher, "Oi").await;
            assert!(result.is_offline());
            assert_eq!(b1.calls(), cap as usize);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_is_not_retried() {
        let b1 = Arc::new(FailingBackend::new("primary", permanent()));
        let b2 = Arc::new(FixedBackend::new("secondary", "ok"));

        let dispatcher = Dispatcher::new()
            .add(b1.clone(), policy(5))
            .add(b2.clone(), policy(5));

        let result = run(&dispatcher, "Oi").await;
        assert_eq!(result.backend_used, "secondary");
        assert_eq!(b1.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn all_permanent_failures_answer_offline() {
        let b1 = Arc::new(FailingBackend::new("primary", permanent()));
        let b2 = Arc::new(FailingBackend::new(
            "secondary",
            GenerationError::MalformedResponse("{}".into()),
        ));

        let dispatcher = Dispatcher::new()
            .add(b1.clone(), policy(3))
            .add(b2.clone(), policy(3));

        let result = run(&dispatcher, "Como funciona a fotossíntese?").await;
        assert_eq!(result.backend_used, OFFLINE_BACKEND);
        assert_eq!(result.text, OfflineResponder::new().respond("Como funciona a fotossíntese?"));
        assert_eq!(b1.calls(), 1);
        assert_eq!(b2.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_recovers_same_backend() {
        let flaky = Arc::new(FlakyBackend {
            failures: 1,
            call_count: Mutex::new(0),
        });
        let dispatcher = Dispatcher::new().add(flaky.clone(), policy(2));

        let result = run(&dispatcher, "Oi").await;
        assert_eq!(result.text, "warmed up");
        assert_eq!(result.backend_used, "flaky");
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_grows_linearly() {
        let b1 = Arc::new(FailingBackend::new("primary", transient()));
        let dispatcher = Dispatcher::new().add(b1.clone(), policy(3));

        let start = Instant::now();
        run(&dispatcher, "Oi").await;
        // 100ms after attempt 1, 200ms after attempt 2, none after the last.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
        assert!(elapsed < Duration::from_millis(400), "{elapsed:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_triggers_fallback() {
        let b2 = Arc::new(FixedBackend::new("secondary", "fast"));

        let dispatcher = Dispatcher::new()
            .add(
                Arc::new(HangingBackend),
                RetryPolicy {
                    timeout: Duration::from_millis(50),
                    max_attempts: 1,
                    backoff: Duration::ZERO,
                },
            )
            .add(b2.clone(), policy(1));

        let result = run(&dispatcher, "Oi").await;
        assert_eq!(result.text, "fast");
        assert_eq!(b2.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_abandons_chain_for_offline() {
        let b2 = Arc::new(FixedBackend::new("secondary", "too late"));

        let dispatcher = Dispatcher::new()
            .add(Arc::new(HangingBackend), policy(3))
            .add(b2.clone(), policy(1));

        let params = GenerationParams::default();
        let start = Instant::now();
        let request = DispatchRequest::new("PROMPT", "Quando?", &params)
            .with_deadline(start + Duration::from_secs(2));

        let result = dispatcher.generate(&request).await;
        assert!(result.is_offline());
        assert_eq!(b2.calls(), 0);
        assert!(start.elapsed() <= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_during_backoff_goes_offline() {
        let b1 = Arc::new(FailingBackend::new("primary", transient()));
        let dispatcher = Dispatcher::new().add(
            b1.clone(),
            RetryPolicy {
                timeout: Duration::from_secs(1),
                max_attempts: 5,
                backoff: Duration::from_secs(10),
            },
        );

        let params = GenerationParams::default();
        let request = DispatchRequest::new("PROMPT", "Oi", &params)
            .with_deadline(Instant::now() + Duration::from_secs(5));

        let result = dispatcher.generate(&request).await;
        assert!(result.is_offline());
        assert_eq!(b1.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn oversized_backoff_under_deadline_goes_offline() {
        let b1 = Arc::new(FailingBackend::new("primary", transient()));
        let dispatcher = Dispatcher::new().add(
            b1.clone(),
            RetryPolicy {
                timeout: Duration::from_secs(1),
                max_attempts: 3,
                backoff: Duration::MAX,
            },
        );

        let params = GenerationParams::default();
        let request = DispatchRequest::new("PROMPT", "Oi", &params)
            .with_deadline(Instant::now() + Duration::from_secs(30));

        let result = dispatcher.generate(&request).await;
        assert!(result.is_offline());
        assert_eq!(b1.calls(), 1);
    }

    #[test]
    fn retry_pause_saturates() {
        assert_eq!(retry_pause(Duration::from_millis(100), 3), Duration::from_millis(300));
        assert_eq!(retry_pause(Duration::MAX, 2), Duration::MAX);
        assert_eq!(retry_pause(Duration::from_secs(u64::MAX), u32::MAX), Duration::MAX);
    }

    #[tokio::test]
    async fn empty_chain_answers_offline() {
        let dispatcher = Dispatcher::new();
        let result = run(&dispatcher, "Onde fica?").await;
        assert!(result.is_offline());
        assert!(!result.text.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn echoed_prompt_is_stripped() {
        let b1 = Arc::new(FixedBackend::new("echo", "PROMPT\nLyria: Resposta X"));
        let dispatcher = Dispatcher::new().add(b1, policy(1));

        let result = run(&dispatcher, "Oi").await;
        assert_eq!(result.text, "Resposta X");
    }

    #[tokio::test(start_paused = true)]
    async fn empty_reply_falls_through() {
        let b1 = Arc::new(FixedBackend::new("blank", "  Lyria:  "));
        let b2 = Arc::new(FixedBackend::new("secondary", "real"));
        let dispatcher = Dispatcher::new()
            .add(b1.clone(), policy(3))
            .add(b2, policy(1));

        let result = run(&dispatcher, "Oi").await;
        assert_eq!(result.text, "real");
        // EmptyResponse is fatal: no retry on the blank backend.
        assert_eq!(b1.calls(), 1);
    }

    #[test]
    fn strip_echo_variants() {
        let labels = vec!["Lyria:".to_string()];
        assert_eq!(strip_echo("Resposta X", "p", &labels).as_deref(), Some("Resposta X"));
        assert_eq!(
            strip_echo("  Lyria: Lyria: Oi", "p", &labels).as_deref(),
            Some("Oi")
        );
        assert_eq!(
            strip_echo("Usuário: oi\nLyria: Olá", "Usuário: oi\nLyria:", &labels).as_deref(),
            Some("Olá")
        );
        assert_eq!(strip_echo("   ", "p", &labels), None);
        // Labels in the middle are left alone.
        assert_eq!(
            strip_echo("Eu sou a Lyria: prazer", "p", &labels).as_deref(),
            Some("Eu sou a Lyria: prazer")
        );
    }

    #[test]
    fn chain_introspection() {
        let dispatcher = Dispatcher::new()
            .add_default(Arc::new(FixedBackend::new("a", "x")))
            .add_default(Arc::new(FixedBackend::new("b", "y")));
        assert_eq!(dispatcher.len(), 2);
        assert!(!dispatcher.is_empty());
        assert_eq!(dispatcher.backend_ids(), vec!["a", "b"]);
        assert!(Dispatcher::default().is_empty());
    }
}
