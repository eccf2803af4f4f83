//! Generation backend abstraction.
//!
//! Provides the [`GenerationBackend`] trait the orchestrator calls once per
//! attempt, plus two in-process implementations:
//! - [`EchoBackend`]: always succeeds, echoing the model and request
//! - [`FailingBackend`]: always fails with a fixed [`AttemptFailure`]
//!
//! Real provider clients (HTTP, SDKs) live outside this crate and implement
//! the same trait.

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use crate::routing::OutcomeKind;

/// Why one attempt against a provider did not produce valid output.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AttemptFailure {
    /// The provider answered, but the output failed schema validation.
    #[error("schema invalid: {0}")]
    SchemaInvalid(String),

    /// The provider did not answer in time.
    #[error("timed out")]
    Timeout,

    /// Any other provider failure.
    #[error("provider error: {0}")]
    ProviderError(String),
}

impl AttemptFailure {
    /// The scoreboard bucket this failure is recorded in.
    pub fn outcome_kind(&self) -> OutcomeKind {
        match self {
            Self::SchemaInvalid(_) => OutcomeKind::SchemaInvalid,
            Self::Timeout => OutcomeKind::Timeout,
            Self::ProviderError(_) => OutcomeKind::ProviderError,
        }
    }
}

/// One external generation provider.
///
/// Implementations must be thread-safe (Send + Sync); the orchestrator holds
/// them as `Arc<dyn GenerationBackend>`.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Provider identity, matching the routing configuration.
    fn provider(&self) -> &str;

    /// Run one generation attempt with the already-resolved `model`.
    async fn generate(&self, model: &str, request: &Value) -> Result<Value, AttemptFailure>;
}

// ============================================================================
// Echo Backend (Testing)
// ============================================================================

/// Backend that always succeeds.
///
/// Returns `{"provider", "model", "echo": <request>}` after an optional
/// simulated delay.
#[derive(Debug, Clone)]
pub struct EchoBackend {
    provider: String,
    /// Simulated generation delay.
    pub delay_ms: u64,
}

impl EchoBackend {
    /// Create an echo backend for `provider` with no delay.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            delay_ms: 0,
        }
    }

    /// Set the simulated delay.
    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

#[async_trait]
impl GenerationBackend for EchoBackend {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, model: &str, request: &Value) -> Result<Value, AttemptFailure> {
        if self.delay_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(self.delay_ms)).await;
        }
        Ok(json!({
            "provider": self.provider,
            "model": model,
            "echo": request,
        }))
    }
}

// ============================================================================
// Failing Backend (Testing)
// ============================================================================

/// Backend that always fails with the same [`AttemptFailure`].
#[derive(Debug, Clone)]
pub struct FailingBackend {
    provider: String,
    failure: AttemptFailure,
}

impl FailingBackend {
    /// Create a backend for `provider` that always returns `failure`.
    pub fn new(provider: impl Into<String>, failure: AttemptFailure) -> Self {
        Self {
            provider: provider.into(),
            failure,
        }
    }
}

#[async_trait]
impl GenerationBackend for FailingBackend {
    fn provider(&self) -> &str {
        &self.provider
    }

    async fn generate(&self, _model: &str, _request: &Value) -> Result<Value, AttemptFailure> {
        Err(self.failure.clone())
    }
}
