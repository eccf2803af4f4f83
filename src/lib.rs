//! # tokio-ai-governance
//!
//! Governance core that sits in front of calls to external AI generation
//! backends.
//!
//! ## Architecture
//!
//! ```text
//! upstream role/feature check (external)
//!         │
//!         ▼
//! ApprovalGate::check ──deferred──▶ PendingRequestStore (durable)
//!         │ allowed
//!         ▼
//! ProviderOrchestrator::pick_ranked_providers
//!         │
//!         ▼
//! attempt[i] ── ModelResolver::resolve ── GenerationBackend::generate
//!         │                                        │
//!         └──────── ProviderScoreBoard::update_scores ◀┘
//! ```
//!
//! - [`approval`]: risk assessment, payload hashing, the pending-request
//!   lifecycle and the allow/defer state machine.
//! - [`routing`]: rolling per-provider statistics, ranking, cross-provider
//!   model resolution and sequential failover.
//! - [`backend`]: the [`GenerationBackend`] seam each provider implements.
//! - [`config`]: TOML loading, validation and hot-reload of routing tables.
//! - [`metrics`]: Prometheus counters for gate decisions and attempts.

// ── Lint policy ───────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::todo)]
#![deny(missing_docs)]

use thiserror::Error;
use tracing_subscriber::EnvFilter;

pub mod approval;
pub mod backend;
pub mod clock;
pub mod config;
pub mod metrics;
pub mod routing;

#[cfg(feature = "metrics-server")]
pub mod metrics_server;

// Re-exports for convenience
pub use approval::{
    build_store, hash_payload, ApprovalGate, GateDecision, GateRequest, HighRiskCheck,
    InMemoryPendingStore, PendingRequest, PendingRequestStore, PendingStatus, RiskAssessor,
    StoreError,
};
pub use backend::{AttemptFailure, EchoBackend, FailingBackend, GenerationBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use routing::{
    ExecutionReport, ModelResolver, Outcome, OutcomeKind, ProviderOrchestrator, ProviderScore,
    ProviderScoreBoard, RoutingConfig,
};

/// Initialise the global tracing subscriber.
///
/// Reads the `LOG_FORMAT` environment variable to choose output format:
/// - `"json"`: structured JSON output for production log aggregators
/// - anything else (including unset): human-readable pretty output
///   for local development
///
/// Filter level is controlled by `RUST_LOG` (e.g. `RUST_LOG=info`).
///
/// # Errors
///
/// Returns [`GovernanceError::Other`] if the global subscriber has already
/// been set (e.g. by a previous call or a test harness).
///
/// # Example
///
/// ```no_run
/// # use tokio_ai_governance::{init_tracing, GovernanceError};
/// # fn example() -> Result<(), GovernanceError> {
/// init_tracing()?;
/// # Ok(()) }
/// ```
pub fn init_tracing() -> Result<(), GovernanceError> {
    let format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string());
    init_tracing_with_format(&format)
}

/// Initialise tracing with an explicit format (`"json"` or `"pretty"`).
///
/// Used when the format comes from the `[observability]` config section
/// rather than the environment.
///
/// # Errors
///
/// Returns [`GovernanceError::Other`] if a global subscriber is already set.
pub fn init_tracing_with_format(format: &str) -> Result<(), GovernanceError> {
    let result = match format {
        "json" => tracing_subscriber::fmt()
            .json()
            .with_env_filter(EnvFilter::from_default_env())
            .with_current_span(true)
            .with_span_list(true)
            .try_init(),
        _ => tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init(),
    };

    result.map_err(|e| GovernanceError::Other(format!("tracing init failed: {e}")))
}

/// Top-level governance errors.
///
/// Only hard failures live here. Ownership mismatches, unknown pending ids
/// and non-approved statuses are ordinary [`GateDecision`] outcomes, never
/// errors.
#[derive(Error, Debug)]
pub enum GovernanceError {
    /// Risk inputs were malformed. Raised before any store interaction.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The pending-request store could not be reached or returned garbage.
    ///
    /// On the defer path this is fatal: the gate fails closed.
    #[error("persistence failed: {0}")]
    Persistence(#[from] StoreError),

    /// Every ranked provider was attempted once and none succeeded.
    #[error("all {attempts} provider attempts failed")]
    ProvidersExhausted {
        /// Number of attempts made (one per distinct provider).
        attempts: usize,
    },

    /// `execute` was called without any backends.
    #[error("no providers configured")]
    NoProviders,

    /// A configuration value is missing or invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Catch-all for errors that do not fit a specific variant.
    #[error("{0}")]
    Other(String),
}

impl From<config::validation::ConfigError> for GovernanceError {
    fn from(e: config::validation::ConfigError) -> Self {
        GovernanceError::Config(e.to_string())
    }
}
