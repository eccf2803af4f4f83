//! # Stage: Provider Routing
//!
//! ## Responsibility
//! Pick the order in which generation providers are attempted, translate the
//! requested model for each provider, and learn from every attempt.
//!
//! ## Guarantees
//! - Adaptive: every attempt outcome feeds [`ProviderScoreBoard`], so
//!   unreliable providers sink in the ranking over the life of the process.
//! - Bounded: at most one attempt per distinct provider per request,
//!   strictly sequential.
//! - Deterministic ties: equal ranks keep declared provider order.
//! - Hot-swappable: the crossover table can be replaced without restarting.
//!
//! ## NOT Responsible For
//! - Request deadlines or cancellation (caller-owned)
//! - Cross-instance ranking state (scores are process-local)
//! - Talking to providers (see [`crate::backend`])

pub mod config;
pub mod orchestrator;
pub mod resolver;
pub mod scoreboard;

// Re-exports for convenience
pub use config::{CrossoverEntry, ProviderConfig, RoutingConfig};
pub use orchestrator::{ExecutionReport, ProviderOrchestrator};
pub use resolver::ModelResolver;
pub use scoreboard::{Outcome, OutcomeKind, ProviderScore, ProviderScoreBoard};
