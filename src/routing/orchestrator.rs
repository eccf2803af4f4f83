//! Ranked sequential failover across providers.
//!
//! ```text
//! RANKED ─▶ ATTEMPT(provider[i], resolve(provider[i], model))
//!              │ success                  │ schema_invalid | timeout | provider_error
//!              ▼                          ▼
//!            DONE                 record, i += 1, retry while i < n
//!                                         │
//!                                         ▼
//!                                     EXHAUSTED
//! ```
//!
//! Every attempt's outcome is recorded on the scoreboard, success or not.
//! Each distinct provider is attempted at most once per request; attempts
//! never run in parallel. Deadlines and cancellation belong to the caller.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::resolver::ModelResolver;
use super::scoreboard::{Outcome, OutcomeKind, ProviderScoreBoard};
use crate::backend::GenerationBackend;
use crate::{metrics, GovernanceError};

/// Result of a successful [`ProviderOrchestrator::execute`].
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    /// Provider that produced the output.
    pub provider: String,
    /// Model actually sent to that provider.
    pub model: String,
    /// Provider output.
    pub output: Value,
    /// Every attempt made, in order, ending with the success.
    pub outcomes: Vec<Outcome>,
}

/// Ranks providers and drives the attempt loop.
#[derive(Debug, Clone)]
pub struct ProviderOrchestrator {
    scoreboard: Arc<ProviderScoreBoard>,
    resolver: ModelResolver,
}

impl ProviderOrchestrator {
    /// Compose a scoreboard and a resolver.
    pub fn new(scoreboard: Arc<ProviderScoreBoard>, resolver: ModelResolver) -> Self {
        Self {
            scoreboard,
            resolver,
        }
    }

    /// The scoreboard outcomes are recorded on.
    pub fn scoreboard(&self) -> &Arc<ProviderScoreBoard> {
        &self.scoreboard
    }

    /// The resolver used per attempt.
    pub fn resolver(&self) -> &ModelResolver {
        &self.resolver
    }

    /// Order `providers` by descending rank.
    ///
    /// Duplicates are dropped (first occurrence wins). The sort is stable,
    /// so equal ranks keep declared order.
    pub fn pick_ranked_providers(&self, providers: &[String]) -> Vec<String> {
        let mut ranked: Vec<(String, f64)> = Vec::with_capacity(providers.len());
        for p in providers {
            if ranked.iter().any(|(seen, _)| seen == p) {
                continue;
            }
            ranked.push((p.clone(), self.scoreboard.rank(p)));
        }
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        debug!(ranking = ?ranked, "providers ranked");
        ranked.into_iter().map(|(p, _)| p).collect()
    }

    /// Run `request` against `backends` in rank order until one succeeds.
    ///
    /// # Errors
    ///
    /// - [`GovernanceError::NoProviders`] if `backends` is empty.
    /// - [`GovernanceError::ProvidersExhausted`] once every distinct
    ///   provider has failed once.
    pub async fn execute(
        &self,
        backends: &[Arc<dyn GenerationBackend>],
        requested_model: &str,
        request: &Value,
    ) -> Result<ExecutionReport, GovernanceError> {
        if backends.is_empty() {
            return Err(GovernanceError::NoProviders);
        }

        let declared: Vec<String> = backends.iter().map(|b| b.provider().to_string()).collect();
        let order = self.pick_ranked_providers(&declared);
        let mut outcomes = Vec::with_capacity(order.len());

        for provider in &order {
            let Some(backend) = backends.iter().find(|b| b.provider() == provider) else {
                continue;
            };
            let model = self.resolver.resolve(provider, requested_model);

            let start = Instant::now();
            let result = backend.generate(&model, request).await;
            let elapsed = start.elapsed();
            let latency_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);

            let kind = match &result {
                Ok(_) => OutcomeKind::Success,
                Err(failure) => failure.outcome_kind(),
            };
            let outcome = Outcome::new(provider.as_str(), kind, latency_ms);
            self.scoreboard.update_scores(&outcome);
            metrics::record_attempt(provider, kind.as_str(), elapsed);
            outcomes.push(outcome);

            match result {
                Ok(output) => {
                    info!(
                        provider = %provider,
                        model = %model,
                        latency_ms,
                        attempt = outcomes.len(),
                        "generation succeeded"
                    );
                    return Ok(ExecutionReport {
                        provider: provider.clone(),
                        model,
                        output,
                        outcomes,
                    });
                }
                Err(failure) => {
                    warn!(
                        provider = %provider,
                        model = %model,
                        outcome = %kind,
                        latency_ms,
                        error = %failure,
                        "generation attempt failed"
                    );
                }
            }
        }

        metrics::inc_providers_exhausted();
        warn!(attempts = outcomes.len(), "all providers exhausted");
        Err(GovernanceError::ProvidersExhausted {
            attempts: outcomes.len(),
        })
    }
}
