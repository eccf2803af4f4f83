//! Prometheus metrics for the governance core.
//!
//! ## Usage
//!
//! Call [`init_metrics`] once at process startup. The helper functions
//! (`inc_gate_decision`, `record_attempt`, …) are no-ops if `init_metrics`
//! was never called, so the gate and the orchestrator are always safe to
//! run and observability simply degrades.
//!
//! ## Metrics Exposed
//!
//! | Name | Type | Labels |
//! |------|------|--------|
//! | `governance_gate_decisions_total` | Counter | `outcome` |
//! | `governance_provider_attempts_total` | Counter | `provider`, `outcome` |
//! | `governance_provider_attempt_duration_seconds` | Histogram | `provider` |
//! | `governance_provider_rank` | Gauge (rank × 1000) | `provider` |
//! | `governance_providers_exhausted_total` | Counter | |

use crate::GovernanceError;
use prometheus::{
    core::Collector, CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, IntGaugeVec,
    Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

// ── Internal metrics bundle ────────────────────────────────────────────────

/// All governance metrics, bundled so they can be stored in a single
/// [`OnceLock`] and initialised atomically.
pub struct Metrics {
    /// Prometheus registry that owns all metric descriptors.
    pub registry: Registry,
    /// Gate decisions by outcome (`allowed`, `admin_bypass`, `deferred`,
    /// `retry_approved`, `retry_denied`, `error`).
    pub gate_decisions: CounterVec,
    /// Provider attempts by provider and outcome kind.
    pub provider_attempts: CounterVec,
    /// Provider attempt latency.
    pub attempt_duration: HistogramVec,
    /// Current provider rank, scaled by 1000.
    pub provider_rank: IntGaugeVec,
    /// Requests for which every provider failed.
    pub providers_exhausted: IntCounter,
}

impl Metrics {
    /// Build and register a full bundle whose metric names start with
    /// `prefix` (e.g. `"governance"`).
    fn build(prefix: &str) -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let gate_decisions = CounterVec::new(
            Opts::new(
                format!("{prefix}_gate_decisions_total"),
                "Approval gate decisions by outcome",
            ),
            &["outcome"],
        )?;
        registry.register(Box::new(gate_decisions.clone()))?;

        let provider_attempts = CounterVec::new(
            Opts::new(
                format!("{prefix}_provider_attempts_total"),
                "Provider attempts by provider and outcome",
            ),
            &["provider", "outcome"],
        )?;
        registry.register(Box::new(provider_attempts.clone()))?;

        let attempt_duration = HistogramVec::new(
            HistogramOpts::new(
                format!("{prefix}_provider_attempt_duration_seconds"),
                "Provider attempt latency",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(attempt_duration.clone()))?;

        let provider_rank = IntGaugeVec::new(
            Opts::new(
                format!("{prefix}_provider_rank"),
                "Current provider rank multiplied by 1000",
            ),
            &["provider"],
        )?;
        registry.register(Box::new(provider_rank.clone()))?;

        let providers_exhausted = IntCounter::new(
            format!("{prefix}_providers_exhausted_total"),
            "Requests for which every provider attempt failed",
        )?;
        registry.register(Box::new(providers_exhausted.clone()))?;

        Ok(Self {
            registry,
            gate_decisions,
            provider_attempts,
            attempt_duration,
            provider_rank,
            providers_exhausted,
        })
    }
}

static METRICS: OnceLock<Metrics> = OnceLock::new();

// ── Initialisation ─────────────────────────────────────────────────────────

/// Initialise all Prometheus metrics and register them with a private registry.
///
/// Calling it a second time is a no-op (returns `Ok(())`).
///
/// # Errors
///
/// Returns [`GovernanceError::Other`] if metric construction or registry
/// registration fails.
///
/// # Panics
///
/// This function never panics.
pub fn init_metrics() -> Result<(), GovernanceError> {
    if METRICS.get().is_some() {
        return Ok(());
    }

    let bundle = Metrics::build("governance")
        .map_err(|e| GovernanceError::Other(format!("metrics init failed: {e}")))?;

    // A racing initialiser produces identical descriptors; first one wins.
    let _ = METRICS.set(bundle);

    Ok(())
}

fn metrics() -> Option<&'static Metrics> {
    METRICS.get()
}

// ── Public helper functions ────────────────────────────────────────────────

/// Count one gate decision.
///
/// No-op if metrics have not been initialised.
pub fn inc_gate_decision(outcome: &str) {
    if let Some(m) = metrics() {
        if let Ok(c) = m.gate_decisions.get_metric_with_label_values(&[outcome]) {
            c.inc();
        }
    }
}

/// Count one provider attempt and observe its latency.
///
/// No-op if metrics have not been initialised.
pub fn record_attempt(provider: &str, outcome: &str, d: Duration) {
    if let Some(m) = metrics() {
        if let Ok(c) = m
            .provider_attempts
            .get_metric_with_label_values(&[provider, outcome])
        {
            c.inc();
        }
        if let Ok(h) = m.attempt_duration.get_metric_with_label_values(&[provider]) {
            h.observe(d.as_secs_f64());
        }
    }
}

/// Publish a provider's current rank.
///
/// No-op if metrics have not been initialised.
pub fn set_provider_rank(provider: &str, rank: f64) {
    if let Some(m) = metrics() {
        if let Ok(g) = m.provider_rank.get_metric_with_label_values(&[provider]) {
            g.set(scale_rank(rank));
        }
    }
}

/// Count one exhausted request.
///
/// No-op if metrics have not been initialised.
pub fn inc_providers_exhausted() {
    if let Some(m) = metrics() {
        m.providers_exhausted.inc();
    }
}

fn scale_rank(rank: f64) -> i64 {
    if rank.is_finite() {
        (rank * 1000.0).round() as i64
    } else {
        0
    }
}

/// Gather all registered metrics as a raw list of metric families.
///
/// Returns an empty `Vec` if metrics have not been initialised.
pub fn gather() -> Vec<prometheus::proto::MetricFamily> {
    metrics().map_or_else(Vec::new, |m| m.registry.gather())
}

/// Gather and encode all metrics in the Prometheus text exposition format.
///
/// Returns an empty string if metrics have not been initialised or if
/// encoding fails.
///
/// # Panics
///
/// This function never panics.
pub fn gather_metrics() -> String {
    let families = gather();
    if families.is_empty() {
        return String::new();
    }
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    if encoder.encode(&families, &mut buffer).is_err() {
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// A structured snapshot of key counters, used by the health endpoint.
#[derive(Debug, Default)]
pub struct MetricsSummary {
    /// Gate decisions keyed by outcome label.
    pub gate_decisions: HashMap<String, u64>,
    /// Attempts keyed by `"provider:outcome"`.
    pub provider_attempts: HashMap<String, u64>,
    /// Requests for which every provider failed.
    pub providers_exhausted: u64,
}

fn label<'a>(metric: &'a prometheus::proto::Metric, name: &str) -> &'a str {
    metric
        .get_label()
        .iter()
        .find(|l| l.get_name() == name)
        .map_or("unknown", |l| l.get_value())
}

/// Return a structured summary of current counter values.
///
/// Returns a zeroed [`MetricsSummary`] if metrics have not been initialised.
pub fn get_metrics_summary() -> MetricsSummary {
    let Some(m) = metrics() else {
        return MetricsSummary::default();
    };
    summarize(m)
}

fn summarize(m: &Metrics) -> MetricsSummary {
    let mut summary = MetricsSummary::default();

    for family in m.gate_decisions.collect() {
        for metric in family.get_metric() {
            let value = metric.get_counter().get_value() as u64;
            summary
                .gate_decisions
                .insert(label(metric, "outcome").to_string(), value);
        }
    }

    for family in m.provider_attempts.collect() {
        for metric in family.get_metric() {
            let key = format!(
                "{}:{}",
                label(metric, "provider"),
                label(metric, "outcome")
            );
            let value = metric.get_counter().get_value() as u64;
            summary.provider_attempts.insert(key, value);
        }
    }

    summary.providers_exhausted = m.providers_exhausted.get();
    summary
}
