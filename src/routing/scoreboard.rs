//! Rolling per-provider statistics and the rank function.
//!
//! Scores are created lazily on first reference and live for the life of
//! the process. Every update is a short critical section under one
//! `parking_lot::Mutex`; concurrent updates may interleave, which only
//! affects ranking quality, never correctness.
//!
//! ## Rank
//!
//! ```text
//! total_calls == 0  →  0.9
//! otherwise         →  0.60·success − 0.25·schema_invalid − 0.10·timeout
//!                      − 0.05·clamp((p95 − 2000) / 8000, 0, 1)
//! ```
//!
//! Only the relative order across providers is meaningful.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, OnceLock};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::{system_clock, Clock};
use crate::metrics;

/// Rank reported for a provider that has never been called.
pub const UNUSED_PROVIDER_RANK: f64 = 0.9;

/// p95 latency assumed before enough samples exist.
pub const SEED_P95_LATENCY_MS: u64 = 1200;

/// Ring-buffer capacity for recent latencies.
pub const LATENCY_WINDOW: usize = 20;

/// Minimum samples before p95 is recomputed.
pub const MIN_P95_SAMPLES: usize = 3;

const SUCCESS_WEIGHT: f64 = 0.60;
const SCHEMA_INVALID_WEIGHT: f64 = 0.25;
const TIMEOUT_WEIGHT: f64 = 0.10;
const LATENCY_WEIGHT: f64 = 0.05;
const LATENCY_FLOOR_MS: f64 = 2000.0;
const LATENCY_SPAN_MS: f64 = 8000.0;

// ── Outcome ────────────────────────────────────────────────────────────

/// Classification of one provider attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Valid output.
    Success,
    /// The provider answered but the output failed schema validation.
    SchemaInvalid,
    /// The provider did not answer in time.
    Timeout,
    /// Any other provider failure (HTTP error, refusal, transport).
    ProviderError,
}

impl OutcomeKind {
    /// Stable snake_case label, used in logs and metric labels.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::SchemaInvalid => "schema_invalid",
            Self::Timeout => "timeout",
            Self::ProviderError => "provider_error",
        }
    }
}

impl fmt::Display for OutcomeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The input that advances a [`ProviderScore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    /// Provider that was attempted.
    pub provider: String,
    /// How the attempt ended.
    pub kind: OutcomeKind,
    /// Wall-clock latency of the attempt.
    pub latency_ms: u64,
}

impl Outcome {
    /// Convenience constructor.
    pub fn new(provider: impl Into<String>, kind: OutcomeKind, latency_ms: u64) -> Self {
        Self {
            provider: provider.into(),
            kind,
            latency_ms,
        }
    }
}

// ── ProviderScore ──────────────────────────────────────────────────────

/// Rolling statistics for one provider.
///
/// Invariant: `total_calls == successes + schema_invalids + timeouts + failures`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderScore {
    /// Provider identity.
    pub provider: String,
    /// Attempts recorded.
    pub total_calls: u64,
    /// Successful attempts.
    pub successes: u64,
    /// Attempts whose output failed schema validation.
    pub schema_invalids: u64,
    /// Attempts that timed out.
    pub timeouts: u64,
    /// Other provider errors.
    pub failures: u64,
    /// Nearest-rank p95 over `recent_latencies`, or the seed value.
    pub p95_latency_ms: u64,
    /// Most recent latencies, oldest first, at most [`LATENCY_WINDOW`].
    pub recent_latencies: VecDeque<u64>,
    /// When the last outcome was recorded.
    pub last_updated: Option<DateTime<Utc>>,
}

impl ProviderScore {
    /// A fresh score with zero calls and the seed p95.
    pub fn new(provider: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            total_calls: 0,
            successes: 0,
            schema_invalids: 0,
            timeouts: 0,
            failures: 0,
            p95_latency_ms: SEED_P95_LATENCY_MS,
            recent_latencies: VecDeque::with_capacity(LATENCY_WINDOW),
            last_updated: None,
        }
    }

    fn record(&mut self, outcome: &Outcome, at: DateTime<Utc>) {
        self.total_calls += 1;
        match outcome.kind {
            OutcomeKind::Success => self.successes += 1,
            OutcomeKind::SchemaInvalid => self.schema_invalids += 1,
            OutcomeKind::Timeout => self.timeouts += 1,
            OutcomeKind::ProviderError => self.failures += 1,
        }

        self.recent_latencies.push_back(outcome.latency_ms);
        while self.recent_latencies.len() > LATENCY_WINDOW {
            self.recent_latencies.pop_front();
        }

        if let Some(p95) = nearest_rank_p95(&self.recent_latencies) {
            self.p95_latency_ms = p95;
        }
        self.last_updated = Some(at);
    }
}

/// `sorted[min(floor(n * 0.95), n - 1)]`, or `None` below the sample minimum.
fn nearest_rank_p95(samples: &VecDeque<u64>) -> Option<u64> {
    let n = samples.len();
    if n < MIN_P95_SAMPLES {
        return None;
    }
    let mut sorted: Vec<u64> = samples.iter().copied().collect();
    sorted.sort_unstable();
    let idx = ((n as f64) * 0.95).floor() as usize;
    sorted.get(idx.min(n - 1)).copied()
}

// ── ProviderScoreBoard ─────────────────────────────────────────────────

/// Process-local registry of [`ProviderScore`]s.
///
/// Pass it around as `Arc<ProviderScoreBoard>`; [`ProviderScoreBoard::global`]
/// exists for callers that want one shared instance per process.
pub struct ProviderScoreBoard {
    scores: Mutex<HashMap<String, ProviderScore>>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ProviderScoreBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderScoreBoard")
            .field("providers", &self.scores.lock().len())
            .finish()
    }
}

impl Default for ProviderScoreBoard {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<Arc<ProviderScoreBoard>> = OnceLock::new();

impl ProviderScoreBoard {
    /// Create an empty scoreboard on the system clock.
    pub fn new() -> Self {
        Self::with_clock(system_clock())
    }

    /// Create an empty scoreboard stamping updates with `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            scores: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// The process-wide scoreboard, created on first use.
    pub fn global() -> Arc<ProviderScoreBoard> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(ProviderScoreBoard::new())))
    }

    /// Return a snapshot of `provider`'s score, creating it if absent.
    pub fn get_or_create(&self, provider: &str) -> ProviderScore {
        let mut scores = self.scores.lock();
        scores
            .entry(provider.to_string())
            .or_insert_with(|| ProviderScore::new(provider))
            .clone()
    }

    /// Rank a score. Unbounded below zero.
    ///
    /// # Example
    ///
    /// ```rust
    /// use tokio_ai_governance::routing::{ProviderScore, ProviderScoreBoard};
    /// let fresh = ProviderScore::new("anthropic");
    /// assert_eq!(ProviderScoreBoard::compute_rank(&fresh), 0.9);
    /// ```
    pub fn compute_rank(score: &ProviderScore) -> f64 {
        if score.total_calls == 0 {
            return UNUSED_PROVIDER_RANK;
        }
        let total = score.total_calls as f64;
        let success_rate = score.successes as f64 / total;
        let schema_invalid_rate = score.schema_invalids as f64 / total;
        let timeout_rate = score.timeouts as f64 / total;
        let latency_penalty =
            ((score.p95_latency_ms as f64 - LATENCY_FLOOR_MS) / LATENCY_SPAN_MS).clamp(0.0, 1.0);

        SUCCESS_WEIGHT * success_rate
            - SCHEMA_INVALID_WEIGHT * schema_invalid_rate
            - TIMEOUT_WEIGHT * timeout_rate
            - LATENCY_WEIGHT * latency_penalty
    }

    /// Current rank of `provider`, creating its score if absent.
    pub fn rank(&self, provider: &str) -> f64 {
        Self::compute_rank(&self.get_or_create(provider))
    }

    /// Fold one attempt outcome into the provider's rolling statistics.
    ///
    /// Never fails.
    pub fn update_scores(&self, outcome: &Outcome) {
        let now = self.clock.now();
        let rank = {
            let mut scores = self.scores.lock();
            let score = scores
                .entry(outcome.provider.clone())
                .or_insert_with(|| ProviderScore::new(outcome.provider.as_str()));
            score.record(outcome, now);
            Self::compute_rank(score)
        };
        metrics::set_provider_rank(&outcome.provider, rank);
    }

    /// Snapshot of every known score, sorted by provider name.
    pub fn snapshot(&self) -> Vec<ProviderScore> {
        let mut all: Vec<ProviderScore> = self.scores.lock().values().cloned().collect();
        all.sort_by(|a, b| a.provider.cmp(&b.provider));
        all
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_get_or_create_seeds_defaults() {
        let board = ProviderScoreBoard::new();
        let s = board.get_or_create("openai");
        assert_eq!(s.total_calls, 0);
        assert_eq!(s.p95_latency_ms, 1200);
        assert!(s.recent_latencies.is_empty());
        assert!(s.last_updated.is_none());
    }

    #[test]
    fn test_unused_provider_ranks_0_9() {
        let board = ProviderScoreBoard::new();
        assert!(approx(board.rank("never-called"), 0.9));
    }

    #[test]
    fn test_rank_8_success_2_schema_invalid() {
        let board = ProviderScoreBoard::new();
        for _ in 0..8 {
            board.update_scores(&Outcome::new("p", OutcomeKind::Success, 500));
        }
        for _ in 0..2 {
            board.update_scores(&Outcome::new("p", OutcomeKind::SchemaInvalid, 500));
        }
        assert!(approx(board.rank("p"), 0.8 * 0.6 - 0.2 * 0.25));
    }

    #[test]
    fn test_latency_penalty_full_above_10s() {
        let mut s = ProviderScore::new("slow");
        s.total_calls = 1;
        s.successes = 1;
        s.p95_latency_ms = 12_000;
        assert!(approx(ProviderScoreBoard::compute_rank(&s), 0.6 - 0.05));
    }

    #[test]
    fn test_latency_penalty_linear_between() {
        let mut s = ProviderScore::new("mid");
        s.total_calls = 1;
        s.successes = 1;
        s.p95_latency_ms = 6_000;
        assert!(approx(ProviderScoreBoard::compute_rank(&s), 0.6 - 0.05 * 0.5));
    }

    #[test]
    fn test_rank_can_go_negative() {
        let mut s = ProviderScore::new("bad");
        s.total_calls = 4;
        s.schema_invalids = 2;
        s.timeouts = 2;
        s.p95_latency_ms = 20_000;
        assert!(ProviderScoreBoard::compute_rank(&s) < 0.0);
    }

    #[test]
    fn test_p95_nearest_rank_over_five_samples() {
        let board = ProviderScoreBoard::new();
        for ms in [1000, 2000, 3000, 4000, 5000] {
            board.update_scores(&Outcome::new("p", OutcomeKind::Success, ms));
        }
        assert_eq!(board.get_or_create("p").p95_latency_ms, 5000);
    }

    #[test]
    fn test_p95_not_recomputed_below_three_samples() {
        let board = ProviderScoreBoard::new();
        board.update_scores(&Outcome::new("p", OutcomeKind::Success, 9000));
        board.update_scores(&Outcome::new("p", OutcomeKind::Success, 9000));
        assert_eq!(board.get_or_create("p").p95_latency_ms, 1200);
        board.update_scores(&Outcome::new("p", OutcomeKind::Success, 9000));
        assert_eq!(board.get_or_create("p").p95_latency_ms, 9000);
    }

    #[test]
    fn test_ring_buffer_evicts_oldest_beyond_20() {
        let board = ProviderScoreBoard::new();
        for ms in 1..=25u64 {
            board.update_scores(&Outcome::new("p", OutcomeKind::Success, ms));
        }
        let s = board.get_or_create("p");
        assert_eq!(s.recent_latencies.len(), 20);
        assert_eq!(s.recent_latencies.front().copied(), Some(6));
        assert_eq!(s.recent_latencies.back().copied(), Some(25));
        // n = 20 → idx = 19 → max of the window.
        assert_eq!(s.p95_latency_ms, 25);
        assert_eq!(s.total_calls, 25);
    }

    #[test]
    fn test_bucket_mapping_and_invariant() {
        let board = ProviderScoreBoard::new();
        let kinds = [
            OutcomeKind::Success,
            OutcomeKind::SchemaInvalid,
            OutcomeKind::Timeout,
            OutcomeKind::ProviderError,
            OutcomeKind::ProviderError,
        ];
        for kind in kinds {
            board.update_scores(&Outcome::new("p", kind, 100));
        }
        let s = board.get_or_create("p");
        assert_eq!(s.successes, 1);
        assert_eq!(s.schema_invalids, 1);
        assert_eq!(s.timeouts, 1);
        assert_eq!(s.failures, 2);
        assert_eq!(
            s.total_calls,
            s.successes + s.schema_invalids + s.timeouts + s.failures
        );
    }

    #[test]
    fn test_update_stamps_clock_time() {
        let at = Utc
            .with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("test: ts");
        let board = ProviderScoreBoard::with_clock(Arc::new(ManualClock::new(at)));
        board.update_scores(&Outcome::new("p", OutcomeKind::Success, 10));
        assert_eq!(board.get_or_create("p").last_updated, Some(at));
    }

    #[test]
    fn test_snapshot_sorted_by_provider() {
        let board = ProviderScoreBoard::new();
        board.get_or_create("zeta");
        board.get_or_create("alpha");
        let names: Vec<String> = board.snapshot().into_iter().map(|s| s.provider).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[test]
    fn test_global_returns_same_instance() {
        let a = ProviderScoreBoard::global();
        let b = ProviderScoreBoard::global();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_outcome_kind_labels() {
        assert_eq!(OutcomeKind::ProviderError.as_str(), "provider_error");
        let json = serde_json::to_string(&OutcomeKind::SchemaInvalid).expect("test: ser");
        assert_eq!(json, "\"schema_invalid\"");
    }
}
