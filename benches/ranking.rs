//! Ranking and failover benchmarks.
//!
//! The scoreboard sits on every attempt's hot path: `update_scores` sorts the
//! latency window and `pick_ranked_providers` ranks every provider per
//! request. Both should stay well under a microsecond-scale budget next to a
//! network call.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tokio_ai_governance::{
    hash_payload, AttemptFailure, EchoBackend, FailingBackend, GenerationBackend, ModelResolver,
    Outcome, OutcomeKind, ProviderOrchestrator, ProviderScoreBoard,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn warmed_board(providers: usize) -> Arc<ProviderScoreBoard> {
    let board = Arc::new(ProviderScoreBoard::new());
    for p in 0..providers {
        for i in 0..20u64 {
            let kind = if i % 5 == 0 {
                OutcomeKind::Timeout
            } else {
                OutcomeKind::Success
            };
            board.update_scores(&Outcome::new(format!("p{p}"), kind, 500 + i * 100));
        }
    }
    board
}

// ---------------------------------------------------------------------------
// Bench: update_scores with a full latency window
// ---------------------------------------------------------------------------

fn bench_update_scores(c: &mut Criterion) {
    let board = warmed_board(1);
    let outcome = Outcome::new("p0", OutcomeKind::Success, 1234);

    c.bench_function("update_scores_full_window", |b| {
        b.iter(|| board.update_scores(black_box(&outcome)))
    });
}

// ---------------------------------------------------------------------------
// Bench: pick_ranked_providers across provider counts
// ---------------------------------------------------------------------------

fn bench_pick_ranked(c: &mut Criterion) {
    let mut group = c.benchmark_group("pick_ranked_providers");

    for count in [2usize, 5, 10] {
        let o = ProviderOrchestrator::new(warmed_board(count), ModelResolver::default());
        let names: Vec<String> = (0..count).map(|p| format!("p{p}")).collect();
        group.bench_with_input(BenchmarkId::new("providers", count), &names, |b, names| {
            b.iter(|| black_box(o.pick_ranked_providers(black_box(names))))
        });
    }

    group.finish();
}

// ---------------------------------------------------------------------------
// Bench: resolve + hash
// ---------------------------------------------------------------------------

fn bench_resolve_and_hash(c: &mut Criterion) {
    let resolver = ModelResolver::default();
    c.bench_function("resolve_crossover", |b| {
        b.iter(|| black_box(resolver.resolve(black_box("anthropic"), black_box("gpt-4o-mini"))))
    });

    let payload = json!({
        "topic": "engagement",
        "questions": 40,
        "sections": [{"title": "growth", "items": [1, 2, 3]}, {"title": "pay", "items": [4]}],
    });
    c.bench_function("hash_payload", |b| {
        b.iter(|| black_box(hash_payload(black_box(&payload))))
    });
}

// ---------------------------------------------------------------------------
// Bench: execute with one failover
// ---------------------------------------------------------------------------

fn bench_execute_failover(c: &mut Criterion) {
    let rt = Runtime::new().expect("runtime");
    let o = ProviderOrchestrator::new(Arc::new(ProviderScoreBoard::new()), ModelResolver::default());
    let backends: Vec<Arc<dyn GenerationBackend>> = vec![
        Arc::new(FailingBackend::new("openai", AttemptFailure::Timeout)),
        Arc::new(EchoBackend::new("anthropic")),
    ];

    c.bench_function("execute_with_failover", |b| {
        b.to_async(&rt).iter(|| async {
            let result = o.execute(&backends, "gpt-4o", &Value::Null).await;
            let _ = black_box(result);
        })
    });
}

criterion_group!(
    benches,
    bench_update_scores,
    bench_pick_ranked,
    bench_resolve_and_hash,
    bench_execute_failover
);
criterion_main!(benches);
