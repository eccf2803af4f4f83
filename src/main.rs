//! Demo binary for tokio-ai-governance
//!
//! Walks a high-risk request through deferral, out-of-band approval and
//! retry, then runs it through provider failover.
//!
//! ## Environment Variables
//!
//! - `GOVERNANCE_CONFIG`: path to the TOML config (default: `governance.toml`;
//!   built-in defaults if the file is absent)
//! - `LOG_FORMAT=json`: overrides `[observability].log_format`
//! - `RUST_LOG=info`: log level filter

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;
use tokio_ai_governance::config::{loader, GovernanceConfig};
use tokio_ai_governance::{
    build_store, init_tracing_with_format, metrics, ApprovalGate, AttemptFailure, EchoBackend,
    FailingBackend, GateRequest, GenerationBackend, ModelResolver, PendingRequestStore,
    PendingStatus, ProviderOrchestrator, ProviderScoreBoard, RiskAssessor,
};
use tracing::{info, warn};

fn load_config() -> Result<GovernanceConfig, Box<dyn std::error::Error>> {
    let path = PathBuf::from(
        std::env::var("GOVERNANCE_CONFIG").unwrap_or_else(|_| "governance.toml".to_string()),
    );
    if path.exists() {
        Ok(loader::load_from_file(&path)?)
    } else {
        Ok(GovernanceConfig::default())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    let format = std::env::var("LOG_FORMAT")
        .unwrap_or_else(|_| config.observability.log_format.as_str().to_string());
    let _ = init_tracing_with_format(&format);

    metrics::init_metrics()?;

    info!(
        service = %config.service.name,
        routing_version = %config.routing.version,
        "starting governance demo"
    );

    // ── Admission control ──────────────────────────────────────────────
    let store = build_store(&config.approval.store)?;
    info!(backend = ?config.approval.store.backend, "pending store ready");
    let gate = ApprovalGate::new(
        RiskAssessor::new(config.risk.clone()),
        config.approval.gate.clone(),
        Arc::clone(&store),
    );

    let payload = json!({
        "topic": "quarterly engagement survey",
        "question_count": 40,
        "audience": "all-staff",
    });
    let mut request = GateRequest {
        tenant_id: "acme".into(),
        user_id: "u-42".into(),
        user_role: "employee".into(),
        feature: "survey_generation".into(),
        question_count: 40,
        enable_critic_pass: true,
        context_trim_percent: Some(0.3),
        pending_request_id: None,
        request_payload: payload.clone(),
    };

    let first = gate.check(&request).await?;
    info!(allowed = first.allowed, reasons = ?first.reasons, "first submission");

    let Some(pending_id) = first.pending_request_id.clone() else {
        info!("request was not deferred; nothing to approve");
        return Ok(());
    };

    request.pending_request_id = Some(pending_id.clone());
    let early = gate.check(&request).await?;
    info!(allowed = early.allowed, reasons = ?early.reasons, "retry before review");

    // Plays the out-of-band reviewer.
    store.record_review(&pending_id, PendingStatus::Approved).await?;
    let approved = gate.check(&request).await?;
    info!(allowed = approved.allowed, "retry after approval");

    // ── Provider failover ──────────────────────────────────────────────
    let scoreboard = Arc::new(ProviderScoreBoard::new());
    #[cfg(feature = "metrics-server")]
    if let Some(port) = config.observability.metrics_port {
        let board = Arc::clone(&scoreboard);
        tokio::spawn(async move {
            let addr = format!("0.0.0.0:{port}");
            if let Err(e) = tokio_ai_governance::metrics_server::start_server(&addr, board).await {
                warn!(error = %e, "metrics server stopped");
            }
        });
    }

    let orchestrator =
        ProviderOrchestrator::new(Arc::clone(&scoreboard), ModelResolver::new(&config.routing));

    let backends: Vec<Arc<dyn GenerationBackend>> = vec![
        Arc::new(FailingBackend::new(
            "openai",
            AttemptFailure::ProviderError("503 service unavailable".into()),
        )),
        Arc::new(EchoBackend::new("anthropic").with_delay(20)),
    ];

    for round in 0..3 {
        match orchestrator.execute(&backends, "gpt-4o-mini", &payload).await {
            Ok(report) => info!(
                round,
                provider = %report.provider,
                model = %report.model,
                attempts = report.outcomes.len(),
                "generation complete"
            ),
            Err(e) => warn!(round, error = %e, "generation failed"),
        }
    }

    for score in scoreboard.snapshot() {
        info!(
            provider = %score.provider,
            total_calls = score.total_calls,
            p95_latency_ms = score.p95_latency_ms,
            rank = ProviderScoreBoard::compute_rank(&score),
            "provider score"
        );
    }

    info!("demo complete");
    Ok(())
}
