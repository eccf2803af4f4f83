//! Metrics HTTP server
//!
//! Exposes Prometheus metrics and the live provider scoreboard over HTTP.
//!
//! ## Usage
//!
//! ```no_run
//! use tokio_ai_governance::{metrics_server, ProviderScoreBoard};
//!
//! #[tokio::main]
//! async fn main() {
//!     let board = ProviderScoreBoard::global();
//!     let handle = tokio::spawn(metrics_server::start_server("0.0.0.0:9090", board));
//!
//!     // Your application code...
//!
//!     handle.abort();
//! }
//! ```
//!
//! ## Endpoints
//!
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /health` - Health check with gate/attempt counters
//! - `GET /scores` - JSON snapshot of every provider score and rank

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::routing::ProviderScoreBoard;

/// Build the router; split out so tests can drive handlers directly.
pub fn router(scoreboard: Arc<ProviderScoreBoard>) -> Router {
    Router::new()
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .route("/scores", get(scores_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(scoreboard)
}

/// Start the metrics HTTP server. Runs until the listener fails.
///
/// # Errors
///
/// Returns an error if `addr` does not parse or the port cannot be bound.
pub async fn start_server(
    addr: &str,
    scoreboard: Arc<ProviderScoreBoard>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr: SocketAddr = addr.parse()?;
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!(%addr, "metrics server ready");

    axum::serve(listener, router(scoreboard)).await?;

    Ok(())
}

async fn metrics_handler() -> Response {
    let metrics = crate::metrics::gather_metrics();

    (
        StatusCode::OK,
        [("Content-Type", "text/plain; version=0.0.4")],
        metrics,
    )
        .into_response()
}

async fn health_handler() -> Response {
    let summary = crate::metrics::get_metrics_summary();

    let health_status = serde_json::json!({
        "status": "healthy",
        "gate_decisions": summary.gate_decisions,
        "provider_attempts": summary.provider_attempts.values().sum::<u64>(),
        "providers_exhausted": summary.providers_exhausted,
    });

    json_response(&health_status)
}

async fn scores_handler(State(scoreboard): State<Arc<ProviderScoreBoard>>) -> Response {
    let scores: Vec<serde_json::Value> = scoreboard
        .snapshot()
        .into_iter()
        .map(|s| {
            let rank = ProviderScoreBoard::compute_rank(&s);
            serde_json::json!({ "rank": rank, "score": s })
        })
        .collect();

    json_response(&serde_json::Value::Array(scores))
}

fn json_response(body: &serde_json::Value) -> Response {
    (
        StatusCode::OK,
        [("Content-Type", "application/json")],
        serde_json::to_string_pretty(body)
            .unwrap_or_else(|_| r#"{"error":"serialization failed"}"#.to_string()),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routing::{Outcome, OutcomeKind};

    #[tokio::test]
    async fn test_health_endpoint_ok() {
        let response = health_handler().await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_scores_endpoint_lists_providers() {
        let board = Arc::new(ProviderScoreBoard::new());
        board.update_scores(&Outcome::new("openai", OutcomeKind::Success, 100));
        let response = scores_handler(State(board)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("test: body");
        let text = String::from_utf8(body.to_vec()).expect("test: utf8");
        assert!(text.contains("\"openai\""));
    }

    #[tokio::test]
    async fn test_start_server_rejects_bad_addr() {
        let result = start_server("not an addr", Arc::new(ProviderScoreBoard::new())).await;
        assert!(result.is_err());
    }
}
