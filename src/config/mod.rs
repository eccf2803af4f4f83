//! # Stage: Declarative Governance Configuration
//!
//! ## Responsibility
//! Parse, validate, and hot-reload the TOML file that tunes the governance
//! core: risk thresholds, bypass roles, the pending-request store, provider
//! routing with its crossover table, and observability.
//!
//! ## Guarantees
//! - Deterministic: same TOML input always produces the same `GovernanceConfig`
//! - Validated: all semantic constraints are checked before a config is accepted
//! - Complete defaults: an empty file is a valid config
//! - Hot-reloadable: file changes are detected and validated before applying
//! - Schema-exportable: JSON Schema output enables IDE autocomplete
//!
//! ## NOT Responsible For
//! - Building the gate or the orchestrator (callers wire components)
//! - Connecting to the pending store (that belongs to `approval`)

pub mod loader;
pub mod validation;
pub mod watcher;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::approval::{ApprovalConfig, RiskConfig};
use crate::routing::RoutingConfig;

// ── Default value functions ──────────────────────────────────────────────

fn default_service_name() -> String {
    "governance".to_string()
}

fn default_key_prefix() -> String {
    crate::approval::DEFAULT_KEY_PREFIX.to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

// ── Top-level config ─────────────────────────────────────────────────────

/// Root configuration for a governance instance.
///
/// # Example
///
/// ```toml
/// [service]
/// name = "survey-api"
///
/// [risk]
/// max_question_count = 25
///
/// [approval]
/// bypass_roles = ["tenant_admin", "super_admin"]
///
/// [approval.store]
/// backend = "redis"
/// redis_url = "redis://127.0.0.1:6379"
///
/// [routing]
/// primary_provider = "openai"
/// ```
///
/// # Panics
///
/// This type never panics during construction or access.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct GovernanceConfig {
    /// Service identity.
    #[serde(default)]
    pub service: ServiceSection,
    /// Pre-execution risk thresholds.
    #[serde(default)]
    pub risk: RiskConfig,
    /// Approval gate and pending-store settings.
    #[serde(default)]
    pub approval: ApprovalSection,
    /// Providers, primary provider, and the crossover table.
    #[serde(default)]
    pub routing: RoutingConfig,
    /// Logging and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// ── Service identity ─────────────────────────────────────────────────────

/// Service identity metadata, attached to startup logs.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ServiceSection {
    /// Human-readable service name.
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Optional instance identifier (hostname, pod name).
    #[serde(default)]
    pub instance_id: Option<String>,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            instance_id: None,
        }
    }
}

// ── Approval ─────────────────────────────────────────────────────────────

/// `[approval]` section: gate settings plus the store that backs them.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ApprovalSection {
    /// Gate settings (`bypass_roles`).
    #[serde(flatten)]
    pub gate: ApprovalConfig,
    /// Where pending requests are persisted.
    #[serde(default)]
    pub store: PendingStoreConfig,
}

/// Pending-request store backend.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    /// Process-local map. Single-instance deployments and demos only.
    #[default]
    Memory,
    /// Shared Redis instance (feature `redis-store`).
    Redis,
}

/// `[approval.store]` section.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct PendingStoreConfig {
    /// Which backend to use.
    #[serde(default)]
    pub backend: StoreBackend,
    /// Redis connection URL. Required when `backend = "redis"`.
    #[serde(default)]
    pub redis_url: Option<String>,
    /// Key namespace for pending records.
    #[serde(default = "default_key_prefix")]
    pub key_prefix: String,
    /// Optional record expiry in seconds.
    #[serde(default)]
    pub ttl_seconds: Option<u64>,
}

impl Default for PendingStoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: None,
            key_prefix: default_key_prefix(),
            ttl_seconds: None,
        }
    }
}

// ── Observability ────────────────────────────────────────────────────────

/// Observability configuration: logging format and metrics port.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ObservabilityConfig {
    /// Log output format.
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Port for the Prometheus metrics endpoint. `None` disables it.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: default_log_format(),
            metrics_port: None,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable, coloured output for development.
    Pretty,
    /// Structured JSON output for log aggregators.
    Json,
}

impl LogFormat {
    /// The string accepted by [`crate::init_tracing_with_format`].
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

/// Export the JSON Schema for [`GovernanceConfig`].
///
/// # Errors
///
/// Returns `Err` if schema serialization fails (should not happen).
pub fn export_schema() -> Result<String, serde_json::Error> {
    let schema = schemars::schema_for!(GovernanceConfig);
    serde_json::to_string_pretty(&schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let cfg: GovernanceConfig = toml::from_str("").expect("test: parse");
        assert_eq!(cfg, GovernanceConfig::default());
        assert_eq!(cfg.service.name, "governance");
        assert_eq!(cfg.approval.store.backend, StoreBackend::Memory);
        assert_eq!(
            cfg.approval.store.key_prefix,
            crate::approval::DEFAULT_KEY_PREFIX
        );
        assert_eq!(
            cfg.approval.gate.bypass_roles,
            vec!["tenant_admin", "super_admin"]
        );
    }

    #[test]
    fn test_approval_section_flattens_gate_fields() {
        let cfg: GovernanceConfig = toml::from_str(
            r#"
            [approval]
            bypass_roles = ["owner"]

            [approval.store]
            backend = "redis"
            redis_url = "redis://cache:6379"
            ttl_seconds = 604800
            "#,
        )
        .expect("test: parse");
        assert_eq!(cfg.approval.gate.bypass_roles, vec!["owner"]);
        assert_eq!(cfg.approval.store.backend, StoreBackend::Redis);
        assert_eq!(cfg.approval.store.key_prefix, "governance:pending");
        assert_eq!(cfg.approval.store.ttl_seconds, Some(604_800));
    }

    #[test]
    fn test_log_format_serializes_to_snake_case() {
        let json = serde_json::to_string(&LogFormat::Pretty).expect("test: serialization");
        assert_eq!(json, "\"pretty\"");
        assert_eq!(LogFormat::Json.as_str(), "json");
    }

    #[test]
    fn test_unknown_store_backend_rejected() {
        let result: Result<GovernanceConfig, _> = toml::from_str(
            r#"
            [approval.store]
            backend = "postgres"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_export_schema_produces_valid_json() {
        let schema = export_schema().expect("test: schema export");
        let parsed: serde_json::Value =
            serde_json::from_str(&schema).expect("test: schema is valid JSON");
        let props = parsed.get("properties").expect("test: properties");
        for section in ["service", "risk", "approval", "routing", "observability"] {
            assert!(props.get(section).is_some(), "missing {section}");
        }
    }
}
