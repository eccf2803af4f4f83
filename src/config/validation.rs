//! Configuration validation engine.
//!
//! ## Responsibility
//! Validate semantic constraints on a parsed [`GovernanceConfig`] that cannot
//! be expressed through the type system alone (range checks, cross-field
//! invariants, references between providers and the crossover table).
//!
//! ## Guarantees
//! - Every validation rule has at least one test that triggers it
//! - Validation collects *all* errors before returning (no short-circuit)
//! - Error messages include the field path and the invalid value
//!
//! ## NOT Responsible For
//! - Parsing TOML (that belongs to `loader`)
//! - File I/O (that belongs to `loader`)

use super::{GovernanceConfig, StoreBackend};
use crate::routing;

/// Errors arising from configuration parsing, validation, or I/O.
///
/// # Panics
///
/// This type never panics.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// TOML parsing failed.
    #[error("Parse error in {file}: {source}")]
    Parse {
        /// Path of the file that failed to parse.
        file: String,
        /// Underlying TOML deserialization error.
        #[source]
        source: toml::de::Error,
    },

    /// One or more semantic validation rules failed.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A specific field has an out-of-range or contradictory value.
    #[error("Field '{field}' has invalid value {value}: {reason}")]
    InvalidField {
        /// Dot-separated field path (e.g., "risk.max_context_trim_percent").
        field: String,
        /// String representation of the invalid value.
        value: String,
        /// Human-readable explanation of the constraint.
        reason: String,
    },

    /// File I/O error.
    #[error("IO error reading {file}: {source}")]
    Io {
        /// Path of the file that could not be read.
        file: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

/// Validate all semantic constraints on a [`GovernanceConfig`].
///
/// Collects every violation before returning so the caller sees the full
/// scope of issues at once.
///
/// # Errors
///
/// `Err(Vec<ConfigError>)` with every violation found.
///
/// # Panics
///
/// This function never panics.
pub fn validate(config: &GovernanceConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    // ── Service ──────────────────────────────────────────────────────
    if config.service.name.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "service.name".into(),
            value: String::new(),
            reason: "service name must not be empty".into(),
        });
    }

    // ── Risk thresholds ──────────────────────────────────────────────
    let trim = config.risk.max_context_trim_percent;
    if !trim.is_finite() || !(0.0..=1.0).contains(&trim) {
        errors.push(ConfigError::InvalidField {
            field: "risk.max_context_trim_percent".into(),
            value: trim.to_string(),
            reason: "must be between 0.0 and 1.0".into(),
        });
    }

    // ── Approval ─────────────────────────────────────────────────────
    if config
        .approval
        .gate
        .bypass_roles
        .iter()
        .any(|r| r.trim().is_empty())
    {
        errors.push(ConfigError::InvalidField {
            field: "approval.bypass_roles".into(),
            value: format!("{:?}", config.approval.gate.bypass_roles),
            reason: "roles must not be empty strings".into(),
        });
    }

    let store = &config.approval.store;
    if store.backend == StoreBackend::Redis
        && store.redis_url.as_deref().map_or(true, |u| u.trim().is_empty())
    {
        errors.push(ConfigError::InvalidField {
            field: "approval.store.redis_url".into(),
            value: String::new(),
            reason: "required when backend = \"redis\"".into(),
        });
    }

    if store.key_prefix.trim().is_empty() {
        errors.push(ConfigError::InvalidField {
            field: "approval.store.key_prefix".into(),
            value: String::new(),
            reason: "key prefix must not be empty".into(),
        });
    }

    if store.ttl_seconds == Some(0) {
        errors.push(ConfigError::InvalidField {
            field: "approval.store.ttl_seconds".into(),
            value: "0".into(),
            reason: "must be at least 1 second when set".into(),
        });
    }

    // ── Routing ──────────────────────────────────────────────────────
    for message in routing::config::validate(&config.routing) {
        errors.push(ConfigError::Validation(message));
    }

    // ── Observability ────────────────────────────────────────────────
    if config.observability.metrics_port == Some(0) {
        errors.push(ConfigError::InvalidField {
            field: "observability.metrics_port".into(),
            value: "0".into(),
            reason: "port must be between 1 and 65535".into(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
