//! Admission-control gate.
//!
//! ## State machine
//!
//! ```text
//!                    ┌─ pending_request_id? ─┐
//!                    │ yes                   │ no
//!                    ▼                       ▼
//!             store.get_by_id          validate + assess
//!        ┌──────┬────┴────┬──────┐      ┌─────┼──────────────┐
//!   not_found not_owner approved other  low  high+admin   high+other
//!      deny     deny    ALLOW   deny   ALLOW  ALLOW(+why)  insert → DEFER(id)
//! ```
//!
//! Exactly one store round trip per call (lookup on retry, insert on
//! defer), awaited before the decision is returned. A failed insert is an
//! error, never an allow.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use super::hash::hash_payload;
use super::risk::RiskAssessor;
use super::store::{NewPendingRequest, PendingRequest, PendingRequestStore, PendingStatus};
use crate::clock::{system_clock, Clock};
use crate::{metrics, GovernanceError};

fn default_bypass_roles() -> Vec<String> {
    vec!["tenant_admin".to_string(), "super_admin".to_string()]
}

/// Approval-gate settings.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ApprovalConfig {
    /// Roles whose high-risk requests proceed immediately. Their risk
    /// reasons are still returned so the bypass is auditable.
    #[serde(default = "default_bypass_roles")]
    pub bypass_roles: Vec<String>,
}

impl Default for ApprovalConfig {
    fn default() -> Self {
        Self {
            bypass_roles: default_bypass_roles(),
        }
    }
}

/// A request presented to the gate.
///
/// The upstream role/feature check has already passed by the time this is
/// built.
#[derive(Clone, Serialize, Deserialize)]
pub struct GateRequest {
    /// Tenant issuing the request.
    pub tenant_id: String,
    /// Authenticated user issuing the request.
    pub user_id: String,
    /// The user's role within the tenant (e.g. `employee`, `tenant_admin`).
    pub user_role: String,
    /// Feature the request belongs to.
    pub feature: String,
    /// Number of questions to generate.
    pub question_count: u32,
    /// Whether the extra critic pass is requested.
    #[serde(default)]
    pub enable_critic_pass: bool,
    /// Fraction of the source context trimmed to fit, if any.
    #[serde(default)]
    pub context_trim_percent: Option<f64>,
    /// Id of a previously deferred request being retried.
    #[serde(default)]
    pub pending_request_id: Option<String>,
    /// Opaque request payload, stored for the reviewer on deferral.
    pub request_payload: Value,
}

impl std::fmt::Debug for GateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GateRequest")
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("user_role", &self.user_role)
            .field("feature", &self.feature)
            .field("question_count", &self.question_count)
            .field("enable_critic_pass", &self.enable_critic_pass)
            .field("context_trim_percent", &self.context_trim_percent)
            .field("pending_request_id", &self.pending_request_id)
            .field("request_payload", &"<redacted>")
            .finish()
    }
}

/// The gate's answer.
///
/// `allowed == false` with a `pending_request_id` means "deferred, needs
/// approval": the caller must surface the id and resend it on retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateDecision {
    /// Whether the request may proceed now.
    pub allowed: bool,
    /// Id of the pending record this decision refers to, if any.
    pub pending_request_id: Option<String>,
    /// Category labels explaining the decision. Safe to display and log.
    pub reasons: Vec<String>,
}

impl GateDecision {
    fn allow(reasons: Vec<String>) -> Self {
        Self {
            allowed: true,
            pending_request_id: None,
            reasons,
        }
    }

    fn deny(pending_request_id: Option<String>, reasons: Vec<String>) -> Self {
        Self {
            allowed: false,
            pending_request_id,
            reasons,
        }
    }

    /// `true` when the request was deferred pending approval.
    pub fn is_deferred(&self) -> bool {
        !self.allowed && self.pending_request_id.is_some()
    }
}

/// Outcome of looking up a pending request on the retry path.
///
/// `NotFound` and `NotOwner` are synthesised here and never persisted;
/// `Found` carries one of the three real statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryLookup {
    /// No record with that id.
    NotFound,
    /// The record belongs to a different user.
    NotOwner,
    /// The caller owns the record; its persisted status.
    Found(PendingStatus),
}

impl RetryLookup {
    /// Classify a fetched record against the retrying user.
    pub fn classify(record: Option<&PendingRequest>, user_id: &str) -> Self {
        match record {
            None => Self::NotFound,
            Some(r) if r.user_id != user_id => Self::NotOwner,
            Some(r) => Self::Found(r.status),
        }
    }

    /// The `pending_status_<x>` reason label for this outcome.
    pub fn reason(&self) -> String {
        let label = match self {
            Self::NotFound => "not_found",
            Self::NotOwner => "not_owner",
            Self::Found(status) => status.as_str(),
        };
        format!("pending_status_{label}")
    }

    /// `true` only for an owned, approved record.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Found(PendingStatus::Approved))
    }

    /// `true` only for an owned record still awaiting review. Every other
    /// denied outcome is terminal and must not be reported as deferred.
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Found(PendingStatus::Pending))
    }
}

/// Admission-control gate for generation requests.
#[derive(Clone)]
pub struct ApprovalGate {
    assessor: RiskAssessor,
    config: ApprovalConfig,
    store: Arc<dyn PendingRequestStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for ApprovalGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApprovalGate")
            .field("assessor", &self.assessor)
            .field("config", &self.config)
            .finish()
    }
}

impl ApprovalGate {
    /// Create a gate over `store` using the system clock.
    pub fn new(
        assessor: RiskAssessor,
        config: ApprovalConfig,
        store: Arc<dyn PendingRequestStore>,
    ) -> Self {
        Self {
            assessor,
            config,
            store,
            clock: system_clock(),
        }
    }

    /// Replace the clock used to stamp `created_at`.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Return `true` if `role` may bypass deferral.
    pub fn is_bypass_role(&self, role: &str) -> bool {
        self.config.bypass_roles.iter().any(|r| r == role)
    }

    /// Decide whether `request` may proceed now.
    ///
    /// # Errors
    ///
    /// - [`GovernanceError::Validation`] for malformed risk inputs, before
    ///   any store interaction.
    /// - [`GovernanceError::Persistence`] if the store fails. The gate
    ///   never answers "allowed" when it could not record or read a
    ///   deferral.
    pub async fn check(&self, request: &GateRequest) -> Result<GateDecision, GovernanceError> {
        let result = match request.pending_request_id.as_deref() {
            Some(id) => self.check_retry(request, id).await,
            None => self.check_fresh(request).await,
        };
        if result.is_err() {
            metrics::inc_gate_decision("error");
        }
        result
    }

    async fn check_retry(
        &self,
        request: &GateRequest,
        id: &str,
    ) -> Result<GateDecision, GovernanceError> {
        let record = self.store.get_by_id(id).await.map_err(|e| {
            error!(
                tenant_id = %request.tenant_id,
                pending_request_id = %id,
                error = %e,
                "pending lookup failed"
            );
            GovernanceError::from(e)
        })?;

        let lookup = RetryLookup::classify(record.as_ref(), &request.user_id);

        if lookup.is_approved() {
            if let Some(record) = &record {
                let retry_hash = hash_payload(&request.request_payload);
                if retry_hash != record.payload_hash {
                    warn!(
                        pending_request_id = %id,
                        approved_hash = %record.payload_hash,
                        retry_hash = %retry_hash,
                        "retry payload differs from approved payload"
                    );
                }
            }
            info!(
                tenant_id = %request.tenant_id,
                user_id = %request.user_id,
                pending_request_id = %id,
                "approved retry admitted"
            );
            metrics::inc_gate_decision("retry_approved");
            return Ok(GateDecision::allow(Vec::new()));
        }

        if lookup == RetryLookup::NotOwner {
            warn!(
                tenant_id = %request.tenant_id,
                user_id = %request.user_id,
                pending_request_id = %id,
                "retry on pending request owned by another user"
            );
        }
        metrics::inc_gate_decision("retry_denied");
        let still_pending = lookup.is_pending().then(|| id.to_string());
        Ok(GateDecision::deny(still_pending, vec![lookup.reason()]))
    }

    async fn check_fresh(&self, request: &GateRequest) -> Result<GateDecision, GovernanceError> {
        if request.user_id.trim().is_empty() {
            return Err(GovernanceError::Validation(
                "user_id must not be empty".to_string(),
            ));
        }
        RiskAssessor::validate_inputs(request.context_trim_percent)?;

        let check = self.assessor.detect_high_risk(
            request.question_count,
            request.enable_critic_pass,
            request.context_trim_percent,
        );

        if !check.is_high_risk {
            metrics::inc_gate_decision("allowed");
            return Ok(GateDecision::allow(Vec::new()));
        }

        if self.is_bypass_role(&request.user_role) {
            info!(
                tenant_id = %request.tenant_id,
                user_id = %request.user_id,
                role = %request.user_role,
                feature = %request.feature,
                reasons = ?check.reasons,
                "high-risk request admitted via admin bypass"
            );
            metrics::inc_gate_decision("admin_bypass");
            return Ok(GateDecision::allow(check.reasons));
        }

        let payload_hash = hash_payload(&request.request_payload);
        let record = NewPendingRequest {
            tenant_id: request.tenant_id.clone(),
            user_id: request.user_id.clone(),
            feature: request.feature.clone(),
            payload_hash: payload_hash.clone(),
            payload: request.request_payload.clone(),
            risk_reasons: check.reasons.clone(),
            created_at: self.clock.now(),
        };

        let id = self.store.insert(record).await.map_err(|e| {
            error!(
                tenant_id = %request.tenant_id,
                feature = %request.feature,
                payload_hash = %payload_hash,
                error = %e,
                "failed to persist pending request; refusing high-risk request"
            );
            GovernanceError::from(e)
        })?;

        info!(
            tenant_id = %request.tenant_id,
            user_id = %request.user_id,
            feature = %request.feature,
            payload_hash = %payload_hash,
            pending_request_id = %id,
            reasons = ?check.reasons,
            "high-risk request deferred for approval"
        );
        metrics::inc_gate_decision("deferred");
        Ok(GateDecision::deny(Some(id), check.reasons))
    }
}
