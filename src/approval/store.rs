//! Pending-request records and the durable store seam.
//!
//! ## Responsibility
//! Define the [`PendingRequest`] record and the two operations the gate
//! needs from durable storage: `insert` and `get_by_id`. Build the store
//! selected by `[approval.store]` via [`build_store`].
//!
//! ## Guarantees
//! - Records are immutable from this crate's point of view; only the
//!   external approval action changes `status`.
//! - `Debug` output never includes the raw payload.
//!
//! ## NOT Responsible For
//! - Archiving or deleting records (external process)
//! - The approval UI/action itself

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::config::{PendingStoreConfig, StoreBackend};

/// Default key namespace for pending records in a shared store.
pub const DEFAULT_KEY_PREFIX: &str = "governance:pending";

/// Persisted lifecycle status of a pending request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PendingStatus {
    /// Awaiting an administrator decision.
    Pending,
    /// Approved; the owner's retry will be allowed.
    Approved,
    /// Rejected; the owner's retry will be refused.
    Rejected,
}

impl PendingStatus {
    /// Stable lowercase label (`pending`, `approved`, `rejected`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for PendingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A deferred request, before the store has assigned it an id.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPendingRequest {
    /// Tenant the request belongs to.
    pub tenant_id: String,
    /// User who submitted the request; the only user allowed to retry it.
    pub user_id: String,
    /// Feature that produced the request (e.g. `survey_generation`).
    pub feature: String,
    /// Canonical payload fingerprint, see [`super::hash_payload`].
    pub payload_hash: String,
    /// The original request payload, kept for the reviewer.
    pub payload: Value,
    /// Risk reasons that caused the deferral, in rule order.
    pub risk_reasons: Vec<String>,
    /// When the deferral was recorded.
    pub created_at: DateTime<Utc>,
}

impl fmt::Debug for NewPendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewPendingRequest")
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("feature", &self.feature)
            .field("payload_hash", &self.payload_hash)
            .field("payload", &"<redacted>")
            .field("risk_reasons", &self.risk_reasons)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A durable record of a deferred high-risk request.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequest {
    /// Store-assigned unique id.
    pub id: String,
    /// Tenant the request belongs to.
    pub tenant_id: String,
    /// User who submitted the request.
    pub user_id: String,
    /// Feature that produced the request.
    pub feature: String,
    /// Canonical payload fingerprint.
    pub payload_hash: String,
    /// The original request payload.
    pub payload: Value,
    /// Risk reasons that caused the deferral.
    pub risk_reasons: Vec<String>,
    /// Current lifecycle status.
    pub status: PendingStatus,
    /// When the deferral was recorded.
    pub created_at: DateTime<Utc>,
}

impl PendingRequest {
    /// Materialise a freshly inserted record with status `pending`.
    pub fn from_new(id: impl Into<String>, new: NewPendingRequest) -> Self {
        Self {
            id: id.into(),
            tenant_id: new.tenant_id,
            user_id: new.user_id,
            feature: new.feature,
            payload_hash: new.payload_hash,
            payload: new.payload,
            risk_reasons: new.risk_reasons,
            status: PendingStatus::Pending,
            created_at: new.created_at,
        }
    }
}

impl fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("tenant_id", &self.tenant_id)
            .field("user_id", &self.user_id)
            .field("feature", &self.feature)
            .field("payload_hash", &self.payload_hash)
            .field("payload", &"<redacted>")
            .field("risk_reasons", &self.risk_reasons)
            .field("status", &self.status)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Errors surfaced by a [`PendingRequestStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store could not be reached or rejected the operation.
    #[error("pending store unavailable: {0}")]
    Unavailable(String),

    /// A stored record could not be encoded or decoded.
    #[error("pending record serialization failed: {0}")]
    Serialization(String),
}

/// Durable keyed store for pending requests.
///
/// Must be reachable from every instance: a deferral and its approved retry
/// may land on different instances.
#[async_trait]
pub trait PendingRequestStore: Send + Sync {
    /// Persist a new record with status `pending` and return its id.
    async fn insert(&self, record: NewPendingRequest) -> Result<String, StoreError>;

    /// Fetch a record by id. `Ok(None)` when the id is unknown.
    async fn get_by_id(&self, id: &str) -> Result<Option<PendingRequest>, StoreError>;

    /// Record a reviewer's decision. `Ok(false)` when the id is unknown.
    ///
    /// Operator tooling only; the gate never calls this. Stores that are
    /// written by an external review process keep the default.
    async fn record_review(&self, id: &str, status: PendingStatus) -> Result<bool, StoreError> {
        let _ = (id, status);
        Err(StoreError::Unavailable(
            "this store does not accept review decisions".to_string(),
        ))
    }
}

/// Build the pending store selected by `[approval.store]`.
///
/// # Errors
///
/// Returns [`StoreError::Unavailable`] when `backend = "redis"` and the URL
/// is missing or malformed, or the crate was built without the
/// `redis-store` feature. No connection is made here.
pub fn build_store(
    config: &PendingStoreConfig,
) -> Result<Arc<dyn PendingRequestStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(InMemoryPendingStore::new())),
        StoreBackend::Redis => build_redis_store(config),
    }
}

#[cfg(feature = "redis-store")]
fn build_redis_store(
    config: &PendingStoreConfig,
) -> Result<Arc<dyn PendingRequestStore>, StoreError> {
    let url = config
        .redis_url
        .as_deref()
        .ok_or_else(|| StoreError::Unavailable("redis_url is not set".to_string()))?;
    let mut store = super::redis_store::RedisPendingStore::new(url, config.key_prefix.clone())?;
    if let Some(ttl) = config.ttl_seconds {
        store = store.with_ttl(ttl);
    }
    Ok(Arc::new(store))
}

#[cfg(not(feature = "redis-store"))]
fn build_redis_store(
    _config: &PendingStoreConfig,
) -> Result<Arc<dyn PendingRequestStore>, StoreError> {
    Err(StoreError::Unavailable(
        "redis backend requires the `redis-store` feature".to_string(),
    ))
}

/// Process-local pending store.
///
/// Suitable for tests, demos, and single-instance deployments. Clones share
/// the same map.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPendingStore {
    records: Arc<RwLock<HashMap<String, PendingRequest>>>,
}

impl InMemoryPendingStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reviewer's decision on a pending request.
    ///
    /// Stands in for the out-of-band approval action. Returns `false` if
    /// the id is unknown.
    pub async fn apply_review(&self, id: &str, status: PendingStatus) -> bool {
        let mut records = self.records.write().await;
        match records.get_mut(id) {
            Some(record) => {
                record.status = status;
                true
            }
            None => false,
        }
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// `true` when no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl PendingRequestStore for InMemoryPendingStore {
    async fn insert(&self, record: NewPendingRequest) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let stored = PendingRequest::from_new(id.clone(), record);
        self.records.write().await.insert(id.clone(), stored);
        Ok(id)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<PendingRequest>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn record_review(&self, id: &str, status: PendingStatus) -> Result<bool, StoreError> {
        Ok(self.apply_review(id, status).await)
    }
}
