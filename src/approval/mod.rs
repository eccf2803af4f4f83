//! # Stage: Admission Control
//!
//! ## Responsibility
//! Decide whether a generation request may run now, must wait for human
//! approval, or is being retried after a decision. Compose the
//! [`RiskAssessor`] with a role bypass and a durable
//! [`PendingRequestStore`].
//!
//! ## Guarantees
//! - Fail closed: a deferral that cannot be persisted is an error, never an
//!   allow.
//! - One store round trip per check, awaited before returning.
//! - Ownership: a user can only ride their own pending request.
//! - Reason strings are category labels, safe to display and log; the raw
//!   payload never appears in errors or logs.
//!
//! ## NOT Responsible For
//! - The upstream role/feature-flag check
//! - The approval action itself or record archival
//! - Cryptographic hashing (the payload hash is advisory)

pub mod gate;
pub mod hash;
#[cfg(feature = "redis-store")]
pub mod redis_store;
pub mod risk;
pub mod store;

pub use gate::{ApprovalConfig, ApprovalGate, GateDecision, GateRequest, RetryLookup};
pub use hash::{canonical_json, hash_payload};
#[cfg(feature = "redis-store")]
pub use redis_store::RedisPendingStore;
pub use risk::{HighRiskCheck, RiskAssessor, RiskConfig};
pub use store::{
    build_store, InMemoryPendingStore, NewPendingRequest, PendingRequest, PendingRequestStore,
    PendingStatus, StoreError, DEFAULT_KEY_PREFIX,
};
