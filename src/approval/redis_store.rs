//! Redis-backed pending-request store.
//!
//! ## Responsibility
//! Persist [`PendingRequest`] records as JSON strings under
//! `<prefix>:<id>` so that a deferral recorded on one instance can be
//! looked up by its retry on any other instance.
//!
//! ## Guarantees
//! - Insert is `SET key value NX [EX ttl]`: an id collision is surfaced as an
//!   error instead of silently overwriting another record.
//! - Every call is one round trip on a multiplexed async connection.
//! - Connection and command failures map to [`StoreError::Unavailable`].
//!
//! ## NOT Responsible For
//! - Archiving or expiring reviewed records beyond the optional TTL
//! - The approval action ([`PendingRequestStore::record_review`] is for
//!   operator tooling only)

use std::sync::Arc;

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use super::store::{
    NewPendingRequest, PendingRequest, PendingRequestStore, PendingStatus, StoreError,
};

/// Redis-backed [`PendingRequestStore`].
#[derive(Clone)]
pub struct RedisPendingStore {
    client: Arc<redis::Client>,
    key_prefix: String,
    ttl_seconds: Option<u64>,
}

impl std::fmt::Debug for RedisPendingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisPendingStore")
            .field("key_prefix", &self.key_prefix)
            .field("ttl_seconds", &self.ttl_seconds)
            .finish()
    }
}

impl RedisPendingStore {
    /// Open a store against `redis_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Unavailable`] if the URL cannot be parsed. No
    /// connection is made until the first operation.
    pub fn new(redis_url: &str, key_prefix: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| StoreError::Unavailable(format!("failed to open Redis client: {e}")))?;
        Ok(Self::from_client(Arc::new(client), key_prefix))
    }

    /// Wrap an existing client.
    pub fn from_client(client: Arc<redis::Client>, key_prefix: impl Into<String>) -> Self {
        Self {
            client,
            key_prefix: key_prefix.into(),
            ttl_seconds: None,
        }
    }

    /// Expire records `ttl_seconds` after insertion.
    pub fn with_ttl(mut self, ttl_seconds: u64) -> Self {
        self.ttl_seconds = Some(ttl_seconds);
        self
    }

    /// The Redis key holding record `id`.
    pub fn key_for(&self, id: &str) -> String {
        format!("{}:{id}", self.key_prefix)
    }

    async fn connection(&self) -> Result<redis::aio::MultiplexedConnection, StoreError> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unavailable(format!("failed to get connection: {e}")))
    }
}

#[async_trait]
impl PendingRequestStore for RedisPendingStore {
    async fn insert(&self, record: NewPendingRequest) -> Result<String, StoreError> {
        let id = uuid::Uuid::new_v4().to_string();
        let stored = PendingRequest::from_new(id.clone(), record);
        let body = serde_json::to_string(&stored)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut conn = self.connection().await?;
        let mut cmd = redis::cmd("SET");
        cmd.arg(self.key_for(&id)).arg(body).arg("NX");
        if let Some(ttl) = self.ttl_seconds {
            cmd.arg("EX").arg(ttl);
        }
        let result: Option<String> = cmd
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("SET NX failed: {e}")))?;

        match result.as_deref() {
            Some("OK") => {
                debug!(pending_request_id = %id, "pending record stored");
                Ok(id)
            }
            _ => Err(StoreError::Unavailable(format!(
                "pending id collision for {id}"
            ))),
        }
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<PendingRequest>, StoreError> {
        let mut conn = self.connection().await?;
        let body: Option<String> = conn
            .get(self.key_for(id))
            .await
            .map_err(|e| StoreError::Unavailable(format!("GET failed: {e}")))?;

        body.map(|raw| {
            serde_json::from_str::<PendingRequest>(&raw)
                .map_err(|e| StoreError::Serialization(e.to_string()))
        })
        .transpose()
    }

    async fn record_review(&self, id: &str, status: PendingStatus) -> Result<bool, StoreError> {
        let Some(mut record) = self.get_by_id(id).await? else {
            return Ok(false);
        };
        record.status = status;
        let body = serde_json::to_string(&record)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;

        let mut conn = self.connection().await?;
        let result: Option<String> = redis::cmd("SET")
            .arg(self.key_for(id))
            .arg(body)
            .arg("XX")
            .arg("KEEPTTL")
            .query_async(&mut conn)
            .await
            .map_err(|e| StoreError::Unavailable(format!("SET XX failed: {e}")))?;
        Ok(matches!(result.as_deref(), Some("OK")))
    }
}
