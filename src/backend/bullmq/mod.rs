//! BullMQ provider backed by Redis.
//!
//! This module reads BullMQ's key layout directly instead of going through a
//! BullMQ client, so any process that can reach the Redis instance can
//! inspect the queues.
//!
//! # Features
//!
//! - Queue discovery with a cursor-driven `SCAN` over `<prefix>:*:id`
//! - Per-queue stats summed over every bucket per status, read concurrently
//! - Pause state from the presence of `<prefix>:<queue>:paused`
//! - Job listing with BullMQ-only fields preserved as provider metadata
//!
//! # Usage
//!
//! ```rust,ignore
//! use queue_lens::backend::{BullMqProvider, QueueProvider};
//! use queue_lens::config::{ConnectionConfig, ConnectionTimeouts};
//! use queue_lens::observability::QueueJobStatus;
//!
//! let config = ConnectionConfig::new("main", "127.0.0.1", 6379);
//! let provider = BullMqProvider::from_config(&config, ConnectionTimeouts::default())?
//!     .with_scan_count(500);
//!
//! let failed = provider.jobs("emails", QueueJobStatus::Failed, 20).await?;
//! ```
//!
//! # Valkey Compatibility
//!
//! Valkey speaks the same protocol, so pointing the config at a Valkey
//! server works unchanged.

mod inspection;
mod keys;
mod state;
mod store;
#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;
use tracing::warn;

pub use keys::{BullKeys, DEFAULT_PREFIX};
pub use store::{KeyspaceStore, RedisConnector, RedisStore, StoreConnector};

use super::error::ProviderError;
use super::traits::QueueProvider;
use crate::config::{ConnectionConfig, ConnectionTimeouts};
use crate::observability::models::{Job, ProviderType, QueueInfo, QueueJobStatus};

/// Default SCAN COUNT hint.
pub const DEFAULT_SCAN_COUNT: usize = 100;

/// One named BullMQ instance.
///
/// Generic over the connector so the same logic runs against Redis and
/// against test doubles.
#[derive(Clone)]
pub struct BullMqProvider<C = RedisConnector> {
    name: String,
    keys: BullKeys,
    scan_count: usize,
    connector: C,
}

impl BullMqProvider<RedisConnector> {
    /// Builds a provider for a Redis connection config.
    ///
    /// No connection is opened here; each operation dials its own.
    pub fn from_config(
        config: &ConnectionConfig,
        timeouts: ConnectionTimeouts,
    ) -> Result<Self, ProviderError> {
        let connector = RedisConnector::new(config, timeouts)?;
        let provider = Self::with_connector(config.name.clone(), connector);
        Ok(match config.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => provider.with_prefix(prefix),
            _ => provider,
        })
    }
}

impl<C: StoreConnector> BullMqProvider<C> {
    pub fn with_connector(name: impl Into<String>, connector: C) -> Self {
        Self {
            name: name.into(),
            keys: BullKeys::default(),
            scan_count: DEFAULT_SCAN_COUNT,
            connector,
        }
    }

    /// Set the BullMQ key prefix (default `bull`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.keys = BullKeys::new(prefix);
        self
    }

    /// Set the SCAN COUNT hint used during discovery.
    pub fn with_scan_count(mut self, scan_count: usize) -> Self {
        self.scan_count = scan_count.max(1);
        self
    }

    pub fn keys(&self) -> &BullKeys {
        &self.keys
    }

    async fn connect(&self) -> Result<C::Store, ProviderError> {
        self.connector.connect().await.map_err(|e| {
            warn!(
                instance = %self.name,
                target = %self.connector.describe(),
                error = %e,
                "BullMQ connection failed"
            );
            e
        })
    }
}

#[async_trait]
impl<C: StoreConnector> QueueProvider for BullMqProvider<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::RedisBullmq
    }

    async fn discover_queues(&self) -> Result<Vec<String>, ProviderError> {
        let store = self.connect().await?;
        inspection::discover_queues(&store, &self.keys, self.scan_count).await
    }

    async fn queue_stats(&self, queue: &str) -> Result<QueueInfo, ProviderError> {
        let store = self.connect().await?;
        Ok(inspection::queue_stats(&store, &self.keys, &self.name, queue).await)
    }

    async fn jobs(
        &self,
        queue: &str,
        status: QueueJobStatus,
        limit: usize,
    ) -> Result<Vec<Job>, ProviderError> {
        let store = self.connect().await?;
        inspection::fetch_jobs(&store, &self.keys, &self.name, queue, status, limit).await
    }

    async fn health_check(&self) -> bool {
        let store = match self.connect().await {
            Ok(store) => store,
            Err(_) => return false,
        };
        match store.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!(instance = %self.name, error = %e, "BullMQ health check failed");
                false
            }
        }
    }
}
