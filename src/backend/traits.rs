//! Core trait for queue providers.
//!
//! A provider is one configured, named connection to one queue backend. The
//! registry only talks to [`QueueProvider`], which keeps adapters for new
//! technologies (RabbitMQ, SQS, Kafka, Pub/Sub) pluggable.
//!
//! # Example: Implementing a Custom Provider
//!
//! ```rust,ignore
//! use queue_lens::backend::{ProviderError, QueueProvider};
//! use async_trait::async_trait;
//!
//! pub struct MyProvider { /* ... */ }
//!
//! #[async_trait]
//! impl QueueProvider for MyProvider {
//!     // Implement discovery, stats and job listing...
//! }
//! ```

use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{info, warn};

use super::error::ProviderError;
use crate::observability::models::{
    Capabilities, Job, Overview, ProviderType, QueueInfo, QueueJobStatus,
};

/// Default number of jobs returned by [`QueueProvider::jobs`] callers.
pub const DEFAULT_JOB_LIMIT: usize = 20;

/// Queues whose stats are fetched at the same time during an overview.
const OVERVIEW_STATS_CONCURRENCY: usize = 8;

/// Read-only access to one backend instance.
///
/// # Implementation Notes
///
/// - Each data operation owns its own connection and releases it on return
/// - Empty or unreadable status buckets count as zero, not as errors
/// - `health_check` never fails; it only reports liveness
#[async_trait]
pub trait QueueProvider: Send + Sync {
    /// Configured instance name (unique within the registry).
    fn name(&self) -> &str;

    fn provider_type(&self) -> ProviderType;

    fn capabilities(&self) -> Capabilities {
        self.provider_type().capabilities()
    }

    /// List queue names, sorted and deduplicated.
    async fn discover_queues(&self) -> Result<Vec<String>, ProviderError>;

    /// Count jobs per normalized status for one queue.
    async fn queue_stats(&self, queue: &str) -> Result<QueueInfo, ProviderError>;

    /// Fetch up to `limit` jobs of `status` from `queue`.
    async fn jobs(
        &self,
        queue: &str,
        status: QueueJobStatus,
        limit: usize,
    ) -> Result<Vec<Job>, ProviderError>;

    /// Cheap liveness check.
    async fn health_check(&self) -> bool;

    /// Discovery followed by stats for every discovered queue.
    ///
    /// Failures are folded into a disconnected [`Overview`] instead of being
    /// returned, so one instance can never abort a fan-out.
    async fn overview(&self) -> Overview {
        match collect_queue_infos(self).await {
            Ok(queues) => {
                info!(
                    instance = %self.name(),
                    queues = queues.len(),
                    "overview collected"
                );
                Overview::connected(self.name(), queues)
            }
            Err(e) => {
                warn!(instance = %self.name(), error = %e, "overview failed, instance disconnected");
                Overview::disconnected(self.name(), e.to_string())
            }
        }
    }
}

async fn collect_queue_infos<P>(provider: &P) -> Result<Vec<QueueInfo>, ProviderError>
where
    P: QueueProvider + ?Sized,
{
    let names = provider.discover_queues().await?;
    stream::iter(names)
        .map(|name| async move { provider.queue_stats(&name).await })
        .buffered(OVERVIEW_STATS_CONCURRENCY)
        .try_collect()
        .await
}
