//! Normalized models for queue inspection.
//!
//! Every provider adapter maps its native representation into these types:
//! - [`QueueJobStatus`]: the closed five-value status taxonomy
//! - [`QueueStats`] / [`QueueInfo`]: per-queue aggregate state
//! - [`Job`]: a read-only projection of one work item
//! - [`Overview`]: one instance's full picture
//! - [`ProviderType`] / [`Capabilities`]: static per-backend metadata

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ============================================================================
// QueueJobStatus
// ============================================================================

/// Normalized job status shared by every backend.
///
/// Native statuses that have no counterpart here are folded into
/// [`QueueJobStatus::Pending`] by the adapters, so counts are never dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueJobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Delayed,
}

impl QueueJobStatus {
    pub const ALL: [QueueJobStatus; 5] = [
        QueueJobStatus::Pending,
        QueueJobStatus::Processing,
        QueueJobStatus::Completed,
        QueueJobStatus::Failed,
        QueueJobStatus::Delayed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            QueueJobStatus::Pending => "pending",
            QueueJobStatus::Processing => "processing",
            QueueJobStatus::Completed => "completed",
            QueueJobStatus::Failed => "failed",
            QueueJobStatus::Delayed => "delayed",
        }
    }
}

impl Default for QueueJobStatus {
    fn default() -> Self {
        QueueJobStatus::Pending
    }
}

impl fmt::Display for QueueJobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueJobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        QueueJobStatus::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown job status '{}'", s))
    }
}

// ============================================================================
// ProviderType / Capabilities
// ============================================================================

/// Queue technologies known to the registry.
///
/// Only [`ProviderType::RedisBullmq`] has an adapter today; the others are
/// declared so callers can reason about their capabilities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProviderType {
    #[serde(rename = "redis-bullmq")]
    RedisBullmq,
    #[serde(rename = "rabbitmq")]
    RabbitMq,
    #[serde(rename = "sqs")]
    Sqs,
    #[serde(rename = "kafka")]
    Kafka,
    #[serde(rename = "pubsub")]
    PubSub,
}

impl ProviderType {
    pub const ALL: [ProviderType; 5] = [
        ProviderType::RedisBullmq,
        ProviderType::RabbitMq,
        ProviderType::Sqs,
        ProviderType::Kafka,
        ProviderType::PubSub,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderType::RedisBullmq => "redis-bullmq",
            ProviderType::RabbitMq => "rabbitmq",
            ProviderType::Sqs => "sqs",
            ProviderType::Kafka => "kafka",
            ProviderType::PubSub => "pubsub",
        }
    }

    /// Static feature declaration for this backend type.
    pub fn capabilities(&self) -> Capabilities {
        match self {
            ProviderType::RedisBullmq => Capabilities {
                supports_delayed_jobs: true,
                supports_job_retry: true,
                supports_priority: true,
                supports_dead_letter: false,
                supports_job_progress: true,
                supports_multiple_queues: true,
            },
            ProviderType::RabbitMq => Capabilities {
                supports_delayed_jobs: false,
                supports_job_retry: true,
                supports_priority: true,
                supports_dead_letter: true,
                supports_job_progress: false,
                supports_multiple_queues: true,
            },
            ProviderType::Sqs => Capabilities {
                supports_delayed_jobs: true,
                supports_job_retry: true,
                supports_priority: false,
                supports_dead_letter: true,
                supports_job_progress: false,
                supports_multiple_queues: true,
            },
            ProviderType::Kafka => Capabilities {
                supports_delayed_jobs: false,
                supports_job_retry: false,
                supports_priority: false,
                supports_dead_letter: false,
                supports_job_progress: false,
                supports_multiple_queues: true,
            },
            ProviderType::PubSub => Capabilities {
                supports_delayed_jobs: false,
                supports_job_retry: true,
                supports_priority: false,
                supports_dead_letter: true,
                supports_job_progress: false,
                supports_multiple_queues: true,
            },
        }
    }
}

impl fmt::Display for ProviderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProviderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ProviderType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| format!("unknown provider type '{}'", s))
    }
}

/// What a provider type can express. Never changes at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub supports_delayed_jobs: bool,
    pub supports_job_retry: bool,
    pub supports_priority: bool,
    pub supports_dead_letter: bool,
    pub supports_job_progress: bool,
    pub supports_multiple_queues: bool,
}

// ============================================================================
// QueueStats / QueueInfo
// ============================================================================

/// Point-in-time job counts for one queue, one per normalized status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    pub pending: u64,
    pub processing: u64,
    pub completed: u64,
    pub failed: u64,
    /// `None` for backends without delayed delivery
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delayed: Option<u64>,
}

impl QueueStats {
    pub fn total(&self) -> u64 {
        self.pending + self.processing + self.completed + self.failed + self.delayed.unwrap_or(0)
    }

    /// Percentage of failed jobs, rounded to two decimals. Zero for an empty queue.
    pub fn failure_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        let rate = self.failed as f64 / total as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }

    pub fn count(&self, status: QueueJobStatus) -> u64 {
        match status {
            QueueJobStatus::Pending => self.pending,
            QueueJobStatus::Processing => self.processing,
            QueueJobStatus::Completed => self.completed,
            QueueJobStatus::Failed => self.failed,
            QueueJobStatus::Delayed => self.delayed.unwrap_or(0),
        }
    }
}

/// Aggregate state of one queue on one provider instance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueInfo {
    pub name: String,
    /// Owning instance name
    pub provider: String,
    pub provider_type: ProviderType,
    pub stats: QueueStats,
    pub total_jobs: u64,
    pub failure_rate: f64,
    /// Backend-specific flags such as `paused`
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl QueueInfo {
    /// Builds the record and derives `total_jobs` / `failure_rate` from `stats`.
    pub fn new(
        name: impl Into<String>,
        provider: impl Into<String>,
        provider_type: ProviderType,
        stats: QueueStats,
        metadata: Map<String, Value>,
    ) -> Self {
        Self {
            name: name.into(),
            provider: provider.into(),
            provider_type,
            total_jobs: stats.total(),
            failure_rate: stats.failure_rate(),
            stats,
            metadata,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.metadata
            .get("paused")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

// ============================================================================
// Job
// ============================================================================

/// A single work item, projected from the backend per query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub provider: String,
    pub status: QueueJobStatus,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stacktrace: Option<Vec<String>>,
    /// 0-100
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    /// Native fields without a normalized counterpart, kept verbatim
    #[serde(default)]
    pub provider_metadata: Map<String, Value>,
}

// ============================================================================
// Overview
// ============================================================================

/// One provider instance's snapshot: either connected with queues, or
/// disconnected with an error and nothing else.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Overview {
    pub instance: String,
    pub connected: bool,
    pub queues: Vec<QueueInfo>,
    pub total_queues: usize,
    pub total_jobs: u64,
    pub total_failed: u64,
    pub total_active: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Overview {
    pub fn connected(instance: impl Into<String>, queues: Vec<QueueInfo>) -> Self {
        let total_jobs = queues.iter().map(|q| q.stats.total()).sum();
        let total_failed = queues.iter().map(|q| q.stats.failed).sum();
        let total_active = queues.iter().map(|q| q.stats.processing).sum();
        Self {
            instance: instance.into(),
            connected: true,
            total_queues: queues.len(),
            queues,
            total_jobs,
            total_failed,
            total_active,
            error: None,
        }
    }

    pub fn disconnected(instance: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
            connected: false,
            queues: Vec::new(),
            total_queues: 0,
            total_jobs: 0,
            total_failed: 0,
            total_active: 0,
            error: Some(error.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stats(pending: u64, processing: u64, completed: u64, failed: u64, delayed: u64) -> QueueStats {
        QueueStats {
            pending,
            processing,
            completed,
            failed,
            delayed: Some(delayed),
        }
    }

    #[test]
    fn test_single_queue_totals_and_failure_rate() {
        let info = QueueInfo::new(
            "emails",
            "main",
            ProviderType::RedisBullmq,
            stats(5, 2, 80, 3, 1),
            Map::new(),
        );
        assert_eq!(info.total_jobs, 91);
        assert_eq!(info.failure_rate, 3.30);
    }

    #[test]
    fn test_failure_rate_is_zero_for_empty_queue() {
        let empty = QueueStats::default();
        assert_eq!(empty.total(), 0);
        assert_eq!(empty.failure_rate(), 0.0);
        assert!(!empty.failure_rate().is_nan());
    }

    #[test]
    fn test_total_ignores_missing_delayed_bucket() {
        let s = QueueStats {
            pending: 1,
            processing: 1,
            completed: 1,
            failed: 1,
            delayed: None,
        };
        assert_eq!(s.total(), 4);
        assert_eq!(s.failure_rate(), 25.0);
        let json = serde_json::to_value(s).unwrap();
        assert!(json.get("delayed").is_none());
    }

    #[test]
    fn test_overview_totals_are_sums_of_queue_stats() {
        let queues = vec![
            QueueInfo::new("a", "main", ProviderType::RedisBullmq, stats(1, 2, 3, 4, 5), Map::new()),
            QueueInfo::new("b", "main", ProviderType::RedisBullmq, stats(10, 0, 0, 6, 0), Map::new()),
        ];
        let overview = Overview::connected("main", queues);
        assert!(overview.connected);
        assert_eq!(overview.total_queues, 2);
        assert_eq!(overview.total_jobs, 15 + 16);
        assert_eq!(overview.total_failed, 10);
        assert_eq!(overview.total_active, 2);
        assert!(overview.error.is_none());
    }

    #[test]
    fn test_disconnected_overview_is_empty() {
        let overview = Overview::disconnected("down", "connection refused");
        assert!(!overview.connected);
        assert!(overview.queues.is_empty());
        assert_eq!(overview.total_jobs, 0);
        assert_eq!(overview.error.as_deref(), Some("connection refused"));

        let json = serde_json::to_value(&overview).unwrap();
        assert_eq!(json["totalQueues"], 0);
        assert_eq!(json["error"], "connection refused");
    }

    #[test]
    fn test_status_and_provider_type_wire_names() {
        assert_eq!(
            serde_json::to_value(QueueJobStatus::Processing).unwrap(),
            "processing"
        );
        assert_eq!("FAILED".parse::<QueueJobStatus>().unwrap(), QueueJobStatus::Failed);
        assert!("stalled".parse::<QueueJobStatus>().is_err());

        assert_eq!(
            serde_json::to_value(ProviderType::RedisBullmq).unwrap(),
            "redis-bullmq"
        );
        assert_eq!("sqs".parse::<ProviderType>().unwrap(), ProviderType::Sqs);
    }

    #[test]
    fn test_bullmq_capabilities() {
        let caps = ProviderType::RedisBullmq.capabilities();
        assert!(caps.supports_delayed_jobs);
        assert!(caps.supports_multiple_queues);
        assert!(!caps.supports_dead_letter);
        let json = serde_json::to_value(caps).unwrap();
        assert_eq!(json["supportsJobProgress"], true);
    }
}
