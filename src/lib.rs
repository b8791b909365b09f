//! # queue-lens
//!
//! Read-only introspection for job queues. Queue technologies sit behind the
//! [`QueueProvider`] trait and report a shared model (queues, stats, jobs,
//! five canonical job states); the first provider reads BullMQ's Redis key
//! layout directly.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use queue_lens::config::{ConnectionSource, Settings};
//! use queue_lens::{JsonQueryLibrary, ProviderRegistry, QueueInspector, QueryRequest};
//!
//! let settings = Settings::from_env();
//! let configs = ConnectionSource::env_default().resolve()?;
//! let registry = ProviderRegistry::from_configs(&configs, settings.timeouts, settings.scan_count)?;
//!
//! // One overview per instance; unreachable instances come back disconnected
//! for overview in registry.overview_all(None).await {
//!     println!("{}: connected={} jobs={}", overview.instance, overview.connected, overview.total_jobs);
//! }
//!
//! let inspector = QueueInspector::new(Arc::new(registry), Arc::new(JsonQueryLibrary::builtin()?));
//! let failed = inspector
//!     .execute(QueryRequest::reference("queueQueries.jobFilters.failed_jobs_v1-0-0"))
//!     .await?;
//! ```

pub mod backend;
pub mod config;
pub mod observability;

pub use backend::{BullMqProvider, ProviderError, QueueProvider};
pub use config::{ConfigError, ConnectionConfig, ConnectionSource, Settings};
pub use observability::{
    queue_api, JsonQueryLibrary, Overview, ProviderRegistry, QueryRequest, QueryResult,
    QueueInspector, QueueJobStatus,
};
