//! Provider abstraction layer.
//!
//! This module provides the trait every queue technology implements and the
//! concrete BullMQ adapter, which reads BullMQ's Redis key layout directly.
//!
//! # Architecture
//!
//! - [`QueueProvider`]: discovery, stats, job listing and health for one instance
//! - [`ProviderError`]: backend-agnostic error type
//! - [`BullMqProvider`]: Redis/BullMQ implementation
//!
//! # Using the BullMQ Provider
//!
//! ```rust,ignore
//! use queue_lens::backend::{BullMqProvider, QueueProvider};
//! use queue_lens::config::{ConnectionConfig, ConnectionTimeouts};
//!
//! let config = ConnectionConfig::new("main", "127.0.0.1", 6379);
//! let provider = BullMqProvider::from_config(&config, ConnectionTimeouts::default())?;
//!
//! for queue in provider.discover_queues().await? {
//!     let info = provider.queue_stats(&queue).await?;
//!     println!("{}: {} jobs", info.name, info.total_jobs);
//! }
//! ```

pub mod bullmq;
mod error;
mod traits;

pub use error::ProviderError;

pub use traits::{QueueProvider, DEFAULT_JOB_LIMIT};

pub use bullmq::BullMqProvider;
