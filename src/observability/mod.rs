//! Normalized queue model, provider registry and query execution.
//!
//! This module provides:
//! - [`models`]: the provider-agnostic vocabulary every adapter produces
//! - [`ProviderRegistry`]: named instances with per-instance failure isolation
//! - [`QueueInspector`]: inline and referenced query execution
//! - [`queue_api`]: the HTTP surface over all of the above

mod api;
pub mod inspector;
pub mod models;
pub mod query;
pub mod registry;

// Re-export models
pub use models::{
    Capabilities, Job, Overview, ProviderType, QueueInfo, QueueJobStatus, QueueStats,
};

pub use inspector::{QueryResult, QueueInspector};
pub use query::{InlineQuery, JsonQueryLibrary, QueryError, QueryLibrary, QueryRequest};
pub use registry::{ProviderDescriptor, ProviderRegistry, RegistryError};

// Re-export HTTP routes
pub use api::{queue_api, ApiError};
