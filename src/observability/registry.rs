//! Named provider instances and the dispatch surface over them.
//!
//! The registry is built once from configuration and only read afterwards,
//! so it is shared behind an `Arc` without locking. Lookups are local; only
//! the fan-out helpers touch the network, and they isolate each instance's
//! failure from its siblings.

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::backend::{BullMqProvider, ProviderError, QueueProvider};
use crate::config::{ConfigError, ConnectionConfig, ConnectionTimeouts};
use crate::observability::models::{Capabilities, Overview, ProviderType};

/// Errors raised by registry lookups and construction.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("provider not found: {0}")]
    ProviderNotFound(String),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Summary of one registered instance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderDescriptor {
    pub name: String,
    pub provider_type: ProviderType,
    pub capabilities: Capabilities,
}

/// Configured provider instances keyed by name.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    instances: BTreeMap<String, Arc<dyn QueueProvider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds one BullMQ provider per config.
    pub fn from_configs(
        configs: &[ConnectionConfig],
        timeouts: ConnectionTimeouts,
        scan_count: usize,
    ) -> Result<Self, RegistryError> {
        let mut registry = Self::new();
        for config in configs {
            let provider = BullMqProvider::from_config(config, timeouts)?.with_scan_count(scan_count);
            registry.register(Arc::new(provider))?;
        }
        Ok(registry)
    }

    /// Adds an instance; names must be unique.
    pub fn register(&mut self, provider: Arc<dyn QueueProvider>) -> Result<(), RegistryError> {
        let name = provider.name().to_string();
        if self.instances.contains_key(&name) {
            return Err(ConfigError::DuplicateInstance(name).into());
        }
        self.instances.insert(name, provider);
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    /// Instance names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.instances.keys().map(String::as_str)
    }

    /// Resolves a provider key: an instance name, or a provider-type key
    /// (`redis-bullmq`) meaning the first instance of that type by name.
    pub fn get(&self, key: &str) -> Result<Arc<dyn QueueProvider>, RegistryError> {
        if let Some(provider) = self.instances.get(key) {
            return Ok(provider.clone());
        }
        key.parse::<ProviderType>()
            .ok()
            .and_then(|kind| {
                self.instances
                    .values()
                    .find(|p| p.provider_type() == kind)
                    .cloned()
            })
            .ok_or_else(|| RegistryError::ProviderNotFound(key.to_string()))
    }

    /// Static capabilities for an instance name or provider-type key. Never
    /// contacts the backend.
    pub fn capabilities(&self, key: &str) -> Result<Capabilities, RegistryError> {
        if let Some(provider) = self.instances.get(key) {
            return Ok(provider.capabilities());
        }
        key.parse::<ProviderType>()
            .map(|kind| kind.capabilities())
            .map_err(|_| RegistryError::ProviderNotFound(key.to_string()))
    }

    pub fn describe(&self) -> Vec<ProviderDescriptor> {
        self.instances
            .values()
            .map(|p| ProviderDescriptor {
                name: p.name().to_string(),
                provider_type: p.provider_type(),
                capabilities: p.capabilities(),
            })
            .collect()
    }

    /// Overviews of every instance (optionally of one type), computed
    /// concurrently. Always one entry per selected instance, in name order;
    /// a failing instance shows up as disconnected.
    pub async fn overview_all(&self, kind: Option<ProviderType>) -> Vec<Overview> {
        let selected: Vec<_> = self
            .instances
            .values()
            .filter(|p| kind.map_or(true, |k| p.provider_type() == k))
            .collect();

        let overviews = join_all(selected.iter().map(|p| p.overview())).await;

        let connected = overviews.iter().filter(|o| o.connected).count();
        info!(
            instances = overviews.len(),
            connected,
            disconnected = overviews.len() - connected,
            "overview fan-out complete"
        );
        overviews
    }

    /// Liveness of every instance, checked concurrently.
    pub async fn health(&self) -> BTreeMap<String, bool> {
        let checks = self.instances.iter().map(|(name, provider)| async move {
            (name.clone(), provider.health_check().await)
        });
        join_all(checks).await.into_iter().collect()
    }
}
