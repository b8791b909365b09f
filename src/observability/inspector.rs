//! Query execution facade: resolves inline or referenced queries and
//! dispatches them to the provider registry.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::backend::{ProviderError, DEFAULT_JOB_LIMIT};
use crate::observability::models::{Job, ProviderType, QueueInfo, QueueJobStatus};
use crate::observability::query::{InlineQuery, QueryError, QueryLibrary, QueryRequest};
use crate::observability::registry::ProviderRegistry;

/// Uniform result of a queue query.
///
/// `queues` is set for listing queries, `jobs` for queries naming a queue,
/// never both.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub provider: String,
    pub provider_type: ProviderType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queues: Option<Vec<QueueInfo>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jobs: Option<Vec<Job>>,
    pub count: usize,
    /// Set when the instance could not be read; the lists are then empty
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Stateless query entry point over a registry and a query library.
#[derive(Clone)]
pub struct QueueInspector {
    registry: Arc<ProviderRegistry>,
    library: Arc<dyn QueryLibrary>,
}

impl QueueInspector {
    pub fn new(registry: Arc<ProviderRegistry>, library: Arc<dyn QueryLibrary>) -> Self {
        Self { registry, library }
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.registry
    }

    /// Turns a request into an inline query; inline beats reference.
    pub fn resolve(&self, request: QueryRequest) -> Result<InlineQuery, QueryError> {
        match request {
            QueryRequest {
                inline: Some(query),
                ..
            } => Ok(query),
            QueryRequest {
                reference: Some(reference),
                ..
            } => self.library.resolve(&reference),
            _ => Err(QueryError::MissingQuery),
        }
    }

    pub async fn execute(&self, request: QueryRequest) -> Result<QueryResult, QueryError> {
        let query = self.resolve(request)?;
        self.execute_inline(&query).await
    }

    /// Runs a resolved query. Unknown providers fail; an unreachable
    /// provider yields an empty result carrying `error`.
    pub async fn execute_inline(&self, query: &InlineQuery) -> Result<QueryResult, QueryError> {
        let provider = self.registry.get(&query.provider)?;
        if let Some(options) = &query.provider_options {
            debug!(provider = %query.provider, options = ?options, "provider options are not interpreted by this provider");
        }

        let mut result = QueryResult {
            provider: provider.name().to_string(),
            provider_type: provider.provider_type(),
            queue: query.queue.clone(),
            queues: None,
            jobs: None,
            count: 0,
            error: None,
        };

        match &query.queue {
            Some(queue) => {
                let status = query.status.unwrap_or_default();
                let limit = query.limit.unwrap_or(DEFAULT_JOB_LIMIT);
                let jobs = provider
                    .jobs(queue, status, limit)
                    .await
                    .or_else(|e| recover(&mut result, e))?;
                result.count = jobs.len();
                result.jobs = Some(jobs);
            }
            None => {
                let overview = provider.overview().await;
                let mut queues = overview.queues;
                if let Some(error) = overview.error {
                    result.error = Some(error);
                }
                if let Some(status) = query.status {
                    queues.retain(|q| q.stats.count(status) > 0);
                }
                if let Some(limit) = query.limit {
                    queues.truncate(limit);
                }
                result.count = queues.len();
                result.queues = Some(queues);
            }
        }

        Ok(result)
    }
}

/// Folds connectivity failures into the envelope; anything else propagates.
fn recover(result: &mut QueryResult, err: ProviderError) -> Result<Vec<Job>, QueryError> {
    if err.is_connectivity() {
        warn!(provider = %result.provider, error = %err, "queue query failed, returning empty result");
        result.error = Some(err.to_string());
        Ok(Vec::new())
    } else {
        Err(QueryError::Registry(err.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::bullmq::testing::{MemoryConnector, MemoryKeyspace};
    use crate::backend::BullMqProvider;
    use crate::observability::query::JsonQueryLibrary;
    use crate::observability::registry::RegistryError;

    fn inspector() -> QueueInspector {
        let keyspace = MemoryKeyspace::new()
            .with_string("bull:emails:id", "3")
            .with_string("bull:reports:id", "1")
            .with_list("bull:reports:wait", &["1"])
            .with_sorted_set("bull:emails:failed", &["1", "2", "3"])
            .with_hash("bull:emails:1", &[("data", "{}"), ("failedReason", "a")])
            .with_hash("bull:emails:2", &[("data", "{}"), ("failedReason", "b")])
            .with_hash("bull:emails:3", &[("data", "{}"), ("failedReason", "c")]);

        let mut registry = ProviderRegistry::new();
        registry
            .register(Arc::new(BullMqProvider::with_connector(
                "main",
                MemoryConnector::new(keyspace),
            )))
            .unwrap();
        registry
            .register(Arc::new(BullMqProvider::with_connector(
                "offline",
                MemoryConnector::unreachable(),
            )))
            .unwrap();

        QueueInspector::new(
            Arc::new(registry),
            Arc::new(JsonQueryLibrary::builtin().unwrap()),
        )
    }

    fn inline(provider: &str) -> InlineQuery {
        InlineQuery {
            provider: provider.to_string(),
            queue: None,
            status: None,
            limit: None,
            provider_options: None,
        }
    }

    #[tokio::test]
    async fn test_reference_matches_equivalent_inline_query() {
        let inspector = inspector();
        let by_ref = inspector
            .execute(QueryRequest::reference(
                "queueQueries.jobFilters.failed_jobs_v1-0-0",
            ))
            .await
            .unwrap();

        let mut query = inline("redis-bullmq");
        query.status = Some(QueueJobStatus::Failed);
        query.limit = Some(50);
        let by_inline = inspector.execute(QueryRequest::inline(query)).await.unwrap();

        assert_eq!(by_ref, by_inline);
        assert_eq!(by_ref.provider, "main");
        assert_eq!(by_ref.queues.as_ref().map(Vec::len), Some(1));
        assert!(by_ref.jobs.is_none());
    }

    #[tokio::test]
    async fn test_inline_query_takes_precedence() {
        let inspector = inspector();
        let request = QueryRequest {
            inline: Some(inline("main")),
            reference: Some("queueQueries.nope.nothing_v1".to_string()),
        };
        let result = inspector.execute(request).await.unwrap();
        assert_eq!(result.count, 2);
    }

    #[tokio::test]
    async fn test_jobs_query_populates_jobs_only() {
        let inspector = inspector();
        let mut query = inline("main");
        query.queue = Some("emails".to_string());
        query.status = Some(QueueJobStatus::Failed);
        query.limit = Some(2);

        let result = inspector.execute_inline(&query).await.unwrap();
        assert!(result.queues.is_none());
        assert_eq!(result.count, 2);
        let jobs = result.jobs.unwrap();
        assert_eq!(jobs[0].id, "3");
        assert!(jobs.iter().all(|j| j.status == QueueJobStatus::Failed));
    }

    #[tokio::test]
    async fn test_listing_query_populates_queues_only() {
        let inspector = inspector();
        let result = inspector.execute_inline(&inline("main")).await.unwrap();
        assert!(result.jobs.is_none());
        let names: Vec<String> = result.queues.unwrap().into_iter().map(|q| q.name).collect();
        assert_eq!(names, vec!["emails", "reports"]);
        assert_eq!(result.count, 2);
        assert_eq!(result.provider_type, ProviderType::RedisBullmq);
    }

    #[tokio::test]
    async fn test_unreachable_provider_folds_error_into_result() {
        let inspector = inspector();
        let mut query = inline("offline");
        let listing = inspector.execute_inline(&query).await.unwrap();
        assert_eq!(listing.count, 0);
        assert!(listing.error.is_some());

        query.queue = Some("emails".to_string());
        let jobs = inspector.execute_inline(&query).await.unwrap();
        assert_eq!(jobs.jobs, Some(Vec::new()));
        assert!(jobs.error.is_some());
    }

    #[tokio::test]
    async fn test_resolution_errors_fail_fast() {
        let inspector = inspector();
        assert!(matches!(
            inspector.execute(QueryRequest::default()).await,
            Err(QueryError::MissingQuery)
        ));
        assert!(matches!(
            inspector
                .execute(QueryRequest::reference("queueQueries.jobFilters.unknown_v1-0-0"))
                .await,
            Err(QueryError::QueryNotFound { .. })
        ));
        assert!(matches!(
            inspector.execute(QueryRequest::inline(inline("ghost"))).await,
            Err(QueryError::Registry(RegistryError::ProviderNotFound(_)))
        ));
    }
}
