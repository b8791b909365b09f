//! Queue query shapes and the versioned query library.
//!
//! A query is either inline ([`InlineQuery`]) or a reference such as
//! `queueQueries.jobFilters.failed_jobs_v1-0-0`, resolved through a
//! [`QueryLibrary`] into the same inline shape. Queue queries have no
//! variable substitution.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::observability::models::QueueJobStatus;
use crate::observability::registry::RegistryError;

/// Root namespace every queue query reference starts with.
pub const QUEUE_QUERIES_ROOT: &str = "queueQueries";

/// The library shipped with the crate.
const BUILTIN_LIBRARY: &str = include_str!("../../queries/queue-queries.json");

// ============================================================================
// Errors
// ============================================================================

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("invalid query reference '{0}': expected queueQueries.<namespace>.<queryName_version>")]
    InvalidReference(String),

    #[error("query namespace not found: {0}")]
    NamespaceNotFound(String),

    #[error("query not found: {namespace}.{query}")]
    QueryNotFound { namespace: String, query: String },

    #[error("request carries neither an inline query nor a reference")]
    MissingQuery,

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("invalid query library: {0}")]
    InvalidLibrary(String),

    #[error(transparent)]
    Registry(#[from] RegistryError),
}

// ============================================================================
// Query shapes
// ============================================================================

/// A fully specified queue query.
///
/// With `queue` set the query lists jobs in that queue; without it, it lists
/// the provider's queues.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct InlineQuery {
    /// Instance name or provider-type key
    pub provider: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<QueueJobStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_options: Option<Map<String, Value>>,
}

/// What a caller hands the inspector: an inline query, a reference, or both.
/// The inline query wins when both are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryRequest {
    pub inline: Option<InlineQuery>,
    pub reference: Option<String>,
}

impl QueryRequest {
    pub fn inline(query: InlineQuery) -> Self {
        Self {
            inline: Some(query),
            reference: None,
        }
    }

    pub fn reference(reference: impl Into<String>) -> Self {
        Self {
            inline: None,
            reference: Some(reference.into()),
        }
    }

    /// Reads a JSON body: `{"ref": "..."}`, `{"query": {...}}`, or the inline
    /// query fields at the top level.
    pub fn from_json(body: Value) -> Result<Self, QueryError> {
        let Value::Object(mut object) = body else {
            return Err(QueryError::InvalidQuery("body must be a JSON object".to_string()));
        };

        let reference = match object.remove("ref") {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s),
            Some(_) => return Err(QueryError::InvalidQuery("'ref' must be a string".to_string())),
        };

        let inline = match object.remove("query") {
            Some(Value::Null) => None,
            Some(query) => Some(parse_inline(query)?),
            None if object.contains_key("provider") => Some(parse_inline(Value::Object(object))?),
            None => None,
        };

        Ok(Self { inline, reference })
    }
}

fn parse_inline(value: Value) -> Result<InlineQuery, QueryError> {
    serde_json::from_value(value).map_err(|e| QueryError::InvalidQuery(e.to_string()))
}

// ============================================================================
// Query library
// ============================================================================

/// Resolves query references to stored inline queries.
pub trait QueryLibrary: Send + Sync {
    fn resolve(&self, reference: &str) -> Result<InlineQuery, QueryError>;
}

/// Splits `queueQueries.<namespace>.<queryName_version>`.
pub fn parse_reference(reference: &str) -> Result<(&str, &str), QueryError> {
    let invalid = || QueryError::InvalidReference(reference.to_string());
    let mut parts = reference.splitn(3, '.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(QUEUE_QUERIES_ROOT), Some(namespace), Some(query))
            if !namespace.is_empty() && !query.is_empty() && !query.contains('.') =>
        {
            Ok((namespace, query))
        }
        _ => Err(invalid()),
    }
}

/// Library loaded from a JSON document shaped like
/// `{"queueQueries": {"<namespace>": {"<queryName_version>": {...}}}}`.
#[derive(Debug, Clone, Default)]
pub struct JsonQueryLibrary {
    namespaces: BTreeMap<String, BTreeMap<String, InlineQuery>>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct LibraryDocument {
    queue_queries: BTreeMap<String, BTreeMap<String, InlineQuery>>,
}

impl JsonQueryLibrary {
    pub fn from_json_str(raw: &str) -> Result<Self, QueryError> {
        let document: LibraryDocument =
            serde_json::from_str(raw).map_err(|e| QueryError::InvalidLibrary(e.to_string()))?;
        Ok(Self {
            namespaces: document.queue_queries,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, QueryError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| QueryError::InvalidLibrary(format!("{}: {}", path.display(), e)))?;
        Self::from_json_str(&raw)
    }

    pub fn builtin() -> Result<Self, QueryError> {
        Self::from_json_str(BUILTIN_LIBRARY)
    }

    /// Full references of every stored query.
    pub fn references(&self) -> Vec<String> {
        self.namespaces
            .iter()
            .flat_map(|(namespace, queries)| {
                queries
                    .keys()
                    .map(move |query| format!("{}.{}.{}", QUEUE_QUERIES_ROOT, namespace, query))
            })
            .collect()
    }
}

impl QueryLibrary for JsonQueryLibrary {
    fn resolve(&self, reference: &str) -> Result<InlineQuery, QueryError> {
        let (namespace, query) = parse_reference(reference)?;
        let queries = self
            .namespaces
            .get(namespace)
            .ok_or_else(|| QueryError::NamespaceNotFound(namespace.to_string()))?;
        queries
            .get(query)
            .cloned()
            .ok_or_else(|| QueryError::QueryNotFound {
                namespace: namespace.to_string(),
                query: query.to_string(),
            })
    }
}
