//! Axum-based HTTP endpoints for queue introspection.
//!
//! Two families share one router:
//!
//! - `/api/bullmq/overview` builds a short-lived registry per request from
//!   query params, a JSON body, or an environment variable, and returns one
//!   [`Overview`] per instance wrapped in a `{success, data, timestamp}`
//!   envelope.
//! - `/api/queue/*` runs against the registry configured at startup: query
//!   execution, provider listing, capabilities and health.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use queue_lens::config::Settings;
//! use queue_lens::observability::{queue_api, JsonQueryLibrary, ProviderRegistry, QueueInspector};
//!
//! let inspector = QueueInspector::new(
//!     Arc::new(ProviderRegistry::new()),
//!     Arc::new(JsonQueryLibrary::builtin()?),
//! );
//! let app = queue_api(inspector, Arc::new(Settings::default()));
//! ```

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::backend::ProviderError;
use crate::config::{ConfigError, ConnectionConfig, ConnectionSource, Settings, DEFAULT_REDIS_PORT};
use crate::observability::inspector::{QueryResult, QueueInspector};
use crate::observability::models::{Capabilities, Overview};
use crate::observability::query::{QueryError, QueryRequest};
use crate::observability::registry::{ProviderDescriptor, ProviderRegistry, RegistryError};

#[derive(Clone)]
struct ApiState {
    inspector: QueueInspector,
    settings: Arc<Settings>,
}

/// Creates the HTTP API router.
///
/// `settings` supplies the fallback instance variable, timeouts and scan
/// hint for the per-request overview registries.
pub fn queue_api(inspector: QueueInspector, settings: Arc<Settings>) -> Router {
    let state = ApiState {
        inspector,
        settings,
    };

    Router::new()
        .route(
            "/api/bullmq/overview",
            get(overview_from_params).post(overview_from_body),
        )
        .route("/api/queue/query", get(query_by_reference).post(query_from_body))
        .route("/api/queue/providers", get(list_providers))
        .route("/api/queue/providers/:key/capabilities", get(provider_capabilities))
        .route("/api/queue/health", get(health))
        .with_state(state)
}

// ============================================================================
// Envelopes and errors
// ============================================================================

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
    timestamp: String,
}

impl<T: Serialize> Envelope<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
            timestamp: Utc::now().to_rfc3339(),
        })
    }
}

#[derive(Serialize)]
struct InstancesData<T> {
    instances: T,
}

/// Failure rendered as `{success: false, error, code, timestamp}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({
            "success": false,
            "error": self.message,
            "code": self.code,
            "timestamp": Utc::now().to_rfc3339(),
        });
        (self.status, Json(body)).into_response()
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::new(StatusCode::BAD_REQUEST, err.code(), err.to_string())
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ProviderNotFound(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "provider_not_found", err.to_string())
            }
            RegistryError::Config(config) => config.into(),
            RegistryError::Provider(ref provider) if provider.is_connectivity() => {
                ApiError::new(StatusCode::BAD_GATEWAY, "provider_unavailable", err.to_string())
            }
            RegistryError::Provider(ProviderError::Configuration(_)) => {
                ApiError::new(StatusCode::BAD_REQUEST, "invalid_instance", err.to_string())
            }
            RegistryError::Provider(_) => {
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "provider_error", err.to_string())
            }
        }
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        let message = err.to_string();
        let (status, code) = match err {
            QueryError::Registry(inner) => return inner.into(),
            QueryError::InvalidReference(_) => (StatusCode::BAD_REQUEST, "invalid_reference"),
            QueryError::MissingQuery => (StatusCode::BAD_REQUEST, "missing_query"),
            QueryError::InvalidQuery(_) => (StatusCode::BAD_REQUEST, "invalid_query"),
            QueryError::NamespaceNotFound(_) => (StatusCode::NOT_FOUND, "namespace_not_found"),
            QueryError::QueryNotFound { .. } => (StatusCode::NOT_FOUND, "query_not_found"),
            QueryError::InvalidLibrary(_) => (StatusCode::INTERNAL_SERVER_ERROR, "invalid_library"),
        };
        ApiError::new(status, code, message)
    }
}

// ============================================================================
// /api/bullmq/overview
// ============================================================================

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct OverviewParams {
    host: Option<String>,
    port: Option<u16>,
    password: Option<String>,
    name: Option<String>,
    env_var: Option<String>,
}

impl OverviewParams {
    fn into_source(self, settings: &Settings) -> Result<ConnectionSource, ConfigError> {
        match self.host.filter(|h| !h.trim().is_empty()) {
            Some(host) => {
                let name = self.name.unwrap_or_else(|| host.clone());
                let mut config =
                    ConnectionConfig::new(name, host, self.port.unwrap_or(DEFAULT_REDIS_PORT));
                if let Some(password) = self.password {
                    config = config.with_password(password);
                }
                Ok(ConnectionSource::Instances(vec![config]))
            }
            None => settings.env_source(self.env_var),
        }
    }
}

/// `instances` may be a list of objects or a raw instance-list string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InstancesField {
    List(Vec<ConnectionConfig>),
    Raw(String),
}

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct OverviewBody {
    instances: Option<InstancesField>,
    env_var: Option<String>,
    #[serde(default)]
    use_env: bool,
}

impl OverviewBody {
    /// An empty body means "use the environment".
    fn parse(raw: &[u8]) -> Result<Self, ApiError> {
        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(Self::default());
        }
        serde_json::from_slice(raw).map_err(|e| {
            ApiError::new(
                StatusCode::BAD_REQUEST,
                "invalid_body",
                format!("invalid overview request body: {}", e),
            )
        })
    }

    fn into_source(self, settings: &Settings) -> Result<ConnectionSource, ConfigError> {
        if self.use_env {
            return settings.env_source(self.env_var);
        }
        match self.instances {
            Some(InstancesField::List(list)) if !list.is_empty() => {
                Ok(ConnectionSource::Instances(list))
            }
            Some(InstancesField::Raw(raw)) if !raw.trim().is_empty() => {
                Ok(ConnectionSource::Legacy(raw))
            }
            _ => settings.env_source(self.env_var),
        }
    }
}

async fn overview_from_params(
    State(state): State<ApiState>,
    Query(params): Query<OverviewParams>,
) -> Result<Json<Envelope<InstancesData<Vec<Overview>>>>, ApiError> {
    let source = params.into_source(&state.settings)?;
    run_overview(&state.settings, source).await
}

async fn overview_from_body(
    State(state): State<ApiState>,
    body: Bytes,
) -> Result<Json<Envelope<InstancesData<Vec<Overview>>>>, ApiError> {
    let source = OverviewBody::parse(&body)?.into_source(&state.settings)?;
    run_overview(&state.settings, source).await
}

async fn run_overview(
    settings: &Settings,
    source: ConnectionSource,
) -> Result<Json<Envelope<InstancesData<Vec<Overview>>>>, ApiError> {
    let configs = source.resolve().map_err(|e| {
        warn!(error = %e, "overview request resolved no instances");
        e
    })?;
    debug!(instances = configs.len(), "building overview registry");

    let registry = ProviderRegistry::from_configs(&configs, settings.timeouts, settings.scan_count)?;
    let overviews = registry.overview_all(None).await;
    Ok(Envelope::ok(InstancesData {
        instances: overviews,
    }))
}

// ============================================================================
// /api/queue/*
// ============================================================================

#[derive(Deserialize)]
struct ReferenceParams {
    #[serde(rename = "ref")]
    reference: Option<String>,
}

async fn query_by_reference(
    State(state): State<ApiState>,
    Query(params): Query<ReferenceParams>,
) -> Result<Json<QueryResult>, ApiError> {
    let reference = params
        .reference
        .filter(|r| !r.trim().is_empty())
        .ok_or(QueryError::MissingQuery)?;
    let result = state
        .inspector
        .execute(QueryRequest::reference(reference))
        .await?;
    Ok(Json(result))
}

async fn query_from_body(
    State(state): State<ApiState>,
    Json(body): Json<Value>,
) -> Result<Json<QueryResult>, ApiError> {
    let request = QueryRequest::from_json(body)?;
    let result = state.inspector.execute(request).await?;
    Ok(Json(result))
}

async fn list_providers(
    State(state): State<ApiState>,
) -> Json<Envelope<InstancesData<Vec<ProviderDescriptor>>>> {
    Envelope::ok(InstancesData {
        instances: state.inspector.registry().describe(),
    })
}

async fn provider_capabilities(
    State(state): State<ApiState>,
    Path(key): Path<String>,
) -> Result<Json<Capabilities>, ApiError> {
    Ok(Json(state.inspector.registry().capabilities(&key)?))
}

async fn health(State(state): State<ApiState>) -> Response {
    let instances = state.inspector.registry().health().await;
    let healthy = instances.values().all(|up| *up);
    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let body = json!({
        "success": healthy,
        "data": { "instances": instances },
        "timestamp": Utc::now().to_rfc3339(),
    });
    (status, Json(body)).into_response()
}
