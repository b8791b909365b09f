use std::sync::Arc;

use anyhow::Context;
use axum::serve;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use queue_lens::config::{ConfigError, Settings};
use queue_lens::observability::{
    queue_api, JsonQueryLibrary, ProviderRegistry, QueueInspector,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("queue_lens=info")),
        )
        .init();

    let settings = Settings::from_env();

    let registry = match settings.instance_source().resolve() {
        Ok(configs) => {
            ProviderRegistry::from_configs(&configs, settings.timeouts, settings.scan_count)?
        }
        Err(ConfigError::NotConfigured { source_hint }) => {
            warn!(hint = %source_hint, "no instances configured; /api/queue queries will find no providers");
            ProviderRegistry::new()
        }
        Err(e) => return Err(anyhow::Error::new(e).context("invalid instance configuration")),
    };
    info!(instances = registry.len(), names = ?registry.names().collect::<Vec<_>>(), "provider registry ready");

    let library = match &settings.query_library {
        Some(path) => JsonQueryLibrary::from_path(path)
            .with_context(|| format!("loading query library from {}", path))?,
        None => JsonQueryLibrary::builtin().context("loading built-in query library")?,
    };

    let inspector = QueueInspector::new(Arc::new(registry), Arc::new(library));
    let bind_addr = settings.bind_addr;

    let app = queue_api(inspector, Arc::new(settings))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(addr = %listener.local_addr()?, "queue-lens listening");

    serve(listener, app).await?;
    Ok(())
}
