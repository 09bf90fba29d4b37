//! C9: startup and shutdown orchestration, independent of which transport is selected.

use crate::config::{McpConfig, TransportMode};
use crate::dispatch::Dispatcher;
use crate::handlers::cloud::{self, CloudClient, MockCloudClient};
use crate::handlers::selftest;
use crate::registry::ToolRegistry;
use crate::transport;
use std::sync::Arc;

/// Build the tool registry: self-test tools unconditionally, cloud tools best-effort.
///
/// `cloud_client` is `None` when no provider credentials are configured; in that case the cloud
/// tool family is omitted from the registry entirely rather than surfacing broken tools.
pub fn build_registry(cloud_client: Option<Arc<dyn CloudClient>>) -> anyhow::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    selftest::register_all(&mut registry)?;
    cloud::register_all(&mut registry, cloud_client)?;
    Ok(registry)
}

/// Resolve which `CloudClient` (if any) this process should wire in. The mock implementation
/// stands in until a real provider SDK is configured (an explicit non-goal of this core); a
/// deployment that wants the cloud tool family gone entirely excludes both names via
/// `enable_tools`.
fn resolve_cloud_client(config: &McpConfig) -> Option<Arc<dyn CloudClient>> {
    let cloud_tool_names = ["list_clusters", "describe_instance"];
    match &config.enable_tools {
        Some(enabled) if !cloud_tool_names.iter().any(|name| enabled.iter().any(|e| e == name)) => None,
        _ => Some(Arc::new(MockCloudClient)),
    }
}

/// Run the server to completion: build dependencies, start the selected transport, and block
/// until a termination signal arrives. Returns once shutdown has fully drained.
pub async fn run(config: McpConfig) -> anyhow::Result<()> {
    config.validate()?;

    let cloud_client = resolve_cloud_client(&config);
    let registry = build_registry(cloud_client)?;
    tracing::info!(tool_count = registry.len(), "tool registry built");

    let config = Arc::new(config);
    let dispatcher = Arc::new(Dispatcher::new(Arc::new(registry), config.clone()));

    match config.transport {
        TransportMode::Stdio => {
            tracing::info!("starting stdio transport");
            transport::run_stdio(dispatcher).await;
        }
        TransportMode::Http | TransportMode::Sse => {
            let addr: std::net::SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
            let router = transport::build_router(dispatcher, config.clone());
            tracing::info!(%addr, "starting http transport");

            let listener = tokio::net::TcpListener::bind(addr).await?;
            let shutdown_timeout = config.shutdown_timeout;

            axum::serve(listener, router.into_make_service_with_connect_info::<std::net::SocketAddr>())
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            tracing::info!(?shutdown_timeout, "http transport stopped, drain window elapsed");
        }
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        let mut signal = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler");
        signal.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown signal received, draining in-flight requests");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_registry_includes_selftest_and_cloud_tools_by_default() {
        let registry = build_registry(Some(Arc::new(MockCloudClient))).unwrap();
        assert!(registry.list().iter().any(|t| t.name == "ping"));
        assert!(registry.list().iter().any(|t| t.name == "list_clusters"));
    }

    #[test]
    fn build_registry_omits_cloud_tools_without_a_client() {
        let registry = build_registry(None).unwrap();
        assert!(registry.list().iter().any(|t| t.name == "ping"));
        assert!(!registry.list().iter().any(|t| t.name == "list_clusters"));
    }
}
