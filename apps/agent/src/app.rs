//! Application orchestrator: builds the resource registry, engine and server.

use std::sync::Arc;

use blockwise_server::BlockServer;
use blockwise_transfer::{BlockEngine, FileResource, PatternResource, SourceRegistry};

use crate::config::{Config, ResourceConfig};

/// Runs the agent until Ctrl+C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let registry = build_registry(&config.resources)?;
    let engine = BlockEngine::new(registry, config.engine_config())?;
    let server = BlockServer::bind(&config.server_config(), engine).await?;

    let server_run = Arc::clone(&server);
    let server_task = tokio::spawn(async move { server_run.run().await });

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutdown requested");
    server.shutdown();
    server_task.await??;
    Ok(())
}

/// Registers every configured resource.
pub fn build_registry(resources: &[ResourceConfig]) -> anyhow::Result<SourceRegistry> {
    let mut registry = SourceRegistry::new();
    for resource in resources {
        if registry.contains(resource.path()) {
            anyhow::bail!("resource {} configured twice", resource.path());
        }
        match resource {
            ResourceConfig::Pattern { path, size, burst } => {
                registry.register(path.clone(), Arc::new(PatternResource::new(*size, *burst)));
            }
            ResourceConfig::File { path, file, burst } => {
                if !file.is_file() {
                    tracing::warn!(resource = %path, file = %file.display(), "file not found, requests will get 4.04");
                }
                registry.register(path.clone(), Arc::new(FileResource::new(file, path.clone(), *burst)));
            }
        }
        tracing::info!(resource = %resource.path(), "resource registered");
    }
    Ok(registry)
}
