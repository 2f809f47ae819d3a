//! Netstat Agent - per-container network statistics exporter
//!
//! This binary runs as a DaemonSet on each node, discovering containers from
//! the host cgroup tree and sampling their network namespaces through procfs.

use anyhow::{Context, Result};
use netstat_lib::{
    collector::{
        CgroupScanner, CollectionLoopBuilder, DiscoveryLoop, HousekeepingLoop, Orchestrator,
        ProcfsCollector,
    },
    export::{
        api::{self, AppState},
        StoreCollector,
    },
    health::HealthRegistry,
    observability::{AgentMetrics, StructuredLogger},
    storage::SampleStore,
};
use prometheus::Registry;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

mod config;

const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting netstat-agent");

    let config = config::AgentConfig::load()?;
    info!(
        node_name = %config.node_name,
        procfs_root = %config.procfs_root,
        cgroup_root = %config.cgroup_root,
        max_stats_length = config.max_stats_length,
        "Agent configured"
    );

    let logger = StructuredLogger::new(&config.node_name);
    logger.log_startup(AGENT_VERSION);

    let store = Arc::new(SampleStore::new(config.max_stats_length));
    let health_registry = HealthRegistry::new();

    let registry = Registry::new();
    let metrics = AgentMetrics::new(&registry).context("Failed to register agent metrics")?;
    registry
        .register(Box::new(StoreCollector::new(store.clone())?))
        .context("Failed to register container metrics")?;

    let collection = CollectionLoopBuilder::new()
        .collector(Arc::new(ProcfsCollector::new(&config.procfs_root)))
        .store(store.clone())
        .interval(config.collect_interval())
        .health(health_registry.clone())
        .metrics(metrics.clone())
        .build()?;

    let housekeeping = HousekeepingLoop::new(store.clone(), config.housekeeping_interval())
        .with_logger(logger.clone())
        .with_metrics(metrics.clone());

    let discovery = DiscoveryLoop::new(
        Arc::new(CgroupScanner::new(&config.cgroup_root)),
        store.clone(),
        config.discovery_interval(),
    )
    .with_health(health_registry.clone())
    .with_logger(logger.clone());

    let mut orchestrator = Orchestrator::new(collection, housekeeping, health_registry.clone())
        .with_discovery(discovery);
    orchestrator.start().await?;

    let app_state = Arc::new(AppState::new(store, health_registry, registry));
    let api_handle = tokio::spawn(api::serve(
        config.listen_addr(),
        config.prometheus_endpoint.clone(),
        app_state,
    ));

    // Wait for shutdown signal or a failed API server
    let reason = tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for shutdown signal")?;
            "SIGINT received"
        }
        served = api_handle => {
            match served {
                Ok(Ok(())) => "API server exited",
                Ok(Err(e)) => {
                    error!(error = %format!("{:#}", e), "API server failed");
                    "API server failed"
                }
                Err(e) => {
                    error!(error = %e, "API server task panicked");
                    "API server panicked"
                }
            }
        }
    };

    logger.log_shutdown(reason);
    orchestrator.stop().await?;
    info!("Shutdown complete");

    Ok(())
}
