//! Network statistics collection loop
//!
//! Every tick takes a snapshot of the known workloads, runs one collection
//! job per workload concurrently, and waits for all of them before the next
//! tick is considered. A job commits its sample only if every table was
//! parsed; failures are logged and the workload is retried next tick.

use super::control::StopSignal;
use super::StatsCollector;
use crate::error::StoreError;
use crate::health::{components, HealthRegistry};
use crate::models::WorkloadSpec;
use crate::observability::AgentMetrics;
use crate::storage::SampleStore;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for the collection loop
#[derive(Debug, Clone)]
pub struct CollectionConfig {
    /// Collection interval (default: 10 seconds)
    pub interval: Duration,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
        }
    }
}

/// Collection loop that periodically samples every known workload
pub struct CollectionLoop {
    /// Statistics collector implementation
    collector: Arc<dyn StatsCollector>,
    /// Destination of committed samples
    store: Arc<SampleStore>,
    config: CollectionConfig,
    health: HealthRegistry,
    metrics: Option<AgentMetrics>,
}

/// Outcome of one per-workload job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum JobOutcome {
    Committed,
    Failed,
    /// Workload was removed from the store while the job ran
    Vanished,
}

/// Results from a collection cycle
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CollectionResults {
    pub success_count: usize,
    pub error_count: usize,
    pub vanished_count: usize,
}

impl CollectionResults {
    fn total(&self) -> usize {
        self.success_count + self.error_count + self.vanished_count
    }
}

impl CollectionLoop {
    /// Create a new collection loop
    pub fn new(
        collector: Arc<dyn StatsCollector>,
        store: Arc<SampleStore>,
        config: CollectionConfig,
    ) -> Self {
        Self {
            collector,
            store,
            config,
            health: HealthRegistry::new(),
            metrics: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.config.interval
    }

    /// Run until a stop request arrives, then acknowledge it
    pub async fn run(self, mut stop: StopSignal) {
        info!(
            interval_secs = self.config.interval.as_secs(),
            "Starting network stats collection loop"
        );

        let period = self.config.interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let ack = loop {
            // Stop wins over a tick that came due while the last one ran
            tokio::select! {
                biased;
                ack = stop.requested() => break ack,
                _ = ticker.tick() => {
                    let start = Instant::now();
                    let results = self.collect_all().await;
                    let elapsed = start.elapsed();

                    debug!(
                        workloads = results.total(),
                        committed = results.success_count,
                        errors = results.error_count,
                        elapsed_ms = elapsed.as_millis() as u64,
                        "Collection cycle complete"
                    );
                    if let Some(metrics) = &self.metrics {
                        metrics.observe_collection_latency(elapsed.as_secs_f64());
                    }
                    self.report_health(&results).await;
                }
            }
        };

        info!("Exiting collection loop");
        ack.acknowledge();
    }

    /// Collect from every workload in the store and wait for all jobs
    pub async fn collect_all(&self) -> CollectionResults {
        let specs = self.store.specs();
        let mut results = CollectionResults::default();
        let mut jobs = JoinSet::new();

        for spec in specs {
            let collector = self.collector.clone();
            let store = self.store.clone();
            jobs.spawn(collect_workload(collector, store, spec));
        }

        while let Some(joined) = jobs.join_next().await {
            match joined {
                Ok(JobOutcome::Committed) => results.success_count += 1,
                Ok(JobOutcome::Failed) => results.error_count += 1,
                Ok(JobOutcome::Vanished) => results.vanished_count += 1,
                Err(e) => {
                    warn!(error = %e, "Collection job panicked");
                    results.error_count += 1;
                }
            }
        }

        if let Some(metrics) = &self.metrics {
            metrics.inc_samples_committed(results.success_count as u64);
            metrics.inc_collection_errors(results.error_count as u64);
            metrics.set_workloads_monitored(self.store.len() as i64);
        }

        results
    }

    async fn report_health(&self, results: &CollectionResults) {
        if results.error_count > 0 && results.success_count == 0 {
            self.health
                .set_degraded(
                    components::COLLECTOR,
                    format!("collection failed for all {} workloads", results.error_count),
                )
                .await;
        } else {
            self.health.set_healthy(components::COLLECTOR).await;
        }
    }
}

/// Collect and commit one workload's sample
async fn collect_workload(
    collector: Arc<dyn StatsCollector>,
    store: Arc<SampleStore>,
    spec: WorkloadSpec,
) -> JobOutcome {
    let sample = match collector.collect(&spec).await {
        Ok(sample) => sample,
        Err(e) => {
            debug!(
                workload = %spec.name,
                pid = spec.pid,
                error = %format!("{:#}", e),
                "Failed to collect network stats"
            );
            return JobOutcome::Failed;
        }
    };

    match store.append_sample(&spec.name, sample) {
        Ok(()) => JobOutcome::Committed,
        Err(StoreError::NotFound(_)) => {
            debug!(workload = %spec.name, "Workload removed before its sample was committed");
            JobOutcome::Vanished
        }
    }
}

/// Builder for creating the collection loop
pub struct CollectionLoopBuilder {
    collector: Option<Arc<dyn StatsCollector>>,
    store: Option<Arc<SampleStore>>,
    config: CollectionConfig,
    health: Option<HealthRegistry>,
    metrics: Option<AgentMetrics>,
}

impl CollectionLoopBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            collector: None,
            store: None,
            config: CollectionConfig::default(),
            health: None,
            metrics: None,
        }
    }

    /// Set the statistics collector
    pub fn collector(mut self, collector: Arc<dyn StatsCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Set the sample store
    pub fn store(mut self, store: Arc<SampleStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Set the collection interval
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the health registry updated after every tick
    pub fn health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    /// Set the self-metrics handle
    pub fn metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the collection loop
    pub fn build(self) -> Result<CollectionLoop> {
        let collector = self
            .collector
            .ok_or_else(|| anyhow::anyhow!("Collector is required"))?;
        let store = self
            .store
            .ok_or_else(|| anyhow::anyhow!("Store is required"))?;
        if self.config.interval.is_zero() {
            anyhow::bail!("Collection interval must be greater than zero");
        }

        let mut collection_loop = CollectionLoop::new(collector, store, self.config);
        if let Some(health) = self.health {
            collection_loop.health = health;
        }
        collection_loop.metrics = self.metrics;
        Ok(collection_loop)
    }
}

impl Default for CollectionLoopBuilder {
    fn default() -> Self {
        Self::new()
    }
}
