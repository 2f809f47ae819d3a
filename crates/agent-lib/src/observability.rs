//! Self-observability of the agent
//!
//! Provides:
//! - Prometheus metrics about the collector itself (tick latency, errors,
//!   committed samples, evictions, monitored workloads)
//! - Structured logging of workload lifecycle events with tracing

use prometheus::{Histogram, HistogramOpts, IntCounter, IntGauge, Opts, Registry};
use std::sync::Arc;
use tracing::info;

/// Histogram buckets for collection tick latency (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

struct AgentMetricsInner {
    collection_latency_seconds: Histogram,
    collection_errors: IntCounter,
    samples_committed: IntCounter,
    evictions: IntCounter,
    workloads_monitored: IntGauge,
}

/// Agent metrics for Prometheus exposition
///
/// Registered into the registry handed to [`AgentMetrics::new`]. Clones share
/// the same underlying metrics.
#[derive(Clone)]
pub struct AgentMetrics {
    inner: Arc<AgentMetricsInner>,
}

impl AgentMetrics {
    pub fn new(registry: &Registry) -> prometheus::Result<Self> {
        let collection_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "netstat_agent_collection_latency_seconds",
                "Time spent collecting network stats from every workload in one tick",
            )
            .buckets(LATENCY_BUCKETS.to_vec()),
        )?;
        let collection_errors = IntCounter::with_opts(Opts::new(
            "netstat_agent_collection_errors_total",
            "Total number of failed per-workload collections",
        ))?;
        let samples_committed = IntCounter::with_opts(Opts::new(
            "netstat_agent_samples_committed_total",
            "Total number of samples committed to the store",
        ))?;
        let evictions = IntCounter::with_opts(Opts::new(
            "netstat_agent_evictions_total",
            "Total number of workloads evicted for stale stats",
        ))?;
        let workloads_monitored = IntGauge::with_opts(Opts::new(
            "netstat_agent_workloads_monitored",
            "Number of workloads currently in the store",
        ))?;

        registry.register(Box::new(collection_latency_seconds.clone()))?;
        registry.register(Box::new(collection_errors.clone()))?;
        registry.register(Box::new(samples_committed.clone()))?;
        registry.register(Box::new(evictions.clone()))?;
        registry.register(Box::new(workloads_monitored.clone()))?;

        Ok(Self {
            inner: Arc::new(AgentMetricsInner {
                collection_latency_seconds,
                collection_errors,
                samples_committed,
                evictions,
                workloads_monitored,
            }),
        })
    }

    pub fn observe_collection_latency(&self, duration_secs: f64) {
        self.inner.collection_latency_seconds.observe(duration_secs);
    }

    pub fn inc_collection_errors(&self, count: u64) {
        self.inner.collection_errors.inc_by(count);
    }

    pub fn inc_samples_committed(&self, count: u64) {
        self.inner.samples_committed.inc_by(count);
    }

    pub fn inc_evictions(&self, count: u64) {
        self.inner.evictions.inc_by(count);
    }

    pub fn set_workloads_monitored(&self, count: i64) {
        self.inner.workloads_monitored.set(count);
    }
}

/// Structured logger for agent events
#[derive(Clone)]
pub struct StructuredLogger {
    node_name: String,
}

impl StructuredLogger {
    pub fn new(node_name: impl Into<String>) -> Self {
        Self {
            node_name: node_name.into(),
        }
    }

    pub fn log_startup(&self, version: &str) {
        info!(
            event = "agent_started",
            node = %self.node_name,
            agent_version = %version,
            "Netstat agent started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            node = %self.node_name,
            reason = %reason,
            "Netstat agent shutting down"
        );
    }

    pub fn log_workload_discovered(&self, name: &str, pid: u32) {
        info!(
            event = "workload_discovered",
            node = %self.node_name,
            workload = %name,
            pid = pid,
            "Started tracking workload"
        );
    }

    pub fn log_workload_removed(&self, name: &str) {
        info!(
            event = "workload_removed",
            node = %self.node_name,
            workload = %name,
            "Workload no longer running"
        );
    }

    /// Log a housekeeping eviction
    pub fn log_workload_evicted(&self, name: &str, age_secs: i64) {
        info!(
            event = "workload_evicted",
            node = %self.node_name,
            workload = %name,
            last_sample_age_secs = age_secs,
            "Evicted workload with stale stats"
        );
    }
}
