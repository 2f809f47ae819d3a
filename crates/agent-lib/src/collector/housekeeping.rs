//! Housekeeping loop
//!
//! Evicts workloads whose newest sample is older than the housekeeping
//! interval, i.e. collection has stopped succeeding for them. Workloads
//! without any sample are left alone since they may not have been collected
//! yet.

use super::control::StopSignal;
use crate::observability::{AgentMetrics, StructuredLogger};
use crate::storage::SampleStore;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Ticks slower than this are reported
pub const LONG_HOUSEKEEPING: Duration = Duration::from_millis(100);

pub struct HousekeepingLoop {
    store: Arc<SampleStore>,
    interval: Duration,
    logger: Option<StructuredLogger>,
    metrics: Option<AgentMetrics>,
}

impl HousekeepingLoop {
    pub fn new(store: Arc<SampleStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            logger: None,
            metrics: None,
        }
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics(mut self, metrics: AgentMetrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run until a stop request arrives, then acknowledge it
    pub async fn run(self, mut stop: StopSignal) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting housekeeping loop"
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let ack = loop {
            tokio::select! {
                biased;
                ack = stop.requested() => break ack,
                _ = ticker.tick() => {
                    let tick_time = Utc::now();
                    let start = Instant::now();
                    self.evict_stale(tick_time);
                    let elapsed = start.elapsed();

                    if elapsed >= LONG_HOUSEKEEPING {
                        debug!(
                            tick = tick_time.timestamp(),
                            elapsed_ms = elapsed.as_millis() as u64,
                            "Housekeeping took longer than expected"
                        );
                    }
                }
            }
        };

        info!("Exiting housekeeping loop");
        ack.acknowledge();
    }

    /// Remove every workload whose newest sample is older than the interval
    /// at `now`. Returns the names removed.
    pub fn evict_stale(&self, now: DateTime<Utc>) -> Vec<String> {
        let Ok(max_age) = chrono::Duration::from_std(self.interval) else {
            return Vec::new();
        };

        let cutoff = now - max_age;
        let mut evicted = Vec::new();
        for (name, latest) in self.store.latest_timestamps() {
            if latest >= cutoff || !self.store.remove_if_stale(&name, cutoff) {
                continue;
            }

            if let Some(logger) = &self.logger {
                let age = now.signed_duration_since(latest);
                logger.log_workload_evicted(&name, age.num_seconds());
            }
            evicted.push(name);
        }

        if let Some(metrics) = &self.metrics {
            metrics.inc_evictions(evicted.len() as u64);
            metrics.set_workloads_monitored(self.store.len() as i64);
        }

        evicted
    }
}
