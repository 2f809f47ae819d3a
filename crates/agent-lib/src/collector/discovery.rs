//! Workload discovery
//!
//! Periodically lists the running workloads from a [`WorkloadSource`] and
//! mirrors them into the sample store: new or changed workloads are
//! upserted, workloads that disappeared are removed.

use super::control::StopSignal;
use crate::health::{components, HealthRegistry};
use crate::models::WorkloadSpec;
use crate::observability::StructuredLogger;
use crate::storage::SampleStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Source of the currently running workloads
#[async_trait]
pub trait WorkloadSource: Send + Sync {
    async fn list_workloads(&self) -> Result<Vec<WorkloadSpec>>;
}

/// Hierarchies below the cgroup root that hold container cgroups
const SCAN_ROOTS: [&str; 4] = ["kubepods.slice", "kubepods", "system.slice", "docker"];

/// Discovers containers by scanning the cgroup filesystem
///
/// A container cgroup is a directory named after a 64 character hex
/// container id, optionally wrapped by a runtime prefix and `.scope`
/// suffix. Its first pid in `cgroup.procs` is used to reach the
/// container's network namespace.
pub struct CgroupScanner {
    cgroup_root: PathBuf,
}

impl CgroupScanner {
    pub fn new(cgroup_root: impl Into<PathBuf>) -> Self {
        Self {
            cgroup_root: cgroup_root.into(),
        }
    }

    /// Walk a cgroup hierarchy for container cgroups
    ///
    /// Only `root` must be readable; unreadable subdirectories are skipped.
    async fn scan_dir(root: &Path, found: &mut HashMap<String, WorkloadSpec>) -> Result<()> {
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if dir == root => {
                    return Err(e).with_context(|| format!("Failed to read {}", dir.display()));
                }
                Err(e) => {
                    debug!(path = %dir.display(), error = %e, "Skipping cgroup directory");
                    continue;
                }
            };

            while let Some(entry) = entries.next_entry().await? {
                if !entry.file_type().await?.is_dir() {
                    continue;
                }

                let entry_path = entry.path();
                let name = entry.file_name().to_string_lossy().to_string();

                match extract_container_id(&name) {
                    Some(container_id) => {
                        if let Some(spec) = Self::read_container(&entry_path, container_id).await {
                            found.insert(spec.name.clone(), spec);
                        }
                    }
                    None => pending.push(entry_path),
                }
            }
        }

        Ok(())
    }

    /// Build a spec for a container cgroup, if it has a live process
    async fn read_container(path: &Path, container_id: String) -> Option<WorkloadSpec> {
        let procs = fs::read_to_string(path.join("cgroup.procs")).await.ok()?;
        let pid = procs.lines().find_map(|line| line.trim().parse::<u32>().ok())?;

        let metadata = fs::metadata(path).await.ok()?;
        let created = metadata.created().or_else(|_| metadata.modified()).ok()?;

        Some(WorkloadSpec {
            name: container_id,
            image: String::new(),
            pid,
            creation_time: DateTime::<Utc>::from(created),
        })
    }
}

#[async_trait]
impl WorkloadSource for CgroupScanner {
    async fn list_workloads(&self) -> Result<Vec<WorkloadSpec>> {
        let mut found = HashMap::new();

        for root in SCAN_ROOTS {
            let path = self.cgroup_root.join(root);
            if fs::metadata(&path).await.is_ok() {
                Self::scan_dir(&path, &mut found).await?;
            }
        }

        Ok(found.into_values().collect())
    }
}

/// Extract a container id from a cgroup directory name
///
/// Handles the common runtime formats:
/// - Docker/cgroupfs: `<container_id>`
/// - Docker/systemd: `docker-<container_id>.scope`
/// - containerd: `cri-containerd-<container_id>.scope`
/// - CRI-O: `crio-<container_id>.scope`
pub fn extract_container_id(name: &str) -> Option<String> {
    let trimmed = name.strip_suffix(".scope").unwrap_or(name);
    let id = ["cri-containerd-", "crio-", "docker-"]
        .iter()
        .find_map(|prefix| trimmed.strip_prefix(prefix))
        .unwrap_or(trimmed);

    if id.len() == 64 && id.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(id.to_string())
    } else {
        None
    }
}

/// Loop mirroring a workload source into the store
pub struct DiscoveryLoop {
    source: Arc<dyn WorkloadSource>,
    store: Arc<SampleStore>,
    interval: Duration,
    /// Workloads this loop has upserted, used to detect removals
    known: HashSet<String>,
    health: HealthRegistry,
    logger: Option<StructuredLogger>,
}

impl DiscoveryLoop {
    pub fn new(
        source: Arc<dyn WorkloadSource>,
        store: Arc<SampleStore>,
        interval: Duration,
    ) -> Self {
        Self {
            source,
            store,
            interval,
            known: HashSet::new(),
            health: HealthRegistry::new(),
            logger: None,
        }
    }

    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = health;
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// List workloads once and apply the differences to the store
    pub async fn refresh(&mut self) -> Result<()> {
        let specs = self
            .source
            .list_workloads()
            .await
            .context("Failed to list workloads")?;

        let current: HashSet<String> = specs.iter().map(|s| s.name.clone()).collect();

        for spec in specs {
            if !self.known.contains(&spec.name) {
                if let Some(logger) = &self.logger {
                    logger.log_workload_discovered(&spec.name, spec.pid);
                }
            }
            self.store.upsert(spec);
        }

        for gone in self.known.difference(&current) {
            if self.store.remove(gone) {
                if let Some(logger) = &self.logger {
                    logger.log_workload_removed(gone);
                }
            }
        }

        self.known = current;
        Ok(())
    }

    /// Run until a stop request arrives, then acknowledge it
    pub async fn run(mut self, mut stop: StopSignal) {
        info!(
            interval_secs = self.interval.as_secs(),
            "Starting workload discovery loop"
        );

        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        let ack = loop {
            tokio::select! {
                biased;
                ack = stop.requested() => break ack,
                _ = ticker.tick() => {
                    match self.refresh().await {
                        Ok(()) => self.health.set_healthy(components::DISCOVERY).await,
                        Err(e) => {
                            warn!(error = %format!("{:#}", e), "Failed to get workload info");
                            self.health
                                .set_degraded(components::DISCOVERY, e.to_string())
                                .await;
                        }
                    }
                }
            }
        };

        info!("Exiting workload discovery loop");
        ack.acknowledge();
    }
}
