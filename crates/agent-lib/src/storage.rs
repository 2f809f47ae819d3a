//! In-memory sample store
//!
//! Maps workload name to its spec and a bounded, timestamp-ordered sample
//! history. A single reader/writer lock guards the whole registry; readers
//! always get copies so they never hold the lock while iterating.

use crate::error::StoreError;
use crate::models::{Sample, WorkloadRecord, WorkloadSpec};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Thread-safe registry of workload records
#[derive(Debug)]
pub struct SampleStore {
    /// `None` keeps every sample
    max_history: Option<usize>,
    records: RwLock<HashMap<String, WorkloadRecord>>,
}

impl SampleStore {
    /// Create a store keeping at most `max_history` samples per workload.
    /// A negative value means unlimited.
    pub fn new(max_history: i64) -> Self {
        Self {
            max_history: usize::try_from(max_history).ok(),
            records: RwLock::new(HashMap::new()),
        }
    }

    pub fn max_history(&self) -> Option<usize> {
        self.max_history
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, WorkloadRecord>> {
        self.records.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, WorkloadRecord>> {
        self.records.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Snapshot of a single workload
    pub fn get(&self, name: &str) -> Result<WorkloadRecord, StoreError> {
        self.read()
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    /// Snapshot of every workload
    pub fn get_all(&self) -> HashMap<String, WorkloadRecord> {
        self.read().clone()
    }

    /// Specs of every workload, without their histories
    pub fn specs(&self) -> Vec<WorkloadSpec> {
        self.read().values().map(|r| r.spec.clone()).collect()
    }

    /// Newest sample timestamp of every workload that has samples
    pub fn latest_timestamps(&self) -> Vec<(String, DateTime<Utc>)> {
        self.read()
            .iter()
            .filter_map(|(name, record)| record.latest().map(|s| (name.clone(), s.timestamp)))
            .collect()
    }

    /// Insert or replace a workload's spec, keeping any existing history
    pub fn upsert(&self, spec: WorkloadSpec) {
        let mut records = self.write();
        match records.get_mut(&spec.name) {
            Some(record) => record.spec = spec,
            None => {
                debug!(workload = %spec.name, pid = spec.pid, "Registering workload");
                records.insert(spec.name.clone(), WorkloadRecord::new(spec));
            }
        }
    }

    /// Insert a sample in timestamp order and trim the oldest past the cap
    pub fn append_sample(&self, name: &str, sample: Sample) -> Result<(), StoreError> {
        let mut records = self.write();
        let record = records
            .get_mut(name)
            .ok_or_else(|| StoreError::NotFound(name.to_string()))?;

        let stats = &mut record.stats;
        let out_of_order = stats
            .last()
            .is_some_and(|last| sample.timestamp < last.timestamp);
        if out_of_order {
            let index = stats.partition_point(|s| s.timestamp <= sample.timestamp);
            stats.insert(index, sample);
        } else {
            stats.push(sample);
        }

        if let Some(max) = self.max_history {
            if stats.len() > max {
                let excess = stats.len() - max;
                stats.drain(..excess);
            }
        }

        Ok(())
    }

    /// Delete a workload and its history. Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        self.write().remove(name).is_some()
    }

    /// Delete a workload whose newest sample is older than `cutoff`.
    /// The check and the removal happen under one write lock, so a sample
    /// committed concurrently keeps the workload alive.
    pub fn remove_if_stale(&self, name: &str, cutoff: DateTime<Utc>) -> bool {
        let mut records = self.write();
        let stale = records
            .get(name)
            .and_then(WorkloadRecord::latest)
            .is_some_and(|latest| latest.timestamp < cutoff);
        if stale {
            records.remove(name);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }
}
