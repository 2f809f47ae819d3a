//! Network statistics collection from procfs
//!
//! This module provides the parsers for the per-process kernel socket
//! tables, the collector that assembles them into a [`Sample`], and the
//! periodic loops (discovery, collection, housekeeping) that keep the
//! [`SampleStore`](crate::storage::SampleStore) up to date.

mod control;
mod discovery;
mod housekeeping;
mod r#loop;
mod netstat;
mod orchestrator;
mod procfs;
mod tcp;
mod udp;


pub use control::{LoopHandle, StopAck, StopSignal};
pub use discovery::{extract_container_id, CgroupScanner, DiscoveryLoop, WorkloadSource};
pub use housekeeping::{HousekeepingLoop, LONG_HOUSEKEEPING};
pub use netstat::{parse_tcp_ext, read_tcp_ext};
pub use orchestrator::{Orchestrator, OrchestratorState};
pub use procfs::ProcfsCollector;
pub use r#loop::{CollectionConfig, CollectionLoop, CollectionLoopBuilder, CollectionResults};
pub use tcp::{parse_tcp_table, read_tcp_table, TcpTable};
pub use udp::{parse_udp_table, read_udp_table};

use crate::models::{Sample, WorkloadSpec};
use anyhow::Result;

pub use async_trait::async_trait;

/// Trait for network statistics collection implementations
#[async_trait]
pub trait StatsCollector: Send + Sync {
    /// Collect one complete sample for a workload.
    ///
    /// Either every table was read and parsed, or an error is returned;
    /// partial samples are never produced.
    async fn collect(&self, spec: &WorkloadSpec) -> Result<Sample>;
}
