//! procfs-backed collector
//!
//! Reads the socket tables of a workload's network namespace through its
//! process id:
//! - `<root>/proc/<pid>/net/tcp` and `tcp6` for TCP state counts
//! - `<root>/proc/<pid>/net/udp` and `udp6` for UDP queue and drop counts
//! - `<root>/proc/<pid>/net/netstat` for extended TCP counters

use super::netstat::read_tcp_ext;
use super::tcp::read_tcp_table;
use super::udp::read_udp_table;
use super::StatsCollector;
use crate::models::{Sample, WorkloadSpec};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Collector reading per-process network tables below a filesystem root
pub struct ProcfsCollector {
    procfs_root: PathBuf,
}

impl ProcfsCollector {
    /// Create a collector; `procfs_root` is the directory containing `proc`
    pub fn new(procfs_root: impl Into<PathBuf>) -> Self {
        Self {
            procfs_root: procfs_root.into(),
        }
    }

    pub fn procfs_root(&self) -> &Path {
        &self.procfs_root
    }

    /// Path of a file below `<root>/proc/<pid>/net`
    pub fn net_path(&self, pid: u32, file: &str) -> PathBuf {
        self.procfs_root
            .join("proc")
            .join(pid.to_string())
            .join("net")
            .join(file)
    }
}

#[async_trait]
impl StatsCollector for ProcfsCollector {
    async fn collect(&self, spec: &WorkloadSpec) -> Result<Sample> {
        let pid = spec.pid;

        let tcp = read_tcp_table(&self.net_path(pid, "tcp"))
            .await
            .with_context(|| format!("Unable to get tcp stats from pid {}", pid))?;
        let udp = read_udp_table(&self.net_path(pid, "udp"))
            .await
            .with_context(|| format!("Unable to get udp stats from pid {}", pid))?;
        let tcp6 = read_tcp_table(&self.net_path(pid, "tcp6"))
            .await
            .with_context(|| format!("Unable to get tcp6 stats from pid {}", pid))?;
        let udp6 = read_udp_table(&self.net_path(pid, "udp6"))
            .await
            .with_context(|| format!("Unable to get udp6 stats from pid {}", pid))?;
        let tcp_ext = read_tcp_ext(&self.net_path(pid, "netstat"))
            .await
            .with_context(|| format!("Unable to get tcpext stats from pid {}", pid))?;

        Ok(Sample {
            timestamp: chrono::Utc::now(),
            tcp: tcp.counts,
            udp,
            tcp6: tcp6.counts,
            udp6,
            tcp_ext,
            tcp_ports: tcp.ports,
            tcp6_ports: tcp6.ports,
        })
    }
}
