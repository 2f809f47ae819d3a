//! Agent configuration

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Agent configuration, read from `NETSTAT_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Node name from Kubernetes downward API
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Network stats collection interval in seconds
    #[serde(default = "default_collect_interval")]
    pub collect_interval_secs: u64,

    /// Housekeeping interval in seconds, also the staleness threshold
    #[serde(default = "default_housekeeping_interval")]
    pub housekeeping_interval_secs: u64,

    /// Workload discovery interval in seconds
    #[serde(default = "default_discovery_interval")]
    pub discovery_interval_secs: u64,

    /// Directory containing the host's `proc`
    #[serde(default = "default_procfs_root")]
    pub procfs_root: String,

    /// Root of the host cgroup filesystem
    #[serde(default = "default_cgroup_root")]
    pub cgroup_root: String,

    /// Samples kept per workload; negative keeps everything
    #[serde(default = "default_max_stats_length")]
    pub max_stats_length: i64,

    #[serde(default = "default_listen_ip")]
    pub listen_ip: IpAddr,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default = "default_prometheus_endpoint")]
    pub prometheus_endpoint: String,
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_collect_interval() -> u64 {
    10
}

fn default_housekeeping_interval() -> u64 {
    60
}

fn default_discovery_interval() -> u64 {
    5
}

fn default_procfs_root() -> String {
    "/host/".to_string()
}

fn default_cgroup_root() -> String {
    "/host/sys/fs/cgroup".to_string()
}

fn default_max_stats_length() -> i64 {
    5
}

fn default_listen_ip() -> IpAddr {
    IpAddr::from([0, 0, 0, 0])
}

fn default_api_port() -> u16 {
    9187
}

fn default_prometheus_endpoint() -> String {
    "/metrics".to_string()
}

impl AgentConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("NETSTAT").try_parsing(true))
            .build()
            .context("Failed to read configuration")?;

        let config: AgentConfig = config
            .try_deserialize()
            .context("Invalid configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, secs) in [
            ("collect_interval_secs", self.collect_interval_secs),
            ("housekeeping_interval_secs", self.housekeeping_interval_secs),
            ("discovery_interval_secs", self.discovery_interval_secs),
        ] {
            if secs == 0 {
                bail!("{} must be greater than zero", name);
            }
        }
        if !self.prometheus_endpoint.starts_with('/') {
            bail!(
                "prometheus_endpoint must start with '/', got {:?}",
                self.prometheus_endpoint
            );
        }
        Ok(())
    }

    pub fn collect_interval(&self) -> Duration {
        Duration::from_secs(self.collect_interval_secs)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_secs)
    }

    pub fn discovery_interval(&self) -> Duration {
        Duration::from_secs(self.discovery_interval_secs)
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::new(self.listen_ip, self.api_port)
    }
}
