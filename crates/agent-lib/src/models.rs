//! Core data models for the network statistics agent

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Static identity of a tracked workload, set at discovery time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadSpec {
    /// Unique key of the workload (container id or name)
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    /// Process id whose network namespace is read
    pub pid: u32,
    pub creation_time: DateTime<Utc>,
}

/// Kernel TCP connection states, in `/proc/net/tcp` code order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TcpState {
    Established,
    SynSent,
    SynRecv,
    FinWait1,
    FinWait2,
    TimeWait,
    Close,
    CloseWait,
    LastAck,
    Listen,
    Closing,
}

impl TcpState {
    pub const ALL: [TcpState; 11] = [
        TcpState::Established,
        TcpState::SynSent,
        TcpState::SynRecv,
        TcpState::FinWait1,
        TcpState::FinWait2,
        TcpState::TimeWait,
        TcpState::Close,
        TcpState::CloseWait,
        TcpState::LastAck,
        TcpState::Listen,
        TcpState::Closing,
    ];

    /// Map a two-hex-digit state code (`01`..`0B`) to a state
    pub fn from_code(code: &str) -> Option<Self> {
        let state = match code {
            "01" => TcpState::Established,
            "02" => TcpState::SynSent,
            "03" => TcpState::SynRecv,
            "04" => TcpState::FinWait1,
            "05" => TcpState::FinWait2,
            "06" => TcpState::TimeWait,
            "07" => TcpState::Close,
            "08" => TcpState::CloseWait,
            "09" => TcpState::LastAck,
            "0A" => TcpState::Listen,
            "0B" => TcpState::Closing,
            _ => return None,
        };
        Some(state)
    }

    /// Lowercase label used in exported metrics
    pub fn label(&self) -> &'static str {
        match self {
            TcpState::Established => "established",
            TcpState::SynSent => "synsent",
            TcpState::SynRecv => "synrecv",
            TcpState::FinWait1 => "finwait1",
            TcpState::FinWait2 => "finwait2",
            TcpState::TimeWait => "timewait",
            TcpState::Close => "close",
            TcpState::CloseWait => "closewait",
            TcpState::LastAck => "lastack",
            TcpState::Listen => "listen",
            TcpState::Closing => "closing",
        }
    }
}

/// Connection counts per TCP state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpStateCounts {
    pub established: u64,
    pub syn_sent: u64,
    pub syn_recv: u64,
    pub fin_wait1: u64,
    pub fin_wait2: u64,
    pub time_wait: u64,
    pub close: u64,
    pub close_wait: u64,
    pub last_ack: u64,
    pub listen: u64,
    pub closing: u64,
}

impl TcpStateCounts {
    pub fn get(&self, state: TcpState) -> u64 {
        match state {
            TcpState::Established => self.established,
            TcpState::SynSent => self.syn_sent,
            TcpState::SynRecv => self.syn_recv,
            TcpState::FinWait1 => self.fin_wait1,
            TcpState::FinWait2 => self.fin_wait2,
            TcpState::TimeWait => self.time_wait,
            TcpState::Close => self.close,
            TcpState::CloseWait => self.close_wait,
            TcpState::LastAck => self.last_ack,
            TcpState::Listen => self.listen,
            TcpState::Closing => self.closing,
        }
    }

    pub fn increment(&mut self, state: TcpState) {
        let counter = match state {
            TcpState::Established => &mut self.established,
            TcpState::SynSent => &mut self.syn_sent,
            TcpState::SynRecv => &mut self.syn_recv,
            TcpState::FinWait1 => &mut self.fin_wait1,
            TcpState::FinWait2 => &mut self.fin_wait2,
            TcpState::TimeWait => &mut self.time_wait,
            TcpState::Close => &mut self.close,
            TcpState::CloseWait => &mut self.close_wait,
            TcpState::LastAck => &mut self.last_ack,
            TcpState::Listen => &mut self.listen,
            TcpState::Closing => &mut self.closing,
        };
        *counter += 1;
    }

    /// Sum over all eleven states
    pub fn total(&self) -> u64 {
        TcpState::ALL.iter().map(|s| self.get(*s)).sum()
    }
}

/// Per-local-port TCP state breakdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortTable {
    pub ports: BTreeMap<u16, TcpStateCounts>,
}

impl PortTable {
    pub fn get(&self, port: u16) -> Option<&TcpStateCounts> {
        self.ports.get(&port)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

/// UDP socket table summary
///
/// `listen` counts every data row of the table, whatever its state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UdpStat {
    pub listen: u64,
    pub dropped: u64,
    pub rx_queued: u64,
    pub tx_queued: u64,
}

/// Selected counters of the `TcpExt` block of `/proc/<pid>/net/netstat`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TcpExtStat {
    pub prune_called: u64,
    pub lock_dropped_icmps: u64,
    pub arp_filter: u64,
    pub tw: u64,
    pub delayed_ack_locked: u64,
    pub listen_overflows: u64,
    pub listen_drops: u64,
    pub tcp_prequeue_dropped: u64,
    pub tcp_ts_reorder: u64,
    pub tcp_dsack_undo: u64,
    pub tcp_lost_retransmit: u64,
    pub tcp_loss_failures: u64,
    pub tcp_fast_retrans: u64,
    pub tcp_timeouts: u64,
    pub tcp_scheduler_failed: u64,
    pub tcp_abort_on_memory: u64,
    pub tcp_abort_on_timeout: u64,
    pub tcp_abort_failed: u64,
    pub tcp_memory_pressures: u64,
    pub tcp_spurious_rtos: u64,
    pub tcp_backlog_drop: u64,
    pub tcp_min_ttl_drop: u64,
}

/// One timestamped observation of a workload's network counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Sample {
    pub timestamp: DateTime<Utc>,
    pub tcp: TcpStateCounts,
    pub udp: UdpStat,
    pub tcp6: TcpStateCounts,
    pub udp6: UdpStat,
    pub tcp_ext: TcpExtStat,
    pub tcp_ports: PortTable,
    pub tcp6_ports: PortTable,
}

impl Sample {
    /// Sample with all counters zeroed
    pub fn empty(timestamp: DateTime<Utc>) -> Self {
        Self {
            timestamp,
            tcp: TcpStateCounts::default(),
            udp: UdpStat::default(),
            tcp6: TcpStateCounts::default(),
            udp6: UdpStat::default(),
            tcp_ext: TcpExtStat::default(),
            tcp_ports: PortTable::default(),
            tcp6_ports: PortTable::default(),
        }
    }
}

/// A workload's spec plus its ordered sample history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkloadRecord {
    pub spec: WorkloadSpec,
    /// Ascending by timestamp, oldest first
    #[serde(default)]
    pub stats: Vec<Sample>,
}

impl WorkloadRecord {
    pub fn new(spec: WorkloadSpec) -> Self {
        Self {
            spec,
            stats: Vec::new(),
        }
    }

    /// Most recent sample, if any
    pub fn latest(&self) -> Option<&Sample> {
        self.stats.last()
    }
}
