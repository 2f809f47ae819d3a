//! Extended TCP counters from `/proc/<pid>/net/netstat`
//!
//! The file is a sequence of line pairs, a header naming the counters and a
//! value line in the same order, each prefixed by its block label:
//!
//! ```text
//! TcpExt: SyncookiesSent SyncookiesRecv ...
//! TcpExt: 0 0 ...
//! IpExt: InNoRoutes InTruncatedPkts ...
//! IpExt: 0 0 ...
//! ```

use crate::error::ParseError;
use crate::models::TcpExtStat;
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;

const TCP_EXT_LABEL: &str = "TcpExt";

/// Counters projected into [`TcpExtStat`]
const TRACKED_COUNTERS: [&str; 22] = [
    "PruneCalled",
    "LockDroppedIcmps",
    "ArpFilter",
    "TW",
    "DelayedACKLocked",
    "ListenOverflows",
    "ListenDrops",
    "TCPPrequeueDropped",
    "TCPTSReorder",
    "TCPDSACKUndo",
    "TCPLostRetransmit",
    "TCPLossFailures",
    "TCPFastRetrans",
    "TCPTimeouts",
    "TCPSchedulerFailed",
    "TCPAbortOnMemory",
    "TCPAbortOnTimeout",
    "TCPAbortFailed",
    "TCPMemoryPressures",
    "TCPSpuriousRTOs",
    "TCPBacklogDrop",
    "TCPMinTTLDrop",
];

/// Split `Label: a b c` into its label and tokens
fn split_labelled(line: &str) -> Option<(&str, Vec<&str>)> {
    let (label, rest) = line.split_once(':')?;
    Some((label.trim(), rest.split_whitespace().collect()))
}

/// Parse the `TcpExt` block of a netstat file
///
/// Counters absent from the file stay zero. A value that is missing or not
/// an unsigned integer fails the whole parse. If there is no `TcpExt` block
/// the result is all zeros.
pub fn parse_tcp_ext(content: &str) -> Result<TcpExtStat, ParseError> {
    let mut lines = content.lines();

    while let Some(line) = lines.next() {
        let Some((label, names)) = split_labelled(line) else {
            continue;
        };
        if label != TCP_EXT_LABEL {
            continue;
        }

        let values = match lines.next() {
            Some(value_line) => split_labelled(value_line)
                .map(|(_, values)| values)
                .unwrap_or_else(|| value_line.split_whitespace().collect()),
            None => Vec::new(),
        };

        let mut counters: HashMap<&str, u64> =
            TRACKED_COUNTERS.iter().map(|name| (*name, 0)).collect();

        for (i, name) in names.iter().enumerate() {
            let raw = values.get(i).ok_or_else(|| ParseError::MissingCounter {
                name: name.to_string(),
            })?;
            let value = raw.parse::<u64>().map_err(|_| ParseError::InvalidCounter {
                name: name.to_string(),
                value: raw.to_string(),
            })?;
            counters.insert(*name, value);
        }

        return Ok(project(&counters));
    }

    Ok(TcpExtStat::default())
}

fn project(counters: &HashMap<&str, u64>) -> TcpExtStat {
    let get = |name: &str| counters.get(name).copied().unwrap_or(0);

    TcpExtStat {
        prune_called: get("PruneCalled"),
        lock_dropped_icmps: get("LockDroppedIcmps"),
        arp_filter: get("ArpFilter"),
        tw: get("TW"),
        delayed_ack_locked: get("DelayedACKLocked"),
        listen_overflows: get("ListenOverflows"),
        listen_drops: get("ListenDrops"),
        tcp_prequeue_dropped: get("TCPPrequeueDropped"),
        tcp_ts_reorder: get("TCPTSReorder"),
        tcp_dsack_undo: get("TCPDSACKUndo"),
        tcp_lost_retransmit: get("TCPLostRetransmit"),
        tcp_loss_failures: get("TCPLossFailures"),
        tcp_fast_retrans: get("TCPFastRetrans"),
        tcp_timeouts: get("TCPTimeouts"),
        tcp_scheduler_failed: get("TCPSchedulerFailed"),
        tcp_abort_on_memory: get("TCPAbortOnMemory"),
        tcp_abort_on_timeout: get("TCPAbortOnTimeout"),
        tcp_abort_failed: get("TCPAbortFailed"),
        tcp_memory_pressures: get("TCPMemoryPressures"),
        tcp_spurious_rtos: get("TCPSpuriousRTOs"),
        tcp_backlog_drop: get("TCPBacklogDrop"),
        tcp_min_ttl_drop: get("TCPMinTTLDrop"),
    }
}

/// Read and parse the extended TCP counters from disk
pub async fn read_tcp_ext(path: &Path) -> Result<TcpExtStat, ParseError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ParseError::io(path, e))?;
    parse_tcp_ext(&content)
}
