//! TCP socket table parsing
//!
//! Reads `/proc/<pid>/net/tcp` and `/proc/<pid>/net/tcp6`. Both share the
//! same layout:
//!
//! ```text
//!   sl  local_address rem_address   st tx_queue rx_queue ...
//!    0: 00000000:0050 00000000:0000 0A 00000000:00000000 ...
//! ```
//!
//! Each data row counts once towards the global per-state totals and once
//! towards the bucket of its local port.

use crate::error::ParseError;
use crate::models::{PortTable, TcpState, TcpStateCounts};
use std::path::Path;
use tokio::fs;

/// Parsed TCP table: global state counts plus the per-port breakdown
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TcpTable {
    pub counts: TcpStateCounts,
    pub ports: PortTable,
}

/// Parse the contents of a TCP socket table
///
/// The first line is a column header and is skipped without validation.
/// An unknown state code or an unparsable local port rejects the whole
/// table; no partial result is returned.
pub fn parse_tcp_table(content: &str) -> Result<TcpTable, ParseError> {
    let mut table = TcpTable::default();

    for line in content.lines().skip(1) {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.is_empty() {
            continue;
        }
        if fields.len() < 4 {
            return Err(ParseError::InvalidLine {
                line: line.to_string(),
            });
        }

        let state = TcpState::from_code(fields[3]).ok_or_else(|| ParseError::InvalidLine {
            line: line.to_string(),
        })?;
        let port = parse_local_port(fields[1]).ok_or_else(|| ParseError::InvalidPort {
            line: line.to_string(),
        })?;

        table.counts.increment(state);
        table.ports.ports.entry(port).or_default().increment(state);
    }

    Ok(table)
}

/// Extract the port half of `hexIP:hexPort`
fn parse_local_port(local_address: &str) -> Option<u16> {
    let (_, port_hex) = local_address.rsplit_once(':')?;
    u16::from_str_radix(port_hex, 16).ok()
}

/// Read and parse a TCP socket table from disk
pub async fn read_tcp_table(path: &Path) -> Result<TcpTable, ParseError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ParseError::io(path, e))?;
    parse_tcp_table(&content)
}
