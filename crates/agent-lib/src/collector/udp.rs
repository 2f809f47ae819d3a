//! UDP socket table parsing
//!
//! Reads `/proc/<pid>/net/udp` and `/proc/<pid>/net/udp6`. Row-level
//! irregularities never fail the parse: every row after the header is
//! counted, and queue or drop values that cannot be read are skipped for
//! that row only.

use crate::error::ParseError;
use crate::models::UdpStat;
use std::path::Path;
use tokio::fs;

/// Number of whitespace separated fields in a well-formed UDP row
const UDP_ROW_FIELDS: usize = 13;

/// Parse the contents of a UDP socket table
pub fn parse_udp_table(content: &str) -> UdpStat {
    let mut stats = UdpStat::default();

    for line in content.lines().skip(1) {
        // Counts all rows, not only sockets in a listening state
        stats.listen += 1;

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != UDP_ROW_FIELDS {
            continue;
        }

        let (rx, tx) = parse_queues(fields[4]);
        stats.rx_queued = stats.rx_queued.wrapping_add(rx);
        stats.tx_queued = stats.tx_queued.wrapping_add(tx);

        if let Ok(dropped) = fields[12].parse::<u64>() {
            stats.dropped = stats.dropped.wrapping_add(dropped);
        }
    }

    stats
}

/// Parse `rxHex:txHex`; an unreadable half counts as zero
fn parse_queues(field: &str) -> (u64, u64) {
    let (rx, tx) = field.split_once(':').unwrap_or((field, ""));
    (
        u64::from_str_radix(rx, 16).unwrap_or(0),
        u64::from_str_radix(tx, 16).unwrap_or(0),
    )
}

/// Read and parse a UDP socket table from disk
pub async fn read_udp_table(path: &Path) -> Result<UdpStat, ParseError> {
    let content = fs::read_to_string(path)
        .await
        .map_err(|e| ParseError::io(path, e))?;
    Ok(parse_udp_table(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const HEADER: &str = "   sl  local_address rem_address   st tx_queue rx_queue tr tm->when retrnsmt   uid  timeout inode ref pointer drops";

    fn row(queues: &str, drops: &str) -> String {
        format!(
            "  123: 00000000:0044 00000000:0000 07 {} 00:00000000 00000000     0        0 16411 2 ffff8f3a3b2c4400 {}",
            queues, drops
        )
    }

    #[test]
    fn test_parse_udp_table() {
        let content = [
            HEADER.to_string(),
            row("00000010:00000002", "3"),
            row("00000001:00000000", "0"),
        ]
        .join("\n");

        let stats = parse_udp_table(&content);
        assert_eq!(stats.listen, 2);
        assert_eq!(stats.rx_queued, 0x11);
        assert_eq!(stats.tx_queued, 2);
        assert_eq!(stats.dropped, 3);
    }

    #[test]
    fn test_short_row_counted_without_queues() {
        let content = [
            HEADER.to_string(),
            "  1: 00000000:0044 00000000:0000 07".to_string(),
            row("00000004:00000005", "7"),
        ]
        .join("\n");

        let stats = parse_udp_table(&content);
        assert_eq!(stats.listen, 2);
        assert_eq!(stats.rx_queued, 4);
        assert_eq!(stats.tx_queued, 5);
        assert_eq!(stats.dropped, 7);
    }

    #[test]
    fn test_unparsable_drops_skipped() {
        let content = [HEADER.to_string(), row("00000002:00000003", "n/a")].join("\n");

        let stats = parse_udp_table(&content);
        assert_eq!(stats.listen, 1);
        assert_eq!(stats.rx_queued, 2);
        assert_eq!(stats.tx_queued, 3);
        assert_eq!(stats.dropped, 0);
    }

    #[test]
    fn test_sums_wrap_instead_of_failing() {
        let content = [
            HEADER.to_string(),
            row("FFFFFFFFFFFFFFFF:00000001", "18446744073709551615"),
            row("00000002:FFFFFFFFFFFFFFFF", "18446744073709551615"),
        ]
        .join("\n");

        let stats = parse_udp_table(&content);
        assert_eq!(stats.listen, 2);
        assert_eq!(stats.rx_queued, 1);
        assert_eq!(stats.tx_queued, 0);
        assert_eq!(stats.dropped, u64::MAX - 1);
    }

    #[test]
    fn test_empty_table() {
        assert_eq!(parse_udp_table(""), UdpStat::default());
        assert_eq!(parse_udp_table(HEADER), UdpStat::default());
    }

    #[tokio::test]
    async fn test_read_missing_file() {
        let err = read_udp_table(Path::new("/nonexistent/proc/1/net/udp"))
            .await
            .unwrap_err();
        assert!(matches!(err, ParseError::Io { .. }));
    }

    proptest! {
        #[test]
        fn prop_row_count_ignores_malformed_rows(
            rows in prop::collection::vec((any::<bool>(), 0u32..4096, 0u32..4096, 0u64..1000), 0..48)
        ) {
            let mut lines = vec![HEADER.to_string()];
            let mut expected_rx = 0u64;
            let mut expected_tx = 0u64;
            let mut expected_drops = 0u64;
            for (well_formed, rx, tx, drops) in &rows {
                if *well_formed {
                    lines.push(row(&format!("{:08X}:{:08X}", rx, tx), &drops.to_string()));
                    expected_rx += u64::from(*rx);
                    expected_tx += u64::from(*tx);
                    expected_drops += drops;
                } else {
                    lines.push(format!("  9: 00000000:0044 {:08X}:{:08X}", rx, tx));
                }
            }

            let stats = parse_udp_table(&lines.join("\n"));
            prop_assert_eq!(stats.listen, rows.len() as u64);
            prop_assert_eq!(stats.rx_queued, expected_rx);
            prop_assert_eq!(stats.tx_queued, expected_tx);
            prop_assert_eq!(stats.dropped, expected_drops);
        }
    }
}
