//! Export of the sample store
//!
//! The newest sample of every workload is exposed as Prometheus gauges
//! through [`StoreCollector`]; [`api`] serves them over HTTP together with a
//! JSON view of the store.

pub mod api;

use crate::models::{Sample, TcpState, TcpStateCounts, UdpStat};
use crate::storage::SampleStore;
use prometheus::core::{Collector, Desc};
use prometheus::proto::MetricFamily;
use prometheus::{GaugeVec, Opts};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Labels carried by every exported series
const BASE_LABELS: [&str; 2] = ["id", "image"];

/// One exported metric: the values it yields for a sample, each paired with
/// the value of its extra label (unused when `label` is `None`)
pub struct MetricDef {
    pub name: &'static str,
    pub help: &'static str,
    pub label: Option<&'static str>,
    pub values: fn(&Sample) -> Vec<(f64, &'static str)>,
}

pub static METRICS: &[MetricDef] = &[
    MetricDef {
        name: "netstat_container_last_seen",
        help: "Last time a container was seen by the exporter",
        label: None,
        values: last_seen,
    },
    MetricDef {
        name: "netstat_container_timestamp",
        help: "Timestamp of the newest network stats sample",
        label: None,
        values: sample_timestamp,
    },
    MetricDef {
        name: "netstat_container_network_tcp_usage_total",
        help: "tcp connection usage statistic for container",
        label: Some("tcp_state"),
        values: tcp_values,
    },
    MetricDef {
        name: "netstat_container_network_udp_usage_total",
        help: "udp connection usage statistic for container",
        label: Some("udp_state"),
        values: udp_values,
    },
    MetricDef {
        name: "netstat_container_network_tcp6_usage_total",
        help: "tcp6 connection usage statistic for container",
        label: Some("tcp6_state"),
        values: tcp6_values,
    },
    MetricDef {
        name: "netstat_container_network_udp6_usage_total",
        help: "udp6 connection usage statistic for container",
        label: Some("udp6_state"),
        values: udp6_values,
    },
    MetricDef {
        name: "netstat_container_network_tcpext_usage_total",
        help: "tcpext connection usage statistic for container",
        label: Some("tcpext_state"),
        values: tcp_ext_values,
    },
];

impl MetricDef {
    fn label_names(&self) -> Vec<&'static str> {
        let mut names = BASE_LABELS.to_vec();
        names.extend(self.label);
        names
    }
}

fn last_seen(_: &Sample) -> Vec<(f64, &'static str)> {
    vec![(chrono::Utc::now().timestamp() as f64, "")]
}

fn sample_timestamp(s: &Sample) -> Vec<(f64, &'static str)> {
    vec![(s.timestamp.timestamp() as f64, "")]
}

fn state_values(counts: &TcpStateCounts) -> Vec<(f64, &'static str)> {
    TcpState::ALL
        .iter()
        .map(|state| (counts.get(*state) as f64, state.label()))
        .collect()
}

fn queue_values(udp: &UdpStat) -> Vec<(f64, &'static str)> {
    vec![
        (udp.listen as f64, "listen"),
        (udp.dropped as f64, "dropped"),
        (udp.rx_queued as f64, "rxqueued"),
        (udp.tx_queued as f64, "txqueued"),
    ]
}

fn tcp_values(s: &Sample) -> Vec<(f64, &'static str)> {
    state_values(&s.tcp)
}

fn tcp6_values(s: &Sample) -> Vec<(f64, &'static str)> {
    state_values(&s.tcp6)
}

fn udp_values(s: &Sample) -> Vec<(f64, &'static str)> {
    queue_values(&s.udp)
}

fn udp6_values(s: &Sample) -> Vec<(f64, &'static str)> {
    queue_values(&s.udp6)
}

fn tcp_ext_values(s: &Sample) -> Vec<(f64, &'static str)> {
    let e = &s.tcp_ext;
    [
        (e.prune_called, "prunecalled"),
        (e.lock_dropped_icmps, "lockdroppedicmps"),
        (e.arp_filter, "arpfilter"),
        (e.tw, "tw"),
        (e.delayed_ack_locked, "delayedacklocked"),
        (e.listen_overflows, "listenoverflows"),
        (e.listen_drops, "listendrops"),
        (e.tcp_prequeue_dropped, "tcpprequeuedropped"),
        (e.tcp_ts_reorder, "tcptsreorder"),
        (e.tcp_dsack_undo, "tcpdsackundo"),
        (e.tcp_lost_retransmit, "tcplostretransmit"),
        (e.tcp_loss_failures, "tcplossfailures"),
        (e.tcp_fast_retrans, "tcpfastretrans"),
        (e.tcp_timeouts, "tcptimeouts"),
        (e.tcp_scheduler_failed, "tcpschedulerfailed"),
        (e.tcp_abort_on_memory, "tcpabortonmemory"),
        (e.tcp_abort_on_timeout, "tcpabortontimeout"),
        (e.tcp_abort_failed, "tcpabortfailed"),
        (e.tcp_memory_pressures, "tcpmemorypressures"),
        (e.tcp_spurious_rtos, "tcpspuriousrtos"),
        (e.tcp_backlog_drop, "tcpbacklogdrop"),
        (e.tcp_min_ttl_drop, "tcpminttldrop"),
    ]
    .into_iter()
    .map(|(value, label)| (value as f64, label))
    .collect()
}

/// Prometheus collector reading the store on every scrape
pub struct StoreCollector {
    store: Arc<SampleStore>,
    descs: Vec<Desc>,
}

impl StoreCollector {
    pub fn new(store: Arc<SampleStore>) -> prometheus::Result<Self> {
        let descs = METRICS
            .iter()
            .map(|def| {
                Desc::new(
                    def.name.to_string(),
                    def.help.to_string(),
                    def.label_names().into_iter().map(String::from).collect(),
                    HashMap::new(),
                )
            })
            .collect::<prometheus::Result<Vec<_>>>()?;

        Ok(Self { store, descs })
    }
}

impl Collector for StoreCollector {
    fn desc(&self) -> Vec<&Desc> {
        self.descs.iter().collect()
    }

    fn collect(&self) -> Vec<MetricFamily> {
        let records = self.store.get_all();
        let mut families = Vec::with_capacity(METRICS.len());

        for def in METRICS {
            let gauges = match GaugeVec::new(Opts::new(def.name, def.help), &def.label_names()) {
                Ok(gauges) => gauges,
                Err(e) => {
                    warn!(metric = def.name, error = %e, "Failed to build metric");
                    continue;
                }
            };

            for record in records.values() {
                let Some(sample) = record.latest() else {
                    continue;
                };

                for (value, label) in (def.values)(sample) {
                    let mut label_values =
                        vec![record.spec.name.as_str(), record.spec.image.as_str()];
                    if def.label.is_some() {
                        label_values.push(label);
                    }
                    gauges.with_label_values(&label_values).set(value);
                }
            }

            families.extend(gauges.collect());
        }

        families
    }
}
