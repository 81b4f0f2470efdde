// Window -> MetricRecord reduction (pure logic).
// Cumulative counters become last-minus-first deltas; memory is summarised as a gauge.

use crate::models::{CpuUsage, MemoryUsage, MetricRecord, NetworkUsage, RawSample};
use crate::sampler::window::Window;

const BYTES_PER_KB: f64 = 1024.0;

/// Reduces one window into one record. Returns None for an empty window.
pub fn aggregate_window(window: &Window, remote_ip: &str) -> Option<MetricRecord> {
    let samples = window.samples();
    let first = samples.first()?;
    let last = samples.last()?;

    Some(MetricRecord {
        container_id: window.container_id.clone(),
        name: window.name.clone(),
        remote_ip: remote_ip.to_string(),
        timestamp: window.end,
        network: network_usage(first, last),
        memory: memory_usage(samples),
        cpu: CpuUsage {
            total: counter_delta(first.cpu_time_ns, last.cpu_time_ns),
        },
    })
}

/// Delta of a cumulative counter; a decrease means the counter reset and yields zero.
pub fn counter_delta(first: u64, last: u64) -> u64 {
    last.saturating_sub(first)
}

fn network_usage(first: &RawSample, last: &RawSample) -> NetworkUsage {
    let (a, b) = (&first.network, &last.network);
    NetworkUsage {
        tx_bytes: counter_delta(a.tx_bytes, b.tx_bytes),
        rx_bytes: counter_delta(a.rx_bytes, b.rx_bytes),
        tx_packets: counter_delta(a.tx_packets, b.tx_packets),
        rx_packets: counter_delta(a.rx_packets, b.rx_packets),
        tx_errors: counter_delta(a.tx_errors, b.tx_errors),
        rx_errors: counter_delta(a.rx_errors, b.rx_errors),
        tx_dropped: counter_delta(a.tx_dropped, b.tx_dropped),
        rx_dropped: counter_delta(a.rx_dropped, b.rx_dropped),
    }
}

fn memory_usage(samples: &[RawSample]) -> MemoryUsage {
    let kb: Vec<f64> = samples
        .iter()
        .map(|s| s.memory_bytes as f64 / BYTES_PER_KB)
        .collect();
    let total: f64 = kb.iter().sum();
    MemoryUsage {
        total,
        ave: total / kb.len().max(1) as f64,
        min: kb.iter().copied().fold(f64::INFINITY, f64::min),
        max: kb.iter().copied().fold(f64::NEG_INFINITY, f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NetworkCounters;
    use chrono::{Duration, TimeZone, Utc};

    fn sample(i: i64, memory_kb: u64, cpu: u64, tx_bytes: u64) -> RawSample {
        RawSample {
            container_id: "c1".into(),
            timestamp: Utc.timestamp_opt(1_700_000_000 + i, 0).unwrap(),
            network: NetworkCounters {
                tx_bytes,
                rx_bytes: tx_bytes * 2,
                tx_packets: tx_bytes / 10,
                ..Default::default()
            },
            memory_bytes: memory_kb * 1024,
            cpu_time_ns: cpu,
        }
    }

    fn window(samples: Vec<RawSample>) -> Window {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let mut w = Window::new("c1", "web", start);
        for s in samples {
            assert!(w.push(s));
        }
        w.close(start + Duration::seconds(60))
    }

    #[test]
    fn empty_window_yields_no_record() {
        assert!(aggregate_window(&window(vec![]), "10.0.0.1").is_none());
    }

    #[test]
    fn single_sample_yields_zero_deltas() {
        let rec = aggregate_window(&window(vec![sample(0, 512, 900, 1000)]), "10.0.0.1").unwrap();
        assert_eq!(rec.network, NetworkUsage::default());
        assert_eq!(rec.cpu.total, 0);
        assert_eq!(rec.memory.min, 512.0);
        assert_eq!(rec.memory.ave, 512.0);
        assert_eq!(rec.memory.max, 512.0);
    }

    #[test]
    fn deltas_are_last_minus_first() {
        let rec = aggregate_window(
            &window(vec![
                sample(0, 10, 1_000, 100),
                sample(1, 20, 1_500, 150),
                sample(2, 30, 4_000, 400),
            ]),
            "10.0.0.1",
        )
        .unwrap();
        assert_eq!(rec.cpu.total, 3_000);
        assert_eq!(rec.network.tx_bytes, 300);
        assert_eq!(rec.network.rx_bytes, 600);
        assert_eq!(rec.network.tx_packets, 30);
        assert_eq!(rec.network.rx_dropped, 0);
    }

    #[test]
    fn memory_summary_over_samples() {
        let rec = aggregate_window(
            &window(vec![sample(0, 10, 0, 0), sample(1, 20, 0, 0), sample(2, 30, 0, 0)]),
            "10.0.0.1",
        )
        .unwrap();
        assert_eq!(rec.memory.ave, 20.0);
        assert_eq!(rec.memory.min, 10.0);
        assert_eq!(rec.memory.max, 30.0);
        assert_eq!(rec.memory.total, 60.0);
    }

    #[test]
    fn counter_reset_clamps_to_zero() {
        assert_eq!(counter_delta(100, 40), 0);
        let rec = aggregate_window(
            &window(vec![sample(0, 1, 100, 100), sample(1, 1, 40, 40)]),
            "10.0.0.1",
        )
        .unwrap();
        assert_eq!(rec.cpu.total, 0);
        assert_eq!(rec.network.tx_bytes, 0);
        assert_eq!(rec.network.rx_bytes, 0);
    }

    #[test]
    fn record_carries_tags_and_window_end() {
        let w = window(vec![sample(0, 1, 0, 0)]);
        let rec = aggregate_window(&w, "192.168.1.7").unwrap();
        assert_eq!(rec.name, "web");
        assert_eq!(rec.container_id, "c1");
        assert_eq!(rec.remote_ip, "192.168.1.7");
        assert_eq!(rec.timestamp, w.end);
    }
}
