//! Hot-path observability counters (§7). No HTTP/Prometheus
//! surface is exposed — see `DESIGN.md` for why — but the counters
//! themselves are ambient stack and kept regardless of that Non-goal.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct Counts {
    transient_network_errors: AtomicU64,
    protocol_errors: AtomicU64,
    reassembly_drops: AtomicU64,
    codec_errors: AtomicU64,
}

#[derive(Clone, Default)]
pub struct Metrics {
    counts: Arc<Counts>,
}

impl Metrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_transient_network_error(&self) {
        self.counts.transient_network_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_protocol_error(&self) {
        self.counts.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reassembly_drop(&self) {
        self.counts.reassembly_drops.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_codec_error(&self) {
        self.counts.codec_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            transient_network_errors: self.counts.transient_network_errors.load(Ordering::Relaxed),
            protocol_errors: self.counts.protocol_errors.load(Ordering::Relaxed),
            reassembly_drops: self.counts.reassembly_drops.load(Ordering::Relaxed),
            codec_errors: self.counts.codec_errors.load(Ordering::Relaxed),
        }
    }

    /// Spawns a background task that logs a summary line every `period`.
    /// Stops when `self` (and every other clone) is dropped.
    pub fn spawn_periodic_log(&self, period: std::time::Duration) {
        let metrics = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let snap = metrics.snapshot();
                tracing::info!(
                    transient_network_errors = snap.transient_network_errors,
                    protocol_errors = snap.protocol_errors,
                    reassembly_drops = snap.reassembly_drops,
                    codec_errors = snap.codec_errors,
                    "metrics summary"
                );
            }
        });
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MetricsSnapshot {
    pub transient_network_errors: u64,
    pub protocol_errors: u64,
    pub reassembly_drops: u64,
    pub codec_errors: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_independently() {
        let m = Metrics::new();
        m.record_protocol_error();
        m.record_protocol_error();
        m.record_reassembly_drop();
        let snap = m.snapshot();
        assert_eq!(snap.protocol_errors, 2);
        assert_eq!(snap.reassembly_drops, 1);
        assert_eq!(snap.transient_network_errors, 0);
    }
}
