// ── History domain types ──

use chrono::{DateTime, Utc};

/// One throughput measurement for a single interface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HistorySample {
    pub timestamp: DateTime<Utc>,
    pub rx_bps: f64,
    pub tx_bps: f64,
}

impl HistorySample {
    pub fn new(timestamp: DateTime<Utc>, rx_bps: f64, tx_bps: f64) -> Self {
        Self {
            timestamp,
            rx_bps,
            tx_bps,
        }
    }

    /// Milliseconds since the Unix epoch, the x-axis unit of every chart.
    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp.timestamp_millis()
    }
}
