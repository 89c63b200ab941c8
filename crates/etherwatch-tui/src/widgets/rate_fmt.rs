//! Throughput and latency formatting helpers.

/// Bits/sec as Mbps with one decimal ("1000.0").
pub fn fmt_mbps(bps: f64) -> String {
    if !bps.is_finite() {
        return "0.0".into();
    }
    format!("{:.1}", bps / 1e6)
}

/// Bits/sec as Gbps with two decimals; zero renders as "0.0".
#[allow(clippy::float_cmp)]
pub fn fmt_gbps(bps: f64) -> String {
    if bps == 0.0 || !bps.is_finite() {
        return "0.0".into();
    }
    format!("{:.2}", bps / 1e9)
}

/// Milliseconds with two decimals ("0.80 ms").
pub fn fmt_latency(ms: f64) -> String {
    format!("{ms:.2} ms")
}
