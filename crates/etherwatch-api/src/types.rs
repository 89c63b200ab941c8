//! Wire types for the controller's telemetry feed and history endpoint.
//!
//! Field names follow the camelCase contract (`capturedAt`, `rxBps`, ...).
//! The controller's older snake_case/abbreviated names (`t`, `rx_bps`,
//! `q`, `lat_ms`, and `Ts`/`Rx`/`Tx` for history samples) are accepted as
//! aliases. Unknown fields are ignored.

use serde::{Deserialize, Serialize};

// ── Telemetry feed ───────────────────────────────────────────────────

/// One fleet snapshot pushed over the websocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMessage {
    /// Capture time, milliseconds since the Unix epoch.
    #[serde(alias = "t")]
    pub captured_at: i64,
    pub devices: Vec<DeviceReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceReport {
    pub id: String,
    /// `OK`, `ALERT` or `OFFLINE`. Absent means `OK`.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub ifaces: Vec<InterfaceReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterfaceReport {
    pub name: String,
    #[serde(alias = "rx_bps", default)]
    pub rx_bps: f64,
    #[serde(alias = "tx_bps", default)]
    pub tx_bps: f64,
    #[serde(default)]
    pub drops: i64,
    #[serde(alias = "q", default)]
    pub queue_depth: i64,
    #[serde(alias = "lat_ms", default)]
    pub latency_ms: f64,
    #[serde(default)]
    pub status: Option<String>,
}

// ── History endpoint ─────────────────────────────────────────────────

/// Body of `GET /api/history`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryResponse {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub iface: Option<String>,
    #[serde(default)]
    pub minutes: Option<u32>,
    #[serde(default)]
    pub samples: Vec<HistorySampleReport>,
}

/// One throughput measurement. `timestamp` is milliseconds since the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySampleReport {
    #[serde(alias = "Ts")]
    pub timestamp: i64,
    #[serde(alias = "Rx", default)]
    pub rx_bps: f64,
    #[serde(alias = "Tx", default)]
    pub tx_bps: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_camel_case() {
        let json = r#"{
            "capturedAt": 1000,
            "devices": [{
                "id": "leaf-1",
                "status": "OK",
                "ifaces": [{
                    "name": "e1", "rxBps": 1e9, "txBps": 8e8, "drops": 0,
                    "queueDepth": 0, "latencyMs": 0.5, "status": "OK"
                }]
            }]
        }"#;
        let msg: SnapshotMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.captured_at, 1000);
        assert_eq!(msg.devices.len(), 1);
        let iface = &msg.devices[0].ifaces[0];
        assert_eq!(iface.name, "e1");
        assert!((iface.rx_bps - 1e9).abs() < f64::EPSILON);
        assert!((iface.latency_ms - 0.5).abs() < f64::EPSILON);
        assert_eq!(iface.status.as_deref(), Some("OK"));
    }

    #[test]
    fn snapshot_controller_legacy_names() {
        let json = r#"{
            "t": 1718000000000,
            "devices": [{
                "id": "spine-01",
                "status": "ALERT",
                "ifaces": [{
                    "name": "ethernet1", "rx_bps": 1200.5, "tx_bps": 800,
                    "drops": 120, "q": 24, "lat_ms": 6.2, "status": "ALERT"
                }]
            }, {
                "id": "leaf-24",
                "status": "OFFLINE"
            }]
        }"#;
        let msg: SnapshotMessage = serde_json::from_str(json).unwrap();
        assert_eq!(msg.captured_at, 1_718_000_000_000);
        let iface = &msg.devices[0].ifaces[0];
        assert_eq!(iface.queue_depth, 24);
        assert_eq!(iface.drops, 120);
        assert!(msg.devices[1].ifaces.is_empty());
    }

    #[test]
    fn snapshot_without_timestamp_is_rejected() {
        let json = r#"{ "devices": [] }"#;
        assert!(serde_json::from_str::<SnapshotMessage>(json).is_err());
    }

    #[test]
    fn history_response_accepts_controller_samples() {
        let json = r#"{
            "device": "leaf-11", "iface": "uplink1", "minutes": 5,
            "samples": [
                {"Ts": 1000, "Rx": 10.0, "Tx": 4.0, "Drops": 3, "Q": 1, "Lat": 0.7, "Seq": 9},
                {"timestamp": 2000, "rxBps": 12.0, "txBps": 5.0}
            ]
        }"#;
        let resp: HistoryResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.minutes, Some(5));
        assert_eq!(resp.samples.len(), 2);
        assert_eq!(resp.samples[0].timestamp, 1000);
        assert!((resp.samples[1].tx_bps - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn history_response_without_samples_is_empty() {
        let resp: HistoryResponse = serde_json::from_str("{}").unwrap();
        assert!(resp.samples.is_empty());
    }
}
