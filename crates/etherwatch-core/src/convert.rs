// ── Wire-to-domain conversions ──
//
// Validates raw `etherwatch_api` payloads into canonical `model` types.
// Unlike a lenient `From`, every conversion here is a `TryFrom`: a payload
// that breaks a fleet invariant is rejected whole, never partially applied.

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use etherwatch_api::types::{DeviceReport, HistorySampleReport, InterfaceReport, SnapshotMessage};

use crate::error::CoreError;
use crate::model::{Device, HistorySample, Interface, Snapshot, SnapshotSource, Status};

// ── Helpers ────────────────────────────────────────────────────────

fn epoch_ms_to_datetime(ms: i64) -> Result<DateTime<Utc>, CoreError> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| CoreError::malformed(format!("timestamp {ms} is out of range")))
}

/// Parse a status string. Absent means `OK`.
fn parse_status(raw: Option<&str>, owner: &str) -> Result<Status, CoreError> {
    match raw {
        None => Ok(Status::Ok),
        Some(s) => s
            .parse()
            .map_err(|_| CoreError::malformed(format!("{owner}: unknown status {s:?}"))),
    }
}

fn rate(value: f64, field: &str, owner: &str) -> Result<f64, CoreError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(CoreError::malformed(format!("{owner}: {field} must be a non-negative number")))
    }
}

fn first_duplicate<'a>(mut names: impl Iterator<Item = &'a str>) -> Option<String> {
    let mut seen = HashSet::new();
    names.find(|n| !seen.insert(*n)).map(str::to_owned)
}

fn counter(value: i64, field: &str, owner: &str) -> Result<u64, CoreError> {
    u64::try_from(value)
        .map_err(|_| CoreError::malformed(format!("{owner}: {field} must not be negative")))
}

// ── Snapshot ───────────────────────────────────────────────────────

impl TryFrom<InterfaceReport> for Interface {
    type Error = CoreError;

    fn try_from(r: InterfaceReport) -> Result<Self, Self::Error> {
        let owner = format!("interface {}", r.name);
        Ok(Self {
            rx_bps: rate(r.rx_bps, "rxBps", &owner)?,
            tx_bps: rate(r.tx_bps, "txBps", &owner)?,
            drops: counter(r.drops, "drops", &owner)?,
            queue_depth: counter(r.queue_depth, "queueDepth", &owner)?,
            latency_ms: rate(r.latency_ms, "latencyMs", &owner)?,
            status: parse_status(r.status.as_deref(), &owner)?,
            name: r.name,
        })
    }
}

impl TryFrom<DeviceReport> for Device {
    type Error = CoreError;

    fn try_from(r: DeviceReport) -> Result<Self, Self::Error> {
        let owner = format!("device {}", r.id);
        let status = parse_status(r.status.as_deref(), &owner)?;

        if let Some(dup) = first_duplicate(r.ifaces.iter().map(|i| i.name.as_str())) {
            return Err(CoreError::malformed(format!("{owner}: duplicate interface {dup}")));
        }

        let ifaces = r
            .ifaces
            .into_iter()
            .map(Interface::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            id: r.id,
            status,
            ifaces,
        })
    }
}

impl TryFrom<SnapshotMessage> for Snapshot {
    type Error = CoreError;

    fn try_from(msg: SnapshotMessage) -> Result<Self, Self::Error> {
        let captured_at = epoch_ms_to_datetime(msg.captured_at)?;

        if let Some(dup) = first_duplicate(msg.devices.iter().map(|d| d.id.as_str())) {
            return Err(CoreError::malformed(format!("duplicate device {dup}")));
        }

        let devices = msg
            .devices
            .into_iter()
            .map(Device::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            captured_at,
            devices,
            source: SnapshotSource::Live,
        })
    }
}

// ── History ────────────────────────────────────────────────────────

/// Rates pass through unchecked; the normalizer copes with any series.
/// Only the timestamp can reject a sample.
impl TryFrom<HistorySampleReport> for HistorySample {
    type Error = CoreError;

    fn try_from(r: HistorySampleReport) -> Result<Self, Self::Error> {
        Ok(Self {
            timestamp: epoch_ms_to_datetime(r.timestamp)?,
            rx_bps: r.rx_bps,
            tx_bps: r.tx_bps,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(name: &str) -> InterfaceReport {
        InterfaceReport {
            name: name.into(),
            rx_bps: 1.0e9,
            tx_bps: 8.0e8,
            drops: 0,
            queue_depth: 0,
            latency_ms: 0.5,
            status: Some("OK".into()),
        }
    }

    fn message(devices: Vec<DeviceReport>) -> SnapshotMessage {
        SnapshotMessage {
            captured_at: 1_000,
            devices,
        }
    }

    fn device(id: &str, ifaces: Vec<InterfaceReport>) -> DeviceReport {
        DeviceReport {
            id: id.into(),
            status: None,
            ifaces,
        }
    }

    #[test]
    fn valid_snapshot_converts() {
        let snap = Snapshot::try_from(message(vec![device("leaf-1", vec![report("e1")])])).unwrap();
        assert_eq!(snap.captured_at.timestamp_millis(), 1_000);
        assert_eq!(snap.source, SnapshotSource::Live);

        let dev = &snap.devices[0];
        assert_eq!(dev.status, Status::Ok);
        assert_eq!(dev.ifaces[0].name, "e1");
        assert!((dev.ifaces[0].rx_bps - 1.0e9).abs() < f64::EPSILON);
    }

    #[test]
    fn device_status_is_taken_as_given() {
        let mut dev = device("spine-01", vec![report("e1")]);
        dev.status = Some("ALERT".into());
        let snap = Snapshot::try_from(message(vec![dev])).unwrap();
        assert_eq!(snap.devices[0].status, Status::Alert);
    }

    #[test]
    fn duplicate_device_ids_are_malformed() {
        let err = Snapshot::try_from(message(vec![device("a", vec![]), device("a", vec![])]))
            .unwrap_err();
        assert!(matches!(err, CoreError::MalformedPayload { .. }));
        assert!(err.to_string().contains("duplicate device a"));
    }

    #[test]
    fn duplicate_interface_names_are_malformed() {
        let err =
            Snapshot::try_from(message(vec![device("a", vec![report("e1"), report("e1")])]))
                .unwrap_err();
        assert!(err.to_string().contains("duplicate interface e1"));
    }

    #[test]
    fn negative_or_non_finite_metrics_are_malformed() {
        let mut neg = report("e1");
        neg.drops = -1;
        assert!(Interface::try_from(neg).is_err());

        let mut nan = report("e1");
        nan.latency_ms = f64::NAN;
        assert!(Interface::try_from(nan).is_err());

        let mut inf = report("e1");
        inf.tx_bps = f64::INFINITY;
        assert!(Interface::try_from(inf).is_err());
    }

    #[test]
    fn unknown_status_is_malformed() {
        let mut r = report("e1");
        r.status = Some("DEGRADED".into());
        let err = Interface::try_from(r).unwrap_err();
        assert!(err.to_string().contains("unknown status"));
    }

    #[test]
    fn history_sample_converts() {
        let sample = HistorySample::try_from(HistorySampleReport {
            timestamp: 2_000,
            rx_bps: 10.0,
            tx_bps: 4.0,
        })
        .unwrap();
        assert_eq!(sample.timestamp_ms(), 2_000);

        let bad = HistorySampleReport {
            timestamp: i64::MAX,
            rx_bps: 0.0,
            tx_bps: 0.0,
        };
        assert!(HistorySample::try_from(bad).is_err());
    }

    #[test]
    fn negative_history_rates_are_kept() {
        let sample = HistorySample::try_from(HistorySampleReport {
            timestamp: 1_000,
            rx_bps: -1.0,
            tx_bps: 2.0,
        })
        .unwrap();
        assert!((sample.rx_bps + 1.0).abs() < f64::EPSILON);
        assert!((sample.tx_bps - 2.0).abs() < f64::EPSILON);
    }
}
