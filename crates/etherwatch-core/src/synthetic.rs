// ── Synthetic telemetry generator ──
//
// Stand-in fleet shown while no controller is reachable. `create_snapshot`
// builds a fixed fleet; `mutate` evolves it one tick at a time. Both are
// pure: the caller owns the clock, the RNG and the timer.

use chrono::{DateTime, Utc};
use rand::Rng;

use crate::model::{Device, Interface, Snapshot, SnapshotSource, Status, derive_status};

const GBPS: f64 = 1e9;

/// Per-tick throughput jitter, as a fraction of line rate, centered on zero.
const JITTER_SPAN: f64 = 0.15;
const FAULT_PROBABILITY: f64 = 0.1;

fn iface(
    name: &str,
    rx_gbps: f64,
    tx_gbps: f64,
    drops: u64,
    queue_depth: u64,
    latency_ms: f64,
    status: Status,
) -> Interface {
    Interface {
        name: name.into(),
        rx_bps: rx_gbps * GBPS,
        tx_bps: tx_gbps * GBPS,
        drops,
        queue_depth,
        latency_ms,
        status,
    }
}

fn device(id: &str, status: Status, ifaces: Vec<Interface>) -> Device {
    Device {
        id: id.into(),
        status,
        ifaces,
    }
}

/// The hand-authored demo fleet: one healthy spine, one alerting leaf and
/// one offline leaf.
pub fn create_snapshot(captured_at: DateTime<Utc>) -> Snapshot {
    Snapshot {
        captured_at,
        devices: vec![
            device(
                "spine-01",
                Status::Ok,
                vec![
                    iface("ethernet1", 1.2, 0.8, 3, 2, 0.8, Status::Ok),
                    iface("ethernet2", 1.05, 0.88, 0, 1, 0.7, Status::Ok),
                ],
            ),
            device(
                "leaf-11",
                Status::Alert,
                vec![
                    iface("uplink1", 0.6, 0.55, 120, 24, 6.2, Status::Alert),
                    iface("uplink2", 0.58, 0.6, 0, 3, 0.9, Status::Ok),
                ],
            ),
            device(
                "leaf-24",
                Status::Offline,
                vec![iface("ethernet5", 0.0, 0.0, 0, 0, 0.0, Status::Offline)],
            ),
        ],
        source: SnapshotSource::Synthetic,
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn mutate_iface<R: Rng + ?Sized>(iface: &mut Interface, rng: &mut R) {
    if iface.status == Status::Offline {
        iface.take_offline();
        return;
    }

    let jitter = (rng.r#gen::<f64>() - 0.5) * JITTER_SPAN;
    iface.rx_bps = (iface.rx_bps + jitter * GBPS).max(0.0);
    iface.tx_bps = (iface.tx_bps + jitter * 0.9 * GBPS).max(0.0);

    if iface.status == Status::Alert || rng.gen_bool(FAULT_PROBABILITY) {
        iface.drops = rng.gen_range(80..=220);
        iface.queue_depth = rng.gen_range(20..=32);
        iface.latency_ms = round2(rng.gen_range(4.0..12.0));
        iface.status = Status::Alert;
    } else {
        iface.drops = rng.gen_range(0..=6);
        iface.queue_depth = rng.gen_range(0..=6);
        iface.latency_ms = round2(rng.gen_range(0.6..1.8));
    }
}

/// Advance `previous` by one tick.
///
/// Returns a fresh snapshot; `previous` is left untouched. Device status is
/// always re-derived from the mutated interfaces.
pub fn mutate<R: Rng + ?Sized>(
    previous: &Snapshot,
    rng: &mut R,
    captured_at: DateTime<Utc>,
) -> Snapshot {
    let mut next = previous.clone();
    next.captured_at = captured_at;
    next.source = SnapshotSource::Synthetic;

    for device in &mut next.devices {
        for iface in &mut device.ifaces {
            mutate_iface(iface, rng);
        }
        device.status = derive_status(&device.ifaces);
    }

    next
}
