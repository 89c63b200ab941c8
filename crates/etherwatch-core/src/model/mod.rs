// ── Domain model ──
//
// Canonical fleet types consumed by the dashboard. Wire payloads are
// validated into these types in `convert`; nothing downstream ever sees
// a raw `SnapshotMessage`.

mod fleet;
mod history;

pub use fleet::{
    Device, DeviceAggregates, FleetTotals, Interface, Snapshot, SnapshotSource, Status,
    derive_status,
};
pub use history::HistorySample;
