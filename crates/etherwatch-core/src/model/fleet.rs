// ── Fleet domain types ──

use chrono::{DateTime, Utc};
use strum::{Display, EnumString};

/// Health of a device or interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum Status {
    #[default]
    Ok,
    Alert,
    Offline,
}

impl Status {
    pub fn is_ok(self) -> bool {
        matches!(self, Self::Ok)
    }
}

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SnapshotSource {
    /// Received from the controller's telemetry feed.
    #[default]
    Live,
    /// Produced locally by the synthetic generator.
    Synthetic,
}

/// Point-in-time telemetry for one interface.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pub name: String,
    pub rx_bps: f64,
    pub tx_bps: f64,
    pub drops: u64,
    pub queue_depth: u64,
    pub latency_ms: f64,
    pub status: Status,
}

impl Interface {
    /// A healthy interface with no traffic.
    pub fn idle(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rx_bps: 0.0,
            tx_bps: 0.0,
            drops: 0,
            queue_depth: 0,
            latency_ms: 0.0,
            status: Status::Ok,
        }
    }

    /// Zero every metric and mark the interface offline.
    pub fn take_offline(&mut self) {
        let name = std::mem::take(&mut self.name);
        *self = Self {
            status: Status::Offline,
            ..Self::idle(name)
        };
    }
}

/// A network device and its interfaces, in controller order.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    pub status: Status,
    pub ifaces: Vec<Interface>,
}

/// Per-device rollup shown on each fleet card.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceAggregates {
    pub rx_bps: f64,
    pub tx_bps: f64,
    pub drops: u64,
    /// Mean interface latency, `0.0` for a device without interfaces.
    pub avg_latency_ms: f64,
}

impl Device {
    pub fn iface(&self, name: &str) -> Option<&Interface> {
        self.ifaces.iter().find(|i| i.name == name)
    }

    pub fn iface_names(&self) -> Vec<String> {
        self.ifaces.iter().map(|i| i.name.clone()).collect()
    }

    #[allow(clippy::cast_precision_loss, clippy::as_conversions)]
    pub fn aggregates(&self) -> DeviceAggregates {
        let mut agg = DeviceAggregates::default();
        for iface in &self.ifaces {
            agg.rx_bps += iface.rx_bps;
            agg.tx_bps += iface.tx_bps;
            agg.drops = agg.drops.saturating_add(iface.drops);
            agg.avg_latency_ms += iface.latency_ms;
        }
        if !self.ifaces.is_empty() {
            agg.avg_latency_ms /= self.ifaces.len() as f64;
        }
        agg
    }
}

/// Device status implied by its interfaces.
///
/// `OFFLINE` when every interface is offline (vacuously so for a device
/// without interfaces), `ALERT` when any interface alerts, `OK` otherwise.
pub fn derive_status(ifaces: &[Interface]) -> Status {
    if ifaces.iter().all(|i| i.status == Status::Offline) {
        Status::Offline
    } else if ifaces.iter().any(|i| i.status == Status::Alert) {
        Status::Alert
    } else {
        Status::Ok
    }
}

/// Fleet-wide throughput totals for the header.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FleetTotals {
    pub rx_bps: f64,
    pub tx_bps: f64,
    pub interfaces: usize,
}

/// The whole fleet at one instant.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub captured_at: DateTime<Utc>,
    pub devices: Vec<Device>,
    pub source: SnapshotSource,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::empty()
    }
}

impl Snapshot {
    /// What the dashboard shows before anything has arrived.
    pub fn empty() -> Self {
        Self {
            captured_at: DateTime::UNIX_EPOCH,
            devices: Vec::new(),
            source: SnapshotSource::Live,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    pub fn is_synthetic(&self) -> bool {
        self.source == SnapshotSource::Synthetic
    }

    pub fn device(&self, id: &str) -> Option<&Device> {
        self.devices.iter().find(|d| d.id == id)
    }

    pub fn totals(&self) -> FleetTotals {
        self.devices
            .iter()
            .flat_map(|d| &d.ifaces)
            .fold(FleetTotals::default(), |mut acc, iface| {
                acc.rx_bps += iface.rx_bps;
                acc.tx_bps += iface.tx_bps;
                acc.interfaces += 1;
                acc
            })
    }

    /// Devices that are not healthy, in fleet order.
    pub fn alerts(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| !d.status.is_ok())
    }

    pub fn offline(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter().filter(|d| d.status == Status::Offline)
    }
}
