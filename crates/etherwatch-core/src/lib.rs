//! Live telemetry pipeline between `etherwatch-api` and the dashboard.
//!
//! - **[`LiveSync`]**: Single actor that owns the displayed fleet
//!   snapshot. It follows the controller's websocket feed and, until the
//!   first real snapshot arrives, falls back to the [`synthetic`] generator
//!   whenever the feed is down. Consumers observe through
//!   [`SnapshotStream`] and a [`SyncState`] `watch` receiver.
//!
//! - **[`HistoryCache`]**: Per-device throughput history, polled only
//!   while the device is expanded. Stale responses are discarded by an
//!   epoch check performed under the same write that would apply them.
//!
//! - **[`plot`]**: Pure normalization of history samples into chart
//!   coordinates.
//!
//! - **Domain model** ([`model`]): Validated fleet types. Raw wire
//!   payloads are checked in `convert` and never reach consumers.

pub mod config;
pub mod convert;
pub mod error;
pub mod history;
pub mod model;
pub mod plot;
pub mod stream;
pub mod sync;
pub mod synthetic;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{DEFAULT_ORIGIN, HistoryConfig, SyncConfig};
pub use error::CoreError;
pub use history::{HistoryCache, HistoryEntry, HistorySource, HistoryState};
pub use model::{
    Device, DeviceAggregates, FleetTotals, HistorySample, Interface, Snapshot, SnapshotSource,
    Status,
};
pub use plot::{Field, PlotPoint, to_plot_points};
pub use stream::SnapshotStream;
pub use sync::{FeedConnector, LiveSync, SyncState, WebSocketConnector};

// Wire-level pieces consumers need to build a sync or history client.
pub use etherwatch_api::{
    FeedEvent, FeedHandle, HistoryClient, Location, ReconnectConfig, TlsMode, TransportConfig,
    resolve_controller_origin, to_stream_origin,
};
