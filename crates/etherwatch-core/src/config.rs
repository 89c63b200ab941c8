// ── Runtime sync configuration ──
//
// These types describe *how* the dashboard talks to a controller and how
// often it refreshes. They never touch disk: the TUI loads settings via
// `etherwatch-config` and hands the resolved values in.

use std::time::Duration;

use etherwatch_api::{ReconnectConfig, TlsMode};

/// Default controller origin when nothing else is known.
pub const DEFAULT_ORIGIN: &str = "http://localhost:8080";

/// Configuration for the live sync controller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Resolved HTTP(S) origin of the controller, e.g. `http://10.0.0.5:8080`.
    pub controller_origin: String,
    /// Period of the synthetic generator while in fallback.
    pub tick_interval: Duration,
    /// Websocket reconnect backoff.
    pub reconnect: ReconnectConfig,
    /// Certificate verification for `wss://` controllers.
    pub tls: TlsMode,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            controller_origin: DEFAULT_ORIGIN.into(),
            tick_interval: Duration::from_millis(1600),
            reconnect: ReconnectConfig::default(),
            tls: TlsMode::System,
        }
    }
}

impl SyncConfig {
    pub fn new(controller_origin: impl Into<String>) -> Self {
        Self {
            controller_origin: controller_origin.into(),
            ..Self::default()
        }
    }
}

/// Configuration for per-device history polling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HistoryConfig {
    /// Size of the requested history window.
    pub window_minutes: u32,
    /// How often an expanded device re-fetches its history.
    pub poll_interval: Duration,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_minutes: 5,
            poll_interval: Duration::from_secs(10),
        }
    }
}
