//! Configuration for the EtherWatch dashboard.
//!
//! TOML file + `ETHERWATCH_*` environment, layered with figment, and
//! translation into the runtime types of `etherwatch_core`
//! ([`SyncConfig`], [`HistoryConfig`], [`TransportConfig`]).

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use etherwatch_core::{
    HistoryConfig, Location, ReconnectConfig, SyncConfig, TlsMode, TransportConfig,
    resolve_controller_origin,
};

const ENV_PREFIX: &str = "ETHERWATCH_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Explicit controller origin. Wins over `location` when non-blank.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub controller: Option<String>,

    /// Where the dashboard considers itself served from. Used to infer the
    /// controller origin when no override is set.
    #[serde(default = "default_location")]
    pub location: String,

    /// History request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Skip TLS verification (self-signed controllers).
    #[serde(default)]
    pub insecure: bool,

    /// Extra CA certificate for the controller.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca_cert: Option<PathBuf>,

    #[serde(default)]
    pub sync: SyncSection,

    #[serde(default)]
    pub history: HistorySection,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            controller: None,
            location: default_location(),
            timeout_secs: default_timeout(),
            insecure: false,
            ca_cert: None,
            sync: SyncSection::default(),
            history: HistorySection::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct SyncSection {
    /// Synthetic generator period.
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,

    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,

    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
}

impl Default for SyncSection {
    fn default() -> Self {
        Self {
            tick_ms: default_tick_ms(),
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct HistorySection {
    #[serde(default = "default_window_minutes")]
    pub window_minutes: u32,

    #[serde(default = "default_poll_secs")]
    pub poll_secs: u64,
}

impl Default for HistorySection {
    fn default() -> Self {
        Self {
            window_minutes: default_window_minutes(),
            poll_secs: default_poll_secs(),
        }
    }
}

fn default_location() -> String {
    etherwatch_core::DEFAULT_ORIGIN.into()
}
fn default_timeout() -> u64 {
    10
}
fn default_tick_ms() -> u64 {
    1600
}
fn default_reconnect_initial_ms() -> u64 {
    1000
}
fn default_reconnect_max_ms() -> u64 {
    30_000
}
fn default_window_minutes() -> u32 {
    5
}
fn default_poll_secs() -> u64 {
    10
}

// ── Translation to runtime config ───────────────────────────────────

impl Config {
    /// The controller's HTTP(S) origin: the override if set, otherwise
    /// inferred from `location`.
    pub fn controller_origin(&self) -> Result<String, ConfigError> {
        let location = Location::parse(&self.location)
            .map_err(|e| invalid("location", format!("{}: {e}", self.location)))?;
        Ok(resolve_controller_origin(self.controller.as_deref(), &location))
    }

    pub fn sync_config(&self) -> Result<SyncConfig, ConfigError> {
        if self.sync.tick_ms == 0 {
            return Err(invalid("sync.tick_ms", "must be greater than zero"));
        }
        if self.sync.reconnect_initial_ms == 0 {
            return Err(invalid("sync.reconnect_initial_ms", "must be greater than zero"));
        }
        if self.sync.reconnect_max_ms == 0 {
            return Err(invalid("sync.reconnect_max_ms", "must be greater than zero"));
        }
        if self.sync.reconnect_initial_ms > self.sync.reconnect_max_ms {
            return Err(invalid(
                "sync.reconnect_initial_ms",
                "must not exceed sync.reconnect_max_ms",
            ));
        }

        Ok(SyncConfig {
            controller_origin: self.controller_origin()?,
            tick_interval: Duration::from_millis(self.sync.tick_ms),
            reconnect: ReconnectConfig {
                initial_delay: Duration::from_millis(self.sync.reconnect_initial_ms),
                max_delay: Duration::from_millis(self.sync.reconnect_max_ms),
                max_retries: None,
            },
            tls: self.transport_config().tls,
        })
    }

    pub fn history_config(&self) -> Result<HistoryConfig, ConfigError> {
        if self.history.window_minutes == 0 {
            return Err(invalid("history.window_minutes", "must be greater than zero"));
        }
        if self.history.poll_secs == 0 {
            return Err(invalid("history.poll_secs", "must be greater than zero"));
        }
        Ok(HistoryConfig {
            window_minutes: self.history.window_minutes,
            poll_interval: Duration::from_secs(self.history.poll_secs),
        })
    }

    pub fn transport_config(&self) -> TransportConfig {
        let tls = if self.insecure {
            TlsMode::DangerAcceptInvalid
        } else if let Some(ref ca) = self.ca_cert {
            TlsMode::CustomCa(ca.clone())
        } else {
            TlsMode::System
        };

        TransportConfig {
            tls,
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("dev", "etherwatch", "etherwatch").map_or_else(
        || {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("etherwatch");
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

// ── Config loading ──────────────────────────────────────────────────

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
}

/// Load config from `path` (a missing file is fine) + environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    Ok(config)
}

/// Load config from the platform config path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize `cfg` to TOML at `path`, creating parent directories.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}
