//! `etherwatch`: real-time terminal dashboard for fleet telemetry.
//!
//! Built on [ratatui](https://ratatui.rs) on top of `etherwatch-core`'s
//! [`LiveSync`](etherwatch_core::LiveSync): the fleet follows the
//! controller's websocket feed, or a synthetic demo fleet while no
//! controller has been reached.
//!
//! Logs are written to a file (default `$TMPDIR/etherwatch.log`) to avoid
//! corrupting the terminal UI.

mod action;
mod app;
mod component;
mod data_bridge;
mod event;
mod screens;
mod theme;
mod tui;
mod widgets;

use std::path::PathBuf;

use clap::Parser;
use color_eyre::eyre::Result;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use etherwatch_config::{Config, config_path, load_config_from, save_config};
use etherwatch_core::{HistoryClient, LiveSync};

use crate::app::App;

/// Terminal dashboard for EtherWatch fleet telemetry.
#[derive(Parser, Debug)]
#[command(name = "etherwatch", version, about)]
struct Cli {
    /// Controller origin (e.g., https://ctl.example.net:8443)
    #[arg(short = 'c', long, env = "ETHERWATCH_CONTROLLER")]
    controller: Option<String>,

    /// Location the dashboard is served from; the controller origin is
    /// inferred from it when --controller is not set
    #[arg(short = 'l', long, env = "ETHERWATCH_LOCATION")]
    location: Option<String>,

    /// Config file (defaults to the platform config dir)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log file path (defaults to $TMPDIR/etherwatch.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write the effective configuration to the config file and exit
    #[arg(long)]
    write_config: bool,
}

/// File-based tracing. Logging to stdout/stderr would corrupt the TUI.
/// The returned guard must be held for the lifetime of the application.
fn setup_tracing(cli: &Cli) -> WorkerGuard {
    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "etherwatch={log_level},etherwatch_core={log_level},etherwatch_api={log_level}"
        ))
    });

    let log_file = cli
        .log_file
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("etherwatch.log"));
    let log_dir = log_file
        .parent()
        .map_or_else(std::env::temp_dir, std::path::Path::to_path_buf);
    let log_filename = log_file
        .file_name()
        .unwrap_or(std::ffi::OsStr::new("etherwatch.log"));

    let file_appender = tracing_appender::rolling::never(log_dir, log_filename);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true),
        )
        .init();

    guard
}

/// File + environment, then CLI flags on top.
fn effective_config(cli: &Cli, path: &std::path::Path) -> Result<Config> {
    let mut cfg = load_config_from(path)?;
    if let Some(controller) = &cli.controller {
        cfg.controller = Some(controller.clone());
    }
    if let Some(location) = &cli.location {
        cfg.location.clone_from(location);
    }
    Ok(cfg)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tui::install_hooks()?;

    let _log_guard = setup_tracing(&cli);

    let path = cli.config.clone().unwrap_or_else(config_path);
    let cfg = effective_config(&cli, &path)?;

    if cli.write_config {
        save_config(&cfg, &path)?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    let sync_config = cfg.sync_config()?;
    let history_config = cfg.history_config()?;
    let origin = sync_config.controller_origin.clone();
    let history = HistoryClient::new(&origin, &cfg.transport_config())?;

    info!(
        origin = %origin,
        config = %path.display(),
        tick_ms = cfg.sync.tick_ms,
        "starting etherwatch"
    );

    let sync = LiveSync::spawn(sync_config);
    let mut app = App::new(sync, history, history_config, origin);
    app.run().await?;

    Ok(())
}
