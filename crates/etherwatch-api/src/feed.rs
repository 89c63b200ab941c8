//! WebSocket telemetry feed with auto-reconnect.
//!
//! Connects to the controller's `/ws` endpoint and forwards every pushed
//! fleet snapshot, plus the connection lifecycle, through a
//! [`tokio::sync::mpsc`] channel. Reconnection uses exponential backoff
//! with jitter.
//!
//! # Example
//!
//! ```rust,ignore
//! use etherwatch_api::feed::{FeedEvent, FeedHandle, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let url = etherwatch_api::origin::stream_url("http://10.0.0.5:8080")?;
//! let mut feed = FeedHandle::spawn(url, ReconnectConfig::default(), CancellationToken::new());
//!
//! while let Some(event) = feed.recv().await {
//!     if let FeedEvent::Snapshot(msg) = event {
//!         println!("{} devices", msg.devices.len());
//!     }
//! }
//! ```

use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use rustls::ClientConfig;
use tokio::sync::mpsc;
use tokio_tungstenite::{Connector, tungstenite};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::transport::TlsMode;
use crate::types::SnapshotMessage;

const FEED_CHANNEL_CAPACITY: usize = 64;

// ── FeedEvent ────────────────────────────────────────────────────────

/// Everything the feed reports to its single consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// The websocket handshake completed.
    Opened,
    /// A well-formed snapshot frame.
    Snapshot(SnapshotMessage),
    /// A text frame that is not a snapshot. Carries the parse error.
    Malformed(String),
    /// The server closed the stream (close frame or EOF).
    Closed(Option<String>),
    /// Connecting or reading failed.
    Error(String),
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for websocket reconnection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum consecutive failed attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── FeedHandle ───────────────────────────────────────────────────────

/// Handle to a running telemetry feed.
///
/// Dropping the handle or calling [`shutdown`](Self::shutdown) tears the
/// background task down.
#[derive(Debug)]
pub struct FeedHandle {
    event_rx: mpsc::Receiver<FeedEvent>,
    cancel: CancellationToken,
}

impl FeedHandle {
    /// Spawn the connect/read/reconnect loop for `ws_url`.
    ///
    /// Returns immediately; the first connection attempt happens in the
    /// background and is reported as [`FeedEvent::Opened`] or
    /// [`FeedEvent::Error`].
    pub fn spawn(ws_url: Url, reconnect: ReconnectConfig, cancel: CancellationToken) -> Self {
        Self::spawn_with_tls(ws_url, reconnect, &TlsMode::System, cancel)
    }

    /// Like [`spawn`](Self::spawn), verifying `wss://` peers per `tls`.
    ///
    /// A TLS setup failure (unreadable CA file) is reported as
    /// [`FeedEvent::Error`] on every attempt.
    pub fn spawn_with_tls(
        ws_url: Url,
        reconnect: ReconnectConfig,
        tls: &TlsMode,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = mpsc::channel(FEED_CHANNEL_CAPACITY);
        let tls = tls.websocket_client_config().map_err(|e| match e {
            Error::Tls(reason) => reason,
            other => other.to_string(),
        });

        let task_cancel = cancel.clone();
        tokio::spawn(async move {
            feed_loop(ws_url, tls, event_tx, reconnect, task_cancel).await;
        });

        Self { event_rx, cancel }
    }

    /// Wrap an existing event channel. Used for feeds that are not backed
    /// by a websocket (tests, replays).
    pub fn from_channel(event_rx: mpsc::Receiver<FeedEvent>, cancel: CancellationToken) -> Self {
        Self { event_rx, cancel }
    }

    /// Receive the next event. `None` once the feed has stopped for good.
    pub async fn recv(&mut self) -> Option<FeedEvent> {
        self.event_rx.recv().await
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether shutdown has been requested.
    pub fn is_shut_down(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for FeedHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → on disconnect, backoff → reconnect.
async fn feed_loop(
    ws_url: Url,
    tls: Result<Option<Arc<ClientConfig>>, String>,
    event_tx: mpsc::Sender<FeedEvent>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
) {
    let mut attempt: u32 = 0;

    loop {
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&ws_url, &tls, &event_tx, &cancel) => result,
        };

        let event = match outcome {
            Ok(Session { opened, close_reason }) => {
                if opened {
                    attempt = 0;
                }
                tracing::info!(reason = ?close_reason, "telemetry feed closed");
                FeedEvent::Closed(close_reason)
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "telemetry feed error");
                FeedEvent::Error(e.to_string())
            }
        };

        if cancel.is_cancelled() || event_tx.send(event).await.is_err() {
            break;
        }

        if let Some(max) = reconnect.max_retries {
            if attempt >= max {
                tracing::error!(max_retries = max, "telemetry feed reconnection limit reached");
                break;
            }
        }

        let delay = calculate_backoff(attempt, &reconnect);
        tracing::debug!(delay_ms = delay.as_millis(), attempt, "waiting before reconnect");

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        attempt = attempt.saturating_add(1);
    }

    tracing::debug!("telemetry feed loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// How a connection that did not error ended.
struct Session {
    opened: bool,
    close_reason: Option<String>,
}

/// Establish a single websocket connection and read frames until it drops.
async fn connect_and_read(
    url: &Url,
    tls: &Result<Option<Arc<ClientConfig>>, String>,
    event_tx: &mpsc::Sender<FeedEvent>,
    cancel: &CancellationToken,
) -> Result<Session, Error> {
    let connector = match tls {
        Ok(config) => config.as_ref().map(|c| Connector::Rustls(Arc::clone(c))),
        Err(reason) => return Err(Error::Tls(reason.clone())),
    };

    tracing::info!(url = %url, custom_tls = connector.is_some(), "connecting to telemetry feed");

    let (ws_stream, _response) =
        tokio_tungstenite::connect_async_tls_with_config(url.as_str(), None, false, connector)
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

    tracing::info!("telemetry feed connected");
    if event_tx.send(FeedEvent::Opened).await.is_err() {
        return Ok(Session {
            opened: true,
            close_reason: None,
        });
    }

    let (_write, mut read) = ws_stream.split();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Ok(Session { opened: true, close_reason: None });
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        if event_tx.send(parse_frame(&text)).await.is_err() {
                            return Ok(Session { opened: true, close_reason: None });
                        }
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite answers pings itself
                        tracing::trace!("telemetry feed ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        let reason = frame.map(|cf| format!("{} {}", cf.code, cf.reason));
                        return Ok(Session { opened: true, close_reason: reason });
                    }
                    Some(Err(e)) => {
                        return Err(Error::WebSocketConnect(e.to_string()));
                    }
                    None => {
                        return Ok(Session { opened: true, close_reason: None });
                    }
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
        }
    }
}

// ── Message parsing ──────────────────────────────────────────────────

/// Parse one text frame into a snapshot event.
fn parse_frame(text: &str) -> FeedEvent {
    match serde_json::from_str::<SnapshotMessage>(text) {
        Ok(msg) => FeedEvent::Snapshot(msg),
        Err(e) => {
            tracing::debug!(error = %e, "failed to parse telemetry frame");
            FeedEvent::Malformed(e.to_string())
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 ± 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────
