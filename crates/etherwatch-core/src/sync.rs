// ── Live sync controller ──
//
// A single actor task owns the displayed snapshot. Feed events, generator
// ticks and commands all arrive at that task, so at most one producer of
// displayed state is ever active. Consumers observe through `watch`.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use strum::Display;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

use etherwatch_api::origin::stream_url;
use etherwatch_api::{FeedEvent, FeedHandle, ReconnectConfig, TlsMode};

use crate::config::SyncConfig;
use crate::error::CoreError;
use crate::model::Snapshot;
use crate::stream::SnapshotStream;
use crate::synthetic;

const COMMAND_CHANNEL_SIZE: usize = 16;

// ── SyncState ────────────────────────────────────────────────────────

/// What is currently producing the displayed snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SyncState {
    /// Waiting for the feed (initially, after a reconfigure, or while a
    /// feed that already delivered data reconnects).
    Connecting,
    /// The feed is open.
    Live,
    /// No real data yet and the feed is down: the generator is running.
    Fallback,
}

// ── FeedConnector ────────────────────────────────────────────────────

/// Opens the telemetry feed for a stream URL.
pub trait FeedConnector: Send + Sync + 'static {
    fn connect(&self, url: Url, cancel: CancellationToken) -> FeedHandle;
}

/// Production connector: a websocket with reconnect backoff.
#[derive(Debug, Clone, Default)]
pub struct WebSocketConnector {
    reconnect: ReconnectConfig,
    tls: TlsMode,
}

impl WebSocketConnector {
    pub fn new(reconnect: ReconnectConfig) -> Self {
        Self {
            reconnect,
            tls: TlsMode::System,
        }
    }

    /// Verify `wss://` controllers with `tls` instead of the bundled roots.
    #[must_use]
    pub fn with_tls(mut self, tls: TlsMode) -> Self {
        self.tls = tls;
        self
    }
}

impl FeedConnector for WebSocketConnector {
    fn connect(&self, url: Url, cancel: CancellationToken) -> FeedHandle {
        FeedHandle::spawn_with_tls(url, self.reconnect.clone(), &self.tls, cancel)
    }
}

// ── LiveSync ─────────────────────────────────────────────────────────

enum SyncCommand {
    Reconfigure(String),
}

/// Handle to the running sync actor.
///
/// Cheaply cloneable. Dropping the last handle stops the actor.
#[derive(Clone)]
pub struct LiveSync {
    inner: Arc<LiveSyncInner>,
}

struct LiveSyncInner {
    snapshot: Arc<watch::Sender<Arc<Snapshot>>>,
    state: Arc<watch::Sender<SyncState>>,
    command_tx: mpsc::Sender<SyncCommand>,
    cancel: CancellationToken,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Drop for LiveSyncInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl LiveSync {
    /// Start syncing with the controller at `config.controller_origin` over
    /// a websocket. Must be called from within a tokio runtime.
    pub fn spawn(config: SyncConfig) -> Self {
        let connector = Arc::new(
            WebSocketConnector::new(config.reconnect.clone()).with_tls(config.tls.clone()),
        );
        Self::spawn_with(config, connector, StdRng::from_entropy())
    }

    /// Start syncing with an explicit feed connector and generator RNG.
    pub fn spawn_with(
        config: SyncConfig,
        connector: Arc<dyn FeedConnector>,
        rng: StdRng,
    ) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Snapshot::empty()));
        let (state, _) = watch::channel(SyncState::Connecting);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let snapshot = Arc::new(snapshot);
        let state = Arc::new(state);
        let cancel = CancellationToken::new();

        let actor = SyncActor {
            origin: config.controller_origin,
            tick: config.tick_interval,
            connector,
            rng,
            snapshot: Arc::clone(&snapshot),
            state: Arc::clone(&state),
            cancel: cancel.child_token(),
            feed: None,
            generator: None,
            has_real_data: false,
        };
        let task = tokio::spawn(actor.run(command_rx));

        Self {
            inner: Arc::new(LiveSyncInner {
                snapshot,
                state,
                command_tx,
                cancel,
                task: Mutex::new(Some(task)),
            }),
        }
    }

    /// The snapshot currently on display.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> SnapshotStream {
        SnapshotStream::new(self.inner.snapshot.subscribe())
    }

    pub fn state(&self) -> SyncState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<SyncState> {
        self.inner.state.subscribe()
    }

    /// Point the feed at a different controller.
    ///
    /// The current connection is closed and the generator stopped before
    /// the new connection opens. Events from the old connection are never
    /// applied.
    pub async fn reconfigure(&self, origin: impl Into<String>) -> Result<(), CoreError> {
        self.inner
            .command_tx
            .send(SyncCommand::Reconfigure(origin.into()))
            .await
            .map_err(|_| CoreError::ControllerStopped)
    }

    /// Close the feed, stop the generator and wait for the actor to exit.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();
        if let Some(task) = self.inner.task.lock().await.take() {
            if let Err(e) = task.await {
                warn!(error = %e, "live sync actor ended abnormally");
            }
        }
        debug!("live sync shut down");
    }
}

// ── Actor ────────────────────────────────────────────────────────────

struct SyncActor {
    origin: String,
    tick: Duration,
    connector: Arc<dyn FeedConnector>,
    rng: StdRng,
    snapshot: Arc<watch::Sender<Arc<Snapshot>>>,
    state: Arc<watch::Sender<SyncState>>,
    cancel: CancellationToken,
    feed: Option<FeedHandle>,
    generator: Option<Interval>,
    has_real_data: bool,
}

async fn next_feed_event(feed: &mut Option<FeedHandle>) -> Option<FeedEvent> {
    match feed {
        Some(feed) => feed.recv().await,
        None => std::future::pending().await,
    }
}

async fn next_tick(generator: &mut Option<Interval>) {
    match generator {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

impl SyncActor {
    async fn run(mut self, mut commands: mpsc::Receiver<SyncCommand>) {
        self.open_feed();

        loop {
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => break,
                command = commands.recv() => match command {
                    Some(SyncCommand::Reconfigure(origin)) => self.reconfigure(origin),
                    None => break,
                },
                event = next_feed_event(&mut self.feed) => self.on_feed_event(event),
                () = next_tick(&mut self.generator) => self.on_tick(),
            }
        }

        self.close_feed();
        self.stop_generator();
        debug!("live sync actor exiting");
    }

    // ── Feed ─────────────────────────────────────────────────────────

    fn open_feed(&mut self) {
        match stream_url(&self.origin) {
            Ok(url) => {
                info!(url = %url, "opening telemetry feed");
                let feed = self.connector.connect(url, self.cancel.child_token());
                self.feed = Some(feed);
            }
            Err(e) => {
                warn!(origin = %self.origin, error = %e, "invalid controller origin");
                self.on_disconnect();
            }
        }
    }

    fn close_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.shutdown();
        }
    }

    fn reconfigure(&mut self, origin: String) {
        info!(origin = %origin, "reconfiguring live sync");
        self.close_feed();
        self.stop_generator();
        self.origin = origin;
        self.set_state(SyncState::Connecting);
        self.open_feed();
    }

    fn on_feed_event(&mut self, event: Option<FeedEvent>) {
        match event {
            Some(FeedEvent::Opened) => {
                self.stop_generator();
                self.set_state(SyncState::Live);
            }
            Some(FeedEvent::Snapshot(msg)) => match Snapshot::try_from(msg) {
                Ok(snapshot) => self.apply_real(snapshot),
                Err(e) => warn!(error = %e, "dropping invalid snapshot"),
            },
            Some(FeedEvent::Malformed(reason)) => {
                warn!(reason = %reason, "dropping malformed telemetry frame");
            }
            Some(FeedEvent::Closed(reason)) => {
                debug!(reason = ?reason, "telemetry feed closed");
                self.on_disconnect();
            }
            Some(FeedEvent::Error(reason)) => {
                debug!(reason = %reason, "telemetry feed failed");
                self.on_disconnect();
            }
            None => {
                debug!("telemetry feed ended");
                self.feed = None;
            }
        }
    }

    fn on_disconnect(&mut self) {
        if self.has_real_data {
            // Keep the last real snapshot on screen while the feed retries.
            self.set_state(SyncState::Connecting);
        } else {
            self.start_generator();
        }
    }

    fn apply_real(&mut self, snapshot: Snapshot) {
        self.stop_generator();
        if !self.has_real_data {
            info!(devices = snapshot.devices.len(), "first live snapshot received");
        }
        self.has_real_data = true;
        self.publish(snapshot);
        self.set_state(SyncState::Live);
    }

    // ── Generator ────────────────────────────────────────────────────

    fn start_generator(&mut self) {
        if self.generator.is_some() {
            return;
        }
        info!(tick_ms = self.tick.as_millis(), "no live data, starting synthetic fallback");

        self.publish(synthetic::create_snapshot(Utc::now()));
        let start = tokio::time::Instant::now() + self.tick;
        let mut interval = tokio::time::interval_at(start, self.tick);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.generator = Some(interval);
        self.set_state(SyncState::Fallback);
    }

    fn stop_generator(&mut self) {
        if self.generator.take().is_some() {
            debug!("synthetic fallback stopped");
        }
    }

    fn on_tick(&mut self) {
        let next = {
            let previous = self.snapshot.borrow();
            synthetic::mutate(&previous, &mut self.rng, Utc::now())
        };
        self.publish(next);
    }

    // ── Publishing ───────────────────────────────────────────────────

    fn publish(&self, snapshot: Snapshot) {
        self.snapshot.send_replace(Arc::new(snapshot));
    }

    fn set_state(&self, next: SyncState) {
        self.state.send_if_modified(|state| {
            if *state == next {
                return false;
            }
            debug!(from = %state, to = %next, "sync state changed");
            *state = next;
            true
        });
    }
}
