// ── Per-device history cache ──
//
// Entries live inside a `watch` channel. Every write goes through
// `send_if_modified` and checks the poll epoch in the same closure, so a
// fetch that outlives its poll loop can never overwrite newer state.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use indexmap::IndexMap;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::HistorySource;
use crate::config::HistoryConfig;
use crate::model::HistorySample;

// ── State ────────────────────────────────────────────────────────────

/// Cached history for one interface.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct HistoryEntry {
    pub samples: Vec<HistorySample>,
    pub loading: bool,
    /// Message of the last failed fetch. Cleared by the next attempt.
    pub error: Option<String>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Everything the cache knows, in interface order.
#[derive(Debug, Clone, Default)]
pub struct HistoryState {
    /// Bumped whenever in-flight fetches must be discarded.
    epoch: u64,
    entries: IndexMap<String, HistoryEntry>,
}

impl HistoryState {
    fn with_interfaces(names: impl IntoIterator<Item = String>) -> Self {
        Self {
            epoch: 0,
            entries: names
                .into_iter()
                .map(|n| (n, HistoryEntry::default()))
                .collect(),
        }
    }

    pub fn entry(&self, iface: &str) -> Option<&HistoryEntry> {
        self.entries.get(iface)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&str, &HistoryEntry)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iface_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn is_loading(&self) -> bool {
        self.entries.values().any(|e| e.loading)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Apply `update` to one entry if `epoch` is still current.
///
/// Returns `false` (and notifies nobody) when the write is stale or the
/// interface is unknown.
fn write_entry(
    state: &watch::Sender<HistoryState>,
    epoch: u64,
    iface: &str,
    update: impl FnOnce(&mut HistoryEntry),
) -> bool {
    state.send_if_modified(|s| {
        if s.epoch != epoch {
            return false;
        }
        match s.entries.get_mut(iface) {
            Some(entry) => {
                update(entry);
                true
            }
            None => false,
        }
    })
}

// ── Fetching ─────────────────────────────────────────────────────────

async fn refresh_one<S: HistorySource>(
    source: &S,
    state: &watch::Sender<HistoryState>,
    epoch: u64,
    device_id: &str,
    iface: &str,
    window_minutes: u32,
) {
    let started = write_entry(state, epoch, iface, |e| {
        e.loading = true;
        e.error = None;
    });
    if !started {
        return;
    }

    match source.fetch_history(device_id, iface, window_minutes).await {
        Ok(samples) => {
            debug!(device_id, iface, samples = samples.len(), "history refreshed");
            write_entry(state, epoch, iface, |e| {
                e.samples = samples;
                e.loading = false;
                e.error = None;
                e.fetched_at = Some(Utc::now());
            });
        }
        Err(err) => {
            warn!(device_id, iface, error = %err, "history fetch failed");
            write_entry(state, epoch, iface, |e| {
                e.samples.clear();
                e.loading = false;
                e.error = Some(err.to_string());
            });
        }
    }
}

/// Refresh every interface concurrently.
async fn refresh_all<S: HistorySource>(
    source: &S,
    state: &watch::Sender<HistoryState>,
    epoch: u64,
    device_id: &str,
    window_minutes: u32,
) {
    let names: Vec<String> = state.borrow().entries.keys().cloned().collect();
    join_all(
        names
            .iter()
            .map(|iface| refresh_one(source, state, epoch, device_id, iface, window_minutes)),
    )
    .await;
}

async fn poll_task<S: HistorySource>(
    source: Arc<S>,
    state: Arc<watch::Sender<HistoryState>>,
    epoch: u64,
    device_id: String,
    config: HistoryConfig,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(config.poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        // The first tick completes immediately: expansion refreshes at once.
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {}
        }
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = refresh_all(&*source, &state, epoch, &device_id, config.window_minutes) => {}
        }
    }

    debug!(device_id = %device_id, "history polling stopped");
}

// ── HistoryCache ─────────────────────────────────────────────────────

/// History for the interfaces of one device.
///
/// Fetches happen only while the device is expanded and the cache is not in
/// demo mode. Collapsing, entering demo mode, changing the interface set or
/// dropping the cache cancels polling and discards in-flight responses.
pub struct HistoryCache<S: HistorySource> {
    device_id: String,
    source: Arc<S>,
    config: HistoryConfig,
    state: Arc<watch::Sender<HistoryState>>,
    expanded: bool,
    demo_mode: bool,
    poll: Option<CancellationToken>,
    cancel: CancellationToken,
}

impl<S: HistorySource> HistoryCache<S> {
    pub fn new(
        device_id: impl Into<String>,
        ifaces: impl IntoIterator<Item = String>,
        source: Arc<S>,
        config: HistoryConfig,
    ) -> Self {
        let (state, _) = watch::channel(HistoryState::with_interfaces(ifaces));
        Self {
            device_id: device_id.into(),
            source,
            config,
            state: Arc::new(state),
            expanded: false,
            demo_mode: false,
            poll: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn is_demo_mode(&self) -> bool {
        self.demo_mode
    }

    /// Whether fetches are currently allowed.
    pub fn is_active(&self) -> bool {
        self.expanded && !self.demo_mode
    }

    pub fn subscribe(&self) -> watch::Receiver<HistoryState> {
        self.state.subscribe()
    }

    /// Clone of the current state.
    pub fn state(&self) -> HistoryState {
        self.state.borrow().clone()
    }

    pub fn entry(&self, iface: &str) -> Option<HistoryEntry> {
        self.state.borrow().entry(iface).cloned()
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Start polling: refresh now, then every poll interval.
    ///
    /// Must be called from within a tokio runtime.
    pub fn expand(&mut self) {
        self.expanded = true;
        self.start_polling();
    }

    pub fn collapse(&mut self) {
        self.expanded = false;
        self.stop_polling();
    }

    /// In demo mode nothing is fetched and every entry reports no data.
    pub fn set_demo_mode(&mut self, demo: bool) {
        if self.demo_mode == demo {
            return;
        }
        self.demo_mode = demo;
        if demo {
            self.stop_polling();
            self.state.send_modify(|s| {
                for entry in s.entries.values_mut() {
                    *entry = HistoryEntry::default();
                }
            });
        } else {
            self.start_polling();
        }
    }

    /// Track the device's current interface list.
    ///
    /// Entries for surviving interfaces keep their samples; new interfaces
    /// start empty; vanished ones are dropped. Polling restarts if active.
    pub fn set_interfaces(&mut self, names: impl IntoIterator<Item = String>) {
        let names: Vec<String> = names.into_iter().collect();
        if self.state.borrow().entries.keys().eq(names.iter()) {
            return;
        }

        debug!(device_id = %self.device_id, ifaces = ?names, "history interface set changed");
        self.stop_polling();
        self.state.send_modify(|s| {
            let mut old = std::mem::take(&mut s.entries);
            s.entries = names
                .into_iter()
                .map(|n| {
                    let entry = old.swap_remove(&n).unwrap_or_default();
                    (n, entry)
                })
                .collect();
        });
        self.start_polling();
    }

    /// Refresh one interface now.
    ///
    /// A no-op for unknown interfaces or while fetching is not allowed.
    pub async fn refresh(&self, iface: &str) {
        if !self.is_active() {
            return;
        }
        let epoch = self.state.borrow().epoch;
        refresh_one(
            &*self.source,
            &self.state,
            epoch,
            &self.device_id,
            iface,
            self.config.window_minutes,
        )
        .await;
    }

    fn start_polling(&mut self) {
        if !self.is_active() || self.poll.is_some() {
            return;
        }

        let cancel = self.cancel.child_token();
        let epoch = self.state.borrow().epoch;
        debug!(device_id = %self.device_id, epoch, "history polling started");

        tokio::spawn(poll_task(
            Arc::clone(&self.source),
            Arc::clone(&self.state),
            epoch,
            self.device_id.clone(),
            self.config,
            cancel.clone(),
        ));
        self.poll = Some(cancel);
    }

    /// Cancel polling and invalidate every in-flight fetch.
    fn stop_polling(&mut self) {
        if let Some(cancel) = self.poll.take() {
            cancel.cancel();
        }
        self.state.send_modify(|s| {
            s.epoch = s.epoch.wrapping_add(1);
            for entry in s.entries.values_mut() {
                entry.loading = false;
            }
        });
    }
}

impl<S: HistorySource> Drop for HistoryCache<S> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
