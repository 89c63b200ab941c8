// Behavioral tests for `HistoryCache` against a scripted history source.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::DateTime;
use tokio::sync::{Notify, watch};
use tokio::time::timeout;

use etherwatch_core::{
    CoreError, HistoryCache, HistoryConfig, HistorySample, HistorySource, HistoryState,
};

// ── Scripted source ─────────────────────────────────────────────────

type Reply = Result<Vec<HistorySample>, CoreError>;

#[derive(Default)]
struct ScriptedSource {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    requests: Mutex<Vec<(String, String, u32)>>,
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl ScriptedSource {
    fn gated(gate: Arc<Notify>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    fn script(self, iface: &str, replies: Vec<Reply>) -> Self {
        self.replies
            .lock()
            .unwrap()
            .insert(iface.to_owned(), replies.into());
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl HistorySource for ScriptedSource {
    async fn fetch_history(
        &self,
        device_id: &str,
        iface: &str,
        window_minutes: u32,
    ) -> Result<Vec<HistorySample>, CoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((device_id.to_owned(), iface.to_owned(), window_minutes));
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(iface)
            .and_then(VecDeque::pop_front);
        reply.unwrap_or_else(|| Ok(Vec::new()))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn samples(rx: &[f64]) -> Vec<HistorySample> {
    rx.iter()
        .zip(0_i64..)
        .map(|(&v, i)| {
            HistorySample::new(DateTime::from_timestamp_millis(i * 5_000).unwrap(), v, v / 2.0)
        })
        .collect()
}

fn unavailable(status: u16) -> Reply {
    Err(CoreError::Api {
        message: format!("history request failed ({status})"),
        status: Some(status),
    })
}

fn cache(
    ifaces: &[&str],
    source: ScriptedSource,
) -> (HistoryCache<ScriptedSource>, Arc<ScriptedSource>) {
    let source = Arc::new(source);
    let cache = HistoryCache::new(
        "leaf-11",
        ifaces.iter().map(|s| (*s).to_owned()),
        Arc::clone(&source),
        HistoryConfig::default(),
    );
    (cache, source)
}

async fn wait_until(
    rx: &mut watch::Receiver<HistoryState>,
    pred: impl FnMut(&HistoryState) -> bool,
) {
    timeout(Duration::from_secs(120), rx.wait_for(pred))
        .await
        .expect("history state timed out")
        .expect("history cache dropped");
}

fn fetched(state: &HistoryState, iface: &str) -> bool {
    state
        .entry(iface)
        .is_some_and(|e| !e.loading && (e.fetched_at.is_some() || e.error.is_some()))
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn test_unknown_interface_is_a_noop() {
    let (mut cache, source) = cache(&["uplink1"], ScriptedSource::default());
    let mut rx = cache.subscribe();
    cache.expand();
    wait_until(&mut rx, |s| fetched(s, "uplink1")).await;

    cache.refresh("uplink9").await;

    assert!(cache.entry("uplink9").is_none());
    assert_eq!(cache.state().len(), 1);
    assert!(
        source
            .requests
            .lock()
            .unwrap()
            .iter()
            .all(|(_, iface, _)| iface == "uplink1")
    );
}

#[tokio::test(start_paused = true)]
async fn test_requests_use_device_and_window() {
    let (mut cache, source) = cache(&["uplink1"], ScriptedSource::default());
    let mut rx = cache.subscribe();
    cache.expand();
    wait_until(&mut rx, |s| fetched(s, "uplink1")).await;

    let requests = source.requests.lock().unwrap().clone();
    assert_eq!(requests, vec![("leaf-11".to_owned(), "uplink1".to_owned(), 5)]);
}

#[tokio::test(start_paused = true)]
async fn test_failure_then_recovery() {
    let source = ScriptedSource::default()
        .script("uplink1", vec![unavailable(503), Ok(samples(&[1e9, 1.1e9]))]);
    let (mut cache, _source) = cache(&["uplink1"], source);
    let mut rx = cache.subscribe();
    cache.expand();

    wait_until(&mut rx, |s| fetched(s, "uplink1")).await;
    let failed = cache.entry("uplink1").unwrap();
    assert_eq!(failed.error.as_deref(), Some("history request failed (503)"));
    assert!(failed.samples.is_empty());
    assert!(!failed.loading);

    // Next poll, ten seconds later.
    wait_until(&mut rx, |s| s.entry("uplink1").is_some_and(|e| !e.samples.is_empty())).await;
    let recovered = cache.entry("uplink1").unwrap();
    assert!(recovered.error.is_none());
    assert!(!recovered.loading);
    assert_eq!(recovered.samples, samples(&[1e9, 1.1e9]));
    assert!(recovered.fetched_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn test_success_then_failure_clears_samples() {
    let source = ScriptedSource::default()
        .script("uplink1", vec![Ok(samples(&[1e9, 1.2e9])), unavailable(500)]);
    let (mut cache, _source) = cache(&["uplink1"], source);
    let mut rx = cache.subscribe();
    cache.expand();

    wait_until(&mut rx, |s| s.entry("uplink1").is_some_and(|e| e.samples.len() == 2)).await;
    wait_until(&mut rx, |s| s.entry("uplink1").is_some_and(|e| e.error.is_some())).await;

    let entry = cache.entry("uplink1").unwrap();
    assert!(entry.samples.is_empty());
    assert_eq!(entry.error.as_deref(), Some("history request failed (500)"));
}

#[tokio::test(start_paused = true)]
async fn test_loading_is_visible_while_fetching() {
    let gate = Arc::new(Notify::new());
    let source = ScriptedSource::gated(Arc::clone(&gate))
        .script("uplink1", vec![Ok(samples(&[2.0, 4.0]))]);
    let (mut cache, _source) = cache(&["uplink1"], source);
    let mut rx = cache.subscribe();
    cache.expand();

    wait_until(&mut rx, |s| s.entry("uplink1").is_some_and(|e| e.loading)).await;
    assert!(cache.entry("uplink1").unwrap().error.is_none());
    assert!(cache.state().is_loading());

    gate.notify_one();
    wait_until(&mut rx, |s| fetched(s, "uplink1")).await;
    assert_eq!(cache.entry("uplink1").unwrap().samples.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_one_failing_interface_does_not_affect_another() {
    let source = ScriptedSource::default()
        .script("uplink1", vec![unavailable(404)])
        .script("uplink2", vec![Ok(samples(&[3.0, 5.0, 4.0]))]);
    let (mut cache, _source) = cache(&["uplink1", "uplink2"], source);
    let mut rx = cache.subscribe();
    cache.expand();

    wait_until(&mut rx, |s| fetched(s, "uplink1") && fetched(s, "uplink2")).await;

    let state = cache.state();
    assert!(state.entry("uplink1").unwrap().error.is_some());
    let ok = state.entry("uplink2").unwrap();
    assert!(ok.error.is_none());
    assert_eq!(ok.samples.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_collapse_discards_in_flight_response() {
    let gate = Arc::new(Notify::new());
    let source = ScriptedSource::gated(Arc::clone(&gate))
        .script("uplink1", vec![Ok(samples(&[1.0, 2.0]))]);
    let (mut cache, source) = cache(&["uplink1"], source);
    let mut rx = cache.subscribe();
    cache.expand();
    wait_until(&mut rx, |s| s.entry("uplink1").is_some_and(|e| e.loading)).await;

    cache.collapse();
    assert!(!cache.entry("uplink1").unwrap().loading);

    gate.notify_one();
    tokio::time::sleep(Duration::from_secs(60)).await;

    let entry = cache.entry("uplink1").unwrap();
    assert!(entry.samples.is_empty());
    assert!(entry.fetched_at.is_none());
    assert!(!entry.loading);
    assert_eq!(source.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_demo_mode_never_fetches() {
    let source =
        ScriptedSource::default().script("uplink1", vec![Ok(samples(&[7.0, 8.0]))]);
    let (mut cache, source) = cache(&["uplink1"], source);
    cache.set_demo_mode(true);
    cache.expand();

    tokio::time::sleep(Duration::from_secs(60)).await;
    cache.refresh("uplink1").await;
    assert_eq!(source.calls(), 0);
    assert_eq!(cache.entry("uplink1").unwrap(), Default::default());

    // Leaving demo mode while expanded starts polling.
    let mut rx = cache.subscribe();
    cache.set_demo_mode(false);
    wait_until(&mut rx, |s| fetched(s, "uplink1")).await;
    assert_eq!(cache.entry("uplink1").unwrap().samples.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_interface_change_tracks_current_set() {
    let source = ScriptedSource::default()
        .script("uplink1", vec![Ok(samples(&[1.0, 2.0]))])
        .script("uplink2", vec![Ok(samples(&[3.0, 4.0]))])
        .script("uplink3", vec![Ok(samples(&[5.0, 6.0, 7.0]))]);
    let (mut cache, _source) = cache(&["uplink1", "uplink2"], source);
    let mut rx = cache.subscribe();
    cache.expand();
    wait_until(&mut rx, |s| fetched(s, "uplink1") && fetched(s, "uplink2")).await;

    cache.set_interfaces(["uplink2".to_owned(), "uplink3".to_owned()]);

    let names: Vec<String> = cache.state().iface_names().map(str::to_owned).collect();
    assert_eq!(names, ["uplink2", "uplink3"]);
    assert!(cache.entry("uplink1").is_none());

    wait_until(&mut rx, |s| s.entry("uplink3").is_some_and(|e| e.samples.len() == 3)).await;
    assert!(cache.is_expanded());
}

#[tokio::test(start_paused = true)]
async fn test_drop_stops_polling() {
    let (mut cache, source) = cache(&["uplink1"], ScriptedSource::default());
    let mut rx = cache.subscribe();
    cache.expand();
    wait_until(&mut rx, |s| fetched(s, "uplink1")).await;
    assert_eq!(source.calls(), 1);

    drop(cache);
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.calls(), 1);
}
