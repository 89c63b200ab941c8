//! UI actions. Actions are the sole mechanism for state mutation.

use std::sync::Arc;

use etherwatch_core::{Snapshot, SyncState};

#[derive(Debug, Clone)]
pub enum Action {
    // ── Lifecycle ──────────────────────────────────────────────────
    Quit,
    Render,

    // ── Data events (from the live sync controller) ───────────────
    SnapshotUpdated(Arc<Snapshot>),
    SyncStateChanged(SyncState),

    // ── Fleet navigation ──────────────────────────────────────────
    SelectNext,
    SelectPrev,
    ToggleExpand,
}
