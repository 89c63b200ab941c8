//! Data bridge: forwards [`LiveSync`] output to TUI actions.
//!
//! Runs as a background task: pushes the current snapshot and sync state,
//! then every replacement, through the TUI's action channel.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use etherwatch_core::LiveSync;

use crate::action::Action;

pub async fn spawn_data_bridge(
    sync: LiveSync,
    action_tx: mpsc::UnboundedSender<Action>,
    cancel: CancellationToken,
) {
    let mut snapshots = sync.subscribe();
    let mut state = sync.watch_state();

    let _ = action_tx.send(Action::SnapshotUpdated(snapshots.latest()));
    let _ = action_tx.send(Action::SyncStateChanged(*state.borrow_and_update()));

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => break,

            Some(snap) = snapshots.changed() => {
                debug!(devices = snap.devices.len(), synthetic = snap.is_synthetic(), "dispatching SnapshotUpdated");
                let _ = action_tx.send(Action::SnapshotUpdated(snap));
            }
            Ok(()) = state.changed() => {
                let current = *state.borrow_and_update();
                debug!(state = %current, "dispatching SyncStateChanged");
                let _ = action_tx.send(Action::SyncStateChanged(current));
            }
            else => break,
        }
    }

    sync.shutdown().await;
    debug!("data bridge shut down");
}
