// ── Interface history ──
//
// `HistorySource` is the seam between the cache and the controller's
// history endpoint; `HistoryCache` owns polling and per-interface state for
// one expanded device.

mod cache;

use std::future::Future;

use etherwatch_api::HistoryClient;

use crate::error::CoreError;
use crate::model::HistorySample;

pub use cache::{HistoryCache, HistoryEntry, HistoryState};

/// Anything that can produce a throughput history for one interface.
pub trait HistorySource: Send + Sync + 'static {
    /// Samples for `iface` on `device_id` over the last `window_minutes`,
    /// oldest first.
    fn fetch_history(
        &self,
        device_id: &str,
        iface: &str,
        window_minutes: u32,
    ) -> impl Future<Output = Result<Vec<HistorySample>, CoreError>> + Send;
}

impl HistorySource for HistoryClient {
    async fn fetch_history(
        &self,
        device_id: &str,
        iface: &str,
        window_minutes: u32,
    ) -> Result<Vec<HistorySample>, CoreError> {
        let response = HistoryClient::fetch_history(self, device_id, iface, window_minutes).await?;
        response
            .samples
            .into_iter()
            .map(HistorySample::try_from)
            .collect()
    }
}
