use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use crate::durable::WalStore;

pub const COMPACT_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact the log if at least `threshold` records were appended since the last compaction.
/// Returns whether a compaction ran.
pub async fn compact_if_due(store: &WalStore, threshold: u64) -> bool {
    let appended = store.appends_since_compact().await;
    if appended < threshold {
        return false;
    }
    match store.compact().await {
        Ok(()) => {
            info!("compacted WAL after {appended} appends");
            true
        }
        Err(e) => {
            tracing::error!("WAL compaction failed: {e}");
            false
        }
    }
}

/// Background task that periodically compacts the store's WAL.
pub async fn run_compactor(store: Arc<WalStore>, threshold: u64) {
    let mut interval = tokio::time::interval(COMPACT_CHECK_INTERVAL);
    loop {
        interval.tick().await;
        compact_if_due(&store, threshold).await;
    }
}
