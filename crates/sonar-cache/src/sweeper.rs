//! Background removal of expired entries.

use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::debug;

use crate::cache::TtlCache;

/// Default interval between sweeps (30 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(30 * 60);

/// Periodically purge expired entries from `cache`.
///
/// The task holds only a weak reference and exits once the cache is dropped.
/// Reads never depend on the sweeper; it only bounds memory held by dead
/// entries.
pub fn spawn_sweeper<V>(cache: &Arc<TtlCache<V>>, every: Duration) -> JoinHandle<()>
where
    V: Clone + Send + Sync + 'static,
{
    let weak: Weak<TtlCache<V>> = Arc::downgrade(cache);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(cache) = weak.upgrade() else {
                debug!("Cache dropped, stopping sweeper");
                break;
            };
            let purged = cache.purge_expired();
            if purged > 0 {
                debug!(purged, "Swept expired cache entries");
            }
        }
    })
}
