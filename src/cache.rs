use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock},
    time::Duration,
};

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

const SWEEP_INTERVAL: Duration = Duration::from_secs(10);

/// Returns every cache key currently reachable from a live playlist.
pub type LivenessFn = Box<dyn Fn() -> HashSet<String> + Send + Sync>;

/// In-memory byte cache for downloaded segments.
///
/// Eviction is driven purely by referential liveness: the sweeper deletes
/// every entry whose key the liveness callback no longer reports. Published
/// playlists advertise exactly the window that must stay resident, so there
/// is neither over-retention nor false eviction.
///
/// The cache knows only a callback, never the session manager that feeds it.
pub struct SegmentCache {
    entries: StdRwLock<HashMap<String, Bytes>>,
    live_keys: LivenessFn,
    sweep_interval: Duration,
    shutdown: CancellationToken,
    sweeper: StdMutex<Option<JoinHandle<()>>>,
}

impl SegmentCache {
    pub fn new(live_keys: LivenessFn) -> Self {
        Self::with_sweep_interval(live_keys, SWEEP_INTERVAL)
    }

    pub fn with_sweep_interval(live_keys: LivenessFn, sweep_interval: Duration) -> Self {
        Self {
            entries: StdRwLock::new(HashMap::new()),
            live_keys,
            sweep_interval,
            shutdown: CancellationToken::new(),
            sweeper: StdMutex::new(None),
        }
    }

    pub fn set(&self, key: impl Into<String>, data: Bytes) {
        let key = key.into();
        debug!(%key, size = data.len(), "cached segment");
        self.entries.write().unwrap().insert(key, data);
    }

    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.entries.read().unwrap().get(key).cloned()
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }

    /// Launch the background sweeper on the current runtime.
    pub fn start(self: &Arc<Self>) {
        info!("starting segment cache sweeper");
        let cache = self.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(cache.sweep_interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = cache.shutdown.cancelled() => {
                        info!("segment cache sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        cache.sweep_now();
                    }
                }
            }
        });
        *self.sweeper.lock().unwrap() = Some(handle);
    }

    /// Stop the sweeper. Safe to call whether or not `start` ever ran, and
    /// more than once.
    pub async fn stop(&self) {
        self.shutdown.cancel();
        let handle = self.sweeper.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
    }

    /// Run one sweep synchronously and return the number of evictions.
    pub fn sweep_now(&self) -> usize {
        let live = (self.live_keys)();

        let mut entries = self.entries.write().unwrap();
        let before = entries.len();
        entries.retain(|key, _| live.contains(key));
        let evicted = before - entries.len();

        if evicted > 0 {
            info!(evicted, remaining = entries.len(), "evicted stale segments from cache");
        } else {
            debug!(size = entries.len(), "no segments to evict");
        }
        evicted
    }
}
