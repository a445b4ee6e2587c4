//! Inactivity-expiring cache with a background sweep.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::observability::metrics;

/// Lower bound applied to the expiry window when it is derived from the
/// proxy's keep-alive setting.
pub const MIN_KEEP_ALIVE: Duration = Duration::from_secs(300);

/// Sweep timing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    /// How often the sweep wakes up.
    pub check_interval: Duration,
    /// Entries idle for longer than this are evicted.
    pub expire_after: Duration,
}

impl CacheSettings {
    /// Settings driven by the proxy keep-alive; the expiry never drops below [`MIN_KEEP_ALIVE`].
    pub fn for_keep_alive(check_interval: Duration, keep_alive: Duration) -> Self {
        Self {
            check_interval,
            expire_after: keep_alive.max(MIN_KEEP_ALIVE),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            expire_after: Duration::from_secs(30),
        }
    }
}

/// A cached response body.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub content: String,
    pub last_active: Instant,
    /// Tie-breaker for entries touched at the same instant.
    seq: u64,
}

/// Key index plus recency index.
///
/// Every key in `entries` has exactly one slot in `by_time`, and that slot is
/// `(entry.last_active, entry.seq)`.
#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<String, CacheEntry>,
    by_time: BTreeMap<(Instant, u64), String>,
    next_seq: u64,
}

impl CacheIndex {
    fn next_seq(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|e| e.content.as_str())
    }

    /// Move an existing entry to the most recent slot. Returns `false` if absent.
    fn touch(&mut self, key: &str, now: Instant) -> bool {
        let seq = self.next_seq();
        let Some(entry) = self.entries.get_mut(key) else {
            return false;
        };
        self.by_time.remove(&(entry.last_active, entry.seq));
        entry.last_active = now;
        entry.seq = seq;
        self.by_time.insert((now, seq), key.to_owned());
        true
    }

    fn insert(&mut self, key: &str, content: String, now: Instant) {
        let seq = self.next_seq();
        self.entries.insert(
            key.to_owned(),
            CacheEntry {
                content,
                last_active: now,
                seq,
            },
        );
        self.by_time.insert((now, seq), key.to_owned());
    }

    /// Remove every entry last touched strictly before `cutoff`, oldest first.
    fn evict_before(&mut self, cutoff: Instant) -> usize {
        let mut evicted = 0;
        while let Some(oldest) = self.by_time.first_entry() {
            if oldest.key().0 >= cutoff {
                break;
            }
            let key = oldest.remove();
            self.entries.remove(&key);
            evicted += 1;
        }
        evicted
    }

    fn clear(&mut self) -> usize {
        let count = self.entries.len();
        self.entries.clear();
        self.by_time.clear();
        count
    }

    #[cfg(test)]
    fn is_consistent(&self) -> bool {
        self.entries.len() == self.by_time.len()
            && self.by_time.iter().all(|((at, seq), key)| {
                self.entries
                    .get(key)
                    .is_some_and(|e| e.last_active == *at && e.seq == *seq)
            })
    }
}

struct Sweeper {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Cache of response bodies keyed by request target, evicted after inactivity.
///
/// All reads and writes, including the background sweep, serialize on one lock.
pub struct ExpiringCache {
    settings: CacheSettings,
    index: Arc<Mutex<CacheIndex>>,
    sweeper: Mutex<Option<Sweeper>>,
}

impl ExpiringCache {
    pub fn new(settings: CacheSettings) -> Self {
        Self {
            settings,
            index: Arc::new(Mutex::new(CacheIndex::default())),
            sweeper: Mutex::new(None),
        }
    }

    pub fn settings(&self) -> CacheSettings {
        self.settings
    }

    /// Spawn the sweep task. Must be called from within a Tokio runtime.
    /// Calling it while a sweep is already running does nothing.
    pub fn start(&self) {
        let mut slot = self.sweeper_slot();
        if slot.is_some() {
            return;
        }

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(sweep_loop(Arc::clone(&self.index), self.settings, stop_rx));
        *slot = Some(Sweeper { stop_tx, handle });

        tracing::info!(
            check_interval_secs = self.settings.check_interval.as_secs(),
            expire_after_secs = self.settings.expire_after.as_secs(),
            "Cache sweep started"
        );
    }

    /// Halt the sweep task and wait for it to finish.
    pub async fn stop(&self) {
        let sweeper = self.sweeper_slot().take();
        let Some(sweeper) = sweeper else {
            return;
        };

        let _ = sweeper.stop_tx.send(true);
        if let Err(e) = sweeper.handle.await {
            if !e.is_cancelled() {
                tracing::warn!(error = %e, "Cache sweep task ended abnormally");
            }
        }
        tracing::info!("Cache sweep stopped");
    }

    pub fn is_running(&self) -> bool {
        self.sweeper_slot().is_some()
    }

    /// Cached content for `key`. Does not refresh the entry.
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(str::to_owned)
    }

    /// Mark `key` as used now.
    ///
    /// An existing entry only has its recency refreshed; its content is never
    /// replaced. A missing entry is created when `content` is given, and left
    /// missing otherwise.
    pub fn keep_alive(&self, key: &str, content: Option<String>) {
        let now = Instant::now();
        let mut index = self.lock();
        if index.touch(key, now) {
            return;
        }
        if let Some(content) = content {
            index.insert(key, content, now);
            metrics::record_cache_size(index.entries.len());
        }
    }

    /// Drop every entry. Returns how many were removed.
    pub fn clear(&self) -> usize {
        let cleared = self.lock().clear();
        metrics::record_cache_size(0);
        tracing::info!(cleared, "Cache cleared");
        cleared
    }

    /// Run one sweep against the current instant.
    pub fn sweep_now(&self) -> usize {
        sweep(&self.index, self.settings.expire_after, Instant::now())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, CacheIndex> {
        self.index.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sweeper_slot(&self) -> MutexGuard<'_, Option<Sweeper>> {
        self.sweeper.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for ExpiringCache {
    fn default() -> Self {
        Self::new(CacheSettings::default())
    }
}

impl Drop for ExpiringCache {
    fn drop(&mut self) {
        let slot = self.sweeper.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(sweeper) = slot.take() {
            let _ = sweeper.stop_tx.send(true);
            sweeper.handle.abort();
        }
    }
}

fn sweep(index: &Mutex<CacheIndex>, expire_after: Duration, now: Instant) -> usize {
    let Some(cutoff) = now.checked_sub(expire_after) else {
        return 0;
    };

    let mut index = index.lock().unwrap_or_else(PoisonError::into_inner);
    let evicted = index.evict_before(cutoff);
    if evicted > 0 {
        metrics::record_evictions(evicted);
        metrics::record_cache_size(index.entries.len());
    }
    evicted
}

async fn sweep_loop(
    index: Arc<Mutex<CacheIndex>>,
    settings: CacheSettings,
    mut stop_rx: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = time::sleep(settings.check_interval) => {
                let evicted = sweep(&index, settings.expire_after, Instant::now());
                if evicted > 0 {
                    tracing::debug!(evicted, "Evicted inactive cache entries");
                }
            }
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    break;
                }
            }
        }
    }
}
