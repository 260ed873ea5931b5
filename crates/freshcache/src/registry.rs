use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use parking_lot::Mutex;

use crate::config::Config;
use crate::error::{CacheError, CacheResult};
use crate::store::Store;
use crate::worker::{ComputeFn, Worker, WorkerHandle};

/// A self-refreshing keyed value cache.
///
/// The cache is the single entry point for registering computations and
/// reading their values. It owns the shared value store and one worker per
/// registered key; the store is the only source of truth for present
/// values, the workers keep it populated.
///
/// Reads go to the store first. A hit is returned as-is, even while a
/// refresh for the same key is running, so the fast path never blocks on a
/// computation. On a miss the read is delegated to the key's worker, which
/// parks the reader on the current computation up to the caller's deadline.
pub struct FreshCache<K, V> {
    config: Config,
    store: Store<K, V>,
    workers: Mutex<HashMap<K, WorkerHandle<V>>>,
}

impl<K, V> fmt::Debug for FreshCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let workers = self
            .workers
            .try_lock()
            .map(|w| w.len())
            .unwrap_or_default();
        f.debug_struct("FreshCache")
            .field("config", &self.config)
            .field("registered workers", &workers)
            .finish()
    }
}

impl<K, V> Default for FreshCache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> FreshCache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Creates a cache with default [`Config`].
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Creates a cache with the given [`Config`].
    pub fn with_config(config: Config) -> Self {
        FreshCache {
            config,
            store: Store::new(),
            workers: Mutex::new(HashMap::new()),
        }
    }

    /// Registers `fun` under `key` and spawns the worker that keeps its
    /// value fresh.
    ///
    /// The first run starts after the configured startup delay. From then
    /// on, every successful run stores its value for `ttl` and schedules the
    /// next run `refresh_interval` later; failing runs are retried
    /// immediately, indefinitely, without touching the store.
    ///
    /// Returns [`CacheError::AlreadyRegistered`] when a worker or a stored
    /// value already exists for `key`. The check and the worker spawn happen
    /// under one lock, so concurrent registrations of the same key resolve
    /// to exactly one winner.
    ///
    /// # Panics
    ///
    /// `ttl` and `refresh_interval` are caller contracts: both must be
    /// positive and `refresh_interval` must be strictly shorter than `ttl`
    /// (this is what lets a healthy computation replace the entry before it
    /// can expire). Violations panic. Must be called from within a tokio
    /// runtime.
    pub fn register_function<F, Fut>(
        &self,
        fun: F,
        key: K,
        ttl: Duration,
        refresh_interval: Duration,
    ) -> CacheResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<V>> + Send + 'static,
    {
        assert!(!ttl.is_zero(), "ttl must be positive");
        assert!(
            !refresh_interval.is_zero(),
            "refresh interval must be positive"
        );
        assert!(
            refresh_interval < ttl,
            "refresh interval must be shorter than the ttl"
        );

        let fun: ComputeFn<V> = Arc::new(move || fun().boxed());

        let mut workers = self.workers.lock();
        if workers.contains_key(&key) || self.store.contains(&key) {
            return Err(CacheError::AlreadyRegistered);
        }

        tracing::debug!(key = ?key, ?ttl, ?refresh_interval, "registering computation");
        let handle = Worker::spawn(
            key.clone(),
            fun,
            ttl,
            refresh_interval,
            self.config.startup_delay,
            self.config.mailbox_size,
            self.store.clone(),
        );
        workers.insert(key, handle);
        Ok(())
    }

    /// Reads the value for `key` with the configured default deadline.
    ///
    /// See [`get_with_timeout`](Self::get_with_timeout).
    pub async fn get(&self, key: &K) -> CacheResult<V> {
        self.get_with_timeout(key, self.config.default_get_timeout)
            .await
    }

    /// Reads the value for `key`, waiting at most `timeout` for a miss to be
    /// filled.
    ///
    /// A stored value is returned immediately, even while the key's worker
    /// is recomputing it. Without one, the reader is parked on the current
    /// computation and gets its value if it succeeds within `timeout`;
    /// otherwise [`CacheError::Timeout`]. Failing computations are never
    /// surfaced, a reader waiting on one runs out its deadline.
    ///
    /// Returns [`CacheError::NotRegistered`] right away when `key` has no
    /// worker and no stored value.
    pub async fn get_with_timeout(&self, key: &K, timeout: Duration) -> CacheResult<V> {
        metric!(counter("caches.access") += 1);
        if let Some(value) = self.store.get(key) {
            metric!(counter("caches.memory.hit") += 1);
            return Ok(value);
        }

        let handle = match self.workers.lock().get(key) {
            Some(handle) => handle.clone(),
            None => return Err(CacheError::NotRegistered),
        };

        let result = handle.await_current(timeout).await;
        if result.is_err() {
            metric!(counter("caches.read.timeout") += 1);
        }
        result
    }

    /// Removes the stored value for `key`, if any.
    ///
    /// The worker and its schedule are untouched; the next successful run
    /// repopulates the entry. Returns whether a value was removed.
    pub fn invalidate(&self, key: &K) -> bool {
        self.store.delete(key)
    }

    /// Whether a value is currently stored for `key`. Non-blocking.
    pub fn contains(&self, key: &K) -> bool {
        self.store.contains(key)
    }

    /// Asks the worker for `key` to recompute now.
    ///
    /// A pending refresh is folded into the triggered run; if a computation
    /// is already in flight no second one is started. The call does not wait
    /// for the run to finish, pair it with [`get_with_timeout`](Self::get_with_timeout)
    /// to observe the result.
    pub async fn refresh(&self, key: &K) -> CacheResult<()> {
        let handle = match self.workers.lock().get(key) {
            Some(handle) => handle.clone(),
            None => return Err(CacheError::NotRegistered),
        };
        handle.trigger_run().await;
        Ok(())
    }
}
