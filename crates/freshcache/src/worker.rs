use std::fmt;
use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, OptionFuture};
use tokio::sync::{mpsc, oneshot};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::{self, Instant};

use crate::error::{CacheError, CacheResult};
use crate::store::Store;

/// The boxed 0-arity computation registered for a key.
///
/// A run either succeeds with a fresh value or fails with an arbitrary
/// cause. Causes are logged by the worker and never reach readers.
pub type ComputeFn<V> = Arc<dyn Fn() -> BoxFuture<'static, anyhow::Result<V>> + Send + Sync>;

/// Messages consumed by a worker's event loop.
enum Message<V> {
    /// Subscribe the sender to the success of the current (or next) computation.
    Await(oneshot::Sender<V>),
    /// Start a computation now unless one is already in flight.
    Run,
}

/// Cheaply cloneable address of a single worker.
pub(crate) struct WorkerHandle<V> {
    tx: mpsc::Sender<Message<V>>,
}

impl<V> Clone for WorkerHandle<V> {
    fn clone(&self) -> Self {
        WorkerHandle {
            tx: self.tx.clone(),
        }
    }
}

impl<V: Send> WorkerHandle<V> {
    /// Waits for the current computation to succeed, for at most `timeout`.
    ///
    /// Everything other than a success within the window surfaces as
    /// [`CacheError::Timeout`]: a run that outlasts the deadline just as much
    /// as one that fails or crashes before it. Readers are not re-bound to
    /// the retry run after a failure, they simply run out their deadline.
    pub(crate) async fn await_current(&self, timeout: Duration) -> CacheResult<V> {
        let outcome = async {
            let (tx, rx) = oneshot::channel();
            if self.tx.send(Message::Await(tx)).await.is_ok() {
                if let Ok(value) = rx.await {
                    return value;
                }
            }
            // The computation failed, or the worker is gone because the
            // whole cache is being torn down. Neither is surfaced to
            // readers, so hold the reader until its deadline expires.
            std::future::pending().await
        };
        match time::timeout(timeout, outcome).await {
            Ok(value) => Ok(value),
            Err(_elapsed) => Err(CacheError::Timeout),
        }
    }

    /// Asks the worker to start a computation now.
    ///
    /// A pending refresh timer is consumed by the triggered run; if a
    /// computation is already in flight the request is dropped.
    pub(crate) async fn trigger_run(&self) {
        self.tx.send(Message::Run).await.ok();
    }
}

/// The single in-flight computation of a worker.
struct InFlight<V> {
    task: JoinHandle<anyhow::Result<V>>,
    started: Instant,
}

/// The per-key unit driving the refresh/expiry/retry cycle.
///
/// A worker is spawned at registration time and lives for the rest of the
/// process. Its life is a loop over four kinds of events:
///
/// - the run timer fires (the startup delay after registration, or a
///   scheduled refresh): start a computation on its own task,
/// - the computation completes: on success write the value to the store,
///   wake subscribed readers, replace the pending expiry and schedule the
///   next run; on failure or crash leave the store untouched and immediately
///   run again,
/// - the expiry timer fires: remove the store entry; the worker stays alive
///   and the next successful run repopulates it,
/// - a mailbox message arrives: a reader subscribing to the current
///   computation, or a request to run right away.
///
/// Computations run on a spawned task so a slow run never stops the loop
/// from answering readers or handling timers. At most one computation is in
/// flight at any moment; while one is, no run timer is pending.
///
/// Since the refresh interval is required to be shorter than the ttl, a
/// reliably succeeding computation replaces the entry before the expiry can
/// fire and readers never observe a gap. If runs keep failing past the ttl,
/// the entry lapses until a later run succeeds.
pub(crate) struct Worker<K, V> {
    key: K,
    fun: ComputeFn<V>,
    ttl: Duration,
    refresh_interval: Duration,
    store: Store<K, V>,
    rx: mpsc::Receiver<Message<V>>,

    /// The single in-flight computation, if any.
    in_flight: Option<InFlight<V>>,
    /// Readers subscribed to the success of the current (or next) computation.
    waiters: Vec<oneshot::Sender<V>>,
    /// When the next computation starts. `None` while one is in flight.
    next_run: Option<Instant>,
    /// When the stored entry lapses. `None` while no entry is stored.
    expires_at: Option<Instant>,
}

impl<K, V> Worker<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    /// Spawns the event loop for `key` and returns its address.
    ///
    /// The first run happens `startup_delay` after this call; until it
    /// completes the store has no entry and readers can only subscribe.
    pub(crate) fn spawn(
        key: K,
        fun: ComputeFn<V>,
        ttl: Duration,
        refresh_interval: Duration,
        startup_delay: Duration,
        mailbox_size: usize,
        store: Store<K, V>,
    ) -> WorkerHandle<V> {
        let (tx, rx) = mpsc::channel(mailbox_size);
        let worker = Worker {
            key,
            fun,
            ttl,
            refresh_interval,
            store,
            rx,
            in_flight: None,
            waiters: Vec::new(),
            next_run: Some(Instant::now() + startup_delay),
            expires_at: None,
        };
        tokio::spawn(worker.run());
        WorkerHandle { tx }
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                msg = self.rx.recv() => match msg {
                    Some(Message::Await(tx)) => self.subscribe(tx),
                    Some(Message::Run) => self.start_run(),
                    // All handles are gone, the owning cache was dropped.
                    None => break,
                },
                Some(result) = OptionFuture::from(self.in_flight.as_mut().map(|c| &mut c.task)) => {
                    if let Some(in_flight) = self.in_flight.take() {
                        self.on_completion(in_flight.started, result);
                    }
                }
                _ = deadline(self.next_run) => {
                    self.start_run();
                }
                _ = deadline(self.expires_at) => {
                    self.expires_at = None;
                    self.on_expiry();
                }
            }
        }
        tracing::debug!(key = ?self.key, "cache worker terminated");
    }

    fn subscribe(&mut self, tx: oneshot::Sender<V>) {
        if self.in_flight.is_none() {
            // The reader's store lookup can race the write of the very value
            // it is after. Answer from the store rather than parking the
            // reader until the next scheduled run.
            if let Some(value) = self.store.get(&self.key) {
                tx.send(value).ok();
                return;
            }
        }
        self.waiters.push(tx);
    }

    fn start_run(&mut self) {
        if self.in_flight.is_some() {
            return;
        }
        self.next_run = None;
        tracing::trace!(key = ?self.key, "starting computation");
        metric!(counter("caches.computation") += 1);
        self.in_flight = Some(InFlight {
            task: tokio::spawn((self.fun)()),
            started: Instant::now(),
        });
    }

    fn on_completion(&mut self, started: Instant, result: Result<anyhow::Result<V>, JoinError>) {
        metric!(timer("caches.computation.duration") = started.elapsed().as_millis() as u64);
        match result {
            Ok(Ok(value)) => self.on_success(value),
            Ok(Err(err)) => {
                tracing::warn!(key = ?self.key, error = ?err, "computation failed, retrying");
                metric!(counter("caches.computation.failure") += 1);
                self.on_failure();
            }
            Err(err) => {
                tracing::error!(key = ?self.key, error = %err, "computation crashed, retrying");
                metric!(counter("caches.computation.crash") += 1);
                self.on_failure();
            }
        }
    }

    fn on_success(&mut self, value: V) {
        let now = Instant::now();
        self.store.put(self.key.clone(), value.clone());
        for waiter in self.waiters.drain(..) {
            // Readers that already gave up have dropped their receiver.
            waiter.send(value.clone()).ok();
        }
        // The fresh write replaces the previous expiry wholesale.
        self.expires_at = Some(now + self.ttl);
        self.next_run = Some(now + self.refresh_interval);
        tracing::trace!(key = ?self.key, "stored fresh value");
    }

    fn on_failure(&mut self) {
        // Subscribed readers are not carried over to the retry; dropping
        // their senders leaves them to run out their own deadlines.
        self.waiters.clear();
        self.start_run();
    }

    fn on_expiry(&mut self) {
        tracing::debug!(key = ?self.key, "entry expired");
        metric!(counter("caches.expiration") += 1);
        self.store.delete(&self.key);
    }
}

/// Resolves once `at` is reached; pends forever without a deadline.
async fn deadline(at: Option<Instant>) {
    match at {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
