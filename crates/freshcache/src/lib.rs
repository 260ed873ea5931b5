//! # freshcache
//!
//! A self-refreshing keyed value cache for read-cheap, compute-expensive
//! values: remote lookups, expensive aggregations, anything a caller wants
//! recent *now* without ever driving the computation itself.
//!
//! ## How it works
//!
//! Callers register a 0-arity computation under a key, together with a
//! time-to-live and a refresh interval. From that point on the cache owns
//! the computation: a dedicated worker runs it periodically, stores
//! successful results in the shared in-memory store, retries failures
//! immediately and expires entries whose ttl lapses without a successful
//! refresh.
//!
//! A read goes through the following steps:
//!
//! - First, it checks the store. A stored value is returned immediately,
//!   even while a refresh for the same key is in progress. Slightly stale
//!   reads are deliberately preferred over blocking.
//! - On a miss with a live worker, the reader is parked on the current
//!   computation and woken with the value if it succeeds within the
//!   caller's deadline. Computation failures are retried by the worker and
//!   never surfaced to readers; a reader waiting on one just runs out its
//!   deadline and observes [`CacheError::Timeout`].
//! - Without a worker, the read fails with [`CacheError::NotRegistered`]
//!   right away.
//!
//! Because the refresh interval must be strictly shorter than the ttl, a
//! reliably succeeding computation replaces its entry before expiry can
//! remove it: after the first success, readers never observe the entry
//! missing.
//!
//! ## Example
//!
//! ```no_run
//! use std::time::Duration;
//!
//! use freshcache::FreshCache;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), freshcache::CacheError> {
//! let cache = FreshCache::new();
//!
//! cache.register_function(
//!     || async { Ok(2u32) },
//!     "one-plus-one",
//!     Duration::from_secs(100),
//!     Duration::from_secs(10),
//! )?;
//!
//! // Waits for the first computation if it has not finished yet.
//! let value = cache.get(&"one-plus-one").await?;
//! assert_eq!(value, 2);
//! # Ok(())
//! # }
//! ```
//!
//! A process typically wants exactly one cache instance; wrap it in a
//! `std::sync::OnceLock` (or an `Arc` handed to every component) to get
//! there. The cache itself does not insist on being a singleton, which
//! keeps tests free to spin up as many instances as they like.
//!
//! ## Observability
//!
//! All state transitions emit [`tracing`] events; see [`logging`] for
//! subscriber helpers. Counters and timers are reported through the
//! [`metric!`] macro once [`metrics::configure_statsd`] has been called.

#![warn(missing_docs)]

#[macro_use]
pub mod metrics;

pub mod config;
pub mod logging;

mod error;
mod registry;
mod store;
mod worker;

pub use config::{Config, MetricsConfig};
pub use error::{CacheError, CacheResult};
pub use registry::FreshCache;
pub use worker::ComputeFn;
