//! Helpers for testing the cache.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - The thunk constructors in this crate return closures that are ready to be passed to
//!    `register_function`. Constructors that need to observe their own invocations (such as
//!    [`counting`]) additionally hand out a shared counter.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `freshcache` crates and
///    mutes all other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("freshcache=trace"))
        .with_target(false)
        .compact()
        .with_test_writer()
        .try_init()
        .ok();
}

/// A computation that always succeeds with a copy of `value`.
pub fn constant<T>(value: T) -> impl Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static
where
    T: Clone + Send + Sync + 'static,
{
    move || {
        let value = value.clone();
        async move { Ok(value) }.boxed()
    }
}

/// A computation that always fails with `reason`.
pub fn failing<T>(
    reason: &'static str,
) -> impl Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static
where
    T: Send + 'static,
{
    move || async move { Err(anyhow!(reason)) }.boxed()
}

/// A computation that panics on every run.
pub fn panicking<T>() -> impl Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static
where
    T: Send + 'static,
{
    move || {
        let fut: BoxFuture<'static, Result<T>> = async move { panic!("boom") }.boxed();
        fut
    }
}

/// A computation that succeeds with `value` after `delay` has elapsed.
pub fn slow<T>(
    value: T,
    delay: Duration,
) -> impl Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static
where
    T: Clone + Send + Sync + 'static,
{
    move || {
        let value = value.clone();
        async move {
            tokio::time::sleep(delay).await;
            Ok(value)
        }
        .boxed()
    }
}

/// A computation yielding the number of runs so far, starting at `0`.
///
/// The returned counter observes the same sequence and can be used to assert
/// how often the computation ran.
pub fn counting() -> (
    impl Fn() -> BoxFuture<'static, Result<u64>> + Send + Sync + 'static,
    Arc<AtomicU64>,
) {
    let calls = Arc::new(AtomicU64::new(0));
    let thunk_calls = Arc::clone(&calls);
    let fun = move || {
        let n = thunk_calls.fetch_add(1, Ordering::Relaxed);
        async move { Ok(n) }.boxed()
    };
    (fun, calls)
}

/// A computation that succeeds with `value` on its first run and fails on
/// every run after that.
pub fn once_then_fail<T>(
    value: T,
) -> impl Fn() -> BoxFuture<'static, Result<T>> + Send + Sync + 'static
where
    T: Clone + Send + Sync + 'static,
{
    let calls = Arc::new(AtomicU64::new(0));
    move || {
        let n = calls.fetch_add(1, Ordering::Relaxed);
        let value = value.clone();
        async move {
            if n == 0 {
                Ok(value)
            } else {
                Err(anyhow!("no longer available"))
            }
        }
        .boxed()
    }
}
