//! End-to-end refresh, expiry and invalidation behavior.

use std::time::Duration;

use freshcache::{Config, FreshCache};
use freshcache_test as test;

fn ms(n: u64) -> Duration {
    Duration::from_millis(n)
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn fast_config() -> Config {
    Config {
        startup_delay: ms(20),
        ..Default::default()
    }
}

#[tokio::test]
async fn test_await_in_progress_after_external_delete() {
    test::setup();
    let cache = FreshCache::with_config(fast_config());

    cache
        .register_function(test::constant(6u32), "three_plus_three", secs(100), secs(10))
        .unwrap();

    // Wait for the value to be stored.
    assert_eq!(
        cache.get_with_timeout(&"three_plus_three", secs(5)).await,
        Ok(6)
    );

    // Drop the entry and ask the worker to recompute. The read below has no
    // stored value to fall back on, so it awaits the triggered computation.
    assert!(cache.invalidate(&"three_plus_three"));
    cache.refresh(&"three_plus_three").await.unwrap();

    assert_eq!(
        cache.get_with_timeout(&"three_plus_three", secs(5)).await,
        Ok(6)
    );
}

#[tokio::test]
async fn test_refresh_replaces_value() {
    test::setup();
    let cache = FreshCache::with_config(fast_config());

    let (fun, _calls) = test::counting();
    cache
        .register_function(fun, "counter", ms(2000), ms(50))
        .unwrap();

    // Wait for the first success, then sample for a while: values are
    // present and non-decreasing throughout.
    let mut last = cache.get_with_timeout(&"counter", secs(5)).await.unwrap();
    for _ in 0..15 {
        tokio::time::sleep(ms(25)).await;
        let value = cache.get_with_timeout(&"counter", secs(5)).await.unwrap();
        assert!(value >= last, "observed {value} after {last}");
        last = value;
    }
    assert!(last >= 1, "expected at least one refresh, got {last}");
}

#[tokio::test]
async fn test_entry_expires_when_refreshes_keep_failing() {
    test::setup();
    let cache = FreshCache::with_config(fast_config());

    cache
        .register_function(test::once_then_fail(9u32), "fades", ms(300), ms(100))
        .unwrap();

    assert_eq!(cache.get_with_timeout(&"fades", secs(5)).await, Ok(9));

    // Every refresh after the first success fails, so the entry lapses once
    // its ttl is up and stays gone.
    tokio::time::sleep(ms(600)).await;
    assert!(!cache.contains(&"fades"));
}

#[tokio::test]
async fn test_stored_value_wins_over_running_refresh() {
    test::setup();
    let cache = FreshCache::with_config(fast_config());

    // The first run returns quickly; refreshes then take 10 seconds each,
    // so any get during a refresh must come from the store.
    let (fun, calls) = test::counting();
    let slow_refresh = move || {
        let fut = fun();
        let calls = std::sync::Arc::clone(&calls);
        async move {
            if calls.load(std::sync::atomic::Ordering::Relaxed) > 1 {
                tokio::time::sleep(secs(10)).await;
            }
            fut.await
        }
    };
    cache
        .register_function(slow_refresh, "stale_ok", secs(100), ms(50))
        .unwrap();

    assert_eq!(cache.get_with_timeout(&"stale_ok", secs(5)).await, Ok(0));

    // Let the slow refresh start, then read while it is in flight.
    tokio::time::sleep(ms(150)).await;
    let started = std::time::Instant::now();
    assert_eq!(cache.get_with_timeout(&"stale_ok", secs(5)).await, Ok(0));
    assert!(started.elapsed() < secs(1));
}
