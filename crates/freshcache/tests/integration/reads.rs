//! End-to-end read behavior: fast path, await path, registration.

use std::time::Duration;

use freshcache::{CacheError, Config, FreshCache};
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
async fn test_happy_path() {
    test::setup();
    let cache = FreshCache::with_config(fast_config());

    cache
        .register_function(test::constant(2u32), "one_plus_one", secs(100), secs(10))
        .unwrap();

    tokio::time::sleep(ms(200)).await;
    assert_eq!(cache.get_with_timeout(&"one_plus_one", secs(5)).await, Ok(2));
}

#[tokio::test]
async fn test_failing_function_never_populates() {
    test::setup();
    let cache = FreshCache::with_config(fast_config());

    cache
        .register_function(test::failing::<u32>("reason"), "two_plus_two", secs(100), secs(10))
        .unwrap();

    tokio::time::sleep(ms(100)).await;
    let started = std::time::Instant::now();
    let result = cache.get_with_timeout(&"two_plus_two", ms(300)).await;
    assert_eq!(result, Err(CacheError::Timeout));
    // The worker retries forever; the reader's deadline runs out in full.
    assert!(started.elapsed() >= ms(300));
}

#[tokio::test]
async fn test_crashing_function_never_populates() {
    test::setup();
    let cache = FreshCache::with_config(fast_config());

    cache
        .register_function(test::panicking::<u32>(), "crashes", secs(100), secs(10))
        .unwrap();

    tokio::time::sleep(ms(100)).await;
    let result = cache.get_with_timeout(&"crashes", ms(200)).await;
    assert_eq!(result, Err(CacheError::Timeout));
}

#[tokio::test]
async fn test_not_registered() {
    test::setup();
    let cache: FreshCache<&str, u32> = FreshCache::new();

    let started = std::time::Instant::now();
    let result = cache.get_with_timeout(&"never_seen", secs(1)).await;
    assert_eq!(result, Err(CacheError::NotRegistered));
    assert!(started.elapsed() < ms(100));
}

#[tokio::test]
async fn test_duplicate_registration() {
    test::setup();
    let cache = FreshCache::with_config(fast_config());

    assert_eq!(
        cache.register_function(test::constant(1u32), "dup", secs(100), secs(10)),
        Ok(())
    );
    assert_eq!(
        cache.register_function(test::constant(2u32), "dup", secs(100), secs(10)),
        Err(CacheError::AlreadyRegistered)
    );

    tokio::time::sleep(ms(100)).await;
    assert_eq!(cache.get_with_timeout(&"dup", secs(5)).await, Ok(1));
}

#[tokio::test]
async fn test_reader_during_startup_delay_awaits_first_computation() {
    test::setup();
    let config = Config {
        startup_delay: ms(150),
        ..Default::default()
    };
    let cache = FreshCache::with_config(config);

    cache
        .register_function(test::constant(7u32), "early", secs(100), secs(10))
        .unwrap();

    // No value is stored yet; the read parks on the first computation.
    let started = std::time::Instant::now();
    assert_eq!(cache.get_with_timeout(&"early", secs(5)).await, Ok(7));
    assert!(started.elapsed() >= ms(100));
}

#[tokio::test]
async fn test_slow_computation_times_out_reader() {
    test::setup();
    let cache = FreshCache::with_config(fast_config());

    cache
        .register_function(test::slow(1u32, secs(10)), "slow", secs(100), secs(10))
        .unwrap();

    let result = cache.get_with_timeout(&"slow", ms(150)).await;
    assert_eq!(result, Err(CacheError::Timeout));
}
