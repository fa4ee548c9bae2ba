use super::{cache, key};
use crate::support::EventLog;
use points_resilience_cache::{CacheConfig, CacheEvent, QueryCache, SetOptions};
use std::time::Duration;

#[tokio::test(start_paused = true)]
async fn short_ttl_entry_is_present_then_absent() {
    let cache = cache::<i32>();
    cache.set(
        key("x"),
        1,
        SetOptions::new().ttl(Duration::from_millis(100)).tag("t"),
    );

    tokio::time::advance(Duration::from_millis(50)).await;
    assert_eq!(cache.get(&key("x")), Some(1));

    tokio::time::advance(Duration::from_millis(100)).await;
    assert_eq!(cache.get(&key("x")), None);

    // the expired read removed the entry and its tag reference
    assert_eq!(cache.stats().size, 0);
    assert_eq!(cache.stats().tag_count, 0);
}

#[tokio::test(start_paused = true)]
async fn default_ttl_is_five_minutes() {
    let cache = cache::<&'static str>();
    cache.set(key("profile"), "cached", SetOptions::new());

    tokio::time::advance(Duration::from_secs(299)).await;
    assert_eq!(cache.get(&key("profile")), Some("cached"));

    tokio::time::advance(Duration::from_secs(2)).await;
    assert_eq!(cache.get(&key("profile")), None);
}

#[tokio::test(start_paused = true)]
async fn replacing_a_key_restarts_its_lifetime() {
    let cache = cache::<i32>();
    let ttl = SetOptions::new().ttl(Duration::from_secs(10));
    cache.set(key("k"), 1, ttl.clone());

    tokio::time::advance(Duration::from_secs(8)).await;
    cache.set(key("k"), 2, ttl);

    tokio::time::advance(Duration::from_secs(8)).await;
    assert_eq!(cache.get(&key("k")), Some(2));
}

#[tokio::test(start_paused = true)]
async fn freshness_is_stricter_than_liveness() {
    let cache = cache::<i32>();
    cache.set(
        key("balance"),
        40,
        SetOptions::new().ttl(Duration::from_secs(60)),
    );

    tokio::time::advance(Duration::from_secs(20)).await;
    assert!(cache.is_fresh(&key("balance"), Duration::from_secs(30)));
    assert!(!cache.is_fresh(&key("balance"), Duration::from_secs(10)));
    assert!(cache.contains(&key("balance")));

    tokio::time::advance(Duration::from_secs(41)).await;
    assert!(!cache.is_fresh(&key("balance"), Duration::from_secs(600)));
    assert!(!cache.contains(&key("balance")));
    assert!(!cache.is_fresh(&key("missing"), Duration::from_secs(600)));
}

#[tokio::test(start_paused = true)]
async fn prune_sweeps_only_expired_entries() {
    let cache = cache::<i32>();
    for i in 0..5 {
        cache.set(
            key(&format!("short-{i}")),
            i,
            SetOptions::new().ttl(Duration::from_secs(1)),
        );
    }
    cache.set(
        key("long"),
        99,
        SetOptions::new().ttl(Duration::from_secs(60)).tag("keep"),
    );

    tokio::time::advance(Duration::from_secs(2)).await;
    let stats = cache.stats();
    assert_eq!(stats.size, 6);
    assert_eq!(stats.expired_entries, 5);
    assert_eq!(stats.active_entries, 1);

    assert_eq!(cache.prune(), 5);
    assert_eq!(cache.prune(), 0);
    assert_eq!(cache.get(&key("long")), Some(99));
    assert_eq!(cache.stats().tag_count, 1);
}

#[tokio::test(start_paused = true)]
async fn expired_reads_are_reported_as_misses() {
    let log = EventLog::new();
    let cache: QueryCache<String, i32> = QueryCache::new(
        CacheConfig::builder()
            .name("events")
            .default_ttl(Duration::from_secs(1))
            .on_event(log.listener())
            .build(),
    );

    cache.set(key("a"), 1, SetOptions::new());
    cache.get(&key("a"));
    tokio::time::advance(Duration::from_secs(2)).await;
    cache.get(&key("a"));
    cache.get(&key("a"));

    let kinds: Vec<&str> = log
        .events()
        .iter()
        .map(|event| match event {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Expired { .. } => "expired",
            CacheEvent::Invalidated { .. } => "invalidated",
            CacheEvent::TagInvalidated { .. } => "tag_invalidated",
        })
        .collect();
    assert_eq!(kinds, vec!["hit", "expired", "miss"]);
}
