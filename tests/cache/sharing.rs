use super::{cache, key};
use points_resilience_cache::SetOptions;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn clones_share_entries() {
    let cache = cache::<i32>();
    let other = cache.clone();

    cache.set(key("a"), 1, SetOptions::new().tag("t"));
    assert_eq!(other.get(&key("a")), Some(1));

    other.invalidate_by_tag("t");
    assert_eq!(cache.get(&key("a")), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_writers_and_invalidators_keep_indexes_consistent() {
    let cache = cache::<usize>();
    let mut handles = Vec::new();

    for worker in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..200 {
                let tag = format!("group-{}", i % 4);
                cache.set(
                    key(&format!("w{worker}-{i}")),
                    i,
                    SetOptions::new().tag(tag.clone()),
                );
                if i % 25 == 0 {
                    cache.invalidate_by_tag(&tag);
                }
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let before = cache.stats().size;
    let removed: usize = (0..4)
        .map(|group| cache.invalidate_by_tag(&format!("group-{group}")))
        .sum();

    // every surviving entry belonged to exactly one group
    assert_eq!(removed, before);
    assert_eq!(cache.stats().size, 0);
    assert_eq!(cache.stats().tag_count, 0);
}

#[tokio::test]
async fn read_through_loads_once() {
    let cache = cache::<i64>();
    let loads = Arc::new(AtomicUsize::new(0));

    for _ in 0..3 {
        let loads = Arc::clone(&loads);
        let balance = cache
            .get_or_insert_with(
                key("balance:c1"),
                SetOptions::new().tag("customer:c1"),
                || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, std::io::Error>(120)
                },
            )
            .await
            .unwrap();
        assert_eq!(balance, 120);
    }
    assert_eq!(loads.load(Ordering::SeqCst), 1);

    cache.invalidate_by_tag("customer:c1");
    assert!(!cache.contains(&key("balance:c1")));
}

#[tokio::test]
async fn failed_load_caches_nothing() {
    let cache = cache::<i64>();

    let err = cache
        .get_or_insert_with(key("balance:c1"), SetOptions::new(), || async {
            Err::<i64, _>("store unavailable")
        })
        .await
        .unwrap_err();

    assert_eq!(err, "store unavailable");
    assert!(!cache.contains(&key("balance:c1")));
}
