//! Property tests for tag invalidation.
//!
//! Invariants tested:
//! - Invalidating a tag removes exactly the keys carrying it at that moment
//! - Keys with other tags, or none, are untouched
//! - Re-setting a key replaces its tag set

use points_resilience_cache::{CacheConfig, QueryCache, SetOptions};
use proptest::prelude::*;
use std::collections::{BTreeSet, HashMap};

const TAGS: [&str; 4] = ["customer:1", "customer:2", "business:9", "history"];

fn write_strategy() -> impl Strategy<Value = (u8, u32, BTreeSet<usize>)> {
    (0u8..10, any::<u32>(), prop::collection::btree_set(0usize..TAGS.len(), 0..3))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    /// Property: invalidate_by_tag matches a model of the latest writes
    #[test]
    fn tag_invalidation_matches_model(
        writes in prop::collection::vec(write_strategy(), 1..40),
        target in 0usize..TAGS.len(),
    ) {
        let cache: QueryCache<u8, u32> =
            QueryCache::new(CacheConfig::builder().name("prop-tags").build());
        let mut model: HashMap<u8, (u32, BTreeSet<usize>)> = HashMap::new();

        for (key, value, tags) in writes {
            cache.set(
                key,
                value,
                SetOptions::new().tags(tags.iter().map(|t| TAGS[*t])),
            );
            model.insert(key, (value, tags));
        }

        let tagged = model
            .values()
            .filter(|(_, tags)| tags.contains(&target))
            .count();
        prop_assert_eq!(cache.invalidate_by_tag(TAGS[target]), tagged);

        for (key, (value, tags)) in &model {
            let expected = if tags.contains(&target) { None } else { Some(*value) };
            prop_assert_eq!(cache.get(key), expected);
        }

        // nothing references the invalidated tag any more
        prop_assert_eq!(cache.invalidate_by_tag(TAGS[target]), 0);
    }

    /// Property: invalidating every tag leaves exactly the untagged keys
    #[test]
    fn all_tags_leave_untagged_keys(
        writes in prop::collection::vec(write_strategy(), 1..40),
    ) {
        let cache: QueryCache<u8, u32> =
            QueryCache::new(CacheConfig::builder().name("prop-tags").build());
        let mut model: HashMap<u8, BTreeSet<usize>> = HashMap::new();

        for (key, value, tags) in writes {
            cache.set(
                key,
                value,
                SetOptions::new().tags(tags.iter().map(|t| TAGS[*t])),
            );
            model.insert(key, tags);
        }

        for tag in TAGS {
            cache.invalidate_by_tag(tag);
        }

        let untagged = model.values().filter(|tags| tags.is_empty()).count();
        let stats = cache.stats();
        prop_assert_eq!(stats.size, untagged);
        prop_assert_eq!(stats.tag_count, 0);
    }
}
