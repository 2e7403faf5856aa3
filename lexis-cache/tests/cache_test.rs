use std::sync::Arc;
use std::thread;
use std::time::Duration;

use lexis_cache::EmbeddingCache;
use lexis_core::config::CacheConfig;
use lexis_core::Provenance;
use proptest::prelude::*;
use test_fixtures::{deterministic_vector, RecordingAccessObserver};

const MODEL: &str = "bce-embedding-base_v1";

fn cache(max_size: usize, ttl_seconds: f64) -> EmbeddingCache {
    EmbeddingCache::in_memory(CacheConfig::in_memory(max_size, ttl_seconds))
}

fn put(cache: &EmbeddingCache, text: &str) -> bool {
    cache.put(text, deterministic_vector(text, MODEL), MODEL, Provenance::User)
}

#[test]
fn put_then_get_returns_copy() {
    let cache = cache(10, 0.0);
    assert!(put(&cache, "apple"));
    assert_eq!(cache.get("apple", MODEL), Some(deterministic_vector("apple", MODEL)));
    assert_eq!(cache.get("Apple ", MODEL), Some(deterministic_vector("apple", MODEL)));
    let stats = cache.stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 0);
    assert_eq!(stats.put_calls, 1);
}

#[test]
fn miss_is_counted() {
    let cache = cache(10, 0.0);
    assert_eq!(cache.get("missing", MODEL), None);
    assert_eq!(cache.stats().misses, 1);
    assert_eq!(cache.stats().hit_rate(), 0.0);
}

#[test]
fn models_do_not_share_entries() {
    let cache = cache(10, 0.0);
    put(&cache, "apple");
    assert!(cache.get("apple", "other-model").is_none());
}

#[test]
fn empty_inputs_are_rejected_without_panicking() {
    let cache = cache(10, 0.0);
    assert!(!cache.put("", vec![1.0], MODEL, Provenance::User));
    assert!(!cache.put("   ", vec![1.0], MODEL, Provenance::User));
    assert!(!cache.put("apple", Vec::new(), MODEL, Provenance::User));
    assert!(cache.is_empty());
    assert_eq!(cache.get("", MODEL), None);
    assert_eq!(cache.stats().misses, 1);
}

#[test]
fn scenario_capacity_three_evicts_oldest() {
    let cache = cache(3, 0.0);
    for word in ["hello", "world", "foo", "bar"] {
        put(&cache, word);
    }
    assert_eq!(cache.len(), 3);
    assert!(!cache.contains("hello", MODEL));
    assert!(cache.contains("bar", MODEL));
    assert_eq!(cache.stats().evicted, 1);
}

#[test]
fn lru_get_protects_recent_entry() {
    let cache = cache(2, 0.0);
    put(&cache, "a");
    thread::sleep(Duration::from_millis(2));
    put(&cache, "b");
    thread::sleep(Duration::from_millis(2));
    assert!(cache.get("a", MODEL).is_some());
    thread::sleep(Duration::from_millis(2));
    put(&cache, "c");
    assert!(cache.contains("a", MODEL));
    assert!(!cache.contains("b", MODEL));
    assert!(cache.contains("c", MODEL));
}

#[test]
fn overwrite_replaces_without_growing() {
    let cache = cache(2, 0.0);
    put(&cache, "a");
    put(&cache, "b");
    assert!(cache.put("a", vec![9.0], MODEL, Provenance::User));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.stats().evicted, 0);
    assert_eq!(cache.get("a", MODEL), Some(vec![9.0]));
}

#[test]
fn scenario_ttl_expires_entry() {
    let cache = cache(10, 1.0);
    put(&cache, "x");
    thread::sleep(Duration::from_millis(1100));
    assert_eq!(cache.get("x", MODEL), None);
    let stats = cache.stats();
    assert!(stats.expired >= 1);
    assert_eq!(stats.misses, 1);
    assert!(cache.is_empty());
}

#[test]
fn clear_expired_counts_removed_entries() {
    let cache = cache(10, 0.05);
    put(&cache, "a");
    put(&cache, "b");
    thread::sleep(Duration::from_millis(80));
    put(&cache, "c");
    // "a" and "b" were swept by the put.
    assert_eq!(cache.len(), 1);
    thread::sleep(Duration::from_millis(80));
    assert_eq!(cache.clear_expired(), 1);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().expired, 3);
}

#[test]
fn contains_does_not_change_stats_or_order() {
    let cache = cache(2, 0.0);
    put(&cache, "a");
    thread::sleep(Duration::from_millis(2));
    put(&cache, "b");
    assert!(cache.contains("a", MODEL));
    let stats = cache.stats();
    assert_eq!(stats.hits + stats.misses, 0);
    put(&cache, "c");
    assert!(!cache.contains("a", MODEL));
}

#[test]
fn resize_smaller_evicts_immediately() {
    let cache = cache(5, 0.0);
    for word in ["a", "b", "c", "d", "e"] {
        put(&cache, word);
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(cache.resize(2), 3);
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.capacity(), 2);
    assert_eq!(cache.config().max_size, 2);
    assert!(cache.contains("e", MODEL));
}

#[test]
fn resize_to_zero_keeps_one_slot() {
    let cache = cache(3, 0.0);
    put(&cache, "a");
    put(&cache, "b");
    cache.resize(0);
    assert_eq!(cache.capacity(), 1);
    assert_eq!(cache.len(), 1);
}

#[test]
fn zero_capacity_config_is_normalized() {
    let cache = cache(0, 0.0);
    assert_eq!(cache.capacity(), 1);
    put(&cache, "a");
    put(&cache, "b");
    assert_eq!(cache.len(), 1);
}

#[test]
fn clear_all_keeps_counters() {
    let cache = cache(5, 0.0);
    put(&cache, "a");
    cache.get("a", MODEL);
    assert_eq!(cache.clear_all(), 1);
    assert!(cache.is_empty());
    assert_eq!(cache.stats().hits, 1);
}

#[test]
fn predictive_entries_carry_provenance_and_score() {
    let cache = cache(5, 0.0);
    assert!(cache.put_predicted("apple", vec![1.0], MODEL, 0.6));
    let entry = cache.peek("apple", MODEL).unwrap();
    assert_eq!(entry.provenance, Provenance::Predictive);
    assert!((entry.prediction_score - 0.6).abs() < 1e-9);

    cache.get("apple", MODEL);
    let entry = cache.peek("apple", MODEL).unwrap();
    assert!((entry.prediction_score - 0.7).abs() < 1e-9);

    let stats = cache.stats();
    assert_eq!(stats.predictive_inserts, 1);
    assert_eq!(stats.predictive_hits, 1);
    assert_eq!(stats.entries_by_provenance.predictive, 1);
}

#[test]
fn repeated_hits_confirm_a_prediction_once() {
    let cache = cache(5, 0.0);
    assert!(cache.put_predicted("apple", vec![1.0], MODEL, 0.5));
    for _ in 0..3 {
        assert!(cache.get("apple", MODEL).is_some());
    }
    let entry = cache.peek("apple", MODEL).unwrap();
    assert!((entry.prediction_score - 0.6).abs() < 1e-9);
    assert!(entry.prediction_confirmed);

    let stats = cache.stats();
    assert_eq!(stats.hits, 3);
    assert_eq!(stats.predictive_hits, 1);
}

#[test]
fn user_entries_have_zero_prediction_score() {
    let cache = cache(5, 0.0);
    put(&cache, "apple");
    assert_eq!(cache.peek("apple", MODEL).unwrap().prediction_score, 0.0);
}

#[test]
fn coverage_and_memory_usage() {
    let cache = cache(10, 0.0);
    put(&cache, "a");
    put(&cache, "b");
    assert_eq!(cache.coverage(&["a", "b", "c", "d"], MODEL), 0.5);
    assert_eq!(cache.coverage::<&str>(&[], MODEL), 0.0);

    let usage = cache.memory_usage();
    assert_eq!(usage.entries, 2);
    assert!(usage.bytes > 0);
    assert_eq!(usage.average_entry_bytes, usage.bytes as f64 / 2.0);
}

#[test]
fn access_observer_sees_every_lookup() {
    let observer = Arc::new(RecordingAccessObserver::new());
    let cache = cache(5, 0.0).with_access_observer(observer.clone());
    put(&cache, "apple");
    cache.get("apple", MODEL);
    cache.get("pear", MODEL);
    assert_eq!(
        observer.lookups(),
        vec![("apple".to_string(), true), ("pear".to_string(), false)]
    );
}

#[test]
fn concurrent_distinct_puts_respect_capacity() {
    for (threads, max_size) in [(16, 64), (32, 8)] {
        let cache = Arc::new(cache(max_size, 0.0));
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || put(&cache, &format!("word-{i}")))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap());
        }
        assert_eq!(cache.len(), threads.min(max_size));
        assert_eq!(cache.stats().put_calls, threads as u64);
    }
}

#[test]
fn concurrent_gets_and_puts_on_one_key() {
    let cache = Arc::new(cache(4, 0.0));
    put(&cache, "shared");
    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            thread::spawn(move || {
                for _ in 0..50 {
                    if i % 2 == 0 {
                        cache.get("shared", MODEL);
                    } else {
                        put(&cache, "shared");
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.get("shared", MODEL), Some(deterministic_vector("shared", MODEL)));
}

proptest! {
    #[test]
    fn size_never_exceeds_capacity(
        max_size in 1usize..12,
        words in proptest::collection::vec("[a-f]{1,3}", 1..60),
    ) {
        let cache = cache(max_size, 0.0);
        for word in &words {
            put(&cache, word);
            prop_assert!(cache.len() <= max_size);
        }
    }
}
