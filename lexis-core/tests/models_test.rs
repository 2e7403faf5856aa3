use chrono::{Duration, TimeZone, Utc};
use lexis_core::models::*;
use proptest::prelude::*;

fn roundtrip<T: serde::Serialize + serde::de::DeserializeOwned>(val: &T) -> T {
    let json = serde_json::to_string(val).unwrap();
    serde_json::from_str(&json).unwrap()
}

fn entry(provenance: Provenance) -> CacheEntry {
    let t0 = Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap();
    CacheEntry::new(CacheKey::new("abc"), vec![0.1, 0.2, 0.3], provenance, t0)
}

#[test]
fn new_entry_starts_with_one_access() {
    let e = entry(Provenance::User);
    assert_eq!(e.access_count, 1);
    assert_eq!(e.created_at, e.last_access_at);
    assert_eq!(e.prediction_score, 0.0);
    assert!(e.is_valid());
}

#[test]
fn touch_refreshes_last_access_but_not_created_at() {
    let mut e = entry(Provenance::User);
    let later = e.created_at + Duration::seconds(30);
    e.touch(later);
    assert_eq!(e.access_count, 2);
    assert_eq!(e.last_access_at, later);
    assert_eq!(e.created_at, later - Duration::seconds(30));
}

#[test]
fn touch_with_earlier_clock_keeps_invariant() {
    let mut e = entry(Provenance::User);
    e.touch(e.created_at - Duration::seconds(100));
    assert!(e.last_access_at >= e.created_at);
}

#[test]
fn only_first_predictive_hit_boosts_score() {
    let mut e = entry(Provenance::Predictive).with_prediction_score(0.5);
    assert!(e.touch(e.created_at));
    assert!(e.prediction_confirmed);
    assert!((e.prediction_score - 0.6).abs() < 1e-9);
    assert!(!e.touch(e.created_at));
    assert!(!e.touch(e.created_at));
    assert!((e.prediction_score - 0.6).abs() < 1e-9);
    assert_eq!(e.access_count, 4);
}

#[test]
fn predictive_boost_is_capped_at_one() {
    let mut e = entry(Provenance::Predictive).with_prediction_score(0.95);
    e.touch(e.created_at);
    assert_eq!(e.prediction_score, 1.0);
}

#[test]
fn user_hit_does_not_boost_score() {
    let mut e = entry(Provenance::User);
    assert!(!e.touch(e.created_at));
    assert_eq!(e.prediction_score, 0.0);
    assert!(!e.prediction_confirmed);
}

#[test]
fn prediction_score_is_clamped() {
    assert_eq!(entry(Provenance::Predictive).with_prediction_score(3.0).prediction_score, 1.0);
    assert_eq!(entry(Provenance::Predictive).with_prediction_score(-1.0).prediction_score, 0.0);
    assert_eq!(entry(Provenance::Predictive).with_prediction_score(f64::NAN).prediction_score, 0.0);
}

#[test]
fn expiry_uses_absolute_age() {
    let e = entry(Provenance::User);
    assert!(!e.is_expired(10.0, e.created_at + Duration::seconds(10)));
    assert!(e.is_expired(10.0, e.created_at + Duration::seconds(11)));
    assert!(!e.is_expired(0.0, e.created_at + Duration::days(365)));
}

#[test]
fn memory_bytes_counts_vector_payload() {
    let small = entry(Provenance::User);
    let mut big = small.clone();
    big.vector = vec![0.0; 1024];
    assert!(big.memory_bytes() > small.memory_bytes());
    assert!(big.memory_bytes() >= 1024 * 4);
}

#[test]
fn provenance_serializes_lowercase() {
    assert_eq!(serde_json::to_string(&Provenance::Predictive).unwrap(), "\"predictive\"");
    assert_eq!(Provenance::Preload.to_string(), "preload");
}

#[test]
fn cache_entry_roundtrip() {
    let e = entry(Provenance::Preload);
    assert_eq!(roundtrip(&e), e);
}

#[test]
fn hit_rate_handles_zero_lookups() {
    let stats = CacheStats::default();
    assert_eq!(stats.hit_rate(), 0.0);
    let stats = CacheStats {
        hits: 3,
        misses: 1,
        ..Default::default()
    };
    assert_eq!(stats.hit_rate(), 0.75);
}

#[test]
fn provenance_counts_total() {
    let mut counts = ProvenanceCounts::default();
    counts.add(Provenance::User);
    counts.add(Provenance::Predictive);
    counts.add(Provenance::Predictive);
    assert_eq!(counts.get(Provenance::Predictive), 2);
    assert_eq!(counts.total(), 3);
}

#[test]
fn usage_pattern_starts_at_neutral_prior() {
    let p = UsagePattern::new(Utc::now());
    assert_eq!(p.frequency, 0);
    assert_eq!(p.success_rate, 0.5);
    assert_eq!(p.difficulty_score, 0.5);
}

#[test]
fn usage_pattern_record_applies_ema() {
    let now = Utc::now();
    let mut p = UsagePattern::new(now);
    p.record("synonym", true, 1.0, now);
    assert_eq!(p.frequency, 1);
    assert!((p.success_rate - 0.55).abs() < 1e-9);
    assert!((p.difficulty_score - 0.55).abs() < 1e-9);
    assert!(p.seen_in("synonym"));

    p.record("synonym", false, 0.0, now);
    assert_eq!(p.frequency, 2);
    assert_eq!(p.test_types.len(), 1);
    assert!((p.success_rate - 0.495).abs() < 1e-9);
}

#[test]
fn usage_pattern_clamps_difficulty_input() {
    let now = Utc::now();
    let mut p = UsagePattern::new(now);
    p.record("spelling", true, 7.0, now);
    assert!((p.difficulty_score - 0.55).abs() < 1e-9);
}

proptest! {
    #[test]
    fn usage_pattern_rates_stay_in_unit_interval(
        outcomes in proptest::collection::vec((any::<bool>(), -2.0f64..3.0), 1..50)
    ) {
        let now = Utc::now();
        let mut p = UsagePattern::new(now);
        for (success, difficulty) in &outcomes {
            p.record("t", *success, *difficulty, now);
        }
        prop_assert!((0.0..=1.0).contains(&p.success_rate));
        prop_assert!((0.0..=1.0).contains(&p.difficulty_score));
        prop_assert_eq!(p.frequency, outcomes.len() as u64);
    }
}
