//! LRU + TTL entry store.
//!
//! A hash map owns the entries. Two ordered indices track recency
//! (`last_access_at`, then `access_count`, then insertion sequence) and
//! creation time, so evicting the LRU entry or sweeping expired ones costs
//! O(log n) per removed entry.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use lexis_core::{CacheEntry, CacheKey, Provenance, ProvenanceCounts};

/// Position of an entry in LRU order. Smallest = least recently used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct RecencyKey {
    last_access: DateTime<Utc>,
    access_count: u64,
    seq: u64,
}

/// Position of an entry in creation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct CreationKey {
    created_at: DateTime<Utc>,
    seq: u64,
}

#[derive(Debug, Clone)]
struct Slot {
    entry: CacheEntry,
    seq: u64,
}

impl Slot {
    fn recency(&self) -> RecencyKey {
        RecencyKey {
            last_access: self.entry.last_access_at,
            access_count: self.entry.access_count,
            seq: self.seq,
        }
    }

    fn creation(&self) -> CreationKey {
        CreationKey {
            created_at: self.entry.created_at,
            seq: self.seq,
        }
    }
}

/// Result of a lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Hit {
        vector: Vec<f32>,
        provenance: Provenance,
        /// First real hit on a predictive entry.
        confirmed_prediction: bool,
    },
    /// The entry existed but had outlived its TTL; it has been removed.
    Expired,
    Miss,
}

/// What an insertion did besides storing the entry.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsertOutcome {
    pub replaced: bool,
    pub expired: usize,
    pub evicted: usize,
}

/// Entry store enforcing a capacity bound (LRU) and an absolute age bound (TTL).
#[derive(Debug)]
pub struct EntryStore {
    slots: HashMap<CacheKey, Slot>,
    recency: BTreeMap<RecencyKey, CacheKey>,
    creation: BTreeMap<CreationKey, CacheKey>,
    next_seq: u64,
    max_size: usize,
    ttl_secs: f64,
}

impl EntryStore {
    /// `max_size` of 0 is raised to 1. `ttl_secs <= 0` disables expiry.
    pub fn new(max_size: usize, ttl_secs: f64) -> Self {
        Self {
            slots: HashMap::new(),
            recency: BTreeMap::new(),
            creation: BTreeMap::new(),
            next_seq: 0,
            max_size: max_size.max(1),
            ttl_secs: if ttl_secs.is_finite() { ttl_secs.max(0.0) } else { 0.0 },
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max_size
    }

    pub fn ttl_secs(&self) -> f64 {
        self.ttl_secs
    }

    /// Read-only access. No recency update, no expiry check.
    pub fn peek(&self, key: &CacheKey) -> Option<&CacheEntry> {
        self.slots.get(key).map(|slot| &slot.entry)
    }

    /// Present and not expired. Does not touch recency.
    pub fn contains_live(&self, key: &CacheKey, now: DateTime<Utc>) -> bool {
        self.slots
            .get(key)
            .is_some_and(|slot| !slot.entry.is_expired(self.ttl_secs, now))
    }

    /// Look an entry up, moving it to the MRU position on a hit.
    /// An expired entry is removed and reported as [`Lookup::Expired`].
    pub fn lookup(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Lookup {
        let Some(slot) = self.slots.get_mut(key) else {
            return Lookup::Miss;
        };

        if slot.entry.is_expired(self.ttl_secs, now) {
            self.remove(key);
            return Lookup::Expired;
        }

        self.recency.remove(&slot.recency());
        let confirmed_prediction = slot.entry.touch(now);
        self.recency.insert(slot.recency(), key.clone());

        Lookup::Hit {
            vector: slot.entry.vector.clone(),
            provenance: slot.entry.provenance,
            confirmed_prediction,
        }
    }

    /// Insert or replace an entry.
    ///
    /// Expired entries are swept first. A new key evicts LRU entries until
    /// there is room; replacing an existing key never evicts.
    pub fn insert(&mut self, entry: CacheEntry, now: DateTime<Utc>) -> InsertOutcome {
        let mut outcome = InsertOutcome {
            expired: self.sweep_expired(now),
            ..Default::default()
        };

        if self.remove(&entry.key).is_some() {
            outcome.replaced = true;
        } else {
            while self.slots.len() >= self.max_size {
                if self.evict_lru().is_none() {
                    break;
                }
                outcome.evicted += 1;
            }
        }

        let slot = Slot {
            seq: self.next_seq,
            entry,
        };
        self.next_seq += 1;
        self.recency.insert(slot.recency(), slot.entry.key.clone());
        self.creation.insert(slot.creation(), slot.entry.key.clone());
        self.slots.insert(slot.entry.key.clone(), slot);
        outcome
    }

    /// Remove every expired entry. Returns how many were removed.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> usize {
        if self.ttl_secs <= 0.0 {
            return 0;
        }
        let mut removed = 0;
        // Expiry depends only on `created_at`, so expired entries form a
        // prefix of the creation index.
        while let Some((_, key)) = self.creation.first_key_value() {
            let expired = self
                .slots
                .get(key)
                .is_some_and(|slot| slot.entry.is_expired(self.ttl_secs, now));
            if !expired {
                break;
            }
            let key = key.clone();
            self.remove(&key);
            removed += 1;
        }
        removed
    }

    /// Evict the least recently used entry.
    pub fn evict_lru(&mut self) -> Option<CacheEntry> {
        let key = self.recency.first_key_value().map(|(_, key)| key.clone())?;
        self.remove(&key)
    }

    /// Change the capacity, evicting LRU entries until the store fits.
    /// Returns the number of evicted entries.
    pub fn resize(&mut self, max_size: usize) -> usize {
        self.max_size = max_size.max(1);
        let mut evicted = 0;
        while self.slots.len() > self.max_size {
            if self.evict_lru().is_none() {
                break;
            }
            evicted += 1;
        }
        evicted
    }

    /// Remove all entries. Returns how many there were.
    pub fn clear(&mut self) -> usize {
        let count = self.slots.len();
        self.slots.clear();
        self.recency.clear();
        self.creation.clear();
        count
    }

    pub fn remove(&mut self, key: &CacheKey) -> Option<CacheEntry> {
        let slot = self.slots.remove(key)?;
        self.recency.remove(&slot.recency());
        self.creation.remove(&slot.creation());
        Some(slot.entry)
    }

    /// All entries from least to most recently used.
    pub fn entries_lru_order(&self) -> Vec<CacheEntry> {
        self.recency
            .values()
            .filter_map(|key| self.slots.get(key))
            .map(|slot| slot.entry.clone())
            .collect()
    }

    pub fn provenance_counts(&self) -> ProvenanceCounts {
        let mut counts = ProvenanceCounts::default();
        for slot in self.slots.values() {
            counts.add(slot.entry.provenance);
        }
        counts
    }

    pub fn memory_bytes(&self) -> usize {
        self.slots.values().map(|slot| slot.entry.memory_bytes()).sum()
    }

    /// Index consistency, checked by tests.
    pub fn is_consistent(&self) -> bool {
        self.slots.len() == self.recency.len()
            && self.slots.len() == self.creation.len()
            && self.slots.len() <= self.max_size
            && self
                .slots
                .iter()
                .all(|(key, slot)| self.recency.get(&slot.recency()) == Some(key))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn t(secs: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 8, 0, 0).unwrap() + Duration::seconds(secs)
    }

    fn entry(name: &str, at: DateTime<Utc>) -> CacheEntry {
        CacheEntry::new(CacheKey::new(name), vec![1.0, 2.0], Provenance::User, at)
    }

    fn key(name: &str) -> CacheKey {
        CacheKey::new(name)
    }

    #[test]
    fn get_promotes_to_mru() {
        let mut store = EntryStore::new(2, 0.0);
        store.insert(entry("a", t(0)), t(0));
        store.insert(entry("b", t(1)), t(1));
        assert!(matches!(store.lookup(&key("a"), t(2)), Lookup::Hit { .. }));

        let outcome = store.insert(entry("c", t(3)), t(3));
        assert_eq!(outcome.evicted, 1);
        assert!(store.peek(&key("a")).is_some());
        assert!(store.peek(&key("b")).is_none());
        assert!(store.peek(&key("c")).is_some());
        assert!(store.is_consistent());
    }

    #[test]
    fn ties_on_access_time_break_by_count_then_insertion() {
        let mut store = EntryStore::new(3, 0.0);
        store.insert(entry("a", t(0)), t(0));
        store.insert(entry("b", t(0)), t(0));
        store.insert(entry("c", t(0)), t(0));
        // Same timestamp, but "a" now has a higher access count.
        store.lookup(&key("a"), t(0));
        store.insert(entry("d", t(0)), t(0));
        assert!(store.peek(&key("b")).is_none());
        assert!(store.peek(&key("a")).is_some());
    }

    #[test]
    fn overwrite_never_evicts() {
        let mut store = EntryStore::new(2, 0.0);
        store.insert(entry("a", t(0)), t(0));
        store.insert(entry("b", t(1)), t(1));
        let outcome = store.insert(entry("a", t(2)), t(2));
        assert!(outcome.replaced);
        assert_eq!(outcome.evicted, 0);
        assert_eq!(store.len(), 2);
        assert!(store.is_consistent());
    }

    #[test]
    fn zero_capacity_is_raised_to_one() {
        let mut store = EntryStore::new(0, 0.0);
        assert_eq!(store.capacity(), 1);
        store.insert(entry("a", t(0)), t(0));
        store.insert(entry("b", t(1)), t(1));
        assert_eq!(store.len(), 1);
        assert!(store.peek(&key("b")).is_some());
    }

    #[test]
    fn expired_lookup_removes_entry() {
        let mut store = EntryStore::new(10, 5.0);
        store.insert(entry("a", t(0)), t(0));
        assert_eq!(store.lookup(&key("a"), t(6)), Lookup::Expired);
        assert!(store.is_empty());
        assert_eq!(store.lookup(&key("a"), t(6)), Lookup::Miss);
    }

    #[test]
    fn hits_do_not_extend_ttl() {
        let mut store = EntryStore::new(10, 5.0);
        store.insert(entry("a", t(0)), t(0));
        assert!(matches!(store.lookup(&key("a"), t(4)), Lookup::Hit { .. }));
        assert_eq!(store.lookup(&key("a"), t(6)), Lookup::Expired);
    }

    #[test]
    fn insert_sweeps_expired_first() {
        let mut store = EntryStore::new(2, 5.0);
        store.insert(entry("a", t(0)), t(0));
        store.insert(entry("b", t(4)), t(4));
        let outcome = store.insert(entry("c", t(7)), t(7));
        assert_eq!(outcome.expired, 1);
        assert_eq!(outcome.evicted, 0);
        assert!(store.peek(&key("b")).is_some());
    }

    #[test]
    fn sweep_stops_at_first_live_entry() {
        let mut store = EntryStore::new(10, 10.0);
        for i in 0..5 {
            store.insert(entry(&format!("k{i}"), t(i * 5)), t(i * 5));
        }
        // Ages at t=22: 22, 17, 12, 7, 2.
        assert_eq!(store.sweep_expired(t(22)), 3);
        assert_eq!(store.len(), 2);
        assert!(store.is_consistent());
    }

    #[test]
    fn contains_live_ignores_expired_and_keeps_order() {
        let mut store = EntryStore::new(10, 5.0);
        store.insert(entry("a", t(0)), t(0));
        assert!(store.contains_live(&key("a"), t(3)));
        assert!(!store.contains_live(&key("a"), t(6)));
        assert_eq!(store.peek(&key("a")).map(|e| e.access_count), Some(1));
    }

    #[test]
    fn resize_smaller_evicts_lru() {
        let mut store = EntryStore::new(4, 0.0);
        for i in 0..4 {
            store.insert(entry(&format!("k{i}"), t(i)), t(i));
        }
        assert_eq!(store.resize(2), 2);
        assert!(store.peek(&key("k0")).is_none());
        assert!(store.peek(&key("k1")).is_none());
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn entries_lru_order_is_oldest_first() {
        let mut store = EntryStore::new(4, 0.0);
        store.insert(entry("a", t(0)), t(0));
        store.insert(entry("b", t(1)), t(1));
        store.lookup(&key("a"), t(2));
        let order: Vec<_> = store
            .entries_lru_order()
            .into_iter()
            .map(|e| e.key.as_str().to_string())
            .collect();
        assert_eq!(order, vec!["b", "a"]);
    }

    #[test]
    fn clear_empties_every_index() {
        let mut store = EntryStore::new(4, 0.0);
        store.insert(entry("a", t(0)), t(0));
        assert_eq!(store.clear(), 1);
        assert!(store.is_empty());
        assert!(store.is_consistent());
        assert!(store.evict_lru().is_none());
    }
}
