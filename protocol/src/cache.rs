//! # Bounded FIFO Cache
//!
//! Thread-safe key/value cache for data fetched from outside the ledger
//! (raw transactions, RPC responses). It never feeds consensus state.
//!
//! Eviction is first-in-first-out: once full, inserting a new key drops
//! the oldest insertion. [`FifoCache::touch`] is the only way to move an
//! entry back to the newest position. Every operation holds a single
//! `parking_lot::Mutex` for its whole duration.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;

use parking_lot::Mutex;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    #[error("cache capacity must be at least 1")]
    ZeroCapacity,
}

pub type CacheResult<T> = Result<T, CacheError>;

#[derive(Debug)]
struct Inner<K, V> {
    /// key -> (insertion sequence, value)
    entries: HashMap<K, (u64, V)>,
    /// insertion sequence -> key, oldest first
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn bump(&mut self) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        seq
    }
}

/// FIFO-evicting cache with a fixed capacity.
#[derive(Debug)]
pub struct FifoCache<K, V> {
    capacity: usize,
    inner: Mutex<Inner<K, V>>,
}

impl<K: Eq + Hash + Clone, V: Clone> FifoCache<K, V> {
    /// # Errors
    ///
    /// [`CacheError::ZeroCapacity`] when `capacity` is 0.
    pub fn new(capacity: usize) -> CacheResult<Self> {
        if capacity == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        Ok(Self {
            capacity,
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.lock().entries.get(key).map(|(_, v)| v.clone())
    }

    /// Inserts or replaces `key`.
    ///
    /// Replacing keeps the entry's position. Inserting a new key into a
    /// full cache first evicts the oldest entry.
    pub fn set(&self, key: K, value: V) {
        let mut inner = self.inner.lock();
        if let Some((_, slot)) = inner.entries.get_mut(&key) {
            *slot = value;
            return;
        }
        if inner.entries.len() >= self.capacity {
            if let Some((_, oldest)) = inner.order.pop_first() {
                inner.entries.remove(&oldest);
            }
        }
        let seq = inner.bump();
        inner.order.insert(seq, key.clone());
        inner.entries.insert(key, (seq, value));
    }

    /// Removes `key`, returning its value.
    pub fn delete(&self, key: &K) -> Option<V> {
        let mut inner = self.inner.lock();
        let (seq, value) = inner.entries.remove(key)?;
        inner.order.remove(&seq);
        Some(value)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.inner.lock().entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves `key` to the newest position. Returns `false` if absent.
    pub fn touch(&self, key: &K) -> bool {
        let mut inner = self.inner.lock();
        let Some(old_seq) = inner.entries.get(key).map(|(seq, _)| *seq) else {
            return false;
        };
        let new_seq = inner.bump();
        inner.order.remove(&old_seq);
        inner.order.insert(new_seq, key.clone());
        if let Some(entry) = inner.entries.get_mut(key) {
            entry.0 = new_seq;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(FifoCache::<u8, u8>::new(0).unwrap_err(), CacheError::ZeroCapacity);
    }

    #[test]
    fn oldest_insertion_is_evicted() {
        let cache = FifoCache::new(2).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);

        assert!(!cache.contains(&"a"));
        assert!(cache.contains(&"b"));
        assert!(cache.contains(&"c"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn reads_do_not_refresh_position() {
        let cache = FifoCache::new(2).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.get(&"a"), Some(1));
        cache.set("c", 3);
        assert_eq!(cache.get(&"a"), None);
    }

    #[test]
    fn touch_moves_entry_to_newest() {
        let cache = FifoCache::new(2).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.touch(&"a"));
        cache.set("c", 3);

        assert!(cache.contains(&"a"));
        assert!(!cache.contains(&"b"));
        assert!(!cache.touch(&"b"));
    }

    #[test]
    fn replacing_a_key_neither_evicts_nor_moves_it() {
        let cache = FifoCache::new(2).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.get(&"a"), Some(10));

        cache.set("c", 3);
        assert!(!cache.contains(&"a"));
        assert!(cache.contains(&"b"));
    }

    #[test]
    fn delete_frees_a_slot() {
        let cache = FifoCache::new(2).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.delete(&"a"), Some(1));
        assert_eq!(cache.delete(&"a"), None);
        cache.set("c", 3);
        assert!(cache.contains(&"b"));
        assert!(cache.contains(&"c"));
    }

    #[test]
    fn concurrent_writers_respect_capacity() {
        let cache = Arc::new(FifoCache::new(64).unwrap());
        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..1_000u64 {
                        cache.set(t * 10_000 + i, i);
                        cache.get(&(t * 10_000 + i / 2));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cache.len(), 64);
    }
}
