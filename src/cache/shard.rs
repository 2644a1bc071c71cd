//! Sharded Key Map
//!
//! String-keyed map split across `N` independently locked shards, used as the
//! backing storage of the local tier.
//!
//! # Design
//!
//! - One `RwLock` per shard; the byte weight lives under the same lock as the
//!   entries, so a replace can never leave the total out of step
//! - `N` must be a power of two so the shard index is a mask of the hash
//! - Whole-map operations (`drain_where`, `scan`) lock one shard at a time and
//!   are therefore not a consistent snapshot

use std::collections::hash_map::RandomState;
use std::collections::HashMap;
use std::hash::BuildHasher;

use parking_lot::RwLock;

/// Values that report a byte weight for size accounting
pub trait Weighted {
    fn weight(&self) -> u64;
}

struct Shard<V> {
    entries: HashMap<String, V>,
    weight: u64,
}

impl<V: Weighted> Shard<V> {
    fn take(&mut self, key: &str) -> Option<V> {
        let value = self.entries.remove(key)?;
        self.weight -= value.weight();
        Some(value)
    }
}

/// Weighted map over `N` shards
pub struct ShardedMap<V, const N: usize> {
    shards: Box<[RwLock<Shard<V>>]>,
    hasher: RandomState,
}

impl<V: Weighted, const N: usize> Default for ShardedMap<V, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Weighted, const N: usize> ShardedMap<V, N> {
    pub fn new() -> Self {
        assert!(N.is_power_of_two(), "shard count must be a power of two");
        Self {
            shards: (0..N)
                .map(|_| {
                    RwLock::new(Shard {
                        entries: HashMap::new(),
                        weight: 0,
                    })
                })
                .collect(),
            hasher: RandomState::new(),
        }
    }

    #[inline]
    fn shard(&self, key: &str) -> &RwLock<Shard<V>> {
        let index = (self.hasher.hash_one(key) as usize) & (N - 1);
        &self.shards[index]
    }

    /// Entry count across all shards
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().entries.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().entries.is_empty())
    }

    /// Summed weight of every stored value
    pub fn weight(&self) -> u64 {
        self.shards.iter().map(|s| s.read().weight).sum()
    }

    pub fn get(&self, key: &str) -> Option<V>
    where
        V: Clone,
    {
        self.shard(key).read().entries.get(key).cloned()
    }

    /// Test the stored value without cloning it
    pub fn check(&self, key: &str, predicate: impl FnOnce(&V) -> bool) -> bool {
        self.shard(key)
            .read()
            .entries
            .get(key)
            .is_some_and(predicate)
    }

    /// Insert or replace, returning the previous value
    pub fn insert(&self, key: String, value: V) -> Option<V> {
        let mut shard = self.shard(&key).write();
        shard.weight += value.weight();
        let previous = shard.entries.insert(key, value);
        if let Some(old) = &previous {
            shard.weight -= old.weight();
        }
        previous
    }

    pub fn remove(&self, key: &str) -> Option<V> {
        self.shard(key).write().take(key)
    }

    /// Remove `key` only if its current value satisfies `predicate`
    pub fn remove_if(&self, key: &str, predicate: impl FnOnce(&V) -> bool) -> Option<V> {
        let mut shard = self.shard(key).write();
        if shard.entries.get(key).is_some_and(predicate) {
            shard.take(key)
        } else {
            None
        }
    }

    /// Remove every entry matching `predicate`, returning how many went
    pub fn drain_where(&self, mut predicate: impl FnMut(&str, &V) -> bool) -> usize {
        let mut drained = 0;
        for lock in self.shards.iter() {
            let mut shard = lock.write();
            let mut freed = 0;
            shard.entries.retain(|key, value| {
                let doomed = predicate(key, value);
                if doomed {
                    freed += value.weight();
                    drained += 1;
                }
                !doomed
            });
            shard.weight -= freed;
        }
        drained
    }

    /// Collect `f(key, value)` for every entry where it returns `Some`
    pub fn scan<T>(&self, mut f: impl FnMut(&str, &V) -> Option<T>) -> Vec<T> {
        let mut out = Vec::new();
        for lock in self.shards.iter() {
            let shard = lock.read();
            out.extend(shard.entries.iter().filter_map(|(k, v)| f(k, v)));
        }
        out
    }

    pub fn clear(&self) {
        for lock in self.shards.iter() {
            let mut shard = lock.write();
            shard.entries.clear();
            shard.weight = 0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    impl Weighted for Vec<u8> {
        fn weight(&self) -> u64 {
            self.len() as u64
        }
    }

    type Map = ShardedMap<Vec<u8>, 16>;

    #[test]
    fn test_insert_get_remove() {
        let map = Map::new();

        assert!(map.insert("a".into(), vec![1, 2, 3]).is_none());
        assert_eq!(map.get("a"), Some(vec![1, 2, 3]));
        assert!(map.check("a", |v| v.len() == 3));
        assert_eq!(map.weight(), 3);

        assert_eq!(map.remove("a"), Some(vec![1, 2, 3]));
        assert!(map.is_empty());
        assert_eq!(map.weight(), 0);
    }

    #[test]
    fn test_replace_adjusts_weight() {
        let map = Map::new();

        map.insert("k".into(), vec![0; 100]);
        let old = map.insert("k".into(), vec![0; 40]);

        assert_eq!(old.map(|v| v.len()), Some(100));
        assert_eq!(map.len(), 1);
        assert_eq!(map.weight(), 40);
    }

    #[test]
    fn test_remove_if() {
        let map = Map::new();
        map.insert("k".into(), vec![0; 5]);

        assert!(map.remove_if("k", |v| v.len() > 10).is_none());
        assert!(map.remove_if("k", |v| v.len() == 5).is_some());
        assert!(map.remove_if("missing", |_| true).is_none());
    }

    #[test]
    fn test_drain_where() {
        let map = Map::new();
        for i in 0..20 {
            map.insert(format!("key-{}", i), vec![0; i]);
        }

        assert_eq!(map.drain_where(|_, v| v.len() >= 10), 10);
        assert_eq!(map.len(), 10);
        assert_eq!(map.weight(), (0..10).sum::<usize>() as u64);
    }

    #[test]
    fn test_scan() {
        let map = Map::new();
        for key in ["user:1", "user:2", "order:1"] {
            map.insert(key.into(), vec![0]);
        }

        let mut users = map.scan(|k, _| k.starts_with("user:").then(|| k.to_string()));
        users.sort();
        assert_eq!(users, vec!["user:1", "user:2"]);
    }

    #[test]
    fn test_concurrent_inserts() {
        let map = Arc::new(Map::new());
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let map = Arc::clone(&map);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        map.insert(format!("{}-{}", t, i), vec![0; 2]);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(map.len(), 800);
        assert_eq!(map.weight(), 1600);
    }
}
