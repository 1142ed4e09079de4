use crate::Mutex;
use foldhash::fast::{FixedState, RandomState};
use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::{BuildHasher, Hash};

/// Represents the action to be taken on a value in a `Shard`.
pub enum UpdateAction<V> {
    /// Keep the current value unchanged.
    Keep,
    /// Replace the value with the provided new value, inserting if absent.
    Replace(V),
}

/// A single shard: a hashmap protected by a futex-based mutex.
///
/// Every method acquires the shard lock once and performs its whole
/// read-decide-write sequence under it.
pub struct Shard<K, V> {
    table: Mutex<HashMap<K, V, RandomState>>,
}

impl<K, V> Shard<K, V>
where
    K: Eq + Hash,
{
    /// Creates a new `Shard` with the specified initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            table: Mutex::new(HashMap::with_capacity_and_hasher(
                capacity,
                RandomState::default(),
            )),
        }
    }

    pub fn len(&self) -> usize {
        self.table.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.lock().is_empty()
    }

    /// Applies `func` to a shared view of the value associated with `key`.
    pub fn read<Q, F, R>(&self, key: &Q, func: F) -> R
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(Option<&V>) -> R,
    {
        let table = self.table.lock();
        func(table.get(key))
    }

    /// Applies `func` to the value associated with `key`, mutating it in
    /// place. Never inserts or removes an entry.
    pub fn modify<Q, F, R>(&self, key: &Q, func: F) -> R
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(Option<&mut V>) -> R,
    {
        let mut table = self.table.lock();
        func(table.get_mut(key))
    }

    /// Updates the value associated with the given key using the provided function.
    ///
    /// # Arguments
    ///
    /// * `key` - The key to update.
    /// * `func` - A function that takes an `Option<&mut V>` and returns a tuple containing the action to take and the result.
    ///
    /// # Returns
    ///
    /// The result returned by the provided function.
    pub fn update<F, R>(&self, key: K, func: F) -> R
    where
        F: FnOnce(Option<&mut V>) -> (UpdateAction<V>, R),
    {
        let mut table = self.table.lock();
        match table.get_mut(&key) {
            Some(value) => {
                let (action, ret) = func(Some(value));
                match action {
                    UpdateAction::Keep => {}
                    UpdateAction::Replace(v) => {
                        *value = v;
                    }
                }
                ret
            }
            None => {
                let (action, ret) = func(None);
                match action {
                    UpdateAction::Keep => {}
                    UpdateAction::Replace(value) => {
                        table.insert(key, value);
                    }
                }
                ret
            }
        }
    }

    /// Removes the entry for `key` if `pred` accepts its current value,
    /// returning the removed value.
    ///
    /// The predicate is only consulted when an entry exists; an absent key
    /// returns `None` without calling it.
    pub fn take<Q, F>(&self, key: &Q, pred: F) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(&V) -> bool,
    {
        let mut table = self.table.lock();
        if table.get(key).is_some_and(pred) {
            table.remove(key)
        } else {
            None
        }
    }

    /// Clones the shard's entries under the lock.
    pub fn snapshot(&self) -> Vec<(K, V)>
    where
        K: Clone,
        V: Clone,
    {
        let table = self.table.lock();
        table
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

/// A collection of `Shard` instances, routing each key to one shard by hash.
pub struct Shards<K, V> {
    /// The vector of `Shard` instances.
    shards: Vec<Shard<K, V>>,
}

impl<K, V> Shards<K, V>
where
    K: Eq + Hash,
{
    /// Creates a new `Shards` with the specified total capacity and number of shards.
    pub fn with_capacity_and_shard_amount(capacity: usize, shard_amount: usize) -> Self {
        let shard_capacity = capacity / shard_amount;
        Self {
            shards: (0..shard_amount)
                .map(|_| Shard::with_capacity(shard_capacity))
                .collect::<Vec<_>>(),
        }
    }

    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.is_empty())
    }

    pub fn read<Q, F, R>(&self, key: &Q, func: F) -> R
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(Option<&V>) -> R,
    {
        self.shard(key).read(key, func)
    }

    pub fn modify<Q, F, R>(&self, key: &Q, func: F) -> R
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(Option<&mut V>) -> R,
    {
        self.shard(key).modify(key, func)
    }

    pub fn update<F, R>(&self, key: K, func: F) -> R
    where
        F: FnOnce(Option<&mut V>) -> (UpdateAction<V>, R),
    {
        self.shard(&key).update(key, func)
    }

    pub fn take<Q, F>(&self, key: &Q, pred: F) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        F: FnOnce(&V) -> bool,
    {
        self.shard(key).take(key, pred)
    }

    /// Visits a clone of every entry, one shard at a time, until `func`
    /// returns `false`.
    ///
    /// No lock is held while `func` runs, so `func` may call back into the
    /// map. Entries added to a shard after it has been snapshotted are not
    /// visited.
    pub fn scan<F>(&self, mut func: F)
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        for shard in &self.shards {
            for (key, value) in shard.snapshot() {
                if !func(&key, &value) {
                    return;
                }
            }
        }
    }

    #[inline(always)]
    fn shard<Q>(&self, key: &Q) -> &Shard<K, V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let idx = FixedState::default().hash_one(key) as usize % self.shards.len();
        &self.shards[idx]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    use super::*;

    #[test]
    fn test_shards() {
        let shards = Shards::<u32, u32>::with_capacity_and_shard_amount(256, 16);
        assert!(shards.is_empty());
        assert_eq!(shards.len(), 0);
        shards.update(1, |v| {
            assert_eq!(v, None);
            (UpdateAction::Replace(1), ())
        });
        assert!(!shards.is_empty());
        assert_eq!(shards.len(), 1);
        shards.update(2, |v| {
            assert_eq!(v, None);
            (UpdateAction::Keep, ())
        });
        assert_eq!(shards.take(&3, |_| true), None);
        assert!(!shards.is_empty());
        assert_eq!(shards.len(), 1);
        shards.update(1, |v| {
            assert_eq!(v.cloned(), Some(1));
            (UpdateAction::Replace(2), ())
        });
        shards.update(1, |v| {
            assert_eq!(v.cloned(), Some(2));
            (UpdateAction::Keep, ())
        });
        assert_eq!(shards.take(&1, |v| *v == 1), None);
        assert_eq!(shards.take(&1, |v| *v == 2), Some(2));
        assert!(shards.is_empty());
        assert_eq!(shards.len(), 0);
        assert_eq!(shards.take(&1, |_| true), None);
        assert!(shards.is_empty());
        assert_eq!(shards.len(), 0);
    }

    #[test]
    fn test_shards_read_modify() {
        let shards = Shards::<String, String>::with_capacity_and_shard_amount(256, 16);
        shards.read("hello", |v| assert_eq!(v, None));
        shards.modify("hello", |v| assert_eq!(v, None));
        shards.update("hello".to_string(), |v| {
            assert_eq!(v, None);
            (UpdateAction::Replace("world".to_string()), ())
        });
        shards.read("hello", |v| assert_eq!(v.unwrap(), "world"));
        shards.modify("hello", |v| {
            let v = v.unwrap();
            assert_eq!(*v, "world");
            *v = "shardmap".to_string();
        });
        shards.read("hello", |v| assert_eq!(v.unwrap(), "shardmap"));
        assert_eq!(shards.take("hello", |_| true), Some("shardmap".to_string()));
        shards.read("hello", |v| assert_eq!(v, None));
    }

    #[test]
    fn test_shards_concurrent() {
        let shards = Arc::new(Shards::<u32, usize>::with_capacity_and_shard_amount(
            256, 16,
        ));
        let current = Arc::new(AtomicU32::default());
        const N: usize = 1 << 12;
        const M: usize = 8;

        shards.update(1, |_| (UpdateAction::Replace(0), ()));

        let threads = (0..M)
            .map(|_| {
                let shards = shards.clone();
                let current = current.clone();
                std::thread::spawn(move || {
                    for _ in 0..N {
                        shards.update(1, |v| {
                            let now = current.fetch_add(1, Ordering::AcqRel);
                            assert_eq!(now, 0);
                            *v.unwrap() += 1;
                            let now = current.fetch_sub(1, Ordering::AcqRel);
                            assert_eq!(now, 1);
                            (UpdateAction::Keep, ())
                        });
                    }
                })
            })
            .collect::<Vec<_>>();
        threads.into_iter().for_each(|t| t.join().unwrap());

        assert_eq!(
            shards.update(1, |v| (UpdateAction::Replace(0), *v.unwrap())),
            N * M
        );
    }

    #[test]
    fn test_shards_scan() {
        let shards = Shards::<u32, u32>::with_capacity_and_shard_amount(256, 16);
        for i in 0..100 {
            shards.update(i, |_| (UpdateAction::Replace(i * 2), ()));
        }

        let mut seen = Vec::new();
        shards.scan(|&k, &v| {
            assert_eq!(v, k * 2);
            seen.push(k);
            true
        });
        seen.sort_unstable();
        assert_eq!(seen, (0..100).collect::<Vec<_>>());

        let mut visited = 0;
        shards.scan(|_, _| {
            visited += 1;
            false
        });
        assert_eq!(visited, 1);
    }
}
