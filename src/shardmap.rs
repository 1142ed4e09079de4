use crate::{Shards, UpdateAction};
use std::borrow::Borrow;
use std::hash::Hash;
use std::mem;
use std::sync::OnceLock;

/// A thread-safe hashmap whose operations combine a read and a conditional
/// write into a single atomic step.
pub struct ShardMap<K, V> {
    map: Shards<K, V>,
}

impl<K: Eq + Hash, V> Default for ShardMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Returns the default number of shards to use for the `ShardMap`.
fn default_shard_amount() -> usize {
    static DEFAULT_SHARD_AMOUNT: OnceLock<usize> = OnceLock::new();
    *DEFAULT_SHARD_AMOUNT.get_or_init(|| {
        (std::thread::available_parallelism().map_or(1, usize::from) * 4).next_power_of_two()
    })
}

/// The main thread-safe map type providing atomic compound operations per key.
impl<K: Eq + Hash, V> ShardMap<K, V> {
    /// Creates an empty `ShardMap` with the default number of shards.
    ///
    /// # Returns
    ///
    /// A new `ShardMap` instance.
    pub fn new() -> Self {
        Self {
            map: Shards::with_capacity_and_shard_amount(0, default_shard_amount()),
        }
    }

    /// Creates an empty `ShardMap` with the specified initial capacity and the default number of shards.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The initial capacity of the hashmap.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            map: Shards::with_capacity_and_shard_amount(capacity, default_shard_amount()),
        }
    }

    /// Creates an empty `ShardMap` with the specified initial capacity and number of shards.
    ///
    /// # Arguments
    ///
    /// * `capacity` - The initial capacity of the hashmap.
    /// * `shard_amount` - The number of shards to create.
    pub fn with_capacity_and_shard_amount(capacity: usize, shard_amount: usize) -> Self {
        Self {
            map: Shards::with_capacity_and_shard_amount(capacity, shard_amount),
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// The count is summed shard by shard, so under concurrent mutation it is
    /// only a point-in-time approximation.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the value stored in the map for a key.
    ///
    /// Absence is reported as `None`, never as a sentinel value: a stored
    /// default value and a missing entry are distinct outcomes.
    ///
    /// # Examples
    /// ```
    /// use shardmap::ShardMap;
    ///
    /// let map = ShardMap::<String, u32>::new();
    /// map.store("key".into(), 42);
    /// assert_eq!(map.load("key"), Some(42));
    /// assert_eq!(map.load("missing"), None);
    /// ```
    pub fn load<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        V: Clone,
        Q: Eq + Hash + ?Sized,
    {
        self.map.read(key, |value| value.cloned())
    }

    /// Sets the value for a key, inserting or overwriting unconditionally.
    ///
    /// The new value is visible to subsequent loads from any thread.
    ///
    /// # Examples
    /// ```
    /// use shardmap::ShardMap;
    ///
    /// let map = ShardMap::<String, u32>::new();
    /// map.store("key".into(), 42);
    /// map.store("key".into(), 123);
    /// assert_eq!(map.load("key"), Some(123));
    /// ```
    pub fn store(&self, key: K, value: V) {
        self.map.update(key, |_| (UpdateAction::Replace(value), ()));
    }

    /// Deletes the value for a key. Deleting an absent key is a no-op.
    pub fn delete<Q>(&self, key: &Q)
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.take(key, |_| true);
    }

    /// Deletes the value for a key, returning the previous value if any.
    ///
    /// The read and the removal happen as one atomic step: no other thread
    /// can write the key between them.
    ///
    /// # Examples
    /// ```
    /// use shardmap::ShardMap;
    ///
    /// let map = ShardMap::<String, u32>::new();
    /// map.store("key".into(), 42);
    /// assert_eq!(map.load_and_delete("key"), Some(42));
    /// assert_eq!(map.load_and_delete("key"), None);
    /// ```
    pub fn load_and_delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.map.take(key, |_| true)
    }

    /// Returns the existing value for the key if present. Otherwise, it
    /// stores and returns the given value.
    ///
    /// The boolean is `true` if the value was loaded, `false` if it was
    /// stored. Of any number of concurrent callers for the same absent key,
    /// exactly one stores its value and observes `false`; the others observe
    /// the winner's value with `true`.
    ///
    /// # Examples
    /// ```
    /// use shardmap::ShardMap;
    ///
    /// let map = ShardMap::<String, u32>::new();
    /// assert_eq!(map.load_or_store("key".into(), 1), (1, false));
    /// assert_eq!(map.load_or_store("key".into(), 2), (1, true));
    /// assert_eq!(map.load("key"), Some(1));
    /// ```
    pub fn load_or_store(&self, key: K, value: V) -> (V, bool)
    where
        V: Clone,
    {
        self.map.update(key, |current| match current {
            Some(v) => (UpdateAction::Keep, (v.clone(), true)),
            None => (UpdateAction::Replace(value.clone()), (value, false)),
        })
    }

    /// Swaps the value for a key and returns the previous value if any.
    ///
    /// The entry is created when the key was absent, in which case `None` is
    /// returned.
    ///
    /// # Examples
    /// ```
    /// use shardmap::ShardMap;
    ///
    /// let map = ShardMap::<String, u32>::new();
    /// assert_eq!(map.swap("key".into(), 1), None);
    /// assert_eq!(map.swap("key".into(), 2), Some(1));
    /// ```
    pub fn swap(&self, key: K, value: V) -> Option<V> {
        self.map.update(key, |current| match current {
            Some(v) => (UpdateAction::Keep, Some(mem::replace(v, value))),
            None => (UpdateAction::Replace(value), None),
        })
    }

    /// Swaps the old and new values for a key if the value stored in the map
    /// is equal to `old`.
    ///
    /// Returns whether the swap occurred. On failure the map is unchanged.
    ///
    /// # Examples
    /// ```
    /// use shardmap::ShardMap;
    ///
    /// let map = ShardMap::<String, u32>::new();
    /// map.store("key".into(), 1);
    /// assert!(map.compare_and_swap("key", &1, 2));
    /// assert!(!map.compare_and_swap("key", &1, 3));
    /// assert_eq!(map.load("key"), Some(2));
    /// ```
    pub fn compare_and_swap<Q>(&self, key: &Q, old: &V, new: V) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: PartialEq,
    {
        self.map.modify(key, |current| match current {
            Some(value) if *value == *old => {
                *value = new;
                true
            }
            _ => false,
        })
    }

    /// Deletes the entry for a key if its value is equal to `old`.
    ///
    /// If there is no current value for the key, `compare_and_delete` returns
    /// `false` even when `old` equals the value's default. Absence never
    /// matches.
    ///
    /// # Examples
    /// ```
    /// use shardmap::ShardMap;
    ///
    /// let map = ShardMap::<String, u32>::new();
    /// map.store("key".into(), 1);
    /// assert!(!map.compare_and_delete("key", &2));
    /// assert!(map.compare_and_delete("key", &1));
    /// assert!(!map.compare_and_delete("key", &1));
    /// ```
    pub fn compare_and_delete<Q>(&self, key: &Q, old: &V) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
        V: PartialEq,
    {
        self.map.take(key, |value| value == old).is_some()
    }

    /// Calls `func` for each key and value present in the map until `func`
    /// returns `false`.
    ///
    /// `range` does not correspond to any consistent snapshot of the map's
    /// contents: no key is visited more than once, but if the value for any
    /// key is stored or deleted concurrently (including by `func`), `range`
    /// may reflect any mapping for that key from any point during the call,
    /// skip a key inserted mid-iteration, or visit a key deleted
    /// mid-iteration. No lock is held while `func` runs, so `range` does not
    /// block other operations and `func` may call any method on the map.
    ///
    /// The cost may be proportional to the size of the map even if `func`
    /// returns `false` after a constant number of calls.
    ///
    /// # Examples
    /// ```
    /// use shardmap::ShardMap;
    ///
    /// let map = ShardMap::<u32, u32>::new();
    /// map.store(1, 10);
    /// map.store(2, 20);
    ///
    /// let mut sum = 0;
    /// map.range(|_, &value| {
    ///     sum += value;
    ///     true
    /// });
    /// assert_eq!(sum, 30);
    /// ```
    pub fn range<F>(&self, func: F)
    where
        K: Clone,
        V: Clone,
        F: FnMut(&K, &V) -> bool,
    {
        self.map.scan(func);
    }
}
