//! A thread-safe hashmap implementation providing atomic compound operations at the key level.
//!
//! # Overview
//! `shardmap` provides a concurrent hashmap whose read-then-write operations execute as a single
//! atomic step. It uses internal sharding for better performance under high concurrency.
//!
//! # Features
//! - Thread-safe access without external locking
//! - Atomic compound operations: `load_or_store`, `swap`, `compare_and_swap`, `compare_and_delete`
//! - Efficient concurrent operations through sharding
//! - Weakly consistent iteration that never holds a lock while visiting
//! - No poisoning, the lock is released normally on panic
//!
//! # Examples
//! ```
//! use shardmap::ShardMap;
//!
//! let map = ShardMap::<String, u32>::new();
//!
//! // Basic operations
//! map.store("key1".into(), 42);
//! assert_eq!(map.load("key1"), Some(42));
//!
//! // Atomic compound operations
//! let (value, loaded) = map.load_or_store("key2".into(), 7);
//! assert_eq!((value, loaded), (7, false));
//! assert!(map.compare_and_swap("key2", &7, 8));
//!
//! // Remove a value
//! assert_eq!(map.load_and_delete("key1"), Some(42));
//! assert_eq!(map.load("key1"), None);
//! ```
mod futex;
mod shard;
#[doc = include_str!("../README.md")]
mod shardmap;

use futex::*;
use shard::*;
pub use shardmap::*;
