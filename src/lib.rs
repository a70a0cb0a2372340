//! # `collectx`
//!
//! Concurrent ordered sets/maps and an unbounded lock-free MPMC queue.
//!
//! This crate provides two independent building blocks:
//! - **Skip set / skip map**: an ordered container with per-node locking for
//!   writers and lock-free readers (optimistic lazy skip list)
//! - **LSCQ**: an unbounded FIFO queue made of chained SCQ ring segments, each
//!   driven by 128-bit compare-and-swap on packed `(flags, data)` slots
//!
//! ## Status
//!
//! | Feature | Status |
//! |---------|--------|
//! | Concurrent add/remove/contains | Works (locked writers, lock-free readers) |
//! | Map store/load/load-or-store/delete | Works |
//! | Ordered range | Works (lock-free, level 0) |
//! | Bounded SCQ | Works |
//! | Unbounded LSCQ | Works (segments pooled and reused) |
//! | Memory reclamation | `seize` (hyaline) for nodes, values, and segments |
//!
//! ## Thread Safety
//!
//! Every container is `Send + Sync` when its element types are. Each public
//! operation enters a `seize` guard internally; the `*_with_guard` variants
//! let callers amortize that cost over many operations:
//!
//! ```rust
//! use collectx::Int64Map;
//!
//! let map: Int64Map<u64> = Int64Map::new();
//! let guard = map.guard();
//!
//! map.store_with_guard(7, 42, &guard);
//! assert_eq!(map.load_with_guard(&7, &guard).as_deref(), Some(&42));
//! ```
//!
//! ## Queue
//!
//! ```rust
//! use collectx::Uint64Queue;
//!
//! let queue = Uint64Queue::new();
//! queue.enqueue(1);
//! queue.enqueue(2);
//!
//! assert_eq!(queue.dequeue(), Some(1));
//! assert_eq!(queue.dequeue(), Some(2));
//! assert_eq!(queue.dequeue(), None);
//! ```

#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::inline_always)]

#[macro_use]
mod tracing_helpers;

pub mod compare;
pub mod config;
pub mod flags;
pub mod level;
pub mod map;
pub mod optional_array;
pub mod ordering;
pub mod queue;
pub mod set;
mod skiplist;
pub mod stats;

// Re-export main types for convenience
pub use compare::{Ascending, Comparator, Descending, HashOrder, Reversed};
pub use config::{ConfigError, QueueConfig};
pub use level::LevelConfig;
pub use map::{Int64Map, Int64MapDesc, SkipMap, StringMap, StringMapDesc};
pub use queue::{BoundedQueue, LinkedQueue, Payload, PointerQueue, Uint64Queue};
pub use set::{Int64Set, Int64SetDesc, SkipSet, StringSet, StringSetDesc, Uint64Set};
pub use stats::{DebugCounters, get_debug_counters, reset_debug_counters};
