//! Lock-free MPMC FIFO queues built on SCQ rings.
//!
//! - [`BoundedQueue`]: one ring, fixed capacity, `enqueue` reports full.
//! - [`LinkedQueue`]: LSCQ, a chain of rings that grows on demand and
//!   recycles drained segments.
//!
//! Elements travel as one 64-bit word (see [`Payload`]) so that a slot's
//! flags and data change in a single 128-bit CAS.
//!
//! Both queues are non-blocking: `dequeue` returns `None` when the queue
//! looks empty and never waits for a producer.
//!
//! # Example
//!
//! ```rust
//! use collectx::{PointerQueue, QueueConfig};
//!
//! let queue: PointerQueue<String> =
//!     PointerQueue::with_config(QueueConfig::default().segment_capacity(4)).unwrap();
//!
//! for i in 0..10 {
//!     queue.enqueue(Box::new(format!("job-{i}")));
//! }
//! assert_eq!(queue.dequeue().as_deref().map(String::as_str), Some("job-0"));
//! ```

mod bounded;
mod linked;
mod payload;
mod pool;
mod ring;
mod slot;



pub use bounded::BoundedQueue;
pub use linked::LinkedQueue;
pub use payload::Payload;

/// Unbounded queue of `u64`.
pub type Uint64Queue = LinkedQueue<u64>;

/// Unbounded queue of boxed values.
pub type PointerQueue<T> = LinkedQueue<Box<T>>;
