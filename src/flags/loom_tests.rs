//! Loom tests for the node flag publication protocol.
//!
//! Run with: `RUSTFLAGS="--cfg loom" cargo test --lib flags::loom_tests`
//!
//! NOTE: Loom tests use loom's own atomic types, so we model a node with a
//! loom `AtomicU32` flag word, a loom `Mutex`, and a payload cell.

use loom::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use loom::sync::{Arc, Mutex};
use loom::thread;

const FULLY_LINKED: u32 = 1 << 0;
const MARKED: u32 = 1 << 1;
const LIFECYCLE_MASK: u32 = FULLY_LINKED | MARKED;

/// Simplified node: payload written before the flag is published.
struct LoomNode {
    payload: AtomicU64,
    flags: AtomicU32,
    lock: Mutex<()>,
}

impl LoomNode {
    fn new() -> Self {
        Self {
            payload: AtomicU64::new(0),
            flags: AtomicU32::new(0),
            lock: Mutex::new(()),
        }
    }

    fn is_live(&self) -> bool {
        (self.flags.load(Ordering::Acquire) & LIFECYCLE_MASK) == FULLY_LINKED
    }

    /// Mark under the node lock; returns true for the single winner.
    fn try_mark(&self) -> bool {
        let _guard = self.lock.lock().unwrap();
        if self.flags.load(Ordering::Acquire) & MARKED != 0 {
            return false;
        }
        self.flags.fetch_or(MARKED, Ordering::Release);
        true
    }
}

/// A reader that sees `FULLY_LINKED` must also see the payload.
#[test]
fn test_loom_link_publishes_payload() {
    loom::model(|| {
        let node = Arc::new(LoomNode::new());

        let writer = Arc::clone(&node);
        let t1 = thread::spawn(move || {
            writer.payload.store(42, Ordering::Relaxed);
            writer.flags.fetch_or(FULLY_LINKED, Ordering::Release);
        });

        let reader = Arc::clone(&node);
        let t2 = thread::spawn(move || {
            if reader.is_live() {
                assert_eq!(reader.payload.load(Ordering::Relaxed), 42);
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();
    });
}

/// Two racing deleters: exactly one marks the node.
#[test]
fn test_loom_single_marker_wins() {
    loom::model(|| {
        let node = Arc::new(LoomNode::new());
        node.flags.store(FULLY_LINKED, Ordering::Relaxed);

        let n1 = Arc::clone(&node);
        let t1 = thread::spawn(move || n1.try_mark());

        let n2 = Arc::clone(&node);
        let t2 = thread::spawn(move || n2.try_mark());

        let won1 = t1.join().unwrap();
        let won2 = t2.join().unwrap();

        assert!(won1 ^ won2, "exactly one deleter must win");
        assert!(!node.is_live());
    });
}

/// A reader racing a deleter sees either the live node or nothing.
#[test]
fn test_loom_mark_hides_node() {
    loom::model(|| {
        let node = Arc::new(LoomNode::new());
        node.payload.store(7, Ordering::Relaxed);
        node.flags.store(FULLY_LINKED, Ordering::Release);

        let deleter = Arc::clone(&node);
        let t1 = thread::spawn(move || {
            assert!(deleter.try_mark());
        });

        let reader = Arc::clone(&node);
        let t2 = thread::spawn(move || {
            if reader.is_live() {
                assert_eq!(reader.payload.load(Ordering::Relaxed), 7);
            }
        });

        t1.join().unwrap();
        t2.join().unwrap();

        assert!(!node.is_live());
    });
}
