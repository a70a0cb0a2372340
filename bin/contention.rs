//! Contention Profiling Binary
//!
//! Drives the skip set, the skip map, and the linked queue from many threads
//! at once and reports per-op latency outliers plus the slow-path debug
//! counters. When tracing is enabled, segment churn from the queue and slow
//! ops from this binary are written to a JSON log.
//!
//! Run with:
//! ```bash
//! # Without tracing (fast, just stats)
//! cargo run --release --features mimalloc --bin contention
//!
//! # With tracing (writes to logs/contention.json)
//! RUST_LOG=collectx=debug,contention=warn cargo run --release --features "mimalloc,tracing" --bin contention
//!
//! # View slow operations:
//! rg "SLOW_OP" logs/contention.json
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_wrap)]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use collectx::{DebugCounters, Int64Map, Int64Set, QueueConfig, Uint64Queue};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[cfg(feature = "tracing")]
type TracingGuard = tracing_appender::non_blocking::WorkerGuard;

#[cfg(not(feature = "tracing"))]
type TracingGuard = ();

// =============================================================================
// Tracing Initialization (JSON to file)
// =============================================================================

#[cfg(feature = "tracing")]
fn init_json_tracing() -> TracingGuard {
    use tracing_subscriber::{EnvFilter, Layer, layer::SubscriberExt, util::SubscriberInitExt};

    let log_dir = "logs";
    let filter_str = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "collectx=warn,contention=warn".to_string());

    let _ = std::fs::create_dir_all(log_dir);

    let file_appender = tracing_appender::rolling::never(log_dir, "contention.json");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking)
        .with_thread_ids(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false)
        .json()
        .with_filter(EnvFilter::try_new(&filter_str).unwrap_or_else(|_| EnvFilter::new("warn")));

    let _ = tracing_subscriber::registry().with(file_layer).try_init();

    println!("Tracing enabled: logs/contention.json (filter: {filter_str})");

    guard
}

#[cfg(not(feature = "tracing"))]
fn init_json_tracing() -> TracingGuard {
    println!("Tracing disabled (compile with --features tracing)");
}

// =============================================================================
// Operation Stats
// =============================================================================

/// Per-thread operation timing statistics
#[derive(Default)]
struct ThreadOpStats {
    max_op_ns: u64,

    /// Ops slower than 1ms
    slow_ops_1ms: u64,

    /// Ops slower than 10ms
    slow_ops_10ms: u64,

    /// Ops slower than 100ms
    slow_ops_100ms: u64,
}

impl ThreadOpStats {
    const fn record_op(&mut self, op_ns: u64) {
        if op_ns > self.max_op_ns {
            self.max_op_ns = op_ns;
        }

        if op_ns > 1_000_000 {
            self.slow_ops_1ms += 1;
        }

        if op_ns > 10_000_000 {
            self.slow_ops_10ms += 1;
        }

        if op_ns > 100_000_000 {
            self.slow_ops_100ms += 1;
        }
    }

    const fn merge(&mut self, other: &Self) {
        if other.max_op_ns > self.max_op_ns {
            self.max_op_ns = other.max_op_ns;
        }

        self.slow_ops_1ms += other.slow_ops_1ms;
        self.slow_ops_10ms += other.slow_ops_10ms;
        self.slow_ops_100ms += other.slow_ops_100ms;
    }
}

// =============================================================================
// Workloads
// =============================================================================

#[derive(Clone, Copy, Debug)]
enum Workload {
    /// Add then remove over a shared hot key range.
    SetChurn,
    /// 1 store per 3 `load_or_store` on a shared key range.
    MapStoreLoad,
    /// Half the threads enqueue, half dequeue, on tiny segments.
    QueueMpmc,
}

impl Workload {
    const fn name(self) -> &'static str {
        match self {
            Self::SetChurn => "set add/remove",
            Self::MapStoreLoad => "map store/load_or_store",
            Self::QueueMpmc => "queue mpmc",
        }
    }
}

struct RunConfig {
    workload: Workload,
    threads: usize,
    ops_per_thread: usize,
    key_range: u64,
}

struct RunResult {
    elapsed: Duration,
    stats: ThreadOpStats,
    debug: DebugCounters,
}

fn slow_op(thread: usize, op_index: usize, op_ns: u64) {
    if op_ns <= 10_000_000 {
        return;
    }

    #[cfg(feature = "tracing")]
    tracing::warn!(
        thread,
        op_index,
        elapsed_ms = op_ns as f64 / 1_000_000.0,
        "SLOW_OP"
    );

    #[cfg(not(feature = "tracing"))]
    eprintln!(
        "[T{thread:02}] SLOW_OP: i={op_index} took {:.2}ms",
        op_ns as f64 / 1_000_000.0
    );
}

/// Cheap per-thread key stream.
fn next_key(state: &mut u64, range: u64) -> i64 {
    *state = state
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    ((*state >> 33) % range) as i64
}

fn run_set(config: &RunConfig) -> ThreadOpStats {
    let set = Arc::new(Int64Set::new());

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let set = Arc::clone(&set);
            let ops = config.ops_per_thread;
            let range = config.key_range;

            thread::spawn(move || {
                let mut stats = ThreadOpStats::default();
                let guard = set.guard();
                let mut state = t as u64 + 1;

                for i in 0..ops {
                    let key = next_key(&mut state, range);

                    let op_start = Instant::now();
                    if !set.add_with_guard(key, &guard) {
                        set.remove_with_guard(&key, &guard);
                    }
                    let op_ns = op_start.elapsed().as_nanos() as u64;

                    stats.record_op(op_ns);
                    slow_op(t, i, op_ns);
                }

                stats
            })
        })
        .collect();

    join_all(handles)
}

fn run_map(config: &RunConfig) -> ThreadOpStats {
    let map: Arc<Int64Map<u64>> = Arc::new(Int64Map::new());

    let handles: Vec<_> = (0..config.threads)
        .map(|t| {
            let map = Arc::clone(&map);
            let ops = config.ops_per_thread;
            let range = config.key_range;

            thread::spawn(move || {
                let mut stats = ThreadOpStats::default();
                let mut state = (t as u64 + 1) << 20;

                for i in 0..ops {
                    let key = next_key(&mut state, range);

                    let op_start = Instant::now();
                    if i % 4 == 0 {
                        map.store(key, i as u64);
                    } else {
                        let _ = map.load_or_store(key, i as u64);
                    }
                    let op_ns = op_start.elapsed().as_nanos() as u64;

                    stats.record_op(op_ns);
                    slow_op(t, i, op_ns);
                }

                stats
            })
        })
        .collect();

    join_all(handles)
}

fn run_queue(config: &RunConfig) -> ThreadOpStats {
    // Small segments so appends and recycling dominate.
    let queue = Arc::new(
        Uint64Queue::with_config(QueueConfig::default().segment_capacity(64)).unwrap(),
    );

    let handles: Vec<_> = (0..config.threads.max(2))
        .map(|t| {
            let queue = Arc::clone(&queue);
            let ops = config.ops_per_thread;

            thread::spawn(move || {
                let mut stats = ThreadOpStats::default();
                let guard = queue.guard();

                for i in 0..ops {
                    let op_start = Instant::now();
                    if t % 2 == 0 {
                        queue.enqueue_with_guard(i as u64, &guard);
                    } else {
                        let _ = queue.dequeue_with_guard(&guard);
                    }
                    let op_ns = op_start.elapsed().as_nanos() as u64;

                    stats.record_op(op_ns);
                    slow_op(t, i, op_ns);
                }

                stats
            })
        })
        .collect();

    let merged = join_all(handles);
    while queue.dequeue().is_some() {}
    merged
}

fn join_all(handles: Vec<thread::JoinHandle<ThreadOpStats>>) -> ThreadOpStats {
    let mut merged = ThreadOpStats::default();
    for h in handles {
        merged.merge(&h.join().unwrap());
    }
    merged
}

fn run(config: &RunConfig) -> RunResult {
    collectx::reset_debug_counters();

    let start = Instant::now();
    let stats = match config.workload {
        Workload::SetChurn => run_set(config),
        Workload::MapStoreLoad => run_map(config),
        Workload::QueueMpmc => run_queue(config),
    };
    let elapsed = start.elapsed();

    RunResult {
        elapsed,
        stats,
        debug: collectx::get_debug_counters(),
    }
}

fn print_stats(config: &RunConfig, result: &RunResult) {
    let stats = &result.stats;
    let debug = &result.debug;

    let total_ops = config.threads * config.ops_per_thread;
    let ops_per_sec = total_ops as f64 / result.elapsed.as_secs_f64();

    println!(
        "  {:>2} threads: {:>10.0} ops/sec  max {:>7.2} ms  >1ms {:>5}  >10ms {:>4}  >100ms {:>3}",
        config.threads,
        ops_per_sec,
        stats.max_op_ns as f64 / 1_000_000.0,
        stats.slow_ops_1ms,
        stats.slow_ops_10ms,
        stats.slow_ops_100ms,
    );

    match config.workload {
        Workload::SetChurn | Workload::MapStoreLoad => println!(
            "              insert retry {}  remove retry {}  link wait {}",
            debug.insert_retry, debug.remove_retry, debug.link_wait
        ),
        Workload::QueueMpmc => println!(
            "              appends {}  recycled {}  pool hits {}  fixstate {}",
            debug.segment_append, debug.segment_recycle, debug.segment_pool_hit, debug.fixstate
        ),
    }
}

// =============================================================================
// Main
// =============================================================================

fn main() {
    let _guard = init_json_tracing();

    println!("Contention Profiling");
    println!("====================");

    let threads = [1, 2, 4, 8, 16];
    let workloads: [(Workload, u64); 3] = [
        (Workload::SetChurn, 64),
        (Workload::MapStoreLoad, 1_024),
        (Workload::QueueMpmc, 0),
    ];

    for (workload, key_range) in workloads {
        println!("\n{}", workload.name());
        println!("{}", "-".repeat(80));

        for &t in &threads {
            let config = RunConfig {
                workload,
                threads: t,
                ops_per_thread: 100_000,
                key_range: key_range.max(1),
            };
            let result = run(&config);
            print_stats(&config, &result);
        }
    }
}
