//! Skip map benchmarks.
//!
//! Run with: `cargo bench --bench skipmap`

#![expect(clippy::unwrap_used)]
#![expect(clippy::indexing_slicing)]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;


use std::sync::Arc;
use std::thread;

use bench_utils::{filled_map, int_keys, uniform_indices, zipfian_indices};
use collectx::Int64Map;
use divan::{Bencher, black_box};

fn main() {
    divan::main();
}

const N: usize = 100_000;

#[divan::bench]
fn store_fresh(bencher: Bencher) {
    let keys = int_keys(10_000);
    bencher
        .with_inputs(Int64Map::<u64>::new)
        .bench_local_values(|map| {
            for (i, &k) in keys.iter().enumerate() {
                map.store(k, i as u64);
            }
            map
        });
}

#[divan::bench]
fn store_overwrite(bencher: Bencher) {
    let keys = int_keys(N);
    let map = filled_map(&keys);
    let targets = uniform_indices(N, 1_000, 3);

    bencher.bench_local(|| {
        for &i in &targets {
            map.store(keys[i], black_box(i as u64));
        }
    });
}

#[divan::bench]
fn load_hit(bencher: Bencher) {
    let keys = int_keys(N);
    let map = filled_map(&keys);
    let lookups = uniform_indices(N, 1_000, 42);

    bencher.bench_local(|| {
        let guard = map.guard();
        let mut sum = 0_u64;
        for &i in &lookups {
            if let Some(v) = map.load_with_guard(&keys[i], &guard) {
                sum += *v;
            }
        }
        black_box(sum)
    });
}

#[divan::bench]
fn load_or_store_present(bencher: Bencher) {
    let keys = int_keys(N);
    let map = filled_map(&keys);
    let lookups = uniform_indices(N, 1_000, 9);

    bencher.bench_local(|| {
        for &i in &lookups {
            black_box(map.load_or_store(keys[i], 0));
        }
    });
}

#[divan::bench(args = [1, 2, 4, 8, 16])]
fn zipf_store_load(bencher: Bencher, threads: usize) {
    let keys = Arc::new(int_keys(N));
    let map = Arc::new(filled_map(&keys));

    bencher.bench_local(|| {
        let handles: Vec<_> = (0..threads)
            .map(|t| {
                let map = Arc::clone(&map);
                let keys = Arc::clone(&keys);
                thread::spawn(move || {
                    for (n, i) in zipfian_indices(N, 2_000, t as u64 + 11).into_iter().enumerate() {
                        if n % 4 == 0 {
                            map.store(keys[i], n as u64);
                        } else {
                            black_box(map.load(&keys[i]));
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
    });
}
