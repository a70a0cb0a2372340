//! Shared helpers for the integration tests: tracing setup and snapshot
//! collectors for the containers.
//!
//! # Usage
//!
//! ```rust,ignore
//! mod common;
//!
//! #[test]
//! fn my_test() {
//!     common::init_tracing();
//!     // ... test code with tracing::info!, tracing::debug!, etc.
//! }
//! ```
//!
//! # Configuration
//!
//! Environment variables:
//! - `RUST_LOG`: Filter directives (e.g., `collectx=debug,collectx::queue=trace`)
//! - `COLLECTX_LOG_DIR`: Log directory (default: `logs/`)
//! - `COLLECTX_LOG_CONSOLE`: Set to "0" to disable console output
//!
//! Library events only appear when the crate is built with `--features tracing`.
//!
//! # Log Files
//!
//! Logs are appended to `logs/collectx.jsonl` as newline-delimited JSON:
//!
//! ```bash
//! # Pretty-print all logs
//! cat logs/collectx.jsonl | jq .
//!
//! # Segment appends only
//! cat logs/collectx.jsonl | jq 'select(.fields.message == "queue: segment appended")'
//! ```

#![allow(dead_code)]

use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Once;

use collectx::{Comparator, DebugCounters, SkipMap, SkipSet, get_debug_counters};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry};

static INIT: Once = Once::new();

/// Install console + NDJSON file logging. Only the first call takes effect.
pub fn init_tracing() {
    INIT.call_once(setup_tracing);
}

/// Where and how loudly to log.
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub log_dir: PathBuf,
    pub log_file: String,
    pub console_enabled: bool,
    /// Level used when `RUST_LOG` is unset.
    pub default_level: Level,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("logs"),
            log_file: "collectx.jsonl".to_string(),
            console_enabled: true,
            default_level: Level::INFO,
        }
    }
}

impl TracingConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(dir) = env::var("COLLECTX_LOG_DIR") {
            config.log_dir = PathBuf::from(dir);
        }

        if env::var("COLLECTX_LOG_CONSOLE").is_ok_and(|v| v == "0") {
            config.console_enabled = false;
        }

        config
    }
}

fn make_filter(default_level: Level) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level.to_string()))
}

#[expect(clippy::expect_used)]
fn setup_tracing() {
    let config = TracingConfig::from_env();

    std::fs::create_dir_all(&config.log_dir).expect("Failed to create log directory");

    // Append: nextest runs each test in its own process.
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(config.log_dir.join(&config.log_file))
        .expect("Failed to open log file");

    let console_layer = config.console_enabled.then(|| {
        tracing_subscriber::fmt::layer()
            .with_thread_ids(true)
            .with_target(true)
            .compact()
            .with_filter(make_filter(config.default_level))
    });

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::sync::Mutex::new(file))
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .json()
        .with_filter(make_filter(config.default_level));

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

// ============================================================================
//  Snapshots
// ============================================================================

/// Elements of `set` in iteration order.
pub fn set_keys<K, C>(set: &SkipSet<K, C>) -> Vec<K>
where
    K: Clone + Send + Sync + 'static,
    C: Comparator<K>,
{
    let mut out = Vec::with_capacity(set.len());
    set.range(|k| {
        out.push(k.clone());
        true
    });
    out
}

/// Entries of `map` in iteration order.
pub fn map_entries<K, V, C>(map: &SkipMap<K, V, C>) -> Vec<(K, V)>
where
    K: Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    C: Comparator<K>,
{
    let mut out = Vec::with_capacity(map.len());
    map.range(|k, v| {
        out.push((k.clone(), v.clone()));
        true
    });
    out
}

/// Print slow-path counters when a stress test saw contention.
pub fn report_debug_counters(test_name: &str) {
    let counters: DebugCounters = get_debug_counters();
    if counters != DebugCounters::default() {
        tracing::info!(test = test_name, ?counters, "debug counters");
        eprintln!("{test_name}: {counters:?}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracing_init() {
        init_tracing();
        tracing::info!("Tracing initialized successfully");
        tracing::debug!(segment_capacity = 4, "Debug event");
    }
}
