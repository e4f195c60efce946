//! Timing demos and walkthroughs for the concurrent containers.
//!
//! # Usage
//!
//! ```bash
//! # Fill a map, then read the first half and delete the second half
//! # with one thread, and again with two
//! cargo run --release -p cc-bench -- map --keys 1000000 --buckets 19
//!
//! # Push/pop stress on the lock-free stack
//! cargo run --release -p cc-bench -- stack --threads 8 --ops 100000
//!
//! # Step through the list operations
//! cargo run -p cc-bench -- list
//!
//! # Reclamation decisions are logged at trace level
//! RUST_LOG=cc_containers=trace cargo run -p cc-bench -- stack --threads 2 --ops 10
//! ```

use std::process;
use std::time::{Duration, Instant};

use cc_containers::{ConcurrentList, LockFreeStack, MapConfig, ShardedMap, BUCKETS_COUNT_DEFAULT};
use cc_dst::{get_or_generate_seed, run_threads, StressConfig, STRESS_OPS_DEFAULT};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Keys inserted by the map demo when `--keys` is not given.
const MAP_KEYS_DEFAULT: u64 = 1_000_000;

/// Threads used by the stack demo when `--threads` is not given.
const STACK_THREADS_DEFAULT: usize = 8;

/// Upper bound on stack demo threads.
const STACK_THREADS_MAX: usize = 256;

/// Run a timing demo or walkthrough on one of the containers.
#[derive(Parser, Debug)]
#[command(name = "cc-bench")]
#[command(about = "Timing demos for the concurrent containers")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Time one thread against two on a filled map
    Map {
        /// Number of keys to insert
        #[arg(long, default_value_t = MAP_KEYS_DEFAULT)]
        keys: u64,
        /// Number of buckets
        #[arg(long, default_value_t = BUCKETS_COUNT_DEFAULT)]
        buckets: usize,
        /// Map configuration as JSON, e.g. '{"buckets_count": 31}'
        #[arg(long, conflicts_with = "buckets")]
        config: Option<String>,
    },
    /// Push/pop stress on the lock-free stack
    Stack {
        /// Number of threads
        #[arg(long, default_value_t = STACK_THREADS_DEFAULT)]
        threads: usize,
        /// Operations per thread
        #[arg(long, default_value_t = STRESS_OPS_DEFAULT)]
        ops: u64,
        /// Workload seed (`DST_SEED` or random if not set)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Walk through the list operations on a small list
    List,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Map {
            keys,
            buckets,
            config,
        } => run_map(keys, buckets, config.as_deref()),
        Command::Stack { threads, ops, seed } => run_stack(threads, ops, seed),
        Command::List => {
            run_list();
            Ok(())
        }
    };

    if let Err(message) = result {
        eprintln!("Error: {}", message);
        process::exit(1);
    }
}

fn build_map(buckets: usize, config: Option<&str>) -> Result<ShardedMap<u64, u64>, String> {
    let config = match config {
        Some(json) => MapConfig::from_json(json).map_err(|e| e.to_string())?,
        None => MapConfig::default().with_buckets_count(buckets),
    };
    ShardedMap::with_config(&config).map_err(|e| e.to_string())
}

fn fill(map: &ShardedMap<u64, u64>, keys: u64) {
    for key in 0..keys {
        map.add_or_update(key, key);
    }
}

/// Read every key in `range`, returning how many held their own value.
fn read_range(map: &ShardedMap<u64, u64>, range: std::ops::Range<u64>) -> u64 {
    range.filter(|k| map.get_value(k, u64::MAX) == *k).count() as u64
}

fn delete_range(map: &ShardedMap<u64, u64>, range: std::ops::Range<u64>) -> u64 {
    range.filter(|k| map.remove(k).is_some()).count() as u64
}

fn run_map(keys: u64, buckets: usize, config: Option<&str>) -> Result<(), String> {
    let half = keys / 2;
    let map = build_map(buckets, config)?;
    info!(keys, buckets = map.buckets_count(), "map demo");

    fill(&map, keys);
    let start = Instant::now();
    let read = read_range(&map, 0..half);
    let deleted = delete_range(&map, half..keys);
    let single = start.elapsed();
    check_map_demo(read, deleted, half, keys - half)?;

    let map = build_map(buckets, config)?;
    fill(&map, keys);
    let start = Instant::now();
    let (read, deleted) = std::thread::scope(|scope| {
        let reader = scope.spawn(|| read_range(&map, 0..half));
        let deleter = scope.spawn(|| delete_range(&map, half..keys));
        (reader.join(), deleter.join())
    });
    let double = start.elapsed();
    let read = read.map_err(|_| "reader thread panicked".to_string())?;
    let deleted = deleted.map_err(|_| "deleter thread panicked".to_string())?;
    check_map_demo(read, deleted, half, keys - half)?;

    println!("keys: {}, buckets: {}", keys, map.buckets_count());
    println!("1 thread:  {}", format_duration(single));
    println!("2 threads: {}", format_duration(double));
    Ok(())
}

fn check_map_demo(
    read: u64,
    deleted: u64,
    read_expected: u64,
    deleted_expected: u64,
) -> Result<(), String> {
    if read != read_expected || deleted != deleted_expected {
        return Err(format!(
            "map demo mismatch: read {}/{} deleted {}/{}",
            read, read_expected, deleted, deleted_expected
        ));
    }
    Ok(())
}

fn run_stack(threads: usize, ops: u64, seed: Option<u64>) -> Result<(), String> {
    if threads == 0 || threads > STACK_THREADS_MAX {
        return Err(format!("--threads must be in 1..={}", STACK_THREADS_MAX));
    }

    let seed = seed.unwrap_or_else(get_or_generate_seed);
    let mut config = StressConfig::stress(seed).with_threads_count(threads);
    config.operations_per_thread = ops;

    let stack = LockFreeStack::new();
    let report = run_threads(&config, |ctx| {
        let mut sum = 0u128;
        let mut popped = 0u64;
        for step in 0..ctx.operations_count {
            stack.push(step);
            if ctx.rng.gen_bool(0.5) {
                if let Some(v) = stack.pop() {
                    sum += u128::from(v);
                    popped += 1;
                }
            }
        }
        (sum, popped)
    });

    let mut remaining = 0u64;
    let mut sum: u128 = report.results.iter().map(|(s, _)| s).sum();
    while let Some(v) = stack.pop() {
        sum += u128::from(v);
        remaining += 1;
    }
    let popped: u64 = report.results.iter().map(|(_, p)| p).sum();

    let pushed = threads as u64 * ops;
    if popped + remaining != pushed || sum != pushed_sum(threads, ops) {
        return Err(format!(
            "conservation violated (DST_SEED={}): pushed {} popped {} remaining {}",
            seed, pushed, popped, remaining
        ));
    }

    let total_ops = pushed + popped;
    let secs = report.elapsed.as_secs_f64().max(f64::EPSILON);
    println!("threads: {}, ops/thread: {}", threads, ops);
    println!("elapsed: {}", format_duration(report.elapsed));
    println!("throughput: {:.0} ops/s", total_ops as f64 / secs);
    println!("popped: {}, drained: {}", popped, remaining);
    Ok(())
}

/// Sum of everything pushed when each thread pushes `0..ops`.
fn pushed_sum(threads: usize, ops: u64) -> u128 {
    let ops = u128::from(ops);
    ops * ops.saturating_sub(1) / 2 * threads as u128
}

fn print_list(label: &str, list: &ConcurrentList<i64>) {
    let mut values = Vec::new();
    list.for_each(|v| values.push(v.to_string()));
    println!("{:<28} {}", label, values.join(" "));
}

fn run_list() {
    let list = ConcurrentList::new();
    for value in [10, 5, 1, 8, 4, 9, 2, 5] {
        list.push_front(value);
    }
    print_list("after push_front:", &list);

    let found = list.find_first_if(|v| v % 4 == 0);
    println!("{:<28} {:?}", "first multiple of 4:", found.as_deref());

    list.for_each_mut(|v| *v *= 10);
    print_list("after x10:", &list);

    let found = list.find_first_if(|v| v % 4 == 0);
    println!("{:<28} {:?}", "first multiple of 4:", found.as_deref());

    let removed = list.remove_if(|v| *v > 50);
    print_list(&format!("after removing {} > 50:", removed), &list);
}

fn format_duration(d: Duration) -> String {
    format!("{:.3} ms", d.as_secs_f64() * 1000.0)
}
