//! Real OS-thread stress runs.
//!
//! Unlike the harness, interleavings here come from the OS scheduler and
//! are not reproducible. The seed still fixes each thread's workload and
//! its injected faults.

use std::sync::Barrier;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::fault::{FaultConfig, FaultInjector};
use crate::random::DeterministicRng;

/// Operations per thread when `STRESS_OPS` is not set.
pub const STRESS_OPS_DEFAULT: u64 = 100_000;

/// Configuration for a stress run.
#[derive(Debug, Clone)]
pub struct StressConfig {
    pub seed: u64,
    pub threads_count: usize,
    pub operations_per_thread: u64,
    pub fault_config: FaultConfig,
}

impl StressConfig {
    /// 2 threads with 1000 operations each.
    #[must_use]
    pub fn quick(seed: u64) -> Self {
        Self {
            seed,
            threads_count: 2,
            operations_per_thread: 1000,
            fault_config: FaultConfig::none(),
        }
    }

    /// 8 threads with 100 000 operations each.
    #[must_use]
    pub fn stress(seed: u64) -> Self {
        Self {
            seed,
            threads_count: 8,
            operations_per_thread: STRESS_OPS_DEFAULT,
            fault_config: FaultConfig::none(),
        }
    }

    /// `stress` with operations per thread taken from `STRESS_OPS`, if set.
    #[must_use]
    pub fn from_env(seed: u64) -> Self {
        let mut config = Self::stress(seed);
        if let Some(ops) = std::env::var("STRESS_OPS").ok().and_then(|s| s.parse().ok()) {
            config.operations_per_thread = ops;
        }
        config
    }

    #[must_use]
    pub fn with_threads_count(mut self, threads_count: usize) -> Self {
        self.threads_count = threads_count;
        self
    }

    #[must_use]
    pub fn with_fault_config(mut self, fault_config: FaultConfig) -> Self {
        self.fault_config = fault_config;
        self
    }
}

/// Per-thread context handed to the workload.
pub struct ThreadCtx {
    pub thread_id: usize,
    pub operations_count: u64,
    pub rng: DeterministicRng,
    pub fault: FaultInjector,
}

/// Outcome of a stress run.
#[derive(Debug)]
pub struct StressReport<R> {
    pub elapsed: Duration,
    /// Workload results, indexed by thread id
    pub results: Vec<R>,
}

/// Run `workload` on `threads_count` threads that start together.
///
/// Timing starts once every thread has been spawned and reached the
/// barrier. A panic in any workload is propagated to the caller.
pub fn run_threads<R, F>(config: &StressConfig, workload: F) -> StressReport<R>
where
    R: Send,
    F: Fn(&mut ThreadCtx) -> R + Sync,
{
    let root = DeterministicRng::new(config.seed);
    let barrier = Barrier::new(config.threads_count + 1);

    let (elapsed, results) = thread::scope(|scope| {
        let handles: Vec<_> = (0..config.threads_count)
            .map(|thread_id| {
                let mut ctx = ThreadCtx {
                    thread_id,
                    operations_count: config.operations_per_thread,
                    rng: root.fork(thread_id as u64),
                    fault: FaultInjector::new(
                        root.fork((thread_id + config.threads_count) as u64),
                        config.fault_config,
                    ),
                };
                let barrier = &barrier;
                let workload = &workload;
                scope.spawn(move || {
                    barrier.wait();
                    workload(&mut ctx)
                })
            })
            .collect();

        barrier.wait();
        let start = Instant::now();
        let results: Vec<R> = handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect();
        (start.elapsed(), results)
    });

    debug!(
        threads = config.threads_count,
        ops = config.operations_per_thread,
        elapsed_ms = elapsed.as_millis() as u64,
        "stress run finished"
    );
    StressReport { elapsed, results }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    #[test]
    fn test_all_threads_run() {
        let counter = AtomicU64::new(0);
        let config = StressConfig::quick(1).with_threads_count(4);
        let report = run_threads(&config, |ctx| {
            for _ in 0..ctx.operations_count {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            ctx.thread_id
        });
        assert_eq!(report.results, vec![0, 1, 2, 3]);
        assert_eq!(counter.load(Ordering::Relaxed), 4 * 1000);
    }

    #[test]
    fn test_workloads_are_seeded() {
        let config = StressConfig::quick(99);
        let draw = |ctx: &mut ThreadCtx| ctx.rng.gen::<u64>();
        assert_eq!(run_threads(&config, draw).results, run_threads(&config, draw).results);
    }
}
