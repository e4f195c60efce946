//! Simulated interleaving of logical threads.
//!
//! All logical threads run on the calling OS thread. At each step the
//! harness picks which logical thread performs its next operation, using
//! the seeded RNG, so a given seed always produces the same interleaving
//! and the same operation history. Invariants are checked periodically
//! and once more at the end.

use tracing::debug;

use crate::env::DstEnv;
use crate::fault::FaultConfig;

/// Configuration for a harness run.
#[derive(Debug, Clone)]
pub struct HarnessConfig {
    /// Number of logical threads
    pub threads_count: usize,
    /// Operations each logical thread performs
    pub operations_per_thread: u64,
    /// Probability of switching to another thread after an operation
    pub switch_probability: f64,
    /// Faults injected between operations
    pub fault_config: FaultConfig,
    /// Check invariants after every N operations (0 = only at the end)
    pub invariant_check_interval: u64,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            threads_count: 4,
            operations_per_thread: 100,
            switch_probability: 0.3,
            fault_config: FaultConfig::none(),
            invariant_check_interval: 10,
        }
    }
}

impl HarnessConfig {
    /// Configuration for stress testing.
    #[must_use]
    pub fn stress() -> Self {
        Self {
            threads_count: 8,
            operations_per_thread: 1000,
            switch_probability: 0.5,
            fault_config: FaultConfig::none(),
            invariant_check_interval: 100,
        }
    }

    /// Configuration for quick testing.
    #[must_use]
    pub fn quick() -> Self {
        Self {
            threads_count: 2,
            operations_per_thread: 50,
            switch_probability: 0.3,
            fault_config: FaultConfig::none(),
            invariant_check_interval: 10,
        }
    }
}

/// Result of a harness run.
#[derive(Debug, Clone)]
pub struct HarnessResult {
    /// Seed used for reproduction
    pub seed: u64,
    /// Total operations executed
    pub operations_count: u64,
    /// Switches between logical threads
    pub context_switches_count: u64,
    /// Faults injected
    pub faults_injected_count: u64,
    /// Invariant checks performed
    pub invariant_checks_count: u64,
    /// First violation, if any
    pub first_violation: Option<String>,
}

impl HarnessResult {
    #[must_use]
    pub fn all_invariants_held(&self) -> bool {
        self.first_violation.is_none()
    }

    /// One-line summary including the seed.
    #[must_use]
    pub fn format(&self) -> String {
        let status = if self.all_invariants_held() { "PASS" } else { "FAIL" };
        let mut line = format!(
            "[{}] DST_SEED={} ops={} switches={} faults={} checks={}",
            status,
            self.seed,
            self.operations_count,
            self.context_switches_count,
            self.faults_injected_count,
            self.invariant_checks_count
        );
        if let Some(violation) = &self.first_violation {
            line.push_str(&format!(" violation: {violation}"));
        }
        line
    }
}

/// Deterministic simulation harness.
pub struct DstHarness {
    env: DstEnv,
    config: HarnessConfig,
    operations_count: u64,
    context_switches_count: u64,
    invariant_checks_count: u64,
    violation: Option<String>,
}

impl DstHarness {
    #[must_use]
    pub fn new(seed: u64, config: HarnessConfig) -> Self {
        debug_assert!(config.threads_count > 0, "must have at least one thread");
        Self {
            env: DstEnv::with_fault_config(seed, config.fault_config),
            config,
            operations_count: 0,
            context_switches_count: 0,
            invariant_checks_count: 0,
            violation: None,
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.env.seed()
    }

    /// Run `operations_per_thread` operations on a single logical thread.
    ///
    /// `generate_op` receives the step number and may return `None` to skip.
    pub fn run_single_threaded<T, F, R>(
        &mut self,
        mut generate_op: F,
        mut execute: R,
    ) -> HarnessResult
    where
        F: FnMut(&mut DstEnv, u64) -> Option<T>,
        R: FnMut(&mut DstEnv, T) -> Result<(), String>,
    {
        for step in 0..self.config.operations_per_thread {
            if let Some(op) = generate_op(&mut self.env, step) {
                if let Err(e) = execute(&mut self.env, op) {
                    self.violation = Some(format!("step {step}: {e}"));
                    break;
                }
                self.operations_count += 1;
            }
            self.env.maybe_delay();
        }
        self.build_result()
    }

    /// Run all logical threads interleaved by the seeded scheduler.
    ///
    /// `generate_op` receives the thread id and that thread's step number.
    pub fn run_concurrent<T, F, R, I>(
        &mut self,
        mut generate_op: F,
        mut execute: R,
        mut check_invariants: I,
    ) -> HarnessResult
    where
        F: FnMut(&mut DstEnv, usize, u64) -> Option<T>,
        R: FnMut(&mut DstEnv, usize, T) -> Result<(), String>,
        I: FnMut() -> Result<(), String>,
    {
        let threads_count = self.config.threads_count;
        let ops_per_thread = self.config.operations_per_thread;
        let mut steps = vec![0u64; threads_count];
        let mut current = 0usize;

        loop {
            let runnable: Vec<usize> = (0..threads_count)
                .filter(|&t| steps[t] < ops_per_thread)
                .collect();
            if runnable.is_empty() {
                break;
            }
            if steps[current] >= ops_per_thread
                || self.env.rng().gen_bool(self.config.switch_probability)
            {
                let next = runnable[self.env.rng().gen_range(0..runnable.len())];
                if next != current {
                    self.context_switches_count += 1;
                }
                current = next;
            }

            let step = steps[current];
            if let Some(op) = generate_op(&mut self.env, current, step) {
                if let Err(e) = execute(&mut self.env, current, op) {
                    self.violation = Some(format!("thread {current} step {step}: {e}"));
                    break;
                }
                self.operations_count += 1;
            }
            steps[current] += 1;

            let interval = self.config.invariant_check_interval;
            if interval > 0 && self.operations_count % interval == 0 {
                self.invariant_checks_count += 1;
                if let Err(e) = check_invariants() {
                    self.violation = Some(e);
                    break;
                }
            }
            self.env.maybe_delay();
        }

        if self.violation.is_none() {
            self.invariant_checks_count += 1;
            if let Err(e) = check_invariants() {
                self.violation = Some(e);
            }
        }

        self.build_result()
    }

    fn build_result(&self) -> HarnessResult {
        let result = HarnessResult {
            seed: self.env.seed(),
            operations_count: self.operations_count,
            context_switches_count: self.context_switches_count,
            faults_injected_count: self.env.stats().faults_count,
            invariant_checks_count: self.invariant_checks_count,
            first_violation: self.violation.clone(),
        };
        debug!(summary = %result.format(), "harness finished");
        result
    }
}
