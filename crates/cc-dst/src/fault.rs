//! Fault injection at operation boundaries.
//!
//! Faults never happen inside a container operation. The harness injects
//! them between operations: a `yield_now` to shake up the OS schedule, or
//! a short sleep to simulate a slow or preempted thread. Container code
//! stays free of test hooks.

use std::thread;
use std::time::Duration;

use crate::random::DeterministicRng;

/// Kind of perturbation injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultType {
    /// Give up the rest of the time slice
    Yield,
    /// Sleep for a few microseconds
    Delay,
}

/// Probabilities of each fault.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaultConfig {
    /// Probability of a yield at a boundary
    pub yield_probability: f64,
    /// Probability of a delay at a boundary
    pub delay_probability: f64,
    /// Upper bound of an injected delay
    pub delay_us_max: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            yield_probability: 0.05,
            delay_probability: 0.001,
            delay_us_max: 50,
        }
    }
}

impl FaultConfig {
    /// No faults.
    #[must_use]
    pub fn none() -> Self {
        Self {
            yield_probability: 0.0,
            delay_probability: 0.0,
            delay_us_max: 0,
        }
    }

    /// Frequent yields and delays.
    #[must_use]
    pub fn aggressive() -> Self {
        Self {
            yield_probability: 0.2,
            delay_probability: 0.01,
            delay_us_max: 200,
        }
    }
}

/// Counters of injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub faults_count: u64,
    pub yields_count: u64,
    pub delays_count: u64,
}

/// Decides, deterministically from its RNG, which faults to inject.
#[derive(Debug, Clone)]
pub struct FaultInjector {
    rng: DeterministicRng,
    config: FaultConfig,
    stats: FaultStats,
}

impl FaultInjector {
    #[must_use]
    pub fn new(rng: DeterministicRng, config: FaultConfig) -> Self {
        debug_assert!(config.yield_probability >= 0.0 && config.yield_probability <= 1.0);
        debug_assert!(config.delay_probability >= 0.0 && config.delay_probability <= 1.0);
        Self {
            rng,
            config,
            stats: FaultStats::default(),
        }
    }

    /// Choose a fault for this boundary, if any.
    pub fn next_fault(&mut self) -> Option<FaultType> {
        if self.config.delay_probability > 0.0 && self.rng.gen_bool(self.config.delay_probability) {
            return Some(FaultType::Delay);
        }
        if self.config.yield_probability > 0.0 && self.rng.gen_bool(self.config.yield_probability) {
            return Some(FaultType::Yield);
        }
        None
    }

    /// Choose and apply a fault to the current thread.
    pub fn perturb(&mut self) -> Option<FaultType> {
        let fault = self.next_fault()?;
        self.stats.faults_count += 1;
        match fault {
            FaultType::Yield => {
                self.stats.yields_count += 1;
                thread::yield_now();
            }
            FaultType::Delay => {
                self.stats.delays_count += 1;
                let us = self.rng.gen_range(1..=self.config.delay_us_max.max(1));
                thread::sleep(Duration::from_micros(us));
            }
        }
        Some(fault)
    }

    #[must_use]
    pub fn stats(&self) -> FaultStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_never_faults() {
        let mut injector = FaultInjector::new(DeterministicRng::new(1), FaultConfig::none());
        for _ in 0..1000 {
            assert!(injector.perturb().is_none());
        }
        assert_eq!(injector.stats(), FaultStats::default());
    }

    #[test]
    fn test_fault_sequence_is_reproducible() {
        let config = FaultConfig::aggressive();
        let mut a = FaultInjector::new(DeterministicRng::new(9), config);
        let mut b = FaultInjector::new(DeterministicRng::new(9), config);
        let xs: Vec<_> = (0..200).map(|_| a.next_fault()).collect();
        let ys: Vec<_> = (0..200).map(|_| b.next_fault()).collect();
        assert_eq!(xs, ys);
        assert!(xs.iter().any(Option::is_some));
    }

    #[test]
    fn test_stats_count_applied_faults() {
        let config = FaultConfig {
            yield_probability: 1.0,
            delay_probability: 0.0,
            delay_us_max: 0,
        };
        let mut injector = FaultInjector::new(DeterministicRng::new(3), config);
        for _ in 0..10 {
            assert_eq!(injector.perturb(), Some(FaultType::Yield));
        }
        assert_eq!(injector.stats().yields_count, 10);
        assert_eq!(injector.stats().faults_count, 10);
    }
}
