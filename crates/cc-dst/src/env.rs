//! Deterministic environment shared by a DST run.

use crate::fault::{FaultConfig, FaultInjector, FaultStats};
use crate::random::DeterministicRng;

/// Seeded randomness and fault injection for one simulation.
///
/// The workload RNG and the fault RNG are separate streams, so turning
/// faults on or off does not change the generated operations.
#[derive(Debug, Clone)]
pub struct DstEnv {
    seed: u64,
    rng: DeterministicRng,
    fault: FaultInjector,
}

impl DstEnv {
    #[must_use]
    pub fn with_fault_config(seed: u64, config: FaultConfig) -> Self {
        let root = DeterministicRng::new(seed);
        Self {
            seed,
            fault: FaultInjector::new(root.fork(u64::MAX), config),
            rng: root,
        }
    }

    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn rng(&mut self) -> &mut DeterministicRng {
        &mut self.rng
    }

    /// Possibly yield or sleep the current thread.
    pub fn maybe_delay(&mut self) {
        let _ = self.fault.perturb();
    }

    #[must_use]
    pub fn stats(&self) -> FaultStats {
        self.fault.stats()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workload_independent_of_faults() {
        let mut quiet = DstEnv::with_fault_config(5, FaultConfig::none());
        let mut noisy = DstEnv::with_fault_config(5, FaultConfig::aggressive());
        for _ in 0..50 {
            noisy.maybe_delay();
            assert_eq!(quiet.rng().gen::<u32>(), noisy.rng().gen::<u32>());
        }
        assert_eq!(quiet.stats().faults_count, 0);
    }
}
