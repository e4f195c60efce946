//! # cc-dst
//!
//! Deterministic simulation testing for the concurrent containers.
//!
//! Every run is driven by a single `u64` seed:
//! - `DstHarness` interleaves logical threads on one OS thread, so the
//!   whole history replays exactly from the seed.
//! - `run_threads` spawns real threads; the seed fixes each thread's
//!   workload and faults, the OS picks the interleaving.
//!
//! ## Reproducibility
//!
//! ```bash
//! DST_SEED=12345 cargo test -p cc-containers
//! ```

pub mod env;
pub mod fault;
pub mod harness;
pub mod random;
pub mod stress;

pub use env::DstEnv;
pub use fault::{FaultConfig, FaultInjector, FaultStats, FaultType};
pub use harness::{DstHarness, HarnessConfig, HarnessResult};
pub use random::DeterministicRng;
pub use stress::{run_threads, StressConfig, StressReport, ThreadCtx, STRESS_OPS_DEFAULT};

/// Seed from `DST_SEED`, or a random one.
///
/// The seed is printed either way so a failing run can be repeated.
/// An unparsable `DST_SEED` falls back to a random seed with a warning.
#[must_use]
pub fn get_or_generate_seed() -> u64 {
    match std::env::var("DST_SEED").map(|s| s.parse::<u64>()) {
        Ok(Ok(seed)) => {
            println!("DST_SEED={seed} (from environment)");
            seed
        }
        Ok(Err(e)) => {
            let seed = rand::random::<u64>();
            eprintln!("ignoring invalid DST_SEED: {e}");
            println!("DST_SEED={seed} (randomly generated)");
            seed
        }
        Err(_) => {
            let seed = rand::random::<u64>();
            println!("DST_SEED={seed} (randomly generated)");
            seed
        }
    }
}

/// Number of seeds to run, from `DST_ITERATIONS` (default `default`).
#[must_use]
pub fn iterations_from_env(default: u64) -> u64 {
    std::env::var("DST_ITERATIONS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
