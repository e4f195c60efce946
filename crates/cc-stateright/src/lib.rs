//! # cc-stateright
//!
//! Stateright model of the lock-free stack's pop path and its
//! counter-gated node reclamation.
//!
//! Loom explores real code but only small interleavings of whole
//! operations. The model here breaks `pop` into its individual atomic
//! steps and explores every interleaving of up to three popping threads,
//! checking that no node is dereferenced after it is freed and that no
//! node is freed twice.
//!
//! ## Usage
//!
//! ```ignore
//! use cc_stateright::{ReclaimModel, Reclamation};
//! use stateright::{Checker, Model};
//!
//! ReclaimModel::new(3, 2, Reclamation::CounterGated)
//!     .checker()
//!     .spawn_bfs()
//!     .join()
//!     .assert_properties();
//! ```

pub mod reclaim;

pub use reclaim::{
    replay_counterexample, PopStep, ReclaimAction, ReclaimModel, ReclaimState, Reclamation,
    ThreadState,
};
