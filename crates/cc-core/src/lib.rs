//! # cc-core
//!
//! Core types and invariants for the concurrent containers.
//!
//! This crate provides:
//! - `PropertyResult` and `PropertyChecker` for verifying invariants
//! - `Counterexample` for rendering failure paths
//! - Invariant traits for each container (`StackProperties`,
//!   `ListProperties`, `MapProperties`)
//!
//! The containers themselves do not depend on this crate. Test harnesses
//! wrap a container, record what they did to it, and hand the wrapper to
//! a checker.

pub mod counterexample;
pub mod invariants;
pub mod property;

pub use counterexample::{Counterexample, MemoryIssue, StateSnapshot, ThreadAction};
pub use invariants::{
    ListProperties, ListPropertyChecker, MapProperties, MapPropertyChecker, StackHistory,
    StackOpType, StackOperation, StackProperties, StackPropertyChecker,
};
pub use property::{PropertyChecker, PropertyResult};
