//! Invariant traits for the concurrent containers.
//!
//! Each module defines the properties an implementation must satisfy and
//! a checker that evaluates them against a recorded run.
//!
//! - `stack`: lock-free stack (conservation, LIFO order)
//! - `list`: hand-over-hand list (no lost nodes, no resurrected nodes,
//!   front-insertion order)
//! - `map`: sharded map (no lost writes, no ghost keys, stable sharding)

pub mod list;
pub mod map;
pub mod stack;

pub use list::{ListProperties, ListPropertyChecker};
pub use map::{MapProperties, MapPropertyChecker};
pub use stack::{StackHistory, StackOpType, StackOperation, StackProperties, StackPropertyChecker};

use std::collections::HashMap;

/// Count occurrences of each value.
pub(crate) fn multiset<I: IntoIterator<Item = u64>>(values: I) -> HashMap<u64, usize> {
    let mut counts = HashMap::new();
    for value in values {
        *counts.entry(value).or_insert(0) += 1;
    }
    counts
}

/// First value whose count in `sub` exceeds its count in `sup`.
pub(crate) fn first_excess(
    sub: &HashMap<u64, usize>,
    sup: &HashMap<u64, usize>,
) -> Option<(u64, usize, usize)> {
    let mut keys: Vec<_> = sub.keys().copied().collect();
    keys.sort_unstable();
    keys.into_iter().find_map(|value| {
        let have = sub[&value];
        let allowed = sup.get(&value).copied().unwrap_or(0);
        (have > allowed).then_some((value, have, allowed))
    })
}
