//! Concurrent list invariants.
//!
//! | Property | Description |
//! |----------|-------------|
//! | NoLostElements | Every inserted-not-removed value is reachable from the head |
//! | NoResurrection | Nothing reachable was removed or never inserted |
//! | FrontInsertionOrder | Reachable values appear newest first |

use crate::counterexample::{Counterexample, StateSnapshot};
use crate::invariants::{first_excess, multiset};
use crate::property::{PropertyChecker, PropertyResult};

const STRUCTURE: &str = "concurrent_list";

/// Properties that a push-front list must satisfy.
pub trait ListProperties {
    /// Values inserted, in the order the insertions completed.
    fn inserted_values(&self) -> Vec<u64>;

    /// Values removed, with repetitions.
    fn removed_values(&self) -> Vec<u64>;

    /// Values reachable from the head, in traversal order.
    fn reachable_values(&self) -> Vec<u64>;
}

/// Property checker for list implementations.
pub struct ListPropertyChecker<'a, T: ListProperties> {
    list: &'a T,
    dst_seed: Option<u64>,
}

impl<'a, T: ListProperties> ListPropertyChecker<'a, T> {
    #[must_use]
    pub fn new(list: &'a T) -> Self {
        Self {
            list,
            dst_seed: None,
        }
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        self.dst_seed = Some(seed);
        self
    }

    /// Live multiset: inserted minus removed.
    fn live(&self) -> std::collections::HashMap<u64, usize> {
        let mut live = multiset(self.list.inserted_values());
        for value in self.list.removed_values() {
            if let Some(count) = live.get_mut(&value) {
                *count = count.saturating_sub(1);
            }
        }
        live.retain(|_, count| *count > 0);
        live
    }

    fn check_no_lost_elements(&self) -> PropertyResult {
        let live = self.live();
        let reachable = multiset(self.list.reachable_values());

        match first_excess(&live, &reachable) {
            None => PropertyResult::pass("NoLostElements", STRUCTURE),
            Some((value, expected, found)) => {
                let mut ce = match self.dst_seed {
                    Some(seed) => Counterexample::with_seed(seed),
                    None => Counterexample::new(),
                };
                ce.add_state(StateSnapshot {
                    step: 1,
                    description: format!("Value {} lost", value),
                    variables: vec![(
                        "reachable".to_string(),
                        format!("{:?}", self.list.reachable_values()),
                    )],
                });
                PropertyResult::fail(
                    "NoLostElements",
                    STRUCTURE,
                    format!(
                        "Value {} should be reachable {} time(s), found {}",
                        value, expected, found
                    ),
                    Some(ce),
                )
            }
        }
    }

    fn check_no_resurrection(&self) -> PropertyResult {
        let live = self.live();
        let reachable = multiset(self.list.reachable_values());

        match first_excess(&reachable, &live) {
            None => PropertyResult::pass("NoResurrection", STRUCTURE),
            Some((value, found, expected)) => PropertyResult::fail(
                "NoResurrection",
                STRUCTURE,
                format!(
                    "Value {} reachable {} time(s) but only {} live",
                    value, found, expected
                ),
                None,
            ),
        }
    }

    /// Reachable values must appear in reverse insertion order.
    ///
    /// Values are matched to insertions by their last occurrence, so this
    /// check is exact only when inserted values are unique.
    fn check_front_insertion_order(&self) -> PropertyResult {
        let inserted = self.list.inserted_values();
        let position = |value: u64| inserted.iter().rposition(|&v| v == value);

        let reachable = self.list.reachable_values();
        let mut previous: Option<(u64, usize)> = None;
        for value in reachable {
            let Some(index) = position(value) else {
                continue;
            };
            if let Some((prev_value, prev_index)) = previous {
                if index > prev_index {
                    return PropertyResult::fail(
                        "FrontInsertionOrder",
                        STRUCTURE,
                        format!(
                            "Value {} (inserted #{}) follows older value {} (inserted #{})",
                            value, index, prev_value, prev_index
                        ),
                        None,
                    );
                }
            }
            previous = Some((value, index));
        }

        PropertyResult::pass("FrontInsertionOrder", STRUCTURE)
    }
}

impl<T: ListProperties> PropertyChecker for ListPropertyChecker<'_, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_no_lost_elements(),
            self.check_no_resurrection(),
            self.check_front_insertion_order(),
        ]
    }
}
