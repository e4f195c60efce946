//! Stack invariants.
//!
//! | Property | Description |
//! |----------|-------------|
//! | NoLostElements | Every pushed element is in the stack or was popped |
//! | NoFabricatedElements | Nothing is popped or present more often than it was pushed |
//! | LIFO_Order | A sequential history replays against a model stack |
//!
//! The first two together are the conservation law: pushed multiset equals
//! popped multiset plus current contents. Values may repeat.

use crate::counterexample::{Counterexample, StateSnapshot};
use crate::invariants::{first_excess, multiset};
use crate::property::{PropertyChecker, PropertyResult};

const STRUCTURE: &str = "lock_free_stack";

/// Properties that any stack implementation must satisfy.
///
/// Implementations (usually a test wrapper around the real stack) expose
/// what was pushed, what was popped, and what is left.
pub trait StackProperties {
    /// Every value that was pushed, with repetitions.
    fn pushed_elements(&self) -> Vec<u64>;

    /// Every value that a pop returned, with repetitions.
    fn popped_elements(&self) -> Vec<u64>;

    /// Current contents of the stack (top to bottom).
    ///
    /// Only meaningful while the stack is quiescent.
    fn current_contents(&self) -> Vec<u64>;

    /// Sequential operation history, if the run was single-threaded.
    ///
    /// Concurrent runs return `None`: their recorded order is not a
    /// linearization, so LIFO cannot be checked from it.
    fn history(&self) -> Option<StackHistory>;
}

/// History of stack operations in linearization order.
#[derive(Debug, Clone, Default)]
pub struct StackHistory {
    pub operations: Vec<StackOperation>,
}

/// A single stack operation.
#[derive(Debug, Clone)]
pub struct StackOperation {
    /// Thread that performed the operation
    pub thread_id: u64,
    /// Type of operation
    pub op_type: StackOpType,
    /// Element involved (pushed value, or pop result)
    pub element: Option<u64>,
    /// Step number for ordering
    pub step: u64,
}

/// Type of stack operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackOpType {
    Push,
    Pop,
    PopEmpty,
}

impl StackHistory {
    /// Create a new empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a push operation.
    pub fn record_push(&mut self, thread_id: u64, element: u64) {
        let step = self.next_step();
        self.operations.push(StackOperation {
            thread_id,
            op_type: StackOpType::Push,
            element: Some(element),
            step,
        });
    }

    /// Record a pop operation.
    pub fn record_pop(&mut self, thread_id: u64, element: Option<u64>) {
        let step = self.next_step();
        self.operations.push(StackOperation {
            thread_id,
            op_type: if element.is_some() {
                StackOpType::Pop
            } else {
                StackOpType::PopEmpty
            },
            element,
            step,
        });
    }

    fn next_step(&self) -> u64 {
        self.operations.len() as u64 + 1
    }
}

/// Property checker for stack implementations.
pub struct StackPropertyChecker<'a, T: StackProperties> {
    stack: &'a T,
    dst_seed: Option<u64>,
}

impl<'a, T: StackProperties> StackPropertyChecker<'a, T> {
    /// Create a new checker for the given stack.
    #[must_use]
    pub fn new(stack: &'a T) -> Self {
        Self {
            stack,
            dst_seed: None,
        }
    }

    /// Set DST seed for counterexample reproduction.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        debug_assert!(seed != 0, "DST seed should not be zero");
        self.dst_seed = Some(seed);
        self
    }

    fn counterexample(&self) -> Counterexample {
        match self.dst_seed {
            Some(seed) => Counterexample::with_seed(seed),
            None => Counterexample::new(),
        }
    }

    /// Every pushed element is either still in the stack or was popped.
    fn check_no_lost_elements(&self) -> PropertyResult {
        let pushed = multiset(self.stack.pushed_elements());
        let accounted = multiset(
            self.stack
                .popped_elements()
                .into_iter()
                .chain(self.stack.current_contents()),
        );

        match first_excess(&pushed, &accounted) {
            None => PropertyResult::pass("NoLostElements", STRUCTURE),
            Some((element, pushed_count, accounted_count)) => {
                let mut ce = self.counterexample();
                ce.add_state(StateSnapshot {
                    step: 1,
                    description: format!("Element {} lost", element),
                    variables: vec![
                        ("pushed".to_string(), pushed_count.to_string()),
                        ("popped+contents".to_string(), accounted_count.to_string()),
                    ],
                });
                PropertyResult::fail(
                    "NoLostElements",
                    STRUCTURE,
                    format!(
                        "Element {} pushed {} time(s) but only {} popped or present",
                        element, pushed_count, accounted_count
                    ),
                    Some(ce),
                )
            }
        }
    }

    /// No element is popped or present more often than it was pushed.
    fn check_no_fabricated_elements(&self) -> PropertyResult {
        let pushed = multiset(self.stack.pushed_elements());
        let accounted = multiset(
            self.stack
                .popped_elements()
                .into_iter()
                .chain(self.stack.current_contents()),
        );

        match first_excess(&accounted, &pushed) {
            None => PropertyResult::pass("NoFabricatedElements", STRUCTURE),
            Some((element, seen, pushed_count)) => PropertyResult::fail(
                "NoFabricatedElements",
                STRUCTURE,
                format!(
                    "Element {} seen {} time(s) but pushed only {} time(s)",
                    element, seen, pushed_count
                ),
                None,
            ),
        }
    }

    /// Replay the sequential history against a model stack.
    fn check_lifo_order(&self) -> PropertyResult {
        let Some(history) = self.stack.history() else {
            return PropertyResult::pass("LIFO_Order", STRUCTURE);
        };

        let mut model_stack: Vec<u64> = Vec::new();

        for op in &history.operations {
            match op.op_type {
                StackOpType::Push => {
                    if let Some(e) = op.element {
                        model_stack.push(e);
                    }
                }
                StackOpType::Pop => {
                    let Some(expected) = op.element else { continue };
                    match model_stack.pop() {
                        Some(actual) if actual != expected => {
                            return PropertyResult::fail(
                                "LIFO_Order",
                                STRUCTURE,
                                format!(
                                    "pop returned {} but model expected {} (step {})",
                                    expected, actual, op.step
                                ),
                                None,
                            );
                        }
                        None => {
                            return PropertyResult::fail(
                                "LIFO_Order",
                                STRUCTURE,
                                format!(
                                    "pop returned {} but model stack was empty (step {})",
                                    expected, op.step
                                ),
                                None,
                            );
                        }
                        Some(_) => {}
                    }
                }
                StackOpType::PopEmpty => {
                    if !model_stack.is_empty() {
                        return PropertyResult::fail(
                            "LIFO_Order",
                            STRUCTURE,
                            format!(
                                "pop returned None but model has {} elements (step {})",
                                model_stack.len(),
                                op.step
                            ),
                            None,
                        );
                    }
                }
            }
        }

        PropertyResult::pass("LIFO_Order", STRUCTURE)
    }
}

impl<T: StackProperties> PropertyChecker for StackPropertyChecker<'_, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_no_lost_elements(),
            self.check_no_fabricated_elements(),
            self.check_lifo_order(),
        ]
    }
}
