//! Model of `pop` with counter-gated reclamation.
//!
//! The stack starts with `nodes_count` nodes, node 0 on top. Each thread
//! performs one `pop`, one atomic step per action:
//!
//! ```text
//! Enter      threads_in_pop += 1
//! LoadHead   old = head                  (empty: LeaveEmpty)
//! ReadNext   next = old.next             (dereferences old)
//! Cas        head == old ? head = next : retry from LoadHead
//! ReadValue  take old.value              (dereferences old)
//!            threads_in_pop == 1 ? Claim : Defer
//! Claim      claimed = swap(pending, empty)
//! Release    threads_in_pop -= 1; sole popper ? free claimed : re-chain
//!            free old
//! Defer      pending += old
//! Leave      threads_in_pop -= 1
//! ```
//!
//! Memory is sequentially consistent, matching the `SeqCst` orderings the
//! implementation uses on the reclamation path.

use std::fmt;

use cc_core::{Counterexample, MemoryIssue, StateSnapshot, ThreadAction};
use stateright::{Model, Property};

/// Reclamation rule applied at `Release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reclamation {
    /// Free claimed nodes only if the decrement shows no other popper
    CounterGated,
    /// Free claimed nodes without re-checking the counter (unsound)
    SkipRecheck,
}

/// Program counter of a popping thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PopStep {
    Enter,
    LoadHead,
    LeaveEmpty,
    ReadNext,
    Cas,
    ReadValue,
    Claim,
    Release,
    Defer,
    Leave,
    Done,
}

impl fmt::Display for PopStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Enter => "enter",
            Self::LoadHead => "load_head",
            Self::LeaveEmpty => "leave_empty",
            Self::ReadNext => "read_next",
            Self::Cas => "cas",
            Self::ReadValue => "read_value",
            Self::Claim => "claim",
            Self::Release => "release",
            Self::Defer => "defer",
            Self::Leave => "leave",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Local state of one popping thread.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ThreadState {
    pub step: PopStep,
    pub old_head: Option<u8>,
    pub next: Option<u8>,
    pub claimed: Vec<u8>,
    pub popped: Option<u8>,
}

impl ThreadState {
    fn new() -> Self {
        Self {
            step: PopStep::Enter,
            old_head: None,
            next: None,
            claimed: Vec::new(),
            popped: None,
        }
    }

    fn in_pop(&self) -> bool {
        !matches!(self.step, PopStep::Enter | PopStep::Done)
    }
}

/// Global state: shared stack words plus every thread's locals.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReclaimState {
    pub head: Option<u8>,
    pub threads_in_pop: u8,
    pub pending: Vec<u8>,
    pub freed: Vec<bool>,
    pub threads: Vec<ThreadState>,
    /// Nodes dereferenced while freed
    pub use_after_free: Vec<u8>,
    /// Nodes freed while already freed
    pub double_free: Vec<u8>,
}

impl ReclaimState {
    fn deref(&mut self, node: u8) {
        if self.freed[usize::from(node)] {
            self.use_after_free.push(node);
        }
    }

    fn free(&mut self, node: u8) {
        let slot = &mut self.freed[usize::from(node)];
        if *slot {
            self.double_free.push(node);
        }
        *slot = true;
    }

    fn all_done(&self) -> bool {
        self.threads.iter().all(|t| t.step == PopStep::Done)
    }
}

/// Thread `thread` takes its next step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReclaimAction {
    pub thread: u8,
}

/// Exhaustive model of concurrent pops.
#[derive(Debug, Clone)]
pub struct ReclaimModel {
    pub threads_count: u8,
    pub nodes_count: u8,
    pub reclamation: Reclamation,
}

impl ReclaimModel {
    #[must_use]
    pub fn new(threads_count: u8, nodes_count: u8, reclamation: Reclamation) -> Self {
        debug_assert!(threads_count > 0);
        Self {
            threads_count,
            nodes_count,
            reclamation,
        }
    }

    #[must_use]
    pub fn initial_state(&self) -> ReclaimState {
        ReclaimState {
            head: (self.nodes_count > 0).then_some(0),
            threads_in_pop: 0,
            pending: Vec::new(),
            freed: vec![false; usize::from(self.nodes_count)],
            threads: (0..self.threads_count).map(|_| ThreadState::new()).collect(),
            use_after_free: Vec::new(),
            double_free: Vec::new(),
        }
    }

    fn next_of(&self, node: u8) -> Option<u8> {
        let next = node + 1;
        (next < self.nodes_count).then_some(next)
    }

    /// Apply one step of `thread`. Returns whether a CAS in this step failed.
    fn step(&self, state: &mut ReclaimState, thread: usize) -> bool {
        let mut cas_failed = false;
        let mut local = state.threads[thread].clone();

        local.step = match local.step {
            PopStep::Enter => {
                state.threads_in_pop += 1;
                PopStep::LoadHead
            }
            PopStep::LoadHead => {
                local.old_head = state.head;
                if local.old_head.is_some() {
                    PopStep::ReadNext
                } else {
                    PopStep::LeaveEmpty
                }
            }
            PopStep::LeaveEmpty | PopStep::Leave => {
                state.threads_in_pop -= 1;
                PopStep::Done
            }
            PopStep::ReadNext => {
                let old = local.old_head.unwrap_or_default();
                state.deref(old);
                local.next = self.next_of(old);
                PopStep::Cas
            }
            PopStep::Cas => {
                if state.head == local.old_head {
                    state.head = local.next;
                    PopStep::ReadValue
                } else {
                    cas_failed = true;
                    PopStep::LoadHead
                }
            }
            PopStep::ReadValue => {
                let old = local.old_head.unwrap_or_default();
                state.deref(old);
                local.popped = Some(old);
                if state.threads_in_pop == 1 {
                    PopStep::Claim
                } else {
                    PopStep::Defer
                }
            }
            PopStep::Claim => {
                local.claimed = std::mem::take(&mut state.pending);
                PopStep::Release
            }
            PopStep::Release => {
                let previous = state.threads_in_pop;
                state.threads_in_pop -= 1;
                let claimed = std::mem::take(&mut local.claimed);
                if previous == 1 || self.reclamation == Reclamation::SkipRecheck {
                    for node in claimed {
                        state.free(node);
                    }
                } else {
                    state.pending.extend(claimed);
                }
                state.free(local.old_head.unwrap_or_default());
                PopStep::Done
            }
            PopStep::Defer => {
                state.pending.push(local.old_head.unwrap_or_default());
                PopStep::Leave
            }
            PopStep::Done => PopStep::Done,
        };

        state.threads[thread] = local;
        cas_failed
    }
}

impl Model for ReclaimModel {
    type State = ReclaimState;
    type Action = ReclaimAction;

    fn init_states(&self) -> Vec<Self::State> {
        vec![self.initial_state()]
    }

    fn actions(&self, state: &Self::State, actions: &mut Vec<Self::Action>) {
        for (thread, local) in state.threads.iter().enumerate() {
            if local.step != PopStep::Done {
                actions.push(ReclaimAction {
                    thread: thread as u8,
                });
            }
        }
    }

    fn next_state(&self, last_state: &Self::State, action: Self::Action) -> Option<Self::State> {
        let thread = usize::from(action.thread);
        if last_state.threads.get(thread)?.step == PopStep::Done {
            return None;
        }
        let mut state = last_state.clone();
        self.step(&mut state, thread);
        Some(state)
    }

    fn properties(&self) -> Vec<Property<Self>> {
        vec![
            Property::<Self>::always("no use after free", |_, state| {
                state.use_after_free.is_empty()
            }),
            Property::<Self>::always("no double free", |_, state| state.double_free.is_empty()),
            Property::<Self>::always("each node popped once", |_, state| {
                let mut popped: Vec<u8> = state.threads.iter().filter_map(|t| t.popped).collect();
                let count = popped.len();
                popped.sort_unstable();
                popped.dedup();
                popped.len() == count
            }),
            Property::<Self>::always("counter tracks poppers", |_, state| {
                let in_pop = state.threads.iter().filter(|t| t.in_pop()).count();
                usize::from(state.threads_in_pop) == in_pop
            }),
            Property::<Self>::always("popped nodes accounted at quiescence", |_, state| {
                !state.all_done()
                    || state.threads.iter().filter_map(|t| t.popped).all(|node| {
                        state.freed[usize::from(node)] || state.pending.contains(&node)
                    })
            }),
            Property::<Self>::sometimes("reclamation deferred", |_, state| {
                !state.pending.is_empty()
            }),
        ]
    }
}

fn describe(state: &ReclaimState) -> Vec<(String, String)> {
    let node = |n: Option<u8>| n.map_or_else(|| "null".to_string(), |n| format!("N{n}"));
    let freed: Vec<String> = state
        .freed
        .iter()
        .enumerate()
        .filter(|(_, freed)| **freed)
        .map(|(n, _)| format!("N{n}"))
        .collect();
    vec![
        ("head".to_string(), node(state.head)),
        ("in_pop".to_string(), state.threads_in_pop.to_string()),
        ("pending".to_string(), format!("{:?}", state.pending)),
        ("freed".to_string(), format!("[{}]", freed.join(","))),
    ]
}

/// Replay `actions` from the initial state into a `Counterexample`.
///
/// Every action becomes a thread action and a state snapshot. Use-after-free
/// and double-free events become memory issues carrying the step that
/// freed the node and the step that misused it. A popped node that is
/// neither freed nor pending once all threads finish is reported as leaked.
#[must_use]
pub fn replay_counterexample(model: &ReclaimModel, actions: &[ReclaimAction]) -> Counterexample {
    let mut state = model.initial_state();
    let mut freed_at = vec![0u64; usize::from(model.nodes_count)];
    let mut ce = Counterexample::new();

    for (index, action) in actions.iter().enumerate() {
        let step = index as u64 + 1;
        let thread = usize::from(action.thread);
        let Some(local) = state.threads.get(thread) else {
            break;
        };
        let label = local.step;
        let freed_before = state.freed.clone();
        let uaf_before = state.use_after_free.len();
        let double_before = state.double_free.len();

        let cas_failed = model.step(&mut state, thread);

        for (node, (was, is)) in freed_before.iter().zip(&state.freed).enumerate() {
            if !was && *is {
                freed_at[node] = step;
            }
        }
        for &node in &state.use_after_free[uaf_before..] {
            ce.add_memory_issue(MemoryIssue::UseAfterFree {
                node: u64::from(node),
                freed_at_step: freed_at[usize::from(node)],
                used_at_step: step,
            });
        }
        for &node in &state.double_free[double_before..] {
            ce.add_memory_issue(MemoryIssue::DoubleFree {
                node: u64::from(node),
                step,
            });
        }

        ce.add_action(ThreadAction {
            thread_id: u64::from(action.thread),
            step,
            action: label.to_string(),
            success: !cas_failed,
        });
        ce.add_state(StateSnapshot {
            step,
            description: format!("T{} {}", action.thread, label),
            variables: describe(&state),
        });
    }

    if state.all_done() {
        for node in state.threads.iter().filter_map(|t| t.popped) {
            if !state.freed[usize::from(node)] && !state.pending.contains(&node) {
                ce.add_memory_issue(MemoryIssue::Leak {
                    node: u64::from(node),
                });
            }
        }
    }

    match ce.memory_issues.first().map(ToString::to_string) {
        Some(description) => ce.with_description(description),
        None => ce,
    }
}
