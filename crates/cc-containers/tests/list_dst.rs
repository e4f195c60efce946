//! DST and stress tests for `ConcurrentList`.
//!
//! Values are tagged with the thread that inserted them
//! (`thread_id << 32 | step`), so every value is unique and its owner is
//! recoverable from the value.

use std::cell::RefCell;

use cc_containers::ConcurrentList;
use cc_core::{ListProperties, ListPropertyChecker, PropertyChecker};
use cc_dst::{
    get_or_generate_seed, iterations_from_env, run_threads, DstHarness, FaultConfig, HarnessConfig,
    StressConfig,
};

fn tag(thread_id: usize, step: u64) -> u64 {
    ((thread_id as u64) << 32) | step
}

fn owner(value: u64) -> usize {
    (value >> 32) as usize
}

fn reachable(list: &ConcurrentList<u64>) -> Vec<u64> {
    let mut values = Vec::new();
    list.for_each(|v| values.push(*v));
    values
}

#[derive(Debug, Clone, Copy)]
enum ListOp {
    PushFront(u64),
    /// Remove every value whose low bits are divisible by the divisor
    RemoveMultiplesOf(u64),
    Find(u64),
}

struct TrackedList {
    list: ConcurrentList<u64>,
    inserted: RefCell<Vec<u64>>,
    removed: RefCell<Vec<u64>>,
}

impl TrackedList {
    fn new() -> Self {
        Self {
            list: ConcurrentList::new(),
            inserted: RefCell::new(Vec::new()),
            removed: RefCell::new(Vec::new()),
        }
    }

    fn apply(&self, op: ListOp) -> Result<(), String> {
        match op {
            ListOp::PushFront(value) => {
                self.list.push_front(value);
                self.inserted.borrow_mut().push(value);
            }
            ListOp::RemoveMultiplesOf(divisor) => {
                let mut removed = Vec::new();
                let count = self.list.remove_if(|v| {
                    let hit = (v & 0xFFFF_FFFF) % divisor == 0;
                    if hit {
                        removed.push(*v);
                    }
                    hit
                });
                if count != removed.len() {
                    return Err(format!("remove_if reported {count}, matched {}", removed.len()));
                }
                self.removed.borrow_mut().extend(removed);
            }
            ListOp::Find(low) => {
                let expected = reachable(&self.list)
                    .into_iter()
                    .find(|v| v & 0xFFFF_FFFF == low);
                let found = self.list.find_first_if(|v| v & 0xFFFF_FFFF == low);
                if found.as_deref().copied() != expected {
                    return Err(format!("find({low}) returned {found:?}, walk saw {expected:?}"));
                }
            }
        }
        Ok(())
    }
}

impl ListProperties for TrackedList {
    fn inserted_values(&self) -> Vec<u64> {
        self.inserted.borrow().clone()
    }

    fn removed_values(&self) -> Vec<u64> {
        self.removed.borrow().clone()
    }

    fn reachable_values(&self) -> Vec<u64> {
        reachable(&self.list)
    }
}

fn run_simulated(seed: u64, config: HarnessConfig) {
    let tracked = TrackedList::new();
    let mut harness = DstHarness::new(seed, config);

    let result = harness.run_concurrent(
        |env, thread_id, step| {
            let roll = env.rng().gen_range(0..10u32);
            Some(match roll {
                0..=5 => ListOp::PushFront(tag(thread_id, step)),
                6 => ListOp::RemoveMultiplesOf(env.rng().gen_range(2..7u64)),
                _ => ListOp::Find(env.rng().gen_range(0..step + 1)),
            })
        },
        |_, _, op| tracked.apply(op),
        || {
            let checker = ListPropertyChecker::new(&tracked);
            if checker.all_hold() {
                Ok(())
            } else {
                Err(checker.report())
            }
        },
    );
    assert!(result.all_invariants_held(), "{}", result.format());
    assert_eq!(
        tracked.list.len(),
        tracked.inserted.borrow().len() - tracked.removed.borrow().len()
    );
}

#[test]
fn test_simulated_interleavings_quick() {
    run_simulated(get_or_generate_seed(), HarnessConfig::quick());
}

#[test]
fn test_simulated_interleavings_many_seeds() {
    let base = get_or_generate_seed();
    for i in 0..iterations_from_env(20) {
        run_simulated(base.wrapping_add(i), HarnessConfig::default());
    }
}

/// One thread's share of a real-thread run.
struct ThreadView<'a> {
    inserted: &'a [u64],
    removed: &'a [u64],
    reachable: Vec<u64>,
}

impl ListProperties for ThreadView<'_> {
    fn inserted_values(&self) -> Vec<u64> {
        self.inserted.to_vec()
    }

    fn removed_values(&self) -> Vec<u64> {
        self.removed.to_vec()
    }

    fn reachable_values(&self) -> Vec<u64> {
        self.reachable.clone()
    }
}

/// Each thread inserts its own values and removes a subset of them.
///
/// Threads only remove their own values, so each thread's view of the
/// final list must satisfy the list properties on its own.
fn run_real_threads(config: &StressConfig) {
    let list = ConcurrentList::new();

    let report = run_threads(config, |ctx| {
        let mut inserted = Vec::new();
        let mut removed = Vec::new();
        let me = ctx.thread_id;
        for step in 0..ctx.operations_count {
            let value = tag(me, step);
            list.push_front(value);
            inserted.push(value);
            let _ = ctx.fault.perturb();

            if ctx.rng.gen_bool(0.05) {
                list.remove_if(|v| {
                    let hit = owner(*v) == me && v % 3 == 0;
                    if hit {
                        removed.push(*v);
                    }
                    hit
                });
            }
            if ctx.rng.gen_bool(0.05) {
                let found = list.find_first_if(|v| owner(*v) == me);
                assert_eq!(found.is_some(), inserted.len() > removed.len());
            }
        }
        (inserted, removed)
    });

    let all = reachable(&list);
    for value in &all {
        assert!(owner(*value) < config.threads_count, "fabricated value {value:#x}");
    }

    for (thread_id, (inserted, removed)) in report.results.iter().enumerate() {
        let view = ThreadView {
            inserted,
            removed,
            reachable: all.iter().copied().filter(|v| owner(*v) == thread_id).collect(),
        };
        let checker = ListPropertyChecker::new(&view).with_seed(config.seed.max(1));
        assert!(
            checker.all_hold(),
            "DST_SEED={} thread {}\n{}",
            config.seed,
            thread_id,
            checker.report()
        );
    }
}

#[test]
fn test_real_threads_quick_with_faults() {
    let config = StressConfig::quick(get_or_generate_seed())
        .with_threads_count(4)
        .with_fault_config(FaultConfig::aggressive());
    run_real_threads(&config);
}

#[test]
fn test_real_threads_concurrent_removal() {
    let config = StressConfig::quick(get_or_generate_seed()).with_threads_count(8);
    run_real_threads(&config);
}
