//! DST and stress tests for `ShardedMap`.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use cc_containers::{MapConfig, ShardedMap};
use cc_core::{MapProperties, MapPropertyChecker, PropertyChecker};
use cc_dst::{
    get_or_generate_seed, iterations_from_env, run_threads, DstHarness, HarnessConfig, StressConfig,
};

#[derive(Debug, Clone, Copy)]
enum MapOp {
    Put(u64, u64),
    Remove(u64),
    Get(u64),
}

/// A map under test plus the expected contents.
struct Checked<'a> {
    map: &'a ShardedMap<u64, u64>,
    model: HashMap<u64, u64>,
    touched: HashSet<u64>,
}

impl MapProperties for Checked<'_> {
    fn model(&self) -> HashMap<u64, u64> {
        self.model.clone()
    }

    fn touched_keys(&self) -> Vec<u64> {
        let mut keys: Vec<u64> = self.touched.iter().copied().collect();
        keys.sort_unstable();
        keys
    }

    fn lookup(&self, key: u64) -> Option<u64> {
        self.map.get(&key)
    }

    fn bucket_of(&self, key: u64) -> usize {
        self.map.bucket_index(&key)
    }

    fn buckets_count(&self) -> usize {
        self.map.buckets_count()
    }
}

fn assert_holds(checked: &Checked<'_>, seed: u64) {
    let checker = MapPropertyChecker::new(checked);
    assert!(checker.all_hold(), "DST_SEED={}\n{}", seed, checker.report());
}

fn run_simulated(seed: u64, config: HarnessConfig) {
    let map = ShardedMap::with_buckets(7).unwrap();
    let model = RefCell::new(HashMap::new());
    let touched = RefCell::new(HashSet::new());
    let mut harness = DstHarness::new(seed, config);

    // Keys are shared between logical threads, so last-writer-wins is
    // observable across threads.
    let result = harness.run_concurrent(
        |env, _, _| {
            let key = env.rng().gen_range(0..64u64);
            Some(match env.rng().gen_range(0..3u32) {
                0 => MapOp::Put(key, env.rng().gen()),
                1 => MapOp::Remove(key),
                _ => MapOp::Get(key),
            })
        },
        |_, _, op| {
            match op {
                MapOp::Put(key, value) => {
                    map.add_or_update(key, value);
                    model.borrow_mut().insert(key, value);
                    touched.borrow_mut().insert(key);
                }
                MapOp::Remove(key) => {
                    let expected = model.borrow_mut().remove(&key);
                    let actual = map.remove(&key);
                    touched.borrow_mut().insert(key);
                    if actual != expected {
                        return Err(format!(
                            "remove({key}) returned {actual:?}, expected {expected:?}"
                        ));
                    }
                }
                MapOp::Get(key) => {
                    let expected = model.borrow().get(&key).copied().unwrap_or(u64::MAX);
                    let actual = map.get_value(&key, u64::MAX);
                    if actual != expected {
                        return Err(format!("get({key}) returned {actual}, expected {expected}"));
                    }
                }
            }
            Ok(())
        },
        || {
            if map.len() == model.borrow().len() {
                Ok(())
            } else {
                Err(format!("map holds {} pairs, model {}", map.len(), model.borrow().len()))
            }
        },
    );
    assert!(result.all_invariants_held(), "{}", result.format());

    let checked = Checked {
        map: &map,
        model: model.into_inner(),
        touched: touched.into_inner(),
    };
    assert_holds(&checked, seed);
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

/// Fill the map, then one thread reads the first half while another
/// deletes the second half.
#[test]
fn test_read_first_half_delete_second_half() {
    const KEYS: u64 = 10_000;
    let map = ShardedMap::with_config(&MapConfig::default()).unwrap();
    for key in 0..KEYS {
        map.add_or_update(key, key * 2);
    }

    let config = StressConfig::quick(get_or_generate_seed()).with_threads_count(2);
    let report = run_threads(&config, |ctx| {
        if ctx.thread_id == 0 {
            (0..KEYS / 2)
                .filter(|k| map.get_value(k, u64::MAX) == k * 2)
                .count() as u64
        } else {
            (KEYS / 2..KEYS).filter(|k| map.remove(k).is_some()).count() as u64
        }
    });
    assert_eq!(report.results, vec![KEYS / 2, KEYS / 2]);

    let checked = Checked {
        map: &map,
        model: (0..KEYS / 2).map(|k| (k, k * 2)).collect(),
        touched: (0..KEYS).collect(),
    };
    assert_holds(&checked, config.seed.max(1));
    assert_eq!(map.len(), (KEYS / 2) as usize);
}

/// Threads own disjoint key ranges and run random operations on them.
#[test]
fn test_real_threads_disjoint_ranges() {
    const KEYS_PER_THREAD: u64 = 256;
    let map = ShardedMap::with_buckets(13).unwrap();
    let config = StressConfig::quick(get_or_generate_seed()).with_threads_count(8);

    let report = run_threads(&config, |ctx| {
        let base = ctx.thread_id as u64 * KEYS_PER_THREAD;
        let mut model = HashMap::new();
        let mut touched = HashSet::new();
        for _ in 0..ctx.operations_count {
            let key = base + ctx.rng.gen_range(0..KEYS_PER_THREAD);
            touched.insert(key);
            if ctx.rng.gen_bool(0.6) {
                let value: u64 = ctx.rng.gen();
                map.add_or_update(key, value);
                model.insert(key, value);
            } else {
                assert_eq!(map.remove(&key), model.remove(&key));
            }
            assert_eq!(map.get(&key), model.get(&key).copied());
        }
        (model, touched)
    });

    let mut checked = Checked {
        map: &map,
        model: HashMap::new(),
        touched: HashSet::new(),
    };
    for (model, touched) in report.results {
        checked.model.extend(model);
        checked.touched.extend(touched);
    }
    assert_eq!(map.len(), checked.model.len());
    assert_holds(&checked, config.seed.max(1));
}
