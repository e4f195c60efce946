//! Sharded map invariants.
//!
//! | Property | Description |
//! |----------|-------------|
//! | NoLostWrites | Every key in the model reads back its last written value |
//! | NoGhostKeys | Keys absent from the model read back as absent |
//! | StableSharding | A key always selects the same in-range bucket |

use std::collections::HashMap;

use crate::property::{PropertyChecker, PropertyResult};

const STRUCTURE: &str = "sharded_map";

/// Properties that a sharded map must satisfy.
///
/// The model is the sequential last-writer-wins view of the operations a
/// harness applied, keyed per key.
pub trait MapProperties {
    /// Expected contents after all operations.
    fn model(&self) -> HashMap<u64, u64>;

    /// Every key the harness ever touched.
    fn touched_keys(&self) -> Vec<u64>;

    /// Read a key from the real map.
    fn lookup(&self, key: u64) -> Option<u64>;

    /// Bucket the real map selects for `key`.
    fn bucket_of(&self, key: u64) -> usize;

    /// Number of buckets in the real map.
    fn buckets_count(&self) -> usize;
}

/// Property checker for map implementations.
pub struct MapPropertyChecker<'a, T: MapProperties> {
    map: &'a T,
}

impl<'a, T: MapProperties> MapPropertyChecker<'a, T> {
    #[must_use]
    pub fn new(map: &'a T) -> Self {
        Self { map }
    }

    fn check_no_lost_writes(&self) -> PropertyResult {
        let mut model: Vec<_> = self.map.model().into_iter().collect();
        model.sort_unstable();

        for (key, expected) in model {
            let actual = self.map.lookup(key);
            if actual != Some(expected) {
                return PropertyResult::fail(
                    "NoLostWrites",
                    STRUCTURE,
                    format!("Key {} expected {}, read {:?}", key, expected, actual),
                    None,
                );
            }
        }

        PropertyResult::pass("NoLostWrites", STRUCTURE)
    }

    fn check_no_ghost_keys(&self) -> PropertyResult {
        let model = self.map.model();

        for key in self.map.touched_keys() {
            if model.contains_key(&key) {
                continue;
            }
            if let Some(value) = self.map.lookup(key) {
                return PropertyResult::fail(
                    "NoGhostKeys",
                    STRUCTURE,
                    format!("Key {} was removed but reads back {}", key, value),
                    None,
                );
            }
        }

        PropertyResult::pass("NoGhostKeys", STRUCTURE)
    }

    fn check_stable_sharding(&self) -> PropertyResult {
        let buckets_count = self.map.buckets_count();

        for key in self.map.touched_keys() {
            let first = self.map.bucket_of(key);
            let second = self.map.bucket_of(key);
            if first != second || first >= buckets_count {
                return PropertyResult::fail(
                    "StableSharding",
                    STRUCTURE,
                    format!(
                        "Key {} selected buckets {} and {} of {}",
                        key, first, second, buckets_count
                    ),
                    None,
                );
            }
        }

        PropertyResult::pass("StableSharding", STRUCTURE)
    }
}

impl<T: MapProperties> PropertyChecker for MapPropertyChecker<'_, T> {
    fn check_all(&self) -> Vec<PropertyResult> {
        vec![
            self.check_no_lost_writes(),
            self.check_no_ghost_keys(),
            self.check_stable_sharding(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fake {
        model: HashMap<u64, u64>,
        actual: HashMap<u64, u64>,
        touched: Vec<u64>,
    }

    impl MapProperties for Fake {
        fn model(&self) -> HashMap<u64, u64> {
            self.model.clone()
        }
        fn touched_keys(&self) -> Vec<u64> {
            self.touched.clone()
        }
        fn lookup(&self, key: u64) -> Option<u64> {
            self.actual.get(&key).copied()
        }
        fn bucket_of(&self, key: u64) -> usize {
            (key % 19) as usize
        }
        fn buckets_count(&self) -> usize {
            19
        }
    }

    #[test]
    fn test_matching_map_passes() {
        let model: HashMap<u64, u64> = [(1, 10), (2, 20)].into_iter().collect();
        let fake = Fake {
            actual: model.clone(),
            model,
            touched: vec![1, 2, 3],
        };
        let checker = MapPropertyChecker::new(&fake);
        assert!(checker.all_hold(), "{}", checker.report());
    }

    #[test]
    fn test_lost_write_and_ghost_detected() {
        let fake = Fake {
            model: [(1, 10)].into_iter().collect(),
            actual: [(1, 11), (3, 30)].into_iter().collect(),
            touched: vec![1, 3],
        };
        let names: Vec<_> = MapPropertyChecker::new(&fake)
            .violations()
            .into_iter()
            .map(|r| r.name)
            .collect();
        assert_eq!(names, vec!["NoLostWrites", "NoGhostKeys"]);
    }
}
