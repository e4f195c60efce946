//! Concurrent key/value map sharded over a fixed array of buckets.
//!
//! A key's bucket is `hash(key) % buckets_count`. The bucket count and the
//! hasher never change after construction, so a key maps to the same
//! bucket for the map's whole lifetime. Each operation locks exactly one
//! bucket, so operations on different buckets never contend and no lock
//! ordering between buckets exists.

use std::borrow::Borrow;
use std::collections::hash_map::DefaultHasher;
use std::hash::{BuildHasher, BuildHasherDefault, Hash};

use tracing::debug;

use crate::bucket::Bucket;
use crate::config::MapConfig;
use crate::error::Result;

/// Hasher used when none is supplied. Deterministic within a process.
pub type DefaultHashBuilder = BuildHasherDefault<DefaultHasher>;

/// A concurrent map with bucket-level parallelism.
pub struct ShardedMap<K, V, S = DefaultHashBuilder> {
    buckets: Box<[Bucket<K, V>]>,
    hash_builder: S,
}

impl<K, V> ShardedMap<K, V>
where
    K: Hash + Eq,
{
    /// Create a map with the default 19 buckets.
    #[must_use]
    pub fn new() -> Self {
        let config = MapConfig::default();
        Self::build(config.buckets_count, DefaultHashBuilder::default())
    }

    /// Create a map with `buckets_count` buckets.
    pub fn with_buckets(buckets_count: usize) -> Result<Self> {
        Self::with_config(&MapConfig::default().with_buckets_count(buckets_count))
    }

    /// Create a map from a validated configuration.
    pub fn with_config(config: &MapConfig) -> Result<Self> {
        Self::with_config_and_hasher(config, DefaultHashBuilder::default())
    }
}

impl<K, V, S> ShardedMap<K, V, S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    /// Create a map with `buckets_count` buckets and a custom hasher.
    pub fn with_hasher(buckets_count: usize, hash_builder: S) -> Result<Self> {
        Self::with_config_and_hasher(
            &MapConfig::default().with_buckets_count(buckets_count),
            hash_builder,
        )
    }

    /// Create a map from a configuration and a custom hasher.
    pub fn with_config_and_hasher(config: &MapConfig, hash_builder: S) -> Result<Self> {
        config.validate()?;
        Ok(Self::build(config.buckets_count, hash_builder))
    }

    fn build(buckets_count: usize, hash_builder: S) -> Self {
        debug_assert!(buckets_count > 0, "bucket count must be positive");
        debug!(buckets_count, "creating sharded map");
        Self {
            buckets: (0..buckets_count).map(|_| Bucket::new()).collect(),
            hash_builder,
        }
    }

    /// Value stored for `key`, or `default` if there is none.
    pub fn get_value<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.bucket(key).get_value(key, default)
    }

    /// Value stored for `key`, if any.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.bucket(key).get(key)
    }

    /// Insert `key`, or overwrite its value if present.
    pub fn add_or_update(&self, key: K, value: V) {
        self.bucket(&key).add_or_update(key, value);
    }

    /// Remove `key`, returning its value. Removing an absent key is a no-op.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.bucket(key).remove(key)
    }

    /// Index of the bucket `key` belongs to.
    pub fn bucket_index<Q>(&self, key: &Q) -> usize
    where
        Q: Hash + ?Sized,
    {
        // Truncating the hash on 32-bit targets still spreads keys.
        (self.hash_builder.hash_one(key) as usize) % self.buckets.len()
    }

    /// Number of buckets, fixed at construction.
    #[must_use]
    pub fn buckets_count(&self) -> usize {
        self.buckets.len()
    }

    /// Number of pairs, summed bucket by bucket.
    ///
    /// Buckets are read one at a time, so under concurrent writes the sum
    /// is not a snapshot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(Bucket::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Bucket::is_empty)
    }

    fn bucket<Q>(&self, key: &Q) -> &Bucket<K, V>
    where
        Q: Hash + ?Sized,
    {
        &self.buckets[self.bucket_index(key)]
    }
}

impl<K: Hash + Eq, V> Default for ShardedMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::hash::Hasher;

    #[test]
    fn test_string_keys() {
        let map: ShardedMap<String, i32> = ShardedMap::new();
        map.add_or_update("five".to_string(), 5);
        map.add_or_update("ten".to_string(), 10);
        map.add_or_update("one".to_string(), 1);
        map.add_or_update("three".to_string(), 3);

        assert_eq!(map.get_value("one", 0), 1);
        assert_eq!(map.get_value("two", 0), 0);
        assert_eq!(map.get_value("three", 0), 3);
        assert_eq!(map.get_value("five", 0), 5);
        assert_eq!(map.get_value("ten", 0), 10);

        map.remove("three");
        map.remove("ten");

        assert_eq!(map.get_value("one", 0), 1);
        assert_eq!(map.get_value("two", 0), 0);
        assert_eq!(map.get_value("three", 0), 0);
        assert_eq!(map.get_value("five", 0), 5);
        assert_eq!(map.get_value("ten", 0), 0);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_remove_twice() {
        let map: ShardedMap<u32, u32> = ShardedMap::new();
        map.add_or_update(1, 100);
        assert_eq!(map.remove(&1), Some(100));
        assert_eq!(map.remove(&1), None);
        assert_eq!(map.get_value(&1, 7), 7);
        assert!(map.is_empty());
    }

    #[test]
    fn test_default_bucket_count() {
        let map: ShardedMap<u64, u64> = ShardedMap::default();
        assert_eq!(map.buckets_count(), 19);
    }

    #[test]
    fn test_zero_buckets_rejected() {
        let result: Result<ShardedMap<u64, u64>> = ShardedMap::with_buckets(0);
        assert!(matches!(result, Err(Error::ZeroBuckets)));
    }

    #[test]
    fn test_bucket_index_is_stable_and_in_range() {
        let map: ShardedMap<u64, u64> = ShardedMap::with_buckets(7).unwrap();
        for key in 0..1000u64 {
            let index = map.bucket_index(&key);
            assert!(index < 7);
            assert_eq!(index, map.bucket_index(&key));
        }
    }

    /// Hashes a `u64` key to itself.
    #[derive(Default)]
    struct IdentityHasher(u64);

    impl Hasher for IdentityHasher {
        fn finish(&self) -> u64 {
            self.0
        }

        fn write(&mut self, bytes: &[u8]) {
            for &b in bytes {
                self.0 = (self.0 << 8) | u64::from(b);
            }
        }

        fn write_u64(&mut self, n: u64) {
            self.0 = n;
        }
    }

    #[test]
    fn test_custom_hasher_selects_bucket() {
        let map: ShardedMap<u64, &str, BuildHasherDefault<IdentityHasher>> =
            ShardedMap::with_hasher(10, BuildHasherDefault::default()).unwrap();

        assert_eq!(map.bucket_index(&42u64), 2);
        assert_eq!(map.bucket_index(&17u64), 7);

        map.add_or_update(42, "forty-two");
        map.add_or_update(52, "fifty-two");
        assert_eq!(map.buckets[2].len(), 2);
        assert_eq!(map.get(&52), Some("fifty-two"));
    }
}
