//! One shard of a `ShardedMap`: an association list behind a reader/writer lock.

use std::borrow::Borrow;

use crate::sync::{read, write, RwLock};

/// Unordered `(key, value)` pairs guarded by one `RwLock`.
///
/// Holds at most one pair per key. Lookups take the read lock, so
/// concurrent readers of the same bucket do not block each other.
pub struct Bucket<K, V> {
    entries: RwLock<Vec<(K, V)>>,
}

impl<K, V> Bucket<K, V>
where
    K: Eq,
{
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Value stored for `key`, or `default` if there is none.
    pub fn get_value<Q>(&self, key: &Q, default: V) -> V
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        V: Clone,
    {
        self.get(key).unwrap_or(default)
    }

    /// Value stored for `key`, if any.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
        V: Clone,
    {
        let entries = read(&self.entries);
        entries
            .iter()
            .find(|(k, _)| k.borrow() == key)
            .map(|(_, v)| v.clone())
    }

    /// Overwrite the value for `key` in place, or append a new pair.
    pub fn add_or_update(&self, key: K, value: V) {
        let mut entries = write(&self.entries);
        match entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, existing)) => *existing = value,
            None => entries.push((key, value)),
        }
    }

    /// Erase the pair for `key`, returning its value. No-op if absent.
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + ?Sized,
    {
        let mut entries = write(&self.entries);
        let index = entries.iter().position(|(k, _)| k.borrow() == key)?;
        Some(entries.swap_remove(index).1)
    }

    /// Number of pairs in this bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        read(&self.entries).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        read(&self.entries).is_empty()
    }
}

impl<K: Eq, V> Default for Bucket<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_add_get_update_remove() {
        let bucket: Bucket<String, i32> = Bucket::new();
        assert_eq!(bucket.get_value("a", -1), -1);

        bucket.add_or_update("a".to_string(), 1);
        bucket.add_or_update("b".to_string(), 2);
        assert_eq!(bucket.get_value("a", -1), 1);
        assert_eq!(bucket.len(), 2);

        bucket.add_or_update("a".to_string(), 10);
        assert_eq!(bucket.get_value("a", -1), 10);
        assert_eq!(bucket.len(), 2, "update must not add a second pair");

        assert_eq!(bucket.remove("a"), Some(10));
        assert_eq!(bucket.remove("a"), None);
        assert_eq!(bucket.get_value("a", -1), -1);
        assert_eq!(bucket.get_value("b", -1), 2);
    }

    #[test]
    fn test_concurrent_readers_and_writer() {
        let bucket = Arc::new(Bucket::new());
        for k in 0..10u32 {
            bucket.add_or_update(k, k);
        }

        let writer = {
            let bucket = Arc::clone(&bucket);
            thread::spawn(move || {
                for round in 1..=100u32 {
                    for k in 0..10u32 {
                        bucket.add_or_update(k, k + round * 100);
                    }
                }
            })
        };

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let bucket = Arc::clone(&bucket);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        for k in 0..10u32 {
                            let v = bucket.get_value(&k, u32::MAX);
                            assert_eq!(v % 100, k, "value for {} corrupted: {}", k, v);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for reader in readers {
            reader.join().unwrap();
        }

        for k in 0..10u32 {
            assert_eq!(bucket.get_value(&k, 0), k + 10_000);
        }
        assert_eq!(bucket.len(), 10);
    }
}
