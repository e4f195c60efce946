//! Kani proof harnesses for the sequential behaviour of the containers.
//!
//! # Running the proofs
//!
//! ```bash
//! cargo kani -p cc-containers
//! cargo kani -p cc-containers --harness proof_lifo_order
//! ```
//!
//! Kani does not explore thread interleavings. Concurrent behaviour is
//! covered by loom, the stateright reclamation model and the stress tests.

#[cfg(kani)]
mod proofs {
    use crate::{ConcurrentList, LockFreeStack, ShardedMap};

    /// Pushing two values and popping returns them in reverse order.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_lifo_order() {
        let stack = LockFreeStack::new();
        let v1: u64 = kani::any();
        let v2: u64 = kani::any();

        stack.push(v1);
        stack.push(v2);

        kani::assert(stack.pop() == Some(v2), "second push pops first");
        kani::assert(stack.pop() == Some(v1), "first push pops second");
        kani::assert(stack.pop().is_none(), "stack is empty after two pops");
    }

    /// Popping an empty stack twice is harmless.
    #[kani::proof]
    #[kani::unwind(3)]
    fn proof_pop_empty_idempotent() {
        let stack: LockFreeStack<u8> = LockFreeStack::new();
        kani::assert(stack.pop().is_none(), "first pop of empty stack");
        kani::assert(stack.pop().is_none(), "second pop of empty stack");
        kani::assert(stack.is_empty(), "still empty");
    }

    /// A single-threaded pop always frees its node immediately.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_sequential_pop_leaves_nothing_pending() {
        let mut stack = LockFreeStack::new();
        let v: u8 = kani::any();
        stack.push(v);
        stack.push(v);
        let _ = stack.pop();
        kani::assert(stack.pending_len() == 0, "no deferred nodes without contention");
    }

    /// The bucket index is always in range.
    #[kani::proof]
    #[kani::unwind(12)]
    fn proof_bucket_index_in_range() {
        let buckets: usize = kani::any();
        kani::assume(buckets > 0 && buckets <= 8);
        let map: ShardedMap<u8, u8> = match ShardedMap::with_buckets(buckets) {
            Ok(map) => map,
            Err(_) => unreachable!(),
        };
        let key: u8 = kani::any();
        kani::assert(map.bucket_index(&key) < buckets, "bucket index in range");
    }

    /// Insert, overwrite, then remove twice.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_map_update_and_remove() {
        let map: ShardedMap<u8, u8> = ShardedMap::new();
        let key: u8 = kani::any();
        let v1: u8 = kani::any();
        let v2: u8 = kani::any();
        let default: u8 = kani::any();

        map.add_or_update(key, v1);
        map.add_or_update(key, v2);
        kani::assert(map.get_value(&key, default) == v2, "last write wins");

        kani::assert(map.remove(&key) == Some(v2), "remove returns stored value");
        kani::assert(map.remove(&key).is_none(), "second remove is a no-op");
        kani::assert(map.get_value(&key, default) == default, "absent key reads default");
    }

    /// The first match is the most recently pushed matching value.
    #[kani::proof]
    #[kani::unwind(4)]
    fn proof_find_first_from_head() {
        let list = ConcurrentList::new();
        let older: u8 = kani::any();
        let newer: u8 = kani::any();
        list.push_front(older);
        list.push_front(newer);

        let found = list.find_first_if(|v| *v == older);
        kani::assert(found.as_deref() == Some(&older), "match found");
        kani::assert(list.remove_if(|_| true) == 2, "both nodes removed");
        kani::assert(list.is_empty(), "list empty after removal");
    }
}
