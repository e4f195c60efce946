//! Lock-free stack with counter-gated deferred reclamation.
//!
//! # Invariants
//!
//! | Property | Verified By |
//! |----------|-------------|
//! | NoLostElements | unit, stress, loom |
//! | NoFabricatedElements | unit, stress, loom |
//! | LIFO_Order (sequential) | unit, kani |
//! | NoUseAfterFree | stateright model, loom, stress |
//!
//! # Memory Safety
//!
//! A popped node cannot be freed on the spot: another popper may have
//! loaded it as `head` before the detaching CAS and still be about to read
//! its `next` link. Every `pop` therefore registers itself in
//! `threads_in_pop` before touching `head`. Detached nodes are freed only
//! by a popper that observes itself alone inside `pop`; otherwise they are
//! parked on the `to_be_deleted` chain for the next thread that is alone.
//!
//! A node is on exactly one of the live chain (from `head`) or the pending
//! chain (from `to_be_deleted`) until it is freed. Ownership moves at two
//! CAS points: the detaching CAS on `head` hands the node to one popper,
//! and the CAS on `to_be_deleted` hands it to whoever later claims the
//! pending chain.
//!
//! The single counter is a coarse epoch. Under a steady stream of
//! overlapping pops the pending chain can keep growing, because no popper
//! ever sees itself alone.

use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::ptr;

use tracing::trace;

use crate::sync::{spin_hint, AtomicPtr, AtomicUsize, Ordering};

/// A lock-free stack.
///
/// `push` retries a CAS on `head` and never blocks. `pop` retries a CAS on
/// `head` and reclaims detached nodes once no other `pop` is in flight.
pub struct LockFreeStack<T> {
    /// Top of the live chain
    head: AtomicPtr<Node<T>>,
    /// Threads currently inside `pop`
    threads_in_pop: AtomicUsize,
    /// Detached nodes waiting to be freed
    to_be_deleted: AtomicPtr<Node<T>>,
    _owns: PhantomData<T>,
}

struct Node<T> {
    /// Taken by the popper that detaches the node; never dropped in place.
    value: ManuallyDrop<T>,
    /// Next node on whichever chain this node is on.
    next: AtomicPtr<Node<T>>,
}

impl<T> LockFreeStack<T> {
    /// Create a new empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: AtomicPtr::new(ptr::null_mut()),
            threads_in_pop: AtomicUsize::new(0),
            to_be_deleted: AtomicPtr::new(ptr::null_mut()),
            _owns: PhantomData,
        }
    }

    /// Push a value onto the stack.
    ///
    /// A retry happens only because another push or pop succeeded.
    pub fn push(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            value: ManuallyDrop::new(value),
            next: AtomicPtr::new(ptr::null_mut()),
        }));

        let mut head = self.head.load(Ordering::Relaxed);
        loop {
            // Safety: `node` is not published yet, only this thread sees it.
            unsafe { (*node).next.store(head, Ordering::Relaxed) };

            match self
                .head
                .compare_exchange_weak(head, node, Ordering::SeqCst, Ordering::Relaxed)
            {
                Ok(_) => return,
                Err(current) => {
                    head = current;
                    spin_hint();
                }
            }
        }
    }

    /// Pop a value from the stack.
    ///
    /// Returns `None` if the stack is empty.
    pub fn pop(&self) -> Option<T> {
        // Registering before loading `head` is what protects every node
        // this call dereferences.
        self.threads_in_pop.fetch_add(1, Ordering::SeqCst);

        let mut old_head = self.head.load(Ordering::SeqCst);
        loop {
            if old_head.is_null() {
                self.threads_in_pop.fetch_sub(1, Ordering::SeqCst);
                return None;
            }

            // Safety: `old_head` was on the live chain after this thread
            // registered in `threads_in_pop`, so it is not freed before
            // this thread deregisters.
            let next = unsafe { (*old_head).next.load(Ordering::Acquire) };

            match self
                .head
                .compare_exchange_weak(old_head, next, Ordering::SeqCst, Ordering::SeqCst)
            {
                Ok(_) => break,
                Err(current) => {
                    old_head = current;
                    spin_hint();
                }
            }
        }

        // Safety: the CAS detached `old_head`; this thread is the only one
        // that may take its value. Other threads only touch `next`.
        let value =
            unsafe { ManuallyDrop::into_inner(ptr::read(ptr::addr_of!((*old_head).value))) };

        self.try_reclaim(old_head);
        Some(value)
    }

    /// Check if the stack is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }

    /// Number of detached nodes still waiting to be freed.
    ///
    /// Requires exclusive access, so no pop can be in flight.
    pub fn pending_len(&mut self) -> usize {
        let mut count = 0;
        let mut current = self.to_be_deleted.load(Ordering::Acquire);
        while !current.is_null() {
            count += 1;
            // Safety: `&mut self` excludes concurrent reclamation.
            current = unsafe { (*current).next.load(Ordering::Relaxed) };
        }
        count
    }

    /// Free `old_head` now, or park it until no other pop is in flight.
    fn try_reclaim(&self, old_head: *mut Node<T>) {
        if self.threads_in_pop.load(Ordering::SeqCst) == 1 {
            // Alone: nobody else can hold `old_head`, and anything on the
            // pending chain was parked before this point.
            let nodes_to_delete = self.to_be_deleted.swap(ptr::null_mut(), Ordering::SeqCst);

            if self.threads_in_pop.fetch_sub(1, Ordering::SeqCst) == 1 {
                // Safety: still alone after claiming the chain, so no
                // thread loaded any of these nodes while they were live.
                let freed = unsafe { delete_nodes(nodes_to_delete) };
                if freed > 0 {
                    trace!(freed, "reclaimed pending chain");
                }
            } else if !nodes_to_delete.is_null() {
                // Another popper arrived and may have loaded a node that a
                // third thread parked after our check.
                trace!("re-publishing claimed pending chain");
                self.chain_pending_nodes(nodes_to_delete);
            }

            // Safety: detached before the check above found us alone, so
            // no later popper can have loaded it.
            unsafe { drop(Box::from_raw(old_head)) };
        } else {
            trace!("deferring reclamation, other poppers in flight");
            self.chain_pending_node(old_head);
            self.threads_in_pop.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Append a whole claimed chain back onto the pending chain.
    fn chain_pending_nodes(&self, nodes: *mut Node<T>) {
        let mut last = nodes;
        loop {
            // Safety: this thread owns the claimed chain exclusively.
            let next = unsafe { (*last).next.load(Ordering::Relaxed) };
            if next.is_null() {
                break;
            }
            last = next;
        }
        self.chain_pending(nodes, last);
    }

    fn chain_pending_node(&self, node: *mut Node<T>) {
        self.chain_pending(node, node);
    }

    fn chain_pending(&self, first: *mut Node<T>, last: *mut Node<T>) {
        let mut current = self.to_be_deleted.load(Ordering::Relaxed);
        loop {
            // Safety: `last` belongs to a chain owned by this thread.
            // Stale poppers may still read its `next`, which is atomic.
            unsafe { (*last).next.store(current, Ordering::Relaxed) };

            match self.to_be_deleted.compare_exchange_weak(
                current,
                first,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => return,
                Err(actual) => {
                    current = actual;
                    spin_hint();
                }
            }
        }
    }
}

/// Free every node of a detached chain. Values were already taken.
///
/// # Safety
///
/// The caller must own the chain and no thread may hold a reference into it.
unsafe fn delete_nodes<T>(mut nodes: *mut Node<T>) -> usize {
    let mut freed = 0;
    while !nodes.is_null() {
        let node = Box::from_raw(nodes);
        nodes = node.next.load(Ordering::Relaxed);
        freed += 1;
    }
    freed
}

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            // Safety: `&mut self`, live nodes still own their values.
            let mut node = unsafe { Box::from_raw(current) };
            current = node.next.load(Ordering::Relaxed);
            unsafe { ManuallyDrop::drop(&mut node.value) };
        }

        // Safety: pending nodes had their values taken by `pop`.
        unsafe { delete_nodes(self.to_be_deleted.load(Ordering::Relaxed)) };
    }
}

// Safety: values move between threads through push/pop, nodes are only
// reached through atomics.
unsafe impl<T: Send> Send for LockFreeStack<T> {}
unsafe impl<T: Send> Sync for LockFreeStack<T> {}


#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn test_push_push() {
        loom::model(|| {
            let stack = Arc::new(LockFreeStack::new());

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.push(1));
            let h2 = thread::spawn(move || s2.push(2));
            h1.join().unwrap();
            h2.join().unwrap();

            let mut values = vec![];
            while let Some(v) = stack.pop() {
                values.push(v);
            }
            values.sort_unstable();
            assert_eq!(values, vec![1, 2]);
        });
    }

    #[test]
    fn test_concurrent_pop_single_element() {
        loom::model(|| {
            let stack = Arc::new(LockFreeStack::new());
            stack.push(1);

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.pop());
            let h2 = thread::spawn(move || s2.pop());

            match (h1.join().unwrap(), h2.join().unwrap()) {
                (Some(1), None) | (None, Some(1)) => {}
                other => panic!("Unexpected result: {:?}", other),
            }
        });
    }

    #[test]
    fn test_concurrent_pops_with_reclamation() {
        loom::model(|| {
            let stack = Arc::new(LockFreeStack::new());
            stack.push(1);
            stack.push(2);

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.pop());
            let h2 = thread::spawn(move || s2.pop());

            let mut values: Vec<_> = [h1.join().unwrap(), h2.join().unwrap()]
                .into_iter()
                .flatten()
                .collect();
            values.sort_unstable();
            assert_eq!(values, vec![1, 2]);
            assert!(stack.is_empty());
        });
    }

    #[test]
    fn test_push_pop_race() {
        loom::model(|| {
            let stack = Arc::new(LockFreeStack::new());
            stack.push(1);

            let s1 = Arc::clone(&stack);
            let s2 = Arc::clone(&stack);
            let h1 = thread::spawn(move || s1.push(2));
            let h2 = thread::spawn(move || s2.pop());

            h1.join().unwrap();
            let popped = h2.join().unwrap();
            assert!(popped.is_some());

            let mut remaining = 0;
            while stack.pop().is_some() {
                remaining += 1;
            }
            assert_eq!(remaining, 1);
        });
    }
}
