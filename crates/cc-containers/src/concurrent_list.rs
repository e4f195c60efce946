//! Singly linked list with one lock per node and hand-over-hand traversal.
//!
//! Every traversal starts at the sentinel and locks nodes strictly from
//! head to tail: it acquires the successor's lock while still holding the
//! current node's lock, then releases the current one. At most two node
//! locks are held at any time, always a predecessor and its successor, so
//! traversals cannot deadlock and can never overtake each other.
//!
//! A node is unlinked only by a thread holding both its predecessor's
//! lock and its own. Any other thread that could reach the node must pass
//! through one of those two locks first, so the node is freed with no
//! outstanding references.

use std::ops::ControlFlow;
use std::ptr;
use std::sync::Arc;

use crate::sync::{lock, Mutex};

/// A list supporting concurrent `push_front`, traversal, lookup and
/// predicate removal without a global lock.
///
/// Traversals visit each node that stays linked for the whole visit at
/// most once. Nodes removed before a traversal reaches them are skipped;
/// nodes pushed to the front after a traversal started are not visited.
pub struct ConcurrentList<T> {
    head: Node<T>,
}

struct Node<T> {
    slot: Mutex<Slot<T>>,
}

/// State guarded by a node's lock.
struct Slot<T> {
    /// `None` only for the sentinel
    value: Option<Arc<T>>,
    /// Owned successor, or null at the tail
    next: *mut Node<T>,
}

impl<T> Node<T> {
    fn new(value: Option<Arc<T>>, next: *mut Node<T>) -> Self {
        Self {
            slot: Mutex::new(Slot { value, next }),
        }
    }
}

impl<T> ConcurrentList<T> {
    /// Create an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            head: Node::new(None, ptr::null_mut()),
        }
    }

    /// Insert `value` as the first element.
    pub fn push_front(&self, value: T) {
        let value = Some(Arc::new(value));
        let mut head = lock(&self.head.slot);
        let node = Box::new(Node::new(value, head.next));
        head.next = Box::into_raw(node);
    }

    /// Visit every value from head to tail.
    ///
    /// The visitor runs while only the visited node is locked.
    pub fn for_each<F>(&self, mut visit: F)
    where
        F: FnMut(&T),
    {
        self.walk(|slot| {
            if let Some(value) = slot.value.as_deref() {
                visit(value);
            }
            ControlFlow::Continue(())
        });
    }

    /// Visit every value from head to tail with mutable access.
    ///
    /// Values previously handed out by [`find_first_if`](Self::find_first_if)
    /// keep their old contents; the node gets a fresh copy if one is still
    /// shared.
    pub fn for_each_mut<F>(&self, mut visit: F)
    where
        T: Clone,
        F: FnMut(&mut T),
    {
        self.walk(|slot| {
            if let Some(value) = slot.value.as_mut() {
                visit(Arc::make_mut(value));
            }
            ControlFlow::Continue(())
        });
    }

    /// Return the first value from the head that satisfies `predicate`.
    pub fn find_first_if<P>(&self, mut predicate: P) -> Option<Arc<T>>
    where
        P: FnMut(&T) -> bool,
    {
        let mut found = None;
        self.walk(|slot| match slot.value.as_ref() {
            Some(value) if predicate(&**value) => {
                found = Some(Arc::clone(value));
                ControlFlow::Break(())
            }
            _ => ControlFlow::Continue(()),
        });
        found
    }

    /// Unlink and free every node whose value satisfies `predicate`.
    ///
    /// Returns how many nodes were removed.
    pub fn remove_if<P>(&self, mut predicate: P) -> usize
    where
        P: FnMut(&T) -> bool,
    {
        let mut removed = 0;
        let mut current = lock(&self.head.slot);

        while !current.next.is_null() {
            let next_ptr = current.next;
            // Safety: `next_ptr` is owned by the slot we hold locked, so it
            // cannot be unlinked or freed until we release that lock.
            let next = unsafe { &*next_ptr };
            let mut next_slot = lock(&next.slot);

            let matches = next_slot.value.as_deref().map_or(false, |v| predicate(v));
            if matches {
                current.next = std::mem::replace(&mut next_slot.next, ptr::null_mut());
                drop(next_slot);
                // Safety: unlinked while holding both locks. Reaching it
                // again would need `current`'s lock, which we still hold.
                unsafe { drop(Box::from_raw(next_ptr)) };
                removed += 1;
            } else {
                current = next_slot;
            }
        }

        removed
    }

    /// Number of values, counted by a full traversal.
    #[must_use]
    pub fn len(&self) -> usize {
        let mut count = 0;
        self.for_each(|_| count += 1);
        count
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock(&self.head.slot).next.is_null()
    }

    /// Hand-over-hand walk calling `step` on each real node's slot.
    fn walk<F>(&self, mut step: F)
    where
        F: FnMut(&mut Slot<T>) -> ControlFlow<()>,
    {
        let mut current = lock(&self.head.slot);

        while !current.next.is_null() {
            // Safety: see `remove_if`; the successor stays linked while
            // `current` is locked, and stays allocated while its own lock
            // is held.
            let next_ptr = current.next;
            let next = unsafe { &*next_ptr };
            let mut next_slot = lock(&next.slot);
            drop(current);

            if step(&mut *next_slot).is_break() {
                return;
            }
            current = next_slot;
        }
    }
}

impl<T> Default for ConcurrentList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for ConcurrentList<T> {
    fn drop(&mut self) {
        // Iterative, so long lists do not recurse through `Box` drops.
        let mut next = std::mem::replace(&mut lock(&self.head.slot).next, ptr::null_mut());
        while !next.is_null() {
            // Safety: `&mut self`, every node is owned by its predecessor.
            let node = unsafe { Box::from_raw(next) };
            next = std::mem::replace(&mut lock(&node.slot).next, ptr::null_mut());
        }
    }
}

// Safety: nodes are only reached under their predecessor's lock; values
// are shared through `Arc`, so they must be `Send + Sync`.
unsafe impl<T: Send + Sync> Send for ConcurrentList<T> {}
unsafe impl<T: Send + Sync> Sync for ConcurrentList<T> {}


#[cfg(loom)]
mod loom_tests {
    use super::*;
    use loom::sync::Arc;
    use loom::thread;

    #[test]
    fn test_push_front_races_traversal() {
        loom::model(|| {
            let list = Arc::new(ConcurrentList::new());
            list.push_front(1);

            let l1 = Arc::clone(&list);
            let h1 = thread::spawn(move || l1.push_front(2));

            let mut seen = Vec::new();
            list.for_each(|v| seen.push(*v));
            h1.join().unwrap();

            assert!(seen == vec![1] || seen == vec![2, 1]);
            assert_eq!(list.len(), 2);
        });
    }

    #[test]
    fn test_remove_races_find() {
        loom::model(|| {
            let list = Arc::new(ConcurrentList::new());
            list.push_front(1);
            list.push_front(2);

            let l1 = Arc::clone(&list);
            let h1 = thread::spawn(move || l1.remove_if(|v| *v == 2));

            let found = list.find_first_if(|v| *v == 1);
            assert_eq!(h1.join().unwrap(), 1);
            assert_eq!(found.as_deref(), Some(&1));
            assert_eq!(list.len(), 1);
        });
    }
}
