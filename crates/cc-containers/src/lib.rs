//! # cc-containers
//!
//! In-process concurrent containers built directly on atomics and locks.
//!
//! | Container | Synchronization | Progress |
//! |-----------|-----------------|----------|
//! | `LockFreeStack` | CAS on head, counter-gated reclamation | lock-free |
//! | `ConcurrentList` | one `Mutex` per node, hand-over-hand | blocking, deadlock-free |
//! | `ShardedMap` | one `RwLock` per `Bucket` | blocking per bucket |
//!
//! The three containers are independent of each other.
//!
//! Each container has:
//! - unit tests next to the implementation
//! - loom tests for thread interleavings (under `#[cfg(loom)]`)
//! - Kani proofs for sequential properties (under `#[cfg(kani)]`)
//! - stress and DST tests under `tests/`, checked against `cc-core`

pub mod bucket;
pub mod concurrent_list;
pub mod config;
pub mod error;
pub mod kani_proofs;
pub mod lock_free_stack;
pub mod sharded_map;

mod sync;

pub use bucket::Bucket;
pub use concurrent_list::ConcurrentList;
pub use config::{MapConfig, BUCKETS_COUNT_DEFAULT};
pub use error::{Error, Result};
pub use lock_free_stack::LockFreeStack;
pub use sharded_map::{DefaultHashBuilder, ShardedMap};
