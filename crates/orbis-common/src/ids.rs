//! ID types and the per-world id allocator.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a placed object in one world or universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(u64);

impl ObjectId {
    /// Creates an object ID from a raw value (for deserialization).
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Null/invalid object ID.
    pub const NULL: Self = Self(0);

    /// Checks if this is a valid (non-null) object ID.
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// Identity of one submitted generation task.
///
/// Every request for a slot gets a fresh id; a delivery is only accepted when
/// its id matches the one the slot is still waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(u64);

impl TaskId {
    /// Creates a task ID from a raw value.
    #[must_use]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Identifier for a kind of placed object, resolved by an object factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectTypeId(u32);

impl ObjectTypeId {
    /// Creates an object type ID from a raw value.
    #[must_use]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Monotonic id source scoped to a single world or universe.
///
/// Safe to share between threads. `set` exists so a client can adopt the
/// counter value announced by a server after a resync.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    /// Creates an allocator whose first id is 1 (0 is reserved as null).
    #[must_use]
    pub const fn new() -> Self {
        Self::starting_at(1)
    }

    /// Creates an allocator whose first id is `first`.
    #[must_use]
    pub const fn starting_at(first: u64) -> Self {
        Self {
            next: AtomicU64::new(first),
        }
    }

    /// Returns the next raw id.
    pub fn next_raw(&self) -> u64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }

    /// Allocates a new object id.
    pub fn next_object(&self) -> ObjectId {
        ObjectId(self.next_raw())
    }

    /// Allocates a new task id.
    pub fn next_task(&self) -> TaskId {
        TaskId(self.next_raw())
    }

    /// The value the next allocation will return.
    #[must_use]
    pub fn current(&self) -> u64 {
        self.next.load(Ordering::Relaxed)
    }

    /// Overwrites the counter.
    pub fn set(&self, value: u64) {
        self.next.store(value, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_allocator_starts_after_null() {
        let ids = IdAllocator::new();
        let first = ids.next_object();
        assert!(first.is_valid());
        assert_ne!(first, ids.next_object());
    }

    #[test]
    fn test_allocator_set_for_resync() {
        let ids = IdAllocator::new();
        ids.set(500);
        assert_eq!(ids.current(), 500);
        assert_eq!(ids.next_object().raw(), 500);
        assert_eq!(ids.current(), 501);
    }

    #[test]
    fn test_allocators_are_independent() {
        let a = IdAllocator::new();
        let b = IdAllocator::new();
        a.next_raw();
        a.next_raw();
        assert_eq!(b.next_raw(), 1);
    }

    #[test]
    fn test_concurrent_allocation_is_unique() {
        let ids = Arc::new(IdAllocator::new());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || (0..250).map(|_| ids.next_raw()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<u64> = handles
            .into_iter()
            .flat_map(|h| h.join().expect("worker panicked"))
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }
}
