//! Buffer handles.
//!
//! A [`BufferHandle`] names a slot in a [`BufferArena`](crate::BufferArena)
//! plus the slot generation it was issued for. Freeing a buffer bumps the
//! slot generation, so a handle kept past `free`/`release_all` is detected
//! in O(1) instead of silently aliasing whatever reuses the slot.

use std::fmt;

/// Opaque reference to one allocated shared buffer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[must_use]
pub struct BufferHandle {
    pub(crate) slot: u32,
    pub(crate) generation: u32,
}

impl BufferHandle {
    pub(crate) fn new(slot: u32, generation: u32) -> Self {
        Self { slot, generation }
    }

    /// Slot index within the arena.
    pub fn slot(&self) -> u32 {
        self.slot
    }

    /// Slot generation this handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for BufferHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BufferHandle(slot={}, gen={})", self.slot, self.generation)
    }
}
