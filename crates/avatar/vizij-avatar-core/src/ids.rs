//! Identifiers and simple allocators for core entities.

use serde::{Deserialize, Serialize};

/// One start of a clip on a layer. Retriggering the same clip keeps its id;
/// every fresh start gets a new one.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct PlaybackId(pub u32);

/// Handle for a deferred action held by a [`crate::scheduler::Scheduler`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct TimerId(pub u32);

/// Monotonic allocator for PlaybackId and TimerId.
/// Ids are never reused within one allocator, so stale handles cannot alias newer entries.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next_playback: u32,
    next_timer: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_playback(&mut self) -> PlaybackId {
        let id = PlaybackId(self.next_playback);
        self.next_playback = self.next_playback.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_timer(&mut self) -> TimerId {
        let id = TimerId(self.next_timer);
        self.next_timer = self.next_timer.wrapping_add(1);
        id
    }
}
