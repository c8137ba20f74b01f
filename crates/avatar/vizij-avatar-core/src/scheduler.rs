//! Tick-driven deferred actions.
//!
//! Actions are keyed by a unique [`TimerId`] and only fire from `take_due`, which
//! the owner calls from its own tick. Cancelling is removing the entry before it
//! fires; a cancelled or already-fired id is simply unknown afterwards.

use crate::ids::{IdAllocator, TimerId};

#[derive(Debug, Clone)]
struct Entry<A> {
    id: TimerId,
    due: f64,
    action: A,
}

#[derive(Debug)]
pub struct Scheduler<A> {
    ids: IdAllocator,
    entries: Vec<Entry<A>>,
}

impl<A> Default for Scheduler<A> {
    fn default() -> Self {
        Self {
            ids: IdAllocator::new(),
            entries: Vec::new(),
        }
    }
}

impl<A> Scheduler<A> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to fire once the clock reaches `due` (seconds).
    pub fn schedule_at(&mut self, due: f64, action: A) -> TimerId {
        let id = self.ids.alloc_timer();
        self.entries.push(Entry { id, due, action });
        id
    }

    /// Remove a pending action. Returns it if it had not fired yet.
    pub fn cancel(&mut self, id: TimerId) -> Option<A> {
        let idx = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(idx).action)
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.entries.iter().any(|e| e.id == id)
    }

    pub fn pending(&self) -> usize {
        self.entries.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Drain every action with `due <= now`, ordered by (due, id).
    pub fn take_due(&mut self, now: f64) -> Vec<(TimerId, A)> {
        let mut due: Vec<Entry<A>> = Vec::new();
        let mut i = 0;
        while i < self.entries.len() {
            if self.entries[i].due <= now {
                due.push(self.entries.swap_remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by(|a, b| a.due.total_cmp(&b.due).then(a.id.cmp(&b.id)));
        due.into_iter().map(|e| (e.id, e.action)).collect()
    }
}
