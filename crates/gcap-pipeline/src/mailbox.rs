//! Single-slot, latest-wins hand-off between threads.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
struct Slot<T> {
    value: Option<T>,
    fresh: bool,
    generation: u64,
    closed: bool,
}

/// Holds at most one value. Posting overwrites whatever is there; a
/// consumer blocked in [`Mailbox::recv`] wakes on every post and on close.
///
/// Values that were overwritten before anyone read them are simply lost.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

impl<T: Clone> Mailbox<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                value: None,
                fresh: false,
                generation: 0,
                closed: false,
            }),
            ready: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replace the stored value. Returns `false` once the mailbox is closed.
    pub fn post(&self, value: T) -> bool {
        let mut slot = self.lock();
        if slot.closed {
            return false;
        }
        slot.value = Some(value);
        slot.fresh = true;
        slot.generation += 1;
        drop(slot);
        self.ready.notify_all();
        true
    }

    /// Mark the stored value unread again so the consumer handles it once
    /// more. No-op when empty or closed.
    pub fn repost(&self) -> bool {
        let mut slot = self.lock();
        if slot.closed || slot.value.is_none() {
            return false;
        }
        slot.fresh = true;
        slot.generation += 1;
        drop(slot);
        self.ready.notify_all();
        true
    }

    /// Copy of the stored value without consuming it.
    pub fn latest(&self) -> Option<T> {
        self.lock().value.clone()
    }

    /// Block until an unread value is available and return it with its
    /// generation. Returns `None` once the mailbox is closed, even if an
    /// unread value is still stored.
    pub fn recv(&self) -> Option<(u64, T)> {
        let mut slot = self.lock();
        loop {
            if slot.closed {
                return None;
            }
            if slot.fresh {
                if let Some(value) = slot.value.clone() {
                    slot.fresh = false;
                    return Some((slot.generation, value));
                }
            }
            slot = self.ready.wait(slot).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Close and wake every waiter. Later posts are dropped.
    pub fn close(&self) {
        self.lock().closed = true;
        self.ready.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of posts (and reposts) accepted so far.
    pub fn generation(&self) -> u64 {
        self.lock().generation
    }
}

impl<T: Clone> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}
