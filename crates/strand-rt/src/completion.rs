// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Completion handlers.
//!
//! A completion is a single-shot sink: `complete` takes `Box<Self>`, so
//! it cannot be called twice on the same value. Closures work directly;
//! `Deferred` is the slot-plus-condvar form used by `Job::join`.

use std::sync::Arc;

use parking_lot::{Condvar, Mutex};

use crate::error::Outcome;

/// Receives the final outcome of a launch, at most once.
pub trait Completion<T>: Send + 'static {
    fn complete(self: Box<Self>, outcome: Outcome<T>);
}

impl<T, F> Completion<T> for F
where
    F: FnOnce(Outcome<T>) + Send + 'static,
{
    fn complete(self: Box<Self>, outcome: Outcome<T>) {
        (*self)(outcome)
    }
}

/// Typed result slot a launch completes into and a joiner blocks on.
pub struct Deferred<T> {
    slot: Mutex<Slot<T>>,
    ready: Condvar,
}

enum Slot<T> {
    Empty,
    Full(Outcome<T>),
    Taken,
}

impl<T: Send + 'static> Deferred<T> {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            slot: Mutex::new(Slot::Empty),
            ready: Condvar::new(),
        })
    }

    /// A completion handler that fills this slot.
    pub fn completer(self: &Arc<Self>) -> impl Completion<T> {
        let this = self.clone();
        move |outcome: Outcome<T>| this.set(outcome)
    }

    fn set(&self, outcome: Outcome<T>) {
        let mut slot = self.slot.lock();
        if matches!(*slot, Slot::Empty) {
            *slot = Slot::Full(outcome);
            self.ready.notify_all();
        }
    }

    /// True once an outcome has been delivered (even if already taken).
    pub fn is_complete(&self) -> bool {
        !matches!(*self.slot.lock(), Slot::Empty)
    }

    /// Take the outcome if it has arrived. Returns `None` before completion
    /// and after the outcome was taken once.
    pub fn try_take(&self) -> Option<Outcome<T>> {
        let mut slot = self.slot.lock();
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Full(outcome) => Some(outcome),
            Slot::Empty => {
                *slot = Slot::Empty;
                None
            }
            Slot::Taken => None,
        }
    }

    /// Block the calling thread until the outcome arrives, then take it.
    ///
    /// Returns `None` only if another caller already took the outcome.
    pub fn wait(&self) -> Option<Outcome<T>> {
        let mut slot = self.slot.lock();
        while matches!(*slot, Slot::Empty) {
            self.ready.wait(&mut slot);
        }
        match std::mem::replace(&mut *slot, Slot::Taken) {
            Slot::Full(outcome) => Some(outcome),
            Slot::Empty | Slot::Taken => None,
        }
    }
}
