// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cancellation state.
//!
//! The start path only ever reads this. Whoever owns the launch (a `Job`,
//! a parent scope, a test) flips it.

use std::sync::atomic::{AtomicBool, Ordering};

/// Queryable "has this unit already been cancelled" flag.
pub trait CancellationState: Send + Sync {
    fn is_cancelled(&self) -> bool;
}

/// Cancellation token shared between the launcher and the coroutine.
#[derive(Debug)]
pub struct CancelToken {
    flag: AtomicBool,
}

impl CancelToken {
    pub fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// A token that starts out cancelled.
    pub fn cancelled() -> Self {
        Self {
            flag: AtomicBool::new(true),
        }
    }

    /// Set the cancellation flag.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Check if cancellation was requested.
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationState for CancelToken {
    fn is_cancelled(&self) -> bool {
        CancelToken::is_cancelled(self)
    }
}

/// Never cancelled.
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverCancelled;

impl CancellationState for NeverCancelled {
    fn is_cancelled(&self) -> bool {
        false
    }
}
