// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Execution-context identity.
//!
//! Schedulers decide "is dispatch needed" by comparing the caller's
//! `ContextToken` with the contexts they own. The token is passed
//! explicitly through every start primitive; `current()` only supplies
//! the default. A cooperative executor running on a borrowed thread
//! enters its own token while it drains its queue, so "same context"
//! means "same executor", not "same OS thread".

use std::cell::Cell;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_TOKEN: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: Cell<Option<ContextToken>> = const { Cell::new(None) };
}

/// Process-unique identity of an execution context.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextToken(u64);

impl ContextToken {
    /// Allocate a token no other context has.
    pub fn fresh() -> Self {
        ContextToken(NEXT_TOKEN.fetch_add(1, Ordering::Relaxed))
    }

    /// Token of the context running on this thread.
    ///
    /// Threads that never entered a token get one lazily, so two plain
    /// threads always compare unequal.
    pub fn current() -> Self {
        CURRENT.with(|cell| match cell.get() {
            Some(token) => token,
            None => {
                let token = ContextToken::fresh();
                cell.set(Some(token));
                token
            }
        })
    }

    /// Make `self` the current context until the guard drops.
    pub fn enter(self) -> EnterGuard {
        let prev = CURRENT.with(|cell| cell.replace(Some(self)));
        EnterGuard { prev }
    }
}

impl fmt::Debug for ContextToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ctx#{}", self.0)
    }
}

/// Restores the previous context token on drop.
#[must_use = "the token is only current while the guard is alive"]
pub struct EnterGuard {
    prev: Option<ContextToken>,
}

impl Drop for EnterGuard {
    fn drop(&mut self) {
        CURRENT.with(|cell| cell.set(self.prev));
    }
}
