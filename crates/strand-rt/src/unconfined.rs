// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Unconfined scheduler.
//!
//! Never asks for a dispatch: work runs on whichever thread starts or
//! wakes it. To keep nested starts from growing the stack, every run goes
//! through a per-thread trampoline. The outermost run drains a local
//! queue; runs issued while it is draining are appended and picked up
//! when the current task returns.
//!
//! Undispatched starts bypass this entirely and do recurse.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::context::ContextToken;
use crate::scheduler::{Scheduler, TaskRef};

thread_local! {
    static TRAMPOLINE: RefCell<Option<VecDeque<TaskRef>>> = const { RefCell::new(None) };
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Unconfined;

impl Unconfined {
    fn trampoline(task: TaskRef) {
        let queued = TRAMPOLINE.with(|cell| match cell.borrow_mut().as_mut() {
            Some(queue) => {
                queue.push_back(task.clone());
                true
            }
            None => false,
        });
        if queued {
            return;
        }

        TRAMPOLINE.with(|cell| *cell.borrow_mut() = Some(VecDeque::new()));
        let _drain = DrainGuard;
        task.run();
        while let Some(task) = next_queued() {
            task.run();
        }
    }
}

fn next_queued() -> Option<TaskRef> {
    TRAMPOLINE.with(|cell| cell.borrow_mut().as_mut().and_then(VecDeque::pop_front))
}

/// Uninstalls the trampoline when the outermost run returns or unwinds.
/// Runs still queued behind a panicking one are dropped with it.
struct DrainGuard;

impl Drop for DrainGuard {
    fn drop(&mut self) {
        let leftover = TRAMPOLINE.with(|cell| cell.borrow_mut().take());
        if let Some(leftover) = leftover.filter(|q| !q.is_empty()) {
            tracing::warn!(dropped = leftover.len(), "trampoline unwound with queued runs");
        }
    }
}

impl Scheduler for Unconfined {
    fn is_dispatch_needed(&self, _caller: ContextToken) -> bool {
        false
    }

    fn dispatch(&self, task: TaskRef) {
        Unconfined::trampoline(task);
    }

    fn run_inline(&self, task: TaskRef) {
        Unconfined::trampoline(task);
    }
}
