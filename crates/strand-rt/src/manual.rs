// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cooperative single-context scheduler.
//!
//! Work queues up until someone calls `run_pending`, which drains the
//! queue on the calling thread with the scheduler's own `ContextToken`
//! entered. Nothing runs behind your back, which makes start decisions
//! easy to observe.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::context::ContextToken;
use crate::scheduler::{Scheduler, TaskRef};

pub struct ManualScheduler {
    token: ContextToken,
    queue: Mutex<VecDeque<TaskRef>>,
    dispatched: AtomicUsize,
    inline_runs: AtomicUsize,
}

impl ManualScheduler {
    pub fn new() -> Self {
        Self {
            token: ContextToken::fresh(),
            queue: Mutex::new(VecDeque::new()),
            dispatched: AtomicUsize::new(0),
            inline_runs: AtomicUsize::new(0),
        }
    }

    /// The context this scheduler runs its queue under.
    pub fn token(&self) -> ContextToken {
        self.token
    }

    /// Tasks queued and not yet run.
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Total `dispatch` calls so far, resumptions included.
    pub fn dispatched(&self) -> usize {
        self.dispatched.load(Ordering::Acquire)
    }

    /// Total inline runs handed to this scheduler.
    pub fn inline_runs(&self) -> usize {
        self.inline_runs.load(Ordering::Acquire)
    }

    /// Run the oldest queued task. Returns false if the queue was empty.
    pub fn run_one(&self) -> bool {
        let task = self.queue.lock().pop_front();
        match task {
            Some(task) => {
                let _ctx = self.token.enter();
                task.run();
                true
            }
            None => false,
        }
    }

    /// Run queued tasks until the queue is empty, including tasks queued
    /// while draining. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while self.run_one() {
            ran += 1;
        }
        ran
    }
}

impl Default for ManualScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler for ManualScheduler {
    fn is_dispatch_needed(&self, caller: ContextToken) -> bool {
        caller != self.token
    }

    fn dispatch(&self, task: TaskRef) {
        self.dispatched.fetch_add(1, Ordering::AcqRel);
        self.queue.lock().push_back(task);
    }

    fn run_inline(&self, task: TaskRef) {
        self.inline_runs.fetch_add(1, Ordering::AcqRel);
        task.run();
    }
}
