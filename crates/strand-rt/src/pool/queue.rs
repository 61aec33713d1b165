// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Global injection queue shared by all workers.
//!
//! One mutex-protected FIFO with a condvar idle workers park on.

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use crate::scheduler::TaskRef;

pub(crate) struct InjectorQueue {
    queue: Mutex<Inner>,
    available: Condvar,
}

struct Inner {
    tasks: VecDeque<TaskRef>,
    closed: bool,
}

impl InjectorQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(Inner {
                tasks: VecDeque::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    /// Push a task and wake one parked worker. Hands the task back if the
    /// queue is closed.
    pub fn push(&self, task: TaskRef) -> Result<(), TaskRef> {
        let mut q = self.queue.lock();
        if q.closed {
            return Err(task);
        }
        q.tasks.push_back(task);
        self.available.notify_one();
        Ok(())
    }

    /// Pop the oldest task, parking until one arrives. Returns `None` once
    /// the queue is closed and drained.
    pub fn pop_blocking(&self) -> Option<TaskRef> {
        let mut q = self.queue.lock();
        loop {
            if let Some(task) = q.tasks.pop_front() {
                return Some(task);
            }
            if q.closed {
                return None;
            }
            self.available.wait(&mut q);
        }
    }

    /// Refuse new tasks and wake every parked worker. Already queued tasks
    /// are still handed out.
    pub fn close(&self) {
        let mut q = self.queue.lock();
        q.closed = true;
        self.available.notify_all();
    }

    pub fn len(&self) -> usize {
        self.queue.lock().tasks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Runnable;
    use std::sync::Arc;

    struct Noop;

    impl Runnable for Noop {
        fn run(self: Arc<Self>) {}
    }

    #[test]
    fn fifo_then_closed() {
        let q = InjectorQueue::new();
        q.push(Arc::new(Noop)).ok().unwrap();
        q.push(Arc::new(Noop)).ok().unwrap();
        assert_eq!(q.len(), 2);
        q.close();
        assert!(q.push(Arc::new(Noop)).is_err());
        assert!(q.pop_blocking().is_some());
        assert!(q.pop_blocking().is_some());
        assert!(q.pop_blocking().is_none());
    }

    #[test]
    fn close_wakes_parked_worker() {
        let q = Arc::new(InjectorQueue::new());
        let worker = {
            let q = q.clone();
            std::thread::spawn(move || q.pop_blocking().is_none())
        };
        std::thread::sleep(std::time::Duration::from_millis(10));
        q.close();
        assert!(worker.join().unwrap());
    }
}
