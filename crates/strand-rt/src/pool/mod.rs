// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Multi-threaded worker pool scheduler.
//!
//! N worker threads pull from one injection queue. Each worker runs under
//! its own `ContextToken`, so starts issued from inside the pool run
//! inline and starts from anywhere else are queued.

mod queue;

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::{Condvar, Mutex};

use crate::config::PoolConfig;
use crate::context::ContextToken;
use crate::error::{panic_message, ConfigError};
use crate::scheduler::{Scheduler, TaskRef};

use queue::InjectorQueue;

/// Worker pool scheduler.
///
/// Dropping the pool shuts it down: it waits for queued work, then joins
/// the workers.
pub struct WorkerPool {
    workers: Mutex<Vec<thread::JoinHandle<()>>>,
    shared: Arc<Shared>,
}

/// State shared between the pool handle and its workers.
struct Shared {
    queue: InjectorQueue,
    /// One token per worker. Index = worker id.
    tokens: Vec<ContextToken>,
    /// Runs dispatched and not yet finished.
    in_flight: AtomicUsize,
    idle: (Mutex<()>, Condvar),
}

impl WorkerPool {
    /// Start a pool with `workers` threads (0 = one per core).
    pub fn new(workers: usize) -> Result<Self, ConfigError> {
        Self::with_config(PoolConfig::default().with_workers(workers))
    }

    pub fn with_config(config: PoolConfig) -> Result<Self, ConfigError> {
        let worker_count = config.resolved_workers();
        let shared = Arc::new(Shared {
            queue: InjectorQueue::new(),
            tokens: (0..worker_count).map(|_| ContextToken::fresh()).collect(),
            in_flight: AtomicUsize::new(0),
            idle: (Mutex::new(()), Condvar::new()),
        });

        let mut handles = Vec::with_capacity(worker_count);
        for id in 0..worker_count {
            let name = format!("{}-{}", config.thread_name, id);
            let worker_shared = shared.clone();
            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(id, &worker_shared));
            match spawned {
                Ok(handle) => handles.push(handle),
                Err(source) => {
                    shared.queue.close();
                    for handle in handles {
                        let _ = handle.join();
                    }
                    return Err(ConfigError::Spawn { name, source });
                }
            }
        }

        tracing::debug!(workers = worker_count, name = %config.thread_name, "worker pool started");
        Ok(Self {
            workers: Mutex::new(handles),
            shared,
        })
    }

    pub fn worker_count(&self) -> usize {
        self.shared.tokens.len()
    }

    /// Context token of worker `id`.
    pub fn worker_token(&self, id: usize) -> Option<ContextToken> {
        self.shared.tokens.get(id).copied()
    }

    /// Wait until every dispatched run has finished, then stop and join
    /// the workers. Called from one of the pool's own workers it only
    /// signals the stop, since waiting would deadlock.
    pub fn shutdown(&self) {
        let on_worker = self.shared.tokens.contains(&ContextToken::current());
        if !on_worker {
            let (lock, cvar) = &self.shared.idle;
            let mut guard = lock.lock();
            while self.shared.in_flight.load(Ordering::Acquire) > 0 {
                cvar.wait(&mut guard);
            }
        }

        self.shared.queue.close();

        let current = thread::current().id();
        let mut workers = self.workers.lock();
        for handle in workers.drain(..) {
            if handle.thread().id() == current {
                continue;
            }
            let _ = handle.join();
        }
        tracing::debug!("worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if !self.workers.lock().is_empty() {
            self.shutdown();
        }
    }
}

impl Scheduler for WorkerPool {
    fn is_dispatch_needed(&self, caller: ContextToken) -> bool {
        !self.shared.tokens.contains(&caller)
    }

    fn dispatch(&self, task: TaskRef) {
        self.shared.in_flight.fetch_add(1, Ordering::AcqRel);
        if let Err(task) = self.shared.queue.push(task) {
            // Closed pool: nobody will pick it up, so run it here.
            tracing::warn!("dispatch after worker pool shutdown; running on caller");
            task.run();
            finished(&self.shared);
        }
    }
}

fn worker_loop(id: usize, shared: &Shared) {
    let _ctx = shared.tokens[id].enter();
    while let Some(task) = shared.queue.pop_blocking() {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| task.run())) {
            let msg = panic_message(payload.as_ref());
            tracing::error!(worker = id, %msg, "task panicked on worker");
        }
        finished(shared);
    }
    tracing::trace!(worker = id, "worker exiting");
}

fn finished(shared: &Shared) {
    if shared.in_flight.fetch_sub(1, Ordering::AcqRel) == 1 {
        let (lock, cvar) = &shared.idle;
        let _guard = lock.lock();
        cvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::Runnable;
    use std::sync::atomic::AtomicI32;

    struct Bump(Arc<AtomicI32>);

    impl Runnable for Bump {
        fn run(self: Arc<Self>) {
            self.0.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[test]
    fn runs_dispatched_work_before_shutdown() {
        let pool = WorkerPool::new(2).unwrap();
        let counter = Arc::new(AtomicI32::new(0));
        for _ in 0..10 {
            pool.dispatch(Arc::new(Bump(counter.clone())));
        }
        pool.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 10);
    }

    #[test]
    fn default_worker_count() {
        let pool = WorkerPool::new(0).unwrap();
        assert!(pool.worker_count() >= 1);
        pool.shutdown();
    }

    #[test]
    fn dispatch_needed_only_outside_workers() {
        let pool = WorkerPool::new(2).unwrap();
        assert!(pool.is_dispatch_needed(ContextToken::current()));
        let worker = pool.worker_token(1).unwrap();
        assert!(!pool.is_dispatch_needed(worker));
        assert!(pool.worker_token(2).is_none());
    }

    struct Explode;

    impl Runnable for Explode {
        fn run(self: Arc<Self>) {
            panic!("task blew up");
        }
    }

    #[test]
    fn panicking_task_keeps_worker_alive() {
        let pool = WorkerPool::new(1).unwrap();
        let counter = Arc::new(AtomicI32::new(0));
        pool.dispatch(Arc::new(Explode));
        pool.dispatch(Arc::new(Bump(counter.clone())));
        pool.shutdown();
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn dispatch_after_shutdown_runs_on_caller() {
        let pool = WorkerPool::new(1).unwrap();
        pool.shutdown();
        let counter = Arc::new(AtomicI32::new(0));
        pool.dispatch(Arc::new(Bump(counter.clone())));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }
}
