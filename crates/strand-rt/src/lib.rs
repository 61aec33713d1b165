// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Strand runtime: start modes for coroutine launches.
//!
//! A launch pairs a suspendable block with its receiver and a completion.
//! The [`StartMode`] chosen at launch decides when and where the first
//! segment runs:
//!
//! - `Scheduled` hands it to the scheduler, honouring cancellation.
//! - `Lazy` leaves it dormant until something starts it.
//! - `Atomic` hands it to the scheduler and runs it even if cancelled.
//! - `Undispatched` runs it right here on the caller's thread.
//!
//! Schedulers plug in through the [`Scheduler`] trait. Three ship with
//! the crate: [`WorkerPool`] (threads), [`ManualScheduler`] (driven by
//! hand, for tests) and [`Unconfined`] (runs on whoever wakes it).

pub mod cancel;
pub mod completion;
pub mod config;
pub mod context;
mod coroutine;
pub mod error;
pub mod job;
pub mod manual;
pub mod pool;
pub mod scheduler;
pub mod start;
pub mod unconfined;

pub use cancel::{CancelToken, CancellationState, NeverCancelled};
pub use completion::{Completion, Deferred};
pub use config::{PoolConfig, WORKERS_ENV};
pub use context::{ContextToken, EnterGuard};
pub use coroutine::{yield_now, YieldNow};
pub use error::{ConfigError, LaunchError, Outcome};
pub use job::Job;
pub use manual::ManualScheduler;
pub use pool::WorkerPool;
pub use scheduler::{
    start_cancellable, start_unconditional, start_undispatched, Runnable, Scheduler, SchedulerRef,
    StartDecision, TaskRef,
};
pub use start::{Dormant, Launch, LaunchState, StartDispatcher, StartMode};
pub use unconfined::Unconfined;
