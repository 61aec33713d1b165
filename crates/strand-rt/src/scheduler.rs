// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Scheduler interface and start primitives.
//!
//! A scheduler answers one question (`is_dispatch_needed`) and accepts
//! queued work (`dispatch`). The three start primitives below are built
//! on those two calls; `StartDispatcher` picks one per `StartMode`.

use std::sync::Arc;

use crate::completion::Completion;
use crate::context::ContextToken;
use crate::coroutine::{Coroutine, StartPolicy};
use crate::error::LaunchError;
use crate::start::Launch;

/// A unit of work a scheduler can run. Running consumes one reference.
pub trait Runnable: Send + Sync + 'static {
    fn run(self: Arc<Self>);
}

/// Type-erased runnable as it sits in a scheduler queue.
pub type TaskRef = Arc<dyn Runnable>;

/// Shared handle to a scheduler.
pub type SchedulerRef = Arc<dyn Scheduler>;

/// Decides where queued work runs.
pub trait Scheduler: Send + Sync + 'static {
    /// Whether work started from `caller` must move to another context.
    fn is_dispatch_needed(&self, caller: ContextToken) -> bool;

    /// Queue `task` to run on a context this scheduler owns.
    ///
    /// Also used for every resumption after a suspension point.
    fn dispatch(&self, task: TaskRef);

    /// Run `task` on the calling context after `is_dispatch_needed`
    /// returned false. Schedulers that need to bound stack depth override
    /// this and may run it later on the same context, once the run in
    /// progress returns.
    fn run_inline(&self, task: TaskRef) {
        task.run();
    }
}

/// Where a start primitive left the computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartDecision {
    /// Cancellation was observed first; the completion already received
    /// `LaunchError::StartCancelled`.
    Cancelled,
    /// Handed to `run_inline` on the calling context. Usually the first
    /// segment has run by the time this returns; a trampolining scheduler
    /// such as `Unconfined` may defer it until the current run returns.
    Inline,
    /// Handed to the scheduler's queue.
    Queued,
}

/// Cancellable start: check cancellation, then run inline or queue.
pub fn start_cancellable<T: Send + 'static>(
    scheduler: &SchedulerRef,
    caller: ContextToken,
    launch: Launch<T>,
) -> StartDecision {
    if launch.cancellation().is_cancelled() {
        tracing::debug!(?caller, "start cancelled before first segment");
        launch.into_completion().complete(Err(LaunchError::StartCancelled));
        return StartDecision::Cancelled;
    }
    run_or_queue(scheduler, caller, launch, StartPolicy::Cancellable)
}

/// Unconditional start: run inline or queue, ignoring cancellation.
pub fn start_unconditional<T: Send + 'static>(
    scheduler: &SchedulerRef,
    caller: ContextToken,
    launch: Launch<T>,
) -> StartDecision {
    run_or_queue(scheduler, caller, launch, StartPolicy::Atomic)
}

/// Undispatched start: poll the first segment right here, whatever the
/// scheduler or the cancellation state says.
///
/// Nested undispatched starts recurse on the caller's stack. There is no
/// trampoline; bounding the depth is the caller's job.
pub fn start_undispatched<T: Send + 'static>(
    scheduler: &SchedulerRef,
    caller: ContextToken,
    launch: Launch<T>,
) -> StartDecision {
    tracing::trace!(?caller, "running first segment undispatched");
    let coroutine = Coroutine::from_launch(launch, StartPolicy::Atomic, scheduler.clone());
    coroutine.run();
    StartDecision::Inline
}

fn run_or_queue<T: Send + 'static>(
    scheduler: &SchedulerRef,
    caller: ContextToken,
    launch: Launch<T>,
    policy: StartPolicy,
) -> StartDecision {
    let coroutine = Coroutine::from_launch(launch, policy, scheduler.clone());
    if scheduler.is_dispatch_needed(caller) {
        tracing::trace!(?caller, ?policy, "queueing first segment");
        scheduler.dispatch(coroutine);
        StartDecision::Queued
    } else {
        tracing::trace!(?caller, ?policy, "running first segment inline");
        scheduler.run_inline(coroutine);
        StartDecision::Inline
    }
}
