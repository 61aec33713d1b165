// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Coroutine task object.
//!
//! A coroutine is a pinned future plus the bookkeeping needed to run it
//! segment by segment: a state word, its completion handler, the
//! cancellation state it was launched with, and the scheduler that owns
//! its resumptions. Whoever calls `run` polls one segment on the calling
//! thread; every wake-up after that goes back through
//! `Scheduler::dispatch`.

use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll, Wake, Waker};

use parking_lot::Mutex;

use crate::cancel::CancellationState;
use crate::completion::Completion;
use crate::error::{panic_message, LaunchError, Outcome};
use crate::scheduler::{Runnable, SchedulerRef};
use crate::start::Launch;

pub(crate) type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;

/// Whether cancellation may pre-empt the first segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StartPolicy {
    /// Cancelled before the first segment: complete with `StartCancelled`.
    Cancellable,
    /// The first segment always runs.
    Atomic,
}

/// Coroutine lifecycle.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CoroutineState {
    /// Created or queued, waiting to be polled.
    Ready = 0,
    /// A thread is polling it.
    Running = 1,
    /// Woken while being polled; must be polled again.
    Notified = 2,
    /// Suspended, waiting for its waker.
    Waiting = 3,
    /// Outcome delivered.
    Complete = 4,
}

impl CoroutineState {
    fn from_u8(v: u8) -> Self {
        match v {
            0 => Self::Ready,
            1 => Self::Running,
            2 => Self::Notified,
            3 => Self::Waiting,
            _ => Self::Complete,
        }
    }
}

pub(crate) struct Coroutine<T> {
    state: AtomicU8,
    /// Set when the first segment has been entered.
    started: AtomicBool,
    policy: StartPolicy,
    future: Mutex<Option<BoxFuture<T>>>,
    completion: Mutex<Option<Box<dyn Completion<T>>>>,
    cancel: Arc<dyn CancellationState>,
    scheduler: SchedulerRef,
}

impl<T> fmt::Debug for Coroutine<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coroutine")
            .field("state", &self.state())
            .field("policy", &self.policy)
            .field("started", &self.started.load(Ordering::Relaxed))
            .finish()
    }
}

impl<T> Coroutine<T> {
    pub(crate) fn state(&self) -> CoroutineState {
        CoroutineState::from_u8(self.state.load(Ordering::Acquire))
    }
}

impl<T: Send + 'static> Coroutine<T> {
    pub(crate) fn from_launch(
        launch: Launch<T>,
        policy: StartPolicy,
        scheduler: SchedulerRef,
    ) -> Arc<Self> {
        let (body, completion, cancel) = launch.into_parts();
        Arc::new(Self {
            state: AtomicU8::new(CoroutineState::Ready as u8),
            started: AtomicBool::new(false),
            policy,
            future: Mutex::new(Some(body)),
            completion: Mutex::new(Some(completion)),
            cancel,
            scheduler,
        })
    }

    /// Deliver the outcome. Later calls are ignored. A panicking handler
    /// is logged and swallowed so it never unwinds into the scheduler.
    fn finish(&self, outcome: Outcome<T>) {
        self.state.store(CoroutineState::Complete as u8, Ordering::Release);
        let completion = self.completion.lock().take();
        if let Some(completion) = completion {
            let delivered =
                panic::catch_unwind(AssertUnwindSafe(move || completion.complete(outcome)));
            if let Err(payload) = delivered {
                let msg = panic_message(payload.as_ref());
                tracing::error!(%msg, "completion handler panicked");
            }
        }
    }

    /// Poll one segment on the current thread.
    fn poll_segment(self: &Arc<Self>) {
        let waker = Waker::from(self.clone());
        let mut cx = Context::from_waker(&waker);

        let mut slot = self.future.lock();
        let Some(fut) = slot.as_mut() else {
            return;
        };
        let polled = panic::catch_unwind(AssertUnwindSafe(|| fut.as_mut().poll(&mut cx)));
        match polled {
            Ok(Poll::Ready(value)) => {
                *slot = None;
                drop(slot);
                self.finish(Ok(value));
            }
            Ok(Poll::Pending) => {
                drop(slot);
                self.park();
            }
            Err(payload) => {
                *slot = None;
                drop(slot);
                let msg = panic_message(payload.as_ref());
                tracing::debug!(%msg, "coroutine panicked");
                self.finish(Err(LaunchError::Panicked(msg)));
            }
        }
    }

    /// Running -> Waiting. If a wake-up arrived during the poll, hand the
    /// coroutine straight back to the scheduler instead.
    fn park(self: &Arc<Self>) {
        let parked = self.state.compare_exchange(
            CoroutineState::Running as u8,
            CoroutineState::Waiting as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if parked.is_err() && self.state() == CoroutineState::Notified {
            self.state.store(CoroutineState::Ready as u8, Ordering::Release);
            self.scheduler.dispatch(self.clone());
        }
    }

    /// Drop the body without running it further.
    fn abandon(&self, err: LaunchError) {
        self.future.lock().take();
        self.finish(Err(err));
    }
}

impl<T: Send + 'static> Runnable for Coroutine<T> {
    fn run(self: Arc<Self>) {
        let claimed = self.state.compare_exchange(
            CoroutineState::Ready as u8,
            CoroutineState::Running as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
        if claimed.is_err() {
            return;
        }

        let first = !self.started.swap(true, Ordering::AcqRel);
        if first {
            if self.policy == StartPolicy::Cancellable && self.cancel.is_cancelled() {
                tracing::debug!("queued start cancelled before first segment");
                self.abandon(LaunchError::StartCancelled);
                return;
            }
        } else if self.cancel.is_cancelled() {
            tracing::debug!("cancelled at suspension point");
            self.abandon(LaunchError::Cancelled);
            return;
        }

        self.poll_segment();
    }
}

impl<T: Send + 'static> Wake for Coroutine<T> {
    fn wake(self: Arc<Self>) {
        self.wake_by_ref();
    }

    fn wake_by_ref(self: &Arc<Self>) {
        loop {
            let current = self.state.load(Ordering::Acquire);
            let next = match CoroutineState::from_u8(current) {
                CoroutineState::Waiting => CoroutineState::Ready,
                CoroutineState::Running => CoroutineState::Notified,
                CoroutineState::Ready | CoroutineState::Notified | CoroutineState::Complete => {
                    return;
                }
            };
            if self
                .state
                .compare_exchange(current, next as u8, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                if next == CoroutineState::Ready {
                    self.scheduler.dispatch(self.clone());
                }
                return;
            }
        }
    }
}

/// Suspend once, asking to be resumed through the scheduler.
pub fn yield_now() -> YieldNow {
    YieldNow { yielded: false }
}

/// Future returned by [`yield_now`].
#[must_use = "futures do nothing unless awaited"]
#[derive(Debug)]
pub struct YieldNow {
    yielded: bool,
}

impl Future for YieldNow {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
        if self.yielded {
            return Poll::Ready(());
        }
        self.yielded = true;
        cx.waker().wake_by_ref();
        Poll::Pending
    }
}
