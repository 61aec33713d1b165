// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Job handles: the explicit start and await triggers.
//!
//! A `Job` wraps one launch together with its cancellation token and a
//! `Deferred` result slot. For a lazy launch it keeps the dormant
//! computation until `start`, `join` or `cancel` fires it. Each of those
//! takes the dormant launch out of the job, so it starts at most once.

use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cancel::CancelToken;
use crate::completion::Deferred;
use crate::error::Outcome;
use crate::start::{Dormant, Launch, StartDispatcher, StartMode};

pub struct Job<T> {
    dormant: Mutex<Option<Dormant<T>>>,
    result: Arc<Deferred<T>>,
    cancel: Arc<CancelToken>,
}

impl<T: Send + 'static> Job<T> {
    /// Launch `block(receiver)` with `mode` from the current context.
    pub fn launch<R, F, Fut>(
        dispatcher: &StartDispatcher,
        mode: StartMode,
        receiver: R,
        block: F,
    ) -> Self
    where
        R: Send + 'static,
        F: FnOnce(R) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let result = Deferred::new();
        let cancel = Arc::new(CancelToken::new());
        let launch =
            Launch::new(receiver, block, result.completer()).with_cancellation(cancel.clone());
        let dormant = dispatcher.dispatch(mode, launch).into_dormant();
        Self {
            dormant: Mutex::new(dormant),
            result,
            cancel,
        }
    }

    /// Start a lazy job with the default scheduled policy. Returns true if
    /// this call started it.
    pub fn start(&self) -> bool {
        self.start_with(StartMode::Scheduled)
    }

    /// Start a lazy job with `mode`. Returns true if this call started it;
    /// false if it was already started, or `mode` is `Lazy`.
    pub fn start_with(&self, mode: StartMode) -> bool {
        if mode.is_lazy() {
            return false;
        }
        let dormant = self.dormant.lock().take();
        match dormant {
            Some(dormant) => {
                let state = dormant.start(mode);
                tracing::trace!(?mode, ?state, "lazy job started");
                true
            }
            None => false,
        }
    }

    /// Request cancellation. A job that never started completes with
    /// `StartCancelled` without running; a running one stops at its next
    /// suspension point.
    pub fn cancel(&self) {
        self.cancel.cancel();
        self.start();
    }

    pub fn is_started(&self) -> bool {
        self.dormant.lock().is_none()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn is_complete(&self) -> bool {
        self.result.is_complete()
    }

    /// Start the job if it is still dormant, then block the calling thread
    /// until its outcome arrives.
    pub fn join(self) -> Outcome<T> {
        self.start();
        match self.result.wait() {
            Some(outcome) => outcome,
            None => unreachable!("job outcome is only taken by join"),
        }
    }
}
