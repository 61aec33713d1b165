// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Start modes and the start dispatcher.
//!
//! Two independent questions decide how a launch begins: when does the
//! first segment run, and may cancellation stop it from running at all.
//! `StartMode` fixes both answers per launch:
//!
//! | mode           | runs now | pre-start cancel check | first segment on        |
//! |----------------|----------|------------------------|-------------------------|
//! | `Scheduled`    | yes      | yes                    | scheduler's choice      |
//! | `Lazy`         | no       | at the later trigger   | the trigger's context   |
//! | `Atomic`       | yes      | no                     | scheduler's choice      |
//! | `Undispatched` | yes      | no                     | calling context         |

use std::future::Future;
use std::sync::Arc;

use crate::cancel::{CancellationState, NeverCancelled};
use crate::completion::Completion;
use crate::context::ContextToken;
use crate::coroutine::BoxFuture;
use crate::scheduler::{
    start_cancellable, start_unconditional, start_undispatched, SchedulerRef, StartDecision,
};

/// How a launched computation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StartMode {
    /// Start now through the scheduler; a computation already cancelled
    /// never runs and completes with `StartCancelled`.
    #[default]
    Scheduled,
    /// Do nothing now. A later explicit start or join starts it once.
    Lazy,
    /// Start now through the scheduler even if already cancelled.
    /// Cancellation can only take effect at a later suspension point.
    Atomic,
    /// Run the first segment on the calling context right away. Later
    /// segments resume wherever the scheduler puts them.
    Undispatched,
}

impl StartMode {
    pub const ALL: [StartMode; 4] = [
        StartMode::Scheduled,
        StartMode::Lazy,
        StartMode::Atomic,
        StartMode::Undispatched,
    ];

    /// Whether this mode defers the start to a later trigger.
    pub const fn is_lazy(self) -> bool {
        matches!(self, StartMode::Lazy)
    }
}

/// A computation bound to its receiver, the handler for its outcome, and
/// the cancellation state its start consults.
pub struct Launch<T> {
    body: BoxFuture<T>,
    completion: Box<dyn Completion<T>>,
    cancel: Arc<dyn CancellationState>,
}

impl<T: Send + 'static> Launch<T> {
    /// Bind `block` to `receiver`. `block` is not called until the first
    /// segment runs.
    pub fn new<R, F, Fut>(receiver: R, block: F, completion: impl Completion<T>) -> Self
    where
        R: Send + 'static,
        F: FnOnce(R) -> Fut + Send + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        Self {
            body: Box::pin(async move { block(receiver).await }),
            completion: Box::new(completion),
            cancel: Arc::new(NeverCancelled),
        }
    }

    /// Consult `cancel`. Without this the launch can never be cancelled.
    pub fn with_cancellation(mut self, cancel: Arc<dyn CancellationState>) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation(&self) -> &Arc<dyn CancellationState> {
        &self.cancel
    }

    pub(crate) fn into_completion(self) -> Box<dyn Completion<T>> {
        self.completion
    }

    pub(crate) fn into_parts(
        self,
    ) -> (BoxFuture<T>, Box<dyn Completion<T>>, Arc<dyn CancellationState>) {
        (self.body, self.completion, self.cancel)
    }
}

/// Where a launch is right after its start decision.
#[must_use = "a dormant launch is dropped, never started, unless kept"]
pub enum LaunchState<T> {
    /// The scheduler owns it.
    Dispatched,
    /// The first segment ran on the calling context. It has either
    /// finished or suspended and will resume through the scheduler.
    /// Under a trampolining scheduler a start issued from inside another
    /// run is queued behind it on the same context instead.
    RunningInline,
    /// Lazy: nobody owns it yet.
    Dormant(Dormant<T>),
    /// Cancelled before start; the completion already has `StartCancelled`.
    CompletedCancelled,
}

impl<T> LaunchState<T> {
    pub fn is_dormant(&self) -> bool {
        matches!(self, LaunchState::Dormant(_))
    }

    /// True if the first segment has been handed to someone.
    pub fn is_started(&self) -> bool {
        matches!(self, LaunchState::Dispatched | LaunchState::RunningInline)
    }

    /// Short name for logs and assertions.
    pub fn name(&self) -> &'static str {
        match self {
            LaunchState::Dispatched => "dispatched",
            LaunchState::RunningInline => "running-inline",
            LaunchState::Dormant(_) => "dormant",
            LaunchState::CompletedCancelled => "completed-cancelled",
        }
    }

    /// The dormant launch, if this is one.
    pub fn into_dormant(self) -> Option<Dormant<T>> {
        match self {
            LaunchState::Dormant(dormant) => Some(dormant),
            _ => None,
        }
    }
}

impl<T> std::fmt::Debug for LaunchState<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl<T> From<StartDecision> for LaunchState<T> {
    fn from(decision: StartDecision) -> Self {
        match decision {
            StartDecision::Cancelled => LaunchState::CompletedCancelled,
            StartDecision::Inline => LaunchState::RunningInline,
            StartDecision::Queued => LaunchState::Dispatched,
        }
    }
}

/// A lazily launched computation waiting for its trigger.
///
/// Starting consumes it, so it starts at most once.
#[must_use = "dropping a dormant launch discards the computation"]
pub struct Dormant<T> {
    launch: Launch<T>,
    dispatcher: StartDispatcher,
}

impl<T: Send + 'static> Dormant<T> {
    /// Start from the current context.
    pub fn start(self, mode: StartMode) -> LaunchState<T> {
        self.start_from(mode, ContextToken::current())
    }

    /// Start as if dispatched with `mode` from `caller`. Starting with
    /// `Lazy` again leaves it dormant.
    pub fn start_from(self, mode: StartMode, caller: ContextToken) -> LaunchState<T> {
        let Dormant { launch, dispatcher } = self;
        dispatcher.dispatch_from(mode, caller, launch)
    }

    pub fn cancellation(&self) -> &Arc<dyn CancellationState> {
        self.launch.cancellation()
    }
}

/// Routes a launch to one start primitive according to its `StartMode`.
///
/// Holds nothing but the scheduler; every call is independent.
#[derive(Clone)]
pub struct StartDispatcher {
    scheduler: SchedulerRef,
}

impl StartDispatcher {
    pub fn new(scheduler: SchedulerRef) -> Self {
        Self { scheduler }
    }

    pub fn scheduler(&self) -> &SchedulerRef {
        &self.scheduler
    }

    /// Dispatch from the current context.
    pub fn dispatch<T: Send + 'static>(
        &self,
        mode: StartMode,
        launch: Launch<T>,
    ) -> LaunchState<T> {
        self.dispatch_from(mode, ContextToken::current(), launch)
    }

    /// Dispatch with an explicit caller context.
    ///
    /// Exactly one of: a scheduler start primitive, a direct run of the
    /// first segment, or nothing (Lazy).
    pub fn dispatch_from<T: Send + 'static>(
        &self,
        mode: StartMode,
        caller: ContextToken,
        launch: Launch<T>,
    ) -> LaunchState<T> {
        let state: LaunchState<T> = match mode {
            StartMode::Scheduled => start_cancellable(&self.scheduler, caller, launch).into(),
            StartMode::Atomic => start_unconditional(&self.scheduler, caller, launch).into(),
            StartMode::Undispatched => start_undispatched(&self.scheduler, caller, launch).into(),
            StartMode::Lazy => LaunchState::Dormant(Dormant {
                launch,
                dispatcher: self.clone(),
            }),
        };
        tracing::trace!(?mode, ?caller, state = state.name(), "launch dispatched");
        state
    }
}

impl std::fmt::Debug for StartDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StartDispatcher").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::completion::Deferred;
    use crate::error::LaunchError;
    use crate::manual::ManualScheduler;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn setup() -> (Arc<ManualScheduler>, StartDispatcher) {
        let manual = Arc::new(ManualScheduler::new());
        let dispatcher = StartDispatcher::new(manual.clone());
        (manual, dispatcher)
    }

    fn counted(runs: &Arc<AtomicUsize>, result: &Arc<Deferred<usize>>) -> Launch<usize> {
        Launch::new(
            runs.clone(),
            |runs: Arc<AtomicUsize>| async move { runs.fetch_add(1, Ordering::SeqCst) + 1 },
            result.completer(),
        )
    }

    #[test]
    fn only_lazy_is_deferred() {
        for mode in StartMode::ALL {
            assert_eq!(mode.is_lazy(), mode == StartMode::Lazy, "{mode:?}");
        }
        assert_eq!(StartMode::default(), StartMode::Scheduled);
    }

    #[test]
    fn lazy_does_nothing_until_started() {
        let (manual, dispatcher) = setup();
        let runs = Arc::new(AtomicUsize::new(0));
        let result = Deferred::new();

        let state =
            dispatcher.dispatch_from(StartMode::Lazy, manual.token(), counted(&runs, &result));
        assert!(state.is_dormant());
        assert_eq!(manual.pending(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!result.is_complete());

        let dormant = state.into_dormant().unwrap();
        let state = dormant.start_from(StartMode::Scheduled, manual.token());
        assert_eq!(state.name(), "running-inline");
        assert_eq!(result.try_take(), Some(Ok(1)));
    }

    #[test]
    fn lazy_restart_with_lazy_stays_dormant() {
        let (manual, dispatcher) = setup();
        let runs = Arc::new(AtomicUsize::new(0));
        let result = Deferred::new();

        let dormant = dispatcher
            .dispatch(StartMode::Lazy, counted(&runs, &result))
            .into_dormant()
            .unwrap();
        let again = dormant.start(StartMode::Lazy);
        assert!(again.is_dormant());
        assert_eq!(manual.pending(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn scheduled_from_foreign_context_is_dispatched() {
        let (manual, dispatcher) = setup();
        let runs = Arc::new(AtomicUsize::new(0));
        let result = Deferred::new();

        let state = dispatcher.dispatch(StartMode::Scheduled, counted(&runs, &result));
        assert_eq!(state.name(), "dispatched");
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        manual.run_pending();
        assert_eq!(result.try_take(), Some(Ok(1)));
    }

    #[test]
    fn scheduled_pre_cancelled_completes_cancelled() {
        let (manual, dispatcher) = setup();
        let runs = Arc::new(AtomicUsize::new(0));
        let result = Deferred::new();
        let launch = counted(&runs, &result).with_cancellation(Arc::new(CancelToken::cancelled()));

        let state = dispatcher.dispatch(StartMode::Scheduled, launch);
        assert_eq!(state.name(), "completed-cancelled");
        assert_eq!(manual.pending(), 0);
        assert_eq!(result.try_take(), Some(Err(LaunchError::StartCancelled)));
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn cancelled_dormant_never_runs() {
        let (manual, dispatcher) = setup();
        let runs = Arc::new(AtomicUsize::new(0));
        let result = Deferred::new();
        let token = Arc::new(CancelToken::new());
        let launch = counted(&runs, &result).with_cancellation(token.clone());

        let dormant = dispatcher
            .dispatch(StartMode::Lazy, launch)
            .into_dormant()
            .unwrap();
        token.cancel();
        assert!(dormant.cancellation().is_cancelled());
        let state = dormant.start(StartMode::Scheduled);
        assert_eq!(state.name(), "completed-cancelled");
        assert_eq!(manual.pending(), 0);
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn launch_state_from_decision() {
        let s: LaunchState<()> = StartDecision::Queued.into();
        assert_eq!(format!("{s:?}"), "dispatched");
        let s: LaunchState<()> = StartDecision::Inline.into();
        assert_eq!(s.name(), "running-inline");
        assert!(s.is_started());
        let s: LaunchState<()> = StartDecision::Cancelled.into();
        assert!(!s.is_dormant());
        assert!(!s.is_started());
        assert!(s.into_dormant().is_none());
    }
}
