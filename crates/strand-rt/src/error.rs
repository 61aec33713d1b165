// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Launch and configuration errors.

use thiserror::Error;

/// Why a launched computation did not produce a value.
///
/// Delivered through the completion handler, never returned from
/// `StartDispatcher::dispatch` itself.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LaunchError {
    /// A cancellable start observed cancellation before the first segment ran.
    /// The computation body never executed.
    #[error("cancelled before start")]
    StartCancelled,

    /// Cancellation was observed when the computation was about to resume
    /// after a suspension point.
    #[error("cancelled at a suspension point")]
    Cancelled,

    /// The computation panicked while running a segment.
    #[error("computation panicked: {0}")]
    Panicked(String),
}

impl LaunchError {
    /// True for both pre-start and in-flight cancellation.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, LaunchError::StartCancelled | LaunchError::Cancelled)
    }
}

/// Final result of a launch as seen by its completion handler.
pub type Outcome<T> = Result<T, LaunchError>;

/// Worker pool configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `STRAND_WORKERS` was set but is not a non-negative integer.
    #[error("invalid worker count `{value}` in STRAND_WORKERS")]
    InvalidWorkers { value: String },

    /// The OS refused to start a worker thread.
    #[error("failed to spawn worker thread `{name}`")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

/// Render a panic payload the way `catch_unwind` hands it back.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_kinds() {
        assert!(LaunchError::StartCancelled.is_cancellation());
        assert!(LaunchError::Cancelled.is_cancellation());
        assert!(!LaunchError::Panicked("boom".into()).is_cancellation());
    }

    #[test]
    fn display_messages() {
        assert_eq!(LaunchError::StartCancelled.to_string(), "cancelled before start");
        assert_eq!(
            LaunchError::Panicked("boom".into()).to_string(),
            "computation panicked: boom"
        );
    }

    #[test]
    fn panic_payloads() {
        let err = std::panic::catch_unwind(|| panic!("static str")).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "static str");

        let err = std::panic::catch_unwind(|| panic!("{}", String::from("owned"))).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "owned");

        let err = std::panic::catch_unwind(|| std::panic::panic_any(7u32)).unwrap_err();
        assert_eq!(panic_message(err.as_ref()), "unknown panic");
    }
}
