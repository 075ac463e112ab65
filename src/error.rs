//! Error types for the startup coordinator.

use thiserror::Error;

/// A fatal error raised by the initializer while bringing the process up.
///
/// Reporting this error is equivalent to completing with
/// [`StartupResult::Failure`](crate::StartupResult::Failure).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("process initialization failed (code {code}): {message}")]
pub struct InitializationError {
   /// Host-specific failure code.
   pub code: i32,
   /// Human-readable description of the failure.
   pub message: String,
}

impl InitializationError {
   /// Creates a new initialization error.
   pub fn new(code: i32, message: impl Into<String>) -> Self {
      Self {
         code,
         message: message.into(),
      }
   }
}

/// Errors returned by coordinator operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoordinatorError {
   /// The owning thread no longer accepts tasks.
   #[error("owning thread is closed")]
   OwnerThreadClosed,

   /// A task marshaled onto the owning thread was dropped before producing a result.
   #[error("task was abandoned before it produced a result")]
   TaskAbandoned,

   /// The coordinator behind a completer has been dropped.
   #[error("startup coordinator has been dropped")]
   CoordinatorGone,

   /// No process-wide coordinator has been installed.
   #[error("no startup coordinator is installed")]
   NotInstalled,
}

/// An integer that is not one of the two startup result codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("unknown startup result code {0}")]
pub struct UnknownResultCode(pub i32);

/// A completion reported outside of the `Starting` state.
///
/// This is never returned to callers; it is the payload of the panic raised by
/// [`StartupCoordinator::report_completion`](crate::StartupCoordinator::report_completion).
/// The field is the lifecycle the completion arrived in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("startup completion reported while {0:?}; process bring-up must complete exactly once")]
pub struct CompletionMisuse(pub crate::Lifecycle);
