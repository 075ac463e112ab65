//! Result codes and completion callbacks.
//!
//! A [`StartupCallback`] receives exactly one notification: either
//! `on_success(already_started)` or `on_failure()`. Any
//! `FnOnce(StartupOutcome)` closure can be used as a callback.

use core::any::Any;
use core::fmt;
use std::panic::{self, AssertUnwindSafe};

use crate::error::{CompletionMisuse, UnknownResultCode};

/// The result code the initializer reports when the process finishes starting.
///
/// The integer codes are stable; external hosts match on them.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartupResult {
   /// The process started successfully.
   Success = -1,
   /// The process failed to start.
   Failure = 1,
}

impl StartupResult {
   /// Returns the stable integer code of this result.
   #[inline]
   pub const fn code(self) -> i32 {
      self as i32
   }

   /// Returns `true` for [`StartupResult::Success`].
   #[inline]
   pub const fn is_success(self) -> bool {
      matches!(self, Self::Success)
   }
}

impl TryFrom<i32> for StartupResult {
   type Error = UnknownResultCode;

   fn try_from(code: i32) -> Result<Self, Self::Error> {
      match code {
         -1 => Ok(Self::Success),
         1 => Ok(Self::Failure),
         other => Err(UnknownResultCode(other)),
      }
   }
}

impl From<StartupResult> for i32 {
   #[inline]
   fn from(result: StartupResult) -> Self {
      result.code()
   }
}

/// The notification delivered to a callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StartupOutcome {
   /// Startup succeeded.
   ///
   /// `already_started` is `true` when startup had already completed before
   /// the callback was registered.
   Succeeded { already_started: bool },
   /// Startup failed.
   Failed,
}

impl StartupOutcome {
   /// Returns `true` if startup succeeded.
   #[inline]
   pub const fn is_success(self) -> bool {
      matches!(self, Self::Succeeded { .. })
   }

   /// Returns `true` if this is a success that happened before registration.
   #[inline]
   pub const fn already_started(self) -> bool {
      matches!(self, Self::Succeeded { already_started: true })
   }

   pub(crate) const fn from_result(result: StartupResult, already_started: bool) -> Self {
      match result {
         StartupResult::Success => Self::Succeeded { already_started },
         StartupResult::Failure => Self::Failed,
      }
   }
}

impl fmt::Display for StartupOutcome {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      match self {
         Self::Succeeded { already_started: true } => f.write_str("succeeded (already started)"),
         Self::Succeeded { already_started: false } => f.write_str("succeeded"),
         Self::Failed => f.write_str("failed"),
      }
   }
}

/// A one-shot startup completion callback.
///
/// Exactly one of the two methods is called, exactly once, on the owning thread.
pub trait StartupCallback: Send + 'static {
   /// Called when startup succeeded.
   fn on_success(self: Box<Self>, already_started: bool);

   /// Called when startup failed.
   fn on_failure(self: Box<Self>);
}

impl<F> StartupCallback for F
where
   F: FnOnce(StartupOutcome) + Send + 'static,
{
   #[inline]
   fn on_success(self: Box<Self>, already_started: bool) {
      (*self)(StartupOutcome::Succeeded { already_started })
   }

   #[inline]
   fn on_failure(self: Box<Self>) {
      (*self)(StartupOutcome::Failed)
   }
}

/// A registered callback, type-erased.
pub(crate) type BoxedCallback = Box<dyn StartupCallback>;

/// Delivers `outcome` to `callback`.
///
/// A panicking callback is logged and swallowed so that callbacks drained
/// alongside it are still notified. The one exception is a
/// [`CompletionMisuse`] raised inside the callback: its payload is handed
/// back for the caller to resume once the others have been notified.
pub(crate) fn deliver(
   callback: BoxedCallback,
   outcome: StartupOutcome,
) -> Option<Box<dyn Any + Send + 'static>> {
   tracing::trace!(%outcome, "delivering startup outcome");
   let payload = panic::catch_unwind(AssertUnwindSafe(move || match outcome {
      StartupOutcome::Succeeded { already_started } => callback.on_success(already_started),
      StartupOutcome::Failed => callback.on_failure(),
   }))
   .err()?;
   if payload.is::<CompletionMisuse>() {
      return Some(payload);
   }
   tracing::error!(%outcome, "startup callback panicked");
   None
}
