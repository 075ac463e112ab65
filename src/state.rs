//! Owning-thread lifecycle state machine.
//!
//! [`StartupState`] holds the lifecycle and the queue of pending callbacks. It
//! is only ever touched on the owning thread, through an [`OwnerCell`], and it
//! never calls out: every operation returns what the caller must do next so
//! that callbacks and the initializer run with the state released.

use core::cell::UnsafeCell;
use core::mem;
use core::sync::atomic::{AtomicBool, Ordering};

use crate::callback::{BoxedCallback, StartupOutcome, StartupResult};
use crate::error::CompletionMisuse;
use crate::executor::OwnerThread;

/// Startup lifecycle. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifecycle {
   /// Nobody has requested startup yet.
   NotStarted,
   /// The initializer has been invoked and completion is pending.
   Starting,
   /// Startup completed successfully. Terminal.
   Succeeded,
   /// Startup failed. Terminal.
   Failed,
}

impl Lifecycle {
   /// Returns `true` for `Succeeded` and `Failed`.
   #[inline]
   pub const fn is_terminal(self) -> bool {
      matches!(self, Self::Succeeded | Self::Failed)
   }

   /// The outcome delivered to a callback registered in this terminal state.
   #[inline]
   const fn late_outcome(self) -> Option<StartupOutcome> {
      match self {
         Self::Succeeded => Some(StartupOutcome::Succeeded {
            already_started: true,
         }),
         Self::Failed => Some(StartupOutcome::Failed),
         Self::NotStarted | Self::Starting => None,
      }
   }
}

/// Identifies a queued callback so it can be withdrawn again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Ticket(u64);

/// What the caller of [`StartupState::admit`] has to do next.
pub(crate) enum Admission {
   /// The callback was queued; nothing else to do.
   Queued,
   /// The coordinator is terminal; invoke the callback right away.
   Deliver(BoxedCallback, StartupOutcome),
   /// This request moved the lifecycle to `Starting`; launch the initializer.
   /// The requesting callback is queued under the ticket.
   Launch(Ticket),
}

/// The callbacks drained by a terminal transition.
pub(crate) struct Drained {
   pub(crate) callbacks: Vec<BoxedCallback>,
   pub(crate) outcome: StartupOutcome,
}

pub(crate) struct StartupState {
   lifecycle: Lifecycle,
   pending: Vec<(Ticket, BoxedCallback)>,
   next_ticket: u64,
}

impl StartupState {
   pub(crate) const fn new() -> Self {
      Self {
         lifecycle: Lifecycle::NotStarted,
         pending: Vec::new(),
         next_ticket: 0,
      }
   }

   #[inline]
   pub(crate) fn lifecycle(&self) -> Lifecycle {
      self.lifecycle
   }

   #[inline]
   pub(crate) fn pending_len(&self) -> usize {
      self.pending.len()
   }

   fn enqueue(&mut self, callback: BoxedCallback) -> Ticket {
      let ticket = Ticket(self.next_ticket);
      self.next_ticket += 1;
      self.pending.push((ticket, callback));
      ticket
   }

   /// Registers a callback. `trigger` is set for start requests and unset for observers.
   pub(crate) fn admit(&mut self, callback: BoxedCallback, trigger: bool) -> Admission {
      if let Some(outcome) = self.lifecycle.late_outcome() {
         return Admission::Deliver(callback, outcome);
      }
      let ticket = self.enqueue(callback);
      if trigger && self.lifecycle == Lifecycle::NotStarted {
         self.lifecycle = Lifecycle::Starting;
         Admission::Launch(ticket)
      } else {
         Admission::Queued
      }
   }

   /// Removes a still-queued callback, keeping the order of the others.
   pub(crate) fn withdraw(&mut self, ticket: Ticket) -> Option<BoxedCallback> {
      let index = self.pending.iter().position(|(t, _)| *t == ticket)?;
      Some(self.pending.remove(index).1)
   }

   /// Moves `Starting` to its terminal state and swaps the pending queue out.
   pub(crate) fn finish(&mut self, result: StartupResult) -> Result<Drained, CompletionMisuse> {
      if self.lifecycle != Lifecycle::Starting {
         return Err(CompletionMisuse(self.lifecycle));
      }
      self.lifecycle = match result {
         StartupResult::Success => Lifecycle::Succeeded,
         StartupResult::Failure => Lifecycle::Failed,
      };
      let callbacks = mem::take(&mut self.pending)
         .into_iter()
         .map(|(_, callback)| callback)
         .collect();
      Ok(Drained {
         callbacks,
         outcome: StartupOutcome::from_result(result, false),
      })
   }
}

/// A cell that may only be accessed on the owning thread.
///
/// Access panics off the owning thread and on re-entrant use, so a `&mut T`
/// handed out by [`OwnerCell::with`] is always unique.
pub(crate) struct OwnerCell<T> {
   value: UnsafeCell<T>,
   borrowed: AtomicBool,
}

impl<T> OwnerCell<T> {
   pub(crate) const fn new(value: T) -> Self {
      Self {
         value: UnsafeCell::new(value),
         borrowed: AtomicBool::new(false),
      }
   }

   /// Runs `f` with exclusive access to the value.
   ///
   /// # Panics
   ///
   /// Panics if called off the owning thread of `owner`, or from inside `f`.
   pub(crate) fn with<R>(&self, owner: &dyn OwnerThread, f: impl FnOnce(&mut T) -> R) -> R {
      assert!(
         owner.is_owner(),
         "startup state accessed off the owning thread"
      );
      assert!(
         !self.borrowed.swap(true, Ordering::Acquire),
         "startup state borrowed re-entrantly"
      );
      let _borrow = BorrowGuard(&self.borrowed);
      // SAFETY: Only the owning thread gets here, and the flag above rules out
      // a second live borrow on that thread.
      f(unsafe { &mut *self.value.get() })
   }
}

struct BorrowGuard<'a>(&'a AtomicBool);

impl Drop for BorrowGuard<'_> {
   #[inline]
   fn drop(&mut self) {
      self.0.store(false, Ordering::Release);
   }
}

// SAFETY: The value is only reached on the single owning thread (asserted on
// every access), so sharing the cell never shares `T` between threads. `T` must
// be `Send` because the owning thread need not be the one that created the cell.
unsafe impl<T: Send> Sync for OwnerCell<T> {}
