//! The startup coordinator.
//!
//! [`StartupCoordinator`] runs an [`Initializer`] at most once and tells every
//! registered [`StartupCallback`] how it went. All state lives on the owning
//! thread supplied as an [`OwnerThread`]; public methods may be called from any
//! thread and are marshaled there first.

use core::fmt;
use std::panic;
use std::sync::{Arc, Weak};

use crate::callback::{self, BoxedCallback, StartupCallback, StartupOutcome, StartupResult};
use crate::error::{CompletionMisuse, CoordinatorError, InitializationError};
use crate::executor::{self, OwnerThread};
use crate::state::{Admission, Lifecycle, OwnerCell, StartupState, Ticket};

/// What the initializer found when it was invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Initialization {
   /// Bring-up is under way; completion will be reported through the
   /// [`StartupCompleter`].
   Pending,
   /// The process had already been brought up by some other path.
   AlreadyComplete,
}

/// The host operation that actually brings the process up.
///
/// `initialize` is invoked at most once per coordinator, on the owning thread.
/// It either reports completion later through `completer` (possibly
/// re-entrantly, before returning), returns
/// [`Initialization::AlreadyComplete`], or fails.
///
/// A panic in `initialize` counts as a failure: every waiter is notified
/// before the panic continues to whoever triggered the launch.
pub trait Initializer: Send + Sync + 'static {
   /// Called on the owning thread right before [`initialize`](Self::initialize).
   fn enable_async_startup(&self) {}

   /// Starts process bring-up.
   fn initialize(&self, completer: StartupCompleter) -> Result<Initialization, InitializationError>;
}

impl<F> Initializer for F
where
   F: Fn(StartupCompleter) -> Result<Initialization, InitializationError> + Send + Sync + 'static,
{
   #[inline]
   fn initialize(&self, completer: StartupCompleter) -> Result<Initialization, InitializationError> {
      self(completer)
   }
}

struct Inner {
   owner: Arc<dyn OwnerThread>,
   initializer: Box<dyn Initializer>,
   state: OwnerCell<StartupState>,
}

impl Inner {
   #[inline]
   fn with_state<R>(&self, f: impl FnOnce(&mut StartupState) -> R) -> R {
      self.state.with(&*self.owner, f)
   }

   /// Runs `work` on the owning thread: inline if already there, posted otherwise.
   fn dispatch<F>(self: &Arc<Self>, work: F) -> Result<(), CoordinatorError>
   where
      F: FnOnce(&Arc<Self>) + Send + 'static,
   {
      if self.owner.is_owner() {
         work(self);
         return Ok(());
      }
      let this = Arc::clone(self);
      self.owner.post(Box::new(move || work(&this)))
   }

   /// Runs `work` on the owning thread and waits for its result.
   fn dispatch_blocking<R, F>(self: &Arc<Self>, work: F) -> Result<R, CoordinatorError>
   where
      R: Send + 'static,
      F: FnOnce(&Arc<Self>) -> R + Send + 'static,
   {
      let this = Arc::clone(self);
      executor::run_blocking(&*self.owner, move || work(&this))
   }

   /// Owning thread: registers a callback, launching the initializer if this
   /// is the first start request.
   fn register(self: &Arc<Self>, callback: BoxedCallback, trigger: bool) {
      let admission = self.with_state(|state| state.admit(callback, trigger));
      match admission {
         Admission::Queued => tracing::debug!(trigger, "startup callback queued"),
         Admission::Deliver(callback, outcome) => {
            tracing::debug!(%outcome, "startup already finished, notifying immediately");
            notify(callback, outcome);
         }
         Admission::Launch(ticket) => self.launch(ticket),
      }
   }

   /// Owning thread: invokes the initializer for the request holding `ticket`.
   fn launch(self: &Arc<Self>, ticket: Ticket) {
      tracing::info!("starting process initialization");
      self.initializer.enable_async_startup();
      let completer = StartupCompleter {
         inner: Arc::downgrade(self),
      };
      let initialized = panic::catch_unwind(panic::AssertUnwindSafe(|| {
         self.initializer.initialize(completer)
      }));
      let initialized = match initialized {
         Ok(initialized) => initialized,
         Err(payload) => {
            // Waiters are failed before the panic continues to the caller.
            if self.with_state(|state| state.lifecycle()) == Lifecycle::Starting {
               tracing::error!("initializer panicked, failing startup");
               if let Err(misuse) = self.complete(StartupResult::Failure) {
                  fail_loudly(misuse);
               }
            }
            panic::resume_unwind(payload);
         }
      };
      match initialized {
         Ok(Initialization::Pending) => {
            tracing::debug!("initializer running, waiting for completion");
         }
         Ok(Initialization::AlreadyComplete) => {
            tracing::info!("process was already initialized");
            // Only the requester is answered here; the shared queue keeps
            // waiting for the real completion.
            if let Some(callback) = self.with_state(|state| state.withdraw(ticket)) {
               notify(callback, StartupOutcome::Succeeded {
                  already_started: true,
               });
            }
         }
         Err(err) => {
            tracing::warn!(error = %err, "process initialization failed");
            if self.with_state(|state| state.lifecycle()) == Lifecycle::Starting {
               if let Err(misuse) = self.complete(StartupResult::Failure) {
                  fail_loudly(misuse);
               }
            } else {
               tracing::warn!("initialization error after completion was reported, ignoring");
            }
         }
      }
   }

   /// Owning thread: performs the terminal transition and drains the queue.
   fn complete(&self, result: StartupResult) -> Result<(), CompletionMisuse> {
      let drained = self.with_state(|state| state.finish(result))?;
      tracing::info!(
         outcome = %drained.outcome,
         pending = drained.callbacks.len(),
         "process startup finished"
      );
      // Every drained callback is notified before a misuse raised by one of
      // them is propagated.
      let mut misuse = None;
      for callback in drained.callbacks {
         if let Some(payload) = callback::deliver(callback, drained.outcome) {
            misuse.get_or_insert(payload);
         }
      }
      if let Some(payload) = misuse {
         panic::resume_unwind(payload);
      }
      Ok(())
   }

   fn report(self: &Arc<Self>, result: StartupResult) -> Result<(), CoordinatorError> {
      let outcome = self.dispatch_blocking(move |inner| inner.complete(result))?;
      if let Err(misuse) = outcome {
         fail_loudly(misuse);
      }
      Ok(())
   }
}

/// Notifies a single callback, propagating completion misuse it raised.
fn notify(callback: BoxedCallback, outcome: StartupOutcome) {
   if let Some(payload) = callback::deliver(callback, outcome) {
      panic::resume_unwind(payload);
   }
}

/// Panics with the misuse as payload so callers can tell it apart.
fn fail_loudly(misuse: CompletionMisuse) -> ! {
   tracing::error!(%misuse, "startup completion misuse");
   panic::panic_any(misuse)
}

/// Runs process initialization exactly once and notifies waiters in order.
///
/// Cloning is cheap; clones share the same lifecycle.
///
/// ```
/// use std::sync::Arc;
///
/// use startup_once::{
///    Initialization, InitializationError, ManualExecutor, StartupCompleter, StartupCoordinator,
///    StartupOutcome, StartupResult,
/// };
///
/// let owner = Arc::new(ManualExecutor::new());
/// let coordinator = StartupCoordinator::new(
///    |completer: StartupCompleter| -> Result<Initialization, InitializationError> {
///       completer.report_completion(StartupResult::Success).ok();
///       Ok(Initialization::Pending)
///    },
///    owner.clone(),
/// );
///
/// coordinator
///    .request_start(|outcome: StartupOutcome| assert!(outcome.is_success()))
///    .unwrap();
/// owner.run_until_idle();
/// ```
#[derive(Clone)]
pub struct StartupCoordinator {
   inner: Arc<Inner>,
}

impl StartupCoordinator {
   /// Creates a coordinator that runs `initializer` on `owner`.
   pub fn new(initializer: impl Initializer, owner: Arc<dyn OwnerThread>) -> Self {
      Self {
         inner: Arc::new(Inner {
            owner,
            initializer: Box::new(initializer),
            state: OwnerCell::new(StartupState::new()),
         }),
      }
   }

   /// Requests startup and registers `callback` for its outcome.
   ///
   /// The first request launches the initializer. Later requests never launch
   /// it again: while startup is in flight the callback is queued, and once it
   /// has finished the callback is notified right away with
   /// `already_started = true` (or the failure).
   ///
   /// Returns once the request is posted to the owning thread, or after it ran
   /// when called on the owning thread.
   pub fn request_start(&self, callback: impl StartupCallback) -> Result<(), CoordinatorError> {
      let callback: BoxedCallback = Box::new(callback);
      self.inner.dispatch(move |inner| inner.register(callback, true))
   }

   /// Like [`request_start`](Self::request_start), but waits until the owning
   /// thread has accepted the request.
   ///
   /// Must not be called while the owning thread is blocked on the caller.
   pub fn request_start_blocking(&self, callback: impl StartupCallback) -> Result<(), CoordinatorError> {
      let callback: BoxedCallback = Box::new(callback);
      self.inner.dispatch_blocking(move |inner| inner.register(callback, true))
   }

   /// Registers `callback` for the startup outcome without requesting startup.
   pub fn add_completion_observer(&self, callback: impl StartupCallback) -> Result<(), CoordinatorError> {
      let callback: BoxedCallback = Box::new(callback);
      self.inner.dispatch(move |inner| inner.register(callback, false))
   }

   /// Reports that process bring-up finished, notifying every queued callback
   /// in registration order with `already_started = false` (or the failure).
   ///
   /// Blocks until the owning thread has processed the completion.
   ///
   /// # Panics
   ///
   /// Panics with a [`CompletionMisuse`] payload if startup is not in flight:
   /// completion was already reported, or startup was never requested. This
   /// also holds when the misuse happens inside a callback; the remaining
   /// callbacks are notified first.
   pub fn report_completion(&self, result: StartupResult) -> Result<(), CoordinatorError> {
      self.inner.report(result)
   }

   /// Returns the current lifecycle, as seen by the owning thread.
   pub fn lifecycle(&self) -> Result<Lifecycle, CoordinatorError> {
      self
         .inner
         .dispatch_blocking(|inner| inner.with_state(|state| state.lifecycle()))
   }

   /// Returns `true` once startup has completed successfully.
   pub fn is_startup_successfully_completed(&self) -> Result<bool, CoordinatorError> {
      Ok(self.lifecycle()? == Lifecycle::Succeeded)
   }

   /// Returns a completer bound to this coordinator.
   pub fn completer(&self) -> StartupCompleter {
      StartupCompleter {
         inner: Arc::downgrade(&self.inner),
      }
   }

   /// Requests startup and resolves with its outcome.
   #[cfg(feature = "async-tokio")]
   pub async fn start(&self) -> Result<StartupOutcome, CoordinatorError> {
      let (tx, rx) = tokio::sync::oneshot::channel();
      self.request_start(move |outcome: StartupOutcome| {
         let _ = tx.send(outcome);
      })?;
      rx.await.map_err(|_| CoordinatorError::TaskAbandoned)
   }

   /// Resolves with the startup outcome without requesting startup.
   #[cfg(feature = "async-tokio")]
   pub async fn completed(&self) -> Result<StartupOutcome, CoordinatorError> {
      let (tx, rx) = tokio::sync::oneshot::channel();
      self.add_completion_observer(move |outcome: StartupOutcome| {
         let _ = tx.send(outcome);
      })?;
      rx.await.map_err(|_| CoordinatorError::TaskAbandoned)
   }
}

impl fmt::Debug for StartupCoordinator {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut d = f.debug_struct("StartupCoordinator");
      // Peek only when already on the owning thread; anything else would block.
      if self.inner.owner.is_owner() {
         let (lifecycle, pending) = self
            .inner
            .with_state(|state| (state.lifecycle(), state.pending_len()));
         d.field("lifecycle", &lifecycle).field("pending", &pending);
      }
      d.finish_non_exhaustive()
   }
}

/// The handle an [`Initializer`] uses to report completion.
///
/// It holds the coordinator weakly, so an initializer may keep it without
/// keeping the coordinator alive.
#[derive(Clone)]
pub struct StartupCompleter {
   inner: Weak<Inner>,
}

impl StartupCompleter {
   /// Reports that process bring-up finished.
   ///
   /// See [`StartupCoordinator::report_completion`].
   ///
   /// # Panics
   ///
   /// Panics if completion was already reported.
   pub fn report_completion(&self, result: StartupResult) -> Result<(), CoordinatorError> {
      let inner = self.inner.upgrade().ok_or(CoordinatorError::CoordinatorGone)?;
      inner.report(result)
   }
}

impl fmt::Debug for StartupCompleter {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("StartupCompleter")
         .field("live", &(self.inner.strong_count() > 0))
         .finish()
   }
}
