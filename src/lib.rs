//! A startup gate that runs a costly, failable process initializer exactly once.
//!
//! Any number of callers, on any thread, before or after startup finishes,
//! can ask to be told when the process is up. Each of them is notified
//! exactly once, in the order they registered, with the real outcome.
//!
//! - [`StartupCoordinator`]: the gate. The first [`request_start`] launches the
//!   [`Initializer`]; everyone else just waits for the outcome.
//! - [`OwnerThread`]: the one thread on which all state changes and all
//!   callbacks happen. [`DedicatedThread`] and [`ManualExecutor`] are provided.
//! - [`global`]: an optional process-wide coordinator and completion entry point.
//!
//! # Features
//!
//! - **Exactly-once bring-up**: concurrent start requests never launch the
//!   initializer twice.
//! - **Ordered notification**: callbacks queued before completion are called
//!   in registration order; later ones are called immediately.
//! - **Terminal failure**: a failed startup is reported to every current and
//!   future callback, and never retried.
//! - **Async support**: `start().await` and `completed().await` with the
//!   `async-tokio` feature.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use startup_once::{
//!    Initialization, InitializationError, ManualExecutor, StartupCompleter, StartupCoordinator,
//!    StartupOutcome, StartupResult,
//! };
//!
//! let owner = Arc::new(ManualExecutor::new());
//! let coordinator = StartupCoordinator::new(
//!    |completer: StartupCompleter| -> Result<Initialization, InitializationError> {
//!       // Bring the process up somewhere else and report back later.
//!       std::thread::spawn(move || completer.report_completion(StartupResult::Success));
//!       Ok(Initialization::Pending)
//!    },
//!    owner.clone(),
//! );
//!
//! coordinator
//!    .request_start(|outcome: StartupOutcome| {
//!       assert_eq!(outcome, StartupOutcome::Succeeded { already_started: false });
//!    })
//!    .unwrap();
//!
//! // The host's main loop pumps the owning thread.
//! while !coordinator.is_startup_successfully_completed().unwrap() {
//!    owner.run_until_idle();
//! }
//! ```
//!
//! [`request_start`]: StartupCoordinator::request_start

/// Result codes, outcomes and callbacks.
mod callback;

/// The coordinator itself.
mod coordinator;

/// Error types.
mod error;

/// Owning-thread executors.
mod executor;

/// Process-wide installation.
pub mod global;

/// Single-shot cross-thread hand-off.
mod handoff;

/// Owning-thread state machine.
mod state;

pub use callback::{StartupCallback, StartupOutcome, StartupResult};
pub use coordinator::{Initialization, Initializer, StartupCompleter, StartupCoordinator};
pub use error::{CompletionMisuse, CoordinatorError, InitializationError, UnknownResultCode};
pub use executor::{
   run_blocking, DedicatedThread, ManualExecutor, OwnerThread, OwnerThreadConfig, Task,
};
pub use state::Lifecycle;
