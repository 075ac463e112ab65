//! The process-wide coordinator.
//!
//! Hosts that need a single coordinator reachable from anywhere install it
//! once at their composition root. Code that only has a coordinator handle
//! should prefer that handle over this module.

use once_cell::sync::OnceCell;

use crate::callback::StartupResult;
use crate::coordinator::StartupCoordinator;
use crate::error::CoordinatorError;

static GLOBAL: OnceCell<StartupCoordinator> = OnceCell::new();

/// Installs the process-wide coordinator.
///
/// Only the first installation wins; later ones get their coordinator back.
pub fn install(coordinator: StartupCoordinator) -> Result<(), StartupCoordinator> {
   GLOBAL.set(coordinator)?;
   tracing::debug!("process-wide startup coordinator installed");
   Ok(())
}

/// Returns the process-wide coordinator, if one is installed.
#[inline]
pub fn coordinator() -> Option<&'static StartupCoordinator> {
   GLOBAL.get()
}

/// Reports process bring-up completion to the process-wide coordinator.
///
/// # Panics
///
/// Panics if completion was already reported; see
/// [`StartupCoordinator::report_completion`].
pub fn report_startup_complete(result: StartupResult) -> Result<(), CoordinatorError> {
   coordinator()
      .ok_or(CoordinatorError::NotInstalled)?
      .report_completion(result)
}
