use std::sync::{Arc, Mutex};

use startup_once::{
   global, CoordinatorError, Initialization, InitializationError, ManualExecutor, StartupCompleter,
   StartupCoordinator, StartupOutcome, StartupResult,
};

fn coordinator(owner: &Arc<ManualExecutor>) -> StartupCoordinator {
   StartupCoordinator::new(
      |_: StartupCompleter| -> Result<Initialization, InitializationError> {
         // Bring-up reports back through the process-wide entry point.
         Ok(Initialization::Pending)
      },
      owner.clone(),
   )
}

// The process-wide slot is shared by every test in this binary, so the whole
// installation story lives in one test.
#[test]
fn test_process_wide_coordinator() {
   let owner = Arc::new(ManualExecutor::new());

   assert!(global::coordinator().is_none());
   assert_eq!(
      global::report_startup_complete(StartupResult::Success),
      Err(CoordinatorError::NotInstalled)
   );

   assert!(global::install(coordinator(&owner)).is_ok());
   assert!(
      global::install(coordinator(&owner)).is_err(),
      "a second coordinator must be rejected"
   );

   let outcome = Arc::new(Mutex::new(None));
   let slot = Arc::clone(&outcome);
   global::coordinator()
      .expect("installed above")
      .request_start(move |o: StartupOutcome| *slot.lock().unwrap() = Some(o))
      .unwrap();
   assert_eq!(*outcome.lock().unwrap(), None);

   global::report_startup_complete(StartupResult::Success).unwrap();

   assert_eq!(
      *outcome.lock().unwrap(),
      Some(StartupOutcome::Succeeded {
         already_started: false
      })
   );
}
