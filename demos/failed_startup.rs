use std::sync::Arc;

use startup_once::{
   Initialization, InitializationError, ManualExecutor, StartupCompleter, StartupCoordinator,
   StartupOutcome,
};
use tracing_subscriber::EnvFilter;

fn main() {
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env())
      .init();

   // This thread is the owning thread; it pumps the executor itself.
   let owner = Arc::new(ManualExecutor::new());
   let coordinator = StartupCoordinator::new(
      |_: StartupCompleter| -> Result<Initialization, InitializationError> {
         println!("Attempting initialization...");
         Err(InitializationError::new(4, "native library missing"))
      },
      owner.clone(),
   );

   coordinator
      .add_completion_observer(|outcome: StartupOutcome| println!("Observer: {outcome}"))
      .unwrap();
   coordinator
      .request_start(|outcome: StartupOutcome| println!("First request: {outcome}"))
      .unwrap();
   owner.run_until_idle();

   // Failure is terminal: nothing is retried
   coordinator
      .request_start(|outcome: StartupOutcome| {
         assert_eq!(outcome, StartupOutcome::Failed);
         println!("Second request: {outcome}");
      })
      .unwrap();
   assert!(!coordinator.is_startup_successfully_completed().unwrap());
}
