use std::sync::Arc;

use startup_once::{
   DedicatedThread, Initialization, InitializationError, Initializer, OwnerThreadConfig,
   StartupCompleter, StartupCoordinator, StartupResult,
};
use tokio::time::{sleep, Duration};
use tracing_subscriber::EnvFilter;

struct BrowserProcess {
   runtime: tokio::runtime::Handle,
}

impl Initializer for BrowserProcess {
   fn enable_async_startup(&self) {
      println!("Asynchronous startup enabled");
   }

   fn initialize(&self, completer: StartupCompleter) -> Result<Initialization, InitializationError> {
      self.runtime.spawn(async move {
         sleep(Duration::from_millis(50)).await;
         // Reporting blocks until the owning thread has drained every waiter.
         tokio::task::spawn_blocking(move || completer.report_completion(StartupResult::Success))
            .await
            .expect("reporter task panicked")
            .expect("coordinator is alive");
      });
      Ok(Initialization::Pending)
   }
}

#[tokio::main]
async fn main() {
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env())
      .init();

   let owner = DedicatedThread::spawn(OwnerThreadConfig::default()).unwrap();
   let coordinator = StartupCoordinator::new(
      BrowserProcess {
         runtime: tokio::runtime::Handle::current(),
      },
      Arc::new(owner),
   );

   let tasks: Vec<_> = (0..5)
      .map(|i| {
         let coordinator = coordinator.clone();
         tokio::spawn(async move {
            let outcome = coordinator.start().await.unwrap();
            println!("Task {i}: {outcome}");
         })
      })
      .collect();

   for t in tasks {
      t.await.unwrap();
   }

   let outcome = coordinator.completed().await.unwrap();
   assert!(outcome.already_started());
   println!("Observer after startup: {outcome}");
}
