use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use startup_once::{
   DedicatedThread, Initialization, InitializationError, OwnerThreadConfig, StartupCompleter,
   StartupCoordinator, StartupOutcome, StartupResult,
};
use tracing_subscriber::EnvFilter;

static INIT_CALLS: AtomicUsize = AtomicUsize::new(0);

fn bring_up(completer: StartupCompleter) -> Result<Initialization, InitializationError> {
   INIT_CALLS.fetch_add(1, Ordering::Relaxed);
   println!("Bringing the process up...");
   thread::spawn(move || {
      // Simulate the slow part of startup
      thread::sleep(Duration::from_millis(50));
      completer
         .report_completion(StartupResult::Success)
         .expect("coordinator is alive");
   });
   Ok(Initialization::Pending)
}

fn main() {
   tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env())
      .init();

   let owner = DedicatedThread::spawn(OwnerThreadConfig::default().name("main-loop")).unwrap();
   let coordinator = StartupCoordinator::new(bring_up, Arc::new(owner));

   let threads: Vec<_> = (0..5)
      .map(|i| {
         let coordinator = coordinator.clone();
         thread::spawn(move || {
            coordinator
               .request_start_blocking(move |outcome: StartupOutcome| {
                  println!("Request {i}: {outcome}");
               })
               .unwrap();
         })
      })
      .collect();

   for t in threads {
      t.join().unwrap();
   }

   while !coordinator.is_startup_successfully_completed().unwrap() {
      thread::sleep(Duration::from_millis(10));
   }

   // Late requests are answered immediately
   coordinator
      .request_start_blocking(|outcome: StartupOutcome| println!("Late request: {outcome}"))
      .unwrap();

   assert_eq!(INIT_CALLS.load(Ordering::Relaxed), 1); // Initializer ran only once
}
