//! The owning thread and how work gets onto it.
//!
//! Every coordinator state transition and every callback runs on one owning
//! thread. [`OwnerThread`] is the seam: hosts with their own main loop can
//! implement it, or use one of the two executors here:
//!
//! - [`DedicatedThread`]: spawns a thread that runs posted tasks in order.
//! - [`ManualExecutor`]: queues tasks for the creating thread, which drains
//!   them with [`ManualExecutor::run_until_idle`].

use std::panic::{self, AssertUnwindSafe};
use std::thread::{self, JoinHandle, ThreadId};
use std::{fmt, io};

use crossbeam::channel::{self, Receiver, Sender};

use crate::error::CoordinatorError;
use crate::handoff;

/// A unit of work posted to the owning thread.
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// A thread that owns coordinator state.
pub trait OwnerThread: Send + Sync + 'static {
   /// Queues `task` to run on the owning thread, after every task posted before it.
   fn post(&self, task: Task) -> Result<(), CoordinatorError>;

   /// Returns `true` when called on the owning thread.
   fn is_owner(&self) -> bool;
}

/// Runs `work` on the owning thread and waits for its result.
///
/// On the owning thread `work` runs inline. Elsewhere it is posted and the
/// caller parks until the result is handed back; if the task is dropped
/// without running to completion the caller gets
/// [`CoordinatorError::TaskAbandoned`].
pub fn run_blocking<R, F>(owner: &dyn OwnerThread, work: F) -> Result<R, CoordinatorError>
where
   R: Send + 'static,
   F: FnOnce() -> R + Send + 'static,
{
   if owner.is_owner() {
      return Ok(work());
   }
   let (producer, consumer) = handoff::channel();
   owner.post(Box::new(move || producer.send(work())))?;
   consumer.wait().ok_or(CoordinatorError::TaskAbandoned)
}

/// Runs a task, logging instead of unwinding if it panics.
fn run_task(task: Task) {
   if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
      tracing::error!(thread = ?thread::current().name(), "owning-thread task panicked");
   }
}

/// Configuration for [`DedicatedThread`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerThreadConfig {
   /// Name given to the spawned thread.
   pub name: String,
   /// Stack size of the spawned thread, or the platform default.
   pub stack_size: Option<usize>,
}

impl OwnerThreadConfig {
   /// Sets the thread name.
   #[must_use]
   pub fn name(mut self, name: impl Into<String>) -> Self {
      self.name = name.into();
      self
   }

   /// Sets the thread stack size in bytes.
   #[must_use]
   pub fn stack_size(mut self, bytes: usize) -> Self {
      self.stack_size = Some(bytes);
      self
   }
}

impl Default for OwnerThreadConfig {
   fn default() -> Self {
      Self {
         name: "startup-owner".to_string(),
         stack_size: None,
      }
   }
}

/// An owning thread spawned and driven by this crate.
///
/// Tasks run in the order they were posted. Dropping the handle closes the
/// queue, lets the thread finish what was already posted, and joins it.
pub struct DedicatedThread {
   sender: Option<Sender<Task>>,
   thread_id: ThreadId,
   handle: Option<JoinHandle<()>>,
}

impl DedicatedThread {
   /// Spawns the owning thread.
   pub fn spawn(config: OwnerThreadConfig) -> io::Result<Self> {
      let (sender, receiver) = channel::unbounded::<Task>();
      let mut builder = thread::Builder::new().name(config.name.clone());
      if let Some(bytes) = config.stack_size {
         builder = builder.stack_size(bytes);
      }
      let handle = builder.spawn(move || {
         tracing::debug!("owning thread started");
         for task in receiver {
            run_task(task);
         }
         tracing::debug!("owning thread stopped");
      })?;
      Ok(Self {
         sender: Some(sender),
         thread_id: handle.thread().id(),
         handle: Some(handle),
      })
   }
}

impl OwnerThread for DedicatedThread {
   fn post(&self, task: Task) -> Result<(), CoordinatorError> {
      let sender = self.sender.as_ref().ok_or(CoordinatorError::OwnerThreadClosed)?;
      sender
         .send(task)
         .map_err(|_| CoordinatorError::OwnerThreadClosed)
   }

   #[inline]
   fn is_owner(&self) -> bool {
      thread::current().id() == self.thread_id
   }
}

impl Drop for DedicatedThread {
   fn drop(&mut self) {
      drop(self.sender.take());
      if let Some(handle) = self.handle.take() {
         // Joining ourselves would never return.
         if self.is_owner() {
            return;
         }
         if handle.join().is_err() {
            tracing::error!("owning thread terminated by panic");
         }
      }
   }
}

impl fmt::Debug for DedicatedThread {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("DedicatedThread")
         .field("thread_id", &self.thread_id)
         .field("open", &self.sender.is_some())
         .finish()
   }
}

/// An owning thread pumped by the host.
///
/// The thread that creates the executor is the owner. Tasks posted from any
/// thread wait in a queue until the owner calls [`run_until_idle`](Self::run_until_idle).
pub struct ManualExecutor {
   owner: ThreadId,
   sender: Sender<Task>,
   receiver: Receiver<Task>,
}

impl ManualExecutor {
   /// Creates an executor owned by the calling thread.
   pub fn new() -> Self {
      let (sender, receiver) = channel::unbounded();
      Self {
         owner: thread::current().id(),
         sender,
         receiver,
      }
   }

   /// Runs queued tasks until the queue is empty, including tasks posted while
   /// draining. Returns the number of tasks run.
   ///
   /// # Panics
   ///
   /// Panics when called off the owning thread.
   pub fn run_until_idle(&self) -> usize {
      assert!(self.is_owner(), "run_until_idle called off the owning thread");
      let mut ran = 0;
      while let Ok(task) = self.receiver.try_recv() {
         run_task(task);
         ran += 1;
      }
      ran
   }

   /// Number of tasks waiting to run.
   #[inline]
   pub fn queued(&self) -> usize {
      self.receiver.len()
   }
}

impl Default for ManualExecutor {
   fn default() -> Self {
      Self::new()
   }
}

impl OwnerThread for ManualExecutor {
   fn post(&self, task: Task) -> Result<(), CoordinatorError> {
      self
         .sender
         .send(task)
         .map_err(|_| CoordinatorError::OwnerThreadClosed)
   }

   #[inline]
   fn is_owner(&self) -> bool {
      thread::current().id() == self.owner
   }
}

impl fmt::Debug for ManualExecutor {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("ManualExecutor")
         .field("owner", &self.owner)
         .field("queued", &self.queued())
         .finish()
   }
}
