//! Single-shot value hand-off between two threads.
//!
//! A [`Producer`] writes a value exactly once; the matching [`Consumer`] parks
//! until the value arrives or the producer is dropped without sending.
//!
//! The state is packed into a single `AtomicU8`:
//! - Bit 0: FULL - A value has been written
//! - Bit 1: CLOSED - The producer is gone without a value
//! - Bit 2: WAITING - The consumer is (or is about to be) parked

use core::cell::UnsafeCell;
use core::mem::MaybeUninit;
use core::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use parking_lot_core::{DEFAULT_PARK_TOKEN, DEFAULT_UNPARK_TOKEN};

struct Slot<T> {
   state: AtomicU8,
   value: UnsafeCell<MaybeUninit<T>>,
}

impl<T> Slot<T> {
   /// Bit flag: A value has been written.
   const FULL: u8 = 1;
   /// Bit flag: The producer dropped without writing.
   const CLOSED: u8 = 2;
   /// Bit flag: The consumer is waiting.
   const WAITING: u8 = 4;

   const fn new() -> Self {
      Self {
         state: AtomicU8::new(0),
         value: UnsafeCell::new(MaybeUninit::uninit()),
      }
   }

   #[inline]
   fn key(&self) -> usize {
      self.state.as_ptr() as usize
   }

   /// Sets `flag` and wakes the consumer if it announced itself.
   fn publish(&self, flag: u8) {
      // Release pairs with the consumer's Acquire load so the value write is visible.
      let prev = self.state.fetch_or(flag, Ordering::Release);
      if prev & Self::WAITING != 0 {
         // SAFETY: The key is the address of `state`, the same one the consumer parks on.
         unsafe {
            parking_lot_core::unpark_all(self.key(), DEFAULT_UNPARK_TOKEN);
         }
      }
   }

   /// Parks while the state is still `expected`.
   fn park(&self, expected: u8) {
      // SAFETY: See `publish`.
      unsafe {
         let _ = parking_lot_core::park(
            self.key(),
            || self.state.load(Ordering::Acquire) == expected,
            || {},
            |_, _| {},
            DEFAULT_PARK_TOKEN,
            None,
         );
      }
   }

   /// Blocks until the value arrives or the producer closes.
   fn wait(&self) -> Option<T> {
      loop {
         let current = self.state.load(Ordering::Acquire);
         if current & Self::FULL != 0 {
            // Clear FULL first so Drop does not drop the value a second time.
            self.state.fetch_and(!Self::FULL, Ordering::Relaxed);
            // SAFETY: FULL was observed with Acquire, the producer is done writing,
            // and only the single consumer reads the value.
            return Some(unsafe { (*self.value.get()).assume_init_read() });
         }
         if current & Self::CLOSED != 0 {
            return None;
         }
         if current & Self::WAITING == 0 {
            let waiting = current | Self::WAITING;
            if self
               .state
               .compare_exchange_weak(current, waiting, Ordering::Relaxed, Ordering::Relaxed)
               .is_err()
            {
               std::hint::spin_loop();
               continue;
            }
            self.park(waiting);
         } else {
            self.park(current);
         }
      }
   }
}

impl<T> Drop for Slot<T> {
   fn drop(&mut self) {
      if *self.state.get_mut() & Self::FULL != 0 {
         // SAFETY: The value was written and never taken.
         unsafe { self.value.get_mut().assume_init_drop() };
      }
   }
}

// SAFETY: The value is written by exactly one producer before FULL is published
// and read by exactly one consumer after observing FULL.
unsafe impl<T: Send> Sync for Slot<T> {}
// SAFETY: Ownership of `T` moves from the producer's thread to the consumer's.
unsafe impl<T: Send> Send for Slot<T> {}

/// Creates a connected producer/consumer pair.
pub(crate) fn channel<T>() -> (Producer<T>, Consumer<T>) {
   let slot = Arc::new(Slot::new());
   (
      Producer {
         slot: Some(Arc::clone(&slot)),
      },
      Consumer { slot },
   )
}

/// The sending half. Dropping it without sending closes the hand-off.
pub(crate) struct Producer<T> {
   slot: Option<Arc<Slot<T>>>,
}

impl<T> Producer<T> {
   /// Writes the value and wakes the consumer.
   pub(crate) fn send(mut self, value: T) {
      if let Some(slot) = self.slot.take() {
         // SAFETY: `send` consumes the only producer, so this is the only write.
         unsafe { (*slot.value.get()).write(value) };
         slot.publish(Slot::<T>::FULL);
      }
   }
}

impl<T> Drop for Producer<T> {
   fn drop(&mut self) {
      if let Some(slot) = self.slot.take() {
         slot.publish(Slot::<T>::CLOSED);
      }
   }
}

/// The receiving half.
pub(crate) struct Consumer<T> {
   slot: Arc<Slot<T>>,
}

impl<T> Consumer<T> {
   /// Blocks until the producer sends, returning `None` if it was dropped instead.
   pub(crate) fn wait(self) -> Option<T> {
      self.slot.wait()
   }
}
