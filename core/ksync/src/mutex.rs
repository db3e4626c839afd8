//! A blocking mutex built on the thread-queue engine.

use alloc::sync::Arc;

use kstatus::Status;
use kwaitq::{FIFO, QueueContext, ThreadStates, WaitQueue, current_thread};

/// A [`lock_api::RawMutex`] implementation backed by a wait queue.
///
/// The owning thread is recorded on the queue. Contended acquisitions
/// block through the engine's enqueue protocol; unlocking surrenders
/// the queue, which transfers ownership to the longest waiter and
/// wakes it, so the lock is handed over in FIFO order without a
/// thundering herd.
///
/// Re-acquiring a mutex the caller already owns closes a circular wait
/// and is a fatal error, as is any cross-mutex ownership cycle; the
/// engine detects both before the thread is put to sleep.
pub struct RawMutex {
    queue: WaitQueue,
}

impl RawMutex {
    /// Creates an unlocked [`RawMutex`].
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            queue: WaitQueue::new("mutex"),
        }
    }
}

impl Default for RawMutex {
    fn default() -> Self {
        Self::new()
    }
}

unsafe impl lock_api::RawMutex for RawMutex {
    type GuardMarker = lock_api::GuardSend;

    /// Initial value for an unlocked mutex.
    ///
    /// A “non-constant” const item is a legacy way to supply an initialized
    /// value to downstream static items. Can hopefully be replaced with
    /// `const fn new() -> Self` at some point.
    #[allow(clippy::declare_interior_mutable_const)]
    const INIT: Self = RawMutex::new();

    #[inline(always)]
    fn lock(&self) {
        let thread = current_thread();
        let mut guard = self.queue.acquire();
        if guard.owner().is_none() {
            guard.set_owner(Some(thread));
            return;
        }

        let mut ctx = QueueContext::new();
        ctx.set_thread_state(ThreadStates::WAITING_FOR_MUTEX);
        // A successful wakeup means the surrendering thread already
        // transferred ownership to us.
        let status = guard.enqueue(&FIFO, &thread, &mut ctx);
        debug_assert_eq!(status, Status::Successful);
    }

    #[inline(always)]
    fn try_lock(&self) -> bool {
        let thread = current_thread();
        let mut guard = self.queue.acquire();
        if guard.owner().is_none() {
            guard.set_owner(Some(thread));
            true
        } else {
            false
        }
    }

    #[inline(always)]
    unsafe fn unlock(&self) {
        let thread = current_thread();
        let guard = self.queue.acquire();
        assert!(
            guard.owner().is_some_and(|owner| Arc::ptr_eq(owner, &thread)),
            "{} tried to release mutex it doesn't own",
            thread.name()
        );
        let mut ctx = QueueContext::new();
        guard.surrender(&thread, &mut ctx, &FIFO);
    }

    #[inline(always)]
    fn is_locked(&self) -> bool {
        let guard = self.queue.acquire();
        guard.owner().is_some()
    }
}

/// An alias of [`lock_api::Mutex`].
pub type Mutex<T> = lock_api::Mutex<RawMutex, T>;
/// An alias of [`lock_api::MutexGuard`].
pub type MutexGuard<'a, T> = lock_api::MutexGuard<'a, RawMutex, T>;

#[cfg(test)]
mod tests {
    use kwaitq::{Thread, test_support};

    use crate::Mutex;

    #[test]
    fn lock_unlock() {
        let me = Thread::new(test_support::next_thread_id(), "main", 10);
        test_support::set_current(&me);

        let m = Mutex::new(0);
        *m.lock() = 42;
        assert_eq!(*m.lock(), 42);
        assert!(!m.is_locked());
    }

    #[test]
    fn try_lock_respects_the_owner() {
        static M: Mutex<u32> = Mutex::new(0);

        let me = Thread::new(test_support::next_thread_id(), "main", 10);
        test_support::set_current(&me);

        let g1 = M.try_lock();
        assert!(g1.is_some());

        let other = Thread::new(test_support::next_thread_id(), "other", 10);
        test_support::run_thread(other, || {
            // Owned by another thread; must not be acquirable.
            assert!(M.try_lock().is_none());
        })
        .join()
        .unwrap();

        drop(g1);
        assert!(M.try_lock().is_some());
    }

    #[test]
    #[should_panic(expected = "circular wait")]
    fn relock_is_a_detected_deadlock() {
        let me = Thread::new(test_support::next_thread_id(), "main", 10);
        test_support::set_current(&me);

        let m = Mutex::new(0);
        let _g = m.lock();
        let _g2 = m.lock();
    }
}
