//! A counting semaphore built on the thread-queue engine.

use core::sync::atomic::{AtomicUsize, Ordering};

use kstatus::{Status, StatusResult};
use kwaitq::{FIFO, QueueContext, ThreadStates, WaitQueue, current_thread};

/// A counting semaphore.
///
/// Allows a specified number of permits to be acquired. When no permit
/// is available the caller blocks on the wait queue; a release while
/// threads wait hands the permit to the longest waiter directly
/// instead of bouncing it through the counter, so permits are granted
/// in FIFO order.
///
/// The counter only changes under the queue lock; the relaxed loads
/// elsewhere are snapshots for diagnostics.
pub struct Semaphore {
    queue: WaitQueue,
    count: AtomicUsize,
}

impl Semaphore {
    /// Creates a new semaphore with the given number of permits.
    pub const fn new(permits: usize) -> Self {
        Self {
            queue: WaitQueue::new("semaphore"),
            count: AtomicUsize::new(permits),
        }
    }

    /// Acquires a permit, blocking until one is available.
    pub fn acquire(&self) {
        let status = self.acquire_inner(None);
        debug_assert!(status.is_successful());
    }

    /// Acquires a permit, giving up after `ticks` clock ticks.
    ///
    /// Returns [`Status::Timeout`] as the error when the wait expired
    /// before a permit was released.
    pub fn acquire_timeout(&self, ticks: u64) -> StatusResult {
        self.acquire_inner(Some(ticks)).as_result()
    }

    fn acquire_inner(&self, timeout: Option<u64>) -> Status {
        let thread = current_thread();
        let guard = self.queue.acquire();
        let count = self.count.load(Ordering::Relaxed);
        if count > 0 {
            self.count.store(count - 1, Ordering::Relaxed);
            return Status::Successful;
        }

        let mut ctx = QueueContext::new();
        ctx.set_thread_state(ThreadStates::WAITING_FOR_SEMAPHORE);
        if let Some(ticks) = timeout {
            ctx.set_enqueue_timeout_ticks(ticks);
        }
        // A successful wakeup means a released permit was handed to us
        // directly.
        guard.enqueue(&FIFO, &thread, &mut ctx)
    }

    /// Tries to acquire a permit without blocking.
    ///
    /// Returns `true` if a permit was acquired, `false` otherwise.
    pub fn try_acquire(&self) -> bool {
        let _guard = self.queue.acquire();
        let count = self.count.load(Ordering::Relaxed);
        if count > 0 {
            self.count.store(count - 1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Releases a permit.
    ///
    /// Note: This method allows releasing more permits than the semaphore was
    /// initialized with. Callers are responsible for ensuring balanced acquire/release.
    pub fn release(&self) {
        let guard = self.queue.acquire();
        if guard.first().is_some() {
            let mut ctx = QueueContext::new();
            guard.surrender_no_owner(&mut ctx, &FIFO);
        } else {
            self.count.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns the current number of available permits.
    pub fn available_permits(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// Acquires a permit and returns a guard.
    ///
    /// The permit is automatically released when the guard is dropped.
    pub fn acquire_guard(&self) -> SemaphoreGuard<'_> {
        self.acquire();
        SemaphoreGuard { sem: self }
    }
}

/// RAII guard for a semaphore permit.
///
/// The permit is automatically released when the guard is dropped.
pub struct SemaphoreGuard<'a> {
    sem: &'a Semaphore,
}

impl Drop for SemaphoreGuard<'_> {
    fn drop(&mut self) {
        self.sem.release();
    }
}

#[cfg(test)]
mod tests {
    use kwaitq::{Thread, test_support};

    use crate::Semaphore;

    #[test]
    fn permits_are_counted() {
        let me = Thread::new(test_support::next_thread_id(), "main", 10);
        test_support::set_current(&me);

        let sem = Semaphore::new(2);
        assert_eq!(sem.available_permits(), 2);

        assert!(sem.try_acquire());
        assert!(sem.try_acquire());
        assert!(!sem.try_acquire());
        assert_eq!(sem.available_permits(), 0);

        sem.release();
        assert_eq!(sem.available_permits(), 1);
        assert!(sem.try_acquire());
    }

    #[test]
    fn guard_releases_on_drop() {
        let me = Thread::new(test_support::next_thread_id(), "main", 10);
        test_support::set_current(&me);

        let sem = Semaphore::new(1);
        {
            let _guard = sem.acquire_guard();
            assert_eq!(sem.available_permits(), 0);
        }
        assert_eq!(sem.available_permits(), 1);
    }
}
