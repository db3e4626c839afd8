//! The FIFO ticket lock core.

#[cfg(feature = "smp")]
use core::sync::atomic::{AtomicU32, Ordering};

/// A fair FIFO spinlock without an attached data payload.
///
/// Each acquirer draws a ticket from `next` and spins until `serving`
/// reaches it, so waiters are served strictly in arrival order.
///
/// Unlike [`SpinLock`](crate::SpinLock), this lock is acquired and
/// released explicitly and carries no guard behavior. It is meant for
/// protocols that hold several locks at once and release them manually
/// in LIFO order, where scoped RAII guards cannot express the control
/// flow. Callers are responsible for entering an appropriate critical
/// section (see the [`guard`](crate::BaseGuard) types) before acquiring.
///
/// # Single-core optimization
///
/// Without the `smp` feature the lock state is optimized away: with only
/// one core, mutual exclusion is provided entirely by the surrounding
/// IRQ/preemption critical section.
pub struct RawTicketLock {
    #[cfg(feature = "smp")]
    next: AtomicU32,
    #[cfg(feature = "smp")]
    serving: AtomicU32,
}

impl RawTicketLock {
    /// Create a new unlocked ticket lock.
    #[inline(always)]
    pub const fn new() -> Self {
        Self {
            #[cfg(feature = "smp")]
            next: AtomicU32::new(0),
            #[cfg(feature = "smp")]
            serving: AtomicU32::new(0),
        }
    }

    /// Acquire the lock, spinning until this caller's ticket is served.
    #[inline]
    pub fn acquire(&self) {
        #[cfg(feature = "smp")]
        {
            let ticket = self.next.fetch_add(1, Ordering::Relaxed);
            while self.serving.load(Ordering::Acquire) != ticket {
                core::hint::spin_loop();
            }
        }
    }

    /// Try to acquire the lock without spinning.
    ///
    /// Succeeds only when no other ticket is outstanding.
    #[inline]
    pub fn try_acquire(&self) -> bool {
        cfg_if::cfg_if! {
            if #[cfg(feature = "smp")] {
                let serving = self.serving.load(Ordering::Relaxed);
                // The lock is free iff `next == serving`; claim the next
                // ticket only in that case.
                self.next
                    .compare_exchange(
                        serving,
                        serving.wrapping_add(1),
                        Ordering::Acquire,
                        Ordering::Relaxed,
                    )
                    .is_ok()
            } else {
                true
            }
        }
    }

    /// Release the lock, serving the next ticket in line.
    ///
    /// Must only be called by the current lock holder; this is not
    /// checked.
    #[inline]
    pub fn release(&self) {
        #[cfg(feature = "smp")]
        {
            self.serving.fetch_add(1, Ordering::Release);
        }
    }

    /// Check if the lock is currently held (heuristic only).
    ///
    /// # Warning
    ///
    /// This provides no synchronization guarantees. The result
    /// may be stale immediately. Do not use for synchronization.
    #[inline(always)]
    pub fn is_locked(&self) -> bool {
        cfg_if::cfg_if! {
            if #[cfg(feature = "smp")] {
                self.serving.load(Ordering::Relaxed) != self.next.load(Ordering::Relaxed)
            } else {
                false
            }
        }
    }
}

impl Default for RawTicketLock {
    #[inline(always)]
    fn default() -> Self {
        Self::new()
    }
}
