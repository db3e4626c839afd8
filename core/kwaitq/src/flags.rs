//! The atomic wait-flag state machine.

use core::sync::atomic::{AtomicU32, Ordering};

/// One thread's position in the blocking protocol.
#[repr(u32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum WaitFlag {
    /// The thread takes no part in the protocol.
    Ready = 0,
    /// The thread is linked on a queue and on its way to sleep; the
    /// queue lock is no longer (or about to be no longer) held.
    IntendToBlock = 1,
    /// The thread is genuinely suspended.
    Blocked = 2,
    /// A wakeup side has claimed the thread: either it never slept, or
    /// the claimant performed the real wakeup.
    ReadyAgain = 3,
}

impl WaitFlag {
    fn from_raw(raw: u32) -> Self {
        match raw {
            0 => WaitFlag::Ready,
            1 => WaitFlag::IntendToBlock,
            2 => WaitFlag::Blocked,
            _ => WaitFlag::ReadyAgain,
        }
    }
}

/// Atomic cell holding a [`WaitFlag`].
///
/// The two-sided compare-and-swap on this cell resolves the race
/// between a thread blocking itself and another processor unblocking
/// it, without holding any lock across the suspend:
///
/// - the blocking side attempts `IntendToBlock -> Blocked` with
///   [`WaitFlags::try_change_acquire`]; failure means some other
///   processor already cancelled the wait, and the blocking side must
///   clean up instead of sleeping;
/// - the waking side attempts `IntendToBlock -> ReadyAgain` with
///   [`WaitFlags::try_change_release`]; failure means the thread
///   reached `Blocked` first and the waking side must perform a real
///   wakeup.
///
/// Exactly one of the two sides wins; there is no interleaving in which
/// a wakeup is lost or performed twice.
pub struct WaitFlags(AtomicU32);

impl WaitFlags {
    /// A fresh cell in the [`WaitFlag::Ready`] state.
    pub const fn new() -> Self {
        Self(AtomicU32::new(WaitFlag::Ready as u32))
    }

    /// Current flag value, without ordering guarantees.
    #[inline]
    pub fn get(&self) -> WaitFlag {
        WaitFlag::from_raw(self.0.load(Ordering::Relaxed))
    }

    /// Current flag value with acquire ordering, pairing with the
    /// waking side's release transition.
    #[inline]
    pub fn get_acquire(&self) -> WaitFlag {
        WaitFlag::from_raw(self.0.load(Ordering::Acquire))
    }

    /// Unconditional store. Only valid when the caller already owns the
    /// transition, e.g. setting `ReadyAgain` after observing `Blocked`
    /// under the queue lock.
    #[inline]
    pub fn set(&self, flag: WaitFlag) {
        self.0.store(flag as u32, Ordering::Relaxed);
    }

    /// One-shot `from -> to` transition with acquire ordering.
    #[inline]
    pub fn try_change_acquire(&self, from: WaitFlag, to: WaitFlag) -> bool {
        self.0
            .compare_exchange(from as u32, to as u32, Ordering::Acquire, Ordering::Acquire)
            .is_ok()
    }

    /// One-shot `from -> to` transition with release ordering.
    #[inline]
    pub fn try_change_release(&self, from: WaitFlag, to: WaitFlag) -> bool {
        self.0
            .compare_exchange(from as u32, to as u32, Ordering::Release, Ordering::Relaxed)
            .is_ok()
    }
}

impl Default for WaitFlags {
    fn default() -> Self {
        Self::new()
    }
}
