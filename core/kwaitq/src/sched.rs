//! Capabilities the embedding kernel provides to the engine.

use crate::{context::ThreadStates, thread::ThreadRef};

/// Scheduler operations consumed by the blocking protocol.
///
/// The engine calls these with no queue or thread lock held, except
/// where noted. Implemented by the embedding kernel via
/// [`crate_interface::impl_interface`]; the `test` feature ships a mock
/// implementation for host-side testing.
#[crate_interface::def_interface]
pub trait KschedIf {
    /// The thread executing on the current processor.
    fn current() -> ThreadRef;

    /// Takes `thread` out of the ready set, recording `state` as the
    /// reason it waits. The thread is suspended at the latest when the
    /// dispatch-disable level drops to zero.
    fn block(thread: &ThreadRef, state: ThreadStates);

    /// Makes `thread` ready again.
    fn unblock(thread: &ThreadRef);

    /// Recomputes and propagates the scheduling priority of `thread`
    /// after an ownership or contention change.
    fn update_priority(thread: &ThreadRef);

    /// Recomputes priority and adjusts the sticky level of `thread` by
    /// `delta`. A thread with a positive sticky level is kept on its
    /// processor instead of being migrated or fully descheduled.
    fn sticky_update(thread: &ThreadRef, delta: i32);

    /// Disables thread dispatching; nests.
    fn dispatch_disable();

    /// Re-enables thread dispatching; performs a dispatch when the
    /// level drops to zero. If the executing thread has blocked, the
    /// call returns only once the thread is unblocked.
    fn dispatch_enable();

    /// The current dispatch-disable level.
    fn dispatch_disable_level() -> usize;
}

/// Timer service arming per-thread wait timeouts.
///
/// When an armed timeout expires, the service calls [`crate::timeout`]
/// for the thread; the engine treats that call as just another
/// cancellation and resolves the wakeup race the usual way.
#[crate_interface::def_interface]
pub trait KtimerIf {
    /// Arms a timeout of `ticks` clock ticks for `thread`.
    fn arm_ticks(thread: &ThreadRef, ticks: u64);

    /// Cancels a previously armed timeout. May be called after the
    /// timeout has fired; the service treats that as a no-op.
    fn cancel(thread: &ThreadRef);
}

/// The thread executing on the current processor, as reported by the
/// scheduler capability.
#[inline]
pub fn current() -> ThreadRef {
    crate_interface::call_interface!(KschedIf::current)
}

#[inline]
pub(crate) fn block(thread: &ThreadRef, state: ThreadStates) {
    crate_interface::call_interface!(KschedIf::block(thread, state))
}

#[inline]
pub(crate) fn unblock(thread: &ThreadRef) {
    crate_interface::call_interface!(KschedIf::unblock(thread))
}

#[inline]
pub(crate) fn update_priority(thread: &ThreadRef) {
    crate_interface::call_interface!(KschedIf::update_priority(thread))
}

#[inline]
pub(crate) fn sticky_update(thread: &ThreadRef, delta: i32) {
    crate_interface::call_interface!(KschedIf::sticky_update(thread, delta))
}

#[inline]
pub(crate) fn dispatch_disable() {
    crate_interface::call_interface!(KschedIf::dispatch_disable)
}

#[inline]
pub(crate) fn dispatch_enable() {
    crate_interface::call_interface!(KschedIf::dispatch_enable)
}

#[inline]
pub(crate) fn dispatch_disable_level() -> usize {
    crate_interface::call_interface!(KschedIf::dispatch_disable_level)
}

#[inline]
pub(crate) fn timer_arm_ticks(thread: &ThreadRef, ticks: u64) {
    crate_interface::call_interface!(KtimerIf::arm_ticks(thread, ticks))
}

#[inline]
pub(crate) fn timer_cancel(thread: &ThreadRef) {
    crate_interface::call_interface!(KtimerIf::cancel(thread))
}
