//! The per-call protocol context.

use alloc::vec::Vec;
use bitflags::bitflags;

use crate::{
    path::LockPath,
    queue::WaitQueue,
    sched,
    thread::ThreadRef,
};

bitflags! {
    /// The blocking thread-state tag a primitive picks for its waiters.
    ///
    /// The engine does not interpret the tag; it is handed verbatim to
    /// the scheduler's block callout so that thread listings can show
    /// what a thread waits for.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ThreadStates: u32 {
        /// Waiting to obtain a mutex.
        const WAITING_FOR_MUTEX = 1 << 0;
        /// Waiting to obtain a semaphore.
        const WAITING_FOR_SEMAPHORE = 1 << 1;
        /// Waiting for an event set.
        const WAITING_FOR_EVENT = 1 << 2;
        /// Waiting for a message.
        const WAITING_FOR_MESSAGE = 1 << 3;
        /// Waiting at a barrier.
        const WAITING_FOR_BARRIER = 1 << 4;
        /// Waiting for a rate-monotonic period.
        const WAITING_FOR_PERIOD = 1 << 5;
        /// Explicitly suspended.
        const SUSPENDED = 1 << 6;
    }
}

/// Wait timeout selection for an enqueue.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Timeout {
    /// Wait forever.
    None,
    /// Give up after the given number of clock ticks.
    Ticks(u64),
}

/// What the enqueue path does when blocking would close a circular
/// wait.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum DeadlockAction {
    /// Treat the deadlock as a fatal configuration error.
    Fatal,
    /// Record [`Status::Deadlock`](kstatus::Status::Deadlock) on the
    /// thread and return it, for APIs that define a recoverable error.
    Status,
}

/// Hook run by the enqueue path right after the queue lock is dropped,
/// with dispatching still disabled.
pub type EnqueueCallout = fn(&WaitQueue, &ThreadRef, &mut QueueContext);

/// Wakeup hand-off for proxies of remote threads.
pub type MpCallout = fn(&ThreadRef);

/// Does nothing; the plain enqueue callout.
pub fn enqueue_do_nothing_extra(_queue: &WaitQueue, _thread: &ThreadRef, _ctx: &mut QueueContext) {}

/// Arms the context's tick timeout for the enqueued thread.
pub fn enqueue_add_timeout_ticks(_queue: &WaitQueue, thread: &ThreadRef, ctx: &mut QueueContext) {
    if let Timeout::Ticks(ticks) = ctx.timeout {
        thread.timer_set_armed();
        sched::timer_arm_ticks(thread, ticks);
    }
}

/// Caller-specific state threaded through one protocol pass.
///
/// The context carries the knobs a primitive configures before calling
/// into the engine (blocking state tag, timeout, deadlock policy, MP
/// callout) as well as protocol-internal bookkeeping: the batch of
/// pending priority updates and the lock path of the ownership walk.
///
/// A context may be reused across protocol passes.
pub struct QueueContext {
    thread_state: ThreadStates,
    pub(crate) timeout: Timeout,
    enqueue_callout: EnqueueCallout,
    deadlock_action: DeadlockAction,
    mp_callout: Option<MpCallout>,
    priority_updates: Vec<ThreadRef>,
    pub(crate) path: LockPath,
}

impl QueueContext {
    /// A context with no timeout and the fatal deadlock policy.
    pub fn new() -> Self {
        Self {
            thread_state: ThreadStates::empty(),
            timeout: Timeout::None,
            enqueue_callout: enqueue_do_nothing_extra,
            deadlock_action: DeadlockAction::Fatal,
            mp_callout: None,
            priority_updates: Vec::new(),
            path: LockPath::new(),
        }
    }

    /// Sets the thread-state tag for the thread to enqueue.
    pub fn set_thread_state(&mut self, state: ThreadStates) {
        self.thread_state = state;
    }

    pub(crate) fn thread_state(&self) -> ThreadStates {
        self.thread_state
    }

    /// Selects the plain enqueue callout: no timeout, nothing extra.
    pub fn set_enqueue_do_nothing_extra(&mut self) {
        self.timeout = Timeout::None;
        self.enqueue_callout = enqueue_do_nothing_extra;
    }

    /// Selects the enqueue callout arming a relative timeout in clock
    /// ticks.
    pub fn set_enqueue_timeout_ticks(&mut self, ticks: u64) {
        self.timeout = Timeout::Ticks(ticks);
        self.enqueue_callout = enqueue_add_timeout_ticks;
    }

    /// Installs a custom enqueue callout.
    pub fn set_enqueue_callout(&mut self, callout: EnqueueCallout) {
        self.enqueue_callout = callout;
    }

    pub(crate) fn enqueue_callout(&self) -> EnqueueCallout {
        self.enqueue_callout
    }

    /// Selects the deadlock policy for this pass.
    ///
    /// A deadlock policy matters only for queues that may have an
    /// owner; unowned disciplines can never form a cycle.
    pub fn set_deadlock_action(&mut self, action: DeadlockAction) {
        self.deadlock_action = action;
    }

    pub(crate) fn deadlock_action(&self) -> DeadlockAction {
        self.deadlock_action
    }

    /// Installs the wakeup hand-off used when the woken thread is a
    /// proxy for a remote thread.
    pub fn set_mp_callout(&mut self, callout: MpCallout) {
        self.mp_callout = Some(callout);
    }

    pub(crate) fn mp_callout(&self) -> Option<MpCallout> {
        self.mp_callout
    }

    /// Schedules a priority recomputation for `thread`, flushed after
    /// the protocol drops its locks.
    ///
    /// Used by disciplines that change priorities while the ownership
    /// path is held (priority inheritance and friends).
    pub fn add_priority_update(&mut self, thread: &ThreadRef) {
        self.priority_updates.push(thread.clone());
    }

    /// Number of pending priority updates.
    pub fn priority_updates(&self) -> usize {
        self.priority_updates.len()
    }

    pub(crate) fn clear_priority_updates(&mut self) {
        self.priority_updates.clear();
    }

    /// Hands every batched priority update to the scheduler. Must be
    /// called with no queue or thread lock held.
    pub(crate) fn flush_priority_updates(&mut self) {
        for thread in self.priority_updates.drain(..) {
            sched::update_priority(&thread);
        }
    }
}

impl Default for QueueContext {
    fn default() -> Self {
        Self::new()
    }
}
