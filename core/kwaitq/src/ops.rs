//! Discipline operations: the pluggable queueing policy.

use crate::{context::QueueContext, queue::Heads, thread::ThreadRef};

/// The ordering policy of a wait queue.
///
/// A discipline decides where an enqueued thread lands in the waiting
/// set and which thread a surrender hands the resource to; the engine
/// never interprets the order itself. All three operations run with the
/// queue lock held. During `enqueue` the whole ownership path of the
/// queue is additionally held, so a discipline may walk and update
/// state across the chain (priority inheritance and friends) and batch
/// the resulting changes with
/// [`QueueContext::add_priority_update`].
///
/// Implementations are plugged in as `&'static dyn WaitQueueOps`; the
/// engine records the reference on the thread for the lifetime of the
/// wait, so a queue may even be served by different disciplines for
/// different waiters.
pub trait WaitQueueOps: Sync {
    /// Places `thread` into the waiting set.
    fn enqueue(&self, heads: &mut Heads, thread: &ThreadRef, ctx: &mut QueueContext);

    /// Removes `thread` from the waiting set.
    ///
    /// `thread` must be a member; extracting an unqueued thread is a
    /// caller contract violation.
    fn extract(&self, heads: &mut Heads, thread: &ThreadRef, ctx: &mut QueueContext);

    /// Removes and returns the thread the resource is handed to, or
    /// `None` to leave the queue idle.
    ///
    /// `previous_owner` is the outgoing owner, or `None` for
    /// disciplines that do not track ownership.
    fn surrender(
        &self,
        heads: &mut Heads,
        previous_owner: Option<&ThreadRef>,
        ctx: &mut QueueContext,
    ) -> Option<ThreadRef>;
}

/// First-in, first-out ordering.
pub struct Fifo;

/// The shared FIFO discipline instance.
pub static FIFO: Fifo = Fifo;

impl WaitQueueOps for Fifo {
    fn enqueue(&self, heads: &mut Heads, thread: &ThreadRef, _ctx: &mut QueueContext) {
        heads.push_back(thread.clone());
    }

    fn extract(&self, heads: &mut Heads, thread: &ThreadRef, _ctx: &mut QueueContext) {
        let present = heads.remove(thread);
        assert!(present, "extract of a thread not queued: {}", thread.name());
    }

    fn surrender(
        &self,
        heads: &mut Heads,
        _previous_owner: Option<&ThreadRef>,
        _ctx: &mut QueueContext,
    ) -> Option<ThreadRef> {
        heads.pop_front()
    }
}

/// Priority ordering; lower priority values rank first, FIFO among
/// equals.
///
/// The rank is fixed at enqueue time from [`Thread::priority`]; a later
/// priority change does not reorder a waiting thread.
///
/// [`Thread::priority`]: crate::Thread::priority
pub struct PriorityOrder;

/// The shared priority discipline instance.
pub static PRIORITY: PriorityOrder = PriorityOrder;

impl WaitQueueOps for PriorityOrder {
    fn enqueue(&self, heads: &mut Heads, thread: &ThreadRef, _ctx: &mut QueueContext) {
        let priority = thread.priority();
        let pos = heads.iter().position(|t| t.priority() > priority);
        match pos {
            Some(at) => heads.insert(at, thread.clone()),
            None => heads.push_back(thread.clone()),
        }
    }

    fn extract(&self, heads: &mut Heads, thread: &ThreadRef, _ctx: &mut QueueContext) {
        let present = heads.remove(thread);
        assert!(present, "extract of a thread not queued: {}", thread.name());
    }

    fn surrender(
        &self,
        heads: &mut Heads,
        _previous_owner: Option<&ThreadRef>,
        _ctx: &mut QueueContext,
    ) -> Option<ThreadRef> {
        heads.pop_front()
    }
}
