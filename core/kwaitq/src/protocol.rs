//! The enqueue / extract / surrender protocol.
//!
//! These are the three operations every blocking primitive is built
//! from. All of them start from a held queue lock (a
//! [`WaitQueueGuard`]), route every multi-lock acquisition through the
//! `path` module, and finish by handing the scheduler whatever wakeups
//! and priority updates the pass produced.

use alloc::{sync::Arc, vec::Vec};

use kstatus::Status;

use crate::{
    context::{DeadlockAction, QueueContext},
    flags::WaitFlag,
    ops::WaitQueueOps,
    path, sched,
    thread::ThreadRef,
    queue::WaitQueueGuard,
};

/// Per-thread decision hook for [`WaitQueueGuard::flush`].
///
/// Returning `false` stops the flush; the thread is left queued.
/// The hook may record a wait status on the thread first.
pub type FlushFilter = fn(&ThreadRef, &mut QueueContext) -> bool;

/// Flush filter extracting every waiter unchanged.
pub fn flush_default_filter(_thread: &ThreadRef, _ctx: &mut QueueContext) -> bool {
    true
}

/// Flush filter recording [`Status::Unavailable`] on every waiter.
pub fn flush_status_unavailable(thread: &ThreadRef, _ctx: &mut QueueContext) -> bool {
    thread.set_status(Status::Unavailable);
    true
}

/// Flush filter recording [`Status::ObjectWasDeleted`] on every waiter.
pub fn flush_status_object_was_deleted(thread: &ThreadRef, _ctx: &mut QueueContext) -> bool {
    thread.set_status(Status::ObjectWasDeleted);
    true
}

/// Resolves the wakeup race for a thread leaving the blocked set.
///
/// Returns whether the caller must perform the real wakeup. `false`
/// means the enqueue side lost its queue before reaching the suspend
/// and will clean up after itself.
fn make_ready_again(thread: &ThreadRef) -> bool {
    let unblock = if thread
        .wait_flags()
        .try_change_release(WaitFlag::IntendToBlock, WaitFlag::ReadyAgain)
    {
        false
    } else {
        debug_assert_eq!(thread.wait_flags().get(), WaitFlag::Blocked);
        thread.wait_flags().set(WaitFlag::ReadyAgain);
        true
    };

    thread.wait_restore_default();
    unblock
}

/// Cancels a pending wait timeout and delivers the wakeup.
///
/// Local threads go back to the scheduler; proxies of remote threads
/// are handed to the multiprocessing callout instead.
fn remove_timer_and_unblock(thread: &ThreadRef, ctx: &mut QueueContext) {
    if thread.timer_take_armed() {
        sched::timer_cancel(thread);
    }

    if thread.is_proxy() {
        if let Some(callout) = ctx.mp_callout() {
            callout(thread);
        }
    } else {
        sched::unblock(thread);
    }
}

impl<'a> WaitQueueGuard<'a> {
    /// Blocks `thread` on this queue.
    ///
    /// Claims the thread's wait state, acquires the ownership path
    /// (detecting deadlock, see the `path` module), links the thread
    /// into the blocked set through the discipline's `enqueue`, drops
    /// the queue lock, and only then suspends the thread via the
    /// scheduler capability, resolving the race against concurrent
    /// extract/surrender/timeout with the wait-flag state machine, so
    /// that exactly one side performs the wakeup.
    ///
    /// The context selects the blocking thread-state tag, the timeout,
    /// and the deadlock policy. With [`DeadlockAction::Fatal`] a
    /// detected deadlock panics; with [`DeadlockAction::Status`] it is
    /// recorded and returned, and the thread's state is left exactly as
    /// before the call (no partial linkage).
    ///
    /// Returns the thread's wait status once the wait is over.
    pub fn enqueue(
        mut self,
        operations: &'static dyn WaitQueueOps,
        thread: &ThreadRef,
        ctx: &mut QueueContext,
    ) -> Status {
        let queue = self.queue();

        thread.wait_claim(queue);

        if !path::acquire(queue, thread, ctx) {
            path::release(ctx);
            thread.wait_restore_default();
            drop(self);
            warn!(
                "wait queue {:?}: blocking {} would deadlock",
                queue.name(),
                thread.name()
            );
            return match ctx.deadlock_action() {
                DeadlockAction::Fatal => {
                    panic!("circular wait: {} on queue {:?}", thread.name(), queue.name())
                }
                DeadlockAction::Status => {
                    thread.set_status(Status::Deadlock);
                    Status::Deadlock
                }
            };
        }

        ctx.clear_priority_updates();
        thread.wait_claim_operations(operations);
        operations.enqueue(self.heads_mut(), thread, ctx);

        path::release(ctx);

        trace!("{} blocks on {:?}", thread.name(), queue.name());

        thread.set_status(Status::Successful);
        thread.wait_flags().set(WaitFlag::IntendToBlock);
        sched::dispatch_disable();
        drop(self);

        let callout = ctx.enqueue_callout();
        callout(queue, thread, ctx);

        if !thread.is_proxy() {
            sched::block(thread, ctx.thread_state());
        }

        let success = thread
            .wait_flags()
            .try_change_acquire(WaitFlag::IntendToBlock, WaitFlag::Blocked);
        if !success {
            // Some other processor finished an extract, surrender or
            // timeout first; the suspend never happens and the cleanup
            // falls to us.
            remove_timer_and_unblock(thread, ctx);
        }

        ctx.flush_priority_updates();
        sched::dispatch_enable();

        if thread.is_proxy() {
            // The protocol pass is complete locally; the thread itself
            // sleeps on its remote node until the wakeup callout fires.
            return thread.status();
        }

        thread.wait_flags().set(WaitFlag::Ready);
        thread.status()
    }

    /// Blocks `thread` on this queue, busy-waiting instead of going
    /// through the scheduler.
    ///
    /// The sticky variant of [`enqueue`](Self::enqueue): the thread
    /// keeps its processor and spins on the wait flags until the queue
    /// is surrendered to it or the timeout fires. Used by
    /// resource-sharing disciplines that trade a busy-wait for a lower
    /// hand-off latency. Must be called with dispatching enabled.
    #[cfg(feature = "smp")]
    pub fn enqueue_sticky(
        mut self,
        operations: &'static dyn WaitQueueOps,
        thread: &ThreadRef,
        ctx: &mut QueueContext,
    ) -> Status {
        let queue = self.queue();

        thread.wait_claim(queue);

        if !path::acquire(queue, thread, ctx) {
            path::release(ctx);
            thread.wait_restore_default();
            drop(self);
            warn!(
                "wait queue {:?}: blocking {} would deadlock",
                queue.name(),
                thread.name()
            );
            return match ctx.deadlock_action() {
                DeadlockAction::Fatal => {
                    panic!("circular wait: {} on queue {:?}", thread.name(), queue.name())
                }
                DeadlockAction::Status => {
                    thread.set_status(Status::Deadlock);
                    Status::Deadlock
                }
            };
        }

        ctx.clear_priority_updates();
        thread.wait_claim_operations(operations);
        operations.enqueue(self.heads_mut(), thread, ctx);

        path::release(ctx);

        trace!("{} spins on {:?}", thread.name(), queue.name());

        thread.set_status(Status::Successful);
        thread.wait_flags().set(WaitFlag::IntendToBlock);
        sched::dispatch_disable();
        drop(self);

        debug_assert_eq!(sched::dispatch_disable_level(), 1);

        let callout = ctx.enqueue_callout();
        callout(queue, thread, ctx);

        ctx.flush_priority_updates();
        sched::sticky_update(thread, 1);
        sched::dispatch_enable();

        // Stick to this processor until the queue is surrendered to us
        // or the timeout extracts us.
        while thread.wait_flags().get_acquire() == WaitFlag::IntendToBlock {
            core::hint::spin_loop();
        }

        if thread.timer_take_armed() {
            sched::timer_cancel(thread);
        }

        thread.wait_flags().set(WaitFlag::Ready);
        thread.status()
    }

    /// Removes `thread` from the blocked set; the queue lock stays
    /// held.
    ///
    /// Returns the unblock indicator: `true` means the caller must
    /// finish the wakeup (normally by passing it to
    /// [`resume`](Self::resume)); `false` means the enqueue side was
    /// caught before the suspend and will unblock itself.
    pub fn extract_locked(
        &mut self,
        operations: &'static dyn WaitQueueOps,
        thread: &ThreadRef,
        ctx: &mut QueueContext,
    ) -> bool {
        operations.extract(self.heads_mut(), thread, ctx);
        make_ready_again(thread)
    }

    /// Releases the queue and completes the wakeup of an extracted
    /// thread.
    ///
    /// `unblock` is the indicator returned by
    /// [`extract_locked`](Self::extract_locked).
    pub fn resume(self, thread: &ThreadRef, unblock: bool, ctx: &mut QueueContext) {
        if unblock {
            sched::dispatch_disable();
            drop(self);
            remove_timer_and_unblock(thread, ctx);
            sched::dispatch_enable();
        }
    }

    /// Hands the queue over from `previous_owner` to the next waiter.
    ///
    /// The discipline's `surrender` picks the new owner (or leaves the
    /// queue unowned when no thread waits); the engine transfers
    /// ownership, releases the queue, and completes the new owner's
    /// wakeup with the usual race resolution.
    pub fn surrender(
        mut self,
        previous_owner: &ThreadRef,
        ctx: &mut QueueContext,
        operations: &'static dyn WaitQueueOps,
    ) {
        debug_assert!(
            self.owner().is_none_or(|owner| Arc::ptr_eq(owner, previous_owner)),
            "surrender by a thread that does not own the queue"
        );

        ctx.clear_priority_updates();
        let new_owner = operations.surrender(self.heads_mut(), Some(previous_owner), ctx);
        self.set_owner(new_owner.clone());

        match new_owner {
            Some(thread) => {
                let unblock = make_ready_again(&thread);
                sched::dispatch_disable();
                drop(self);
                ctx.flush_priority_updates();
                if unblock {
                    remove_timer_and_unblock(&thread, ctx);
                }
                sched::dispatch_enable();
            }
            None => {
                drop(self);
                ctx.flush_priority_updates();
            }
        }
    }

    /// Wakes the next waiter of a queue whose discipline tracks no
    /// owner (plain semaphores, message queues).
    ///
    /// Like [`surrender`](Self::surrender), but ownership is neither
    /// read nor transferred.
    pub fn surrender_no_owner(
        mut self,
        ctx: &mut QueueContext,
        operations: &'static dyn WaitQueueOps,
    ) {
        ctx.clear_priority_updates();
        let next = operations.surrender(self.heads_mut(), None, ctx);

        match next {
            Some(thread) => {
                let unblock = make_ready_again(&thread);
                sched::dispatch_disable();
                drop(self);
                ctx.flush_priority_updates();
                if unblock {
                    remove_timer_and_unblock(&thread, ctx);
                }
                sched::dispatch_enable();
            }
            None => {
                drop(self);
                ctx.flush_priority_updates();
            }
        }
    }

    /// Hands the queue over to the next waiter of a sticky discipline.
    ///
    /// The new owner busy-waits in
    /// [`enqueue_sticky`](Self::enqueue_sticky) on its own processor,
    /// so no scheduler wakeup is issued; the flag transition alone
    /// releases the spinner. Asserts that it runs with dispatching
    /// disabled by exactly one level.
    #[cfg(feature = "smp")]
    pub fn surrender_sticky(
        mut self,
        previous_owner: &ThreadRef,
        ctx: &mut QueueContext,
        operations: &'static dyn WaitQueueOps,
    ) {
        debug_assert_eq!(sched::dispatch_disable_level(), 1);
        debug_assert!(
            self.owner().is_none_or(|owner| Arc::ptr_eq(owner, previous_owner)),
            "surrender by a thread that does not own the queue"
        );

        ctx.clear_priority_updates();
        let new_owner = operations.surrender(self.heads_mut(), Some(previous_owner), ctx);
        self.set_owner(new_owner.clone());

        let Some(thread) = new_owner else {
            drop(self);
            ctx.flush_priority_updates();
            sched::sticky_update(previous_owner, -1);
            return;
        };

        let unblock = make_ready_again(&thread);
        drop(self);
        ctx.flush_priority_updates();
        if unblock {
            // The new owner went through a non-sticky enqueue; fall
            // back to a scheduler wakeup.
            remove_timer_and_unblock(&thread, ctx);
        }
        sched::sticky_update(previous_owner, -1);
        sched::sticky_update(&thread, 0);
    }

    /// Extracts every waiter, stopping early if `filter` says so.
    ///
    /// Used by object deletion and broadcast operations. The filter may
    /// record a wait status on each thread before it is extracted.
    /// Returns the number of threads extracted.
    pub fn flush(
        mut self,
        operations: &'static dyn WaitQueueOps,
        filter: FlushFilter,
        ctx: &mut QueueContext,
    ) -> usize {
        let mut unblocks: Vec<ThreadRef> = Vec::new();
        let mut count = 0;

        while let Some(thread) = self.heads().front().cloned() {
            if !filter(&thread, ctx) {
                break;
            }
            operations.extract(self.heads_mut(), &thread, ctx);
            if make_ready_again(&thread) {
                unblocks.push(thread);
            }
            count += 1;
        }

        if count > 0 {
            debug!("flushed {} waiters from {:?}", count, self.queue().name());
        }

        if !unblocks.is_empty() {
            sched::dispatch_disable();
            drop(self);
            for thread in &unblocks {
                remove_timer_and_unblock(thread, ctx);
            }
            sched::dispatch_enable();
        }

        count
    }
}

/// Cancels `thread`'s pending wait, wherever it is queued.
///
/// Looks up the queue the thread blocks on, revalidating after taking
/// the queue lock, then extracts and resumes the thread. Calling this
/// for a thread that is not queued (including a second time for the
/// same wait) is a documented no-op.
pub fn extract(thread: &ThreadRef) {
    extract_with_status(thread, None);
}

/// Timer-service entry: cancels `thread`'s wait with
/// [`Status::Timeout`].
///
/// Uses the identical race resolution as every other wakeup source, so
/// at most one of timeout, extract and surrender delivers the wakeup;
/// if the wait is already over this call does nothing.
pub fn timeout(thread: &ThreadRef) {
    // The timeout that fired is the one consuming the armed marker.
    thread.timer_take_armed();
    extract_with_status(thread, Some(Status::Timeout));
}

fn extract_with_status(thread: &ThreadRef, status: Option<Status>) {
    loop {
        let queue = thread.wait_queue_ptr();
        if queue.is_null() {
            return;
        }

        // SAFETY: queues outlive the waits that name them; see
        // `WaitQueue`.
        let queue = unsafe { &*queue };

        let mut guard = queue.acquire();
        if !thread.is_waiting_on(queue) {
            // The wait ended or moved on while we were acquiring;
            // retry against the fresh state.
            drop(guard);
            continue;
        }

        let Some(operations) = thread.wait_operations() else {
            // Claim published, discipline not yet; the enqueue path
            // still holds the thread between protocol stages.
            drop(guard);
            continue;
        };

        if let Some(status) = status {
            thread.set_status(status);
        }

        let mut ctx = QueueContext::new();
        let unblock = guard.extract_locked(operations, thread, &mut ctx);
        guard.resume(thread, unblock, &mut ctx);
        return;
    }
}
