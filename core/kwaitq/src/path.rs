//! Ownership-path acquisition and circular-wait detection.
//!
//! Before a thread may block on an owned queue, the engine walks the
//! chain of resource owners away from that queue: the queue's owner may
//! itself be blocked on another queue, whose owner may be blocked in
//! turn, and so on. The walk acquires the lock of every queue along the
//! chain so that the discipline can safely update state (e.g. priority
//! inheritance) across all of them, and at the same time proves that
//! linking the thread in would not close a cycle of waiters.
//!
//! Cycle detection works through a global registry of the ownership
//! edges currently "in flight" across all processors, keyed by the
//! source queue. The edges in the registry form a forest at every
//! instant; an insertion whose target chains back to its own source
//! would close a cycle and is rejected, which the enqueue path reports
//! as a deadlock.
//!
//! Each edge is registered *before* the lock of its target queue is
//! acquired. Two walks racing toward each other therefore cannot
//! deadlock on queue locks: one of them sees the other's edges in the
//! registry, detects the cycle, and backs out without ever contending
//! for the lock.
//!
//! On a uniprocessor configuration there is no lock of consequence
//! besides the critical section the caller already holds, and no other
//! processor to race with; the walk degenerates to a plain chain walk
//! that only checks for the executing thread reappearing as an owner.

use crate::{context::QueueContext, queue::WaitQueue, thread::ThreadRef};

cfg_if::cfg_if! {
    if #[cfg(feature = "smp")] {
        use alloc::collections::BTreeMap;
        use alloc::sync::Arc;
        use alloc::vec::Vec;
        use kspin::SpinRaw;

        /// The in-flight ownership edges of all processors, keyed by
        /// source queue identity.
        ///
        /// Invariant: the edges form a forest; [`link_add`] refuses any
        /// insertion that would close a cycle.
        static LINK_REGISTRY: SpinRaw<BTreeMap<usize, usize>> = SpinRaw::new(BTreeMap::new());

        /// One acquired step of the ownership walk.
        struct PathLink {
            /// Registry key of the edge (the source queue).
            source: usize,
            /// The locked target queue, released on path release.
            target: *const WaitQueue,
        }

        // SAFETY: the raw queue pointer is only dereferenced while the
        // path is held, during which the queue is pinned by the wait it
        // participates in.
        unsafe impl Send for PathLink {}

        /// The LIFO stack of locks acquired by one ownership walk.
        pub(crate) struct LockPath {
            links: Vec<PathLink>,
        }

        impl LockPath {
            pub(crate) const fn new() -> Self {
                Self { links: Vec::new() }
            }
        }

        /// Registers the edge `source -> target`; fails if the edge
        /// would close a cycle.
        fn link_add(source: usize, target: usize) -> bool {
            let mut links = LINK_REGISTRY.lock();

            // Follow the already-registered edges from `target`;
            // arriving back at `source` means the new edge would close
            // a cycle.
            let mut cursor = target;
            while let Some(&next) = links.get(&cursor) {
                cursor = next;
                if cursor == source {
                    return false;
                }
            }

            let previous = links.insert(source, target);
            // The walker holds the source queue's lock, so no second
            // edge can be in flight for the same source.
            debug_assert!(previous.is_none());
            true
        }

        fn link_remove(source: usize) {
            LINK_REGISTRY.lock().remove(&source);
        }

        /// Acquires every lock needed to link `thread` onto `queue`,
        /// walking the ownership chain outward from `queue`.
        ///
        /// The caller holds `queue`'s lock and has claimed `thread`'s
        /// wait state for `queue`. On success all chain locks are held
        /// and recorded in the context's lock path. On failure (cycle
        /// detected) every transient lock has been dropped again; the
        /// caller still must run [`release`] to unwind the recorded
        /// path.
        pub(crate) fn acquire(
            queue: &WaitQueue,
            thread: &ThreadRef,
            ctx: &mut QueueContext,
        ) -> bool {
            // SAFETY: the caller holds the queue lock.
            let Some(owner) = unsafe { queue.state_mut() }.owner().cloned() else {
                return true;
            };

            if Arc::ptr_eq(&owner, thread) {
                return false;
            }

            let mut source = queue.key();
            let mut owner = owner;

            loop {
                owner.lock().acquire();
                // SAFETY: the owner's default lock is held.
                let target = unsafe { owner.wait_queue_ptr_locked() };

                if target.is_null() {
                    owner.lock().release();
                    return true;
                }

                // SAFETY: `target` is pinned by the wait that names it
                // for as long as the edge exists.
                let target = unsafe { &*target };

                if !link_add(source, target.key()) {
                    owner.lock().release();
                    return false;
                }

                // Edge registered first, then the target lock: a
                // racing walk about to close a cycle through us fails
                // in `link_add` instead of spinning on our locks.
                //
                // The target lock is only tried, never spun on, while
                // the owner's default lock is held: a cancellation
                // path holds the target lock and acquires the owner's
                // lock next, so spinning here could wait on it
                // forever. On failure back off and look at the
                // (possibly changed) wait again.
                if !target.lock().try_acquire() {
                    link_remove(source);
                    owner.lock().release();
                    core::hint::spin_loop();
                    continue;
                }
                owner.lock().release();

                ctx.path.links.push(PathLink {
                    source,
                    target,
                });

                // SAFETY: the target queue's lock is held.
                match unsafe { target.state_mut() }.owner().cloned() {
                    None => return true,
                    Some(next_owner) => {
                        source = target.key();
                        owner = next_owner;
                    }
                }
            }
        }

        /// Unwinds the recorded lock path in LIFO order, deregistering
        /// each edge and releasing its queue lock.
        ///
        /// Paired with every [`acquire`], on the success and the
        /// deadlock path alike.
        pub(crate) fn release(ctx: &mut QueueContext) {
            while let Some(link) = ctx.path.links.pop() {
                link_remove(link.source);
                // SAFETY: the lock was acquired by `acquire` and the
                // queue is still pinned by the in-flight path.
                unsafe { (*link.target).lock().release() };
            }
        }
    } else {
        use alloc::sync::Arc;

        /// Lock path of one ownership walk. With a single processor no
        /// chain locks exist, so nothing is recorded.
        pub(crate) struct LockPath;

        impl LockPath {
            pub(crate) const fn new() -> Self {
                Self
            }
        }

        /// Walks the ownership chain outward from `queue` and checks
        /// that `thread` does not reappear as an owner.
        ///
        /// The caller's critical section is the only lock of
        /// consequence, so no locks are taken and no registry is
        /// needed.
        pub(crate) fn acquire(
            queue: &WaitQueue,
            thread: &ThreadRef,
            _ctx: &mut QueueContext,
        ) -> bool {
            // SAFETY: inside the caller's critical section.
            let Some(mut owner) = unsafe { queue.state_mut() }.owner().cloned() else {
                return true;
            };

            loop {
                if Arc::ptr_eq(&owner, thread) {
                    return false;
                }

                // SAFETY: inside the caller's critical section.
                let target = unsafe { owner.wait_queue_ptr_locked() };
                if target.is_null() {
                    return true;
                }

                // SAFETY: queues outlive the waits that name them.
                match unsafe { (*target).state_mut() }.owner().cloned() {
                    None => return true,
                    Some(next_owner) => owner = next_owner,
                }
            }
        }

        pub(crate) fn release(_ctx: &mut QueueContext) {}
    }
}
