//! The wait queue and its lock guard.

use alloc::collections::VecDeque;
use core::{cell::UnsafeCell, fmt, ops::{Deref, DerefMut}};

use kspin::{BaseGuard, NoPreemptIrqSave, RawTicketLock};

use crate::thread::{Thread, ThreadRef};

/// Saved IRQ/preemption state of one queue-lock critical section.
pub(crate) type IrqToken = <NoPreemptIrqSave as BaseGuard>::State;

/// One blockable resource.
///
/// A synchronization object embeds a `WaitQueue` per resource it can
/// block threads on. The queue consists of a dedicated ticket lock, the
/// optional owner of the resource, and the discipline-ordered set of
/// waiting threads. The owner and the waiting set are mutated only
/// while the queue lock is held.
///
/// The queue must outlive every wait that names it: an object deleting
/// its queue has to drain the waiting set first, normally through
/// [`WaitQueueGuard::flush`].
pub struct WaitQueue {
    lock: RawTicketLock,
    state: UnsafeCell<QueueState>,
    name: &'static str,
}

// SAFETY: `state` is only accessed through the lock guard or the
// engine's path protocol, both of which hold `lock`.
unsafe impl Send for WaitQueue {}
unsafe impl Sync for WaitQueue {}

/// The lock-protected part of a [`WaitQueue`].
pub struct QueueState {
    owner: Option<ThreadRef>,
    heads: Heads,
}

impl WaitQueue {
    /// Creates an empty, unowned queue.
    pub const fn new(name: &'static str) -> Self {
        Self {
            lock: RawTicketLock::new(),
            state: UnsafeCell::new(QueueState {
                owner: None,
                heads: Heads::new(),
            }),
            name,
        }
    }

    /// The queue name, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Acquires the queue lock inside a preemption/IRQ critical
    /// section and returns the guard giving access to the queue state.
    pub fn acquire(&self) -> WaitQueueGuard<'_> {
        let irq_state = NoPreemptIrqSave::acquire();
        self.lock.acquire();
        WaitQueueGuard {
            queue: self,
            irq_state,
        }
    }

    /// Identity of this queue in the global link registry.
    pub(crate) fn key(&self) -> usize {
        self as *const _ as usize
    }

    pub(crate) fn lock(&self) -> &RawTicketLock {
        &self.lock
    }

    /// # Safety
    ///
    /// The queue lock must be held (or, without `smp`, the caller must
    /// be inside the IRQ/preemption critical section that stands in for
    /// it).
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn state_mut(&self) -> &mut QueueState {
        unsafe { &mut *self.state.get() }
    }
}

impl fmt::Debug for WaitQueue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WaitQueue").field("name", &self.name).finish()
    }
}

impl QueueState {
    /// The thread presently holding the resource, if the discipline
    /// tracks ownership.
    pub fn owner(&self) -> Option<&ThreadRef> {
        self.owner.as_ref()
    }

    /// Transfers or clears resource ownership.
    pub fn set_owner(&mut self, owner: Option<ThreadRef>) {
        self.owner = owner;
    }

    /// The discipline-ordered waiting set.
    pub fn heads(&self) -> &Heads {
        &self.heads
    }

    /// Mutable access to the waiting set.
    pub fn heads_mut(&mut self) -> &mut Heads {
        &mut self.heads
    }

    /// Whether no thread is waiting.
    pub fn is_empty(&self) -> bool {
        self.heads.is_empty()
    }

    /// The head waiter under the discipline's order, if any.
    pub fn first(&self) -> Option<ThreadRef> {
        self.heads.front().cloned()
    }
}

/// The discipline-ordered set of threads waiting on one queue.
///
/// The container itself is order-agnostic; the discipline operations
/// decide where a thread is inserted and which end surrenders first.
pub struct Heads {
    waiting: VecDeque<ThreadRef>,
}

impl Heads {
    pub(crate) const fn new() -> Self {
        Self {
            waiting: VecDeque::new(),
        }
    }

    /// Number of waiting threads.
    pub fn len(&self) -> usize {
        self.waiting.len()
    }

    /// Whether no thread is waiting.
    pub fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }

    /// The thread at the head of the order.
    pub fn front(&self) -> Option<&ThreadRef> {
        self.waiting.front()
    }

    /// Removes and returns the head thread.
    pub fn pop_front(&mut self) -> Option<ThreadRef> {
        self.waiting.pop_front()
    }

    /// Appends a thread at the tail of the order.
    pub fn push_back(&mut self, thread: ThreadRef) {
        self.waiting.push_back(thread);
    }

    /// Inserts a thread at position `at`.
    pub fn insert(&mut self, at: usize, thread: ThreadRef) {
        self.waiting.insert(at, thread);
    }

    /// Iterates the waiting threads in discipline order.
    pub fn iter(&self) -> impl Iterator<Item = &ThreadRef> {
        self.waiting.iter()
    }

    /// Removes `thread` from the set; returns whether it was present.
    pub fn remove(&mut self, thread: &Thread) -> bool {
        match self
            .waiting
            .iter()
            .position(|t| core::ptr::eq(&**t, thread))
        {
            Some(at) => {
                self.waiting.remove(at);
                true
            }
            None => false,
        }
    }

    /// Whether `thread` is a member of the set.
    pub fn contains(&self, thread: &Thread) -> bool {
        self.waiting.iter().any(|t| core::ptr::eq(&**t, thread))
    }
}

/// RAII guard for a [`WaitQueue`]'s lock.
///
/// Grants access to the queue state and carries the saved
/// IRQ/preemption state. The protocol entry points that must release
/// the queue lock themselves ([`enqueue`](Self::enqueue),
/// [`surrender`](Self::surrender), ...) consume the guard.
pub struct WaitQueueGuard<'a> {
    queue: &'a WaitQueue,
    irq_state: IrqToken,
}

impl<'a> WaitQueueGuard<'a> {
    /// The queue this guard locks.
    pub fn queue(&self) -> &'a WaitQueue {
        self.queue
    }
}

impl Deref for WaitQueueGuard<'_> {
    type Target = QueueState;

    fn deref(&self) -> &QueueState {
        // SAFETY: the guard holds the queue lock.
        unsafe { &*self.queue.state.get() }
    }
}

impl DerefMut for WaitQueueGuard<'_> {
    fn deref_mut(&mut self) -> &mut QueueState {
        // SAFETY: the guard holds the queue lock.
        unsafe { &mut *self.queue.state.get() }
    }
}

impl Drop for WaitQueueGuard<'_> {
    fn drop(&mut self) {
        self.queue.lock.release();
        NoPreemptIrqSave::release(self.irq_state);
    }
}
