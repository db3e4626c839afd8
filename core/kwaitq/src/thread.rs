//! The engine-visible part of a thread descriptor.

use alloc::sync::Arc;
use core::{
    cell::UnsafeCell,
    fmt, ptr,
    sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering},
};

use kspin::RawTicketLock;
use kstatus::Status;

use crate::{flags::WaitFlags, ops::WaitQueueOps, queue::WaitQueue};

/// Shared handle to a [`Thread`].
pub type ThreadRef = Arc<Thread>;

/// The blocking-relevant subset of a thread control block.
///
/// A kernel embeds or pairs this descriptor with its full TCB; the
/// engine never needs to see more than this. A descriptor may also
/// stand in for a thread living on a remote processing node (a
/// *proxy*, see [`Thread::new_proxy`]): proxies travel through the
/// protocol like local threads, but are never handed to the scheduler;
/// the wakeup is routed to the multiprocessing callout instead.
pub struct Thread {
    id: u64,
    name: &'static str,
    priority: AtomicU32,
    /// Remote node this descriptor stands in for, if any.
    proxy_node: Option<u32>,
    /// The default thread lock. Guards `wait` whenever the thread is
    /// not manipulated under a queue lock.
    lock: RawTicketLock,
    wait_flags: WaitFlags,
    /// Outcome of the last protocol pass, as a [`Status`] code.
    status: AtomicI32,
    /// Whether a wait timeout is currently armed with the timer
    /// service.
    timer_armed: AtomicBool,
    wait: UnsafeCell<WaitState>,
}

/// The lock-protected wait membership of a thread.
pub(crate) struct WaitState {
    /// The queue this thread currently blocks on. Null when the thread
    /// is not part of the protocol.
    pub(crate) queue: *const WaitQueue,
    /// The discipline that ordered the thread into `queue`.
    pub(crate) operations: Option<&'static dyn WaitQueueOps>,
}

// SAFETY: `wait` is only ever accessed under `lock` or, while the
// thread is queued, under the lock of the queue it is claimed by; the
// remaining fields are atomics or immutable.
unsafe impl Send for Thread {}
unsafe impl Sync for Thread {}

impl Thread {
    fn build(id: u64, name: &'static str, priority: u32, proxy_node: Option<u32>) -> ThreadRef {
        Arc::new(Self {
            id,
            name,
            priority: AtomicU32::new(priority),
            proxy_node,
            lock: RawTicketLock::new(),
            wait_flags: WaitFlags::new(),
            status: AtomicI32::new(Status::Successful.code()),
            timer_armed: AtomicBool::new(false),
            wait: UnsafeCell::new(WaitState {
                queue: ptr::null(),
                operations: None,
            }),
        })
    }

    /// Creates a descriptor for a local thread.
    pub fn new(id: u64, name: &'static str, priority: u32) -> ThreadRef {
        Self::build(id, name, priority, None)
    }

    /// Creates a proxy descriptor standing in for a thread on remote
    /// processing node `node`.
    pub fn new_proxy(id: u64, name: &'static str, priority: u32, node: u32) -> ThreadRef {
        Self::build(id, name, priority, Some(node))
    }

    /// Thread identifier.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Thread name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Current scheduling priority; lower values rank first.
    pub fn priority(&self) -> u32 {
        self.priority.load(Ordering::Relaxed)
    }

    /// Updates the scheduling priority.
    ///
    /// The discipline reads the priority when the thread is enqueued;
    /// changing it while the thread waits does not reorder the queue.
    pub fn set_priority(&self, priority: u32) {
        self.priority.store(priority, Ordering::Relaxed);
    }

    /// Whether this descriptor is a stand-in for a remote thread.
    pub fn is_proxy(&self) -> bool {
        self.proxy_node.is_some()
    }

    /// The remote node a proxy stands in for.
    pub fn proxy_node(&self) -> Option<u32> {
        self.proxy_node
    }

    /// The wait-flag state machine cell of this thread.
    pub fn wait_flags(&self) -> &WaitFlags {
        &self.wait_flags
    }

    /// Outcome of the last protocol pass.
    pub fn status(&self) -> Status {
        // Only ever written through `set_status`, so the code is always
        // a valid `Status`.
        Status::try_from_i32(self.status.load(Ordering::Acquire)).unwrap_or(Status::Successful)
    }

    /// Records the outcome of a protocol pass.
    pub fn set_status(&self, status: Status) {
        self.status.store(status.code(), Ordering::Release);
    }

    /// Whether the thread is currently part of the blocking protocol.
    pub fn is_waiting(&self) -> bool {
        self.lock.acquire();
        let waiting = !unsafe { self.wait_state() }.queue.is_null();
        self.lock.release();
        waiting
    }

    /// Whether the thread currently blocks on `queue`.
    pub fn is_waiting_on(&self, queue: &WaitQueue) -> bool {
        self.lock.acquire();
        let waiting = ptr::eq(unsafe { self.wait_state() }.queue, queue);
        self.lock.release();
        waiting
    }

    pub(crate) fn lock(&self) -> &RawTicketLock {
        &self.lock
    }

    /// # Safety
    ///
    /// The default thread lock or the claimed queue's lock must be
    /// held.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn wait_state(&self) -> &mut WaitState {
        unsafe { &mut *self.wait.get() }
    }

    /// Claims the thread's wait state for `queue`.
    ///
    /// Called by the enqueue path with the queue lock held.
    pub(crate) fn wait_claim(&self, queue: &WaitQueue) {
        self.lock.acquire();
        unsafe { self.wait_state() }.queue = queue;
        self.lock.release();
    }

    /// Records the discipline that ordered the thread into its claimed
    /// queue.
    pub(crate) fn wait_claim_operations(&self, operations: &'static dyn WaitQueueOps) {
        self.lock.acquire();
        unsafe { self.wait_state() }.operations = Some(operations);
        self.lock.release();
    }

    /// Returns the thread to its default wait state: no queue, no
    /// operations.
    pub(crate) fn wait_restore_default(&self) {
        self.lock.acquire();
        let wait = unsafe { self.wait_state() };
        wait.queue = ptr::null();
        wait.operations = None;
        self.lock.release();
    }

    /// The queue this thread currently blocks on, as a raw pointer.
    ///
    /// The caller decides how to validate the result; see
    /// [`crate::extract`] for the revalidation loop.
    pub(crate) fn wait_queue_ptr(&self) -> *const WaitQueue {
        self.lock.acquire();
        let queue = unsafe { self.wait_state() }.queue;
        self.lock.release();
        queue
    }

    /// Reads the raw queue pointer without taking the default lock.
    ///
    /// # Safety
    ///
    /// The default thread lock or the claimed queue's lock must be
    /// held.
    pub(crate) unsafe fn wait_queue_ptr_locked(&self) -> *const WaitQueue {
        unsafe { self.wait_state() }.queue
    }

    /// The discipline the thread was enqueued with, if any.
    pub(crate) fn wait_operations(&self) -> Option<&'static dyn WaitQueueOps> {
        self.lock.acquire();
        let operations = unsafe { self.wait_state() }.operations;
        self.lock.release();
        operations
    }

    /// Marks a wait timeout as armed with the timer service.
    pub(crate) fn timer_set_armed(&self) {
        self.timer_armed.store(true, Ordering::Relaxed);
    }

    /// Takes the armed marker; returns whether a timeout was armed.
    pub(crate) fn timer_take_armed(&self) -> bool {
        self.timer_armed.swap(false, Ordering::Relaxed)
    }
}

impl fmt::Debug for Thread {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Thread")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("priority", &self.priority())
            .finish()
    }
}
