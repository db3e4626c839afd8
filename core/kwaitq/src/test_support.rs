//! Host-side mock implementations of the kernel capabilities.
//!
//! Enabled by the `test` feature. The mock scheduler runs protocol
//! participants as ordinary `std` threads: [`KschedIf::block`] marks a
//! descriptor blocked, and the dispatch-enable that ends the protocol
//! pass parks the `std` thread on a condvar until some other
//! participant unblocks it. The mock timer only records arm/cancel
//! calls; tests drive expiry themselves through [`crate::timeout`].
//!
//! State is keyed by thread id and never reset, so tests running in
//! parallel stay independent as long as each builds its descriptors
//! with [`next_thread_id`].

use std::{
    cell::{Cell, RefCell},
    collections::BTreeMap,
    sync::{Condvar, Mutex},
    sync::atomic::{AtomicU64, Ordering},
    thread::JoinHandle,
};

use crate::{
    context::ThreadStates,
    sched::{KschedIf, KtimerIf},
    thread::ThreadRef,
};

struct KernelState {
    /// Blocked descriptors and the reason they wait.
    blocked: BTreeMap<u64, ThreadStates>,
    /// Net sticky level per descriptor.
    sticky: BTreeMap<u64, i32>,
    /// Every priority recomputation the engine requested.
    priority_updates: Vec<u64>,
    /// Armed wait timeouts, in ticks.
    armed: BTreeMap<u64, u64>,
    /// Every timer cancellation the engine requested.
    cancelled: Vec<u64>,
}

static STATE: Mutex<KernelState> = Mutex::new(KernelState {
    blocked: BTreeMap::new(),
    sticky: BTreeMap::new(),
    priority_updates: Vec::new(),
    armed: BTreeMap::new(),
    cancelled: Vec::new(),
});

static WAKEUP: Condvar = Condvar::new();

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static CURRENT: RefCell<Option<ThreadRef>> = const { RefCell::new(None) };
    static DISPATCH_LEVEL: Cell<usize> = const { Cell::new(0) };
}

struct MockKernel;

#[crate_interface::impl_interface]
impl KschedIf for MockKernel {
    fn current() -> ThreadRef {
        CURRENT
            .with(|c| c.borrow().clone())
            .expect("no current thread; call test_support::set_current first")
    }

    fn block(thread: &ThreadRef, state: ThreadStates) {
        STATE.lock().unwrap().blocked.insert(thread.id(), state);
    }

    fn unblock(thread: &ThreadRef) {
        STATE.lock().unwrap().blocked.remove(&thread.id());
        WAKEUP.notify_all();
    }

    fn update_priority(thread: &ThreadRef) {
        STATE.lock().unwrap().priority_updates.push(thread.id());
    }

    fn sticky_update(thread: &ThreadRef, delta: i32) {
        *STATE
            .lock()
            .unwrap()
            .sticky
            .entry(thread.id())
            .or_insert(0) += delta;
    }

    fn dispatch_disable() {
        DISPATCH_LEVEL.with(|level| level.set(level.get() + 1));
    }

    fn dispatch_enable() {
        let level = DISPATCH_LEVEL.with(|level| {
            let value = level.get();
            assert!(value > 0, "dispatch enable without matching disable");
            level.set(value - 1);
            value - 1
        });
        if level > 0 {
            return;
        }

        // The pass is over; if the executing thread blocked itself,
        // suspend here until some other participant unblocks it.
        let Some(current) = CURRENT.with(|c| c.borrow().clone()) else {
            return;
        };
        let mut state = STATE.lock().unwrap();
        while state.blocked.contains_key(&current.id()) {
            state = WAKEUP.wait(state).unwrap();
        }
    }

    fn dispatch_disable_level() -> usize {
        DISPATCH_LEVEL.with(|level| level.get())
    }
}

#[crate_interface::impl_interface]
impl KtimerIf for MockKernel {
    fn arm_ticks(thread: &ThreadRef, ticks: u64) {
        STATE.lock().unwrap().armed.insert(thread.id(), ticks);
    }

    fn cancel(thread: &ThreadRef) {
        let mut state = STATE.lock().unwrap();
        state.armed.remove(&thread.id());
        state.cancelled.push(thread.id());
    }
}

/// A process-unique thread id for building test descriptors.
pub fn next_thread_id() -> u64 {
    NEXT_ID.fetch_add(1, Ordering::Relaxed)
}

/// Registers `thread` as the one executing on this `std` thread.
pub fn set_current(thread: &ThreadRef) {
    CURRENT.with(|c| *c.borrow_mut() = Some(thread.clone()));
}

/// Spawns a `std` thread with `thread` registered as the executing
/// thread and runs `f` on it.
pub fn run_thread(thread: ThreadRef, f: impl FnOnce() + Send + 'static) -> JoinHandle<()> {
    std::thread::spawn(move || {
        set_current(&thread);
        f();
    })
}

/// Whether the mock scheduler holds `thread` blocked.
pub fn is_blocked(thread: &ThreadRef) -> bool {
    STATE.lock().unwrap().blocked.contains_key(&thread.id())
}

/// The reason `thread` blocks, as recorded by the block callout.
pub fn blocked_state(thread: &ThreadRef) -> Option<ThreadStates> {
    STATE.lock().unwrap().blocked.get(&thread.id()).copied()
}

/// The armed wait timeout of `thread`, in ticks.
pub fn armed_ticks(thread: &ThreadRef) -> Option<u64> {
    STATE.lock().unwrap().armed.get(&thread.id()).copied()
}

/// How many times the engine cancelled a timeout for `thread`.
pub fn cancel_count(thread: &ThreadRef) -> usize {
    STATE
        .lock()
        .unwrap()
        .cancelled
        .iter()
        .filter(|&&id| id == thread.id())
        .count()
}

/// How many priority recomputations the engine requested for `thread`.
pub fn priority_update_count(thread: &ThreadRef) -> usize {
    STATE
        .lock()
        .unwrap()
        .priority_updates
        .iter()
        .filter(|&&id| id == thread.id())
        .count()
}

/// The net sticky level of `thread`.
pub fn sticky_level(thread: &ThreadRef) -> i32 {
    STATE
        .lock()
        .unwrap()
        .sticky
        .get(&thread.id())
        .copied()
        .unwrap_or(0)
}

/// Raises the dispatch-disable level of this `std` thread, as a
/// primitive embedding the engine would before a sticky surrender.
pub fn dispatch_disable() {
    <MockKernel as KschedIf>::dispatch_disable();
}

/// Drops the dispatch-disable level again.
pub fn dispatch_enable() {
    <MockKernel as KschedIf>::dispatch_enable();
}

/// Spins until `cond` holds, panicking after a few seconds.
pub fn wait_until(what: &str, cond: impl Fn() -> bool) {
    for _ in 0..5000 {
        if cond() {
            return;
        }
        std::thread::sleep(std::time::Duration::from_millis(1));
    }
    panic!("timed out waiting for: {what}");
}
