//! Unit tests for the engine's building blocks. Whole-protocol
//! scenarios live in `tests/`.

use alloc::sync::Arc;
use std::sync::Barrier;

use kstatus::Status;

use crate::{
    context::{QueueContext, ThreadStates, Timeout},
    flags::{WaitFlag, WaitFlags},
    ops::{FIFO, PRIORITY, WaitQueueOps},
    queue::{Heads, WaitQueue},
    thread::Thread,
};

fn thread(name: &'static str, priority: u32) -> crate::ThreadRef {
    Thread::new(crate::test_support::next_thread_id(), name, priority)
}

#[test]
fn wait_flags_lifecycle() {
    let flags = WaitFlags::new();
    assert_eq!(flags.get(), WaitFlag::Ready);

    flags.set(WaitFlag::IntendToBlock);
    assert!(flags.try_change_acquire(WaitFlag::IntendToBlock, WaitFlag::Blocked));
    assert_eq!(flags.get(), WaitFlag::Blocked);

    // The waking side finds the thread genuinely suspended.
    assert!(!flags.try_change_release(WaitFlag::IntendToBlock, WaitFlag::ReadyAgain));
    flags.set(WaitFlag::ReadyAgain);
    assert_eq!(flags.get(), WaitFlag::ReadyAgain);
}

#[test]
fn wait_flags_cancellation_wins() {
    let flags = WaitFlags::new();
    flags.set(WaitFlag::IntendToBlock);

    // The waking side races ahead of the suspend.
    assert!(flags.try_change_release(WaitFlag::IntendToBlock, WaitFlag::ReadyAgain));
    assert!(!flags.try_change_acquire(WaitFlag::IntendToBlock, WaitFlag::Blocked));
    assert_eq!(flags.get_acquire(), WaitFlag::ReadyAgain);
}

#[test]
fn wait_flags_race_has_one_winner() {
    for _ in 0..1000 {
        let flags = Arc::new(WaitFlags::new());
        flags.set(WaitFlag::IntendToBlock);
        let barrier = Arc::new(Barrier::new(2));

        let blocker = {
            let flags = flags.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                flags.try_change_acquire(WaitFlag::IntendToBlock, WaitFlag::Blocked)
            })
        };
        barrier.wait();
        let cancelled = flags.try_change_release(WaitFlag::IntendToBlock, WaitFlag::ReadyAgain);
        let suspended = blocker.join().unwrap();

        assert_ne!(suspended, cancelled);
    }
}

#[test]
fn heads_membership() {
    let mut heads = Heads::new();
    let a = thread("a", 1);
    let b = thread("b", 2);

    assert!(heads.is_empty());
    heads.push_back(a.clone());
    heads.push_back(b.clone());
    assert_eq!(heads.len(), 2);
    assert!(heads.contains(&a));

    assert!(heads.remove(&a));
    assert!(!heads.remove(&a));
    assert!(!heads.contains(&a));
    assert_eq!(heads.len(), 1);
    assert!(core::ptr::eq(&**heads.front().unwrap(), &*b));
}

#[test]
fn fifo_discipline_orders_by_arrival() {
    let mut heads = Heads::new();
    let mut ctx = QueueContext::new();
    let a = thread("a", 30);
    let b = thread("b", 10);

    FIFO.enqueue(&mut heads, &a, &mut ctx);
    FIFO.enqueue(&mut heads, &b, &mut ctx);

    let first = FIFO.surrender(&mut heads, None, &mut ctx).unwrap();
    assert!(Arc::ptr_eq(&first, &a));
    let second = FIFO.surrender(&mut heads, None, &mut ctx).unwrap();
    assert!(Arc::ptr_eq(&second, &b));
    assert!(FIFO.surrender(&mut heads, None, &mut ctx).is_none());
}

#[test]
fn priority_discipline_orders_by_priority() {
    let mut heads = Heads::new();
    let mut ctx = QueueContext::new();
    let low = thread("low", 30);
    let high = thread("high", 10);
    let mid = thread("mid", 20);

    PRIORITY.enqueue(&mut heads, &low, &mut ctx);
    PRIORITY.enqueue(&mut heads, &high, &mut ctx);
    PRIORITY.enqueue(&mut heads, &mid, &mut ctx);

    let order: alloc::vec::Vec<_> = heads.iter().map(|t| t.name()).collect();
    assert_eq!(order, ["high", "mid", "low"]);
}

#[test]
fn priority_discipline_is_fifo_among_equals() {
    let mut heads = Heads::new();
    let mut ctx = QueueContext::new();
    let first = thread("first", 10);
    let second = thread("second", 10);

    PRIORITY.enqueue(&mut heads, &first, &mut ctx);
    PRIORITY.enqueue(&mut heads, &second, &mut ctx);

    let winner = PRIORITY.surrender(&mut heads, None, &mut ctx).unwrap();
    assert!(Arc::ptr_eq(&winner, &first));
}

#[test]
#[should_panic(expected = "extract of a thread not queued")]
fn extract_of_unqueued_thread_asserts() {
    let mut heads = Heads::new();
    let mut ctx = QueueContext::new();
    let t = thread("stranger", 1);
    FIFO.extract(&mut heads, &t, &mut ctx);
}

#[test]
fn context_selects_enqueue_callout() {
    let mut ctx = QueueContext::new();
    assert_eq!(ctx.timeout, Timeout::None);

    ctx.set_enqueue_timeout_ticks(10);
    assert_eq!(ctx.timeout, Timeout::Ticks(10));

    ctx.set_enqueue_do_nothing_extra();
    assert_eq!(ctx.timeout, Timeout::None);
}

#[test]
fn context_batches_priority_updates() {
    let mut ctx = QueueContext::new();
    let a = thread("a", 1);
    let b = thread("b", 2);

    ctx.add_priority_update(&a);
    ctx.add_priority_update(&b);
    assert_eq!(ctx.priority_updates(), 2);

    ctx.clear_priority_updates();
    assert_eq!(ctx.priority_updates(), 0);
}

#[test]
fn queue_owner_and_first() {
    static QUEUE: WaitQueue = WaitQueue::new("unit");
    let owner = thread("owner", 1);
    let waiter = thread("waiter", 2);

    let mut guard = QUEUE.acquire();
    assert!(guard.owner().is_none());
    assert!(guard.first().is_none());

    guard.set_owner(Some(owner.clone()));
    guard.heads_mut().push_back(waiter.clone());
    assert!(Arc::ptr_eq(guard.owner().unwrap(), &owner));
    assert!(Arc::ptr_eq(&guard.first().unwrap(), &waiter));

    guard.heads_mut().remove(&waiter);
    guard.set_owner(None);
}

#[test]
fn thread_records_status_and_state_tag() {
    let t = thread("status", 1);
    assert_eq!(t.status(), Status::Successful);
    t.set_status(Status::Timeout);
    assert_eq!(t.status(), Status::Timeout);

    assert!(!t.is_waiting());
    assert!(ThreadStates::WAITING_FOR_MUTEX.bits() != ThreadStates::SUSPENDED.bits());
}
