//! The busy-waiting SMP hand-off variant.

#![cfg(feature = "smp")]

use kwaitq::{FIFO, QueueContext, Status, Thread, ThreadRef, WaitQueue, test_support, timeout};

fn local(name: &'static str, priority: u32) -> ThreadRef {
    Thread::new(test_support::next_thread_id(), name, priority)
}

#[test]
fn sticky_surrender_releases_the_spinner() {
    static QUEUE: WaitQueue = WaitQueue::new("sticky");

    let owner = local("sticky-owner", 10);
    let spinner = local("sticky-spinner", 10);
    QUEUE.acquire().set_owner(Some(owner.clone()));

    let handle = test_support::run_thread(spinner.clone(), {
        let spinner = spinner.clone();
        move || {
            let mut ctx = QueueContext::new();
            let status = QUEUE.acquire().enqueue_sticky(&FIFO, &spinner, &mut ctx);
            assert_eq!(status, Status::Successful);
        }
    });

    test_support::wait_until("spinner queued", || QUEUE.acquire().first().is_some());
    // The spinner keeps its processor while it waits.
    assert!(!test_support::is_blocked(&spinner));
    assert_eq!(test_support::sticky_level(&spinner), 1);

    test_support::dispatch_disable();
    let mut ctx = QueueContext::new();
    QUEUE.acquire().surrender_sticky(&owner, &mut ctx, &FIFO);
    test_support::dispatch_enable();

    handle.join().unwrap();
    let guard = QUEUE.acquire();
    assert!(guard.owner().is_some_and(|o| o.id() == spinner.id()));
    assert!(guard.first().is_none());
}

#[test]
fn sticky_surrender_of_empty_queue_goes_idle() {
    static QUEUE: WaitQueue = WaitQueue::new("sticky-idle");

    let owner = local("idle-owner", 10);
    QUEUE.acquire().set_owner(Some(owner.clone()));

    test_support::dispatch_disable();
    let mut ctx = QueueContext::new();
    QUEUE.acquire().surrender_sticky(&owner, &mut ctx, &FIFO);
    test_support::dispatch_enable();

    assert!(QUEUE.acquire().owner().is_none());
}

#[test]
fn sticky_wait_honors_the_timeout() {
    static QUEUE: WaitQueue = WaitQueue::new("sticky-timeout");

    let owner = local("timeout-owner", 10);
    let spinner = local("timeout-spinner", 10);
    QUEUE.acquire().set_owner(Some(owner.clone()));

    let handle = test_support::run_thread(spinner.clone(), {
        let spinner = spinner.clone();
        move || {
            let mut ctx = QueueContext::new();
            ctx.set_enqueue_timeout_ticks(4);
            let status = QUEUE.acquire().enqueue_sticky(&FIFO, &spinner, &mut ctx);
            assert_eq!(status, Status::Timeout);
        }
    });

    test_support::wait_until("timeout armed", || {
        test_support::armed_ticks(&spinner) == Some(4)
    });

    timeout(&spinner);

    handle.join().unwrap();
    assert_eq!(spinner.status(), Status::Timeout);
    assert!(QUEUE.acquire().first().is_none());
    // The queue was never handed over.
    assert!(
        QUEUE
            .acquire()
            .owner()
            .is_some_and(|o| o.id() == owner.id())
    );
}
