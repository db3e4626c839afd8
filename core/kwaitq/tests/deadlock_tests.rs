//! Circular-wait detection scenarios.

use kwaitq::{
    DeadlockAction, FIFO, QueueContext, Status, Thread, ThreadRef, ThreadStates, WaitQueue,
    test_support,
};

fn local(name: &'static str, priority: u32) -> ThreadRef {
    Thread::new(test_support::next_thread_id(), name, priority)
}

fn blocking_ctx() -> QueueContext {
    let mut ctx = QueueContext::new();
    ctx.set_thread_state(ThreadStates::WAITING_FOR_MUTEX);
    ctx.set_deadlock_action(DeadlockAction::Status);
    ctx
}

#[test]
fn self_deadlock_is_reported() {
    static QUEUE: WaitQueue = WaitQueue::new("self-deadlock");

    let t = local("owner", 10);
    QUEUE.acquire().set_owner(Some(t.clone()));

    let mut ctx = blocking_ctx();
    let status = QUEUE.acquire().enqueue(&FIFO, &t, &mut ctx);

    assert_eq!(status, Status::Deadlock);
    assert_eq!(t.status(), Status::Deadlock);
    assert!(!t.is_waiting());
    let guard = QUEUE.acquire();
    assert!(guard.first().is_none());
    assert!(guard.owner().is_some());
}

#[test]
#[should_panic(expected = "circular wait")]
fn self_deadlock_is_fatal_by_default() {
    static QUEUE: WaitQueue = WaitQueue::new("fatal-deadlock");

    let t = local("owner", 10);
    QUEUE.acquire().set_owner(Some(t.clone()));

    let mut ctx = QueueContext::new();
    QUEUE.acquire().enqueue(&FIFO, &t, &mut ctx);
}

#[test]
fn two_thread_cycle_is_reported() {
    static Q1: WaitQueue = WaitQueue::new("cycle-q1");
    static Q2: WaitQueue = WaitQueue::new("cycle-q2");

    let t1 = local("t1", 10);
    let t2 = local("t2", 10);
    Q1.acquire().set_owner(Some(t1.clone()));
    Q2.acquire().set_owner(Some(t2.clone()));

    // T1, holding Q1, blocks on Q2. No cycle yet.
    let handle = test_support::run_thread(t1.clone(), {
        let t1 = t1.clone();
        move || {
            let mut ctx = blocking_ctx();
            let status = Q2.acquire().enqueue(&FIFO, &t1, &mut ctx);
            assert_eq!(status, Status::Successful);
        }
    });
    test_support::wait_until("t1 suspended", || test_support::is_blocked(&t1));

    // T2, holding Q2, now tries to block on Q1: T2 -> Q1 -> T1 -> Q2
    // -> T2 closes the circle.
    let mut ctx = blocking_ctx();
    let status = Q1.acquire().enqueue(&FIFO, &t2, &mut ctx);

    assert_eq!(status, Status::Deadlock);
    assert_eq!(t2.status(), Status::Deadlock);
    // T2 stays runnable and untouched by the aborted pass.
    assert!(!t2.is_waiting());
    assert!(!test_support::is_blocked(&t2));
    assert!(Q1.acquire().first().is_none());
    // T1's wait was not disturbed.
    assert!(t1.is_waiting_on(&Q2));

    // Hand Q2 over so T1 can finish.
    let mut ctx = QueueContext::new();
    Q2.acquire().surrender(&t2, &mut ctx, &FIFO);
    handle.join().unwrap();
    assert_eq!(t1.status(), Status::Successful);
}

#[test]
fn three_queue_cycle_is_reported() {
    static Q1: WaitQueue = WaitQueue::new("ring-q1");
    static Q2: WaitQueue = WaitQueue::new("ring-q2");
    static Q3: WaitQueue = WaitQueue::new("ring-q3");

    let t1 = local("r1", 10);
    let t2 = local("r2", 10);
    let t3 = local("r3", 10);
    Q1.acquire().set_owner(Some(t1.clone()));
    Q2.acquire().set_owner(Some(t2.clone()));
    Q3.acquire().set_owner(Some(t3.clone()));

    let h1 = test_support::run_thread(t1.clone(), {
        let t1 = t1.clone();
        move || {
            let mut ctx = blocking_ctx();
            assert_eq!(Q2.acquire().enqueue(&FIFO, &t1, &mut ctx), Status::Successful);
        }
    });
    test_support::wait_until("r1 suspended", || test_support::is_blocked(&t1));

    let h2 = test_support::run_thread(t2.clone(), {
        let t2 = t2.clone();
        move || {
            let mut ctx = blocking_ctx();
            assert_eq!(Q3.acquire().enqueue(&FIFO, &t2, &mut ctx), Status::Successful);
        }
    });
    test_support::wait_until("r2 suspended", || test_support::is_blocked(&t2));

    // T3 -> Q1 -> T1 -> Q2 -> T2 -> Q3 -> T3.
    let mut ctx = blocking_ctx();
    let status = Q1.acquire().enqueue(&FIFO, &t3, &mut ctx);
    assert_eq!(status, Status::Deadlock);
    assert!(!t3.is_waiting());

    // Unwind the chain from the far end.
    let mut ctx = QueueContext::new();
    Q3.acquire().surrender(&t3, &mut ctx, &FIFO);
    h2.join().unwrap();
    let mut ctx = QueueContext::new();
    Q2.acquire().surrender(&t2, &mut ctx, &FIFO);
    h1.join().unwrap();

    assert_eq!(t1.status(), Status::Successful);
    assert_eq!(t2.status(), Status::Successful);
}

#[test]
fn acyclic_chain_blocks_normally() {
    static Q1: WaitQueue = WaitQueue::new("chain-q1");
    static Q2: WaitQueue = WaitQueue::new("chain-q2");

    let t1 = local("c1", 10);
    let t2 = local("c2", 10);
    let t3 = local("c3", 10);
    Q1.acquire().set_owner(Some(t1.clone()));
    Q2.acquire().set_owner(Some(t2.clone()));

    // T1, holding Q1, waits on Q2. The chain Q1 -> Q2 is a line, not
    // a circle, so a third thread may still block on Q1.
    let h1 = test_support::run_thread(t1.clone(), {
        let t1 = t1.clone();
        move || {
            let mut ctx = blocking_ctx();
            assert_eq!(Q2.acquire().enqueue(&FIFO, &t1, &mut ctx), Status::Successful);
        }
    });
    test_support::wait_until("c1 suspended", || test_support::is_blocked(&t1));

    let h3 = test_support::run_thread(t3.clone(), {
        let t3 = t3.clone();
        move || {
            let mut ctx = blocking_ctx();
            assert_eq!(Q1.acquire().enqueue(&FIFO, &t3, &mut ctx), Status::Successful);
        }
    });
    test_support::wait_until("c3 suspended", || test_support::is_blocked(&t3));

    // Release in dependency order.
    let mut ctx = QueueContext::new();
    Q2.acquire().surrender(&t2, &mut ctx, &FIFO);
    h1.join().unwrap();
    let mut ctx = QueueContext::new();
    Q1.acquire().surrender(&t1, &mut ctx, &FIFO);
    h3.join().unwrap();

    assert_eq!(t1.status(), Status::Successful);
    assert_eq!(t3.status(), Status::Successful);
}
