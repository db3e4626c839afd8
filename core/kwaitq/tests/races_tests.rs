//! Randomized interleaving stress for the wakeup-race resolution.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use kwaitq::{
    FIFO, QueueContext, Status, Thread, ThreadRef, ThreadStates, WaitQueue, extract, test_support,
    timeout,
};

fn local(name: &'static str, priority: u32) -> ThreadRef {
    Thread::new(test_support::next_thread_id(), name, priority)
}

fn jitter() {
    if fastrand::bool() {
        std::thread::sleep(Duration::from_micros(fastrand::u64(0..50)));
    }
}

/// Timeout, cancellation and surrender all race for the same wait;
/// whatever interleaving the host produces, the waiter must wake
/// exactly once with the winner's status.
#[test]
fn concurrent_wakeup_sources_deliver_one_wakeup() {
    static QUEUE: WaitQueue = WaitQueue::new("race");

    for _ in 0..200 {
        let t = local("racer", 10);
        let waiter = test_support::run_thread(t.clone(), {
            let t = t.clone();
            move || {
                let mut ctx = QueueContext::new();
                ctx.set_thread_state(ThreadStates::WAITING_FOR_SEMAPHORE);
                ctx.set_enqueue_timeout_ticks(5);
                QUEUE.acquire().enqueue(&FIFO, &t, &mut ctx);
            }
        });
        test_support::wait_until("racer queued", || t.is_waiting_on(&QUEUE));

        let timer = {
            let t = t.clone();
            std::thread::spawn(move || {
                jitter();
                timeout(&t);
            })
        };
        let canceller = {
            let t = t.clone();
            std::thread::spawn(move || {
                jitter();
                extract(&t);
            })
        };
        let surrenderer = std::thread::spawn(|| {
            jitter();
            let mut ctx = QueueContext::new();
            QUEUE.acquire().surrender_no_owner(&mut ctx, &FIFO);
        });

        waiter.join().unwrap();
        timer.join().unwrap();
        canceller.join().unwrap();
        surrenderer.join().unwrap();

        assert!(!t.is_waiting());
        assert!(!test_support::is_blocked(&t));
        assert!(matches!(t.status(), Status::Successful | Status::Timeout));
        assert!(QUEUE.acquire().first().is_none());
    }
}

/// A storm of waiters against one waker; every wait must complete and
/// the queue must drain.
#[test]
fn enqueue_surrender_storm() {
    static QUEUE: WaitQueue = WaitQueue::new("storm");
    static COMPLETED: AtomicUsize = AtomicUsize::new(0);

    const NUM_WAITERS: usize = 8;
    const NUM_ITERS: usize = 50;

    let mut handles = Vec::new();
    for i in 0..NUM_WAITERS {
        let t = local("storm-waiter", i as u32);
        handles.push(test_support::run_thread(t.clone(), {
            let t = t.clone();
            move || {
                for _ in 0..NUM_ITERS {
                    let mut ctx = QueueContext::new();
                    ctx.set_thread_state(ThreadStates::WAITING_FOR_EVENT);
                    let status = QUEUE.acquire().enqueue(&FIFO, &t, &mut ctx);
                    assert_eq!(status, Status::Successful);
                    COMPLETED.fetch_add(1, Ordering::Relaxed);
                    jitter();
                }
            }
        }));
    }

    let waker = std::thread::spawn(|| {
        while COMPLETED.load(Ordering::Relaxed) < NUM_WAITERS * NUM_ITERS {
            let guard = QUEUE.acquire();
            if guard.first().is_some() {
                let mut ctx = QueueContext::new();
                guard.surrender_no_owner(&mut ctx, &FIFO);
            } else {
                drop(guard);
                std::thread::yield_now();
            }
        }
    });

    for handle in handles {
        handle.join().unwrap();
    }
    waker.join().unwrap();

    assert_eq!(COMPLETED.load(Ordering::Relaxed), NUM_WAITERS * NUM_ITERS);
    assert!(QUEUE.acquire().first().is_none());
}
