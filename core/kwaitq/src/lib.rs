// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! The generic thread-queue blocking engine.
//!
//! Every blocking synchronization primitive (mutex, semaphore, message
//! queue, barrier) is the same machine underneath: a thread finds a
//! resource unavailable, links itself onto the resource's wait queue,
//! and goes to sleep until another thread hands the resource over or a
//! timeout cancels the wait. This crate implements that machine once,
//! correct for arbitrary SMP interleavings, and lets the queueing policy
//! (the *discipline*) be plugged in through the [`WaitQueueOps`] trait.
//!
//! The three entry points every primitive builds on are methods of the
//! queue's lock guard:
//!
//! - [`WaitQueueGuard::enqueue`] blocks the calling thread on the queue
//!   when the resource is unavailable,
//! - [`WaitQueueGuard::extract_locked`] cancels a pending wait (timeout,
//!   object deletion, signal),
//! - [`WaitQueueGuard::surrender`] releases the resource and wakes the
//!   next waiter.
//!
//! Before a thread is ever put to sleep, the engine walks the chain of
//! resource owners and proves that blocking would not close a circular
//! wait; a would-be cycle is reported as [`Status::Deadlock`] instead
//! of deadlocking the system (see the `path` module).
//!
//! The race between "the thread is going to sleep" and "another
//! processor is waking it" is resolved by a two-sided compare-and-swap
//! on the per-thread [`WaitFlags`] word, so no lock is ever held across
//! the actual suspend.
//!
//! The embedding kernel supplies the scheduler and timer through the
//! [`KschedIf`] and [`KtimerIf`] interfaces.
//!
//! # Cargo Features
//!
//! - `smp`: multi-processor configuration (default). Disable it on
//!   uniprocessor targets to strip the queue locks and the global link
//!   registry.
//! - `test`: host-side mock implementations of the kernel capabilities,
//!   used by this crate's own tests and by crates layering primitives
//!   on top of the engine.

#![cfg_attr(not(any(test, feature = "test")), no_std)]

#[macro_use]
extern crate log;

extern crate alloc;

mod context;
mod flags;
mod ops;
mod path;
mod protocol;
mod queue;
mod sched;
mod thread;

#[cfg(test)]
mod tests;

#[cfg(feature = "test")]
pub mod test_support;

pub use kstatus::{Status, StatusResult};

pub use self::{
    context::{
        DeadlockAction, EnqueueCallout, MpCallout, QueueContext, ThreadStates, Timeout,
        enqueue_add_timeout_ticks, enqueue_do_nothing_extra,
    },
    flags::{WaitFlag, WaitFlags},
    ops::{FIFO, Fifo, PRIORITY, PriorityOrder, WaitQueueOps},
    protocol::{
        FlushFilter, extract, flush_default_filter, flush_status_object_was_deleted,
        flush_status_unavailable, timeout,
    },
    queue::{Heads, QueueState, WaitQueue, WaitQueueGuard},
    sched::{KschedIf, KtimerIf, current as current_thread},
    thread::{Thread, ThreadRef},
};
