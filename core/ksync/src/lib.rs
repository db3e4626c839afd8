// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

//! Kernel synchronization primitives.
//!
//! Every primitive in this crate is the thread-queue blocking engine
//! plus an ordering policy: the resource state lives next to a
//! [`kwaitq::WaitQueue`], unavailable resources block the caller
//! through the engine's enqueue protocol, and releasing a resource
//! hands it to the next waiter through surrender. The crate provides:
//!
//! - [`Mutex`]: mutual exclusion with FIFO hand-off, `lock_api`
//!   compatible
//! - [`Semaphore`]: counting semaphore with optional wait timeouts
//! - [`spin`]: re-export of `kspin` for spinlocks
//!
//! # Examples
//!
//! ## Mutex
//! ```no_run
//! use ksync::Mutex;
//!
//! static DATA: Mutex<Vec<u8>> = Mutex::new(Vec::new());
//!
//! fn task() {
//!     let mut data = DATA.lock();
//!     data.push(42);
//! }
//! ```
//!
//! ## Semaphore
//! ```no_run
//! use ksync::Semaphore;
//!
//! static SEM: Semaphore = Semaphore::new(3);
//!
//! fn task() {
//!     let _guard = SEM.acquire_guard();
//!     // do work with permit
//!     // permit automatically released when guard is dropped
//! }
//! ```
//!
//! ## Semaphore with a wait timeout
//! ```no_run
//! use ksync::Semaphore;
//!
//! static SEM: Semaphore = Semaphore::new(0);
//!
//! fn task() {
//!     if SEM.acquire_timeout(10).is_ok() {
//!         // got a permit within 10 ticks
//!     }
//! }
//! ```

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub use kspin as spin;

mod mutex;
mod semaphore;

pub use self::{
    mutex::{Mutex, MutexGuard, RawMutex},
    semaphore::{Semaphore, SemaphoreGuard},
};
