// SPDX-License-Identifier: Apache-2.0
// Copyright 2025 KylinSoft Co., Ltd. <https://www.kylinos.cn/>
// See LICENSES for license details.

#![cfg_attr(not(test), no_std)]
#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! # Architecture
//!
//! The crate is organized into three main components:
//!
//! ## Guards (`guard` module)
//!
//! RAII guards that manage critical sections:
//! - [`NoOp`]: No protection (for IRQ-disabled contexts)
//! - [`NoPreempt`]: Disables kernel preemption
//! - [`IrqSave`]: Saves/restores IRQ state
//! - [`NoPreemptIrqSave`]: Disables both preemption and IRQs
//!
//! ## Raw lock (`raw` module)
//!
//! The FIFO ticket lock core [`RawTicketLock`] with explicit
//! `acquire`/`release`, used directly by multi-lock protocols.
//!
//! ## Locks (`lock` module)
//!
//! Generic data-holding spinlock [`SpinLock<G, T>`] parameterized by
//! guard type, built on the ticket lock.
//!
//! # Feature Flags
//!
//! - `smp`: Enable for multi-core systems (adds the ticket lock state)
//! - `preempt`: Enable preemption control (requires implementing
//!   [`KernelGuardIf`])
//!
//! # Usage Patterns
//!
//! ## Basic Usage
//!
//! ```rust,ignore
//! use kspin::SpinNoIrq;
//!
//! static COUNTER: SpinNoIrq<u32> = SpinNoIrq::new(0);
//!
//! fn increment() {
//!     let mut count = COUNTER.lock();
//!     *count += 1;
//! }
//! ```
//!
//! ## Manual ticket lock
//!
//! ```rust,ignore
//! use kspin::RawTicketLock;
//!
//! static LOCK: RawTicketLock = RawTicketLock::new();
//!
//! fn hand_over_hand() {
//!     LOCK.acquire();
//!     // ... arbitrary control flow, possibly crossing functions ...
//!     LOCK.release();
//! }
//! ```
//!
//! ## Implementing KernelGuardIf
//!
//! ```rust,ignore
//! use kspin::KernelGuardIf;
//!
//! struct MyKernelGuard;
//!
//! #[crate_interface::impl_interface]
//! impl KernelGuardIf for MyKernelGuard {
//!     fn enable_preempt() {
//!         // Your implementation
//!     }
//!
//!     fn disable_preempt() {
//!         // Your implementation
//!     }
//!
//!     fn local_irq_save_and_disable() -> usize {
//!         // Your implementation
//!         0
//!     }
//!
//!     fn local_irq_restore(flags: usize) {
//!         // Your implementation
//!     }
//! }
//! ```

mod guard;
mod lock;
mod raw;

pub use guard::{BaseGuard, IrqSave, KernelGuardIf, NoOp, NoPreempt, NoPreemptIrqSave};
pub use lock::{SpinLock, SpinLockGuard};
pub use raw::RawTicketLock;

/// Raw spinlock with no guards.
///
/// **Warning**: Must only be used in contexts where preemption and IRQs
/// are already disabled.
pub type SpinRaw<T> = SpinLock<NoOp, T>;

/// Guard for [`SpinRaw`].
pub type SpinRawGuard<'a, T> = SpinLockGuard<'a, NoOp, T>;

/// Spinlock that disables preemption.
///
/// Suitable for use in IRQ-disabled contexts or when IRQ handlers
/// don't access the same data.
pub type SpinNoPreempt<T> = SpinLock<NoPreempt, T>;

/// Guard for [`SpinNoPreempt`].
pub type SpinNoPreemptGuard<'a, T> = SpinLockGuard<'a, NoPreempt, T>;

/// Spinlock that disables IRQs and preemption.
///
/// This is the safest option and can be used from any context
/// including interrupt handlers.
pub type SpinNoIrq<T> = SpinLock<NoPreemptIrqSave, T>;

/// Guard for [`SpinNoIrq`].
pub type SpinNoIrqGuard<'a, T> = SpinLockGuard<'a, NoPreemptIrqSave, T>;
