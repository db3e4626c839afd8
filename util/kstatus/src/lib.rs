#![cfg_attr(not(test), no_std)]

//! Outcome codes recorded on a thread's wait state by the blocking
//! protocol.
//!
//! The protocol never unwinds: every entry point runs to completion and
//! leaves one of these codes behind, and callers branch on it once the
//! dust has settled. The code is stored in a single atomic integer on
//! the thread descriptor, which is why [`Status::code`] and
//! [`Status::try_from_i32`] provide a stable round trip.

use core::fmt;

use strum::EnumCount;

/// The outcome of one pass through the blocking protocol.
#[repr(i32)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, EnumCount)]
pub enum Status {
    /// The operation completed as requested.
    Successful = 0,
    /// Blocking would have created a circular wait; the thread was
    /// never linked into the queue.
    Deadlock,
    /// The wait was abandoned because the timeout expired first.
    Timeout,
    /// The resource is not available and the caller elected not to
    /// wait for it.
    Unavailable,
    /// The object embedding the queue was deleted while the thread
    /// was waiting on it.
    ObjectWasDeleted,
    /// The caller does not hold the resource it tried to give up.
    NotOwner,
    /// The wait was cancelled by an unrelated request (e.g. signal
    /// delivery or thread restart).
    Interrupted,
}

impl Status {
    /// Returns the status description.
    pub fn as_str(&self) -> &'static str {
        use Status::*;
        match *self {
            Successful => "Successful",
            Deadlock => "Deadlock detected",
            Timeout => "Timed out",
            Unavailable => "Resource unavailable",
            ObjectWasDeleted => "Object was deleted",
            NotOwner => "Not the resource owner",
            Interrupted => "Wait interrupted",
        }
    }

    /// Returns the status code value in `i32`.
    pub const fn code(self) -> i32 {
        self as i32
    }

    /// Whether this status reports a completed operation.
    #[inline]
    pub const fn is_successful(self) -> bool {
        matches!(self, Status::Successful)
    }

    /// Converts the status into a `Result`, mapping [`Status::Successful`]
    /// to `Ok(())` and everything else to `Err(self)`.
    #[inline]
    pub fn as_result(self) -> StatusResult {
        if self.is_successful() { Ok(()) } else { Err(self) }
    }

    /// Checked conversion from a raw code, the inverse of
    /// [`Status::code`].
    pub fn try_from_i32(value: i32) -> Result<Self, i32> {
        if value >= 0 && value < Status::COUNT as i32 {
            Ok(unsafe { core::mem::transmute::<i32, Status>(value) })
        } else {
            Err(value)
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A specialized [`Result`] type with [`Status`] as the error type.
pub type StatusResult = Result<(), Status>;
