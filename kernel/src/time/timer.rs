//! One-shot deadline timers for `sigtimedwait`
//!
//! The timer subsystem is external. When an armed deadline expires it calls
//! back into the signal core with the task and the [`WaitId`] it was armed
//! for; the core ignores expiries whose wait has already finished.

use core::time::Duration;

use crate::task::TaskId;

/// Handle used to cancel an armed deadline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CancelToken(pub u64);

/// Identifies one blocking wait of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaitId(pub u64);

pub trait Timer: Send + Sync {
    /// Arm a one-shot deadline `after` from now for `wait` of `task`.
    ///
    /// Must not call back into the signal core before returning.
    fn schedule_deadline(&self, task: TaskId, wait: WaitId, after: Duration) -> CancelToken;

    /// Disarm a deadline. Cancelling an expired token is a no-op.
    fn cancel(&self, token: CancelToken);
}
