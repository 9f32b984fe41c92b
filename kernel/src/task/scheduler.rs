//! Scheduler primitives the signal core depends on
//!
//! The signal core never owns a run queue. It asks the scheduler to park
//! and wake tasks for blocking waits, and reports lifecycle changes caused
//! by default signal actions.

use super::TaskId;

/// Exit code reported for a task terminated by `sig`
///
/// Signal deaths use the negated signal number; the 0x80 bit marks an
/// abnormal (core-dumping) termination.
#[inline]
pub const fn signal_exit_code(sig: u32, core_dump: bool) -> i32 {
    if core_dump {
        -((sig as i32) | 0x80)
    } else {
        -(sig as i32)
    }
}

pub trait Scheduler: Send + Sync {
    /// Park `task` until a matching [`Scheduler::wake`].
    ///
    /// This is the only suspension point used by the signal core. A wake
    /// that arrives before the task parks must not be lost: the next
    /// `block` returns immediately. Spurious returns are allowed.
    fn block(&self, task: TaskId);

    /// Make a parked task runnable again. Callable from interrupt context.
    fn wake(&self, task: TaskId);

    /// A default action terminated the task
    fn terminate(&self, task: TaskId, exit_code: i32);

    /// A default action stopped the task
    fn stop(&self, task: TaskId, sig: u32);

    /// SIGCONT's default action continued the task
    fn resume(&self, task: TaskId);

    /// True while running in an interrupt handler
    fn in_interrupt(&self) -> bool;
}
