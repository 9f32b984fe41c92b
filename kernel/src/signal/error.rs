//! Signal subsystem errors and their errno values

use core::fmt;

/// Invalid argument
pub const EINVAL: i32 = 22;
/// Resource temporarily unavailable (sigqueue exhaustion, sigtimedwait timeout)
pub const EAGAIN: i32 = 11;
/// Interrupted by delivery of a caught signal
pub const EINTR: i32 = 4;
/// No such process
pub const ESRCH: i32 = 3;

/// Errors returned by the signal core
///
/// Every variant is detected before the target's state is touched, so an
/// `Err` never leaves a partial update behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalError {
    /// Signal number is 0 or above `MAX_SIGNO`
    InvalidSignal(u32),
    /// SIGKILL or SIGSTOP cannot be caught, ignored, or held
    Unblockable(u32),
    /// Unrecognized `how` argument to sigprocmask
    InvalidHow(i32),
    /// The wait deadline elapsed with nothing delivered
    Timeout,
    /// A caught signal outside the wait set was delivered
    Interrupted,
    /// No free instance left in the target's signal queue
    QueueFull,
    /// The target already terminated from a default action
    TaskExited,
}

impl SignalError {
    /// Positive errno for the syscall layer
    pub const fn errno(&self) -> i32 {
        match self {
            SignalError::InvalidSignal(_)
            | SignalError::Unblockable(_)
            | SignalError::InvalidHow(_) => EINVAL,
            SignalError::Timeout | SignalError::QueueFull => EAGAIN,
            SignalError::Interrupted => EINTR,
            SignalError::TaskExited => ESRCH,
        }
    }
}

impl fmt::Display for SignalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalError::InvalidSignal(sig) => write!(f, "invalid signal number {}", sig),
            SignalError::Unblockable(sig) => {
                write!(f, "signal {} cannot be caught or blocked", sig)
            }
            SignalError::InvalidHow(how) => write!(f, "invalid sigprocmask how {}", how),
            SignalError::Timeout => f.write_str("signal wait timed out"),
            SignalError::Interrupted => f.write_str("interrupted by signal"),
            SignalError::QueueFull => f.write_str("signal queue exhausted"),
            SignalError::TaskExited => f.write_str("target task has exited"),
        }
    }
}

/// Result alias used across the signal core
pub type SignalResult<T> = Result<T, SignalError>;
