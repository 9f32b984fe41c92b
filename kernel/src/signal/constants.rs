//! Signal numbers and constants
//!
//! Numbering follows the kernel's `signal.h`: standard signals occupy
//! 1-31, real-time signals 32-63. Signal 0 is reserved (it is the
//! "does the target exist" probe at the `kill()` layer) and is never a
//! member of a signal set.

/// Lowest valid signal number
pub const MIN_SIGNO: u32 = 1;
/// Highest valid signal number
pub const MAX_SIGNO: u32 = 63;

/// First standard signal number
pub const SIGSTDMIN: u32 = 1;
/// Last standard signal number
pub const SIGSTDMAX: u32 = 31;

/// First real-time signal
pub const SIGRTMIN: u32 = SIGSTDMAX + 1;
/// Last real-time signal
pub const SIGRTMAX: u32 = MAX_SIGNO;

/// Biggest signal number + 1
pub const NSIG: u32 = MAX_SIGNO + 1;

// Standard signals
pub const SIGHUP: u32 = 1;
pub const SIGINT: u32 = 2;
pub const SIGQUIT: u32 = 3;
pub const SIGILL: u32 = 4;
pub const SIGTRAP: u32 = 5;
pub const SIGABRT: u32 = 6;
pub const SIGBUS: u32 = 7;
pub const SIGFPE: u32 = 8;
pub const SIGKILL: u32 = 9; // Cannot be caught or blocked
pub const SIGUSR1: u32 = 10;
pub const SIGSEGV: u32 = 11;
pub const SIGUSR2: u32 = 12;
pub const SIGPIPE: u32 = 13;
pub const SIGALRM: u32 = 14;
pub const SIGTERM: u32 = 15;
pub const SIGCHLD: u32 = 17;
pub const SIGCONT: u32 = 18;
pub const SIGSTOP: u32 = 19; // Cannot be caught or blocked
pub const SIGTSTP: u32 = 20;
pub const SIGTTIN: u32 = 21;
pub const SIGTTOU: u32 = 22;
pub const SIGURG: u32 = 23;
pub const SIGXCPU: u32 = 24;
pub const SIGXFSZ: u32 = 25;
pub const SIGVTALRM: u32 = 26;
pub const SIGPROF: u32 = 27;
pub const SIGPOLL: u32 = 29;
pub const SIGIO: u32 = SIGPOLL;
pub const SIGSYS: u32 = 31;

// sigprocmask "how" values
/// Block the given signals
pub const SIG_BLOCK: i32 = 1;
/// Unblock the given signals
pub const SIG_UNBLOCK: i32 = 2;
/// Set the signal mask to the given set
pub const SIG_SETMASK: i32 = 3;

/// Default depth of the per-task queue of pending signal instances
pub const SIGQUEUE_DEPTH: usize = 32;

/// Convert signal number to bit mask
///
/// Returns 0 for invalid signal numbers (0 or > MAX_SIGNO)
#[inline]
pub const fn sig_mask(sig: u32) -> u64 {
    if sig == 0 || sig > MAX_SIGNO {
        0
    } else {
        1u64 << sig
    }
}

/// Signals that cannot be caught, blocked, or ignored
pub const UNCATCHABLE_SIGNALS: u64 = sig_mask(SIGKILL) | sig_mask(SIGSTOP);

/// Check if a signal number is valid
#[inline]
pub const fn is_valid_signal(sig: u32) -> bool {
    sig >= MIN_SIGNO && sig <= MAX_SIGNO
}

/// Check if a signal can be caught/blocked
#[inline]
pub const fn is_catchable(sig: u32) -> bool {
    sig != SIGKILL && sig != SIGSTOP
}

/// Check if a signal is in the real-time band (queued, payload-bearing)
#[inline]
pub const fn is_realtime(sig: u32) -> bool {
    sig >= SIGRTMIN && sig <= SIGRTMAX
}

/// Get signal name for log messages
pub fn signal_name(sig: u32) -> &'static str {
    match sig {
        SIGHUP => "SIGHUP",
        SIGINT => "SIGINT",
        SIGQUIT => "SIGQUIT",
        SIGILL => "SIGILL",
        SIGTRAP => "SIGTRAP",
        SIGABRT => "SIGABRT",
        SIGBUS => "SIGBUS",
        SIGFPE => "SIGFPE",
        SIGKILL => "SIGKILL",
        SIGUSR1 => "SIGUSR1",
        SIGSEGV => "SIGSEGV",
        SIGUSR2 => "SIGUSR2",
        SIGPIPE => "SIGPIPE",
        SIGALRM => "SIGALRM",
        SIGTERM => "SIGTERM",
        SIGCHLD => "SIGCHLD",
        SIGCONT => "SIGCONT",
        SIGSTOP => "SIGSTOP",
        SIGTSTP => "SIGTSTP",
        SIGTTIN => "SIGTTIN",
        SIGTTOU => "SIGTTOU",
        SIGURG => "SIGURG",
        SIGXCPU => "SIGXCPU",
        SIGXFSZ => "SIGXFSZ",
        SIGVTALRM => "SIGVTALRM",
        SIGPROF => "SIGPROF",
        SIGPOLL => "SIGPOLL",
        SIGSYS => "SIGSYS",
        _ if is_realtime(sig) => "SIGRT",
        _ => "UNKNOWN",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bands_are_disjoint_and_cover_range() {
        for sig in MIN_SIGNO..=MAX_SIGNO {
            let standard = sig >= SIGSTDMIN && sig <= SIGSTDMAX;
            assert_ne!(standard, is_realtime(sig), "signal {}", sig);
        }
        assert!(!is_valid_signal(0));
        assert!(!is_valid_signal(NSIG));
    }

    #[test]
    fn sig_mask_rejects_reserved_and_out_of_range() {
        assert_eq!(sig_mask(0), 0);
        assert_eq!(sig_mask(NSIG), 0);
        assert_eq!(sig_mask(1), 0b10);
        assert_eq!(sig_mask(MAX_SIGNO), 1u64 << 63);
    }

    #[test]
    fn only_kill_and_stop_are_uncatchable() {
        for sig in MIN_SIGNO..=MAX_SIGNO {
            let expected = sig != SIGKILL && sig != SIGSTOP;
            assert_eq!(is_catchable(sig), expected);
            assert_eq!(UNCATCHABLE_SIGNALS & sig_mask(sig) == 0, expected);
        }
    }
}
