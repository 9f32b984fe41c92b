//! Signal-related data structures

use super::constants::*;
use super::error::{SignalError, SignalResult};

/// Value carried by a signal instance (`union sigval`)
///
/// The integer and pointer views share one word; pointers are carried as
/// addresses so the instance stays `Copy` and `Send`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[repr(transparent)]
pub struct SigVal(pub usize);

impl SigVal {
    /// Integer view
    #[inline]
    pub const fn int(value: i32) -> Self {
        SigVal(value as u32 as usize)
    }

    /// Pointer view
    #[inline]
    pub const fn ptr(addr: usize) -> Self {
        SigVal(addr)
    }

    #[inline]
    pub const fn as_int(&self) -> i32 {
        self.0 as u32 as i32
    }

    #[inline]
    pub const fn as_ptr(&self) -> usize {
        self.0
    }
}

/// Source of a signal (`si_code`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SiCode {
    /// Sent from kill, raise, or abort
    User = 0,
    /// Sent from sigqueue
    Queue = 1,
    /// Timer expiration
    Timer = 2,
    /// Asynchronous I/O completion
    AsyncIo = 3,
    /// Message arrived on an empty message queue
    MesgQ = 4,
    /// Child has exited (SIGCHLD only)
    ChildExited = 5,
    /// Child was killed (SIGCHLD only)
    ChildKilled = 6,
    /// Child terminated abnormally (SIGCHLD only)
    ChildDumped = 7,
    /// Traced child has trapped (SIGCHLD only)
    ChildTrapped = 8,
    /// Child has stopped (SIGCHLD only)
    ChildStopped = 9,
    /// Stopped child has continued (SIGCHLD only)
    ChildContinued = 10,
}

impl TryFrom<u8> for SiCode {
    type Error = u8;

    fn try_from(code: u8) -> Result<Self, u8> {
        Ok(match code {
            0 => SiCode::User,
            1 => SiCode::Queue,
            2 => SiCode::Timer,
            3 => SiCode::AsyncIo,
            4 => SiCode::MesgQ,
            5 => SiCode::ChildExited,
            6 => SiCode::ChildKilled,
            7 => SiCode::ChildDumped,
            8 => SiCode::ChildTrapped,
            9 => SiCode::ChildStopped,
            10 => SiCode::ChildContinued,
            other => return Err(other),
        })
    }
}

/// One raised signal instance (`siginfo_t`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigInfo {
    /// Signal number
    pub signo: u32,
    /// Where the signal came from
    pub code: SiCode,
    /// Zero or an errno associated with the signal
    pub errno: u8,
    /// Data passed with the signal
    pub value: SigVal,
    /// Sending task, when known
    pub pid: Option<u64>,
    /// Exit value or signal (SIGCHLD only)
    pub status: i32,
    /// `user` word of the action the instance was delivered under
    pub user: usize,
}

impl SigInfo {
    /// Instance for `signo` with the given source and payload
    pub const fn new(signo: u32, code: SiCode, value: SigVal) -> Self {
        SigInfo {
            signo,
            code,
            errno: 0,
            value,
            pid: None,
            status: 0,
            user: 0,
        }
    }

    /// Record the sending task
    pub const fn with_sender(mut self, pid: u64) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Record a child status (SIGCHLD)
    pub const fn with_status(mut self, status: i32) -> Self {
        self.status = status;
        self
    }

    #[inline]
    pub const fn is_realtime(&self) -> bool {
        is_realtime(self.signo)
    }
}

/// Notification method of a [`SigEvent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigEventNotify {
    /// No asynchronous notification is delivered
    None,
    /// Notify via signal with an application-defined value
    Signal,
}

/// Asynchronous notification request (`struct sigevent`)
///
/// Timers and message queues keep one of these and hand it back to the
/// signal core when their event fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigEvent {
    pub notify: SigEventNotify,
    pub signo: u32,
    pub value: SigVal,
}

impl SigEvent {
    /// `SIGEV_NONE`
    pub const fn none() -> Self {
        SigEvent {
            notify: SigEventNotify::None,
            signo: 0,
            value: SigVal(0),
        }
    }

    /// `SIGEV_SIGNAL` request, validated up front so the event source
    /// cannot fail later when it fires
    pub fn signal(signo: u32, value: SigVal) -> SignalResult<Self> {
        if !is_valid_signal(signo) {
            return Err(SignalError::InvalidSignal(signo));
        }
        Ok(SigEvent {
            notify: SigEventNotify::Signal,
            signo,
            value,
        })
    }

    /// The instance this event generates when it fires with `code`
    pub fn to_info(&self, code: SiCode) -> Option<SigInfo> {
        match self.notify {
            SigEventNotify::None => None,
            SigEventNotify::Signal => Some(SigInfo::new(self.signo, code, self.value)),
        }
    }
}
