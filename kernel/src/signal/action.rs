//! Per-task action table and default signal actions

use alloc::boxed::Box;
use bitflags::bitflags;

use super::constants::*;
use super::set::SigSet;
use super::types::SigInfo;

/// Signal-catching function
///
/// Called with the signal number, the delivered instance, and the `user`
/// word registered with the action. Extended info is always passed.
pub type SigHandler = fn(signo: u32, info: &SigInfo, user: usize);

/// What a task does with a signal
#[derive(Clone, Copy)]
pub enum Disposition {
    /// Discard the signal (`SIG_IGN`)
    Ignore,
    /// Kernel default action (`SIG_DFL`)
    Default,
    /// Invoke a registered handler
    Handler(SigHandler),
}

impl Disposition {
    #[inline]
    pub fn is_default(&self) -> bool {
        matches!(self, Disposition::Default)
    }

    #[inline]
    pub fn is_ignore(&self) -> bool {
        matches!(self, Disposition::Ignore)
    }

    #[inline]
    pub fn is_handler(&self) -> bool {
        matches!(self, Disposition::Handler(_))
    }
}

impl PartialEq for Disposition {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Disposition::Ignore, Disposition::Ignore) => true,
            (Disposition::Default, Disposition::Default) => true,
            (Disposition::Handler(a), Disposition::Handler(b)) => *a as usize == *b as usize,
            _ => false,
        }
    }
}

impl Eq for Disposition {}

impl core::fmt::Debug for Disposition {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Disposition::Ignore => f.write_str("Ignore"),
            Disposition::Default => f.write_str("Default"),
            Disposition::Handler(h) => write!(f, "Handler({:#x})", *h as usize),
        }
    }
}

bitflags! {
    /// `sa_flags`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ActionFlags: u32 {
        /// Do not generate SIGCHLD when children stop (ignored)
        const NOCLDSTOP = 1 << 0;
        /// Three-argument handler; always assumed
        const SIGINFO = 1 << 1;
        /// Discard exit status of children (SIGCHLD only)
        const NOCLDWAIT = 1 << 2;
        /// Use a registered alternate stack
        const ONSTACK = 1 << 3;
        /// Restart interrupted system calls
        const RESTART = 1 << 4;
        /// Do not mask the signal itself while its handler runs
        const NODEFER = 1 << 5;
        /// Reset to the default action when the handler is entered
        const RESETHAND = 1 << 6;
        /// Invoke the handler in kernel space directly
        const KERNELHAND = 1 << 7;
    }
}

/// Signal action (`struct sigaction`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigAction {
    pub disposition: Disposition,
    /// Additional signals blocked while the handler runs
    pub mask: SigSet,
    pub flags: ActionFlags,
    /// Opaque word handed back to the handler (`sa_user`)
    pub user: usize,
}

impl Default for SigAction {
    fn default() -> Self {
        SigAction {
            disposition: Disposition::Default,
            mask: SigSet::empty(),
            flags: ActionFlags::SIGINFO,
            user: 0,
        }
    }
}

impl SigAction {
    /// `SIG_IGN`
    pub fn ignore() -> Self {
        SigAction {
            disposition: Disposition::Ignore,
            ..SigAction::default()
        }
    }

    /// Handler with no extra mask and no flags
    pub fn handler(handler: SigHandler) -> Self {
        SigAction {
            disposition: Disposition::Handler(handler),
            ..SigAction::default()
        }
    }

    pub fn with_mask(mut self, mask: SigSet) -> Self {
        self.mask = mask;
        self
    }

    pub fn with_flags(mut self, flags: ActionFlags) -> Self {
        self.flags = flags | ActionFlags::SIGINFO;
        self
    }

    pub fn with_user(mut self, user: usize) -> Self {
        self.user = user;
        self
    }
}

/// Per-task mapping from signal number to action
///
/// Boxed: 64 entries inline would put a couple of KB on the stack during
/// task creation.
#[derive(Clone)]
pub struct ActionTable {
    actions: Box<[SigAction; NSIG as usize]>,
}

impl Default for ActionTable {
    fn default() -> Self {
        ActionTable {
            actions: Box::new([SigAction::default(); NSIG as usize]),
        }
    }
}

impl ActionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Action for `sig`; the caller has validated the number
    #[inline]
    pub fn get(&self, sig: u32) -> SigAction {
        self.actions[sig as usize]
    }

    /// Replace the action for `sig` and return the previous one
    ///
    /// SIGKILL and SIGSTOP are never stored in the handler mask.
    pub fn replace(&mut self, sig: u32, action: SigAction) -> SigAction {
        let sanitized = SigAction {
            mask: action.mask.without_uncatchable(),
            ..action
        };
        core::mem::replace(&mut self.actions[sig as usize], sanitized)
    }

    /// Reset caught signals to the default action, keeping ignored ones
    pub fn reset_handlers(&mut self) {
        for action in self.actions.iter_mut() {
            if action.disposition.is_handler() {
                *action = SigAction::default();
            }
        }
    }
}

/// Default action for a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDefaultAction {
    /// Terminate the task
    Terminate,
    /// Abnormal termination (core dump where supported)
    CoreDump,
    /// Ignore the signal
    Ignore,
    /// Stop (pause) the task
    Stop,
    /// Continue a stopped task
    Continue,
}

/// Category of the kernel default action for a signal, before the
/// enable flags are applied
pub fn default_category(sig: u32) -> SignalDefaultAction {
    match sig {
        SIGHUP | SIGINT | SIGKILL | SIGPIPE | SIGALRM | SIGTERM | SIGUSR1 | SIGUSR2 | SIGPOLL
        | SIGPROF | SIGVTALRM => SignalDefaultAction::Terminate,

        SIGQUIT | SIGILL | SIGTRAP | SIGABRT | SIGBUS | SIGFPE | SIGSEGV | SIGXCPU | SIGXFSZ
        | SIGSYS => SignalDefaultAction::CoreDump,

        SIGSTOP | SIGTSTP | SIGTTIN | SIGTTOU => SignalDefaultAction::Stop,

        SIGCONT => SignalDefaultAction::Continue,

        // SIGCHLD, SIGURG, unassigned standard numbers, real-time signals
        _ => SignalDefaultAction::Ignore,
    }
}

/// Default actions that are switched on by configuration
///
/// A signal whose enable flag is clear falls back to `Ignore`, which is
/// the kernel's behaviour for every signal unless a configuration opts in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultActions {
    enabled: SigSet,
}

/// Signal groups that share one configure-time switch
pub const SIGALRM_ACTION: &[u32] = &[SIGALRM];
pub const SIGSTOP_ACTION: &[u32] = &[SIGSTOP, SIGTSTP, SIGCONT];
pub const SIGKILL_ACTION: &[u32] = &[SIGINT, SIGKILL];
pub const SIGUSR1_ACTION: &[u32] = &[SIGUSR1];
pub const SIGUSR2_ACTION: &[u32] = &[SIGUSR2];
pub const SIGPOLL_ACTION: &[u32] = &[SIGPOLL];
pub const SIGPIPE_ACTION: &[u32] = &[SIGPIPE];

impl DefaultActions {
    /// Every default action demoted to `Ignore`
    pub const fn none() -> Self {
        DefaultActions { enabled: SigSet::empty() }
    }

    /// Every category enabled (POSIX behaviour)
    pub const fn all() -> Self {
        DefaultActions { enabled: SigSet::full() }
    }

    /// Enable set chosen by the cargo features: the `sig*-action` groups,
    /// only when `sig-default` is on
    pub fn from_features() -> Self {
        let mut actions = DefaultActions::none();
        if !cfg!(feature = "sig-default") {
            return actions;
        }
        if cfg!(feature = "sigalrm-action") {
            actions.enable_group(SIGALRM_ACTION);
        }
        if cfg!(feature = "sigstop-action") {
            actions.enable_group(SIGSTOP_ACTION);
        }
        if cfg!(feature = "sigkill-action") {
            actions.enable_group(SIGKILL_ACTION);
        }
        if cfg!(feature = "sigusr1-action") {
            actions.enable_group(SIGUSR1_ACTION);
        }
        if cfg!(feature = "sigusr2-action") {
            actions.enable_group(SIGUSR2_ACTION);
        }
        if cfg!(feature = "sigpoll-action") {
            actions.enable_group(SIGPOLL_ACTION);
        }
        if cfg!(feature = "sigpipe-action") {
            actions.enable_group(SIGPIPE_ACTION);
        }
        actions
    }

    /// Turn on the category action for `sig`; invalid numbers are ignored
    pub fn enable(&mut self, sig: u32) {
        if is_valid_signal(sig) {
            self.enabled.insert_unchecked(sig);
        }
    }

    pub fn disable(&mut self, sig: u32) {
        self.enabled.clear_unchecked(sig);
    }

    pub fn enable_group(&mut self, group: &[u32]) {
        for &sig in group {
            self.enable(sig);
        }
    }

    #[inline]
    pub fn is_enabled(&self, sig: u32) -> bool {
        self.enabled.contains(sig)
    }

    /// Effective default action for `sig`
    pub fn resolve(&self, sig: u32) -> SignalDefaultAction {
        if self.is_enabled(sig) {
            default_category(sig)
        } else {
            SignalDefaultAction::Ignore
        }
    }
}

impl Default for DefaultActions {
    fn default() -> Self {
        Self::from_features()
    }
}
