//! Signal generation and delivery
//!
//! `SignalCore` ties the per-task state to the scheduler and timer
//! collaborators. A raise records the instance under the target's
//! critical section, hands it straight to a parked waiter when one wants
//! it, and otherwise dispatches every deliverable signal before returning.
//! Raises from interrupt context only mark the task for deferred delivery;
//! the scheduler runs it at the task's next schedule point through
//! [`SignalCore::deliver_deferred`].
//!
//! Handlers and scheduler side effects always run outside the critical
//! section.

use super::action::{ActionFlags, Disposition, SigAction, SigHandler, SignalDefaultAction};
use super::config::SignalConfig;
use super::constants::*;
use super::error::{SignalError, SignalResult};
use super::pending::{Enqueued, SignalState, TaskSignals, WaitKind, WaitStatus};
use super::set::SigSet;
use super::types::{SiCode, SigEvent, SigInfo, SigVal};
use crate::task::scheduler::signal_exit_code;
use crate::task::{Scheduler, TaskId};
use crate::time::{Timer, WaitId};

/// `how` argument of [`SignalCore::set_mask`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MaskHow {
    /// Add the set to the blocked mask
    Block,
    /// Remove the set from the blocked mask
    Unblock,
    /// Replace the blocked mask
    SetMask,
}

impl TryFrom<i32> for MaskHow {
    type Error = SignalError;

    fn try_from(how: i32) -> Result<Self, SignalError> {
        match how {
            SIG_BLOCK => Ok(MaskHow::Block),
            SIG_UNBLOCK => Ok(MaskHow::Unblock),
            SIG_SETMASK => Ok(MaskHow::SetMask),
            other => Err(SignalError::InvalidHow(other)),
        }
    }
}

/// Disposition argument and result of [`SignalCore::sigset`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigsetDisposition {
    /// `SIG_HOLD`: the signal is (or was) blocked
    Hold,
    Action(Disposition),
}

/// Outcome of posting an instance to a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Posted {
    Coalesced,
    /// Recorded while blocked
    Queued,
    /// Claimed by a parked waiter
    Handed,
    /// Recorded and not blocked
    Deliverable,
}

/// What dispatching one instance amounts to, decided under the lock
enum Dispatch {
    Discard(SigInfo),
    Handler {
        handler: SigHandler,
        info: SigInfo,
        /// Bits this dispatch added to the mask; only these are cleared
        /// when the handler returns
        added: SigSet,
    },
    Default(SignalDefaultAction, SigInfo),
}

pub struct SignalCore<S: Scheduler, T: Timer> {
    pub(crate) scheduler: S,
    pub(crate) timer: T,
    config: SignalConfig,
}

impl<S: Scheduler, T: Timer> SignalCore<S, T> {
    pub fn new(scheduler: S, timer: T, config: SignalConfig) -> Self {
        SignalCore {
            scheduler,
            timer,
            config,
        }
    }

    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn config(&self) -> &SignalConfig {
        &self.config
    }

    /// Signal state for a newly created task
    pub fn new_task(&self, id: TaskId) -> TaskSignals {
        TaskSignals::new(id, &self.config)
    }

    // ------------------------------------------------------------------
    // Generation
    // ------------------------------------------------------------------

    /// `kill`/`raise`: send `signo` with source `SI_USER`
    pub fn raise(&self, task: &TaskSignals, signo: u32, value: SigVal) -> SignalResult<()> {
        self.raise_info(task, SigInfo::new(signo, SiCode::User, value))
    }

    /// `sigqueue`: send `signo` with source `SI_QUEUE`
    pub fn queue(&self, task: &TaskSignals, signo: u32, value: SigVal) -> SignalResult<()> {
        self.raise_info(task, SigInfo::new(signo, SiCode::Queue, value))
    }

    /// Fire a timer or message-queue notification
    pub fn notify(&self, task: &TaskSignals, event: &SigEvent, code: SiCode) -> SignalResult<()> {
        match event.to_info(code) {
            Some(info) => self.raise_info(task, info),
            None => Ok(()),
        }
    }

    /// Send a fully described instance
    pub fn raise_info(&self, task: &TaskSignals, info: SigInfo) -> SignalResult<()> {
        let sig = info.signo;
        if !is_valid_signal(sig) {
            log::warn!("raise: invalid signal number {} for task {}", sig, task.id());
            return Err(SignalError::InvalidSignal(sig));
        }

        let in_interrupt = self.scheduler.in_interrupt();
        let mut resume = false;

        let (posted, waiter_parked) = {
            let mut state = task.lock();
            if state.exited {
                return Err(SignalError::TaskExited);
            }

            let posted = self.post(&mut state, info)?;

            // SIGCONT continues the task at generation time, even when it
            // is blocked or caught, and cancels pending stop signals
            if sig == SIGCONT && self.config.default_actions.is_enabled(SIGCONT) {
                state.discard(stop_signals());
                resume = true;
            } else if stop_signals().contains(sig) {
                state.discard(SigSet::from_bits(sig_mask(SIGCONT)));
            }

            if posted == Posted::Deliverable && in_interrupt {
                state.deferred = true;
            }
            (posted, state.waiter.is_some_and(|w| w.is_parked()))
        };

        if resume {
            log::info!("Task {} continued by SIGCONT", task.id());
            self.scheduler.resume(task.id());
        }

        match posted {
            Posted::Coalesced => {
                log::debug!(
                    "Signal {} ({}) already pending for task {}",
                    sig,
                    signal_name(sig),
                    task.id()
                );
            }
            Posted::Queued => {
                log::debug!(
                    "Signal {} ({}) queued for task {} (blocked)",
                    sig,
                    signal_name(sig),
                    task.id()
                );
            }
            Posted::Handed => {
                log::debug!(
                    "Signal {} ({}) handed to waiter of task {}",
                    sig,
                    signal_name(sig),
                    task.id()
                );
                self.scheduler.wake(task.id());
            }
            Posted::Deliverable if in_interrupt => {
                // Handlers run at the task's next schedule point; a parked
                // task has to be woken to get there
                if waiter_parked {
                    self.scheduler.wake(task.id());
                }
            }
            Posted::Deliverable => self.deliver_pending(task),
        }

        Ok(())
    }

    /// Record `info` for the task, or hand it to a parked waiter
    fn post(&self, state: &mut SignalState, info: SigInfo) -> SignalResult<Posted> {
        let sig = info.signo;
        let blocked = state.blocked.contains(sig);
        let ignored = self.is_ignored(state, sig);

        if let Some(waiter) = state.parked_waiter() {
            let wants = match waiter.kind {
                WaitKind::Set(set) => set.contains(sig),
                WaitKind::Suspend => !blocked && !ignored,
            };
            if wants {
                waiter.status = WaitStatus::Woken(info);
                return Ok(Posted::Handed);
            }
        }

        match state.enqueue(info)? {
            Enqueued::Coalesced => Ok(Posted::Coalesced),
            Enqueued::Queued if blocked => Ok(Posted::Queued),
            Enqueued::Queued => Ok(Posted::Deliverable),
        }
    }

    // ------------------------------------------------------------------
    // Actions
    // ------------------------------------------------------------------

    /// `sigaction`: install `action` and return the previous one
    ///
    /// Switching a signal to ignored discards its pending instances.
    pub fn set_action(
        &self,
        task: &TaskSignals,
        signo: u32,
        action: SigAction,
    ) -> SignalResult<SigAction> {
        if !is_valid_signal(signo) {
            log::warn!("sigaction: invalid signal number {}", signo);
            return Err(SignalError::InvalidSignal(signo));
        }
        if !is_catchable(signo) {
            log::warn!(
                "sigaction: cannot set handler for {} (uncatchable)",
                signal_name(signo)
            );
            return Err(SignalError::Unblockable(signo));
        }

        let (previous, dropped) = {
            let mut state = task.lock();
            self.install(&mut state, signo, action)
        };
        log_discarded(task, signo, dropped);
        Ok(previous)
    }

    /// Replace the action under the lock; an action that ignores the
    /// signal drops its pending instances. Returns the previous action and
    /// the number of instances dropped.
    fn install(
        &self,
        state: &mut SignalState,
        signo: u32,
        action: SigAction,
    ) -> (SigAction, usize) {
        let previous = state.actions.replace(signo, action);
        let dropped = if self.is_ignored(state, signo) {
            state.discard(SigSet::from_bits(sig_mask(signo)))
        } else {
            0
        };
        (previous, dropped)
    }

    /// Current action for `signo`
    pub fn get_action(&self, task: &TaskSignals, signo: u32) -> SignalResult<SigAction> {
        if !is_valid_signal(signo) {
            return Err(SignalError::InvalidSignal(signo));
        }
        Ok(task.lock().actions.get(signo))
    }

    /// `signal()`: set a plain disposition, returning the previous one
    pub fn signal(
        &self,
        task: &TaskSignals,
        signo: u32,
        disposition: Disposition,
    ) -> SignalResult<Disposition> {
        let action = SigAction {
            disposition,
            ..SigAction::default()
        };
        self.set_action(task, signo, action).map(|prev| prev.disposition)
    }

    /// `sigignore()`
    pub fn ignore(&self, task: &TaskSignals, signo: u32) -> SignalResult<()> {
        self.set_action(task, signo, SigAction::ignore()).map(|_| ())
    }

    /// `sigset()`: either hold the signal, or install a disposition and
    /// release it. Returns `Hold` if the signal was blocked beforehand,
    /// otherwise the previous disposition.
    pub fn sigset(
        &self,
        task: &TaskSignals,
        signo: u32,
        disposition: SigsetDisposition,
    ) -> SignalResult<SigsetDisposition> {
        if !is_valid_signal(signo) {
            return Err(SignalError::InvalidSignal(signo));
        }
        if !is_catchable(signo) {
            return Err(SignalError::Unblockable(signo));
        }

        let (was_held, previous, dropped, deliverable) = {
            let mut state = task.lock();
            let was_held = state.blocked.contains(signo);
            match disposition {
                SigsetDisposition::Hold => {
                    let previous = state.actions.get(signo).disposition;
                    state.blocked.insert_unchecked(signo);
                    (was_held, previous, 0, false)
                }
                SigsetDisposition::Action(disposition) => {
                    let action = SigAction {
                        disposition,
                        ..SigAction::default()
                    };
                    let (previous, dropped) = self.install(&mut state, signo, action);
                    state.blocked.clear_unchecked(signo);
                    let deliverable = !state.deliverable().is_empty();
                    (was_held, previous.disposition, dropped, deliverable)
                }
            }
        };

        log_discarded(task, signo, dropped);
        if deliverable {
            self.deliver_pending(task);
        }

        Ok(if was_held {
            SigsetDisposition::Hold
        } else {
            SigsetDisposition::Action(previous)
        })
    }

    /// Whether `sig` would be thrown away if dispatched now
    pub(crate) fn is_ignored(&self, state: &SignalState, sig: u32) -> bool {
        match state.actions.get(sig).disposition {
            Disposition::Ignore => true,
            Disposition::Default => {
                self.config.default_actions.resolve(sig) == SignalDefaultAction::Ignore
            }
            Disposition::Handler(_) => false,
        }
    }

    // ------------------------------------------------------------------
    // Masks
    // ------------------------------------------------------------------

    /// `sigprocmask` with a typed `how`; returns the previous mask
    ///
    /// SIGKILL and SIGSTOP are silently kept out of the mask. Signals that
    /// become unblocked and are pending are delivered before this returns.
    pub fn set_mask(&self, task: &TaskSignals, how: MaskHow, set: &SigSet) -> SigSet {
        let (previous, deliverable) = {
            let mut state = task.lock();
            let previous = state.blocked;
            let updated = match how {
                MaskHow::Block => previous.union(set),
                MaskHow::Unblock => previous.difference(set),
                MaskHow::SetMask => *set,
            };
            state.blocked = updated.without_uncatchable();
            (previous, !state.deliverable().is_empty())
        };

        log::debug!(
            "Task {} mask {:?} -> {:?} ({:?})",
            task.id(),
            previous,
            task.blocked(),
            how
        );

        if deliverable {
            self.deliver_pending(task);
        }
        previous
    }

    /// Raw `sigprocmask(how, set, oset)`: `None` only reads the mask
    pub fn sigprocmask(
        &self,
        task: &TaskSignals,
        how: i32,
        set: Option<&SigSet>,
    ) -> SignalResult<SigSet> {
        match set {
            Some(set) => {
                let how = MaskHow::try_from(how).map_err(|err| {
                    log::warn!("sigprocmask: invalid 'how' value {}", how);
                    err
                })?;
                Ok(self.set_mask(task, how, set))
            }
            None => Ok(task.blocked()),
        }
    }

    /// `sighold()`: add one signal to the mask
    pub fn hold(&self, task: &TaskSignals, signo: u32) -> SignalResult<()> {
        let set = single_catchable(signo)?;
        self.set_mask(task, MaskHow::Block, &set);
        Ok(())
    }

    /// `sigrelse()`: remove one signal from the mask, delivering it if pending
    pub fn release(&self, task: &TaskSignals, signo: u32) -> SignalResult<()> {
        let set = SigSet::single(signo)?;
        self.set_mask(task, MaskHow::Unblock, &set);
        Ok(())
    }

    /// `sigpending()`: raw pending set, not cleared
    pub fn pending(&self, task: &TaskSignals) -> SigSet {
        task.lock().pending()
    }

    // ------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------

    /// Scheduler hook: run delivery deferred by interrupt-context raises
    pub fn deliver_deferred(&self, task: &TaskSignals) {
        let deferred = task.lock().deferred;
        if deferred {
            self.deliver_pending(task);
        }
    }

    /// Dispatch every pending, unblocked signal in priority order
    pub fn deliver_pending(&self, task: &TaskSignals) {
        loop {
            let step = {
                let mut state = task.lock();
                state.deferred = false;
                if state.exited {
                    return;
                }
                let deliverable = state.deliverable();
                match state.take(deliverable) {
                    Some(info) => self.prepare(&mut state, info),
                    None => return,
                }
            };

            if !self.run(task, step) {
                return;
            }
        }
    }

    /// Resolve the action for one claimed instance and apply its mask
    /// changes; runs under the task's lock
    fn prepare(&self, state: &mut SignalState, mut info: SigInfo) -> Dispatch {
        let sig = info.signo;
        let action = state.actions.get(sig);

        match action.disposition {
            Disposition::Ignore => Dispatch::Discard(info),
            Disposition::Default => match self.config.default_actions.resolve(sig) {
                SignalDefaultAction::Ignore => Dispatch::Discard(info),
                default => Dispatch::Default(default, info),
            },
            Disposition::Handler(handler) => {
                if action.flags.contains(ActionFlags::RESETHAND) {
                    state.actions.replace(sig, SigAction::default());
                }

                let mut mask = action.mask;
                if !action.flags.contains(ActionFlags::NODEFER) {
                    mask.insert_unchecked(sig);
                }
                let added = mask.without_uncatchable().difference(&state.blocked);
                state.blocked = state.blocked.union(&added);

                info.user = action.user;
                Dispatch::Handler {
                    handler,
                    info,
                    added,
                }
            }
        }
    }

    /// Carry out a dispatch decision outside the lock
    ///
    /// Returns false once the task is gone and delivery must stop.
    fn run(&self, task: &TaskSignals, step: Dispatch) -> bool {
        match step {
            Dispatch::Discard(info) => {
                log::debug!(
                    "Signal {} ({}) ignored by task {}",
                    info.signo,
                    signal_name(info.signo),
                    task.id()
                );
                true
            }
            Dispatch::Handler {
                handler,
                info,
                added,
            } => {
                log::info!(
                    "Signal {} ({}) delivered to handler {:#x} of task {}",
                    info.signo,
                    signal_name(info.signo),
                    handler as usize,
                    task.id()
                );
                handler(info.signo, &info, info.user);

                let interrupted = {
                    let mut state = task.lock();
                    // Another context may be running a handler of its own;
                    // leave the bits it added in place
                    state.blocked = state.blocked.difference(&added);
                    interrupt_set_waiter(&mut state)
                };
                if interrupted {
                    self.scheduler.wake(task.id());
                }
                true
            }
            Dispatch::Default(action, info) => {
                self.deliver_default_action(task, action, info.signo)
            }
        }
    }

    /// Apply a signal's default action
    fn deliver_default_action(
        &self,
        task: &TaskSignals,
        action: SignalDefaultAction,
        sig: u32,
    ) -> bool {
        match action {
            SignalDefaultAction::Terminate | SignalDefaultAction::CoreDump => {
                let core_dump = action == SignalDefaultAction::CoreDump;
                if core_dump {
                    log::info!(
                        "Task {} killed (core dumped) by signal {} ({})",
                        task.id(),
                        sig,
                        signal_name(sig)
                    );
                } else {
                    log::info!(
                        "Task {} terminated by signal {} ({})",
                        task.id(),
                        sig,
                        signal_name(sig)
                    );
                }

                let waiter_parked = {
                    let mut state = task.lock();
                    state.exited = true;
                    state.discard_all();
                    state.finish_waiter(WaitStatus::Interrupted)
                };
                self.scheduler
                    .terminate(task.id(), signal_exit_code(sig, core_dump));
                if waiter_parked {
                    self.scheduler.wake(task.id());
                }
                false
            }
            SignalDefaultAction::Stop => {
                log::info!(
                    "Task {} stopped by signal {} ({})",
                    task.id(),
                    sig,
                    signal_name(sig)
                );
                self.scheduler.stop(task.id(), sig);
                true
            }
            SignalDefaultAction::Continue => {
                // Already resumed when SIGCONT was generated
                log::debug!("Signal {} ({}) consumed by task {}", sig, signal_name(sig), task.id());
                true
            }
            SignalDefaultAction::Ignore => true,
        }
    }

    /// Dispatch an instance a suspended task claimed for itself
    pub(crate) fn dispatch_claimed(&self, task: &TaskSignals, info: SigInfo) {
        let step = {
            let mut state = task.lock();
            self.prepare(&mut state, info)
        };
        self.run(task, step);
    }

    /// Timer callback: the deadline armed for `wait` has passed
    pub fn deadline_expired(&self, task: &TaskSignals, wait: WaitId) {
        let expired = {
            let mut state = task.lock();
            match state.parked_waiter() {
                Some(waiter) if waiter.id == wait => {
                    waiter.status = WaitStatus::TimedOut;
                    true
                }
                _ => false,
            }
        };
        if expired {
            log::debug!("Signal wait {:?} of task {} timed out", wait, task.id());
            self.scheduler.wake(task.id());
        }
    }
}

fn log_discarded(task: &TaskSignals, signo: u32, dropped: usize) {
    if dropped > 0 {
        log::debug!(
            "Signal {} ({}) now ignored by task {}, discarded {} pending",
            signo,
            signal_name(signo),
            task.id(),
            dropped
        );
    }
}

/// Signals whose default action stops the task
fn stop_signals() -> SigSet {
    SigSet::from_bits(
        sig_mask(SIGSTOP) | sig_mask(SIGTSTP) | sig_mask(SIGTTIN) | sig_mask(SIGTTOU),
    )
}

/// Single-signal set for the mask helpers; SIGKILL/SIGSTOP cannot be held
fn single_catchable(signo: u32) -> SignalResult<SigSet> {
    let set = SigSet::single(signo)?;
    if !is_catchable(signo) {
        return Err(SignalError::Unblockable(signo));
    }
    Ok(set)
}

/// A handler ran: a task parked in the `sigwait` family returns EINTR
fn interrupt_set_waiter(state: &mut SignalState) -> bool {
    match state.parked_waiter() {
        Some(waiter) if matches!(waiter.kind, WaitKind::Set(_)) => {
            waiter.status = WaitStatus::Interrupted;
            true
        }
        _ => false,
    }
}
