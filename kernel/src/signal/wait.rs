//! Blocking wait engine
//!
//! `sigwait`, `sigtimedwait` and `sigsuspend` park the calling task on its
//! waiter slot. The check for an already pending signal and the parking
//! happen in one critical section, and the scheduler's block keeps a wake
//! that arrives before the block, so a raise can never slip between the two.

use core::time::Duration;

use super::constants::*;
use super::delivery::SignalCore;
use super::error::{SignalError, SignalResult};
use super::pending::{TaskSignals, WaitKind, WaitStatus};
use super::set::SigSet;
use super::types::SigInfo;
use crate::task::Scheduler;
use crate::time::Timer;

impl<S: Scheduler, T: Timer> SignalCore<S, T> {
    /// Wait for any signal in `set`, blocked or not
    ///
    /// A pending member is consumed immediately. `Some(Duration::ZERO)`
    /// polls. Without a deadline the wait ends only when a member arrives
    /// or a caught signal outside the set is delivered.
    pub fn wait(
        &self,
        task: &TaskSignals,
        set: &SigSet,
        timeout: Option<Duration>,
    ) -> SignalResult<SigInfo> {
        let wait_id = {
            let mut state = task.lock();
            if state.exited {
                return Err(SignalError::TaskExited);
            }
            if let Some(info) = state.take(*set) {
                return Ok(info);
            }
            if timeout == Some(Duration::ZERO) {
                return Err(SignalError::Timeout);
            }
            state.park(WaitKind::Set(*set))
        };

        log::debug!(
            "Task {} waiting for {:?} (timeout {:?})",
            task.id(),
            set,
            timeout
        );

        let deadline = timeout.map(|after| self.timer.schedule_deadline(task.id(), wait_id, after));
        let status = self.park_until_finished(task);
        if let Some(token) = deadline {
            if status != WaitStatus::TimedOut {
                self.timer.cancel(token);
            }
        }

        match status {
            WaitStatus::Woken(info) => Ok(info),
            WaitStatus::TimedOut => Err(SignalError::Timeout),
            WaitStatus::Interrupted | WaitStatus::Parked => Err(SignalError::Interrupted),
        }
    }

    /// `sigwait()`: the number of the consumed signal
    pub fn sigwait(&self, task: &TaskSignals, set: &SigSet) -> SignalResult<u32> {
        self.wait(task, set, None).map(|info| info.signo)
    }

    /// `sigwaitinfo()`
    pub fn sigwaitinfo(&self, task: &TaskSignals, set: &SigSet) -> SignalResult<SigInfo> {
        self.wait(task, set, None)
    }

    /// `sigtimedwait()`
    pub fn sigtimedwait(
        &self,
        task: &TaskSignals,
        set: &SigSet,
        timeout: Duration,
    ) -> SignalResult<SigInfo> {
        self.wait(task, set, Some(timeout))
    }

    /// `sigsuspend()`: install `mask`, wait for an unblocked signal that is
    /// not ignored, dispatch it, then restore the previous mask
    ///
    /// Returns the instance that ended the suspension; its handler has
    /// already run when this returns.
    pub fn suspend(&self, task: &TaskSignals, mask: &SigSet) -> SignalResult<SigInfo> {
        let (saved_mask, claimed) = {
            let mut state = task.lock();
            if state.exited {
                return Err(SignalError::TaskExited);
            }
            let saved_mask = state.blocked;
            state.blocked = mask.without_uncatchable();

            let wanted = state
                .deliverable()
                .iter()
                .filter(|&sig| !self.is_ignored(&state, sig))
                .fold(SigSet::empty(), |set, sig| set.union(&SigSet::from_bits(sig_mask(sig))));
            let claimed = state.take(wanted);
            if claimed.is_none() {
                state.park(WaitKind::Suspend);
            }
            (saved_mask, claimed)
        };

        let outcome = match claimed {
            Some(info) => Ok(info),
            None => {
                log::debug!("Task {} suspended with mask {:?}", task.id(), mask);
                match self.park_until_finished(task) {
                    WaitStatus::Woken(info) => Ok(info),
                    _ => Err(SignalError::Interrupted),
                }
            }
        };

        if let Ok(info) = outcome {
            self.dispatch_claimed(task, info);
        }

        task.lock().blocked = saved_mask;
        self.deliver_pending(task);
        outcome
    }

    /// `sigpause()`: suspend with `signo` removed from the current mask
    pub fn sigpause(&self, task: &TaskSignals, signo: u32) -> SignalResult<SigInfo> {
        let unblock = SigSet::single(signo)?;
        let mask = task.blocked().difference(&unblock);
        self.suspend(task, &mask)
    }

    /// Block until the parked waiter leaves the `Parked` status, then clear
    /// the waiter slot and return its final status
    fn park_until_finished(&self, task: &TaskSignals) -> WaitStatus {
        loop {
            self.scheduler.block(task.id());

            // An interrupt-context raise may have left work for this task;
            // a caught signal run here ends a `sigwait` with EINTR
            self.deliver_deferred(task);

            let mut state = task.lock();
            let waiter = state.waiter;
            match waiter {
                Some(waiter) if waiter.is_parked() => continue,
                Some(waiter) => {
                    state.waiter = None;
                    return waiter.status;
                }
                None => return WaitStatus::Interrupted,
            }
        }
    }
}
