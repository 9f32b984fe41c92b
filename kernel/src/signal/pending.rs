//! Per-task pending/blocked signal state
//!
//! Each task owns one [`TaskSignals`]: the blocked mask, the pending set,
//! the queue of raised instances, the action table, and the waiter slot
//! used by the blocking wait engine. Everything lives behind one
//! [`IrqSpinLock`] so raises from interrupt handlers and mutations from
//! the task itself are serialized.

use alloc::collections::VecDeque;

use super::action::ActionTable;
use super::config::SignalConfig;
use super::constants::*;
use super::error::{SignalError, SignalResult};
use super::set::SigSet;
use super::types::SigInfo;
use crate::spinlock::{IrqSpinLock, IrqSpinLockGuard};
use crate::task::TaskId;
use crate::time::WaitId;

/// What a parked task is waiting for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitKind {
    /// `sigwait` family: any member of the set, blocked or not
    Set(SigSet),
    /// `sigsuspend`: any unblocked, non-ignored signal
    Suspend,
}

/// Progress of a parked wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitStatus {
    Parked,
    /// A raise handed this instance to the waiter
    Woken(SigInfo),
    /// A caught signal outside the wait set was delivered, or the task died
    Interrupted,
    TimedOut,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct Waiter {
    pub id: WaitId,
    pub kind: WaitKind,
    pub status: WaitStatus,
}

impl Waiter {
    #[inline]
    pub fn is_parked(&self) -> bool {
        self.status == WaitStatus::Parked
    }
}

/// Result of recording a raised instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Enqueued {
    /// Standard signal already pending; nothing recorded
    Coalesced,
    /// Instance appended to the queue
    Queued,
}

pub struct SignalState {
    /// Blocked signals (sigprocmask)
    pub(crate) blocked: SigSet,
    /// Signals with at least one queued instance
    pending: SigSet,
    /// Raised instances in raise order
    queue: VecDeque<SigInfo>,
    /// Maximum number of queued instances
    depth: usize,
    pub(crate) actions: ActionTable,
    pub(crate) waiter: Option<Waiter>,
    next_wait: u64,
    /// Set when an interrupt-context raise left deliverable work behind
    pub(crate) deferred: bool,
    /// Set once a default action terminated the task
    pub(crate) exited: bool,
}

impl SignalState {
    /// Fresh state: nothing blocked, nothing pending, default actions
    pub fn new(depth: usize) -> Self {
        SignalState {
            blocked: SigSet::empty(),
            pending: SigSet::empty(),
            // Allocated up front so raising from interrupt context never
            // has to grow the queue
            queue: VecDeque::with_capacity(depth),
            depth,
            actions: ActionTable::new(),
            waiter: None,
            next_wait: 0,
            deferred: false,
            exited: false,
        }
    }

    #[inline]
    pub fn blocked(&self) -> SigSet {
        self.blocked
    }

    #[inline]
    pub fn pending(&self) -> SigSet {
        self.pending
    }

    #[inline]
    pub fn is_pending(&self, sig: u32) -> bool {
        self.pending.contains(sig)
    }

    /// Pending signals that are not blocked
    #[inline]
    pub fn deliverable(&self) -> SigSet {
        self.pending.difference(&self.blocked)
    }

    /// Number of queued instances of `sig`
    pub fn queued(&self, sig: u32) -> usize {
        self.queue.iter().filter(|info| info.signo == sig).count()
    }

    /// Record a raised instance
    ///
    /// Standard signals coalesce with an instance that is already pending;
    /// real-time signals always append. Fails without touching the state
    /// when the queue is full.
    pub(crate) fn enqueue(&mut self, info: SigInfo) -> SignalResult<Enqueued> {
        if !is_realtime(info.signo) && self.is_pending(info.signo) {
            return Ok(Enqueued::Coalesced);
        }
        if self.queue.len() >= self.depth {
            return Err(SignalError::QueueFull);
        }
        self.queue.push_back(info);
        self.pending.insert_unchecked(info.signo);
        Ok(Enqueued::Queued)
    }

    /// Signal number [`SignalState::take`] would pick from `eligible`
    ///
    /// Real-time signals win over standard ones; within each band the
    /// lowest number wins.
    pub fn next_candidate(&self, eligible: SigSet) -> Option<u32> {
        let candidates = self.pending.intersect(&eligible);
        candidates
            .realtime()
            .lowest()
            .or_else(|| candidates.standard().lowest())
    }

    /// Remove and return the next instance among `eligible` signals
    ///
    /// For a real-time signal this is its oldest queued instance. The
    /// pending bit is cleared only when no instance of that number remains.
    pub(crate) fn take(&mut self, eligible: SigSet) -> Option<SigInfo> {
        let sig = self.next_candidate(eligible)?;
        let index = self.queue.iter().position(|info| info.signo == sig)?;
        let info = self.queue.remove(index)?;
        if !self.queue.iter().any(|queued| queued.signo == sig) {
            self.pending.clear_unchecked(sig);
        }
        Some(info)
    }

    /// Drop every queued instance of the signals in `set`
    pub(crate) fn discard(&mut self, set: SigSet) -> usize {
        let before = self.queue.len();
        self.queue.retain(|info| !set.contains(info.signo));
        self.pending = self.pending.difference(&set);
        before - self.queue.len()
    }

    /// Drop everything that is queued
    pub(crate) fn discard_all(&mut self) -> usize {
        let dropped = self.queue.len();
        self.queue.clear();
        self.pending = SigSet::empty();
        dropped
    }

    /// Register a parked waiter and return its id
    pub(crate) fn park(&mut self, kind: WaitKind) -> WaitId {
        self.next_wait += 1;
        let id = WaitId(self.next_wait);
        self.waiter = Some(Waiter {
            id,
            kind,
            status: WaitStatus::Parked,
        });
        id
    }

    /// The waiter, if it is still parked
    #[inline]
    pub(crate) fn parked_waiter(&mut self) -> Option<&mut Waiter> {
        self.waiter.as_mut().filter(|waiter| waiter.is_parked())
    }

    /// Finish a parked waiter with `status`; returns true if one was parked
    pub(crate) fn finish_waiter(&mut self, status: WaitStatus) -> bool {
        match self.parked_waiter() {
            Some(waiter) => {
                waiter.status = status;
                true
            }
            None => false,
        }
    }
}

/// Signal state of one task
///
/// Created with the task and dropped with it; queued instances go with it.
pub struct TaskSignals {
    id: TaskId,
    state: IrqSpinLock<SignalState>,
}

impl TaskSignals {
    pub fn new(id: TaskId, config: &SignalConfig) -> Self {
        TaskSignals {
            id,
            state: IrqSpinLock::new(SignalState::new(config.queue_depth)),
        }
    }

    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Enter the critical section for this task's signal state
    #[inline]
    pub fn lock(&self) -> IrqSpinLockGuard<'_, SignalState> {
        self.state.lock()
    }

    /// Current blocked mask
    pub fn blocked(&self) -> SigSet {
        self.lock().blocked()
    }

    /// True once a default action has terminated the task
    pub fn has_exited(&self) -> bool {
        self.lock().exited
    }

    /// Reset after `exec`: pending instances are dropped and caught signals
    /// return to the default action; ignored signals and the mask survive
    pub fn exec_reset(&self) {
        let mut state = self.lock();
        state.discard_all();
        state.actions.reset_handlers();
    }

    /// Task is going away: discard queued instances and refuse new ones
    pub fn exit(&self) {
        let dropped = {
            let mut state = self.lock();
            state.exited = true;
            state.finish_waiter(WaitStatus::Interrupted);
            state.discard_all()
        };
        if dropped > 0 {
            log::debug!("Task {} exiting, discarded {} queued signals", self.id, dropped);
        }
    }
}
