//! Generation, mask and dispatch tests for the signal core
//!
//! Handlers are plain fn pointers, so each test records into its own
//! static to stay independent of the others running in parallel.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};
use std::vec::Vec;

use super::*;
use crate::task::TaskId;
use crate::test_support::{core_with, setup, Event};

fn set(signals: &[u32]) -> SigSet {
    SigSet::from_signals(signals).unwrap()
}

#[test]
fn blocked_sigusr1_terminates_when_unblocked() {
    let (core, task) = setup();

    core.set_mask(&task, MaskHow::Block, &set(&[SIGUSR1]));
    core.raise(&task, SIGUSR1, SigVal::int(42)).unwrap();
    assert_eq!(core.pending(&task), set(&[SIGUSR1]));
    assert_eq!(task.lock().queued(SIGUSR1), 1);
    assert_eq!(core.scheduler().terminated(task.id()), None);

    core.set_mask(&task, MaskHow::Unblock, &set(&[SIGUSR1]));
    assert_eq!(core.scheduler().terminated(task.id()), Some(-(SIGUSR1 as i32)));
    assert!(task.has_exited());
    assert!(core.pending(&task).is_empty());
}

#[test]
fn core_dump_signals_mark_the_exit_code() {
    let (core, task) = setup();
    core.raise(&task, SIGSEGV, SigVal::default()).unwrap();
    assert_eq!(
        core.scheduler().terminated(task.id()),
        Some(-((SIGSEGV as i32) | 0x80))
    );
}

#[test]
fn raising_into_an_exited_task_fails() {
    let (core, task) = setup();
    core.raise(&task, SIGTERM, SigVal::default()).unwrap();
    assert!(task.has_exited());
    assert_eq!(
        core.raise(&task, SIGUSR2, SigVal::default()),
        Err(SignalError::TaskExited)
    );
}

#[test]
fn disabled_default_action_is_ignored() {
    let core = core_with(SignalConfig::default().with_default_actions(DefaultActions::none()));
    let task = core.new_task(TaskId::new(7));
    core.raise(&task, SIGTERM, SigVal::default()).unwrap();
    assert!(!task.has_exited());
    assert!(core.pending(&task).is_empty());
    assert!(core.scheduler().events().is_empty());
}

#[test]
fn invalid_signals_are_rejected() {
    let (core, task) = setup();
    for sig in [0, NSIG, 200] {
        assert_eq!(
            core.raise(&task, sig, SigVal::default()),
            Err(SignalError::InvalidSignal(sig))
        );
        assert_eq!(
            core.set_action(&task, sig, SigAction::ignore()),
            Err(SignalError::InvalidSignal(sig))
        );
    }
    assert!(core.pending(&task).is_empty());
}

#[test]
fn set_action_returns_previous_and_refuses_uncatchable() {
    fn handler(_signo: u32, _info: &SigInfo, _user: usize) {}
    let (core, task) = setup();

    let installed = SigAction::handler(handler)
        .with_mask(set(&[SIGUSR2, SIGKILL]))
        .with_flags(ActionFlags::RESTART);
    let previous = core.set_action(&task, SIGUSR1, installed).unwrap();
    assert_eq!(previous, SigAction::default());

    let read_back = core.get_action(&task, SIGUSR1).unwrap();
    assert_eq!(read_back.disposition, Disposition::Handler(handler));
    assert_eq!(read_back.mask, set(&[SIGUSR2]));
    assert!(read_back.flags.contains(ActionFlags::RESTART | ActionFlags::SIGINFO));

    let previous = core.set_action(&task, SIGUSR1, SigAction::default()).unwrap();
    assert_eq!(previous.disposition, Disposition::Handler(handler));

    for sig in [SIGKILL, SIGSTOP] {
        assert_eq!(
            core.set_action(&task, sig, SigAction::ignore()),
            Err(SignalError::Unblockable(sig))
        );
        assert_eq!(core.get_action(&task, sig).unwrap(), SigAction::default());
    }
}

#[test]
fn standard_signals_coalesce_and_realtime_signals_queue() {
    static SEEN: Mutex<Vec<(u32, i32)>> = Mutex::new(Vec::new());
    fn record(signo: u32, info: &SigInfo, _user: usize) {
        SEEN.lock().unwrap().push((signo, info.value.as_int()));
    }

    let (core, task) = setup();
    core.set_action(&task, SIGUSR1, SigAction::handler(record)).unwrap();
    core.set_action(&task, 40, SigAction::handler(record)).unwrap();
    core.set_mask(&task, MaskHow::Block, &set(&[SIGUSR1, 40]));

    core.raise(&task, SIGUSR1, SigVal::int(1)).unwrap();
    core.raise(&task, SIGUSR1, SigVal::int(2)).unwrap();
    core.queue(&task, 40, SigVal::int(3)).unwrap();
    core.queue(&task, 40, SigVal::int(4)).unwrap();
    assert_eq!(task.lock().queued(SIGUSR1), 1);
    assert_eq!(task.lock().queued(40), 2);

    core.set_mask(&task, MaskHow::SetMask, &SigSet::empty());
    assert_eq!(*SEEN.lock().unwrap(), [(40, 3), (40, 4), (SIGUSR1, 1)]);
    assert!(core.pending(&task).is_empty());
}

#[test]
fn unblock_delivers_in_priority_order_before_returning() {
    static ORDER: Mutex<Vec<u32>> = Mutex::new(Vec::new());
    fn record(signo: u32, _info: &SigInfo, _user: usize) {
        ORDER.lock().unwrap().push(signo);
    }

    let (core, task) = setup();
    for sig in [SIGINT, SIGHUP, 40, 41] {
        core.set_action(&task, sig, SigAction::handler(record)).unwrap();
    }
    core.sigprocmask(&task, SIG_BLOCK, Some(&SigSet::full())).unwrap();
    for sig in [SIGINT, 41, SIGHUP, 40] {
        core.raise(&task, sig, SigVal::default()).unwrap();
    }
    assert!(ORDER.lock().unwrap().is_empty());

    let previous = core.sigprocmask(&task, SIG_SETMASK, Some(&SigSet::empty())).unwrap();
    assert_eq!(previous, SigSet::full().without_uncatchable());
    assert_eq!(*ORDER.lock().unwrap(), [40, 41, SIGHUP, SIGINT]);
}

#[test]
fn handler_runs_with_its_mask_and_the_signal_blocked() {
    static TASK: OnceLock<Arc<TaskSignals>> = OnceLock::new();
    static DURING: Mutex<Vec<SigSet>> = Mutex::new(Vec::new());
    fn observe(_signo: u32, _info: &SigInfo, _user: usize) {
        let blocked = TASK.get().unwrap().blocked();
        DURING.lock().unwrap().push(blocked);
    }

    let (core, task) = setup();
    TASK.set(task.clone()).ok().unwrap();
    core.hold(&task, SIGHUP).unwrap();

    core.set_action(
        &task,
        SIGUSR1,
        SigAction::handler(observe).with_mask(set(&[SIGUSR2])),
    )
    .unwrap();
    core.raise(&task, SIGUSR1, SigVal::default()).unwrap();

    core.set_action(
        &task,
        SIGUSR2,
        SigAction::handler(observe).with_flags(ActionFlags::NODEFER),
    )
    .unwrap();
    core.raise(&task, SIGUSR2, SigVal::default()).unwrap();

    assert_eq!(
        *DURING.lock().unwrap(),
        [set(&[SIGHUP, SIGUSR1, SIGUSR2]), set(&[SIGHUP])]
    );
    assert_eq!(task.blocked(), set(&[SIGHUP]));
}

/// Spin until `done` holds, failing the test after a generous deadline
fn spin_until(what: &str, done: impl Fn() -> bool) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !done() {
        assert!(Instant::now() < deadline, "timed out waiting for {}", what);
        thread::yield_now();
    }
}

#[test]
fn overlapping_handlers_clear_only_their_own_mask_bits() {
    static TASK: OnceLock<Arc<TaskSignals>> = OnceLock::new();
    static FIRST_STARTED: AtomicBool = AtomicBool::new(false);
    static SECOND_STARTED: AtomicBool = AtomicBool::new(false);
    static FIRST_CALLS: AtomicU32 = AtomicU32::new(0);
    static SEEN_BY_SECOND: Mutex<Option<SigSet>> = Mutex::new(None);

    fn first(_signo: u32, _info: &SigInfo, _user: usize) {
        FIRST_CALLS.fetch_add(1, Ordering::SeqCst);
        FIRST_STARTED.store(true, Ordering::SeqCst);
        spin_until("second handler", || SECOND_STARTED.load(Ordering::SeqCst));
    }
    fn second(_signo: u32, _info: &SigInfo, _user: usize) {
        SECOND_STARTED.store(true, Ordering::SeqCst);
        let task = TASK.get().unwrap();
        // Wait for the first handler to return and unwind its mask
        spin_until("first handler to return", || !task.blocked().contains(SIGUSR1));
        *SEEN_BY_SECOND.lock().unwrap() = Some(task.blocked());
    }

    let (core, task) = setup();
    TASK.set(task.clone()).ok().unwrap();
    core.set_action(&task, SIGUSR1, SigAction::handler(first)).unwrap();
    core.set_action(&task, SIGUSR2, SigAction::handler(second)).unwrap();

    let other = {
        let (core, task) = (core.clone(), task.clone());
        thread::spawn(move || core.raise(&task, SIGUSR1, SigVal::default()).unwrap())
    };
    spin_until("first handler", || FIRST_STARTED.load(Ordering::SeqCst));
    core.raise(&task, SIGUSR2, SigVal::default()).unwrap();
    other.join().unwrap();

    // The first handler returning must not unmask SIGUSR2 under the second
    assert_eq!(*SEEN_BY_SECOND.lock().unwrap(), Some(set(&[SIGUSR2])));
    assert!(task.blocked().is_empty());

    // SIGUSR1 is deliverable again, not left pending behind a stale mask
    core.raise(&task, SIGUSR1, SigVal::default()).unwrap();
    assert_eq!(FIRST_CALLS.load(Ordering::SeqCst), 2);
    assert!(core.pending(&task).is_empty());
}

#[test]
fn resethand_restores_default_before_the_handler_runs() {
    static CALLS: AtomicU32 = AtomicU32::new(0);
    fn once(_signo: u32, _info: &SigInfo, _user: usize) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let (core, task) = setup();
    core.set_action(
        &task,
        SIGALRM,
        SigAction::handler(once).with_flags(ActionFlags::RESETHAND),
    )
    .unwrap();
    core.raise(&task, SIGALRM, SigVal::default()).unwrap();
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert!(core.get_action(&task, SIGALRM).unwrap().disposition.is_default());

    core.raise(&task, SIGALRM, SigVal::default()).unwrap();
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert_eq!(core.scheduler().terminated(task.id()), Some(-(SIGALRM as i32)));
}

#[test]
fn handler_receives_user_data_and_payload() {
    static SEEN: Mutex<Vec<(u32, SiCode, usize, usize)>> = Mutex::new(Vec::new());
    fn record(signo: u32, info: &SigInfo, user: usize) {
        SEEN.lock().unwrap().push((signo, info.code, info.value.as_ptr(), user));
    }

    let (core, task) = setup();
    core.set_action(&task, 50, SigAction::handler(record).with_user(0xbeef))
        .unwrap();
    core.queue(&task, 50, SigVal::ptr(0x1000)).unwrap();
    assert_eq!(*SEEN.lock().unwrap(), [(50, SiCode::Queue, 0x1000, 0xbeef)]);
}

#[test]
fn sigevent_notification_carries_its_code() {
    static SEEN: Mutex<Vec<(u32, SiCode, i32)>> = Mutex::new(Vec::new());
    fn record(signo: u32, info: &SigInfo, _user: usize) {
        SEEN.lock().unwrap().push((signo, info.code, info.value.as_int()));
    }

    let (core, task) = setup();
    core.set_action(&task, SIGRTMIN, SigAction::handler(record)).unwrap();

    core.notify(&task, &SigEvent::none(), SiCode::Timer).unwrap();
    let event = SigEvent::signal(SIGRTMIN, SigVal::int(-5)).unwrap();
    core.notify(&task, &event, SiCode::Timer).unwrap();
    assert_eq!(*SEEN.lock().unwrap(), [(SIGRTMIN, SiCode::Timer, -5)]);
}

#[test]
fn ignoring_a_signal_discards_pending_instances() {
    let (core, task) = setup();
    core.hold(&task, 45).unwrap();
    core.hold(&task, SIGUSR2).unwrap();
    core.queue(&task, 45, SigVal::int(1)).unwrap();
    core.queue(&task, 45, SigVal::int(2)).unwrap();
    core.raise(&task, SIGUSR2, SigVal::default()).unwrap();

    core.ignore(&task, 45).unwrap();
    assert_eq!(core.pending(&task), set(&[SIGUSR2]));

    // Real-time signals default to Ignore, so restoring the default keeps
    // discarding them
    core.hold(&task, 46).unwrap();
    core.queue(&task, 46, SigVal::int(1)).unwrap();
    core.signal(&task, 46, Disposition::Default).unwrap();
    assert_eq!(core.pending(&task), set(&[SIGUSR2]));
}

#[test]
fn invalid_how_leaves_the_mask_untouched() {
    let (core, task) = setup();
    core.hold(&task, SIGINT).unwrap();
    assert_eq!(
        core.sigprocmask(&task, 7, Some(&set(&[SIGHUP]))),
        Err(SignalError::InvalidHow(7))
    );
    assert_eq!(SignalError::InvalidHow(7).errno(), error::EINVAL);
    assert_eq!(core.sigprocmask(&task, 7, None), Ok(set(&[SIGINT])));
    assert_eq!(MaskHow::try_from(SIG_UNBLOCK), Ok(MaskHow::Unblock));
}

#[test]
fn kill_and_stop_cannot_be_blocked() {
    let (core, task) = setup();
    core.set_mask(&task, MaskHow::SetMask, &set(&[SIGKILL, SIGSTOP, SIGTERM]));
    assert_eq!(task.blocked(), set(&[SIGTERM]));
    assert_eq!(core.hold(&task, SIGKILL), Err(SignalError::Unblockable(SIGKILL)));
    assert_eq!(core.hold(&task, 0), Err(SignalError::InvalidSignal(0)));
}

#[test]
fn sighold_and_sigrelse_deliver_on_release() {
    static CALLS: AtomicU32 = AtomicU32::new(0);
    fn count(_signo: u32, _info: &SigInfo, _user: usize) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let (core, task) = setup();
    core.signal(&task, SIGPOLL, Disposition::Handler(count)).unwrap();
    core.hold(&task, SIGPOLL).unwrap();
    core.raise(&task, SIGPOLL, SigVal::default()).unwrap();
    assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    core.release(&task, SIGPOLL).unwrap();
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn sigset_hold_reports_previous_disposition() {
    fn handler(_signo: u32, _info: &SigInfo, _user: usize) {}
    let (core, task) = setup();

    let previous = core
        .sigset(&task, SIGUSR1, SigsetDisposition::Action(Disposition::Handler(handler)))
        .unwrap();
    assert_eq!(previous, SigsetDisposition::Action(Disposition::Default));

    let previous = core.sigset(&task, SIGUSR1, SigsetDisposition::Hold).unwrap();
    assert_eq!(previous, SigsetDisposition::Action(Disposition::Handler(handler)));
    assert!(task.blocked().contains(SIGUSR1));

    let previous = core
        .sigset(&task, SIGUSR1, SigsetDisposition::Action(Disposition::Ignore))
        .unwrap();
    assert_eq!(previous, SigsetDisposition::Hold);
    assert!(!task.blocked().contains(SIGUSR1));
    assert!(core.get_action(&task, SIGUSR1).unwrap().disposition.is_ignore());
}

#[test]
fn sigset_on_a_held_signal_installs_releases_and_delivers() {
    static CALLS: AtomicU32 = AtomicU32::new(0);
    fn count(_signo: u32, _info: &SigInfo, _user: usize) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let (core, task) = setup();
    assert_eq!(
        core.sigset(&task, SIGUSR2, SigsetDisposition::Hold),
        Ok(SigsetDisposition::Action(Disposition::Default))
    );
    // Holding again reports the hold, not the disposition
    assert_eq!(
        core.sigset(&task, SIGUSR2, SigsetDisposition::Hold),
        Ok(SigsetDisposition::Hold)
    );
    core.raise(&task, SIGUSR2, SigVal::int(4)).unwrap();
    assert_eq!(core.pending(&task), set(&[SIGUSR2]));

    let previous = core
        .sigset(&task, SIGUSR2, SigsetDisposition::Action(Disposition::Handler(count)))
        .unwrap();
    assert_eq!(previous, SigsetDisposition::Hold);
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert!(task.blocked().is_empty());
    assert!(core.pending(&task).is_empty());
    assert!(!task.has_exited());
}

#[test]
fn stop_and_continue_report_to_the_scheduler() {
    let (core, task) = setup();
    core.raise(&task, SIGTSTP, SigVal::default()).unwrap();
    assert_eq!(core.scheduler().count(Event::Stop(task.id(), SIGTSTP)), 1);

    core.hold(&task, SIGTTIN).unwrap();
    core.raise(&task, SIGTTIN, SigVal::default()).unwrap();
    assert!(core.pending(&task).contains(SIGTTIN));

    // SIGCONT resumes even while blocked and cancels pending stops
    core.hold(&task, SIGCONT).unwrap();
    core.raise(&task, SIGCONT, SigVal::default()).unwrap();
    assert_eq!(core.scheduler().count(Event::Resume(task.id())), 1);
    assert_eq!(core.pending(&task), set(&[SIGCONT]));

    core.raise(&task, SIGTTIN, SigVal::default()).unwrap();
    assert_eq!(core.pending(&task), set(&[SIGTTIN]));
    assert!(!task.has_exited());
}

#[test]
fn interrupt_context_raise_is_deferred_to_the_schedule_point() {
    static CALLS: AtomicU32 = AtomicU32::new(0);
    fn count(_signo: u32, _info: &SigInfo, _user: usize) {
        CALLS.fetch_add(1, Ordering::SeqCst);
    }

    let (core, task) = setup();
    core.set_action(&task, SIGUSR2, SigAction::handler(count)).unwrap();

    core.scheduler().set_in_interrupt(true);
    core.raise(&task, SIGUSR2, SigVal::default()).unwrap();
    core.scheduler().set_in_interrupt(false);

    assert_eq!(CALLS.load(Ordering::SeqCst), 0);
    assert!(task.lock().deferred);
    assert!(core.pending(&task).contains(SIGUSR2));

    core.deliver_deferred(&task);
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
    assert!(!task.lock().deferred);

    // Nothing left to do
    core.deliver_deferred(&task);
    assert_eq!(CALLS.load(Ordering::SeqCst), 1);
}

#[test]
fn full_queue_reports_eagain_without_partial_update() {
    let core = core_with(
        SignalConfig::default()
            .with_default_actions(DefaultActions::all())
            .with_queue_depth(2),
    );
    let task = core.new_task(TaskId::new(2));
    core.hold(&task, 40).unwrap();
    core.hold(&task, 41).unwrap();

    core.queue(&task, 40, SigVal::int(1)).unwrap();
    core.queue(&task, 40, SigVal::int(2)).unwrap();
    let err = core.queue(&task, 41, SigVal::int(3)).unwrap_err();
    assert_eq!(err, SignalError::QueueFull);
    assert_eq!(err.errno(), error::EAGAIN);
    assert_eq!(core.pending(&task), set(&[40]));
}

#[test]
fn exec_reset_drops_handlers_and_pending_but_keeps_ignores() {
    fn handler(_signo: u32, _info: &SigInfo, _user: usize) {}
    let (core, task) = setup();
    core.set_action(&task, SIGUSR1, SigAction::handler(handler)).unwrap();
    core.ignore(&task, SIGPIPE).unwrap();
    core.hold(&task, SIGHUP).unwrap();
    core.raise(&task, SIGHUP, SigVal::default()).unwrap();

    task.exec_reset();
    assert!(core.get_action(&task, SIGUSR1).unwrap().disposition.is_default());
    assert!(core.get_action(&task, SIGPIPE).unwrap().disposition.is_ignore());
    assert_eq!(task.blocked(), set(&[SIGHUP]));
    assert!(core.pending(&task).is_empty());
}
