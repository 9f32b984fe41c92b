//! Hosted stand-ins for the scheduler and timer collaborators
//!
//! `MockScheduler` parks threads on a condvar with one wake permit per
//! task and records every lifecycle call. `ManualTimer` never fires on its
//! own; tests expire deadlines by calling `SignalCore::deadline_expired`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;
use std::vec::Vec;

use crate::signal::{SignalConfig, SignalCore, TaskSignals};
use crate::task::{Scheduler, TaskId};
use crate::time::{CancelToken, Timer, WaitId};

/// Upper bound on any single park so a broken test fails instead of hanging
const PARK_LIMIT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Block(TaskId),
    Wake(TaskId),
    Terminate(TaskId, i32),
    Stop(TaskId, u32),
    Resume(TaskId),
}

#[derive(Default)]
pub struct MockScheduler {
    permits: Mutex<HashMap<TaskId, bool>>,
    woken: Condvar,
    events: Mutex<Vec<Event>>,
    interrupt: AtomicBool,
}

impl MockScheduler {
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn terminated(&self, task: TaskId) -> Option<i32> {
        self.events().into_iter().find_map(|event| match event {
            Event::Terminate(id, code) if id == task => Some(code),
            _ => None,
        })
    }

    pub fn count(&self, wanted: Event) -> usize {
        self.events().into_iter().filter(|event| *event == wanted).count()
    }

    /// Pretend the following calls run in an interrupt handler
    pub fn set_in_interrupt(&self, value: bool) {
        self.interrupt.store(value, Ordering::SeqCst);
    }

    /// Wait until `task` has entered `block` at least `times` times
    pub fn wait_for_blocks(&self, task: TaskId, times: usize) {
        let deadline = std::time::Instant::now() + PARK_LIMIT;
        while self.count(Event::Block(task)) < times {
            assert!(std::time::Instant::now() < deadline, "task {} never blocked", task);
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Scheduler for MockScheduler {
    fn block(&self, task: TaskId) {
        self.record(Event::Block(task));
        let mut permits = self.permits.lock().unwrap();
        loop {
            if permits.insert(task, false) == Some(true) {
                return;
            }
            let (guard, timeout) = self.woken.wait_timeout(permits, PARK_LIMIT).unwrap();
            assert!(!timeout.timed_out(), "task {} was never woken", task);
            permits = guard;
        }
    }

    fn wake(&self, task: TaskId) {
        self.record(Event::Wake(task));
        self.permits.lock().unwrap().insert(task, true);
        self.woken.notify_all();
    }

    fn terminate(&self, task: TaskId, exit_code: i32) {
        self.record(Event::Terminate(task, exit_code));
    }

    fn stop(&self, task: TaskId, sig: u32) {
        self.record(Event::Stop(task, sig));
    }

    fn resume(&self, task: TaskId) {
        self.record(Event::Resume(task));
    }

    fn in_interrupt(&self) -> bool {
        self.interrupt.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Armed {
    pub token: CancelToken,
    pub task: TaskId,
    pub wait: WaitId,
    pub after: Duration,
}

#[derive(Default)]
pub struct ManualTimer {
    armed: Mutex<Vec<Armed>>,
    cancelled: Mutex<Vec<CancelToken>>,
    next: AtomicU64,
}

impl ManualTimer {
    pub fn cancelled(&self) -> Vec<CancelToken> {
        self.cancelled.lock().unwrap().clone()
    }

    pub fn armed(&self) -> Vec<Armed> {
        self.armed.lock().unwrap().clone()
    }

    /// Wait until a deadline is armed that has not been cancelled
    pub fn wait_armed(&self) -> Armed {
        let deadline = std::time::Instant::now() + PARK_LIMIT;
        loop {
            let cancelled = self.cancelled();
            if let Some(armed) = self
                .armed()
                .into_iter()
                .find(|armed| !cancelled.contains(&armed.token))
            {
                return armed;
            }
            assert!(std::time::Instant::now() < deadline, "no deadline was armed");
            std::thread::sleep(Duration::from_millis(1));
        }
    }
}

impl Timer for ManualTimer {
    fn schedule_deadline(&self, task: TaskId, wait: WaitId, after: Duration) -> CancelToken {
        let token = CancelToken(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        self.armed.lock().unwrap().push(Armed {
            token,
            task,
            wait,
            after,
        });
        token
    }

    fn cancel(&self, token: CancelToken) {
        self.cancelled.lock().unwrap().push(token);
    }
}

pub type TestCore = SignalCore<MockScheduler, ManualTimer>;

pub fn core_with(config: SignalConfig) -> Arc<TestCore> {
    Arc::new(SignalCore::new(
        MockScheduler::default(),
        ManualTimer::default(),
        config,
    ))
}

/// Core with every default action enabled and one task
pub fn setup() -> (Arc<TestCore>, Arc<TaskSignals>) {
    let core = core_with(SignalConfig::default().with_default_actions(
        crate::signal::DefaultActions::all(),
    ));
    let task = Arc::new(core.new_task(TaskId::new(1)));
    (core, task)
}
