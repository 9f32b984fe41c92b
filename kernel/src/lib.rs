//! Signal delivery and queuing for RTOS kernel tasks
//!
//! The crate owns per-task signal state and the logic that moves a raised
//! signal to a handler, a default action, or a blocked waiter. Scheduling
//! and timers stay with the kernel: it implements [`task::Scheduler`] and
//! [`time::Timer`] and hands them to a [`signal::SignalCore`].

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod logger;
pub mod signal;
pub mod spinlock;
pub mod task;
pub mod time;

#[cfg(test)]
mod test_support;

pub use signal::{SignalConfig, SignalCore, SignalError, SignalResult, TaskSignals};
