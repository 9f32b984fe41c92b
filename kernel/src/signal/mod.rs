//! POSIX-style signal subsystem
//!
//! This module implements signal generation, queuing and delivery for
//! kernel tasks:
//! - Signal constants and the bit-vector [`SigSet`]
//! - Per-task pending/blocked state with queued real-time instances
//! - The action table and the enabled default actions
//! - Delivery to handlers and default actions, in priority order
//! - Blocking waits (`sigwait`, `sigtimedwait`, `sigsuspend`)
//!
//! Delivery happens synchronously inside the call that makes a signal
//! deliverable (a raise or an unblock), or at the task's next schedule
//! point when the raise came from interrupt context.

pub mod action;
pub mod config;
pub mod constants;
pub mod delivery;
pub mod error;
pub mod pending;
pub mod set;
pub mod types;
mod wait;

#[cfg(test)]
mod delivery_tests;

pub use action::{
    ActionFlags, DefaultActions, Disposition, SigAction, SigHandler, SignalDefaultAction,
};
pub use config::SignalConfig;
pub use constants::*;
pub use delivery::{MaskHow, SignalCore, SigsetDisposition};
pub use error::{SignalError, SignalResult};
pub use pending::TaskSignals;
pub use set::SigSet;
pub use types::*;
