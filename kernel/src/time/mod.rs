//! Deadline services the signal core consumes for timed waits

pub mod timer;

pub use timer::{CancelToken, Timer, WaitId};
