//! `log` backend for the signal core
//!
//! Records are kept in a fixed buffer until the platform attaches its
//! console sink; attaching flushes the buffer and later records go to the
//! sink directly. Nothing here allocates, and every lock is taken with
//! `try_lock` so logging from interrupt context cannot deadlock.

use conquer_once::spin::OnceCell;
use core::fmt::{self, Write};
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};
use spin::Mutex;

const BUFFER_SIZE: usize = 8192;

/// Console the platform hands to the logger (usually the serial port)
pub trait LogSink: Sync {
    fn write_str(&self, s: &str);
}

/// Buffer for records logged before a sink is attached
struct LogBuffer {
    buffer: [u8; BUFFER_SIZE],
    position: usize,
    dropped: usize,
}

impl LogBuffer {
    const fn new() -> Self {
        Self {
            buffer: [0; BUFFER_SIZE],
            position: 0,
            dropped: 0,
        }
    }

    fn contents(&self) -> &str {
        core::str::from_utf8(&self.buffer[..self.position]).unwrap_or("<invalid UTF-8>")
    }

    fn clear(&mut self) {
        self.position = 0;
        self.dropped = 0;
    }
}

impl Write for LogBuffer {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let bytes = s.as_bytes();
        let remaining = BUFFER_SIZE - self.position;

        if bytes.len() > remaining {
            // Full: keep the oldest records, count what is lost
            self.dropped += 1;
            return Ok(());
        }

        self.buffer[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }
}

struct SinkWriter<'a>(&'a dyn LogSink);

impl Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

pub struct KernelLogger {
    buffer: Mutex<LogBuffer>,
    sink: OnceCell<&'static dyn LogSink>,
}

impl KernelLogger {
    pub const fn new() -> Self {
        KernelLogger {
            buffer: Mutex::new(LogBuffer::new()),
            sink: OnceCell::uninit(),
        }
    }

    /// Attach the console and flush everything buffered so far
    ///
    /// Only the first sink is kept; returns false if one was already attached.
    pub fn attach(&self, sink: &'static dyn LogSink) -> bool {
        if self.sink.try_init_once(|| sink).is_err() {
            return false;
        }

        let mut buffer = self.buffer.lock();
        if buffer.position > 0 {
            sink.write_str("=== Buffered Signal Log ===\n");
            sink.write_str(buffer.contents());
            if buffer.dropped > 0 {
                let _ = write!(
                    SinkWriter(sink),
                    "({} records dropped)\n",
                    buffer.dropped
                );
            }
            sink.write_str("=== End Buffered Log ===\n");
        }
        buffer.clear();
        true
    }

    #[cfg(test)]
    fn buffered(&self) -> usize {
        self.buffer.lock().position
    }
}

impl Default for KernelLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl Log for KernelLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match self.sink.try_get().ok() {
            Some(sink) => {
                let _ = write!(
                    SinkWriter(*sink),
                    "[{:>5}] {}: {}\n",
                    record.level(),
                    record.target(),
                    record.args()
                );
            }
            None => {
                // Use try_lock so a record from interrupt context is dropped
                // rather than spinning on a lock this CPU already holds
                if let Some(mut buffer) = self.buffer.try_lock() {
                    let _ = write!(
                        &mut *buffer,
                        "[{:>5}] {}: {}\n",
                        record.level(),
                        record.target(),
                        record.args()
                    );
                }
            }
        }
    }

    fn flush(&self) {}
}

pub static LOGGER: KernelLogger = KernelLogger::new();

/// Install [`LOGGER`] as the `log` backend
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);
    Ok(())
}

/// Hand the platform console to [`LOGGER`]
pub fn attach_sink(sink: &'static dyn LogSink) -> bool {
    LOGGER.attach(sink)
}
