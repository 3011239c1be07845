//! # Console Logging
//!
//! `log` backend for the firmware. Records are formatted one line at a time
//! and handed to a [`ConsoleSink`] provided by the board (UART, HTIF, ...).
//!
//! Nothing is allocated: lines are assembled in a stack buffer and flushed
//! to the sink whenever it fills up.

use core::fmt::{self, Write};

use log::{Level, LevelFilter, Log, Metadata, Record};
use spin::Once;

use crate::error::{Result, SbiError};

/// Line-oriented output device
pub trait ConsoleSink: Sync {
    /// Emit a piece of text
    fn write_str(&self, s: &str);
}

static SINK: Once<&'static dyn ConsoleSink> = Once::new();

static LOGGER: ConsoleLogger = ConsoleLogger;

/// `log::Log` implementation writing to the installed sink
#[derive(Debug)]
pub struct ConsoleLogger;

impl Log for ConsoleLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = SINK.get() {
            let mut line = LineWriter::new(*sink);
            let _ = write_record(&mut line, record.level(), record.target(), record.args());
            line.flush();
        }
    }

    fn flush(&self) {}
}

/// Install `sink` as the log backend
///
/// Fails with [`SbiError::AlreadyAvailable`] if a logger is already set.
pub fn init(sink: &'static dyn ConsoleSink, level: LevelFilter) -> Result<()> {
    if SINK.is_completed() {
        return Err(SbiError::AlreadyAvailable);
    }
    SINK.call_once(|| sink);
    log::set_logger(&LOGGER).map_err(|_| SbiError::AlreadyAvailable)?;
    log::set_max_level(level);
    Ok(())
}

/// Format one record as `[LEVEL] target: message\n`
pub fn write_record<W: Write>(
    out: &mut W,
    level: Level,
    target: &str,
    args: &fmt::Arguments<'_>,
) -> fmt::Result {
    writeln!(out, "[{:<5}] {}: {}", level, target, args)
}

// ============================================================================
// Line Buffer
// ============================================================================

const LINE_SIZE: usize = 128;

/// Stack buffer in front of a sink
struct LineWriter<'a> {
    sink: &'a dyn ConsoleSink,
    buf: [u8; LINE_SIZE],
    len: usize,
}

impl<'a> LineWriter<'a> {
    fn new(sink: &'a dyn ConsoleSink) -> Self {
        Self {
            sink,
            buf: [0; LINE_SIZE],
            len: 0,
        }
    }

    fn flush(&mut self) {
        if self.len == 0 {
            return;
        }
        // Only whole `&str` pieces are ever copied in
        if let Ok(s) = core::str::from_utf8(&self.buf[..self.len]) {
            self.sink.write_str(s);
        }
        self.len = 0;
    }
}

impl Write for LineWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if s.len() > LINE_SIZE {
            self.flush();
            self.sink.write_str(s);
            return Ok(());
        }
        if self.len + s.len() > LINE_SIZE {
            self.flush();
        }
        self.buf[self.len..self.len + s.len()].copy_from_slice(s.as_bytes());
        self.len += s.len();
        Ok(())
    }
}

/// Per-thread log capture for unit tests
#[cfg(test)]
pub(crate) mod capture {
    use std::cell::RefCell;
    use std::string::String;

    use super::{init, ConsoleSink};

    std::thread_local! {
        static LINES: RefCell<String> = RefCell::new(String::new());
    }

    struct ThreadSink;

    impl ConsoleSink for ThreadSink {
        fn write_str(&self, s: &str) {
            LINES.with(|lines| lines.borrow_mut().push_str(s));
        }
    }

    static THREAD_SINK: ThreadSink = ThreadSink;

    /// Run `f` and return everything it logged on this thread
    pub fn logs_of<F: FnOnce()>(f: F) -> String {
        // Every test installs the same sink, only the first call wins
        let _ = init(&THREAD_SINK, log::LevelFilter::Trace);
        log::set_max_level(log::LevelFilter::Trace);
        LINES.with(|lines| lines.borrow_mut().clear());
        f();
        LINES.with(|lines| lines.take())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::string::String;
    use std::sync::Mutex;

    struct Capture(Mutex<String>);

    impl ConsoleSink for Capture {
        fn write_str(&self, s: &str) {
            self.0.lock().unwrap().push_str(s);
        }
    }

    #[test]
    fn test_record_format() {
        let mut out = String::new();
        write_record(&mut out, Level::Warn, "helix_sbi_hal::pmp", &format_args!("region {} skipped", 2))
            .unwrap();
        assert_eq!(out, "[WARN ] helix_sbi_hal::pmp: region 2 skipped\n");
    }

    #[test]
    fn test_line_writer_splits_long_output() {
        let capture = Capture(Mutex::new(String::new()));
        let long = "x".repeat(LINE_SIZE * 2 + 3);
        {
            let mut line = LineWriter::new(&capture);
            write!(line, "[INFO ] t: ").unwrap();
            line.write_str(&long).unwrap();
            writeln!(line, "{}", 42).unwrap();
            line.flush();
        }
        let text = capture.0.lock().unwrap().clone();
        assert_eq!(text, format!("[INFO ] t: {}42\n", long));
    }

    #[test]
    fn test_logger_emits_lines() {
        let text = capture::logs_of(|| {
            log::warn!(target: "pmp", "region {} skipped", 3);
            log::info!(target: "deleg", "MIDELEG: {:#x}", 0x222);
        });
        assert_eq!(text, "[WARN ] pmp: region 3 skipped\n[INFO ] deleg: MIDELEG: 0x222\n");
    }

    #[test]
    fn test_init_only_once() {
        let _ = capture::logs_of(|| {});
        static OTHER: Capture = Capture(Mutex::new(String::new()));
        assert_eq!(init(&OTHER, LevelFilter::Info), Err(SbiError::AlreadyAvailable));
        log::error!("after second init");
        assert!(OTHER.0.lock().unwrap().is_empty());
    }
}
