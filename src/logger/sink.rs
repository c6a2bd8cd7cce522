//! Line sinks the console loggers write to.

use std::io::Write;
use std::sync::{Mutex, PoisonError};

/// Console stream a line is written to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    Stdout,
    Stderr,
}

pub trait LogSink: Send + Sync {
    fn write_line(&self, stream: Stream, line: &str);
}

/// Writes to the process stdout/stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdioSink;

impl LogSink for StdioSink {
    fn write_line(&self, stream: Stream, line: &str) {
        // A closed console must not bring the caller down.
        let _ = match stream {
            Stream::Stdout => writeln!(std::io::stdout().lock(), "{}", line),
            Stream::Stderr => writeln!(std::io::stderr().lock(), "{}", line),
        };
    }
}

/// Writes every line to stderr, keeping stdout free for program output.
#[derive(Debug, Default, Clone, Copy)]
pub struct StderrSink;

impl LogSink for StderrSink {
    fn write_line(&self, _stream: Stream, line: &str) {
        let _ = writeln!(std::io::stderr().lock(), "{}", line);
    }
}

/// Keeps every line in memory. Useful in tests and when embedding the logger.
#[derive(Debug, Default)]
pub struct MemorySink {
    entries: Mutex<Vec<(Stream, String)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<(Stream, String)> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn lines(&self) -> Vec<String> {
        self.entries().into_iter().map(|(_, line)| line).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}

impl LogSink for MemorySink {
    fn write_line(&self, stream: Stream, line: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((stream, line.to_string()));
    }
}
