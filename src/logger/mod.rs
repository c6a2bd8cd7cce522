//! Console loggers with context propagation.
//!
//! [`Logger`] is the capability set the rest of the crate logs through.
//! [`ConsoleLogger`] implements it on top of a [`Format`] strategy and a
//! [`LogSink`]: [`PlainFormat`] gives timestamped lines, [`EmojiFormat`]
//! prefixes each line with a per-level marker ([`EmojiLogger`]).
//!
//! Debug lines are emitted only when the process runs in development mode.

mod format;
mod sink;

use std::sync::Arc;

use serde_json::Value;

use crate::mode;

pub use format::{DEFAULT_MARKER, EmojiFormat, EmojiOptions, Format, PlainFormat};
pub use sink::{LogSink, MemorySink, StderrSink, StdioSink, Stream};

/// Key/value pairs attached to every line a logger emits.
pub type LogContext = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Level {
    Info,
    Warn,
    Error,
    Debug,
    Success,
    Custom(String),
}

impl Level {
    pub fn label(&self) -> String {
        match self {
            Level::Info => "INFO".to_string(),
            Level::Warn => "WARN".to_string(),
            Level::Error => "ERROR".to_string(),
            Level::Debug => "DEBUG".to_string(),
            Level::Success => "SUCCESS".to_string(),
            Level::Custom(name) => name.to_uppercase(),
        }
    }

    fn stream(&self) -> Stream {
        match self {
            Level::Warn | Level::Error => Stream::Stderr,
            _ => Stream::Stdout,
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Logger: Send + Sync {
    fn log(&self, level: &Level, message: &str, meta: Option<Value>);

    /// Derives a logger whose context is this logger's context overlaid with `context`.
    fn child(&self, context: LogContext) -> Arc<dyn Logger>;

    fn info(&self, message: &str, meta: Option<Value>) {
        self.log(&Level::Info, message, meta)
    }

    fn warn(&self, message: &str, meta: Option<Value>) {
        self.log(&Level::Warn, message, meta)
    }

    fn error(&self, message: &str, meta: Option<Value>) {
        self.log(&Level::Error, message, meta)
    }

    fn debug(&self, message: &str, meta: Option<Value>) {
        self.log(&Level::Debug, message, meta)
    }
}

/// Whether debug lines are emitted in `mode`.
pub fn debug_enabled(mode: &mode::Mode) -> bool {
    mode.is_development()
}

/// Shallow merge; keys of `overrides` win.
pub fn merge_context(parent: &LogContext, overrides: LogContext) -> LogContext {
    let mut merged = parent.clone();
    merged.extend(overrides);
    merged
}

/// Builds a context from a JSON object; any other value yields an empty context.
pub fn context(value: Value) -> LogContext {
    match value {
        Value::Object(map) => map,
        _ => LogContext::new(),
    }
}

pub struct ConsoleLogger<F = PlainFormat> {
    context: LogContext,
    format: Arc<F>,
    sink: Arc<dyn LogSink>,
}

pub type EmojiLogger = ConsoleLogger<EmojiFormat>;

impl ConsoleLogger<PlainFormat> {
    pub fn new(context: LogContext) -> Self {
        Self {
            context,
            format: Arc::new(PlainFormat),
            sink: Arc::new(StdioSink),
        }
    }
}

impl Default for ConsoleLogger<PlainFormat> {
    fn default() -> Self {
        Self::new(LogContext::new())
    }
}

impl<F: Format> ConsoleLogger<F> {
    /// Replaces the sink lines are written to.
    pub fn with_sink(mut self, sink: Arc<dyn LogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn context(&self) -> &LogContext {
        &self.context
    }

    /// Typed counterpart of [`Logger::child`]; the child shares format and sink.
    pub fn child_logger(&self, context: LogContext) -> Self {
        Self {
            context: merge_context(&self.context, context),
            format: Arc::clone(&self.format),
            sink: Arc::clone(&self.sink),
        }
    }

    fn emit(&self, level: &Level, message: &str, meta: Option<&Value>) {
        if *level == Level::Debug && !debug_enabled(mode::current()) {
            return;
        }
        let line = self.format.format(level, &self.context, message, meta);
        self.sink.write_line(level.stream(), &line);
    }
}

impl<F: Format + 'static> Logger for ConsoleLogger<F> {
    fn log(&self, level: &Level, message: &str, meta: Option<Value>) {
        self.emit(level, message, meta.as_ref());
    }

    fn child(&self, context: LogContext) -> Arc<dyn Logger> {
        Arc::new(self.child_logger(context))
    }
}

impl ConsoleLogger<EmojiFormat> {
    pub fn with_options(context: LogContext, options: EmojiOptions) -> Self {
        Self {
            context,
            format: Arc::new(EmojiFormat::new(options)),
            sink: Arc::new(StdioSink),
        }
    }

    /// Reassigns the marker for `level`. Children share the change.
    pub fn set_emoji(&self, level: &str, marker: &str) {
        self.format.set_marker(level, marker);
    }

    pub fn success(&self, message: &str, meta: Option<Value>) {
        self.emit(&Level::Success, message, meta.as_ref());
    }

    /// Logs under an arbitrary level name, registering the default marker for
    /// levels seen for the first time.
    pub fn log_custom(&self, level: &str, message: &str, meta: Option<Value>) {
        if self.format.marker(level).is_none() {
            self.set_emoji(level, DEFAULT_MARKER);
        }
        self.emit(&Level::Custom(level.to_string()), message, meta.as_ref());
    }
}

impl Default for ConsoleLogger<EmojiFormat> {
    fn default() -> Self {
        Self::with_options(LogContext::new(), EmojiOptions::default())
    }
}
