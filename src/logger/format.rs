//! Line formatting strategies.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use chrono::{SecondsFormat, Utc};
use serde_json::Value;

use super::{Level, LogContext};

/// Marker used for levels without a registered emoji.
pub const DEFAULT_MARKER: &str = "📝";

/// Turns a log record into a single output line.
pub trait Format: Send + Sync {
    fn format(
        &self,
        level: &Level,
        context: &LogContext,
        message: &str,
        meta: Option<&Value>,
    ) -> String;
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn context_suffix(context: &LogContext) -> String {
    if context.is_empty() {
        String::new()
    } else {
        format!(" {}", serde_json::to_string(context).unwrap_or_default())
    }
}

fn meta_suffix(meta: Option<&Value>) -> String {
    match meta {
        None | Some(Value::Null) => String::new(),
        Some(meta) => format!(" {}", serde_json::to_string(meta).unwrap_or_default()),
    }
}

/// `[timestamp] [LEVEL] {context} message {meta}`
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainFormat;

impl Format for PlainFormat {
    fn format(
        &self,
        level: &Level,
        context: &LogContext,
        message: &str,
        meta: Option<&Value>,
    ) -> String {
        format!(
            "[{}] [{}]{} {}{}",
            timestamp(),
            level.label(),
            context_suffix(context),
            message,
            meta_suffix(meta)
        )
    }
}

/// Options for the emoji-decorated format.
#[derive(Debug, Clone)]
pub struct EmojiOptions {
    /// Overrides for the default markers, keyed by level name.
    pub emojis: HashMap<String, String>,
    pub show_timestamp: bool,
    pub show_level: bool,
}

impl Default for EmojiOptions {
    fn default() -> Self {
        Self {
            emojis: HashMap::new(),
            show_timestamp: true,
            show_level: true,
        }
    }
}

impl EmojiOptions {
    pub fn emoji(mut self, level: &str, marker: &str) -> Self {
        self.emojis.insert(level.to_uppercase(), marker.to_string());
        self
    }

    pub fn show_timestamp(mut self, show: bool) -> Self {
        self.show_timestamp = show;
        self
    }

    pub fn show_level(mut self, show: bool) -> Self {
        self.show_level = show;
        self
    }
}

/// `marker [timestamp] [LEVEL] {context} message {meta}` with per-level markers.
#[derive(Debug)]
pub struct EmojiFormat {
    markers: RwLock<HashMap<String, String>>,
    show_timestamp: bool,
    show_level: bool,
}

impl Default for EmojiFormat {
    fn default() -> Self {
        Self::new(EmojiOptions::default())
    }
}

impl EmojiFormat {
    pub fn new(options: EmojiOptions) -> Self {
        let mut markers: HashMap<String, String> = [
            ("INFO", "ℹ️"),
            ("WARN", "⚠️"),
            ("ERROR", "❌"),
            ("DEBUG", "🐛"),
            ("SUCCESS", "✅"),
        ]
        .into_iter()
        .map(|(level, marker)| (level.to_string(), marker.to_string()))
        .collect();

        for (level, marker) in options.emojis {
            markers.insert(level.to_uppercase(), marker);
        }

        Self {
            markers: RwLock::new(markers),
            show_timestamp: options.show_timestamp,
            show_level: options.show_level,
        }
    }

    pub fn set_marker(&self, level: &str, marker: &str) {
        self.markers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(level.to_uppercase(), marker.to_string());
    }

    pub fn marker(&self, level: &str) -> Option<String> {
        self.markers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&level.to_uppercase())
            .cloned()
    }
}

impl Format for EmojiFormat {
    fn format(
        &self,
        level: &Level,
        context: &LogContext,
        message: &str,
        meta: Option<&Value>,
    ) -> String {
        let label = level.label();
        let mut parts = vec![
            self.marker(&label)
                .unwrap_or_else(|| DEFAULT_MARKER.to_string()),
        ];

        if self.show_timestamp {
            parts.push(format!("[{}]", timestamp()));
        }
        if self.show_level {
            parts.push(format!("[{}]", label));
        }

        format!(
            "{}{} {}{}",
            parts.join(" "),
            context_suffix(context),
            message,
            meta_suffix(meta)
        )
        .trim()
        .to_string()
    }
}
