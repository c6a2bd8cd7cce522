//! Environment mode detection.
//!
//! The mode is named by `NODE_ENV`. The process-wide mode is read once, on
//! first use, and drives behavior that must not vary per instance (debug log
//! suppression, stack inclusion in error envelopes).

use std::fmt;
use std::sync::OnceLock;

/// Name of the variable holding the environment mode.
pub const MODE_VAR: &str = "NODE_ENV";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Mode {
    Development,
    Production,
    Test,
    Other(String),
    /// `NODE_ENV` is not set.
    #[default]
    Unset,
}

impl Mode {
    pub fn parse(value: &str) -> Self {
        match value {
            "development" => Mode::Development,
            "production" => Mode::Production,
            "test" => Mode::Test,
            "" => Mode::Unset,
            other => Mode::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Mode::Development => "development",
            Mode::Production => "production",
            Mode::Test => "test",
            Mode::Other(name) => name,
            Mode::Unset => "",
        }
    }

    pub fn is_development(&self) -> bool {
        *self == Mode::Development
    }

    pub fn is_production(&self) -> bool {
        *self == Mode::Production
    }

    pub fn is_test(&self) -> bool {
        *self == Mode::Test
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

static CURRENT: OnceLock<Mode> = OnceLock::new();

/// Returns the process-wide mode, reading `NODE_ENV` on first call.
pub fn current() -> &'static Mode {
    CURRENT.get_or_init(|| {
        std::env::var(MODE_VAR)
            .map(|value| Mode::parse(&value))
            .unwrap_or_default()
    })
}
