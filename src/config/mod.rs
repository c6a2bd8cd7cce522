//! Environment configuration.
//!
//! A [`Config`] is loaded once at startup with [`Config::load`] and shared by
//! handle ([`SharedConfig`]). Loading merges option defaults, an optional
//! `.env` file and the process environment, then applies typed defaults and
//! checks required keys.
//!
//! When `NODE_ENV=test` no file is read: a fixed set of placeholder values is
//! seeded instead and overlaid with the process environment.

mod value;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use log::debug;
use serde_json::json;

use crate::logger::Logger;
use crate::mode::Mode;
use crate::runtime::Runtime;

pub use value::ConfigValue;

/// Keys the loader knows about.
pub mod keys {
    pub const NODE_ENV: &str = "NODE_ENV";
    pub const PORT: &str = "PORT";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const API_PREFIX: &str = "API_PREFIX";
    pub const JWT_SECRET: &str = "JWT_SECRET";
    pub const JWT_EXPIRES_IN: &str = "JWT_EXPIRES_IN";
    pub const DB_HOST: &str = "DB_HOST";
    pub const DB_PORT: &str = "DB_PORT";
    pub const DB_NAME: &str = "DB_NAME";
    pub const DB_USER: &str = "DB_USER";
    pub const DB_PASSWORD: &str = "DB_PASSWORD";
}

/// Keys that must be present outside test mode.
pub const REQUIRED_KEYS: [&str; 4] = [
    keys::JWT_SECRET,
    keys::DB_NAME,
    keys::DB_USER,
    keys::DB_PASSWORD,
];

#[derive(Debug)]
pub enum ConfigError {
    MissingConfiguration { key: String },
    DotEnv { path: PathBuf, source: dotenvy::Error },
}

impl ConfigError {
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::MissingConfiguration { .. } => "MISSING_CONFIGURATION",
            ConfigError::DotEnv { .. } => "INVALID_DOTENV",
        }
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::MissingConfiguration { key } => {
                write!(f, "Required configuration key '{}' is not set", key)
            }
            ConfigError::DotEnv { path, source } => {
                write!(f, "Failed to parse {}: {}", path.display(), source)
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::DotEnv { source, .. } => Some(source),
            ConfigError::MissingConfiguration { .. } => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigOptions {
    /// `.env` file to read; defaults to `.env` in the current directory.
    pub env_path: Option<PathBuf>,
    pub load_dot_env: bool,
    /// Lowest-precedence values.
    pub defaults: BTreeMap<String, String>,
}

impl Default for ConfigOptions {
    fn default() -> Self {
        Self {
            env_path: None,
            load_dot_env: true,
            defaults: BTreeMap::new(),
        }
    }
}

pub type SharedConfig = Arc<Config>;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    values: BTreeMap<String, ConfigValue>,
}

fn test_placeholders() -> BTreeMap<String, ConfigValue> {
    [
        (keys::NODE_ENV, ConfigValue::from("test")),
        (keys::PORT, ConfigValue::from(3000i64)),
        (keys::LOG_LEVEL, ConfigValue::from("info")),
        (keys::API_PREFIX, ConfigValue::from("/api")),
        (keys::JWT_SECRET, ConfigValue::from("test-secret-key")),
        (keys::JWT_EXPIRES_IN, ConfigValue::from("1d")),
        (keys::DB_HOST, ConfigValue::from("localhost")),
        (keys::DB_PORT, ConfigValue::from(5432i64)),
        (keys::DB_NAME, ConfigValue::from("test_db")),
        (keys::DB_USER, ConfigValue::from("test_user")),
        (keys::DB_PASSWORD, ConfigValue::from("test_password")),
    ]
    .into_iter()
    .map(|(key, value)| (key.to_string(), value))
    .collect()
}

#[tracing::instrument(skip(runtime))]
fn read_dot_env<R: Runtime + ?Sized>(runtime: &R, path: &Path) -> Result<Vec<(String, String)>> {
    if !runtime.exists(path) {
        debug!("No .env file at {}, skipping", path.display());
        return Ok(Vec::new());
    }

    let content = runtime.read_to_string(path)?;
    let entries = dotenvy::from_read_iter(content.as_bytes())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| ConfigError::DotEnv {
            path: path.to_path_buf(),
            source,
        })?;

    debug!("Loaded {} entries from {}", entries.len(), path.display());
    Ok(entries)
}

fn default_string(values: &mut BTreeMap<String, ConfigValue>, key: &str, default: &str) {
    let missing = match values.get(key) {
        None => true,
        Some(value) => value.as_str() == Some(""),
    };
    if missing {
        values.insert(key.to_string(), ConfigValue::from(default));
    }
}

fn default_number(values: &mut BTreeMap<String, ConfigValue>, key: &str, default: f64) {
    let number = values
        .get(key)
        .and_then(ConfigValue::to_number)
        .unwrap_or(default);
    values.insert(key.to_string(), ConfigValue::Number(number));
}

impl Config {
    pub fn from_values<K, V>(values: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<ConfigValue>,
    {
        Self {
            values: values
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Loads configuration from the environment seen through `runtime`.
    ///
    /// Fails with [`ConfigError::MissingConfiguration`] when a required key
    /// is absent outside test mode.
    #[tracing::instrument(skip(runtime, logger))]
    pub fn load<R: Runtime + ?Sized>(
        runtime: &R,
        logger: &dyn Logger,
        options: &ConfigOptions,
    ) -> Result<Self> {
        let test_mode = runtime
            .env_var(keys::NODE_ENV)
            .is_ok_and(|value| value == "test");
        let env: BTreeMap<String, String> = runtime.env_vars().into_iter().collect();

        if test_mode {
            debug!("Test mode, seeding placeholder configuration");
            let mut values = test_placeholders();
            values.extend(env.into_iter().map(|(k, v)| (k, ConfigValue::Str(v))));
            return Ok(Self { values });
        }

        let mut raw = options.defaults.clone();
        if options.load_dot_env {
            let path = match &options.env_path {
                Some(path) => path.clone(),
                None => runtime.current_dir()?.join(".env"),
            };
            raw.extend(read_dot_env(runtime, &path)?);
        }
        // The process environment wins over the file.
        raw.extend(env);

        let mut values: BTreeMap<String, ConfigValue> = raw
            .into_iter()
            .map(|(k, v)| (k, ConfigValue::Str(v)))
            .collect();

        default_string(&mut values, keys::NODE_ENV, "development");
        default_number(&mut values, keys::PORT, 3000.0);
        default_string(&mut values, keys::LOG_LEVEL, "info");
        default_string(&mut values, keys::API_PREFIX, "/api");
        default_string(&mut values, keys::JWT_EXPIRES_IN, "1d");
        default_string(&mut values, keys::DB_HOST, "localhost");
        default_number(&mut values, keys::DB_PORT, 5432.0);

        let config = Self { values };
        for key in REQUIRED_KEYS {
            config.get_required(key)?;
        }

        logger.info(
            "Environment configuration loaded",
            Some(json!({
                "environment": config.mode().as_str(),
                "port": config.get(keys::PORT),
            })),
        );

        Ok(config)
    }

    pub fn get(&self, key: &str) -> Option<&ConfigValue> {
        self.values.get(key)
    }

    pub fn get_or(&self, key: &str, default: impl Into<ConfigValue>) -> ConfigValue {
        self.get(key).cloned().unwrap_or_else(|| default.into())
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(ConfigValue::as_str)
    }

    pub fn get_required(&self, key: &str) -> Result<&ConfigValue, ConfigError> {
        self.get(key).ok_or_else(|| ConfigError::MissingConfiguration {
            key: key.to_string(),
        })
    }

    /// Like [`Config::get_required`], but in test mode a missing key yields
    /// `test_default` instead of an error.
    pub fn get_required_or(
        &self,
        key: &str,
        test_default: impl Into<ConfigValue>,
    ) -> Result<ConfigValue, ConfigError> {
        match self.get_required(key) {
            Ok(value) => Ok(value.clone()),
            Err(_) if self.is_test() => Ok(test_default.into()),
            Err(e) => Err(e),
        }
    }

    pub fn get_number(&self, key: &str, default: f64) -> f64 {
        self.get(key)
            .and_then(ConfigValue::to_number)
            .unwrap_or(default)
    }

    pub fn get_boolean(&self, key: &str, default: bool) -> bool {
        self.get(key).map(ConfigValue::to_bool).unwrap_or(default)
    }

    pub fn get_all(&self) -> &BTreeMap<String, ConfigValue> {
        &self.values
    }

    pub fn mode(&self) -> Mode {
        self.get_str(keys::NODE_ENV)
            .map(Mode::parse)
            .unwrap_or_default()
    }

    pub fn is_production(&self) -> bool {
        self.mode().is_production()
    }

    pub fn is_development(&self) -> bool {
        self.mode().is_development()
    }

    pub fn is_test(&self) -> bool {
        self.mode().is_test()
    }
}
