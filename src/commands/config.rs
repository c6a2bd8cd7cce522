use anyhow::Result;
use log::debug;
use serde_json::{Map, Value};

use crate::{
    config::{Config, ConfigOptions},
    logger::Logger,
    runtime::Runtime,
};

const MASK: &str = "********";
const SENSITIVE_MARKERS: [&str; 3] = ["SECRET", "PASSWORD", "TOKEN"];

/// Whether the value of `key` must not be printed.
pub fn is_sensitive(key: &str) -> bool {
    let key = key.to_uppercase();
    SENSITIVE_MARKERS.iter().any(|marker| key.contains(marker))
}

/// Load the configuration and print it with sensitive values masked.
#[tracing::instrument(skip(runtime, logger))]
pub fn config<R: Runtime + ?Sized>(
    runtime: &R,
    logger: &dyn Logger,
    options: &ConfigOptions,
    json: bool,
) -> Result<()> {
    let config = Config::load(runtime, logger, options)?;
    debug!("Loaded {} configuration value(s)", config.get_all().len());

    print!("{}", render_config(&config, json)?);
    Ok(())
}

/// Renders `KEY=value` lines, or a pretty JSON object when `json` is set.
pub fn render_config(config: &Config, json: bool) -> Result<String> {
    if json {
        let mut object = Map::new();
        for (key, value) in config.get_all() {
            let value = if is_sensitive(key) {
                Value::String(MASK.to_string())
            } else {
                serde_json::to_value(value)?
            };
            object.insert(key.clone(), value);
        }
        let mut rendered = serde_json::to_string_pretty(&Value::Object(object))?;
        rendered.push('\n');
        return Ok(rendered);
    }

    let mut rendered = String::new();
    for (key, value) in config.get_all() {
        if is_sensitive(key) {
            rendered.push_str(&format!("{}={}\n", key, MASK));
        } else {
            rendered.push_str(&format!("{}={}\n", key, value));
        }
    }
    Ok(rendered)
}
