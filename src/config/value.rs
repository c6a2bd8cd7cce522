//! Configuration values.

use std::fmt;

use serde::{Deserialize, Serialize, Serializer};

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Number(f64),
    Str(String),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric reading; strings are parsed after trimming.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            ConfigValue::Number(n) => Some(*n),
            ConfigValue::Str(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            ConfigValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        }
    }

    /// Boolean reading; a string is true only when it lower-cases to `true`.
    pub fn to_bool(&self) -> bool {
        match self {
            ConfigValue::Bool(b) => *b,
            ConfigValue::Str(s) => s.to_lowercase() == "true",
            ConfigValue::Number(n) => *n != 0.0,
        }
    }
}

/// Whole numbers serialize as JSON integers.
impl Serialize for ConfigValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ConfigValue::Bool(b) => serializer.serialize_bool(*b),
            ConfigValue::Number(n) if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 => {
                serializer.serialize_i64(*n as i64)
            }
            ConfigValue::Number(n) => serializer.serialize_f64(*n),
            ConfigValue::Str(s) => serializer.serialize_str(s),
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Bool(b) => write!(f, "{}", b),
            ConfigValue::Number(n) => write!(f, "{}", n),
            ConfigValue::Str(s) => f.write_str(s),
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::Str(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::Str(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Number(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Number(value as f64)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_coercion() {
        assert_eq!(ConfigValue::from(" 8080 ").to_number(), Some(8080.0));
        assert_eq!(ConfigValue::from("1.5").to_number(), Some(1.5));
        assert_eq!(ConfigValue::from("abc").to_number(), None);
        assert_eq!(ConfigValue::from("NaN").to_number(), None);
        assert_eq!(ConfigValue::from(true).to_number(), Some(1.0));
    }

    #[test]
    fn test_bool_coercion() {
        assert!(ConfigValue::from("TRUE").to_bool());
        assert!(!ConfigValue::from("yes").to_bool());
        assert!(!ConfigValue::from("1").to_bool());
        assert!(ConfigValue::from(1i64).to_bool());
    }

    #[test]
    fn test_display_numbers_without_fraction() {
        assert_eq!(ConfigValue::from(3000i64).to_string(), "3000");
        assert_eq!(ConfigValue::from(0.5).to_string(), "0.5");
    }

    #[test]
    fn test_serializes_untagged() {
        assert_eq!(serde_json::to_string(&ConfigValue::from(5432i64)).unwrap(), "5432");
        assert_eq!(serde_json::to_string(&ConfigValue::from(0.5)).unwrap(), "0.5");
        assert_eq!(serde_json::to_string(&ConfigValue::from("x")).unwrap(), "\"x\"");
    }
}
