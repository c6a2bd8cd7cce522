//! Data carried by an envelope.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};

/// Data that has an "empty" form, used when an envelope is built without data.
pub trait Payload: Sized {
    fn empty() -> Self;

    /// Replaces a falsy value by [`Payload::empty`]. Typed payloads have no
    /// falsy form and pass through.
    fn or_empty(self) -> Self {
        self
    }
}

impl Payload for Value {
    fn empty() -> Self {
        Value::Object(Map::new())
    }

    /// `null`, `false`, `0` and `""` become `{}`.
    fn or_empty(self) -> Self {
        let falsy = match &self {
            Value::Null => true,
            Value::Bool(b) => !b,
            Value::Number(n) => n.as_f64() == Some(0.0),
            Value::String(s) => s.is_empty(),
            Value::Array(_) | Value::Object(_) => false,
        };
        if falsy { Self::empty() } else { self }
    }
}

impl<T> Payload for Option<T> {
    fn empty() -> Self {
        None
    }
}

impl<T> Payload for Vec<T> {
    fn empty() -> Self {
        Vec::new()
    }
}

impl<K: Ord, V> Payload for BTreeMap<K, V> {
    fn empty() -> Self {
        BTreeMap::new()
    }
}

impl<K, V, S: Default> Payload for HashMap<K, V, S> {
    fn empty() -> Self {
        HashMap::default()
    }
}

impl Payload for Map<String, Value> {
    fn empty() -> Self {
        Map::new()
    }
}

impl Payload for String {
    fn empty() -> Self {
        String::new()
    }
}

impl Payload for () {
    fn empty() -> Self {}
}
