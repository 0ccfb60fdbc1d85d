//! Immutable request-scoped key/value context.

use envmodel_core::{ContextError, Error, Result, Value, value_from_json, value_to_json};
use serde::de::Deserializer;
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// An ordered, immutable key/value bag.
///
/// Every "modification" returns a new `Context`. The entries are shared
/// behind an `Arc` until a derivation writes to them, at which point the
/// derived context gets its own copy; the receiver is never touched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    entries: Arc<BTreeMap<String, Value>>,
}

impl Context {
    /// An empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of this context with `key` set to `value`.
    #[must_use]
    pub fn with_key(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        Arc::make_mut(&mut next.entries).insert(key.into(), value.into());
        next
    }

    /// A copy of this context without `key`.
    #[must_use]
    pub fn without_key(&self, key: &str) -> Self {
        if !self.has_key(key) {
            return self.clone();
        }
        let mut next = self.clone();
        Arc::make_mut(&mut next.entries).remove(key);
        next
    }

    /// Merge two contexts. Keys of `overrides` win.
    #[must_use]
    pub fn merge(&self, overrides: &Context) -> Self {
        if overrides.is_empty() {
            return self.clone();
        }
        let mut next = self.clone();
        let entries = Arc::make_mut(&mut next.entries);
        for (k, v) in overrides.entries.iter() {
            entries.insert(k.clone(), v.clone());
        }
        next
    }

    pub fn has_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// The value stored under `key`.
    pub fn get(&self, key: &str) -> Result<&Value> {
        self.entries
            .get(key)
            .ok_or_else(|| Error::Context(ContextError::not_found(key)))
    }

    pub fn get_string(&self, key: &str) -> Result<String> {
        match self.get(key)? {
            Value::Text(s) => Ok(s.clone()),
            other => Err(mismatch(key, "TEXT", other)),
        }
    }

    pub fn get_i64(&self, key: &str) -> Result<i64> {
        match self.get(key)? {
            Value::Int(v) => Ok(i64::from(*v)),
            Value::BigInt(v) => Ok(*v),
            other => Err(mismatch(key, "BIGINT", other)),
        }
    }

    /// Integers are widened to floating point.
    pub fn get_f64(&self, key: &str) -> Result<f64> {
        let value = self.get(key)?;
        value.as_f64().ok_or_else(|| mismatch(key, "DOUBLE", value))
    }

    pub fn get_bool(&self, key: &str) -> Result<bool> {
        match self.get(key)? {
            Value::Bool(b) => Ok(*b),
            other => Err(mismatch(key, "BOOLEAN", other)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Build a context from a JSON object. Anything else yields an error.
    pub fn from_json(json: serde_json::Value) -> Result<Self> {
        match json {
            serde_json::Value::Object(map) => Ok(map
                .into_iter()
                .map(|(k, v)| (k, value_from_json(v)))
                .collect()),
            other => Err(Error::Custom(format!(
                "context must be a JSON object, got {other}"
            ))),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Object(
            self.entries
                .iter()
                .map(|(k, v)| (k.clone(), value_to_json(v)))
                .collect(),
        )
    }
}

fn mismatch(key: &str, expected: &str, actual: &Value) -> Error {
    Error::Context(ContextError::type_mismatch(key, expected, actual.type_name()))
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: Arc::new(
                iter.into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

impl Serialize for Context {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in self.entries.iter() {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Context {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let entries = BTreeMap::<String, Value>::deserialize(deserializer)?;
        Ok(Self {
            entries: Arc::new(entries),
        })
    }
}
