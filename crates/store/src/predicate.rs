//! Attribute-equality predicates for live sub-collections.

use serde_json::Value as Json;
use voodoo_core::{Error, Object, Result, Value};

/// A conjunction of `key == value` clauses.
///
/// # Example
///
/// ```rust
/// use voodoo_store::Predicate;
///
/// let active = Predicate::from_json(&serde_json::json!({"is_done": false})).unwrap();
/// assert_eq!(active.keys().collect::<Vec<_>>(), vec!["is_done"]);
/// ```
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Predicate {
    clauses: Vec<(String, Value)>,
}

impl Predicate {
    /// Creates a predicate matching everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a `key == value` clause.
    pub fn where_eq(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.clauses.push((key.into(), value.into()));
        self
    }

    /// Parses `{"key": value, ...}`.
    pub fn from_json(json: &Json) -> Result<Self> {
        let map = json.as_object().ok_or_else(|| {
            Error::invalid_binding(json.to_string(), "predicate must be a JSON object")
        })?;
        let mut predicate = Self::new();
        for (key, raw) in map {
            if raw.is_array() || raw.is_object() {
                return Err(Error::invalid_binding(
                    json.to_string(),
                    format!("clause '{}' must be a primitive", key),
                ));
            }
            predicate = predicate.where_eq(key.as_str(), Value::from_json(raw));
        }
        Ok(predicate)
    }

    /// Returns the clauses.
    #[inline]
    pub fn clauses(&self) -> &[(String, Value)] {
        &self.clauses
    }

    /// Returns the keys the predicate reads.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.clauses.iter().map(|(k, _)| k.as_str())
    }

    /// Returns true if every clause holds on `object`.
    pub fn matches(&self, object: &dyn Object) -> bool {
        self.clauses
            .iter()
            .all(|(key, expected)| object.get(key).as_ref() == Some(expected))
    }
}
