//! Dot-separated property paths.
//!
//! A path such as `model.xhr.state` is resolved segment by segment against the
//! [`Object`] protocol. Every intermediate segment must hold an object; there
//! is no implicit creation of missing segments.

use crate::error::{Error, Result};
use crate::object::{Object, ObjectRef};
use crate::value::Value;
use std::fmt;
use std::str::FromStr;

/// A parsed, non-empty property path.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Path {
    segments: Vec<String>,
}

impl Path {
    /// Parses a dot-separated path.
    ///
    /// Segments may contain ASCII letters, digits, `_`, `-` and `$`.
    pub fn parse(source: &str) -> Result<Self> {
        let trimmed = source.trim();
        if trimmed.is_empty() {
            return Err(Error::path(source, ""));
        }
        let mut segments = Vec::new();
        for segment in trimmed.split('.') {
            let valid = !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '$'));
            if !valid {
                return Err(Error::path(source, segment));
            }
            segments.push(segment.to_string());
        }
        Ok(Self { segments })
    }

    /// Creates a single-segment path without validation.
    pub fn key(key: impl Into<String>) -> Self {
        Self {
            segments: vec![key.into()],
        }
    }

    /// Returns the segments.
    #[inline]
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Returns the number of segments.
    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }

    /// Always false: a parsed path has at least one segment.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns the first segment.
    pub fn head(&self) -> &str {
        self.segments.first().map(String::as_str).unwrap_or("")
    }

    /// Returns the last segment.
    pub fn leaf(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join("."))
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Path::parse(s)
    }
}

/// Walks every segment but the last and returns the object holding the leaf.
/// `None` means the leaf lives on `root` itself.
fn walk_to_parent(root: &dyn Object, path: &Path) -> Result<Option<ObjectRef>> {
    let parents = match path.segments.split_last() {
        Some((_, parents)) => parents,
        None => return Err(Error::path(path.to_string(), "")),
    };
    let mut holder: Option<ObjectRef> = None;
    for segment in parents {
        let target: &dyn Object = match &holder {
            Some(obj) => obj.as_ref(),
            None => root,
        };
        let next = match target.get(segment) {
            Some(Value::Object(obj)) => obj,
            _ => return Err(Error::path(path.to_string(), segment.as_str())),
        };
        holder = Some(next);
    }
    Ok(holder)
}

/// Resolves `path` against `root`.
pub fn resolve(root: &dyn Object, path: &Path) -> Result<Value> {
    let holder = walk_to_parent(root, path)?;
    let target: &dyn Object = match &holder {
        Some(obj) => obj.as_ref(),
        None => root,
    };
    target
        .get(path.leaf())
        .ok_or_else(|| Error::path(path.to_string(), path.leaf()))
}

/// Assigns `value` at `path` on `root`.
///
/// Returns whether the value changed.
pub fn assign(root: &dyn Object, path: &Path, value: Value) -> Result<bool> {
    let holder = walk_to_parent(root, path)?;
    let target: &dyn Object = match &holder {
        Some(obj) => obj.as_ref(),
        None => root,
    };
    target.set(path.leaf(), value)
}
