//! Route patterns.
//!
//! A pattern is a `/`-separated list of literal segments and `:name`
//! parameters, e.g. `/filter/:by`. Matching ignores a trailing slash, the
//! query string and the fragment.

use std::fmt;
use voodoo_core::{Error, Result};

/// Parameters captured by a match, in pattern order.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a parameter.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((name, value)),
        }
        self
    }

    /// Returns the value of a parameter.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Params {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        iter.into_iter()
            .fold(Params::new(), |params, (k, v)| params.with(k, v))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Param(String),
}

/// A parsed route pattern.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Pattern {
    source: String,
    segments: Vec<Segment>,
}

impl Pattern {
    /// Parses a pattern.
    ///
    /// Fails on an empty parameter name, a repeated parameter name or a `:`
    /// inside a literal segment.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        for part in split_location(source) {
            match part.strip_prefix(':') {
                Some(name) => {
                    if name.is_empty() || name.contains(':') {
                        return Err(Error::route(format!(
                            "malformed parameter in pattern '{}'",
                            source
                        )));
                    }
                    if segments.contains(&Segment::Param(name.to_string())) {
                        return Err(Error::route(format!(
                            "parameter '{}' repeated in pattern '{}'",
                            name, source
                        )));
                    }
                    segments.push(Segment::Param(name.to_string()));
                }
                None if part.contains(':') => {
                    return Err(Error::route(format!(
                        "unexpected ':' in pattern '{}'",
                        source
                    )));
                }
                None => segments.push(Segment::Literal(part.to_string())),
            }
        }
        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Returns the pattern as declared.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the parameter names in order.
    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Param(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    /// Matches a location, capturing parameters.
    pub fn matches(&self, location: &str) -> Option<Params> {
        let parts: Vec<&str> = split_location(location).collect();
        if parts.len() != self.segments.len() {
            return None;
        }
        let mut params = Params::new();
        for (segment, part) in self.segments.iter().zip(parts) {
            match segment {
                Segment::Literal(literal) if literal == part => {}
                Segment::Literal(_) => return None,
                Segment::Param(name) => params = params.with(name.as_str(), part),
            }
        }
        Some(params)
    }

    /// Builds a location from parameters.
    pub fn reverse(&self, params: &Params) -> Result<String> {
        let mut location = String::new();
        for segment in &self.segments {
            location.push('/');
            match segment {
                Segment::Literal(literal) => location.push_str(literal),
                Segment::Param(name) => {
                    let value = params.get(name).ok_or_else(|| {
                        Error::route(format!(
                            "missing parameter '{}' for pattern '{}'",
                            name, self.source
                        ))
                    })?;
                    if value.is_empty() || value.contains('/') {
                        return Err(Error::route(format!(
                            "invalid value '{}' for parameter '{}'",
                            value, name
                        )));
                    }
                    location.push_str(value);
                }
            }
        }
        if location.is_empty() {
            location.push('/');
        }
        Ok(location)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Splits a location into its non-empty path segments.
fn split_location(location: &str) -> impl Iterator<Item = &str> {
    let end = location.find(['?', '#']).unwrap_or(location.len());
    location[..end].split('/').filter(|part| !part.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_literal() {
        let home = Pattern::parse("/").unwrap();
        assert_eq!(home.matches("/"), Some(Params::new()));
        assert_eq!(home.matches(""), Some(Params::new()));
        assert_eq!(home.matches("/about"), None);

        let about = Pattern::parse("/about/us").unwrap();
        assert!(about.matches("/about/us/").is_some());
        assert!(about.matches("/about/us?tab=1#top").is_some());
        assert!(about.matches("/about").is_none());
    }

    #[test]
    fn test_pattern_params() {
        let filter = Pattern::parse("/filter/:by").unwrap();
        let params = filter.matches("/filter/active").unwrap();
        assert_eq!(params.get("by"), Some("active"));
        assert_eq!(params.len(), 1);
        assert!(filter.matches("/filter").is_none());
        assert!(filter.matches("/other/active").is_none());
        assert_eq!(filter.params().collect::<Vec<_>>(), vec!["by"]);
    }

    #[test]
    fn test_pattern_errors() {
        assert!(Pattern::parse("/filter/:").is_err());
        assert!(Pattern::parse("/a/:x/:x").is_err());
        assert!(Pattern::parse("/a:b").is_err());
    }

    #[test]
    fn test_pattern_reverse() {
        let filter = Pattern::parse("/filter/:by").unwrap();
        let params: Params = [("by", "done")].into_iter().collect();
        assert_eq!(filter.reverse(&params).unwrap(), "/filter/done");
        assert!(filter.reverse(&Params::new()).is_err());
        assert!(filter
            .reverse(&Params::new().with("by", "a/b"))
            .is_err());
        assert_eq!(Pattern::parse("/").unwrap().reverse(&Params::new()).unwrap(), "/");
    }
}
