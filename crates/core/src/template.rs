//! Template strings and binding expressions.
//!
//! A template such as `has-error-{{ model.status }}` is parsed into literal
//! segments and placeholder paths. The parser knows nothing about views or
//! bindings; it only produces the dependency list and renders text.

use crate::error::{Error, Result};
use crate::path::Path;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// A piece of a parsed template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// Literal text copied as is.
    Literal(String),
    /// A `{{ path }}` placeholder.
    Path(Path),
}

/// A parsed template string.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Template {
    source: String,
    segments: Vec<Segment>,
}

impl Template {
    /// Parses a template string.
    pub fn parse(source: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut rest = source;

        while let Some(start) = rest.find(OPEN) {
            if start > 0 {
                segments.push(Segment::Literal(rest[..start].to_string()));
            }
            let after_open = &rest[start + OPEN.len()..];
            let end = after_open
                .find(CLOSE)
                .ok_or_else(|| Error::template(source, "unterminated placeholder"))?;
            let inner = &after_open[..end];
            if inner.contains(OPEN) {
                return Err(Error::template(source, "nested placeholder"));
            }
            let path = Path::parse(inner)
                .map_err(|_| Error::template(source, format!("invalid path '{}'", inner.trim())))?;
            segments.push(Segment::Path(path));
            rest = &after_open[end + CLOSE.len()..];
        }
        if !rest.is_empty() {
            segments.push(Segment::Literal(rest.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            segments,
        })
    }

    /// Returns true if `source` contains at least one placeholder opener.
    #[inline]
    pub fn is_template(source: &str) -> bool {
        source.contains(OPEN)
    }

    /// Returns the original source text.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the parsed segments.
    #[inline]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Returns the placeholder paths in order of appearance.
    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Path(p) => Some(p),
            Segment::Literal(_) => None,
        })
    }

    /// Returns true if the template has no placeholders.
    pub fn is_static(&self) -> bool {
        self.paths().next().is_none()
    }

    /// Renders the template, looking each placeholder up with `lookup`.
    pub fn render<F>(&self, mut lookup: F) -> String
    where
        F: FnMut(&Path) -> String,
    {
        let mut out = String::with_capacity(self.source.len());
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Path(path) => out.push_str(&lookup(path)),
            }
        }
        out
    }
}

/// A binding expression: either a bare path or a template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Expression {
    Path(Path),
    Template(Template),
}

impl Expression {
    /// Parses an expression. Anything containing `{{` is a template.
    pub fn parse(source: &str) -> Result<Self> {
        if Template::is_template(source) {
            Template::parse(source).map(Expression::Template)
        } else {
            Path::parse(source).map(Expression::Path)
        }
    }

    /// Returns the dependency paths of this expression.
    pub fn dependencies(&self) -> Vec<Path> {
        match self {
            Expression::Path(path) => vec![path.clone()],
            Expression::Template(template) => template.paths().cloned().collect(),
        }
    }

    /// Returns true for template expressions.
    #[inline]
    pub fn is_template(&self) -> bool {
        matches!(self, Expression::Template(_))
    }
}
