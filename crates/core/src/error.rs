//! Error types for the Voodoo engine.

use std::fmt;

/// Result type alias for Voodoo operations.
pub type Result<T> = core::result::Result<T, Error>;

/// Error types for binding, collection and routing operations.
///
/// Network failures are not represented here: they are recorded in the
/// `status` of the model or store that issued the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// A path references an undeclared key or walks through a segment that
    /// does not hold an object.
    Path {
        path: String,
        segment: String,
    },
    /// Malformed `{{ path }}` template or class-name template.
    Template {
        template: String,
        message: String,
    },
    /// An area selector matched nothing inside the view's root element.
    RegionNotFound {
        view: String,
        selector: String,
    },
    /// A binding expression cannot be wired the way it was declared.
    InvalidBinding {
        expr: String,
        message: String,
    },
    /// The entity was destroyed and cannot be used any more.
    Destroyed {
        entity: String,
    },
    /// A fetch or save was requested without a resource or data source.
    NoDataSource {
        entity: String,
    },
    /// The executor refused to run a future.
    Spawn {
        message: String,
    },
    /// Malformed route pattern or unknown route name.
    Route {
        message: String,
    },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Path { path, segment } => {
                write!(f, "Path error: '{}' is not declared (in '{}')", segment, path)
            }
            Error::Template { template, message } => {
                write!(f, "Template error in '{}': {}", template, message)
            }
            Error::RegionNotFound { view, selector } => {
                write!(f, "Region '{}' not found in view {}", selector, view)
            }
            Error::InvalidBinding { expr, message } => {
                write!(f, "Invalid binding '{}': {}", expr, message)
            }
            Error::Destroyed { entity } => {
                write!(f, "{} has been destroyed", entity)
            }
            Error::NoDataSource { entity } => {
                write!(f, "{} has no data source or resource", entity)
            }
            Error::Spawn { message } => {
                write!(f, "Spawn error: {}", message)
            }
            Error::Route { message } => {
                write!(f, "Route error: {}", message)
            }
        }
    }
}

impl std::error::Error for Error {}

impl Error {
    /// Creates a path error.
    pub fn path(path: impl Into<String>, segment: impl Into<String>) -> Self {
        Error::Path {
            path: path.into(),
            segment: segment.into(),
        }
    }

    /// Creates a template error.
    pub fn template(template: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Template {
            template: template.into(),
            message: message.into(),
        }
    }

    /// Creates a region not found error.
    pub fn region_not_found(view: impl Into<String>, selector: impl Into<String>) -> Self {
        Error::RegionNotFound {
            view: view.into(),
            selector: selector.into(),
        }
    }

    /// Creates an invalid binding error.
    pub fn invalid_binding(expr: impl Into<String>, message: impl Into<String>) -> Self {
        Error::InvalidBinding {
            expr: expr.into(),
            message: message.into(),
        }
    }

    /// Creates a destroyed error.
    pub fn destroyed(entity: impl Into<String>) -> Self {
        Error::Destroyed {
            entity: entity.into(),
        }
    }

    /// Creates a missing data source error.
    pub fn no_data_source(entity: impl Into<String>) -> Self {
        Error::NoDataSource {
            entity: entity.into(),
        }
    }

    /// Creates a spawn error.
    pub fn spawn(message: impl Into<String>) -> Self {
        Error::Spawn {
            message: message.into(),
        }
    }

    /// Creates a route error.
    pub fn route(message: impl Into<String>) -> Self {
        Error::Route {
            message: message.into(),
        }
    }

    /// Returns true if this is a path error.
    pub fn is_path_error(&self) -> bool {
        matches!(self, Error::Path { .. })
    }
}
