//! Voodoo Core - shared vocabulary for the Voodoo binding engine.
//!
//! This crate provides the types every other Voodoo crate speaks:
//!
//! - `Value`: property values (primitives compare by value, objects by identity)
//! - `Object` / `Collection`: the protocol paths are resolved against
//! - `Path`: dot-separated property paths with `resolve`/`assign`
//! - `Template` / `Expression`: `{{ path }}` templates and binding expressions
//! - `Delta` / `Member`: collection membership changes
//! - `Error`: error types for engine operations
//!
//! # Example
//!
//! ```rust
//! use voodoo_core::{Expression, Template};
//!
//! let template = Template::parse("filter-by-{{ filter_by }}").unwrap();
//! assert_eq!(template.render(|_| "done".into()), "filter-by-done");
//!
//! let expr = Expression::parse("model.is_done").unwrap();
//! assert_eq!(expr.dependencies()[0].to_string(), "model.is_done");
//! ```

pub mod delta;
mod error;
pub mod object;
pub mod path;
pub mod template;
mod value;

pub use delta::Delta;
pub use error::{Error, Result};
pub use object::{
    downcast, next_subscription_id, object_addr, same_object, Callback, Collection, Member,
    MembershipCallback, Object, ObjectKind, ObjectRef, SubscriptionId,
};
pub use path::{assign, resolve, Path};
pub use template::{Expression, Segment, Template};
pub use value::Value;
