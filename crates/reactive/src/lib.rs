//! Voodoo Reactive - observable property bags for the Voodoo binding engine.
//!
//! This crate implements the change-notification layer every model, store
//! and view is built on. Setting a property notifies its subscribers
//! synchronously, in subscription order, once per discrete change.
//!
//! # Core Concepts
//!
//! - `Observable`: a keyed property bag with per-key subscriber lists
//! - `SubscriptionManager`: an ordered subscriber list, safe to mutate mid-dispatch
//! - `PathWatch`: a subscription that follows a multi-segment path and relinks
//!   when an intermediate object is replaced
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use voodoo_core::{Path, Value};
//! use voodoo_reactive::{Observable, PathWatch};
//!
//! let xhr = Rc::new(Observable::with_values([("state", Value::from("idle"))]));
//! let model = Rc::new(Observable::with_values([("xhr", Value::object(xhr.clone()))]));
//!
//! let seen = Rc::new(RefCell::new(Vec::new()));
//! let seen_clone = seen.clone();
//! let _watch = PathWatch::watch(model, Path::parse("xhr.state").unwrap(), move |v| {
//!     seen_clone.borrow_mut().push(v.to_text());
//! })
//! .unwrap();
//!
//! xhr.set("state", "loading").unwrap();
//! assert_eq!(*seen.borrow(), vec!["loading".to_string()]);
//! ```

pub mod observable;
pub mod subscription;
pub mod watch;

pub use observable::Observable;
pub use subscription::{dispatch, Subscription, SubscriptionManager};
pub use watch::PathWatch;

// Re-export commonly used types from core
pub use voodoo_core::{Callback, SubscriptionId, Value};
