//! Voodoo Router - routes, locations and the primary view slot.
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use voodoo_router::{FnRoute, Params, Router};
//!
//! let entered = Rc::new(RefCell::new(Vec::new()));
//! let log = entered.clone();
//!
//! let router: Router<()> = Router::new();
//! router
//!     .add("Filter", "/filter/:by", FnRoute::new(move |_: &(), _: &str, params: &Params| {
//!         log.borrow_mut().push(params.get("by").unwrap_or_default().to_string());
//!         Ok(())
//!     }))
//!     .unwrap();
//!
//! router.navigate(&(), "/filter/active").unwrap();
//! assert_eq!(*entered.borrow(), vec!["active"]);
//! assert_eq!(router.reverse("Filter", &Params::new().with("by", "done")).unwrap(), "/filter/done");
//! ```

pub mod location;
pub mod pattern;
pub mod primary;
pub mod router;

pub use location::{LocationCallback, LocationSource, MemoryLocation};
pub use pattern::{Params, Pattern};
pub use primary::{PrimaryOptions, PrimaryViews};
pub use router::{FnRoute, Route, RouteHandle, Router};
