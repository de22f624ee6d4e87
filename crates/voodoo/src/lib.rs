//! Voodoo - a reactive binding and live-collection engine.
//!
//! This crate ties the Voodoo crates together into an application:
//!
//! - `voodoo_core`: values, paths, templates and the object protocol
//! - `voodoo_reactive`: observable property bags and path watches
//! - `voodoo_store`: models, stores and live sub-collections
//! - `voodoo_view`: views, bindings and the surface traits
//! - `voodoo_router`: routes, locations and the primary view slot
//!
//! An [`AppContext`] carries the toolkit, the location source, the executor
//! and the page record. Route handlers receive it on every transition.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use futures::executor::LocalPool;
//! use voodoo::{AppConfig, AppContext, FnRoute, Params, Router, ViewConfig, ViewShape};
//!
//! let pool = LocalPool::new();
//! let config = AppConfig { title: "My Todos".to_string(), ..AppConfig::default() };
//! let cx = AppContext::in_memory(config, Rc::new(pool.spawner()));
//!
//! let home = ViewShape::builder("Home").template("<main></main>").build().unwrap();
//! let router: Rc<Router<AppContext>> = Rc::new(Router::new());
//! router
//!     .add("Home", "/", FnRoute::new(move |cx: &AppContext, _: &str, _: &Params| {
//!         let view = voodoo::View::new(Rc::clone(cx.toolkit()), &home, ViewConfig::new());
//!         cx.set_primary(&view, Some("Home"))
//!     }))
//!     .unwrap();
//!
//! cx.start(&router).unwrap();
//! assert_eq!(cx.page().get("title"), Some(voodoo::Value::from("Home - My Todos")));
//! ```

mod config;
mod context;

pub use config::AppConfig;
pub use context::AppContext;

pub use voodoo_core::{
    assign, resolve, Collection, Delta, Error, Expression, Member, Object, ObjectKind, ObjectRef,
    Path, Result, Template, Value,
};
pub use voodoo_reactive::{Observable, PathWatch};
pub use voodoo_router::{
    FnRoute, LocationSource, MemoryLocation, Params, Pattern, PrimaryOptions, PrimaryViews, Route,
    RouteHandle, Router,
};
pub use voodoo_store::{
    DataSource, LiveCollection, MemorySource, Model, ModelShape, Predicate, Response, Store,
    StoreShape, XhrState,
};
pub use voodoo_view::{
    Element, ElementRef, Event, MemoryElement, MemoryToolkit, Surface, Toolkit, View, ViewConfig,
    ViewShape,
};
