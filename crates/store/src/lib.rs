//! Voodoo Store - models, stores and live sub-collections.
//!
//! This crate implements the data layer of the Voodoo binding engine:
//!
//! - `ModelShape` / `Model`: observable records with identity and request status
//! - `StoreShape` / `Store`: ordered, observable collections of models
//! - `LiveCollection`: a filtered sub-collection kept in sync with its parent
//! - `DataSource`: the asynchronous transport boundary
//!
//! Requests return futures that the application spawns on its executor. A
//! completion that arrives after its entity was released or destroyed is
//! discarded.
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use futures::executor::block_on;
//! use serde_json::json;
//! use voodoo_store::{MemorySource, ModelShape, Response, StoreShape, XhrState};
//!
//! let source = Rc::new(MemorySource::new());
//! source.respond("/todos", Response::ok(json!([{"id": 1, "text": "Buy milk"}])));
//!
//! let todo = ModelShape::builder("Todo").default("text", "Untitled").build();
//! let todos = StoreShape::builder("Todos")
//!     .resource("/todos")
//!     .source(source)
//!     .item_shape(todo)
//!     .build()
//!     .create();
//!
//! let pending = todos.fetch().unwrap();
//! assert_eq!(todos.xhr_state(), XhrState::Loading);
//! block_on(pending);
//! assert_eq!(todos.len(), 1);
//! ```

pub mod live;
pub mod model;
pub mod predicate;
pub mod source;
pub mod store;
mod sync;

pub use live::LiveCollection;
pub use model::{Model, ModelShape, ModelShapeBuilder, ParseFn};
pub use predicate::Predicate;
pub use source::{DataSource, MemorySource, Request, Response};
pub use store::{FetchMerge, ParseItemFn, ParseListFn, Store, StoreShape, StoreShapeBuilder};
pub use sync::XhrState;
