//! Voodoo View - views, the binding resolver and surface traits.
//!
//! This crate connects observable state to a rendered surface:
//!
//! - `Element` / `Toolkit`: the surface a view renders into
//! - `ViewShape` / `View`: declared areas, class bindings and events
//! - `AreaSpec` / `Resolved`: how a bound value is displayed in a region
//! - `MemoryToolkit`: a headless in-memory surface
//!
//! # Example
//!
//! ```rust
//! use std::rc::Rc;
//! use voodoo_core::Value;
//! use voodoo_store::ModelShape;
//! use voodoo_view::{memory::type_text, Element, MemoryToolkit, View, ViewConfig, ViewShape};
//!
//! let todo = ModelShape::builder("Todo").default("text", "").build().create_default();
//! let shape = ViewShape::builder("TodoView")
//!     .template(r#"<li><input class="edit" type="text"><label class="text"></label></li>"#)
//!     .two_way(".edit", "model.text")
//!     .area(".text", "model.text")
//!     .build()
//!     .unwrap();
//!
//! let view = View::new(Rc::new(MemoryToolkit::new()), &shape, ViewConfig::new().model(todo.clone()));
//! let root = view.render().unwrap();
//!
//! type_text(&root.select(".edit").unwrap(), "Buy milk");
//! assert_eq!(todo.get("text"), Some(Value::from("Buy milk")));
//! assert_eq!(root.select(".text").unwrap().content(), "Buy milk");
//! ```

pub mod binding;
mod class_binding;
pub mod element;
pub mod memory;
pub mod view;

pub use binding::{classify, AreaSpec, Direction, ItemFactory, Resolved, SurfaceRef};
pub use class_binding::ClassSpec;
pub use element::{
    bubble, same_element, Control, Element, ElementRef, Event, EventListener, Surface, Toolkit,
};
pub use memory::{MemoryElement, MemoryToolkit};
pub use view::{EventHandler, RenderHook, View, ViewConfig, ViewShape, ViewShapeBuilder};
