//! Views.
//!
//! A [`View`] owns one root element and wires the areas, class bindings and
//! events of its [`ViewShape`] against its context: its own properties, then
//! its `model`, then its `store`.
//!
//! Lifecycle: [`View::new`] → [`View::render`] → [`View::destroy`]. Rendering
//! again tears every binding down and reinstalls it on the same root.

use crate::binding::{AreaBinding, AreaSpec, Direction, ItemFactory};
use crate::class_binding::{ClassBinding, ClassSpec};
use crate::element::{ElementRef, Event, Toolkit};
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use voodoo_core::{
    resolve, Callback, Error, Object, ObjectKind, ObjectRef, Path, Result, SubscriptionId, Value,
};
use voodoo_reactive::Observable;

/// Handler for a delegated event: the view, the event and the element that
/// matched the handler's selector.
pub type EventHandler = Rc<dyn Fn(&Rc<View>, &Event, &ElementRef) -> Result<()>>;

/// Hook run at the start of every render, before bindings are installed.
pub type RenderHook = Rc<dyn Fn(&Rc<View>) -> Result<()>>;

const MODEL: &str = "model";
const STORE: &str = "store";

#[derive(Clone)]
struct EventSpec {
    kind: String,
    selector: Option<String>,
    handler: EventHandler,
}

impl EventSpec {
    /// Parses `"click .todo-delete"`; without a selector the handler matches
    /// the view's root.
    fn parse(declaration: &str, handler: EventHandler) -> Result<Self> {
        let declaration = declaration.trim();
        let (kind, selector) = match declaration.split_once(char::is_whitespace) {
            Some((kind, selector)) => (kind, Some(selector.trim().to_string())),
            None => (declaration, None),
        };
        if kind.is_empty() {
            return Err(Error::invalid_binding(declaration, "missing event type"));
        }
        Ok(Self {
            kind: kind.to_string(),
            selector: selector.filter(|s| !s.is_empty()),
            handler,
        })
    }
}

struct ShapeInner {
    name: String,
    template: Option<String>,
    defaults: Vec<(String, Value)>,
    areas: Vec<AreaSpec>,
    classes: Vec<ClassSpec>,
    events: Vec<EventSpec>,
    item_views: Vec<(String, ItemFactory)>,
    on_render: Vec<RenderHook>,
}

/// A reusable view definition.
///
/// # Example
///
/// ```rust
/// use voodoo_view::ViewShape;
///
/// let shape = ViewShape::builder("TodoView")
///     .template(r#"<li class="todo"><label class="todo-text"></label></li>"#)
///     .area(".todo-text", "model.text")
///     .class_binding("model.is_done", "done:pending")
///     .build()
///     .unwrap();
/// assert_eq!(shape.name(), "TodoView");
/// ```
#[derive(Clone)]
pub struct ViewShape {
    inner: Rc<ShapeInner>,
}

impl ViewShape {
    /// Starts building a shape.
    pub fn builder(name: impl Into<String>) -> ViewShapeBuilder {
        ViewShapeBuilder::new(name)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the template, if any.
    pub fn template(&self) -> Option<&str> {
        self.inner.template.as_deref()
    }

    #[inline]
    pub fn areas(&self) -> &[AreaSpec] {
        &self.inner.areas
    }

    #[inline]
    pub fn class_bindings(&self) -> &[ClassSpec] {
        &self.inner.classes
    }

    /// Returns the event types this shape handles.
    pub fn event_kinds(&self) -> Vec<String> {
        let mut kinds: Vec<String> = Vec::new();
        for event in &self.inner.events {
            if !kinds.contains(&event.kind) {
                kinds.push(event.kind.clone());
            }
        }
        kinds
    }

    fn item_factory(&self, selector: &str) -> Option<ItemFactory> {
        self.inner
            .item_views
            .iter()
            .find(|(s, _)| s == selector)
            .map(|(_, factory)| Rc::clone(factory))
    }
}

/// Builder for [`ViewShape`].
pub struct ViewShapeBuilder {
    name: String,
    template: Option<String>,
    defaults: Vec<(String, Value)>,
    areas: Vec<(String, String, Direction)>,
    classes: Vec<(String, String)>,
    events: Vec<(String, EventHandler)>,
    item_views: Vec<(String, ItemFactory)>,
    on_render: Vec<RenderHook>,
}

impl ViewShapeBuilder {
    /// Creates a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            template: None,
            defaults: Vec::new(),
            areas: Vec::new(),
            classes: Vec::new(),
            events: Vec::new(),
            item_views: Vec::new(),
            on_render: Vec::new(),
        }
    }

    /// Sets the template instantiated as the root element.
    pub fn template(mut self, template: impl Into<String>) -> Self {
        self.template = Some(template.into());
        self
    }

    /// Declares a view property with its default value.
    pub fn default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.defaults.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.defaults.push((key, value)),
        }
        self
    }

    /// Declares a one-way area.
    pub fn area(mut self, selector: impl Into<String>, expr: impl Into<String>) -> Self {
        self.areas
            .push((selector.into(), expr.into(), Direction::OneWay));
        self
    }

    /// Declares a two-way area.
    pub fn two_way(mut self, selector: impl Into<String>, expr: impl Into<String>) -> Self {
        self.areas
            .push((selector.into(), expr.into(), Direction::TwoWay));
        self
    }

    /// Declares a class binding on the root element.
    pub fn class_binding(
        mut self,
        dependency: impl Into<String>,
        template: impl Into<String>,
    ) -> Self {
        self.classes.push((dependency.into(), template.into()));
        self
    }

    /// Declares an event handler, e.g. `"click .todo-delete"`.
    pub fn event<F>(mut self, declaration: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Rc<View>, &Event, &ElementRef) -> Result<()> + 'static,
    {
        self.events.push((declaration.into(), Rc::new(handler)));
        self
    }

    /// Registers the factory building a child view per collection member
    /// for the area at `selector`.
    pub fn item_view<F>(mut self, selector: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Rc<View>, &ObjectRef) -> Result<Rc<View>> + 'static,
    {
        self.item_views.push((selector.into(), Rc::new(factory)));
        self
    }

    /// Adds a hook run at the start of every render.
    pub fn on_render<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Rc<View>) -> Result<()> + 'static,
    {
        self.on_render.push(Rc::new(hook));
        self
    }

    /// Parses every declaration and builds the shape.
    pub fn build(self) -> Result<ViewShape> {
        let areas = self
            .areas
            .iter()
            .map(|(selector, expr, direction)| AreaSpec::parse(selector, expr, *direction))
            .collect::<Result<Vec<_>>>()?;
        let classes = self
            .classes
            .iter()
            .map(|(dependency, template)| ClassSpec::parse(dependency, template))
            .collect::<Result<Vec<_>>>()?;
        let events = self
            .events
            .into_iter()
            .map(|(declaration, handler)| EventSpec::parse(&declaration, handler))
            .collect::<Result<Vec<_>>>()?;

        Ok(ViewShape {
            inner: Rc::new(ShapeInner {
                name: self.name,
                template: self.template,
                defaults: self.defaults,
                areas,
                classes,
                events,
                item_views: self.item_views,
                on_render: self.on_render,
            }),
        })
    }
}

/// Per-instance view configuration.
#[derive(Clone, Default)]
pub struct ViewConfig {
    model: Option<ObjectRef>,
    store: Option<ObjectRef>,
    props: Vec<(String, Value)>,
    element: Option<ElementRef>,
    delegate_to: Option<Rc<View>>,
}

impl ViewConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the `model` the view binds against.
    pub fn model(mut self, model: ObjectRef) -> Self {
        self.model = Some(model);
        self
    }

    /// Sets the `store` the view binds against.
    pub fn store(mut self, store: ObjectRef) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets a view property, declaring it if the shape does not.
    pub fn prop(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.push((key.into(), value.into()));
        self
    }

    /// Uses an existing element as the root instead of the shape template.
    pub fn element(mut self, element: ElementRef) -> Self {
        self.element = Some(element);
        self
    }

    /// Routes this view's events through `ancestor`'s root listeners.
    pub fn delegate_to(mut self, ancestor: Rc<View>) -> Self {
        self.delegate_to = Some(ancestor);
        self
    }
}

/// A rendered, bound piece of surface.
pub struct View {
    this: Weak<View>,
    shape: ViewShape,
    toolkit: Rc<dyn Toolkit>,
    props: Rc<Observable>,
    root: RefCell<Option<ElementRef>>,
    rendered: Cell<bool>,
    destroyed: Cell<bool>,
    areas: RefCell<Vec<Rc<AreaBinding>>>,
    classes: RefCell<Vec<Rc<ClassBinding>>>,
    listeners: RefCell<Vec<(String, SubscriptionId)>>,
    delegate_to: Weak<View>,
    delegates: RefCell<Vec<Weak<View>>>,
    cleanups: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl View {
    /// Creates an unrendered view.
    pub fn new(toolkit: Rc<dyn Toolkit>, shape: &ViewShape, config: ViewConfig) -> Rc<Self> {
        let props = Observable::new();
        props.declare(MODEL, config.model.map(Value::Object).unwrap_or(Value::Null));
        props.declare(STORE, config.store.map(Value::Object).unwrap_or(Value::Null));
        for (key, value) in shape.inner.defaults.iter() {
            props.declare(key.as_str(), value.clone());
        }
        for (key, value) in config.props {
            props.insert(&key, value);
        }

        let delegate_to = config
            .delegate_to
            .as_ref()
            .map(Rc::downgrade)
            .unwrap_or_default();

        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            shape: shape.clone(),
            toolkit,
            props: Rc::new(props),
            root: RefCell::new(config.element),
            rendered: Cell::new(false),
            destroyed: Cell::new(false),
            areas: RefCell::new(Vec::new()),
            classes: RefCell::new(Vec::new()),
            listeners: RefCell::new(Vec::new()),
            delegate_to,
            delegates: RefCell::new(Vec::new()),
            cleanups: RefCell::new(Vec::new()),
        })
    }

    /// Returns the shape name.
    #[inline]
    pub fn name(&self) -> &str {
        self.shape.name()
    }

    #[inline]
    pub fn shape(&self) -> &ViewShape {
        &self.shape
    }

    /// Returns the toolkit the view instantiates its surface with.
    pub fn toolkit(&self) -> &Rc<dyn Toolkit> {
        &self.toolkit
    }

    /// Returns the view's own properties.
    pub fn props(&self) -> &Rc<Observable> {
        &self.props
    }

    /// Returns the bound model, if any.
    pub fn model(&self) -> Option<ObjectRef> {
        self.props.get(MODEL).and_then(|v| v.as_object().cloned())
    }

    /// Returns the bound store, if any.
    pub fn store(&self) -> Option<ObjectRef> {
        self.props.get(STORE).and_then(|v| v.as_object().cloned())
    }

    /// Returns the root element, once created.
    pub fn root(&self) -> Option<ElementRef> {
        self.root.borrow().clone()
    }

    pub fn is_rendered(&self) -> bool {
        self.rendered.get()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Returns the value of `key` in the view context.
    pub fn get(&self, key: &str) -> Option<Value> {
        Object::get(self, key)
    }

    /// Sets `key` on whichever context object declares it.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        Object::set(self, key, value.into())
    }

    /// Resolves a path against the view context.
    pub fn lookup(&self, path: &Path) -> Result<Value> {
        resolve(self, path)
    }

    /// Returns the context object holding the first segment of `path`.
    pub fn holder(&self, path: &Path) -> Result<ObjectRef> {
        let head = path.head();
        if self.props.is_declared(head) {
            let props: ObjectRef = self.props.clone();
            return Ok(props);
        }
        [self.model(), self.store()]
            .into_iter()
            .flatten()
            .find(|object| object.get(head).is_some())
            .ok_or_else(|| Error::path(path.to_string(), head))
    }

    /// Finds a region: the root itself if it matches, else the first
    /// matching descendant.
    pub fn region(&self, selector: &str) -> Result<ElementRef> {
        let root = self
            .root()
            .ok_or_else(|| Error::region_not_found(self.name(), selector))?;
        if root.matches(selector) {
            return Ok(root);
        }
        root.select(selector)
            .ok_or_else(|| Error::region_not_found(self.name(), selector))
    }

    pub(crate) fn item_factory(&self, selector: &str) -> Option<ItemFactory> {
        self.shape.item_factory(selector)
    }

    /// Registers a cleanup run when the current render is torn down.
    pub fn defer<F>(&self, cleanup: F)
    where
        F: FnOnce() + 'static,
    {
        self.cleanups.borrow_mut().push(Box::new(cleanup));
    }

    /// Returns the variant displayed by the area at `selector`.
    pub fn area_state(&self, selector: &str) -> Option<&'static str> {
        self.areas
            .borrow()
            .iter()
            .find(|area| area.spec().selector() == selector)
            .map(|area| area.state_name())
    }

    /// Returns the classes currently applied by class bindings.
    pub fn bound_classes(&self) -> Vec<String> {
        self.classes
            .borrow()
            .iter()
            .filter_map(|binding| binding.current())
            .collect()
    }

    /// Returns the number of live views delegating to this one.
    pub fn delegate_count(&self) -> usize {
        self.delegates
            .borrow()
            .iter()
            .filter(|d| d.strong_count() > 0)
            .count()
    }

    /// Renders the view and returns its root element.
    ///
    /// Runs the render hooks, then installs areas, class bindings and event
    /// listeners. Rendering again reinstalls everything on the same root.
    pub fn render(&self) -> Result<ElementRef> {
        let this = match (self.destroyed.get(), self.this.upgrade()) {
            (false, Some(this)) => this,
            _ => return Err(Error::destroyed(self.name())),
        };
        if self.rendered.get() {
            self.teardown();
        }

        let root = match self.root() {
            Some(root) => root,
            None => {
                let root = match self.shape.template() {
                    Some(template) => self.toolkit.instantiate(template)?,
                    None => self.toolkit.container(),
                };
                *self.root.borrow_mut() = Some(Rc::clone(&root));
                root
            }
        };

        if let Err(err) = self.install(&this, &root) {
            self.teardown();
            return Err(err);
        }
        self.rendered.set(true);
        tracing::debug!(
            message = "view.render",
            view = %self.name(),
            areas = self.areas.borrow().len(),
            classes = self.classes.borrow().len()
        );
        Ok(root)
    }

    fn install(&self, this: &Rc<View>, root: &ElementRef) -> Result<()> {
        for hook in self.shape.inner.on_render.iter() {
            hook(this)?;
        }
        for spec in self.shape.areas() {
            let binding = AreaBinding::install(this, spec)?;
            self.areas.borrow_mut().push(binding);
        }
        for spec in self.shape.class_bindings() {
            let binding = ClassBinding::install(this, root, spec)?;
            self.classes.borrow_mut().push(binding);
        }
        match self.delegate_target() {
            Some(ancestor) => ancestor.adopt_delegate(this),
            None => {
                for kind in self.event_kinds() {
                    self.listen(&kind);
                }
            }
        }
        Ok(())
    }

    /// Removes every subscription and listener, keeping the root element.
    fn teardown(&self) {
        let areas: Vec<Rc<AreaBinding>> = self.areas.borrow_mut().drain(..).collect();
        for area in areas {
            area.teardown();
        }
        let classes: Vec<Rc<ClassBinding>> = self.classes.borrow_mut().drain(..).collect();
        for class in classes {
            class.teardown();
        }

        let listeners: Vec<(String, SubscriptionId)> =
            self.listeners.borrow_mut().drain(..).collect();
        if let Some(root) = self.root() {
            for (_, id) in listeners {
                root.off_event(id);
            }
        }
        if let Some(ancestor) = self.delegate_target() {
            ancestor.release_delegate(self);
        }

        let cleanups: Vec<Box<dyn FnOnce()>> = self.cleanups.borrow_mut().drain(..).collect();
        for cleanup in cleanups.into_iter().rev() {
            cleanup();
        }
        self.rendered.set(false);
    }

    /// Tears the view down and detaches its root. Idempotent.
    ///
    /// Child views created for collection members are destroyed with it.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.teardown();
        let root = self.root.borrow_mut().take();
        if let Some(root) = root {
            root.detach();
        }
        tracing::debug!(message = "view.destroy", view = %self.name());
    }

    fn delegate_target(&self) -> Option<Rc<View>> {
        self.delegate_to
            .upgrade()
            .filter(|ancestor| !ancestor.is_destroyed())
    }

    /// Event types handled by this view and every view delegating to it.
    fn event_kinds(&self) -> Vec<String> {
        let mut kinds = self.shape.event_kinds();
        for delegate in self.live_delegates() {
            for kind in delegate.event_kinds() {
                if !kinds.contains(&kind) {
                    kinds.push(kind);
                }
            }
        }
        kinds
    }

    fn live_delegates(&self) -> Vec<Rc<View>> {
        self.delegates
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    fn adopt_delegate(&self, delegate: &Rc<View>) {
        {
            let mut delegates = self.delegates.borrow_mut();
            delegates.retain(|d| d.strong_count() > 0);
            if delegates.iter().any(|d| std::ptr::eq(d.as_ptr(), Rc::as_ptr(delegate))) {
                return;
            }
            delegates.push(Rc::downgrade(delegate));
        }
        for kind in delegate.event_kinds() {
            self.listen(&kind);
        }
    }

    fn release_delegate(&self, delegate: &View) {
        self.delegates
            .borrow_mut()
            .retain(|d| d.strong_count() > 0 && !std::ptr::eq(d.as_ptr(), delegate));
    }

    /// Ensures one root listener for `kind`, on this view or on the view it
    /// delegates to.
    fn listen(&self, kind: &str) {
        if let Some(ancestor) = self.delegate_target() {
            ancestor.listen(kind);
            return;
        }
        let root = match self.root() {
            Some(root) => root,
            None => return,
        };
        if self.listeners.borrow().iter().any(|(k, _)| k == kind) {
            return;
        }
        let weak = self.this.clone();
        let id = root.on_event(
            kind,
            Rc::new(move |event: &Event| {
                if let Some(view) = weak.upgrade() {
                    view.dispatch_event(event);
                }
            }),
        );
        self.listeners.borrow_mut().push((kind.to_string(), id));
    }

    /// Runs the delegates' handlers, innermost first, then this view's own.
    fn dispatch_event(&self, event: &Event) {
        for delegate in self.live_delegates() {
            delegate.dispatch_event(event);
        }
        if event.is_propagation_stopped() || self.destroyed.get() {
            return;
        }
        let (this, root) = match (self.this.upgrade(), self.root()) {
            (Some(this), Some(root)) => (this, root),
            _ => return,
        };
        let handlers: Vec<EventSpec> = self
            .shape
            .inner
            .events
            .iter()
            .filter(|spec| spec.kind == event.kind())
            .cloned()
            .collect();
        for spec in handlers {
            let matched = match &spec.selector {
                Some(selector) => event.target().closest(selector),
                None => Some(Rc::clone(&root)),
            };
            let matched = match matched {
                Some(matched) if root.contains(&matched) && root.contains(event.target()) => {
                    matched
                }
                _ => continue,
            };
            tracing::trace!(message = "view.event", view = %self.name(), kind = %spec.kind);
            if let Err(err) = (spec.handler)(&this, event, &matched) {
                tracing::warn!(
                    message = "view.handler_failed",
                    view = %self.name(),
                    kind = %spec.kind,
                    %err
                );
            }
        }
    }

    /// Context objects in lookup order.
    fn context(&self) -> [Option<ObjectRef>; 2] {
        [self.model(), self.store()]
    }
}

impl Object for View {
    fn kind(&self) -> ObjectKind {
        ObjectKind::View
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.props.get(key).or_else(|| {
            self.context()
                .into_iter()
                .flatten()
                .find_map(|object| object.get(key))
        })
    }

    fn set(&self, key: &str, value: Value) -> Result<bool> {
        self.holder(&Path::key(key))?.set(key, value)
    }

    fn subscribe(&self, key: &str, callback: Callback) -> Result<SubscriptionId> {
        self.holder(&Path::key(key))?.subscribe(key, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.props.unsubscribe(id)
            || self
                .context()
                .into_iter()
                .flatten()
                .any(|object| object.unsubscribe(id))
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

impl fmt::Debug for View {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("View")
            .field("name", &self.name())
            .field("rendered", &self.rendered.get())
            .field("destroyed", &self.destroyed.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{Element, Surface};
    use crate::memory::{click, toggle, type_text, MemoryElement, MemoryToolkit};
    use voodoo_store::{ModelShape, Predicate, Store, StoreShape};

    const TODO: &str = r#"
        <li class="todo">
            <input class="todo-toggle-done" type="checkbox">
            <label class="todo-text"></label>
            <input class="todo-text-edit" type="text">
            <button class="todo-delete">x</button>
        </li>
    "#;

    fn toolkit() -> Rc<dyn Toolkit> {
        Rc::new(MemoryToolkit::new())
    }

    fn todo_shape() -> ModelShape {
        ModelShape::builder("Todo")
            .default("text", "")
            .default("is_done", false)
            .build()
    }

    fn todo_view_shape() -> ViewShape {
        ViewShape::builder("TodoView")
            .template(TODO)
            .area(".todo-text", "model.text")
            .two_way(".todo-text-edit", "model.text")
            .two_way(".todo-toggle-done", "model.is_done")
            .class_binding("model.is_done", "done:pending")
            .build()
            .unwrap()
    }

    fn todo_view(todo: &Rc<voodoo_store::Model>) -> Rc<View> {
        let model: ObjectRef = todo.clone();
        View::new(toolkit(), &todo_view_shape(), ViewConfig::new().model(model))
    }

    fn select(view: &View, selector: &str) -> ElementRef {
        view.root().unwrap().select(selector).unwrap()
    }

    #[test]
    fn test_render_one_way_areas() {
        let todo = todo_shape().create([("text", Value::from("Write tests"))]);
        let view = todo_view(&todo);
        view.render().unwrap();

        let label = select(&view, ".todo-text");
        assert_eq!(label.content(), "Write tests");
        assert_eq!(view.area_state(".todo-text"), Some("content"));

        todo.set("text", "Ship it").unwrap();
        assert_eq!(label.content(), "Ship it");
    }

    #[test]
    fn test_two_way_text_round_trip() {
        let todo = todo_shape().create_default();
        let view = todo_view(&todo);
        view.render().unwrap();

        let edit = select(&view, ".todo-text-edit");
        type_text(&edit, "Buy milk");
        assert_eq!(todo.get("text"), Some(Value::from("Buy milk")));
        assert_eq!(select(&view, ".todo-text").content(), "Buy milk");

        todo.set("text", "Done").unwrap();
        assert_eq!(edit.value(), "Done");
    }

    #[test]
    fn test_two_way_checkbox_round_trip() {
        let todo = todo_shape().create_default();
        let view = todo_view(&todo);
        let root = view.render().unwrap();

        let checkbox = select(&view, ".todo-toggle-done");
        assert!(!checkbox.checked());
        assert!(root.has_class("pending"));

        toggle(&checkbox);
        assert_eq!(todo.get("is_done"), Some(Value::Bool(true)));
        assert!(root.has_class("done"));
        assert!(!root.has_class("pending"));

        todo.set("is_done", false).unwrap();
        assert!(!checkbox.checked());
        assert_eq!(view.bound_classes(), vec!["pending".to_string()]);
    }

    #[test]
    fn test_class_binding_applies_each_token() {
        let todo = todo_shape().create_default();
        let model: ObjectRef = todo.clone();
        let shape = ViewShape::builder("TodoView")
            .template(TODO)
            .class_binding("model.is_done", "is-done muted:is-active")
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new().model(model));
        let root = view.render().unwrap();
        assert!(root.has_class("is-active"));
        assert!(!root.has_class("is-done muted"));

        todo.set("is_done", true).unwrap();
        assert!(root.has_class("is-done"));
        assert!(root.has_class("muted"));
        assert!(!root.has_class("is-active"));

        todo.set("is_done", false).unwrap();
        assert!(!root.has_class("is-done"));
        assert!(!root.has_class("muted"));
        assert!(root.has_class("is-active"));

        todo.set("is_done", true).unwrap();
        view.destroy();
        assert!(!root.has_class("is-done"));
        assert!(!root.has_class("muted"));
        assert!(root.has_class("todo"));
    }

    #[test]
    fn test_missing_region_and_undeclared_path() {
        let todo = todo_shape().create_default();
        let model: ObjectRef = todo.clone();

        let shape = ViewShape::builder("Broken")
            .template(TODO)
            .area(".missing", "model.text")
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new().model(model.clone()));
        assert!(matches!(
            view.render().err().unwrap(),
            Error::RegionNotFound { .. }
        ));

        let shape = ViewShape::builder("Broken")
            .template(TODO)
            .area(".todo-text", "model.title")
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new().model(model));
        assert!(view.render().err().unwrap().is_path_error());
        assert_eq!(todo.attrs().subscription_count(), 0);
    }

    #[test]
    fn test_two_way_on_content_region_rejected() {
        let shape = ViewShape::builder("Broken")
            .template(TODO)
            .two_way(".todo-text", "model.text")
            .build()
            .unwrap();
        let todo = todo_shape().create_default();
        let view = View::new(toolkit(), &shape, ViewConfig::new().model(todo));
        assert!(matches!(
            view.render().err().unwrap(),
            Error::InvalidBinding { .. }
        ));
    }

    #[test]
    fn test_destroy_stops_updates() {
        let todo = todo_shape().create([("text", Value::from("a"))]);
        let view = todo_view(&todo);
        let root = view.render().unwrap();
        let label = select(&view, ".todo-text");

        let container: ElementRef = MemoryElement::new("ul");
        container.append(Rc::clone(&root));

        view.destroy();
        view.destroy();
        assert!(view.is_destroyed());
        assert!(container.children().is_empty());
        assert_eq!(todo.attrs().subscription_count(), 0);

        todo.set("text", "b").unwrap();
        assert_eq!(label.content(), "a");
        assert!(matches!(view.render().err().unwrap(), Error::Destroyed { .. }));
    }

    #[test]
    fn test_rerender_keeps_root_and_subscriptions() {
        let todo = todo_shape().create_default();
        let view = todo_view(&todo);
        let first = view.render().unwrap();
        let count = todo.attrs().subscription_count();

        let second = view.render().unwrap();
        assert!(crate::element::same_element(&first, &second));
        assert_eq!(todo.attrs().subscription_count(), count);
        assert_eq!(view.bound_classes(), vec!["pending".to_string()]);
    }

    #[test]
    fn test_context_lookup_order() {
        let todo = todo_shape().create([("text", Value::from("model"))]);
        let shape = ViewShape::builder("Lookup")
            .template("<p><span class=\"a\"></span><span class=\"b\"></span></p>")
            .default("title", "own")
            .area(".a", "title")
            .area(".b", "text")
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new().model(todo.clone()));
        view.render().unwrap();

        assert_eq!(select(&view, ".a").content(), "own");
        assert_eq!(select(&view, ".b").content(), "model");

        view.set("text", "via view").unwrap();
        assert_eq!(todo.get("text"), Some(Value::from("via view")));
        assert_eq!(select(&view, ".b").content(), "via view");
        assert!(view.set("missing", 1).is_err());
    }

    #[test]
    fn test_template_area_and_hidden() {
        let store = StoreShape::builder("Todos").build().create();
        let shape = ViewShape::builder("Footer")
            .template(r#"<footer><span class="count"></span><span class="note"></span></footer>"#)
            .default("note", Value::Null)
            .area(".count", "{{ store.length }} items left")
            .area(".note", "note")
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new().store(store.clone()));
        view.render().unwrap();

        let count = select(&view, ".count");
        assert_eq!(count.content(), "0 items left");
        store.add_json(&serde_json::json!({"text": "a"}));
        assert_eq!(count.content(), "1 items left");

        let note = select(&view, ".note");
        assert!(note.is_hidden());
        view.set("note", "hello").unwrap();
        assert!(!note.is_hidden());
        assert_eq!(note.content(), "hello");
    }

    #[test]
    fn test_surface_area() {
        let shape = ViewShape::builder("Slot")
            .template(r#"<div><section class="slot"></section></div>"#)
            .default("widget", Value::Null)
            .area(".slot", "widget")
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new());
        view.render().unwrap();

        let widget: ElementRef = MemoryElement::new("canvas");
        view.set("widget", Surface::value(Rc::clone(&widget))).unwrap();
        let slot = select(&view, ".slot");
        assert_eq!(slot.children().len(), 1);
        assert_eq!(view.area_state(".slot"), Some("surface"));

        view.set("widget", Value::Null).unwrap();
        assert!(slot.children().is_empty());
        assert!(widget.parent().is_none());
    }

    fn list_shape() -> ViewShape {
        ViewShape::builder("TodoList")
            .template(r#"<section><ul class="todo-list"></ul></section>"#)
            .area(".todo-list", "store")
            .item_view(".todo-list", |host, member| {
                let item = ViewShape::builder("TodoItem")
                    .template(TODO)
                    .area(".todo-text", "model.text")
                    .event("click .todo-delete", |view, _, _| {
                        let store = view
                            .lookup(&Path::parse("store")?)?
                            .as_object()
                            .cloned()
                            .and_then(|s| voodoo_core::downcast::<Store>(&s));
                        let model = view
                            .model()
                            .and_then(|m| voodoo_core::downcast::<voodoo_store::Model>(&m));
                        if let (Some(store), Some(model)) = (store, model) {
                            store.remove(&model);
                        }
                        Ok(())
                    })
                    .build()?;
                let mut config = ViewConfig::new()
                    .model(Rc::clone(member))
                    .delegate_to(Rc::clone(host));
                if let Some(store) = host.store() {
                    config = config.store(store);
                }
                Ok(View::new(Rc::clone(host.toolkit()), &item, config))
            })
            .build()
            .unwrap()
    }

    fn texts(list: &ElementRef) -> Vec<String> {
        list.children()
            .iter()
            .map(|li| li.select(".todo-text").unwrap().content())
            .collect()
    }

    #[test]
    fn test_collection_area_tracks_membership() {
        let store = StoreShape::builder("Todos").item_shape(todo_shape()).build().create();
        store.add_json(&serde_json::json!({"text": "a"}));
        store.add_json(&serde_json::json!({"text": "b"}));

        let view = View::new(toolkit(), &list_shape(), ViewConfig::new().store(store.clone()));
        view.render().unwrap();
        let list = select(&view, ".todo-list");
        assert_eq!(texts(&list), vec!["a", "b"]);
        assert_eq!(view.delegate_count(), 2);

        store.add_json(&serde_json::json!({"text": "c"}));
        assert_eq!(texts(&list), vec!["a", "b", "c"]);

        let b = store.at(1).unwrap();
        store.remove(&b);
        assert_eq!(texts(&list), vec!["a", "c"]);
        assert_eq!(view.delegate_count(), 2);
    }

    #[test]
    fn test_delegated_events_reach_dynamic_children() {
        let store = StoreShape::builder("Todos").item_shape(todo_shape()).build().create();
        store.add_json(&serde_json::json!({"text": "a"}));

        let view = View::new(toolkit(), &list_shape(), ViewConfig::new().store(store.clone()));
        let root = view.render().unwrap();
        store.add_json(&serde_json::json!({"text": "b"}));

        let list = select(&view, ".todo-list");
        let second = list.children()[1].select(".todo-delete").unwrap();
        click(&second);
        assert_eq!(store.len(), 1);
        assert_eq!(texts(&list), vec!["a"]);

        // One listener on the list root serves every child.
        let root = MemoryElement::from_ref(&root).unwrap();
        assert_eq!(root.listener_count(), 1);
    }

    #[test]
    fn test_destroy_releases_children_and_render_resources() {
        let store = StoreShape::builder("Todos").item_shape(todo_shape()).build().create();
        store.add_json(&serde_json::json!({"text": "a", "is_done": false}));
        store.add_json(&serde_json::json!({"text": "b", "is_done": true}));

        let shape = ViewShape::builder("Active")
            .template(r#"<section><ul class="todo-list"></ul><span class="count"></span></section>"#)
            .default("todos_active", Value::Null)
            .on_render(|view| {
                let store = view
                    .store()
                    .and_then(|s| voodoo_core::downcast::<Store>(&s))
                    .ok_or_else(|| Error::invalid_binding("store", "missing store"))?;
                let active = store.filter(Predicate::new().where_eq("is_done", false))?;
                view.set("todos_active", Value::object(Rc::clone(&active)))?;
                view.defer(move || active.release());
                Ok(())
            })
            .area(".count", "todos_active.length")
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new().store(store.clone()));
        view.render().unwrap();
        assert_eq!(select(&view, ".count").content(), "1");
        assert_eq!(store.live_count(), 1);

        store.at(1).unwrap().set("is_done", false).unwrap();
        assert_eq!(select(&view, ".count").content(), "2");

        view.destroy();
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_qualified_collection_uses_member_views() {
        let item_shape = ViewShape::builder("Item")
            .template(r#"<li class="item"></li>"#)
            .build()
            .unwrap();
        let model_shape = ModelShape::builder("Entry")
            .default("view", Value::Null)
            .build();
        let store = StoreShape::builder("Entries")
            .item_shape(model_shape.clone())
            .build()
            .create();
        let entry = model_shape.create_default();
        let item = View::new(toolkit(), &item_shape, ViewConfig::new());
        entry.set("view", Value::object(Rc::clone(&item))).unwrap();
        store.add(Rc::clone(&entry));

        let shape = ViewShape::builder("Entries")
            .template(r#"<ul class="list"></ul>"#)
            .area(".list", "store:view")
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new().store(store.clone()));
        let root = view.render().unwrap();
        assert_eq!(root.children().len(), 1);
        assert!(item.is_rendered());

        store.remove(&entry);
        assert!(root.children().is_empty());
        assert!(!item.is_destroyed());

        entry.set("view", Value::Null).unwrap();
    }

    #[test]
    fn test_collection_without_item_view_is_invalid() {
        let store = StoreShape::builder("Todos").build().create();
        let shape = ViewShape::builder("Bare")
            .template(r#"<ul class="list"></ul>"#)
            .area(".list", "store")
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new().store(store));
        assert!(matches!(
            view.render().err().unwrap(),
            Error::InvalidBinding { .. }
        ));
    }

    #[test]
    fn test_event_handler_errors_are_contained() {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();
        let shape = ViewShape::builder("Buttons")
            .template(r#"<div><button class="ok"></button><button class="bad"></button></div>"#)
            .event("click .ok", move |_, _, _| {
                counter.set(counter.get() + 1);
                Ok(())
            })
            .event("click .bad", |_, _, _| Err(Error::route("boom")))
            .build()
            .unwrap();
        let view = View::new(toolkit(), &shape, ViewConfig::new());
        view.render().unwrap();

        click(&select(&view, ".bad"));
        click(&select(&view, ".ok"));
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_event_declaration_errors() {
        let result = ViewShape::builder("Bad")
            .event("   ", |_, _, _| Ok(()))
            .build();
        assert!(result.is_err());
    }
}
