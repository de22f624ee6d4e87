//! Binding resolver.
//!
//! An area binds a region of a view's surface to an expression evaluated
//! against the view context. Every evaluation is classified into a closed
//! [`Resolved`] value that says how the region displays it, and one
//! [`PathWatch`] per dependency re-runs the evaluation for that area only.

use crate::element::{Control, ElementRef, Surface};
use crate::view::View;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use voodoo_core::{
    assign, downcast, same_object, Delta, Error, Expression, Member, ObjectKind, ObjectRef, Path,
    Result, SubscriptionId, Template, Value,
};
use voodoo_reactive::PathWatch;

/// Builds the child view displayed for one collection member.
pub type ItemFactory = Rc<dyn Fn(&Rc<View>, &ObjectRef) -> Result<Rc<View>>>;

/// Data flow of an area.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Model to surface only.
    #[default]
    OneWay,
    /// Model to surface, and surface edits written back to the model.
    TwoWay,
}

/// A declared area: region selector, expression and direction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AreaSpec {
    selector: String,
    source: String,
    expr: Expression,
    qualifier: Option<String>,
    direction: Direction,
}

impl AreaSpec {
    /// Parses an area declaration.
    ///
    /// A path expression may carry a `:property` qualifier
    /// (`todos:todo_view`), naming the member property that holds each
    /// member's child view when the path resolves to a collection.
    /// Template expressions are always one-way.
    pub fn parse(selector: &str, source: &str, direction: Direction) -> Result<Self> {
        let (expr_source, qualifier) = match source.split_once(':') {
            Some((expr, qualifier)) if !Template::is_template(source) => {
                let qualifier = qualifier.trim();
                if qualifier.is_empty() {
                    return Err(Error::invalid_binding(source, "empty qualifier"));
                }
                (expr, Some(qualifier.to_string()))
            }
            _ => (source, None),
        };
        let expr = Expression::parse(expr_source)?;
        if expr.is_template() && direction == Direction::TwoWay {
            return Err(Error::invalid_binding(
                source,
                "template expressions are one-way",
            ));
        }
        Ok(Self {
            selector: selector.trim().to_string(),
            source: source.to_string(),
            expr,
            qualifier,
            direction,
        })
    }

    #[inline]
    pub fn selector(&self) -> &str {
        &self.selector
    }

    /// Returns the expression as declared.
    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[inline]
    pub fn expression(&self) -> &Expression {
        &self.expr
    }

    #[inline]
    pub fn qualifier(&self) -> Option<&str> {
        self.qualifier.as_deref()
    }

    #[inline]
    pub fn direction(&self) -> Direction {
        self.direction
    }
}

/// Something a region can display in place of its content.
#[derive(Clone)]
pub enum SurfaceRef {
    Element(ElementRef),
    /// A view; it is rendered before being attached.
    View(Rc<View>),
}

/// How a region displays an evaluated expression.
#[derive(Clone)]
pub enum Resolved {
    Surface(SurfaceRef),
    /// One child view per member.
    Collection(ObjectRef),
    Checked(bool),
    Value(String),
    Content(String),
    Hidden,
}

impl Resolved {
    /// Returns the variant name, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Resolved::Surface(_) => "surface",
            Resolved::Collection(_) => "collection",
            Resolved::Checked(_) => "checked",
            Resolved::Value(_) => "value",
            Resolved::Content(_) => "content",
            Resolved::Hidden => "hidden",
        }
    }
}

/// Classifies `value` for a region with capability `control`.
///
/// Priority: surface reference, collection, boolean on a checkable region,
/// string or number on a value region, string or number on a content region,
/// otherwise hidden.
pub fn classify(value: &Value, control: Control) -> Resolved {
    match value {
        Value::Object(object) => match object.kind() {
            ObjectKind::Surface => match downcast::<Surface>(object) {
                Some(surface) => {
                    Resolved::Surface(SurfaceRef::Element(Rc::clone(surface.element())))
                }
                None => Resolved::Hidden,
            },
            ObjectKind::View => match downcast::<View>(object) {
                Some(view) => Resolved::Surface(SurfaceRef::View(view)),
                None => Resolved::Hidden,
            },
            _ if object.as_collection().is_some() => Resolved::Collection(Rc::clone(object)),
            _ => Resolved::Hidden,
        },
        Value::Bool(checked) if control == Control::Checkable => Resolved::Checked(*checked),
        Value::Int(_) | Value::Float(_) | Value::String(_) => match control {
            Control::Value => Resolved::Value(value.to_text()),
            Control::Content => Resolved::Content(value.to_text()),
            Control::Checkable => Resolved::Hidden,
        },
        _ => Resolved::Hidden,
    }
}

/// Evaluates an expression against the view context.
pub(crate) fn evaluate(host: &View, expr: &Expression) -> Result<Value> {
    match expr {
        Expression::Path(path) => host.lookup(path),
        Expression::Template(template) => {
            let mut failure = None;
            let text = template.render(|path| match host.lookup(path) {
                Ok(value) => value.to_text(),
                Err(err) => {
                    failure.get_or_insert(err);
                    String::new()
                }
            });
            match failure {
                Some(err) => Err(err),
                None => Ok(Value::String(text)),
            }
        }
    }
}

/// Installs one watch per path, calling `on_change` whenever any of them
/// changes.
pub(crate) fn watch_dependencies<F>(
    host: &View,
    paths: Vec<Path>,
    on_change: F,
) -> Result<Vec<PathWatch>>
where
    F: Fn() + 'static,
{
    let on_change = Rc::new(on_change);
    let mut watches = Vec::new();
    for path in paths {
        let holder = host.holder(&path)?;
        let callback = Rc::clone(&on_change);
        watches.push(PathWatch::watch(holder, path, move |_| callback())?);
    }
    Ok(watches)
}

/// What an area currently shows, kept so it can be undone.
enum AreaState {
    Empty,
    Surface(ElementRef),
    Collection(CollectionBridge),
    Checked,
    Value,
    Content,
    Hidden,
}

/// A live area on a rendered view.
pub(crate) struct AreaBinding {
    spec: AreaSpec,
    region: ElementRef,
    host: Weak<View>,
    watches: RefCell<Vec<PathWatch>>,
    state: RefCell<AreaState>,
    write_back: Cell<Option<SubscriptionId>>,
    active: Cell<bool>,
}

impl AreaBinding {
    /// Installs `spec` on `host`. Errors from the first evaluation propagate;
    /// later ones are logged.
    pub(crate) fn install(host: &Rc<View>, spec: &AreaSpec) -> Result<Rc<Self>> {
        let region = host.region(spec.selector())?;
        if spec.direction() == Direction::TwoWay && region.control().edit_event().is_none() {
            return Err(Error::invalid_binding(
                spec.source(),
                format!("region '{}' is not editable", spec.selector()),
            ));
        }

        let binding = Rc::new(Self {
            spec: spec.clone(),
            region,
            host: Rc::downgrade(host),
            watches: RefCell::new(Vec::new()),
            state: RefCell::new(AreaState::Empty),
            write_back: Cell::new(None),
            active: Cell::new(true),
        });

        let weak = Rc::downgrade(&binding);
        let watches = watch_dependencies(host, spec.expression().dependencies(), move || {
            if let Some(binding) = weak.upgrade() {
                binding.refresh_logged();
            }
        })?;
        *binding.watches.borrow_mut() = watches;

        if let Err(err) = binding.refresh() {
            binding.teardown();
            return Err(err);
        }
        if spec.direction() == Direction::TwoWay {
            binding.attach_write_back();
        }
        Ok(binding)
    }

    pub(crate) fn spec(&self) -> &AreaSpec {
        &self.spec
    }

    /// Returns the variant the area last displayed.
    pub(crate) fn state_name(&self) -> &'static str {
        match &*self.state.borrow() {
            AreaState::Empty => "empty",
            AreaState::Surface(_) => "surface",
            AreaState::Collection(_) => "collection",
            AreaState::Checked => "checked",
            AreaState::Value => "value",
            AreaState::Content => "content",
            AreaState::Hidden => "hidden",
        }
    }

    fn refresh_logged(&self) {
        if let Err(err) = self.refresh() {
            tracing::warn!(
                message = "binding.refresh_failed",
                area = %self.spec.source(),
                %err
            );
        }
    }

    fn refresh(&self) -> Result<()> {
        if !self.active.get() {
            return Ok(());
        }
        let host = match self.host.upgrade() {
            Some(host) => host,
            None => return Ok(()),
        };
        let value = evaluate(&host, self.spec.expression())?;
        let resolved = classify(&value, self.region.control());
        tracing::trace!(
            message = "binding.apply",
            area = %self.spec.source(),
            resolved = resolved.name()
        );
        self.apply(&host, resolved)
    }

    fn apply(&self, host: &Rc<View>, resolved: Resolved) -> Result<()> {
        if let (AreaState::Collection(bridge), Resolved::Collection(next)) =
            (&*self.state.borrow(), &resolved)
        {
            if same_object(bridge.collection(), next) {
                return Ok(());
            }
        }

        let previous = self.state.replace(AreaState::Empty);
        previous.undo();

        let next = match resolved {
            Resolved::Surface(SurfaceRef::Element(element)) => {
                self.region.clear();
                self.region.append(Rc::clone(&element));
                AreaState::Surface(element)
            }
            Resolved::Surface(SurfaceRef::View(view)) => {
                let element = match view.root() {
                    Some(root) if view.is_rendered() => root,
                    _ => view.render()?,
                };
                self.region.clear();
                self.region.append(Rc::clone(&element));
                AreaState::Surface(element)
            }
            Resolved::Collection(collection) => AreaState::Collection(CollectionBridge::install(
                host,
                &self.spec,
                &self.region,
                collection,
            )?),
            Resolved::Checked(checked) => {
                self.region.set_checked(checked);
                AreaState::Checked
            }
            Resolved::Value(value) => {
                self.region.set_value(&value);
                AreaState::Value
            }
            Resolved::Content(content) => {
                self.region.set_content(&content);
                AreaState::Content
            }
            Resolved::Hidden => {
                self.region.hide();
                AreaState::Hidden
            }
        };
        if !matches!(next, AreaState::Hidden) {
            self.region.show();
        }
        *self.state.borrow_mut() = next;
        Ok(())
    }

    fn attach_write_back(self: &Rc<Self>) {
        let control = self.region.control();
        let event = match control.edit_event() {
            Some(event) => event,
            None => return,
        };
        let weak = Rc::downgrade(self);
        let id = self.region.on_event(
            event,
            Rc::new(move |_| {
                if let Some(binding) = weak.upgrade() {
                    if let Err(err) = binding.write_back(control) {
                        tracing::warn!(
                            message = "binding.write_back_failed",
                            area = %binding.spec.source(),
                            %err
                        );
                    }
                }
            }),
        );
        self.write_back.set(Some(id));
    }

    fn write_back(&self, control: Control) -> Result<()> {
        let host = match (self.active.get(), self.host.upgrade()) {
            (true, Some(host)) => host,
            _ => return Ok(()),
        };
        let path = match self.spec.expression() {
            Expression::Path(path) => path,
            Expression::Template(_) => return Ok(()),
        };
        let value = match control {
            Control::Checkable => Value::Bool(self.region.checked()),
            Control::Value => Value::String(self.region.value()),
            Control::Content => return Ok(()),
        };
        tracing::trace!(message = "binding.write_back", %path);
        let holder = host.holder(path)?;
        assign(holder.as_ref(), path, value).map(|_| ())
    }

    /// Removes every watch and listener and undoes what the area displays.
    pub(crate) fn teardown(&self) {
        if !self.active.replace(false) {
            return;
        }
        for watch in self.watches.borrow_mut().drain(..) {
            watch.cancel();
        }
        if let Some(id) = self.write_back.take() {
            self.region.off_event(id);
        }
        let previous = self.state.replace(AreaState::Empty);
        previous.undo();
    }
}

impl AreaState {
    fn undo(self) {
        match self {
            AreaState::Surface(element) => element.detach(),
            AreaState::Collection(bridge) => bridge.teardown(),
            AreaState::Empty
            | AreaState::Checked
            | AreaState::Value
            | AreaState::Content
            | AreaState::Hidden => {}
        }
    }
}

struct Child {
    view: Rc<View>,
    owned: bool,
}

impl Child {
    fn release(self) {
        if self.owned {
            self.view.destroy();
        } else if let Some(root) = self.view.root() {
            root.detach();
        }
    }
}

struct BridgeInner {
    collection: ObjectRef,
    region: ElementRef,
    host: Weak<View>,
    source: String,
    qualifier: Option<String>,
    factory: Option<ItemFactory>,
    /// One slot per member, in member order. `None` marks a member whose
    /// child view could not be built.
    children: RefCell<Vec<Option<Child>>>,
    listener: Cell<Option<SubscriptionId>>,
}

/// Keeps one child view per member of a collection inside a region.
pub(crate) struct CollectionBridge {
    inner: Rc<BridgeInner>,
}

impl CollectionBridge {
    fn install(
        host: &Rc<View>,
        spec: &AreaSpec,
        region: &ElementRef,
        collection: ObjectRef,
    ) -> Result<Self> {
        let factory = host.item_factory(spec.selector());
        if spec.qualifier().is_none() && factory.is_none() {
            return Err(Error::invalid_binding(
                spec.source(),
                "collection area needs a qualifier or an item view",
            ));
        }
        let members = match collection.as_collection() {
            Some(members) => members.members(),
            None => {
                return Err(Error::invalid_binding(spec.source(), "not a collection"));
            }
        };

        region.clear();
        let bridge = Self {
            inner: Rc::new(BridgeInner {
                collection,
                region: Rc::clone(region),
                host: Rc::downgrade(host),
                source: spec.source().to_string(),
                qualifier: spec.qualifier().map(String::from),
                factory,
                children: RefCell::new(Vec::new()),
                listener: Cell::new(None),
            }),
        };

        for (index, member) in members.into_iter().enumerate() {
            if let Err(err) = bridge.inner.insert(host, index, &member) {
                bridge.teardown();
                return Err(err);
            }
        }

        let weak = Rc::downgrade(&bridge.inner);
        let listener = bridge.inner.collection.as_collection().map(|members| {
            members.observe(Rc::new(move |delta: &Delta<Member>| {
                if let Some(inner) = weak.upgrade() {
                    inner.on_membership(delta);
                }
            }))
        });
        bridge.inner.listener.set(listener);

        tracing::debug!(
            message = "binding.collection",
            area = %bridge.inner.source,
            children = bridge.inner.children.borrow().len()
        );
        Ok(bridge)
    }

    fn collection(&self) -> &ObjectRef {
        &self.inner.collection
    }

    fn teardown(self) {
        let inner = self.inner;
        if let (Some(id), Some(members)) = (inner.listener.take(), inner.collection.as_collection())
        {
            members.unobserve(id);
        }
        let children: Vec<Option<Child>> = inner.children.borrow_mut().drain(..).collect();
        for child in children.into_iter().flatten() {
            child.release();
        }
    }
}

impl BridgeInner {
    fn on_membership(&self, delta: &Delta<Member>) {
        let host = match self.host.upgrade() {
            Some(host) => host,
            None => return,
        };
        let Member { index, item } = &delta.data;
        if delta.is_insert() {
            if let Err(err) = self.insert(&host, *index, item) {
                tracing::warn!(
                    message = "binding.child_failed",
                    area = %self.source,
                    index,
                    %err
                );
                let mut children = self.children.borrow_mut();
                let index = (*index).min(children.len());
                children.insert(index, None);
            }
        } else if delta.is_delete() {
            let removed = {
                let mut children = self.children.borrow_mut();
                (*index < children.len()).then(|| children.remove(*index))
            };
            if let Some(Some(child)) = removed {
                child.release();
            }
        }
    }

    fn insert(&self, host: &Rc<View>, index: usize, member: &ObjectRef) -> Result<()> {
        let child = self.make_child(host, member)?;
        let root = match child.view.root() {
            Some(root) if child.view.is_rendered() => root,
            _ => child.view.render()?,
        };

        let mut children = self.children.borrow_mut();
        let index = index.min(children.len());
        let position = children[..index].iter().filter(|c| c.is_some()).count();
        self.region.insert_at(position, root);
        children.insert(index, Some(child));
        Ok(())
    }

    fn make_child(&self, host: &Rc<View>, member: &ObjectRef) -> Result<Child> {
        if let Some(qualifier) = &self.qualifier {
            let view = match member.get(qualifier) {
                Some(Value::Object(object)) => downcast::<View>(&object),
                _ => None,
            };
            return view
                .map(|view| Child { view, owned: false })
                .ok_or_else(|| {
                    Error::invalid_binding(
                        self.source.as_str(),
                        format!("member property '{}' is not a view", qualifier),
                    )
                });
        }
        match &self.factory {
            Some(factory) => Ok(Child {
                view: factory(host, member)?,
                owned: true,
            }),
            None => Err(Error::invalid_binding(
                self.source.as_str(),
                "no item view registered",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::memory::{MemoryElement, MemoryToolkit};
    use crate::Toolkit;
    use voodoo_reactive::Observable;

    fn element(markup: &str) -> ElementRef {
        MemoryToolkit::new().instantiate(markup).unwrap()
    }

    #[test]
    fn test_area_spec_parse() {
        let spec = AreaSpec::parse(".todo-text", "model.text", Direction::TwoWay).unwrap();
        assert_eq!(spec.selector(), ".todo-text");
        assert_eq!(spec.qualifier(), None);
        assert!(!spec.expression().is_template());

        let spec = AreaSpec::parse(".todo-list", "todos:todo_view", Direction::OneWay).unwrap();
        assert_eq!(spec.qualifier(), Some("todo_view"));
        assert_eq!(spec.expression().dependencies()[0].to_string(), "todos");

        let spec =
            AreaSpec::parse(".count", "{{ todos_active.length }} left", Direction::OneWay).unwrap();
        assert!(spec.expression().is_template());
    }

    #[test]
    fn test_area_spec_rejects_two_way_template() {
        let err = AreaSpec::parse(".x", "{{ a }}", Direction::TwoWay).unwrap_err();
        assert!(matches!(err, Error::InvalidBinding { .. }));
        assert!(AreaSpec::parse(".x", "todos:", Direction::OneWay).is_err());
    }

    #[test]
    fn test_classify_priority() {
        let checkbox = element(r#"<input type="checkbox">"#);
        let text = element(r#"<input type="text">"#);
        let label = element("<label></label>");

        assert!(matches!(
            classify(&Value::Bool(true), checkbox.control()),
            Resolved::Checked(true)
        ));
        assert!(matches!(
            classify(&Value::from("Buy milk"), text.control()),
            Resolved::Value(v) if v == "Buy milk"
        ));
        assert!(matches!(
            classify(&Value::Int(3), label.control()),
            Resolved::Content(v) if v == "3"
        ));
        assert!(matches!(
            classify(&Value::Bool(true), label.control()),
            Resolved::Hidden
        ));
        assert!(matches!(
            classify(&Value::Null, text.control()),
            Resolved::Hidden
        ));
        assert!(matches!(
            classify(&Value::from("x"), checkbox.control()),
            Resolved::Hidden
        ));
    }

    #[test]
    fn test_classify_objects() {
        let surface = Surface::value(MemoryElement::new("span"));
        assert!(matches!(
            classify(&surface, Control::Content),
            Resolved::Surface(SurfaceRef::Element(_))
        ));

        let record = Value::object(Rc::new(Observable::new()));
        assert!(matches!(
            classify(&record, Control::Content),
            Resolved::Hidden
        ));
        assert_eq!(classify(&record, Control::Content).name(), "hidden");
    }
}
