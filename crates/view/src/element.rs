//! Surface traits.
//!
//! The binding engine never touches a concrete rendering technology. It talks
//! to an [`Element`] tree produced by a [`Toolkit`], and receives interaction
//! through [`Event`]s bubbled by the toolkit.

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use voodoo_core::{Callback, Error, Object, ObjectKind, Result, SubscriptionId, Value};

/// Shared reference to a surface element.
pub type ElementRef = Rc<dyn Element>;

/// Listener attached to an element for one event type.
pub type EventListener = Rc<dyn Fn(&Event)>;

/// What kind of state a region can display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Control {
    /// Checkboxes and radio buttons.
    Checkable,
    /// Text inputs, text areas and selects.
    Value,
    /// Everything else: the element displays text content.
    Content,
}

impl Control {
    /// Returns the event that signals user edits of this control, if any.
    pub fn edit_event(&self) -> Option<&'static str> {
        match self {
            Control::Checkable => Some("change"),
            Control::Value => Some("input"),
            Control::Content => None,
        }
    }
}

/// An element of a rendered surface.
pub trait Element: Any {
    /// Returns the tag name.
    fn tag(&self) -> String;

    /// Returns an attribute value.
    fn attr(&self, name: &str) -> Option<String>;

    /// Sets an attribute value.
    fn set_attr(&self, name: &str, value: &str);

    /// Returns the first descendant matching `selector`, in document order.
    fn select(&self, selector: &str) -> Option<ElementRef>;

    /// Returns every descendant matching `selector`, in document order.
    fn select_all(&self, selector: &str) -> Vec<ElementRef>;

    /// Returns true if this element matches `selector`.
    fn matches(&self, selector: &str) -> bool;

    /// Returns the nearest inclusive ancestor matching `selector`.
    fn closest(&self, selector: &str) -> Option<ElementRef>;

    /// Returns the parent element.
    fn parent(&self) -> Option<ElementRef>;

    /// Returns the child elements in order.
    fn children(&self) -> Vec<ElementRef>;

    /// Returns true if `other` is this element or one of its descendants.
    fn contains(&self, other: &ElementRef) -> bool;

    /// Appends a child, detaching it from any previous parent.
    fn append(&self, child: ElementRef);

    /// Inserts a child at `index`, clamped to the child count.
    fn insert_at(&self, index: usize, child: ElementRef);

    /// Removes a child. Returns false if it is not a child of this element.
    fn remove_child(&self, child: &ElementRef) -> bool;

    /// Removes every child and the text content.
    fn clear(&self);

    /// Removes this element from its parent.
    fn detach(&self);

    /// Returns the kind of state this element displays.
    fn control(&self) -> Control;

    fn value(&self) -> String;
    fn set_value(&self, value: &str);
    fn checked(&self) -> bool;
    fn set_checked(&self, checked: bool);
    fn content(&self) -> String;
    fn set_content(&self, content: &str);

    fn has_class(&self, class: &str) -> bool;
    fn add_class(&self, class: &str);
    fn remove_class(&self, class: &str);

    fn is_hidden(&self) -> bool;
    fn show(&self);
    fn hide(&self);

    /// Attaches a listener for events of `kind` reaching this element.
    fn on_event(&self, kind: &str, listener: EventListener) -> SubscriptionId;

    /// Removes a listener. Returns true if it was found.
    fn off_event(&self, id: SubscriptionId) -> bool;

    /// Invokes this element's listeners for `event`, without bubbling.
    fn dispatch(&self, event: &Event);

    /// Converts into `Rc<dyn Any>` for downcasting.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// Returns true if both references point at the same element.
#[inline]
pub fn same_element(a: &ElementRef, b: &ElementRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Dispatches an event of `kind` at `target` and bubbles it to the root,
/// stopping early if a listener calls [`Event::stop_propagation`].
pub fn bubble(target: &ElementRef, kind: &str) -> Event {
    let event = Event::new(kind, Rc::clone(target));
    let mut current = Some(Rc::clone(target));
    while let Some(element) = current {
        element.dispatch(&event);
        if event.is_propagation_stopped() {
            break;
        }
        current = element.parent();
    }
    event
}

/// An interaction event.
pub struct Event {
    kind: String,
    target: ElementRef,
    stopped: Cell<bool>,
    default_prevented: Cell<bool>,
}

impl Event {
    /// Creates an event of `kind` originating at `target`.
    pub fn new(kind: impl Into<String>, target: ElementRef) -> Self {
        Self {
            kind: kind.into(),
            target,
            stopped: Cell::new(false),
            default_prevented: Cell::new(false),
        }
    }

    /// Returns the event type, e.g. `click`.
    #[inline]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Returns the element the event originated at.
    #[inline]
    pub fn target(&self) -> &ElementRef {
        &self.target
    }

    /// Stops bubbling after the current element.
    pub fn stop_propagation(&self) {
        self.stopped.set(true);
    }

    pub fn is_propagation_stopped(&self) -> bool {
        self.stopped.get()
    }

    /// Marks the toolkit's default action as cancelled.
    pub fn prevent_default(&self) {
        self.default_prevented.set(true);
    }

    pub fn is_default_prevented(&self) -> bool {
        self.default_prevented.get()
    }
}

impl fmt::Debug for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Event")
            .field("kind", &self.kind)
            .field("target", &self.target.tag())
            .field("stopped", &self.stopped.get())
            .finish()
    }
}

/// Builds surfaces from templates.
pub trait Toolkit {
    /// Instantiates a template into a fresh, detached element.
    fn instantiate(&self, template: &str) -> Result<ElementRef>;

    /// Returns a fresh, empty container element.
    fn container(&self) -> ElementRef;
}

/// An element wrapped as a property value.
///
/// Putting a `Surface` into a view property makes a bound region display the
/// element itself.
pub struct Surface {
    element: ElementRef,
}

impl Surface {
    /// Wraps an element.
    pub fn new(element: ElementRef) -> Rc<Self> {
        Rc::new(Self { element })
    }

    /// Wraps an element into a [`Value`].
    pub fn value(element: ElementRef) -> Value {
        Value::object(Self::new(element))
    }

    /// Returns the wrapped element.
    pub fn element(&self) -> &ElementRef {
        &self.element
    }
}

impl Object for Surface {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Surface
    }

    fn get(&self, _key: &str) -> Option<Value> {
        None
    }

    fn set(&self, key: &str, _value: Value) -> Result<bool> {
        Err(Error::path(key, key))
    }

    fn subscribe(&self, key: &str, _callback: Callback) -> Result<SubscriptionId> {
        Err(Error::path(key, key))
    }

    fn unsubscribe(&self, _id: SubscriptionId) -> bool {
        false
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_edit_events() {
        assert_eq!(Control::Checkable.edit_event(), Some("change"));
        assert_eq!(Control::Value.edit_event(), Some("input"));
        assert_eq!(Control::Content.edit_event(), None);
    }
}
