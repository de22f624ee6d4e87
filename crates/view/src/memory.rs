//! In-memory rendering backend.
//!
//! `MemoryToolkit` builds `MemoryElement` trees from a small markup language
//! (`<li class="todo"><label class="todo-text"></label></li>`) and supports
//! simple selectors: `tag`, `.class`, `#id`, `[attr]`, `[attr=value]`, their
//! compounds (`input.todo-edit`) and the descendant combinator.
//!
//! It is a headless backend for tests and demos, not a DOM.

use crate::element::{bubble, Control, Element, ElementRef, Event, EventListener, Toolkit};
use hashbrown::HashMap;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use voodoo_core::{next_subscription_id, Error, Result, SubscriptionId};

/// Elements that never have children.
const VOID_TAGS: &[&str] = &["input", "br", "hr", "img", "meta", "link"];

struct Listener {
    id: SubscriptionId,
    kind: String,
    callback: EventListener,
}

/// A node of an in-memory surface.
pub struct MemoryElement {
    this: Weak<MemoryElement>,
    tag: String,
    attrs: RefCell<Vec<(String, String)>>,
    classes: RefCell<Vec<String>>,
    parent: RefCell<Weak<MemoryElement>>,
    children: RefCell<Vec<Rc<MemoryElement>>>,
    value: RefCell<String>,
    checked: Cell<bool>,
    content: RefCell<String>,
    hidden: Cell<bool>,
    listeners: RefCell<Vec<Listener>>,
}

impl MemoryElement {
    /// Creates a detached element.
    pub fn new(tag: impl Into<String>) -> Rc<Self> {
        Rc::new_cyclic(|this| Self {
            this: this.clone(),
            tag: tag.into().to_ascii_lowercase(),
            attrs: RefCell::new(Vec::new()),
            classes: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            value: RefCell::new(String::new()),
            checked: Cell::new(false),
            content: RefCell::new(String::new()),
            hidden: Cell::new(false),
            listeners: RefCell::new(Vec::new()),
        })
    }

    /// Downcasts a type-erased element.
    pub fn from_ref(element: &ElementRef) -> Option<Rc<Self>> {
        Rc::clone(element).into_any().downcast::<Self>().ok()
    }

    /// Returns the text content of this element and its descendants.
    pub fn text(&self) -> String {
        let mut out = self.content.borrow().clone();
        for child in self.children.borrow().iter() {
            out.push_str(&child.text());
        }
        out
    }

    /// Returns the class list in insertion order.
    pub fn classes(&self) -> Vec<String> {
        self.classes.borrow().clone()
    }

    /// Returns the number of listeners attached to this element.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    fn to_ref(&self) -> Option<ElementRef> {
        self.this.upgrade().map(|rc| {
            let element: ElementRef = rc;
            element
        })
    }

    fn is_ancestor_of(&self, other: &MemoryElement) -> bool {
        let mut current = other.parent.borrow().upgrade();
        while let Some(node) = current {
            if std::ptr::eq(&*node, self) {
                return true;
            }
            current = node.parent.borrow().upgrade();
        }
        false
    }

    fn adopt(&self, child: &ElementRef) -> Option<Rc<MemoryElement>> {
        let child = match MemoryElement::from_ref(child) {
            Some(child) => child,
            None => {
                tracing::warn!(message = "memory.foreign_element", parent = %self.tag);
                return None;
            }
        };
        if std::ptr::eq(&*child, self) || child.is_ancestor_of(self) {
            tracing::warn!(message = "memory.cyclic_append", parent = %self.tag);
            return None;
        }
        child.detach_self();
        *child.parent.borrow_mut() = self.this.clone();
        Some(child)
    }

    fn detach_self(&self) {
        let parent = self.parent.borrow().upgrade();
        if let Some(parent) = parent {
            parent
                .children
                .borrow_mut()
                .retain(|c| !std::ptr::eq(&**c, self));
        }
        *self.parent.borrow_mut() = Weak::new();
    }

    fn walk(&self, out: &mut Vec<Rc<MemoryElement>>) {
        for child in self.children.borrow().iter() {
            out.push(Rc::clone(child));
            child.walk(out);
        }
    }

    fn matches_compound(&self, compound: &Compound) -> bool {
        if let Some(tag) = &compound.tag {
            if *tag != self.tag {
                return false;
            }
        }
        if let Some(id) = &compound.id {
            if self.attr_value("id").as_deref() != Some(id.as_str()) {
                return false;
            }
        }
        let classes = self.classes.borrow();
        if !compound.classes.iter().all(|c| classes.contains(c)) {
            return false;
        }
        compound.attrs.iter().all(|(name, expected)| {
            match (self.attr_value(name), expected) {
                (Some(actual), Some(expected)) => actual == *expected,
                (Some(_), None) => true,
                (None, _) => false,
            }
        })
    }

    fn matches_selector(&self, selector: &Selector) -> bool {
        let (last, ancestors) = match selector.compounds.split_last() {
            Some(split) => split,
            None => return false,
        };
        if !self.matches_compound(last) {
            return false;
        }
        let mut remaining = ancestors.iter().rev().peekable();
        let mut current = self.parent.borrow().upgrade();
        while let (Some(compound), Some(node)) = (remaining.peek(), current.clone()) {
            if node.matches_compound(compound) {
                remaining.next();
            }
            current = node.parent.borrow().upgrade();
        }
        remaining.peek().is_none()
    }

    fn attr_value(&self, name: &str) -> Option<String> {
        self.attrs
            .borrow()
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.clone())
    }
}

impl Element for MemoryElement {
    fn tag(&self) -> String {
        self.tag.clone()
    }

    fn attr(&self, name: &str) -> Option<String> {
        match name {
            "class" => Some(self.classes.borrow().join(" ")),
            _ => self.attr_value(name),
        }
    }

    fn set_attr(&self, name: &str, value: &str) {
        match name {
            "class" => {
                *self.classes.borrow_mut() = value.split_whitespace().map(String::from).collect();
            }
            "value" => *self.value.borrow_mut() = value.to_string(),
            "checked" => self.checked.set(true),
            "hidden" => self.hidden.set(true),
            _ => {}
        }
        let mut attrs = self.attrs.borrow_mut();
        match attrs.iter_mut().find(|(k, _)| k == name) {
            Some(slot) => slot.1 = value.to_string(),
            None => attrs.push((name.to_string(), value.to_string())),
        }
    }

    fn select(&self, selector: &str) -> Option<ElementRef> {
        let selector = Selector::parse(selector);
        let mut nodes = Vec::new();
        self.walk(&mut nodes);
        nodes
            .into_iter()
            .find(|n| n.matches_selector(&selector))
            .map(|n| {
                let element: ElementRef = n;
                element
            })
    }

    fn select_all(&self, selector: &str) -> Vec<ElementRef> {
        let selector = Selector::parse(selector);
        let mut nodes = Vec::new();
        self.walk(&mut nodes);
        nodes
            .into_iter()
            .filter(|n| n.matches_selector(&selector))
            .map(|n| {
                let element: ElementRef = n;
                element
            })
            .collect()
    }

    fn matches(&self, selector: &str) -> bool {
        self.matches_selector(&Selector::parse(selector))
    }

    fn closest(&self, selector: &str) -> Option<ElementRef> {
        let selector = Selector::parse(selector);
        let mut current = self.this.upgrade();
        while let Some(node) = current {
            if node.matches_selector(&selector) {
                return node.to_ref();
            }
            current = node.parent.borrow().upgrade();
        }
        None
    }

    fn parent(&self) -> Option<ElementRef> {
        self.parent.borrow().upgrade().map(|p| {
            let element: ElementRef = p;
            element
        })
    }

    fn children(&self) -> Vec<ElementRef> {
        self.children
            .borrow()
            .iter()
            .map(|c| {
                let element: ElementRef = c.clone();
                element
            })
            .collect()
    }

    fn contains(&self, other: &ElementRef) -> bool {
        match MemoryElement::from_ref(other) {
            Some(other) => std::ptr::eq(&*other, self) || self.is_ancestor_of(&other),
            None => false,
        }
    }

    fn append(&self, child: ElementRef) {
        if let Some(child) = self.adopt(&child) {
            self.children.borrow_mut().push(child);
        }
    }

    fn insert_at(&self, index: usize, child: ElementRef) {
        if let Some(child) = self.adopt(&child) {
            let mut children = self.children.borrow_mut();
            let index = index.min(children.len());
            children.insert(index, child);
        }
    }

    fn remove_child(&self, child: &ElementRef) -> bool {
        let child = match MemoryElement::from_ref(child) {
            Some(child) => child,
            None => return false,
        };
        let removed = {
            let mut children = self.children.borrow_mut();
            let before = children.len();
            children.retain(|c| !Rc::ptr_eq(c, &child));
            before != children.len()
        };
        if removed {
            *child.parent.borrow_mut() = Weak::new();
        }
        removed
    }

    fn clear(&self) {
        let children: Vec<Rc<MemoryElement>> = self.children.borrow_mut().drain(..).collect();
        for child in children {
            *child.parent.borrow_mut() = Weak::new();
        }
        self.content.borrow_mut().clear();
    }

    fn detach(&self) {
        self.detach_self();
    }

    fn control(&self) -> Control {
        match self.tag.as_str() {
            "input" => match self.attr_value("type").as_deref() {
                Some("checkbox") | Some("radio") => Control::Checkable,
                _ => Control::Value,
            },
            "textarea" | "select" => Control::Value,
            _ => Control::Content,
        }
    }

    fn value(&self) -> String {
        self.value.borrow().clone()
    }

    fn set_value(&self, value: &str) {
        *self.value.borrow_mut() = value.to_string();
    }

    fn checked(&self) -> bool {
        self.checked.get()
    }

    fn set_checked(&self, checked: bool) {
        self.checked.set(checked);
    }

    fn content(&self) -> String {
        self.content.borrow().clone()
    }

    fn set_content(&self, content: &str) {
        self.clear();
        *self.content.borrow_mut() = content.to_string();
    }

    fn has_class(&self, class: &str) -> bool {
        self.classes.borrow().iter().any(|c| c == class)
    }

    fn add_class(&self, class: &str) {
        if !self.has_class(class) {
            self.classes.borrow_mut().push(class.to_string());
        }
    }

    fn remove_class(&self, class: &str) {
        self.classes.borrow_mut().retain(|c| c != class);
    }

    fn is_hidden(&self) -> bool {
        self.hidden.get()
    }

    fn show(&self) {
        self.hidden.set(false);
    }

    fn hide(&self) {
        self.hidden.set(true);
    }

    fn on_event(&self, kind: &str, listener: EventListener) -> SubscriptionId {
        let id = next_subscription_id();
        self.listeners.borrow_mut().push(Listener {
            id,
            kind: kind.to_string(),
            callback: listener,
        });
        id
    }

    fn off_event(&self, id: SubscriptionId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|l| l.id != id);
        before != listeners.len()
    }

    fn dispatch(&self, event: &Event) {
        let snapshot: Vec<(SubscriptionId, EventListener)> = self
            .listeners
            .borrow()
            .iter()
            .filter(|l| l.kind == event.kind())
            .map(|l| (l.id, Rc::clone(&l.callback)))
            .collect();
        for (id, callback) in snapshot {
            let live = self.listeners.borrow().iter().any(|l| l.id == id);
            if live {
                callback(event);
            }
        }
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}

/// One compound selector: `tag#id.class[attr=value]`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    id: Option<String>,
    classes: Vec<String>,
    attrs: Vec<(String, Option<String>)>,
}

/// Compounds joined by the descendant combinator.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct Selector {
    compounds: Vec<Compound>,
}

impl Selector {
    /// Parses a selector. Malformed input yields a selector matching nothing.
    fn parse(source: &str) -> Self {
        let mut compounds = Vec::new();
        for part in source.split_whitespace() {
            match Compound::parse(part) {
                Some(compound) => compounds.push(compound),
                None => return Self::default(),
            }
        }
        Self { compounds }
    }
}

impl Compound {
    fn parse(part: &str) -> Option<Self> {
        let mut compound = Compound::default();
        let mut rest = part;

        let tag_end = rest.find(['.', '#', '[']).unwrap_or(rest.len());
        if tag_end > 0 {
            let tag = &rest[..tag_end];
            if tag != "*" {
                compound.tag = Some(tag.to_ascii_lowercase());
            }
        }
        rest = &rest[tag_end..];

        while let Some(marker) = rest.chars().next() {
            rest = &rest[1..];
            match marker {
                '.' | '#' => {
                    let end = rest.find(['.', '#', '[']).unwrap_or(rest.len());
                    let name = &rest[..end];
                    if name.is_empty() {
                        return None;
                    }
                    if marker == '.' {
                        compound.classes.push(name.to_string());
                    } else {
                        compound.id = Some(name.to_string());
                    }
                    rest = &rest[end..];
                }
                '[' => {
                    let end = rest.find(']')?;
                    let body = &rest[..end];
                    let (name, value) = match body.split_once('=') {
                        Some((name, value)) => {
                            let value = value.trim_matches(|c| c == '"' || c == '\'');
                            (name.trim(), Some(value.to_string()))
                        }
                        None => (body.trim(), None),
                    };
                    if name.is_empty() {
                        return None;
                    }
                    compound.attrs.push((name.to_string(), value));
                    rest = &rest[end + 1..];
                }
                _ => return None,
            }
        }
        Some(compound)
    }
}

/// Builds [`MemoryElement`] trees from markup.
///
/// Templates starting with `#` name a template registered with
/// [`MemoryToolkit::register`]; anything else is parsed as markup.
#[derive(Default)]
pub struct MemoryToolkit {
    templates: RefCell<HashMap<String, String>>,
}

impl MemoryToolkit {
    /// Creates a toolkit with no registered templates.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers markup under `name` (without the leading `#`).
    pub fn register(&self, name: impl Into<String>, markup: impl Into<String>) {
        self.templates
            .borrow_mut()
            .insert(name.into(), markup.into());
    }

    /// Parses markup into a detached element tree.
    pub fn parse(markup: &str) -> Result<Rc<MemoryElement>> {
        MarkupParser::new(markup).parse()
    }
}

impl Toolkit for MemoryToolkit {
    fn instantiate(&self, template: &str) -> Result<ElementRef> {
        let markup = match template.trim().strip_prefix('#') {
            Some(name) => self
                .templates
                .borrow()
                .get(name)
                .cloned()
                .ok_or_else(|| Error::template(template, "unknown template"))?,
            None => template.to_string(),
        };
        let root: ElementRef = Self::parse(&markup)?;
        Ok(root)
    }

    fn container(&self) -> ElementRef {
        MemoryElement::new("div")
    }
}

struct MarkupParser<'a> {
    source: &'a str,
    stack: Vec<Rc<MemoryElement>>,
    roots: Vec<Rc<MemoryElement>>,
}

impl<'a> MarkupParser<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            stack: Vec::new(),
            roots: Vec::new(),
        }
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::template(self.source, message)
    }

    fn parse(mut self) -> Result<Rc<MemoryElement>> {
        let mut rest = self.source;
        while let Some(open) = rest.find('<') {
            self.text(&rest[..open])?;
            rest = &rest[open..];
            let close = rest.find('>').ok_or_else(|| self.error("unterminated tag"))?;
            let tag = &rest[1..close];
            rest = &rest[close + 1..];

            if let Some(name) = tag.strip_prefix('/') {
                self.close(name.trim())?;
            } else {
                self.open(tag)?;
            }
        }
        self.text(rest)?;

        if let Some(open) = self.stack.last() {
            return Err(self.error(format!("unclosed <{}>", open.tag)));
        }
        if self.roots.len() != 1 {
            return Err(self.error("template must have exactly one root element"));
        }
        self.roots
            .pop()
            .ok_or_else(|| self.error("empty template"))
    }

    fn text(&mut self, text: &str) -> Result<()> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }
        match self.stack.last() {
            Some(parent) => {
                parent.content.borrow_mut().push_str(text);
                Ok(())
            }
            None => Err(self.error("text outside the root element")),
        }
    }

    fn open(&mut self, tag: &str) -> Result<()> {
        let self_closing = tag.trim_end().ends_with('/');
        let body = tag.trim_end().trim_end_matches('/');
        let (name, attrs) = match body.find(char::is_whitespace) {
            Some(split) => (&body[..split], &body[split..]),
            None => (body, ""),
        };
        if name.is_empty() {
            return Err(self.error("missing tag name"));
        }

        let element = MemoryElement::new(name);
        for (key, value) in parse_attrs(attrs).map_err(|m| self.error(m))? {
            element.set_attr(&key, &value);
        }
        match self.stack.last() {
            Some(parent) => {
                *element.parent.borrow_mut() = Rc::downgrade(parent);
                parent.children.borrow_mut().push(Rc::clone(&element));
            }
            None => self.roots.push(Rc::clone(&element)),
        }
        if !self_closing && !VOID_TAGS.contains(&element.tag.as_str()) {
            self.stack.push(element);
        }
        Ok(())
    }

    fn close(&mut self, name: &str) -> Result<()> {
        match self.stack.pop() {
            Some(open) if open.tag.eq_ignore_ascii_case(name) => Ok(()),
            Some(open) => Err(self.error(format!(
                "mismatched </{}>, expected </{}>",
                name, open.tag
            ))),
            None => Err(self.error(format!("unexpected </{}>", name))),
        }
    }
}

/// Parses `a="x" b='y' c=z d` into pairs; bare names get an empty value.
fn parse_attrs(source: &str) -> std::result::Result<Vec<(String, String)>, String> {
    let mut attrs = Vec::new();
    let mut rest = source.trim_start();
    while !rest.is_empty() {
        let name_end = rest
            .find(|c: char| c == '=' || c.is_whitespace())
            .unwrap_or(rest.len());
        let name = &rest[..name_end];
        if name.is_empty() {
            return Err(format!("malformed attribute near '{}'", rest));
        }
        rest = rest[name_end..].trim_start();

        let value = if let Some(after_eq) = rest.strip_prefix('=') {
            let after_eq = after_eq.trim_start();
            match after_eq.chars().next() {
                Some(quote @ ('"' | '\'')) => {
                    let body = &after_eq[1..];
                    let end = body
                        .find(quote)
                        .ok_or_else(|| format!("unterminated value for '{}'", name))?;
                    rest = &body[end + 1..];
                    body[..end].to_string()
                }
                _ => {
                    let end = after_eq.find(char::is_whitespace).unwrap_or(after_eq.len());
                    rest = &after_eq[end..];
                    after_eq[..end].to_string()
                }
            }
        } else {
            String::new()
        };
        attrs.push((name.to_ascii_lowercase(), value));
        rest = rest.trim_start();
    }
    Ok(attrs)
}

/// Clicks `target`, bubbling a `click` event.
pub fn click(target: &ElementRef) -> Event {
    bubble(target, "click")
}

/// Types `text` into a value control, bubbling an `input` event.
pub fn type_text(target: &ElementRef, text: &str) -> Event {
    target.set_value(text);
    bubble(target, "input")
}

/// Flips a checkable control, bubbling a `change` event.
pub fn toggle(target: &ElementRef) -> Event {
    target.set_checked(!target.checked());
    bubble(target, "change")
}
