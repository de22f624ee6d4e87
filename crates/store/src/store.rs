//! Stores.
//!
//! A store is an ordered collection of models with its own request status,
//! an observable `length` and shape-declared properties. Membership changes
//! are broadcast as [`Delta<Member>`] events; derived live sub-collections
//! listen to them.

use crate::live::LiveCollection;
use crate::model::{Model, ModelShape};
use crate::predicate::Predicate;
use crate::source::{DataSource, Response};
use crate::sync::{SyncState, XhrState};
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value as Json;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use voodoo_core::{
    Callback, Collection, Delta, Error, Member, MembershipCallback, Object, ObjectKind, ObjectRef,
    Result, SubscriptionId, Value,
};
use voodoo_reactive::{dispatch, Observable, SubscriptionManager};

/// Splits a fetched body into raw items.
pub type ParseListFn = Rc<dyn Fn(&Json) -> Vec<Json>>;

/// Builds a model from one raw item.
pub type ParseItemFn = Rc<dyn Fn(&Json) -> Rc<Model>>;

const LENGTH: &str = "length";
const STATUS: &str = "status";
const XHR: &str = "xhr";

/// How a successful fetch combines with the current members.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FetchMerge {
    /// Remove every current member, then add the fetched ones.
    #[default]
    Replace,
    /// Keep current members and append the fetched ones.
    Append,
}

struct StoreShapeInner {
    name: String,
    resource: Option<String>,
    source: Option<Rc<dyn DataSource>>,
    properties: Vec<(String, Value)>,
    parse: Option<ParseListFn>,
    parse_item: Option<ParseItemFn>,
    item_shape: ModelShape,
    merge: FetchMerge,
}

/// A reusable store definition.
#[derive(Clone)]
pub struct StoreShape {
    inner: Rc<StoreShapeInner>,
}

impl StoreShape {
    /// Starts building a shape.
    pub fn builder(name: impl Into<String>) -> StoreShapeBuilder {
        StoreShapeBuilder::new(name)
    }

    /// Returns the shape name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the fetch merge policy.
    #[inline]
    pub fn merge(&self) -> FetchMerge {
        self.inner.merge
    }

    /// Creates an empty store.
    pub fn create(&self) -> Rc<Store> {
        Store::new(self)
    }

    /// Builds a model from a raw item.
    pub fn make_item(&self, raw: &Json) -> Rc<Model> {
        match &self.inner.parse_item {
            Some(parse_item) => parse_item(raw),
            None => self.inner.item_shape.create_from_json(raw),
        }
    }

    fn split(&self, body: &Json) -> Vec<Json> {
        match &self.inner.parse {
            Some(parse) => parse(body),
            None => match body {
                Json::Array(items) => items.clone(),
                _ => Vec::new(),
            },
        }
    }
}

/// Builder for [`StoreShape`].
pub struct StoreShapeBuilder {
    name: String,
    resource: Option<String>,
    source: Option<Rc<dyn DataSource>>,
    properties: Vec<(String, Value)>,
    parse: Option<ParseListFn>,
    parse_item: Option<ParseItemFn>,
    item_shape: Option<ModelShape>,
    merge: FetchMerge,
}

impl StoreShapeBuilder {
    /// Creates a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resource: None,
            source: None,
            properties: Vec::new(),
            parse: None,
            parse_item: None,
            item_shape: None,
            merge: FetchMerge::default(),
        }
    }

    /// Sets the resource the store is fetched from.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Sets the data source.
    pub fn source(mut self, source: Rc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Declares an extra observable property such as `title`.
    pub fn property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }

    /// Sets the hook that splits a fetched body into raw items.
    ///
    /// Without it the body must be a JSON array.
    pub fn parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(&Json) -> Vec<Json> + 'static,
    {
        self.parse = Some(Rc::new(parse));
        self
    }

    /// Sets the hook that turns a raw item into a model.
    pub fn parse_item<F>(mut self, parse_item: F) -> Self
    where
        F: Fn(&Json) -> Rc<Model> + 'static,
    {
        self.parse_item = Some(Rc::new(parse_item));
        self
    }

    /// Sets the shape raw items are created with when no `parse_item` hook
    /// is given.
    pub fn item_shape(mut self, shape: ModelShape) -> Self {
        self.item_shape = Some(shape);
        self
    }

    /// Sets the fetch merge policy.
    pub fn merge(mut self, merge: FetchMerge) -> Self {
        self.merge = merge;
        self
    }

    /// Builds the shape.
    pub fn build(self) -> StoreShape {
        let item_shape = match self.item_shape {
            Some(shape) => shape,
            None => ModelShape::builder(format!("{}.item", self.name)).build(),
        };
        StoreShape {
            inner: Rc::new(StoreShapeInner {
                name: self.name,
                resource: self.resource,
                source: self.source,
                properties: self.properties,
                parse: self.parse,
                parse_item: self.parse_item,
                item_shape,
                merge: self.merge,
            }),
        }
    }
}

/// An ordered, observable collection of models.
///
/// # Example
///
/// ```rust
/// use voodoo_core::Value;
/// use voodoo_store::{ModelShape, Predicate, StoreShape};
///
/// let todo = ModelShape::builder("Todo").default("is_done", false).build();
/// let todos = StoreShape::builder("Todos").property("title", "My todo list").build().create();
///
/// for done in [false, true, false] {
///     todos.add(todo.create([("is_done", Value::Bool(done))]));
/// }
///
/// let active = todos.filter(Predicate::new().where_eq("is_done", false)).unwrap();
/// assert_eq!(active.len(), 2);
///
/// todos.at(1).unwrap().set("is_done", false).unwrap();
/// assert_eq!(active.len(), 3);
/// ```
pub struct Store {
    this: Weak<Store>,
    shape: StoreShape,
    members: RefCell<Vec<Rc<Model>>>,
    props: Observable,
    sync: SyncState,
    membership: RefCell<SubscriptionManager<Delta<Member>>>,
    /// Live sub-collections derived from this store
    live: RefCell<Vec<Weak<LiveCollection>>>,
    released: Cell<bool>,
}

impl Store {
    fn new(shape: &StoreShape) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let sync = SyncState::new();
            let props = Observable::new();
            props.declare(LENGTH, Value::Int(0));
            props.declare(STATUS, Value::Int(0));
            props.declare(XHR, Value::object(Rc::clone(sync.xhr())));
            for (key, value) in &shape.inner.properties {
                props.insert(key, value.clone());
            }
            Self {
                this: this.clone(),
                shape: shape.clone(),
                members: RefCell::new(Vec::new()),
                props,
                sync,
                membership: RefCell::new(SubscriptionManager::new()),
                live: RefCell::new(Vec::new()),
                released: Cell::new(false),
            }
        })
    }

    /// Returns the shape name.
    pub fn name(&self) -> &str {
        self.shape.name()
    }

    /// Returns the shape.
    pub fn shape(&self) -> &StoreShape {
        &self.shape
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    /// Returns true if the store has no members.
    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    /// Returns the members in order.
    pub fn models(&self) -> Vec<Rc<Model>> {
        self.members.borrow().clone()
    }

    /// Returns the member at `index`.
    pub fn at(&self, index: usize) -> Option<Rc<Model>> {
        self.members.borrow().get(index).cloned()
    }

    /// Returns the position of `model`, compared by identity.
    pub fn position(&self, model: &Rc<Model>) -> Option<usize> {
        self.members
            .borrow()
            .iter()
            .position(|m| Rc::ptr_eq(m, model))
    }

    /// Returns the store properties.
    pub fn props(&self) -> &Observable {
        &self.props
    }

    /// Returns the value of a store property.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.props.get(key)
    }

    /// Sets a declared store property.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        self.props.set(key, value)
    }

    /// Subscribes to a store property.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&Value) + 'static,
    {
        self.props.subscribe(key, callback)
    }

    /// Subscribes to membership changes.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Delta<Member>) + 'static,
    {
        self.membership.borrow_mut().subscribe(Rc::new(callback))
    }

    /// Returns the status code of the most recent fetch.
    pub fn status(&self) -> i64 {
        self.props.get(STATUS).and_then(|v| v.as_i64()).unwrap_or(0)
    }

    /// Returns the `xhr` record.
    pub fn xhr(&self) -> Rc<Observable> {
        Rc::clone(self.sync.xhr())
    }

    /// Returns the state of the most recent fetch.
    pub fn xhr_state(&self) -> XhrState {
        self.sync.state()
    }

    /// Returns true once [`Store::release`] has run.
    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    /// Appends a model and returns its index.
    ///
    /// A model is a member at most once: adding a current member returns its
    /// index and fires nothing.
    pub fn add(&self, model: Rc<Model>) -> usize {
        if let Some(index) = self.position(&model) {
            tracing::trace!(message = "store.add_duplicate", store = %self.name(), index);
            return index;
        }
        let index = {
            let mut members = self.members.borrow_mut();
            members.push(Rc::clone(&model));
            members.len() - 1
        };
        tracing::debug!(message = "store.add", store = %self.name(), index);
        let item: ObjectRef = model;
        self.emit(Delta::insert(Member::new(index, item)));
        index
    }

    /// Builds a model from a raw item through the shape hooks and appends it.
    pub fn add_json(&self, raw: &Json) -> Rc<Model> {
        let model = self.shape.make_item(raw);
        self.add(Rc::clone(&model));
        model
    }

    /// Removes `model`, compared by identity.
    ///
    /// Returns false if it is not a member.
    pub fn remove(&self, model: &Rc<Model>) -> bool {
        match self.position(model) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }

    /// Removes the member at `index`.
    pub fn remove_at(&self, index: usize) -> Option<Rc<Model>> {
        let model = {
            let mut members = self.members.borrow_mut();
            if index >= members.len() {
                return None;
            }
            members.remove(index)
        };
        tracing::debug!(message = "store.remove", store = %self.name(), index);
        let item: ObjectRef = model.clone();
        self.emit(Delta::delete(Member::new(index, item)));
        Some(model)
    }

    /// Removes every member, last first.
    pub fn clear(&self) {
        while let Some(last) = self.len().checked_sub(1) {
            self.remove_at(last);
        }
    }

    /// Derives a live sub-collection of the members matching `predicate`.
    pub fn filter(&self, predicate: Predicate) -> Result<Rc<LiveCollection>> {
        if self.released.get() {
            return Err(Error::destroyed(self.name()));
        }
        let this = self
            .this
            .upgrade()
            .ok_or_else(|| Error::destroyed(self.name()))?;
        let live = LiveCollection::new(&this, predicate);

        let mut registry = self.live.borrow_mut();
        registry.retain(|weak| weak.strong_count() > 0);
        registry.push(Rc::downgrade(&live));
        Ok(live)
    }

    /// Returns the number of live sub-collections not yet released.
    pub fn live_count(&self) -> usize {
        self.live
            .borrow()
            .iter()
            .filter_map(Weak::upgrade)
            .filter(|live| !live.is_released())
            .count()
    }

    /// Fetches the members from the data source.
    ///
    /// `xhr.state` becomes `loading` immediately. On success the body is
    /// split with the `parse` hook, each item is built with `parse_item`
    /// and membership is replaced or appended according to the merge policy.
    pub fn fetch(&self) -> Result<LocalBoxFuture<'static, ()>> {
        if self.released.get() {
            return Err(Error::destroyed(self.name()));
        }
        let inner = &self.shape.inner;
        let (resource, source) = match (&inner.resource, &inner.source) {
            (Some(resource), Some(source)) => (resource, source),
            _ => return Err(Error::no_data_source(self.name())),
        };

        let epoch = self.sync.begin();
        tracing::debug!(message = "store.fetch", store = %self.name(), %resource);
        let request = source.fetch(resource);
        let this = self.this.clone();
        Ok(async move {
            let response = request.await;
            match this.upgrade() {
                Some(store) => store.complete(epoch, response),
                None => tracing::debug!(message = "store.completion_dropped"),
            }
        }
        .boxed_local())
    }

    /// Releases the store and every live sub-collection derived from it.
    /// Outstanding fetch completions are discarded. Idempotent.
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        self.sync.bump();
        let live: Vec<Weak<LiveCollection>> = self.live.borrow_mut().drain(..).collect();
        for weak in live {
            if let Some(live) = weak.upgrade() {
                live.release();
            }
        }
        tracing::debug!(message = "store.release", store = %self.name());
    }

    fn complete(&self, epoch: u64, response: Response) {
        if self.released.get() || !self.sync.is_current(epoch) {
            tracing::debug!(
                message = "store.stale_completion",
                store = %self.name(),
                epoch,
                current = self.sync.epoch()
            );
            return;
        }
        if response.is_success() {
            let items = self.shape.split(&response.body);
            if self.shape.merge() == FetchMerge::Replace {
                self.clear();
            }
            for raw in &items {
                self.add_json(raw);
            }
        }
        tracing::debug!(
            message = "store.complete",
            store = %self.name(),
            status = response.status
        );
        self.sync.finish(&self.props, &response);
    }

    /// Broadcasts a membership change, then updates `length`.
    fn emit(&self, delta: Delta<Member>) {
        let snapshot = self.membership.borrow().snapshot();
        dispatch(&snapshot, &delta);
        self.props.insert(LENGTH, self.len());
    }
}

impl Collection for Store {
    fn members(&self) -> Vec<ObjectRef> {
        self.members
            .borrow()
            .iter()
            .map(|m| {
                let item: ObjectRef = m.clone();
                item
            })
            .collect()
    }

    fn len(&self) -> usize {
        Store::len(self)
    }

    fn observe(&self, callback: MembershipCallback) -> SubscriptionId {
        self.membership.borrow_mut().subscribe(callback)
    }

    fn unobserve(&self, id: SubscriptionId) -> bool {
        self.membership.borrow_mut().unsubscribe(id)
    }
}

impl Object for Store {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Collection
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.props.get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<bool> {
        self.props.set(key, value)
    }

    fn subscribe(&self, key: &str, callback: Callback) -> Result<SubscriptionId> {
        self.props.subscribe_callback(key, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.props.unsubscribe(id)
    }

    fn as_collection(&self) -> Option<&dyn Collection> {
        Some(self)
    }

    fn to_json(&self) -> Json {
        Json::Array(self.members.borrow().iter().map(|m| m.to_json()).collect())
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
