//! Models.
//!
//! A model is an observable record with an identity (`id`), a request status
//! (`status`) and an `xhr` record describing its most recent request. Models
//! are created from a reusable [`ModelShape`] that captures the defaults, the
//! resource name and the data source.

use crate::source::{DataSource, Response};
use crate::sync::{SyncState, XhrState};
use futures::future::{FutureExt, LocalBoxFuture};
use serde_json::Value as Json;
use std::any::Any;
use std::cell::Cell;
use std::rc::{Rc, Weak};
use voodoo_core::{
    Callback, Error, Object, ObjectKind, Result, SubscriptionId, Value,
};
use voodoo_reactive::Observable;

/// Hook applied to a response body before it is ingested.
pub type ParseFn = Rc<dyn Fn(&Json) -> Json>;

/// Keys every model declares regardless of its shape.
const ID: &str = "id";
const STATUS: &str = "status";
const XHR: &str = "xhr";

struct ShapeInner {
    name: String,
    defaults: Vec<(String, Value)>,
    resource: Option<String>,
    source: Option<Rc<dyn DataSource>>,
    parse: Option<ParseFn>,
}

/// A reusable model definition.
///
/// # Example
///
/// ```rust
/// use voodoo_core::Value;
/// use voodoo_store::ModelShape;
///
/// let todo = ModelShape::builder("Todo")
///     .default("text", "Untitled")
///     .default("is_done", false)
///     .build();
///
/// let item = todo.create([("text", Value::from("Buy milk"))]);
/// assert_eq!(item.get("text"), Some(Value::from("Buy milk")));
/// assert_eq!(item.get("is_done"), Some(Value::Bool(false)));
/// assert!(item.id().is_null());
/// ```
#[derive(Clone)]
pub struct ModelShape {
    inner: Rc<ShapeInner>,
}

impl ModelShape {
    /// Starts building a shape.
    pub fn builder(name: impl Into<String>) -> ModelShapeBuilder {
        ModelShapeBuilder::new(name)
    }

    /// Returns the shape name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the declared defaults in order.
    #[inline]
    pub fn defaults(&self) -> &[(String, Value)] {
        &self.inner.defaults
    }

    /// Returns the resource name, if any.
    pub fn resource(&self) -> Option<&str> {
        self.inner.resource.as_deref()
    }

    /// Creates a model with the defaults merged under `overrides`.
    pub fn create<I, K>(&self, overrides: I) -> Rc<Model>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let model = Model::new(self);
        for (key, value) in overrides {
            let key = key.into();
            model.attrs.insert(&key, value);
        }
        model
    }

    /// Creates a model with the shape defaults only.
    pub fn create_default(&self) -> Rc<Model> {
        Model::new(self)
    }

    /// Creates a model from a raw JSON object.
    ///
    /// Keys absent from the defaults are declared on the fly; nested arrays
    /// and objects are ignored.
    pub fn create_from_json(&self, json: &Json) -> Rc<Model> {
        let model = Model::new(self);
        model.apply_json(json);
        model
    }
}

/// Builder for [`ModelShape`].
pub struct ModelShapeBuilder {
    name: String,
    defaults: Vec<(String, Value)>,
    resource: Option<String>,
    source: Option<Rc<dyn DataSource>>,
    parse: Option<ParseFn>,
}

impl ModelShapeBuilder {
    /// Creates a new builder.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            defaults: Vec::new(),
            resource: None,
            source: None,
            parse: None,
        }
    }

    /// Declares a property with its default value. A later declaration of
    /// the same key replaces the earlier default.
    pub fn default(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let key = key.into();
        let value = value.into();
        match self.defaults.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.defaults.push((key, value)),
        }
        self
    }

    /// Sets the resource the model is fetched from and saved to.
    pub fn resource(mut self, resource: impl Into<String>) -> Self {
        self.resource = Some(resource.into());
        self
    }

    /// Sets the data source.
    pub fn source(mut self, source: Rc<dyn DataSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Sets the hook applied to fetched bodies.
    pub fn parse<F>(mut self, parse: F) -> Self
    where
        F: Fn(&Json) -> Json + 'static,
    {
        self.parse = Some(Rc::new(parse));
        self
    }

    /// Builds the shape.
    pub fn build(self) -> ModelShape {
        ModelShape {
            inner: Rc::new(ShapeInner {
                name: self.name,
                defaults: self.defaults,
                resource: self.resource,
                source: self.source,
                parse: self.parse,
            }),
        }
    }
}

#[derive(Clone, Copy, Debug)]
enum RequestKind {
    Fetch,
    Save,
}

/// A model instance.
pub struct Model {
    this: Weak<Model>,
    shape: ModelShape,
    attrs: Observable,
    sync: SyncState,
    destroyed: Cell<bool>,
}

impl Model {
    fn new(shape: &ModelShape) -> Rc<Self> {
        Rc::new_cyclic(|this| {
            let sync = SyncState::new();
            let attrs = Observable::new();
            attrs.declare(ID, Value::Null);
            attrs.declare(STATUS, Value::Int(0));
            attrs.declare(XHR, Value::object(Rc::clone(sync.xhr())));
            for (key, value) in shape.defaults() {
                attrs.insert(key, value.clone());
            }
            Self {
                this: this.clone(),
                shape: shape.clone(),
                attrs,
                sync,
                destroyed: Cell::new(false),
            }
        })
    }

    /// Returns the shape name.
    pub fn name(&self) -> &str {
        self.shape.name()
    }

    /// Returns the identity, `Null` until persisted.
    pub fn id(&self) -> Value {
        self.attrs.get(ID).unwrap_or_default()
    }

    /// Returns the status code of the most recent request, `0` before any.
    pub fn status(&self) -> i64 {
        self.attrs.get(STATUS).and_then(|v| v.as_i64()).unwrap_or(0)
    }

    /// Returns the `xhr` record.
    pub fn xhr(&self) -> Rc<Observable> {
        Rc::clone(self.sync.xhr())
    }

    /// Returns the state of the most recent request.
    pub fn xhr_state(&self) -> XhrState {
        self.sync.state()
    }

    /// Returns the property bag.
    pub fn attrs(&self) -> &Observable {
        &self.attrs
    }

    /// Returns the value of `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.attrs.get(key)
    }

    /// Sets a declared property.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        self.attrs.set(key, value)
    }

    /// Declares or sets a property.
    pub fn insert(&self, key: &str, value: impl Into<Value>) -> bool {
        self.attrs.insert(key, value)
    }

    /// Subscribes to changes of a declared property.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&Value) + 'static,
    {
        self.attrs.subscribe(key, callback)
    }

    /// Removes a subscription.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.attrs.unsubscribe(id)
    }

    /// Watches properties declared after creation, e.g. by
    /// [`Model::insert`] or a fetched payload.
    pub fn on_declare<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + 'static,
    {
        self.attrs.on_declare(callback)
    }

    /// Removes a declaration watcher.
    pub fn off_declare(&self, id: SubscriptionId) -> bool {
        self.attrs.off_declare(id)
    }

    /// Resolves a dot-separated path starting at this model.
    pub fn get_path(&self, path: &str) -> Result<Value> {
        self.attrs.get_path(path)
    }

    /// Assigns a dot-separated path starting at this model.
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Result<bool> {
        self.attrs.set_path(path, value)
    }

    /// Returns true once [`Model::destroy`] has run.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.get()
    }

    /// Ingests the primitive fields of a JSON object.
    pub fn apply_json(&self, json: &Json) {
        let map = match json {
            Json::Object(map) => map,
            _ => return,
        };
        for (key, raw) in map {
            if key == STATUS || key == XHR || raw.is_array() || raw.is_object() {
                continue;
            }
            self.attrs.insert(key, Value::from_json(raw));
        }
    }

    /// Flattens the non-object properties into a JSON object.
    ///
    /// `status`, `xhr`, object-valued properties and a null `id` are left out.
    pub fn to_json(&self) -> Json {
        let mut map = serde_json::Map::new();
        for key in self.attrs.keys() {
            if key == STATUS || key == XHR {
                continue;
            }
            let value = match self.attrs.get(&key) {
                Some(value) => value,
                None => continue,
            };
            if value.as_object().is_some() || (key == ID && value.is_null()) {
                continue;
            }
            map.insert(key, value.to_json());
        }
        Json::Object(map)
    }

    /// Reads the model from its data source.
    ///
    /// `xhr.state` becomes `loading` immediately. The returned future records
    /// the outcome; a failed request is recorded, not returned.
    pub fn fetch(&self) -> Result<LocalBoxFuture<'static, ()>> {
        let (source, url) = self.endpoint()?;
        let epoch = self.sync.begin();
        tracing::debug!(message = "model.fetch", model = %self.name(), %url);
        let request = source.fetch(&url);
        Ok(self.complete_later(epoch, request, RequestKind::Fetch))
    }

    /// Writes the model to its data source.
    ///
    /// An `id` returned by the server is applied to the model.
    pub fn save(&self) -> Result<LocalBoxFuture<'static, ()>> {
        let (source, url) = self.endpoint()?;
        let epoch = self.sync.begin();
        tracing::debug!(message = "model.save", model = %self.name(), %url);
        let request = source.save(&url, self.to_json());
        Ok(self.complete_later(epoch, request, RequestKind::Save))
    }

    /// Releases the model. Outstanding request completions are discarded.
    /// Idempotent.
    pub fn destroy(&self) {
        if self.destroyed.replace(true) {
            return;
        }
        self.sync.bump();
        tracing::debug!(message = "model.destroy", model = %self.name());
    }

    fn endpoint(&self) -> Result<(Rc<dyn DataSource>, String)> {
        if self.destroyed.get() {
            return Err(Error::destroyed(self.name()));
        }
        let inner = &self.shape.inner;
        let (resource, source) = match (&inner.resource, &inner.source) {
            (Some(resource), Some(source)) => (resource, source),
            _ => return Err(Error::no_data_source(self.name())),
        };
        let id = self.id();
        let url = if id.is_null() {
            resource.clone()
        } else {
            format!("{}/{}", resource.trim_end_matches('/'), id.to_text())
        };
        Ok((Rc::clone(source), url))
    }

    fn complete_later(
        &self,
        epoch: u64,
        request: LocalBoxFuture<'static, Response>,
        kind: RequestKind,
    ) -> LocalBoxFuture<'static, ()> {
        let this = self.this.clone();
        async move {
            let response = request.await;
            match this.upgrade() {
                Some(model) => model.complete(epoch, kind, response),
                None => tracing::debug!(message = "model.completion_dropped", ?kind),
            }
        }
        .boxed_local()
    }

    fn complete(&self, epoch: u64, kind: RequestKind, response: Response) {
        if self.destroyed.get() || !self.sync.is_current(epoch) {
            tracing::debug!(
                message = "model.stale_completion",
                model = %self.name(),
                ?kind,
                epoch,
                current = self.sync.epoch()
            );
            return;
        }
        if response.is_success() {
            match kind {
                RequestKind::Fetch => match &self.shape.inner.parse {
                    Some(parse) => self.apply_json(&parse(&response.body)),
                    None => self.apply_json(&response.body),
                },
                RequestKind::Save => {
                    if let Some(id) = response.body.get(ID).filter(|id| !id.is_null()) {
                        self.attrs.insert(ID, Value::from_json(id));
                    }
                }
            }
        }
        tracing::debug!(
            message = "model.complete",
            model = %self.name(),
            ?kind,
            status = response.status
        );
        self.sync.finish(&self.attrs, &response);
    }
}

impl Object for Model {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Model
    }

    fn get(&self, key: &str) -> Option<Value> {
        self.attrs.get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<bool> {
        self.attrs.set(key, value)
    }

    fn subscribe(&self, key: &str, callback: Callback) -> Result<SubscriptionId> {
        self.attrs.subscribe_callback(key, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.attrs.unsubscribe(id)
    }

    fn to_json(&self) -> Json {
        Model::to_json(self)
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
