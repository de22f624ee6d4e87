//! Observable property bags.
//!
//! An `Observable` maps declared keys to values and keeps an ordered
//! subscriber list per key. Notification is synchronous and depth-first: a
//! callback that sets another key (or the same one) runs that nested cascade
//! to completion before the outer `set` returns.

use crate::subscription::{dispatch, SubscriptionManager};
use hashbrown::HashMap;
use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;
use voodoo_core::{
    assign, resolve, Callback, Error, Object, ObjectKind, Path, Result, SubscriptionId, Value,
};

/// A keyed bag of observable properties.
///
/// # Example
///
/// ```rust
/// use std::cell::Cell;
/// use std::rc::Rc;
/// use voodoo_reactive::Observable;
///
/// let todo = Observable::with_values([("text", "Untitled".into()), ("is_done", false.into())]);
/// let seen = Rc::new(Cell::new(0));
/// let seen_clone = seen.clone();
/// todo.subscribe("is_done", move |_| seen_clone.set(seen_clone.get() + 1)).unwrap();
///
/// todo.set("is_done", true).unwrap();
/// todo.set("is_done", true).unwrap(); // equal value: no notification
/// assert_eq!(seen.get(), 1);
/// ```
#[derive(Default)]
pub struct Observable {
    /// Declared keys and their current values
    values: RefCell<HashMap<String, Value>>,
    /// Declaration order of keys
    order: RefCell<Vec<String>>,
    /// Per-key subscribers
    subscribers: RefCell<HashMap<String, SubscriptionManager<Value>>>,
    /// Subscription ID -> key
    index: RefCell<HashMap<SubscriptionId, String>>,
    /// Watchers of newly declared keys
    declared: RefCell<SubscriptionManager<String>>,
}

impl Observable {
    /// Creates an empty observable.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an observable with the given declared keys.
    pub fn with_values<I, K>(values: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let observable = Self::new();
        for (key, value) in values {
            observable.declare(key, value);
        }
        observable
    }

    /// Declares a key with an initial value and notifies the declaration
    /// watchers.
    ///
    /// Returns false (and leaves the value untouched) if the key was already
    /// declared.
    pub fn declare(&self, key: impl Into<String>, value: Value) -> bool {
        let key = key.into();
        {
            let mut values = self.values.borrow_mut();
            if values.contains_key(&key) {
                return false;
            }
            values.insert(key.clone(), value);
        }
        self.order.borrow_mut().push(key.clone());

        let snapshot = self.declared.borrow().snapshot();
        if !snapshot.is_empty() {
            tracing::trace!(message = "observable.declare", key = %key, watchers = snapshot.len());
            dispatch(&snapshot, &key);
        }
        true
    }

    /// Watches keys declared from now on. The callback receives the key.
    pub fn on_declare<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&str) + 'static,
    {
        self.declared
            .borrow_mut()
            .subscribe(Rc::new(move |key: &String| callback(key)))
    }

    /// Removes a declaration watcher. Returns true if it was found.
    pub fn off_declare(&self, id: SubscriptionId) -> bool {
        self.declared.borrow_mut().unsubscribe(id)
    }

    /// Returns the number of declaration watchers.
    pub fn declare_watcher_count(&self) -> usize {
        self.declared.borrow().len()
    }

    /// Returns true if `key` is declared.
    pub fn is_declared(&self, key: &str) -> bool {
        self.values.borrow().contains_key(key)
    }

    /// Returns the declared keys in declaration order.
    pub fn keys(&self) -> Vec<String> {
        self.order.borrow().clone()
    }

    /// Returns the number of declared keys.
    pub fn len(&self) -> usize {
        self.order.borrow().len()
    }

    /// Returns true if no key is declared.
    pub fn is_empty(&self) -> bool {
        self.order.borrow().is_empty()
    }

    /// Returns the value of `key`, or `None` if it is not declared.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.values.borrow().get(key).cloned()
    }

    /// Sets a declared key.
    ///
    /// Equal values are a no-op. Undeclared keys fail with `Error::Path`.
    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<bool> {
        let value = value.into();
        {
            let mut values = self.values.borrow_mut();
            let slot = values.get_mut(key).ok_or_else(|| Error::path(key, key))?;
            if *slot == value {
                return Ok(false);
            }
            *slot = value.clone();
        }
        self.notify(key, &value);
        Ok(true)
    }

    /// Declares `key` if needed, otherwise sets it.
    ///
    /// Used when ingesting payloads that may carry keys absent from defaults.
    pub fn insert(&self, key: &str, value: impl Into<Value>) -> bool {
        let value = value.into();
        if self.declare(key, value.clone()) {
            return true;
        }
        self.set(key, value).unwrap_or(false)
    }

    /// Subscribes to changes of a declared key.
    pub fn subscribe<F>(&self, key: &str, callback: F) -> Result<SubscriptionId>
    where
        F: Fn(&Value) + 'static,
    {
        self.subscribe_callback(key, Rc::new(callback))
    }

    /// Subscribes a shared callback to changes of a declared key.
    pub fn subscribe_callback(&self, key: &str, callback: Callback) -> Result<SubscriptionId> {
        if !self.is_declared(key) {
            return Err(Error::path(key, key));
        }
        let id = self
            .subscribers
            .borrow_mut()
            .entry(key.to_string())
            .or_default()
            .subscribe(callback);
        self.index.borrow_mut().insert(id, key.to_string());
        Ok(id)
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let key = match self.index.borrow_mut().remove(&id) {
            Some(key) => key,
            None => return false,
        };
        self.subscribers
            .borrow_mut()
            .get_mut(&key)
            .map(|manager| manager.unsubscribe(id))
            .unwrap_or(false)
    }

    /// Returns the number of subscribers of `key`.
    pub fn subscriber_count(&self, key: &str) -> usize {
        self.subscribers
            .borrow()
            .get(key)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Returns the number of subscriptions across all keys.
    pub fn subscription_count(&self) -> usize {
        self.index.borrow().len()
    }

    /// Resolves a dot-separated path starting at this observable.
    pub fn get_path(&self, path: &str) -> Result<Value> {
        resolve(self, &Path::parse(path)?)
    }

    /// Assigns a dot-separated path starting at this observable.
    pub fn set_path(&self, path: &str, value: impl Into<Value>) -> Result<bool> {
        assign(self, &Path::parse(path)?, value.into())
    }

    /// Notifies the subscribers of `key` with `value`.
    fn notify(&self, key: &str, value: &Value) {
        let snapshot = match self.subscribers.borrow().get(key) {
            Some(manager) => manager.snapshot(),
            None => return,
        };
        tracing::trace!(message = "observable.notify", key, subscribers = snapshot.len());
        dispatch(&snapshot, value);
    }
}

impl Object for Observable {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Record
    }

    fn get(&self, key: &str) -> Option<Value> {
        Observable::get(self, key)
    }

    fn set(&self, key: &str, value: Value) -> Result<bool> {
        Observable::set(self, key, value)
    }

    fn subscribe(&self, key: &str, callback: Callback) -> Result<SubscriptionId> {
        self.subscribe_callback(key, callback)
    }

    fn unsubscribe(&self, id: SubscriptionId) -> bool {
        Observable::unsubscribe(self, id)
    }

    fn to_json(&self) -> serde_json::Value {
        let values = self.values.borrow();
        let mut map = serde_json::Map::new();
        for key in self.order.borrow().iter() {
            if let Some(value) = values.get(key) {
                map.insert(key.clone(), value.to_json());
            }
        }
        serde_json::Value::Object(map)
    }

    fn into_any(self: Rc<Self>) -> Rc<dyn Any> {
        self
    }
}
