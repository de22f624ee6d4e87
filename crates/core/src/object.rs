//! The object protocol.
//!
//! Every entity a binding path can walk through (records, models, stores,
//! live collections, views, surfaces) implements [`Object`]. Paths are resolved
//! key by key against this trait, and the binding resolver classifies a
//! resolved value by its [`ObjectKind`] and [`Object::as_collection`].

use crate::delta::Delta;
use crate::error::Result;
use crate::value::Value;
use std::any::Any;
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Unique identifier for a subscription.
pub type SubscriptionId = u64;

/// Callback invoked with the new value of a key.
pub type Callback = Rc<dyn Fn(&Value)>;

/// Callback invoked with a membership change of a collection.
pub type MembershipCallback = Rc<dyn Fn(&Delta<Member>)>;

/// Shared, type-erased reference to an observable object.
pub type ObjectRef = Rc<dyn Object>;

/// Global subscription id counter. Ids are unique across all objects so that
/// a handle can never unsubscribe somebody else's callback.
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Gets the next unique subscription ID.
pub fn next_subscription_id() -> SubscriptionId {
    NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed)
}

/// Coarse kind of an object, used for binding dispatch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// A plain observable property bag.
    Record,
    /// A model instance.
    Model,
    /// A store or live sub-collection.
    Collection,
    /// A view instance.
    View,
    /// A rendered surface element.
    Surface,
}

/// An observable object addressable by key.
pub trait Object: Any {
    /// Returns the kind of this object.
    fn kind(&self) -> ObjectKind;

    /// Returns the value of `key`, or `None` if the key is not declared.
    fn get(&self, key: &str) -> Option<Value>;

    /// Sets `key`. Returns `Ok(true)` if the value changed and subscribers
    /// were notified, `Ok(false)` if the new value equals the current one.
    fn set(&self, key: &str, value: Value) -> Result<bool>;

    /// Subscribes to changes of `key`.
    fn subscribe(&self, key: &str, callback: Callback) -> Result<SubscriptionId>;

    /// Removes a subscription. Returns true if it was found.
    fn unsubscribe(&self, id: SubscriptionId) -> bool;

    /// Returns the collection view of this object, if it is one.
    fn as_collection(&self) -> Option<&dyn Collection> {
        None
    }

    /// Flattens this object into JSON.
    fn to_json(&self) -> serde_json::Value {
        serde_json::Value::Null
    }

    /// Converts into `Rc<dyn Any>` for downcasting.
    fn into_any(self: Rc<Self>) -> Rc<dyn Any>;
}

/// An ordered, observable sequence of objects.
pub trait Collection {
    /// Returns the current members in iteration order.
    fn members(&self) -> Vec<ObjectRef>;

    /// Returns the number of members.
    fn len(&self) -> usize;

    /// Returns true if the collection has no members.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Subscribes to membership changes.
    fn observe(&self, callback: MembershipCallback) -> SubscriptionId;

    /// Removes a membership subscription.
    fn unobserve(&self, id: SubscriptionId) -> bool;
}

/// A member of a collection together with its position.
///
/// For insertions `index` is the position after the insert; for removals it
/// is the position the member occupied before it was removed.
#[derive(Clone)]
pub struct Member {
    pub index: usize,
    pub item: ObjectRef,
}

impl Member {
    /// Creates a new member entry.
    pub fn new(index: usize, item: ObjectRef) -> Self {
        Self { index, item }
    }
}

impl fmt::Debug for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Member")
            .field("index", &self.index)
            .field("kind", &self.item.kind())
            .finish()
    }
}

/// Returns true if both references point at the same object.
#[inline]
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Returns a stable address for an object, usable as a map key while the
/// object is alive.
#[inline]
pub fn object_addr(obj: &ObjectRef) -> usize {
    Rc::as_ptr(obj) as *const () as usize
}

/// Downcasts a type-erased object to its concrete type.
pub fn downcast<T: Object>(obj: &ObjectRef) -> Option<Rc<T>> {
    Rc::clone(obj).into_any().downcast::<T>().ok()
}
