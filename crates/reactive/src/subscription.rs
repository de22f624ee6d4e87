//! Subscription management.
//!
//! This module provides ordered subscriber lists. Callbacks are notified in
//! subscription order, and a subscription removed in the middle of a
//! notification cascade is never invoked again, even if it was part of a
//! snapshot taken before the removal.

use std::cell::Cell;
use std::rc::Rc;
use voodoo_core::{next_subscription_id, SubscriptionId};

/// A single subscription to events of type `E`.
pub struct Subscription<E> {
    /// Unique identifier
    id: SubscriptionId,
    /// Callback to invoke on events
    callback: Rc<dyn Fn(&E)>,
    /// Whether this subscription is active
    active: Cell<bool>,
}

impl<E> Subscription<E> {
    /// Creates a new subscription.
    pub fn new(id: SubscriptionId, callback: Rc<dyn Fn(&E)>) -> Self {
        Self {
            id,
            callback,
            active: Cell::new(true),
        }
    }

    /// Returns the subscription ID.
    #[inline]
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Returns whether this subscription is active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Deactivates this subscription.
    #[inline]
    pub fn deactivate(&self) {
        self.active.set(false);
    }

    /// Notifies this subscription of an event.
    pub fn notify(&self, event: &E) {
        if self.active.get() {
            (self.callback)(event);
        }
    }
}

/// An ordered list of subscriptions.
pub struct SubscriptionManager<E> {
    subscriptions: Vec<Rc<Subscription<E>>>,
}

impl<E> Default for SubscriptionManager<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> SubscriptionManager<E> {
    /// Creates a new subscription manager.
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Subscribes with the given callback and returns its ID.
    pub fn subscribe(&mut self, callback: Rc<dyn Fn(&E)>) -> SubscriptionId {
        let id = next_subscription_id();
        self.subscriptions
            .push(Rc::new(Subscription::new(id, callback)));
        id
    }

    /// Unsubscribes by ID.
    ///
    /// Returns true if the subscription was found and removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        match self.subscriptions.iter().position(|s| s.id() == id) {
            Some(pos) => {
                let sub = self.subscriptions.remove(pos);
                sub.deactivate();
                true
            }
            None => false,
        }
    }

    /// Returns true if the ID belongs to this manager.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.subscriptions.iter().any(|s| s.id() == id)
    }

    /// Returns the current subscriptions in order.
    ///
    /// Callers dispatch from the snapshot after releasing any borrow of the
    /// manager, so callbacks are free to subscribe or unsubscribe.
    pub fn snapshot(&self) -> Vec<Rc<Subscription<E>>> {
        self.subscriptions.clone()
    }

    /// Returns the number of subscriptions.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if there are no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Deactivates and removes all subscriptions.
    pub fn clear(&mut self) {
        for sub in self.subscriptions.drain(..) {
            sub.deactivate();
        }
    }
}

/// Notifies every active subscription in `snapshot`, in order.
pub fn dispatch<E>(snapshot: &[Rc<Subscription<E>>], event: &E) {
    for sub in snapshot {
        sub.notify(event);
    }
}
