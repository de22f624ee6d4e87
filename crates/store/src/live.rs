//! Live sub-collections.
//!
//! A `LiveCollection` holds references to the members of a parent store that
//! match a [`Predicate`], continuously. It subscribes to every predicate key
//! on every parent member, and re-evaluates only the member that changed.
//!
//! Iteration order always equals parent order: a member that starts
//! matching is inserted after every live member that precedes it in the
//! parent, and existing members are never reordered.

use crate::model::Model;
use crate::predicate::Predicate;
use crate::store::Store;
use hashbrown::{HashMap, HashSet};
use serde_json::Value as Json;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use voodoo_core::{
    downcast, Callback, Collection, Delta, Member, MembershipCallback, Object, ObjectKind,
    ObjectRef, Result, SubscriptionId, Value,
};
use voodoo_reactive::{dispatch, Observable, SubscriptionManager};

const LENGTH: &str = "length";

/// Per-member subscriptions on the predicate keys.
struct Watched {
    model: Rc<Model>,
    /// Predicate keys subscribed so far, with their subscriptions
    keys: Vec<(String, SubscriptionId)>,
    /// Set while some predicate key is still undeclared on the member
    declare_id: Option<SubscriptionId>,
}

impl Watched {
    fn unsubscribe(self) {
        for (_, id) in self.keys {
            self.model.unsubscribe(id);
        }
        if let Some(id) = self.declare_id {
            self.model.off_declare(id);
        }
    }
}

#[inline]
fn addr(model: &Rc<Model>) -> usize {
    Rc::as_ptr(model) as usize
}

/// A filtered, auto-updating view over a parent [`Store`].
pub struct LiveCollection {
    this: Weak<LiveCollection>,
    parent: Weak<Store>,
    predicate: Predicate,
    members: RefCell<Vec<Rc<Model>>>,
    /// Parent member address -> its predicate-key subscriptions
    watched: RefCell<HashMap<usize, Watched>>,
    parent_listener: Cell<Option<SubscriptionId>>,
    props: Observable,
    membership: RefCell<SubscriptionManager<Delta<Member>>>,
    released: Cell<bool>,
}

impl LiveCollection {
    pub(crate) fn new(parent: &Rc<Store>, predicate: Predicate) -> Rc<Self> {
        let live = Rc::new_cyclic(|this| Self {
            this: this.clone(),
            parent: Rc::downgrade(parent),
            predicate,
            members: RefCell::new(Vec::new()),
            watched: RefCell::new(HashMap::new()),
            parent_listener: Cell::new(None),
            props: Observable::with_values([(LENGTH, Value::Int(0))]),
            membership: RefCell::new(SubscriptionManager::new()),
            released: Cell::new(false),
        });
        live.install(parent);
        live
    }

    fn install(&self, parent: &Rc<Store>) {
        let seed = parent.models();
        for model in &seed {
            self.watch(model);
        }
        let matching: Vec<Rc<Model>> = seed
            .into_iter()
            .filter(|m| self.predicate.matches(&**m))
            .collect();
        let count = matching.len();
        *self.members.borrow_mut() = matching;
        self.props.insert(LENGTH, count);

        let weak = self.this.clone();
        let listener: MembershipCallback = Rc::new(move |delta: &Delta<Member>| {
            if let Some(live) = weak.upgrade() {
                live.on_parent_change(delta);
            }
        });
        self.parent_listener.set(Some(parent.observe(listener)));
        tracing::debug!(message = "live.install", store = %parent.name(), matched = count);
    }

    /// Returns the predicate.
    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    /// Returns the parent store while it is alive.
    pub fn parent(&self) -> Option<Rc<Store>> {
        self.parent.upgrade()
    }

    /// Returns the number of members.
    pub fn len(&self) -> usize {
        self.members.borrow().len()
    }

    /// Returns true if no parent member matches.
    pub fn is_empty(&self) -> bool {
        self.members.borrow().is_empty()
    }

    /// Returns the members in parent order.
    pub fn models(&self) -> Vec<Rc<Model>> {
        self.members.borrow().clone()
    }

    /// Returns the member at `index`.
    pub fn at(&self, index: usize) -> Option<Rc<Model>> {
        self.members.borrow().get(index).cloned()
    }

    /// Returns true if `model` is a member.
    pub fn contains(&self, model: &Rc<Model>) -> bool {
        self.members.borrow().iter().any(|m| Rc::ptr_eq(m, model))
    }

    /// Returns the number of parent members being watched.
    pub fn watched_count(&self) -> usize {
        self.watched.borrow().len()
    }

    /// Subscribes to membership changes.
    pub fn on_change<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Delta<Member>) + 'static,
    {
        self.membership.borrow_mut().subscribe(Rc::new(callback))
    }

    /// Returns true once released.
    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    /// Stops tracking the parent: every per-member subscription and the
    /// parent listener are removed, and the collection empties. Idempotent.
    pub fn release(&self) {
        if self.released.replace(true) {
            return;
        }
        self.detach();
        self.members.borrow_mut().clear();
        self.props.insert(LENGTH, 0usize);
        tracing::debug!(message = "live.release", predicate = ?self.predicate);
    }

    /// Removes every subscription this collection holds.
    fn detach(&self) {
        let watched: Vec<Watched> = self.watched.borrow_mut().drain().map(|(_, w)| w).collect();
        for entry in watched {
            entry.unsubscribe();
        }
        if let Some(id) = self.parent_listener.take() {
            if let Some(parent) = self.parent.upgrade() {
                parent.unobserve(id);
            }
        }
    }

    /// Subscribes to the predicate keys of a parent member.
    ///
    /// A key the member does not declare yet is subscribed once it is
    /// declared; until then the member does not match.
    fn watch(&self, model: &Rc<Model>) {
        if self.watched.borrow().contains_key(&addr(model)) {
            return;
        }
        let mut keys = Vec::new();
        let mut pending = false;
        for key in self.predicate.keys() {
            match self.subscribe_key(model, key) {
                Ok(id) => keys.push((key.to_string(), id)),
                Err(err) => {
                    tracing::trace!(message = "live.watch_deferred", %err);
                    pending = true;
                }
            }
        }
        let declare_id = pending.then(|| {
            let live = self.this.clone();
            let target = Rc::downgrade(model);
            model.on_declare(move |key| {
                if let (Some(live), Some(model)) = (live.upgrade(), target.upgrade()) {
                    live.on_member_declared(&model, key);
                }
            })
        });
        self.watched.borrow_mut().insert(
            addr(model),
            Watched {
                model: Rc::clone(model),
                keys,
                declare_id,
            },
        );
    }

    fn subscribe_key(&self, model: &Rc<Model>, key: &str) -> Result<SubscriptionId> {
        let live = self.this.clone();
        let target = Rc::downgrade(model);
        model.subscribe(key, move |_| {
            if let (Some(live), Some(model)) = (live.upgrade(), target.upgrade()) {
                live.on_member_change(&model);
            }
        })
    }

    fn unwatch(&self, model: &Rc<Model>) {
        let entry = self.watched.borrow_mut().remove(&addr(model));
        if let Some(entry) = entry {
            entry.unsubscribe();
        }
    }

    /// Subscribes a predicate key declared after the member joined, then
    /// re-evaluates the member.
    fn on_member_declared(&self, model: &Rc<Model>, key: &str) {
        if self.released.get() || !self.predicate.keys().any(|k| k == key) {
            return;
        }
        let pending = self
            .watched
            .borrow()
            .get(&addr(model))
            .map_or(false, |entry| entry.keys.iter().all(|(k, _)| k != key));
        if !pending {
            return;
        }
        match self.subscribe_key(model, key) {
            Ok(id) => {
                let complete = {
                    let mut watched = self.watched.borrow_mut();
                    match watched.get_mut(&addr(model)) {
                        Some(entry) => {
                            entry.keys.push((key.to_string(), id));
                            let complete = self
                                .predicate
                                .keys()
                                .all(|k| entry.keys.iter().any(|(w, _)| w == k));
                            if complete {
                                entry.declare_id.take()
                            } else {
                                None
                            }
                        }
                        None => None,
                    }
                };
                if let Some(declare_id) = complete {
                    model.off_declare(declare_id);
                }
            }
            Err(err) => tracing::trace!(message = "live.watch_deferred", %err),
        }
        self.on_member_change(model);
    }

    fn on_parent_change(&self, delta: &Delta<Member>) {
        if self.released.get() {
            return;
        }
        let model = match downcast::<Model>(&delta.data.item) {
            Some(model) => model,
            None => return,
        };
        if delta.is_insert() {
            self.watch(&model);
            if self.predicate.matches(&*model) {
                self.insert_in_order(&model);
            }
        } else {
            self.unwatch(&model);
            if let Some(index) = self.position(&model) {
                self.remove_at(index);
            }
        }
    }

    fn on_member_change(&self, model: &Rc<Model>) {
        if self.released.get() {
            return;
        }
        let matches = self.predicate.matches(&**model);
        match (matches, self.position(model)) {
            (true, None) => self.insert_in_order(model),
            (false, Some(index)) => self.remove_at(index),
            _ => {}
        }
    }

    fn position(&self, model: &Rc<Model>) -> Option<usize> {
        self.members
            .borrow()
            .iter()
            .position(|m| Rc::ptr_eq(m, model))
    }

    /// Inserts `model` after every member that precedes it in the parent.
    fn insert_in_order(&self, model: &Rc<Model>) {
        let parent = match self.parent.upgrade() {
            Some(parent) => parent,
            None => return,
        };
        let index = {
            let members = self.members.borrow();
            let present: HashSet<usize> = members.iter().map(addr).collect();
            parent
                .models()
                .iter()
                .take_while(|m| !Rc::ptr_eq(*m, model))
                .filter(|m| present.contains(&addr(*m)))
                .count()
        };
        self.members.borrow_mut().insert(index, Rc::clone(model));
        tracing::trace!(message = "live.insert", index);
        let item: ObjectRef = model.clone();
        self.emit(Delta::insert(Member::new(index, item)));
    }

    fn remove_at(&self, index: usize) {
        let model = self.members.borrow_mut().remove(index);
        tracing::trace!(message = "live.remove", index);
        let item: ObjectRef = model;
        self.emit(Delta::delete(Member::new(index, item)));
    }

    /// Broadcasts a membership change, then updates `length`.
    fn emit(&self, delta: Delta<Member>) {
        let snapshot = self.membership.borrow().snapshot();
        dispatch(&snapshot, &delta);
        self.props.insert(LENGTH, self.len());
    }
}

impl Drop for LiveCollection {
    fn drop(&mut self) {
        self.detach();
    }
}

impl Collection for LiveCollection {
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
        LiveCollection::len(self)
    }

    fn observe(&self, callback: MembershipCallback) -> SubscriptionId {
        self.membership.borrow_mut().subscribe(callback)
    }

    fn unobserve(&self, id: SubscriptionId) -> bool {
        self.membership.borrow_mut().unsubscribe(id)
    }
}

impl Object for LiveCollection {
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
