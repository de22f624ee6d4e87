//! Location sources.

use std::cell::RefCell;
use std::rc::Rc;
use voodoo_core::SubscriptionId;
use voodoo_reactive::{dispatch, SubscriptionManager};

/// Callback invoked with the new location.
pub type LocationCallback = Rc<dyn Fn(&str)>;

/// Where the current location lives and how it changes.
pub trait LocationSource {
    /// Returns the current location.
    fn current(&self) -> String;

    /// Moves to `location` and notifies the watchers.
    fn push(&self, location: &str);

    /// Watches location changes.
    fn watch(&self, callback: LocationCallback) -> SubscriptionId;

    /// Removes a watcher. Returns true if it was found.
    fn unwatch(&self, id: SubscriptionId) -> bool;
}

/// An in-memory location with a history stack.
///
/// # Example
///
/// ```rust
/// use voodoo_router::{LocationSource, MemoryLocation};
///
/// let location = MemoryLocation::new("/");
/// location.push("/filter/active");
/// assert_eq!(location.current(), "/filter/active");
/// assert!(location.back());
/// assert_eq!(location.current(), "/");
/// ```
pub struct MemoryLocation {
    history: RefCell<Vec<String>>,
    watchers: RefCell<SubscriptionManager<String>>,
}

impl MemoryLocation {
    /// Creates a location starting at `initial`.
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            history: RefCell::new(vec![initial.into()]),
            watchers: RefCell::new(SubscriptionManager::new()),
        }
    }

    /// Returns every location visited, oldest first.
    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }

    /// Returns to the previous location. Returns false at the start of the
    /// history.
    pub fn back(&self) -> bool {
        let previous = {
            let mut history = self.history.borrow_mut();
            if history.len() < 2 {
                return false;
            }
            history.pop();
            history.last().cloned()
        };
        if let Some(previous) = previous {
            self.notify(previous);
        }
        true
    }

    /// Returns the number of watchers.
    pub fn watcher_count(&self) -> usize {
        self.watchers.borrow().len()
    }

    fn notify(&self, location: String) {
        let snapshot = self.watchers.borrow().snapshot();
        tracing::trace!(message = "location.change", %location, watchers = snapshot.len());
        dispatch(&snapshot, &location);
    }
}

impl LocationSource for MemoryLocation {
    fn current(&self) -> String {
        self.history.borrow().last().cloned().unwrap_or_default()
    }

    fn push(&self, location: &str) {
        self.history.borrow_mut().push(location.to_string());
        self.notify(location.to_string());
    }

    fn watch(&self, callback: LocationCallback) -> SubscriptionId {
        self.watchers
            .borrow_mut()
            .subscribe(Rc::new(move |location: &String| callback(location)))
    }

    fn unwatch(&self, id: SubscriptionId) -> bool {
        self.watchers.borrow_mut().unsubscribe(id)
    }
}
