//! The router.
//!
//! Routes are kept in declaration order and the first matching pattern wins.
//! A transition runs the active route's `exit` strictly before the next
//! route's `enter`. Navigation requested from inside a handler is queued and
//! runs once the current transition has finished.

use crate::location::LocationSource;
use crate::pattern::{Params, Pattern};
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;
use voodoo_core::{Error, Result, SubscriptionId};

/// Handlers of one route. `C` is the application context passed to every
/// handler.
pub trait Route<C> {
    /// Called when the route becomes active.
    fn enter(&mut self, cx: &C, location: &str, params: &Params) -> Result<()>;

    /// Called when the route stops being active.
    fn exit(&mut self, _cx: &C, _location: &str) -> Result<()> {
        Ok(())
    }
}

/// Shared handle to a route's handlers.
pub type RouteHandle<C> = Rc<RefCell<dyn Route<C>>>;

type EnterFn<C> = Box<dyn FnMut(&C, &str, &Params) -> Result<()>>;
type ExitFn<C> = Box<dyn FnMut(&C, &str) -> Result<()>>;

/// A route built from closures.
pub struct FnRoute<C> {
    enter: EnterFn<C>,
    exit: Option<ExitFn<C>>,
}

impl<C> FnRoute<C> {
    pub fn new<F>(enter: F) -> Self
    where
        F: FnMut(&C, &str, &Params) -> Result<()> + 'static,
    {
        Self {
            enter: Box::new(enter),
            exit: None,
        }
    }

    /// Sets the exit handler.
    pub fn on_exit<F>(mut self, exit: F) -> Self
    where
        F: FnMut(&C, &str) -> Result<()> + 'static,
    {
        self.exit = Some(Box::new(exit));
        self
    }
}

impl<C> Route<C> for FnRoute<C> {
    fn enter(&mut self, cx: &C, location: &str, params: &Params) -> Result<()> {
        (self.enter)(cx, location, params)
    }

    fn exit(&mut self, cx: &C, location: &str) -> Result<()> {
        match &mut self.exit {
            Some(exit) => exit(cx, location),
            None => Ok(()),
        }
    }
}

struct Entry<C> {
    name: String,
    pattern: Pattern,
    handler: RouteHandle<C>,
}

struct Active<C> {
    /// `None` for the not-found route.
    name: Option<String>,
    location: String,
    handler: RouteHandle<C>,
}

/// An ordered table of named routes.
pub struct Router<C> {
    routes: RefCell<Vec<Entry<C>>>,
    not_found: RefCell<Option<RouteHandle<C>>>,
    active: RefCell<Option<Active<C>>>,
    queue: RefCell<VecDeque<String>>,
    navigating: Cell<bool>,
    source: RefCell<Option<(Rc<dyn LocationSource>, SubscriptionId)>>,
}

impl<C: 'static> Default for Router<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: 'static> Router<C> {
    /// Creates an empty router.
    pub fn new() -> Self {
        Self {
            routes: RefCell::new(Vec::new()),
            not_found: RefCell::new(None),
            active: RefCell::new(None),
            queue: RefCell::new(VecDeque::new()),
            navigating: Cell::new(false),
            source: RefCell::new(None),
        }
    }

    /// Adds a named route.
    pub fn add<R>(&self, name: &str, pattern: &str, route: R) -> Result<()>
    where
        R: Route<C> + 'static,
    {
        self.add_handle(name, pattern, Rc::new(RefCell::new(route)))
    }

    /// Adds a named route with a shared handler.
    pub fn add_handle(&self, name: &str, pattern: &str, handler: RouteHandle<C>) -> Result<()> {
        let pattern = Pattern::parse(pattern)?;
        let mut routes = self.routes.borrow_mut();
        if routes.iter().any(|entry| entry.name == name) {
            return Err(Error::route(format!("route '{}' already exists", name)));
        }
        routes.push(Entry {
            name: name.to_string(),
            pattern,
            handler,
        });
        Ok(())
    }

    /// Sets the route entered when no pattern matches.
    pub fn set_not_found<R>(&self, route: R)
    where
        R: Route<C> + 'static,
    {
        let handler: RouteHandle<C> = Rc::new(RefCell::new(route));
        *self.not_found.borrow_mut() = Some(handler);
    }

    /// Returns the route names in declaration order.
    pub fn names(&self) -> Vec<String> {
        self.routes
            .borrow()
            .iter()
            .map(|entry| entry.name.clone())
            .collect()
    }

    /// Returns the name of the active route. The not-found route has no name.
    pub fn current_route(&self) -> Option<String> {
        self.active
            .borrow()
            .as_ref()
            .and_then(|active| active.name.clone())
    }

    /// Returns the location of the active route.
    pub fn current_location(&self) -> Option<String> {
        self.active
            .borrow()
            .as_ref()
            .map(|active| active.location.clone())
    }

    /// Builds the location of a named route.
    pub fn reverse(&self, name: &str, params: &Params) -> Result<String> {
        let routes = self.routes.borrow();
        let entry = routes
            .iter()
            .find(|entry| entry.name == name)
            .ok_or_else(|| Error::route(format!("unknown route '{}'", name)))?;
        entry.pattern.reverse(params)
    }

    /// Navigates to `location`.
    ///
    /// Returns the first handler error; queued navigations still run.
    pub fn navigate(&self, cx: &C, location: &str) -> Result<()> {
        self.queue.borrow_mut().push_back(location.to_string());
        if self.navigating.replace(true) {
            tracing::debug!(message = "router.queued", %location);
            return Ok(());
        }

        let mut first_error = None;
        loop {
            let next = self.queue.borrow_mut().pop_front();
            let next = match next {
                Some(next) => next,
                None => break,
            };
            if let Err(err) = self.transition(cx, &next) {
                first_error.get_or_insert(err);
            }
        }
        self.navigating.set(false);

        match first_error {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn transition(&self, cx: &C, location: &str) -> Result<()> {
        if self.current_location().as_deref() == Some(location) {
            tracing::trace!(message = "router.unchanged", %location);
            return Ok(());
        }

        let matched = {
            let routes = self.routes.borrow();
            routes.iter().find_map(|entry| {
                entry
                    .pattern
                    .matches(location)
                    .map(|params| (Some(entry.name.clone()), Rc::clone(&entry.handler), params))
            })
        };
        let (name, handler, params) = match matched {
            Some(matched) => matched,
            None => match self.not_found.borrow().clone() {
                Some(handler) => (None, handler, Params::new()),
                None => {
                    tracing::debug!(message = "router.unmatched", %location);
                    return Ok(());
                }
            },
        };

        let previous = self.active.borrow_mut().take();
        if let Some(previous) = previous {
            tracing::debug!(
                message = "router.exit",
                route = ?previous.name,
                location = %previous.location
            );
            if let Err(err) = previous.handler.borrow_mut().exit(cx, &previous.location) {
                tracing::warn!(message = "router.exit_failed", route = ?previous.name, %err);
            }
        }

        tracing::debug!(message = "router.enter", route = ?name, %location);
        handler.borrow_mut().enter(cx, location, &params)?;
        *self.active.borrow_mut() = Some(Active {
            name,
            location: location.to_string(),
            handler,
        });
        Ok(())
    }

    /// Follows `source`: navigates to its current location now and on every
    /// change.
    pub fn attach(self: &Rc<Self>, cx: Rc<C>, source: Rc<dyn LocationSource>) -> Result<()> {
        self.detach();
        let router = Rc::downgrade(self);
        let context = Rc::clone(&cx);
        let id = source.watch(Rc::new(move |location: &str| {
            if let Some(router) = router.upgrade() {
                if let Err(err) = router.navigate(&context, location) {
                    tracing::warn!(message = "router.navigate_failed", %location, %err);
                }
            }
        }));
        *self.source.borrow_mut() = Some((Rc::clone(&source), id));
        self.navigate(&cx, &source.current())
    }

    /// Stops following the attached location source.
    pub fn detach(&self) {
        let attached = self.source.borrow_mut().take();
        if let Some((source, id)) = attached {
            source.unwatch(id);
        }
    }

    /// Pushes the location of a named route to the attached source.
    pub fn go(&self, name: &str, params: &Params) -> Result<()> {
        let location = self.reverse(name, params)?;
        let source = self
            .source
            .borrow()
            .as_ref()
            .map(|(source, _)| Rc::clone(source))
            .ok_or_else(|| Error::route("router is not attached to a location source"))?;
        source.push(&location);
        Ok(())
    }
}
