//! Path watches.
//!
//! A `PathWatch` follows a multi-segment path such as `model.xhr.state`. It
//! holds one subscription per segment. When an intermediate segment is
//! replaced, every link below it is dropped and rebuilt against the new
//! object, and the callback fires with the new leaf value.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use voodoo_core::{resolve, Callback, Error, ObjectRef, Path, Result, SubscriptionId, Value};

/// One subscription of a watch: `target.subscribe(segment)` at some depth.
struct Link {
    target: ObjectRef,
    id: SubscriptionId,
}

struct WatchInner {
    path: Path,
    callback: Callback,
    /// `links[d]` watches segment `d`
    links: RefCell<Vec<Link>>,
    active: Cell<bool>,
}

/// A subscription on a dot-separated path.
///
/// Dropping the watch cancels it.
pub struct PathWatch {
    inner: Rc<WatchInner>,
}

impl PathWatch {
    /// Installs a watch on `path`, starting at `root`.
    ///
    /// Every segment must be declared at install time; a missing key or a
    /// primitive intermediate fails with `Error::Path` and leaves nothing
    /// subscribed.
    pub fn new(root: ObjectRef, path: Path, callback: Callback) -> Result<Self> {
        let inner = Rc::new(WatchInner {
            path,
            callback,
            links: RefCell::new(Vec::new()),
            active: Cell::new(true),
        });
        if let Err(err) = WatchInner::link_from(&inner, 0, root) {
            inner.unlink_from(0);
            return Err(err);
        }
        Ok(Self { inner })
    }

    /// Installs a watch with a closure callback.
    pub fn watch<F>(root: ObjectRef, path: Path, callback: F) -> Result<Self>
    where
        F: Fn(&Value) + 'static,
    {
        Self::new(root, path, Rc::new(callback))
    }

    /// Returns the watched path.
    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Reads the current leaf value through the live links.
    pub fn current(&self) -> Result<Value> {
        let root = match self.inner.links.borrow().first() {
            Some(link) => Rc::clone(&link.target),
            None => return Err(Error::path(self.inner.path.to_string(), self.inner.path.head())),
        };
        resolve(root.as_ref(), &self.inner.path)
    }

    /// Returns the number of live segment subscriptions.
    pub fn link_count(&self) -> usize {
        self.inner.links.borrow().len()
    }

    /// Returns true until the watch is cancelled.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    /// Removes every link. Idempotent.
    pub fn cancel(&self) {
        if self.inner.active.replace(false) {
            self.inner.unlink_from(0);
        }
    }
}

impl Drop for PathWatch {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl WatchInner {
    /// Subscribes segments `depth..` starting at `start`.
    fn link_from(inner: &Rc<Self>, depth: usize, start: ObjectRef) -> Result<()> {
        let segments = inner.path.segments();
        let mut target = start;
        for (d, segment) in segments.iter().enumerate().skip(depth) {
            let weak: Weak<Self> = Rc::downgrade(inner);
            let id = target.subscribe(
                segment,
                Rc::new(move |value: &Value| {
                    if let Some(inner) = weak.upgrade() {
                        WatchInner::on_change(&inner, d, value);
                    }
                }),
            )?;
            inner.links.borrow_mut().push(Link {
                target: Rc::clone(&target),
                id,
            });
            if d + 1 == segments.len() {
                break;
            }
            target = match target.get(segment) {
                Some(Value::Object(next)) => next,
                _ => return Err(Error::path(inner.path.to_string(), segment.as_str())),
            };
        }
        Ok(())
    }

    /// Unsubscribes links at `depth` and below.
    fn unlink_from(&self, depth: usize) {
        let dropped: Vec<Link> = {
            let mut links = self.links.borrow_mut();
            if depth >= links.len() {
                return;
            }
            links.drain(depth..).collect()
        };
        for link in dropped {
            link.target.unsubscribe(link.id);
        }
    }

    fn on_change(inner: &Rc<Self>, depth: usize, value: &Value) {
        if !inner.active.get() {
            return;
        }
        let segments = inner.path.segments();
        if depth + 1 == segments.len() {
            (inner.callback)(value);
            return;
        }

        inner.unlink_from(depth + 1);
        let leaf = match value {
            Value::Object(next) => match WatchInner::link_from(inner, depth + 1, Rc::clone(next)) {
                Ok(()) => read_below(next, &segments[depth + 1..]),
                Err(err) => {
                    tracing::debug!(message = "watch.relink_failed", path = %inner.path, %err);
                    inner.unlink_from(depth + 1);
                    Value::Null
                }
            },
            _ => Value::Null,
        };
        tracing::trace!(message = "watch.relinked", path = %inner.path, depth);
        (inner.callback)(&leaf);
    }
}

/// Reads `segments` below `start`, yielding `Null` on any miss.
fn read_below(start: &ObjectRef, segments: &[String]) -> Value {
    let mut current = Value::Object(Rc::clone(start));
    for segment in segments {
        current = match current {
            Value::Object(obj) => obj.get(segment).unwrap_or_default(),
            _ => return Value::Null,
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Observable;

    fn record(pairs: &[(&str, Value)]) -> Rc<Observable> {
        Rc::new(Observable::with_values(
            pairs.iter().map(|(k, v)| (k.to_string(), v.clone())),
        ))
    }

    fn recorder() -> (Rc<RefCell<Vec<Value>>>, Callback) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = log.clone();
        let callback: Callback = Rc::new(move |v: &Value| log_clone.borrow_mut().push(v.clone()));
        (log, callback)
    }

    #[test]
    fn test_watch_leaf_changes() {
        let xhr = record(&[("state", "idle".into())]);
        let model = record(&[("xhr", Value::object(xhr.clone()))]);
        let (log, callback) = recorder();

        let watch = PathWatch::new(model.clone(), Path::parse("xhr.state").unwrap(), callback)
            .unwrap();
        assert_eq!(watch.link_count(), 2);
        assert_eq!(watch.current().unwrap(), Value::from("idle"));

        xhr.set("state", "loading").unwrap();
        assert_eq!(*log.borrow(), vec![Value::from("loading")]);
    }

    #[test]
    fn test_watch_relinks_replaced_intermediate() {
        let first = record(&[("text", "a".into())]);
        let second = record(&[("text", "b".into())]);
        let view = record(&[("model", Value::object(first.clone()))]);
        let (log, callback) = recorder();

        let watch =
            PathWatch::new(view.clone(), Path::parse("model.text").unwrap(), callback).unwrap();

        view.set("model", Value::object(second.clone())).unwrap();
        assert_eq!(*log.borrow(), vec![Value::from("b")]);
        assert_eq!(first.subscriber_count("text"), 0);
        assert_eq!(second.subscriber_count("text"), 1);

        // The old object is no longer watched.
        first.set("text", "stale").unwrap();
        second.set("text", "fresh").unwrap();
        assert_eq!(*log.borrow(), vec![Value::from("b"), Value::from("fresh")]);
        assert_eq!(watch.link_count(), 2);
    }

    #[test]
    fn test_watch_intermediate_becomes_primitive() {
        let inner = record(&[("text", "a".into())]);
        let view = record(&[("model", Value::object(inner.clone()))]);
        let (log, callback) = recorder();

        let watch =
            PathWatch::new(view.clone(), Path::parse("model.text").unwrap(), callback).unwrap();
        view.set("model", Value::Null).unwrap();

        assert_eq!(*log.borrow(), vec![Value::Null]);
        assert_eq!(watch.link_count(), 1);
        assert_eq!(inner.subscriber_count("text"), 0);
    }

    #[test]
    fn test_watch_install_fails_on_missing_segment() {
        let model = record(&[("text", "a".into())]);
        let (_, callback) = recorder();

        let err = PathWatch::new(model.clone(), Path::parse("txt").unwrap(), callback.clone())
            .err()
            .unwrap();
        assert!(err.is_path_error());

        let err = PathWatch::new(model.clone(), Path::parse("text.length").unwrap(), callback)
            .err()
            .unwrap();
        assert_eq!(err, Error::path("text.length", "text"));
        assert_eq!(model.subscription_count(), 0);
    }

    #[test]
    fn test_watch_drop_unsubscribes() {
        let xhr = record(&[("state", "idle".into())]);
        let model = record(&[("xhr", Value::object(xhr.clone()))]);
        let (log, callback) = recorder();

        let watch =
            PathWatch::new(model.clone(), Path::parse("xhr.state").unwrap(), callback).unwrap();
        drop(watch);

        assert_eq!(model.subscription_count(), 0);
        assert_eq!(xhr.subscription_count(), 0);
        xhr.set("state", "error").unwrap();
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_watch_cancel_is_idempotent() {
        let model = record(&[("text", "a".into())]);
        let (log, callback) = recorder();
        let watch = PathWatch::new(model.clone(), Path::key("text"), callback).unwrap();

        watch.cancel();
        watch.cancel();
        assert!(!watch.is_active());
        model.set("text", "b").unwrap();
        assert!(log.borrow().is_empty());
    }
}
