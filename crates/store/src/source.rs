//! The network boundary.
//!
//! Models and stores never talk to a transport directly. They hand a resource
//! name to a [`DataSource`] and get back a future resolving to a [`Response`].
//! A status of `0` means the request never reached a server.

use futures::future::{self, FutureExt, LocalBoxFuture};
use hashbrown::HashMap;
use serde_json::Value as Json;
use std::cell::{Cell, RefCell};

/// A transport response.
#[derive(Clone, Debug, PartialEq)]
pub struct Response {
    /// HTTP-like status code, `0` for a transport failure.
    pub status: u16,
    /// Decoded response body.
    pub body: Json,
}

impl Response {
    /// Creates a response.
    pub fn new(status: u16, body: Json) -> Self {
        Self { status, body }
    }

    /// Creates a `200` response.
    pub fn ok(body: Json) -> Self {
        Self::new(200, body)
    }

    /// Creates a transport failure.
    pub fn failure() -> Self {
        Self::new(0, Json::Null)
    }

    /// Returns true for 2xx statuses.
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Asynchronous transport used by models and stores.
pub trait DataSource {
    /// Reads `resource`.
    fn fetch(&self, resource: &str) -> LocalBoxFuture<'static, Response>;

    /// Writes `body` to `resource`.
    fn save(&self, resource: &str, body: Json) -> LocalBoxFuture<'static, Response>;
}

/// A recorded request made against a [`MemorySource`].
#[derive(Clone, Debug, PartialEq)]
pub enum Request {
    Fetch(String),
    Save(String, Json),
}

/// An in-memory data source with canned responses.
///
/// Unknown resources answer `404`. Saves echo the body back with `201`,
/// assigning a numeric `id` when the body has none.
#[derive(Default)]
pub struct MemorySource {
    responses: RefCell<HashMap<String, Response>>,
    requests: RefCell<Vec<Request>>,
    next_id: Cell<i64>,
}

impl MemorySource {
    /// Creates an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the response for `resource`.
    pub fn respond(&self, resource: impl Into<String>, response: Response) {
        self.responses.borrow_mut().insert(resource.into(), response);
    }

    /// Returns every request made so far, in order.
    pub fn requests(&self) -> Vec<Request> {
        self.requests.borrow().clone()
    }

    fn lookup(&self, resource: &str) -> Option<Response> {
        self.responses.borrow().get(resource).cloned()
    }
}

impl DataSource for MemorySource {
    fn fetch(&self, resource: &str) -> LocalBoxFuture<'static, Response> {
        self.requests
            .borrow_mut()
            .push(Request::Fetch(resource.to_string()));
        let response = self
            .lookup(resource)
            .unwrap_or_else(|| Response::new(404, Json::Null));
        future::ready(response).boxed_local()
    }

    fn save(&self, resource: &str, body: Json) -> LocalBoxFuture<'static, Response> {
        self.requests
            .borrow_mut()
            .push(Request::Save(resource.to_string(), body.clone()));
        if let Some(response) = self.lookup(resource) {
            return future::ready(response).boxed_local();
        }

        let mut body = body;
        if let Json::Object(map) = &mut body {
            let missing = map.get("id").map_or(true, Json::is_null);
            if missing {
                let id = self.next_id.get() + 1;
                self.next_id.set(id);
                map.insert("id".to_string(), Json::from(id));
            }
        }
        future::ready(Response::new(201, body)).boxed_local()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::executor::block_on;
    use serde_json::json;

    #[test]
    fn test_response_success_range() {
        assert!(Response::ok(Json::Null).is_success());
        assert!(Response::new(204, Json::Null).is_success());
        assert!(!Response::new(404, Json::Null).is_success());
        assert!(!Response::failure().is_success());
        assert_eq!(Response::failure().status, 0);
    }

    #[test]
    fn test_memory_source_fetch() {
        let source = MemorySource::new();
        source.respond("/todos", Response::ok(json!({"items": []})));

        let response = block_on(source.fetch("/todos"));
        assert_eq!(response.status, 200);
        assert_eq!(block_on(source.fetch("/missing")).status, 404);
        assert_eq!(
            source.requests(),
            vec![
                Request::Fetch("/todos".into()),
                Request::Fetch("/missing".into())
            ]
        );
    }

    #[test]
    fn test_memory_source_save_assigns_id() {
        let source = MemorySource::new();
        let response = block_on(source.save("/todos", json!({"text": "a", "id": null})));
        assert_eq!(response.status, 201);
        assert_eq!(response.body["id"], json!(1));

        let response = block_on(source.save("/todos", json!({"text": "b", "id": 9})));
        assert_eq!(response.body["id"], json!(9));
    }
}
