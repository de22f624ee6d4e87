//! Request bookkeeping shared by models and stores.

use crate::source::Response;
use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use voodoo_core::Value;
use voodoo_reactive::Observable;

/// Lifecycle of the most recent request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum XhrState {
    Idle,
    Loading,
    Success,
    Error,
}

impl XhrState {
    /// Returns the name stored in the `xhr.state` property.
    pub fn as_str(&self) -> &'static str {
        match self {
            XhrState::Idle => "idle",
            XhrState::Loading => "loading",
            XhrState::Success => "success",
            XhrState::Error => "error",
        }
    }

    /// Parses a state name.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "idle" => Some(XhrState::Idle),
            "loading" => Some(XhrState::Loading),
            "success" => Some(XhrState::Success),
            "error" => Some(XhrState::Error),
            _ => None,
        }
    }
}

impl fmt::Display for XhrState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `xhr` record plus the request epoch of one entity.
///
/// A request captures the epoch when it starts; its completion is applied
/// only if the epoch is still the same.
pub(crate) struct SyncState {
    xhr: Rc<Observable>,
    epoch: Cell<u64>,
}

impl SyncState {
    pub(crate) fn new() -> Self {
        Self {
            xhr: Rc::new(Observable::with_values([
                ("state", Value::from(XhrState::Idle.as_str())),
                ("code", Value::Int(0)),
            ])),
            epoch: Cell::new(0),
        }
    }

    pub(crate) fn xhr(&self) -> &Rc<Observable> {
        &self.xhr
    }

    pub(crate) fn epoch(&self) -> u64 {
        self.epoch.get()
    }

    pub(crate) fn is_current(&self, epoch: u64) -> bool {
        self.epoch.get() == epoch
    }

    /// Invalidates every outstanding request.
    pub(crate) fn bump(&self) {
        self.epoch.set(self.epoch.get() + 1);
    }

    pub(crate) fn state(&self) -> XhrState {
        self.xhr
            .get("state")
            .and_then(|v| v.as_str().and_then(XhrState::parse))
            .unwrap_or(XhrState::Idle)
    }

    /// Marks a request as started and returns its epoch. Any request still
    /// outstanding becomes stale.
    pub(crate) fn begin(&self) -> u64 {
        self.bump();
        self.xhr.insert("state", XhrState::Loading.as_str());
        self.epoch.get()
    }

    /// Records a completed request on the `xhr` record and on `owner.status`.
    pub(crate) fn finish(&self, owner: &Observable, response: &Response) {
        let state = if response.is_success() {
            XhrState::Success
        } else {
            XhrState::Error
        };
        self.xhr.insert("code", response.status);
        owner.insert("status", response.status);
        self.xhr.insert("state", state.as_str());
    }
}
