//! Load request tracking
//!
//! Correlates opaque request ids with in-flight asynchronous reads.
//! Owned by a loader implementation; ids are never object indices.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use keel_path::ObjectPath;
use parking_lot::Mutex;

use crate::loader::PackageError;

/// Opaque load request identifier
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct RequestId(u64);

impl RequestId {
    /// Raw id value
    pub fn raw(self) -> u64 {
        self.0
    }

    #[cfg(test)]
    pub(crate) fn test_id(raw: u64) -> Self {
        Self(raw)
    }
}

/// Decoded object body waiting to be claimed.
pub(crate) struct ObjectPayload {
    pub data: Vec<u8>,
    pub links: Vec<String>,
}

/// Why a request failed, carried until the caller polls for it.
pub(crate) enum RequestFailure {
    NotFound,
    Read(String),
    Malformed(String),
}

enum RequestState {
    Issued,
    Ready(Result<ObjectPayload, RequestFailure>),
}

/// Result of claiming a request id.
pub(crate) enum Claim<'p> {
    Pending,
    Ready {
        path: ObjectPath<'p>,
        result: Result<ObjectPayload, RequestFailure>,
    },
}

struct TrackerInner<'p> {
    states: HashMap<RequestId, (ObjectPath<'p>, RequestState)>,
    in_flight: HashMap<ObjectPath<'p>, RequestId>,
    finished: HashSet<RequestId>,
}

/// Tracks Issued -> Ready -> Claimed request states for one loader.
pub(crate) struct RequestTracker<'p> {
    next_id: AtomicU64,
    inner: Mutex<TrackerInner<'p>>,
}

impl<'p> RequestTracker<'p> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            inner: Mutex::new(TrackerInner {
                states: HashMap::new(),
                in_flight: HashMap::new(),
                finished: HashSet::new(),
            }),
        }
    }

    /// Register a new request for the given path.
    pub fn issue(&self, path: ObjectPath<'p>) -> Result<RequestId, PackageError> {
        let mut inner = self.inner.lock();
        if inner.in_flight.contains_key(&path) {
            return Err(PackageError::LoadInFlight(path.to_string()));
        }
        let id = RequestId(self.next_id.fetch_add(1, Ordering::Relaxed));
        inner.in_flight.insert(path, id);
        inner.states.insert(id, (path, RequestState::Issued));
        Ok(id)
    }

    /// Move an issued request to Ready. Completions for requests that no
    /// longer exist are dropped.
    pub fn fulfill(&self, id: RequestId, result: Result<ObjectPayload, RequestFailure>) {
        let mut inner = self.inner.lock();
        if let Some((_, state)) = inner.states.get_mut(&id) {
            if matches!(state, RequestState::Issued) {
                *state = RequestState::Ready(result);
            }
        }
    }

    /// Claim a request: Ready requests transition to Claimed and their
    /// payload is handed out exactly once.
    pub fn claim(&self, id: RequestId) -> Result<Claim<'p>, PackageError> {
        let mut inner = self.inner.lock();
        match inner.states.remove(&id) {
            Some((path, RequestState::Ready(result))) => {
                inner.in_flight.remove(&path);
                inner.finished.insert(id);
                Ok(Claim::Ready { path, result })
            }
            Some((path, RequestState::Issued)) => {
                inner.states.insert(id, (path, RequestState::Issued));
                Ok(Claim::Pending)
            }
            None => {
                if inner.finished.contains(&id) {
                    Err(PackageError::RequestFinished(id))
                } else {
                    Err(PackageError::UnknownRequest(id))
                }
            }
        }
    }

    /// Number of requests not yet claimed
    pub fn outstanding(&self) -> usize {
        self.inner.lock().states.len()
    }

    /// Drop all request state (loader shutdown reclamation).
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.states.clear();
        inner.in_flight.clear();
        inner.finished.clear();
    }
}
