//! Package loader contract
//!
//! One implementation per backing medium. Requests move through
//! Issued -> Ready -> Claimed with no backward transitions; cancellation
//! is not part of the contract - abandoned requests are reclaimed when
//! the loader is dropped.

use std::path::PathBuf;
use std::time::SystemTime;

use keel_path::{Name, ObjectPath, PathError, PathTable};
use thiserror::Error;

use crate::request::{ObjectPayload, RequestFailure, RequestId};

/// Errors from opening packages and driving load requests
#[derive(Debug, Error)]
pub enum PackageError {
    #[error("failed to open package file {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed package: {0}")]
    Malformed(String),

    #[error("object not present in package: {0}")]
    ObjectNotFound(String),

    #[error("a load is already in flight for {0}")]
    LoadInFlight(String),

    #[error("unknown load request {0:?}")]
    UnknownRequest(RequestId),

    #[error("load request {0:?} already finished")]
    RequestFinished(RequestId),

    #[error("read failed for {0}: {1}")]
    ReadFailed(String, String),

    #[error(transparent)]
    Path(#[from] PathError),
}

/// Outcome of one non-blocking poll
#[derive(Debug)]
pub enum LoadStatus<'p> {
    /// The backing read has not completed yet
    Pending,
    /// The request finished; the id is invalid for further polls
    Complete(LoadedObject<'p>),
}

/// A loaded object shell: fully deserialized property data, not yet
/// linked to its dependencies.
#[derive(Debug)]
pub struct LoadedObject<'p> {
    /// Path of the loaded object
    pub path: ObjectPath<'p>,
    /// Type identity from the package manifest
    pub type_name: Name<'p>,
    /// Opaque serialized property data
    pub data: Vec<u8>,
    /// Ordered link table: paths of objects this one references, to be
    /// resolved by the higher-level object loader
    pub links: Vec<ObjectPath<'p>>,
}

/// Asynchronous object retrieval from one package file.
pub trait PackageLoader<'p> {
    /// Begin asynchronous loading of an object's data.
    ///
    /// Non-blocking. A second call for a path whose request has not been
    /// claimed yet is rejected with [`PackageError::LoadInFlight`];
    /// callers normally route loads through a higher-level cache of
    /// in-flight paths.
    fn begin_load(&self, path: ObjectPath<'p>) -> Result<RequestId, PackageError>;

    /// Test for and finalize a load request without blocking.
    ///
    /// Returns [`LoadStatus::Pending`] while the backing read is in
    /// flight. Delivers [`LoadStatus::Complete`] exactly once; the id is
    /// invalid afterwards. Per-request failures (missing object, read
    /// error, malformed body) are returned as errors that finish the
    /// request and leave other in-flight requests untouched.
    fn try_finish_load(&self, id: RequestId) -> Result<LoadStatus<'p>, PackageError>;

    /// Number of objects in the package manifest
    fn object_count(&self) -> usize;

    /// Path of the object at the given manifest index
    fn object_path(&self, index: usize) -> Option<ObjectPath<'p>>;

    /// Type identity of the object at the given manifest index
    fn object_type(&self, index: usize) -> Option<Name<'p>>;

    /// Whether this loader reads an authoritative source package rather
    /// than a pre-baked cache
    fn is_source_package(&self) -> bool;

    /// Modification timestamp of the backing file; only source package
    /// loaders report one
    fn file_timestamp(&self) -> Option<SystemTime>;
}

/// Resolve a claimed payload into a finished object, interning its link
/// table through the given path registry.
pub(crate) fn complete_object<'p>(
    table: &'p PathTable<'p>,
    path: ObjectPath<'p>,
    type_name: Name<'p>,
    payload: ObjectPayload,
) -> Result<LoadStatus<'p>, PackageError> {
    let mut links = Vec::with_capacity(payload.links.len());
    for link in &payload.links {
        links.push(table.set(link)?);
    }
    Ok(LoadStatus::Complete(LoadedObject {
        path,
        type_name,
        data: payload.data,
        links,
    }))
}

pub(crate) fn failure_error(path: ObjectPath<'_>, failure: RequestFailure) -> PackageError {
    match failure {
        RequestFailure::NotFound => PackageError::ObjectNotFound(path.to_string()),
        RequestFailure::Read(message) => PackageError::ReadFailed(path.to_string(), message),
        RequestFailure::Malformed(message) => PackageError::Malformed(message),
    }
}
