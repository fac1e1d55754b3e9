//! # keel_package - Asynchronous Package Loading
//!
//! Turns an interned [`keel_path::ObjectPath`] into an object's
//! serialized property data plus an ordered link table of dependency
//! paths, without ever blocking the caller:
//! - `begin_load` registers a request and kicks off the backing read
//! - `try_finish_load` is a non-blocking poll that delivers the loaded
//!   object (or a per-request failure) exactly once
//!
//! Two loader variants share the [`PackageLoader`] contract, selected by
//! backing medium at construction time:
//! - [`SourcePackageLoader`] - authoritative, human-editable JSON source
//!   packages (timestamp meaningful for cache invalidation)
//! - [`CachePackageLoader`] - pre-baked binary cache packages with a
//!   random-access manifest and independently addressable object bodies,
//!   read by a background I/O worker pool

pub mod cache;
pub mod format;
pub mod io;
pub mod loader;
pub mod request;
pub mod source;

pub use cache::CachePackageLoader;
pub use format::{write_cache_package, PackageObject, CACHE_MAGIC, CACHE_VERSION};
pub use loader::{LoadStatus, LoadedObject, PackageError, PackageLoader};
pub use request::RequestId;
pub use source::{SourcePackageLoader, SOURCE_FORMAT_VERSION};
