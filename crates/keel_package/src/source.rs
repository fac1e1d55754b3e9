//! Source package loader
//!
//! Reads authoritative, human-editable JSON source packages. Source
//! files are small and are parsed in full at open, so requests complete
//! on the first poll; the begin/try-finish protocol is identical to the
//! cache loader's so callers never care which medium backs a path.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::SystemTime;

use keel_path::{Name, ObjectPath, PathTable};
use serde::{Deserialize, Serialize};

use crate::loader::{complete_object, failure_error, LoadStatus, PackageError, PackageLoader};
use crate::request::{ObjectPayload, RequestFailure, RequestId, RequestTracker};

/// Source package document format version
pub const SOURCE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct SourceDocument {
    format: u32,
    objects: Vec<SourceObjectRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
struct SourceObjectRecord {
    path: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    data: Vec<u8>,
    #[serde(default)]
    links: Vec<String>,
}

struct SourceObject<'p> {
    path: ObjectPath<'p>,
    type_name: Name<'p>,
    data: Vec<u8>,
    links: Vec<String>,
}

/// Loader over one editable JSON source package file.
pub struct SourcePackageLoader<'p> {
    table: &'p PathTable<'p>,
    file_path: PathBuf,
    timestamp: SystemTime,
    objects: Vec<SourceObject<'p>>,
    index_by_path: HashMap<ObjectPath<'p>, usize>,
    tracker: RequestTracker<'p>,
}

impl<'p> SourcePackageLoader<'p> {
    /// Open and parse a source package.
    pub fn open(
        file_path: impl Into<PathBuf>,
        table: &'p PathTable<'p>,
    ) -> Result<Self, PackageError> {
        let file_path = file_path.into();
        let open_err = |source: std::io::Error| PackageError::Open {
            path: file_path.clone(),
            source,
        };

        let text = std::fs::read_to_string(&file_path).map_err(open_err)?;
        let document: SourceDocument = serde_json::from_str(&text)
            .map_err(|e| PackageError::Malformed(format!("source package: {}", e)))?;
        if document.format != SOURCE_FORMAT_VERSION {
            return Err(PackageError::Malformed(format!(
                "unsupported source format {}",
                document.format
            )));
        }

        let timestamp = std::fs::metadata(&file_path)
            .and_then(|m| m.modified())
            .map_err(open_err)?;

        let mut objects = Vec::with_capacity(document.objects.len());
        let mut index_by_path = HashMap::with_capacity(document.objects.len());
        for record in document.objects {
            let path = table.set(&record.path)?;
            let type_name = table.intern_name(&record.type_name)?;
            if index_by_path.insert(path, objects.len()).is_some() {
                return Err(PackageError::Malformed(format!(
                    "duplicate object path {}",
                    record.path
                )));
            }
            objects.push(SourceObject {
                path,
                type_name,
                data: record.data,
                links: record.links,
            });
        }

        log::debug!(
            "opened source package {:?} with {} objects",
            file_path,
            objects.len()
        );

        Ok(Self {
            table,
            file_path,
            timestamp,
            objects,
            index_by_path,
            tracker: RequestTracker::new(),
        })
    }

    /// Path of the backing source file
    pub fn file_path(&self) -> &std::path::Path {
        &self.file_path
    }
}

impl<'p> PackageLoader<'p> for SourcePackageLoader<'p> {
    fn begin_load(&self, path: ObjectPath<'p>) -> Result<RequestId, PackageError> {
        let id = self.tracker.issue(path)?;
        match self.index_by_path.get(&path) {
            Some(&index) => {
                let object = &self.objects[index];
                self.tracker.fulfill(
                    id,
                    Ok(ObjectPayload {
                        data: object.data.clone(),
                        links: object.links.clone(),
                    }),
                );
            }
            None => self.tracker.fulfill(id, Err(RequestFailure::NotFound)),
        }
        Ok(id)
    }

    fn try_finish_load(&self, id: RequestId) -> Result<LoadStatus<'p>, PackageError> {
        match self.tracker.claim(id)? {
            crate::request::Claim::Pending => Ok(LoadStatus::Pending),
            crate::request::Claim::Ready { path, result } => match result {
                Ok(payload) => {
                    let index = self
                        .index_by_path
                        .get(&path)
                        .copied()
                        .ok_or_else(|| PackageError::ObjectNotFound(path.to_string()))?;
                    complete_object(self.table, path, self.objects[index].type_name, payload)
                }
                Err(failure) => {
                    let error = failure_error(path, failure);
                    log::warn!("load from {:?} failed: {}", self.file_path, error);
                    Err(error)
                }
            },
        }
    }

    fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn object_path(&self, index: usize) -> Option<ObjectPath<'p>> {
        self.objects.get(index).map(|o| o.path)
    }

    fn object_type(&self, index: usize) -> Option<Name<'p>> {
        self.objects.get(index).map(|o| o.type_name)
    }

    fn is_source_package(&self) -> bool {
        true
    }

    fn file_timestamp(&self) -> Option<SystemTime> {
        Some(self.timestamp)
    }
}
