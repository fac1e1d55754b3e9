//! Cache package loader
//!
//! Reads pre-baked binary cache packages. The manifest is read and
//! interned at open; object bodies are fetched on demand by byte-range
//! reads on the background I/O pool, so neither `begin_load` nor
//! `try_finish_load` ever touches the disk on the calling thread.

use std::collections::HashMap;
use std::fs::File;
use std::path::PathBuf;
use std::time::SystemTime;

use keel_path::{Name, ObjectPath, PathTable};

use crate::format::{read_cache_manifest, ObjectBody};
use crate::io::{IoJob, IoPool};
use crate::loader::{complete_object, failure_error, LoadStatus, PackageError, PackageLoader};
use crate::request::{ObjectPayload, RequestFailure, RequestId, RequestTracker};

struct CacheObject<'p> {
    path: ObjectPath<'p>,
    type_name: Name<'p>,
    offset: u64,
    len: u64,
}

/// Loader over one pre-baked cache package file.
pub struct CachePackageLoader<'p> {
    table: &'p PathTable<'p>,
    file_path: PathBuf,
    objects: Vec<CacheObject<'p>>,
    index_by_path: HashMap<ObjectPath<'p>, usize>,
    tracker: RequestTracker<'p>,
    pool: IoPool,
}

impl<'p> CachePackageLoader<'p> {
    /// Number of background read workers per loader
    pub const IO_WORKER_COUNT: usize = 2;

    /// Open a cache package and read its manifest.
    ///
    /// A missing or malformed file fails the whole loader; there are no
    /// partial manifests.
    pub fn open(
        file_path: impl Into<PathBuf>,
        table: &'p PathTable<'p>,
    ) -> Result<Self, PackageError> {
        let file_path = file_path.into();
        let open_err = |source: std::io::Error| PackageError::Open {
            path: file_path.clone(),
            source,
        };

        let mut file = File::open(&file_path).map_err(open_err)?;
        let manifest = read_cache_manifest(&mut file)?;

        let mut objects = Vec::with_capacity(manifest.entries.len());
        let mut index_by_path = HashMap::with_capacity(manifest.entries.len());
        for entry in &manifest.entries {
            let path = table.set(&entry.path)?;
            let type_name = table.intern_name(&entry.type_name)?;
            if index_by_path.insert(path, objects.len()).is_some() {
                return Err(PackageError::Malformed(format!(
                    "duplicate object path {}",
                    entry.path
                )));
            }
            objects.push(CacheObject {
                path,
                type_name,
                offset: entry.offset,
                len: entry.len,
            });
        }

        let pool = IoPool::spawn(&file_path, Self::IO_WORKER_COUNT).map_err(open_err)?;
        log::debug!(
            "opened cache package {:?} with {} objects",
            file_path,
            objects.len()
        );

        Ok(Self {
            table,
            file_path,
            objects,
            index_by_path,
            tracker: RequestTracker::new(),
            pool,
        })
    }

    /// Path of the backing cache file
    pub fn file_path(&self) -> &std::path::Path {
        &self.file_path
    }

    /// Move finished reads from the I/O pool into the request tracker.
    fn pump(&self) {
        while let Some(complete) = self.pool.try_complete() {
            let result = match complete.result {
                Ok(bytes) => match bincode::deserialize::<ObjectBody>(&bytes) {
                    Ok(body) => Ok(ObjectPayload {
                        data: body.data,
                        links: body.links,
                    }),
                    Err(e) => Err(RequestFailure::Malformed(format!("object body: {}", e))),
                },
                Err(message) => Err(RequestFailure::Read(message)),
            };
            self.tracker.fulfill(complete.id, result);
        }
    }
}

impl<'p> PackageLoader<'p> for CachePackageLoader<'p> {
    fn begin_load(&self, path: ObjectPath<'p>) -> Result<RequestId, PackageError> {
        let id = self.tracker.issue(path)?;
        match self.index_by_path.get(&path) {
            Some(&index) => {
                let object = &self.objects[index];
                self.pool.submit(IoJob {
                    id,
                    offset: object.offset,
                    len: object.len,
                });
            }
            // Not in the manifest: the request itself fails, reported on
            // the next poll rather than silently returning empty data.
            None => self.tracker.fulfill(id, Err(RequestFailure::NotFound)),
        }
        Ok(id)
    }

    fn try_finish_load(&self, id: RequestId) -> Result<LoadStatus<'p>, PackageError> {
        self.pump();
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
        false
    }

    fn file_timestamp(&self) -> Option<SystemTime> {
        // Timestamps only drive cache invalidation of authoritative
        // source files.
        None
    }
}

impl Drop for CachePackageLoader<'_> {
    fn drop(&mut self) {
        let outstanding = self.tracker.outstanding();
        if outstanding > 0 {
            log::debug!(
                "dropping cache loader {:?} with {} unclaimed requests",
                self.file_path,
                outstanding
            );
        }
        self.tracker.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{write_cache_package, PackageObject};
    use keel_memory::BlockArena;
    use std::path::Path;
    use std::time::Duration;

    fn init_logs() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn fixture_objects() -> Vec<PackageObject> {
        vec![
            PackageObject {
                path: "Art/Characters:Hero".to_string(),
                type_name: "Entity".to_string(),
                data: vec![0xAA, 0xBB, 0xCC],
                links: vec![
                    "Art/Materials:Skin".to_string(),
                    "Art/Meshes:HeroMesh".to_string(),
                ],
            },
            PackageObject {
                path: "Art/Materials:Skin".to_string(),
                type_name: "Material".to_string(),
                data: vec![0x01],
                links: vec![],
            },
            PackageObject {
                path: "Art/Meshes:HeroMesh".to_string(),
                type_name: "Mesh".to_string(),
                data: vec![0x02, 0x03],
                links: vec![],
            },
        ]
    }

    fn write_fixture(dir: &Path) -> std::path::PathBuf {
        let path = dir.join("art.kpc");
        write_cache_package(&path, &fixture_objects()).unwrap();
        path
    }

    fn poll_to_completion<'p>(
        loader: &impl PackageLoader<'p>,
        id: RequestId,
    ) -> Result<crate::LoadedObject<'p>, PackageError> {
        for _ in 0..1000 {
            match loader.try_finish_load(id)? {
                LoadStatus::Pending => std::thread::sleep(Duration::from_millis(1)),
                LoadStatus::Complete(object) => return Ok(object),
            }
        }
        panic!("load request never completed");
    }

    #[test]
    fn test_open_and_manifest_queries() {
        init_logs();
        let dir = tempfile::tempdir().unwrap();
        let file = write_fixture(dir.path());

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);
        let loader = CachePackageLoader::open(&file, &table).unwrap();

        assert_eq!(loader.object_count(), 3);
        assert_eq!(
            loader.object_path(0).unwrap(),
            table.set("Art/Characters:Hero").unwrap()
        );
        assert_eq!(loader.object_type(0).unwrap().as_str(), "Entity");
        assert_eq!(loader.object_type(2).unwrap().as_str(), "Mesh");
        assert!(loader.object_path(3).is_none());
        assert!(loader.object_type(99).is_none());
        assert!(!loader.is_source_package());
        assert!(loader.file_timestamp().is_none());
    }

    #[test]
    fn test_load_delivers_object_and_link_table() {
        init_logs();
        let dir = tempfile::tempdir().unwrap();
        let file = write_fixture(dir.path());

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);
        let loader = CachePackageLoader::open(&file, &table).unwrap();

        let hero = table.set("Art/Characters:Hero").unwrap();
        let id = loader.begin_load(hero).unwrap();
        let object = poll_to_completion(&loader, id).unwrap();

        assert_eq!(object.path, hero);
        assert_eq!(object.type_name.as_str(), "Entity");
        assert_eq!(object.data, vec![0xAA, 0xBB, 0xCC]);
        assert_eq!(
            object.links,
            vec![
                table.set("Art/Materials:Skin").unwrap(),
                table.set("Art/Meshes:HeroMesh").unwrap(),
            ]
        );

        // The id is dead after the completed poll.
        assert!(matches!(
            loader.try_finish_load(id),
            Err(PackageError::RequestFinished(_))
        ));
    }

    #[test]
    fn test_independent_requests() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_fixture(dir.path());

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);
        let loader = CachePackageLoader::open(&file, &table).unwrap();

        let ids: Vec<_> = (0..loader.object_count())
            .map(|i| loader.begin_load(loader.object_path(i).unwrap()).unwrap())
            .collect();

        for (i, id) in ids.into_iter().enumerate() {
            let object = poll_to_completion(&loader, id).unwrap();
            assert_eq!(object.path, loader.object_path(i).unwrap());
        }
    }

    #[test]
    fn test_missing_object_fails_request_not_loader() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_fixture(dir.path());

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);
        let loader = CachePackageLoader::open(&file, &table).unwrap();

        let missing = table.set("Art:Nope").unwrap();
        let bad_id = loader.begin_load(missing).unwrap();
        assert!(matches!(
            loader.try_finish_load(bad_id),
            Err(PackageError::ObjectNotFound(_))
        ));

        // Other requests on the same loader are unaffected.
        let hero = table.set("Art/Characters:Hero").unwrap();
        let id = loader.begin_load(hero).unwrap();
        assert!(poll_to_completion(&loader, id).is_ok());
    }

    #[test]
    fn test_double_begin_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_fixture(dir.path());

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);
        let loader = CachePackageLoader::open(&file, &table).unwrap();

        let hero = table.set("Art/Characters:Hero").unwrap();
        let id = loader.begin_load(hero).unwrap();
        assert!(matches!(
            loader.begin_load(hero),
            Err(PackageError::LoadInFlight(_))
        ));

        // Once claimed, the path is loadable again.
        poll_to_completion(&loader, id).unwrap();
        assert!(loader.begin_load(hero).is_ok());
    }

    #[test]
    fn test_unknown_request_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_fixture(dir.path());

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);
        let loader = CachePackageLoader::open(&file, &table).unwrap();

        assert!(matches!(
            loader.try_finish_load(RequestId::test_id(4242)),
            Err(PackageError::UnknownRequest(_))
        ));
    }

    #[test]
    fn test_malformed_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("garbage.kpc");
        std::fs::write(&path, b"not a package at all").unwrap();

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);
        assert!(matches!(
            CachePackageLoader::open(&path, &table),
            Err(PackageError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_file_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.kpc");

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);
        assert!(matches!(
            CachePackageLoader::open(&path, &table),
            Err(PackageError::Open { .. })
        ));
    }

    #[test]
    fn test_drop_with_outstanding_request() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_fixture(dir.path());

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);
        let loader = CachePackageLoader::open(&file, &table).unwrap();

        let hero = table.set("Art/Characters:Hero").unwrap();
        let _abandoned = loader.begin_load(hero).unwrap();
        // Never polled; dropping the loader must reclaim it cleanly.
        drop(loader);
    }
}
