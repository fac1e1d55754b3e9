//! Cache package binary format
//!
//! ```text
//! mypackage.kpc
//! ├── magic        "KPC\x01" (4 bytes)
//! ├── version      u32 LE
//! ├── manifest_len u64 LE
//! ├── manifest     bincode CacheManifest
//! └── bodies       bincode ObjectBody per object, at the manifest's
//!                  absolute offsets
//! ```
//!
//! The manifest is fully readable before any body, and every body is
//! independently addressable, so single objects can be fetched by
//! byte-range reads in any order.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::loader::PackageError;

/// Cache package magic bytes
pub const CACHE_MAGIC: &[u8; 4] = b"KPC\x01";
/// Cache package format version
pub const CACHE_VERSION: u32 = 1;
/// Upper bound on the serialized manifest (corruption guard)
const MAX_MANIFEST_LEN: u64 = 64 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CacheManifest {
    pub entries: Vec<CacheManifestEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct CacheManifestEntry {
    /// Canonical object path string
    pub path: String,
    /// Type identity
    pub type_name: String,
    /// Absolute offset of the object body
    pub offset: u64,
    /// Length of the object body in bytes
    pub len: u64,
}

/// Serialized per-object record: property data plus the link table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ObjectBody {
    pub data: Vec<u8>,
    pub links: Vec<String>,
}

/// Input record for [`write_cache_package`].
#[derive(Debug, Clone)]
pub struct PackageObject {
    /// Canonical object path string
    pub path: String,
    /// Type identity
    pub type_name: String,
    /// Opaque serialized property data
    pub data: Vec<u8>,
    /// Ordered dependency path strings
    pub links: Vec<String>,
}

/// Write a cache package file. Used by the offline cache builder.
pub fn write_cache_package(path: &Path, objects: &[PackageObject]) -> Result<(), PackageError> {
    let mut bodies = Vec::with_capacity(objects.len());
    for object in objects {
        let body = ObjectBody {
            data: object.data.clone(),
            links: object.links.clone(),
        };
        bodies.push(
            bincode::serialize(&body).map_err(|e| PackageError::Malformed(e.to_string()))?,
        );
    }

    let mut manifest = CacheManifest {
        entries: objects
            .iter()
            .zip(&bodies)
            .map(|(object, body)| CacheManifestEntry {
                path: object.path.clone(),
                type_name: object.type_name.clone(),
                offset: 0,
                len: body.len() as u64,
            })
            .collect(),
    };

    // Offsets are fixed-width in bincode, so sizing the manifest with
    // placeholder offsets and then patching them is stable.
    let manifest_len = bincode::serialized_size(&manifest)
        .map_err(|e| PackageError::Malformed(e.to_string()))?;
    let mut offset = 4 + 4 + 8 + manifest_len;
    for entry in &mut manifest.entries {
        entry.offset = offset;
        offset += entry.len;
    }
    let manifest_bytes =
        bincode::serialize(&manifest).map_err(|e| PackageError::Malformed(e.to_string()))?;
    debug_assert_eq!(manifest_bytes.len() as u64, manifest_len);

    let open_err = |source: std::io::Error| PackageError::Open {
        path: path.to_path_buf(),
        source,
    };
    let mut file = File::create(path).map_err(open_err)?;
    file.write_all(CACHE_MAGIC).map_err(open_err)?;
    file.write_all(&CACHE_VERSION.to_le_bytes()).map_err(open_err)?;
    file.write_all(&manifest_len.to_le_bytes()).map_err(open_err)?;
    file.write_all(&manifest_bytes).map_err(open_err)?;
    for body in &bodies {
        file.write_all(body).map_err(open_err)?;
    }
    file.flush().map_err(open_err)?;
    Ok(())
}

/// Read and validate the header and manifest of an already-opened cache
/// package file, leaving the cursor at the first body.
pub(crate) fn read_cache_manifest(file: &mut File) -> Result<CacheManifest, PackageError> {
    let truncated = |e: std::io::Error| PackageError::Malformed(format!("truncated header: {}", e));

    let mut magic = [0u8; 4];
    file.read_exact(&mut magic).map_err(truncated)?;
    if &magic != CACHE_MAGIC {
        return Err(PackageError::Malformed("bad magic bytes".to_string()));
    }

    let mut version = [0u8; 4];
    file.read_exact(&mut version).map_err(truncated)?;
    let version = u32::from_le_bytes(version);
    if version != CACHE_VERSION {
        return Err(PackageError::Malformed(format!(
            "unsupported cache version {}",
            version
        )));
    }

    let mut manifest_len = [0u8; 8];
    file.read_exact(&mut manifest_len).map_err(truncated)?;
    let manifest_len = u64::from_le_bytes(manifest_len);
    if manifest_len > MAX_MANIFEST_LEN {
        return Err(PackageError::Malformed(format!(
            "manifest length {} exceeds limit",
            manifest_len
        )));
    }

    let mut manifest_bytes = vec![0u8; manifest_len as usize];
    file.read_exact(&mut manifest_bytes)
        .map_err(|e| PackageError::Malformed(format!("truncated manifest: {}", e)))?;
    bincode::deserialize(&manifest_bytes)
        .map_err(|e| PackageError::Malformed(format!("manifest: {}", e)))
}
