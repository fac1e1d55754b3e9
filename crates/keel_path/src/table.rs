//! Sharded path interning table
//!
//! Maps a structural key (name, parent, instance index, package flag) to
//! its one canonical [`PathEntry`], allocating from the backing arena on
//! first sight. The table is partitioned into a prime number of buckets,
//! each behind its own reader/writer lock, so resolutions across
//! different buckets never contend.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::Hasher;

use keel_memory::BlockArena;
use parking_lot::RwLock;

use crate::name::Name;
use crate::parse::{parse_path, validate_name, PathSegment};
use crate::path::{ObjectPath, PathEntry};
use crate::PathError;

/// Number of hash table buckets (prime numbers are recommended).
pub const BUCKET_COUNT: usize = 37;

#[derive(Default)]
struct Bucket<'p> {
    entries: RwLock<Vec<&'p PathEntry<'p>>>,
}

/// Structural key for one entry.
struct EntryKey<'p> {
    name: Name<'p>,
    parent: Option<&'p PathEntry<'p>>,
    instance_index: Option<u32>,
    is_package: bool,
}

/// Interning table over a borrowed arena.
///
/// Entries are immutable once published and live until the arena is
/// dropped; once a resolution returns a reference for a key, every later
/// resolution of that key, from any thread, returns the identical
/// reference.
pub struct PathTable<'p> {
    arena: &'p BlockArena,
    buckets: Vec<Bucket<'p>>,
    names: RwLock<HashSet<&'p str>>,
}

impl<'p> PathTable<'p> {
    /// Create an empty table over the given arena
    pub fn new(arena: &'p BlockArena) -> Self {
        Self {
            arena,
            buckets: (0..BUCKET_COUNT).map(|_| Bucket::default()).collect(),
            names: RwLock::new(HashSet::new()),
        }
    }

    /// Resolve a full path string into its canonical entry chain.
    pub fn set(&self, path: &str) -> Result<ObjectPath<'p>, PathError> {
        let segments = parse_path(path)?;
        self.resolve(None, &segments)
    }

    /// Resolve a sub-path string underneath an existing path.
    pub fn join(&self, root: ObjectPath<'p>, sub: &str) -> Result<ObjectPath<'p>, PathError> {
        let segments = parse_path(sub)?;
        if !root.is_empty() && !root.is_package() && segments.iter().any(|s| s.is_package) {
            return Err(PathError::PackageBelowObject);
        }
        self.resolve(root.entry(), &segments)
    }

    /// Resolve a single child segment underneath an existing path.
    pub fn child(
        &self,
        parent: ObjectPath<'p>,
        name: &str,
        is_package: bool,
        instance_index: Option<u32>,
    ) -> Result<ObjectPath<'p>, PathError> {
        validate_name(name)?;
        if is_package && !parent.is_empty() && !parent.is_package() {
            return Err(PathError::PackageBelowObject);
        }
        let name = self.intern_name(name)?;
        let entry = self.intern(EntryKey {
            name,
            parent: parent.entry(),
            instance_index,
            is_package,
        })?;
        Ok(ObjectPath::from_entry(Some(entry)))
    }

    /// Intern a string as a name token
    pub fn intern_name(&self, text: &str) -> Result<Name<'p>, PathError> {
        if let Some(&interned) = self.names.read().get(text) {
            return Ok(Name(interned));
        }
        let mut names = self.names.write();
        if let Some(&interned) = names.get(text) {
            return Ok(Name(interned));
        }
        let copy = self.arena.alloc_str(text).ok_or(PathError::ArenaExhausted)?;
        names.insert(copy);
        Ok(Name(copy))
    }

    /// Total number of interned entries
    pub fn len(&self) -> usize {
        self.buckets.iter().map(|b| b.entries.read().len()).sum()
    }

    /// Whether no entries have been interned yet
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn resolve(
        &self,
        parent: Option<&'p PathEntry<'p>>,
        segments: &[PathSegment<'_>],
    ) -> Result<ObjectPath<'p>, PathError> {
        let mut parent = parent;
        for segment in segments {
            let name = self.intern_name(segment.name)?;
            let entry = self.intern(EntryKey {
                name,
                parent,
                instance_index: segment.instance_index,
                is_package: segment.is_package,
            })?;
            parent = Some(entry);
        }
        Ok(ObjectPath::from_entry(parent))
    }

    fn intern(&self, key: EntryKey<'p>) -> Result<&'p PathEntry<'p>, PathError> {
        let hash = hash_key(&key);
        let bucket = &self.buckets[(hash % BUCKET_COUNT as u64) as usize];

        // Read probe with full key comparison, not just hash.
        let scanned = {
            let entries = bucket.entries.read();
            if let Some(&found) = entries.iter().find(|e| key_matches(&key, e)) {
                return Ok(found);
            }
            entries.len()
        };

        // Entries are append-only, so after upgrading the lock only the
        // appended tail needs to be re-checked.
        let mut entries = bucket.entries.write();
        if let Some(&found) = entries[scanned..].iter().find(|e| key_matches(&key, e)) {
            return Ok(found);
        }

        let entry = self
            .arena
            .alloc(PathEntry {
                name: key.name,
                parent: key.parent,
                instance_index: key.instance_index,
                is_package: key.is_package,
            })
            .ok_or(PathError::ArenaExhausted)?;
        entries.push(entry);
        Ok(entry)
    }
}

fn key_matches<'p>(key: &EntryKey<'p>, entry: &PathEntry<'p>) -> bool {
    entry.name == key.name
        && entry.instance_index == key.instance_index
        && entry.is_package == key.is_package
        && match (entry.parent, key.parent) {
            (None, None) => true,
            (Some(a), Some(b)) => core::ptr::eq(a, b),
            _ => false,
        }
}

/// Hash the canonical rendering of a key (never raw pointers), so the
/// same logical path always lands in the same bucket.
fn hash_key(key: &EntryKey<'_>) -> u64 {
    let mut hasher = DefaultHasher::new();
    if let Some(parent) = key.parent {
        hash_chain(&mut hasher, parent);
    }
    hash_segment(&mut hasher, key.name.as_str(), key.instance_index, key.is_package);
    hasher.finish()
}

fn hash_chain(hasher: &mut DefaultHasher, entry: &PathEntry<'_>) {
    if let Some(parent) = entry.parent {
        hash_chain(hasher, parent);
    }
    hash_segment(hasher, entry.name.as_str(), entry.instance_index, entry.is_package);
}

fn hash_segment(hasher: &mut DefaultHasher, name: &str, instance_index: Option<u32>, is_package: bool) {
    hasher.write_u8(if is_package { b'/' } else { b':' });
    hasher.write(name.as_bytes());
    if let Some(index) = instance_index {
        hasher.write_u8(b'*');
        hasher.write_u32(index);
    }
}
