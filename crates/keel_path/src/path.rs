//! Object path handles
//!
//! An [`ObjectPath`] is a cheap `Copy` handle over a canonical
//! [`PathEntry`] published by the [`crate::PathTable`]. Equality and
//! hashing are entry identity, so two paths compare equal iff they
//! resolved to the same canonical entry.

use core::fmt::{self, Write as _};
use core::hash::{Hash, Hasher};

use crate::name::Name;
use crate::{FILE_INSTANCE_MARK, FILE_PATH_SEPARATOR, INSTANCE_DELIMITER, OBJECT_DELIMITER, PACKAGE_DELIMITER};

/// Canonical path entry, owned by the table's arena.
///
/// Immutable once published; parents are always interned strictly before
/// their children, so chains are acyclic.
#[derive(Clone, Copy)]
pub struct PathEntry<'p> {
    pub(crate) name: Name<'p>,
    pub(crate) parent: Option<&'p PathEntry<'p>>,
    pub(crate) instance_index: Option<u32>,
    pub(crate) is_package: bool,
}

/// Interned hierarchical object path.
///
/// Wraps a reference to a canonical entry, or nothing for the empty
/// path. All accessors are pure reads of the referenced entry.
#[derive(Clone, Copy, Default)]
pub struct ObjectPath<'p> {
    entry: Option<&'p PathEntry<'p>>,
}

impl<'p> ObjectPath<'p> {
    /// The empty path
    pub fn empty() -> Self {
        Self { entry: None }
    }

    pub(crate) fn from_entry(entry: Option<&'p PathEntry<'p>>) -> Self {
        Self { entry }
    }

    pub(crate) fn entry(&self) -> Option<&'p PathEntry<'p>> {
        self.entry
    }

    /// Whether this is the empty path
    pub fn is_empty(&self) -> bool {
        self.entry.is_none()
    }

    /// Name of the final segment
    pub fn name(&self) -> Option<Name<'p>> {
        self.entry.map(|e| e.name)
    }

    /// Instance index of the final segment
    pub fn instance_index(&self) -> Option<u32> {
        self.entry.and_then(|e| e.instance_index)
    }

    /// Whether the final segment is a package (false for the empty path)
    pub fn is_package(&self) -> bool {
        self.entry.map(|e| e.is_package).unwrap_or(false)
    }

    /// Path of the enclosing segment (empty for roots and the empty path)
    pub fn parent(&self) -> ObjectPath<'p> {
        ObjectPath {
            entry: self.entry.and_then(|e| e.parent),
        }
    }

    /// Render the filesystem form used for cache placement.
    ///
    /// Segments are joined with `/` and an instance index is rendered as
    /// `!index`. Names cannot contain either character, so the rendering
    /// is deterministic and collision-free across object paths.
    pub fn to_file_path_string(&self) -> String {
        let mut out = String::new();
        if let Some(entry) = self.entry {
            push_file_path(entry, &mut out);
        }
        out
    }
}

fn push_file_path(entry: &PathEntry<'_>, out: &mut String) {
    if let Some(parent) = entry.parent {
        push_file_path(parent, out);
        out.push(FILE_PATH_SEPARATOR);
    }
    out.push_str(entry.name.as_str());
    if let Some(index) = entry.instance_index {
        out.push(FILE_INSTANCE_MARK);
        let _ = write!(out, "{}", index);
    }
}

fn fmt_entry(entry: &PathEntry<'_>, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if let Some(parent) = entry.parent {
        fmt_entry(parent, f)?;
        f.write_char(if entry.is_package {
            PACKAGE_DELIMITER
        } else {
            OBJECT_DELIMITER
        })?;
    }
    f.write_str(entry.name.as_str())?;
    if let Some(index) = entry.instance_index {
        write!(f, "{}{}", INSTANCE_DELIMITER, index)?;
    }
    Ok(())
}

impl fmt::Display for ObjectPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.entry {
            Some(entry) => fmt_entry(entry, f),
            None => Ok(()),
        }
    }
}

impl fmt::Debug for ObjectPath<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectPath({})", self)
    }
}

impl PartialEq for ObjectPath<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self.entry, other.entry) {
            (Some(a), Some(b)) => core::ptr::eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }
}

impl Eq for ObjectPath<'_> {}

impl Hash for ObjectPath<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let addr = self
            .entry
            .map(|e| e as *const PathEntry<'_> as usize)
            .unwrap_or(0);
        state.write_usize(addr);
    }
}

#[cfg(test)]
mod tests {
    use crate::table::PathTable;
    use keel_memory::BlockArena;

    #[test]
    fn test_scenario_rendering_and_accessors() {
        let arena = BlockArena::default();
        let table = PathTable::new(&arena);

        let hero = table.set("Art/Characters:Hero*2").unwrap();
        assert_eq!(hero.to_string(), "Art/Characters:Hero*2");
        assert_eq!(hero.name().unwrap().as_str(), "Hero");
        assert_eq!(hero.instance_index(), Some(2));
        assert!(!hero.is_package());

        let chars = hero.parent();
        assert_eq!(chars.to_string(), "Art/Characters");
        assert!(chars.is_package());
        assert_eq!(chars.parent().to_string(), "Art");
        assert!(chars.parent().parent().is_empty());
    }

    #[test]
    fn test_round_trip_normalized() {
        let arena = BlockArena::default();
        let table = PathTable::new(&arena);

        for s in ["Art", "Art/Chars:Hero", "A/B/C:D:E", "Pkg:Obj*0"] {
            let path = table.set(s).unwrap();
            assert_eq!(path.to_string(), s);
        }

        // Leading zeros normalize away.
        let path = table.set("Pkg:Obj*007").unwrap();
        assert_eq!(path.to_string(), "Pkg:Obj*7");
        assert_eq!(path, table.set("Pkg:Obj*7").unwrap());
    }

    #[test]
    fn test_file_path_rendering() {
        let arena = BlockArena::default();
        let table = PathTable::new(&arena);

        let hero = table.set("Art/Characters:Hero*2").unwrap();
        assert_eq!(hero.to_file_path_string(), "Art/Characters/Hero!2");
        // Pure function of the canonical entry chain.
        assert_eq!(hero.to_file_path_string(), hero.to_file_path_string());

        let plain = table.set("Art/Characters:Hero").unwrap();
        assert_eq!(plain.to_file_path_string(), "Art/Characters/Hero");
    }

    #[test]
    fn test_identity_equality_and_hash() {
        use std::collections::HashSet;

        let arena = BlockArena::default();
        let table = PathTable::new(&arena);

        let a = table.set("Foo/Bar:Baz").unwrap();
        let b = table.set("Foo/Bar:Baz").unwrap();
        let c = table.set("Foo/Bar:Qux").unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);

        let mut set = HashSet::new();
        set.insert(a);
        set.insert(b);
        set.insert(c);
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_empty_path() {
        use crate::ObjectPath;

        let empty = ObjectPath::empty();
        assert!(empty.is_empty());
        assert!(empty.name().is_none());
        assert!(!empty.is_package());
        assert_eq!(empty.to_string(), "");
        assert_eq!(empty, ObjectPath::default());
    }

    #[test]
    fn test_instance_index_distinguishes_entries() {
        let arena = BlockArena::default();
        let table = PathTable::new(&arena);

        let a = table.set("Pkg:Obj").unwrap();
        let b = table.set("Pkg:Obj*1").unwrap();
        let c = table.set("Pkg:Obj*2").unwrap();
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_eq!(b.instance_index(), Some(1));
    }
}
