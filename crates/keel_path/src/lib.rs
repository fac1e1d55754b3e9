//! # keel_path - Interned Object Paths
//!
//! Hierarchical object identifiers for the engine object system:
//! - One canonical, arena-owned entry per unique path; handles compare
//!   and hash in O(1) by entry identity
//! - Sharded registry safe under concurrent resolution from worker
//!   threads
//! - Two textual forms: the canonical `Art/Characters:Hero*2` rendering
//!   and a filesystem-safe rendering for cache placement
//!
//! The registry is an explicit context: the host creates a
//! [`keel_memory::BlockArena`] and a [`PathTable`] over it and threads
//! them through whatever needs path resolution. Dropping the pair is the
//! shutdown point; the borrow checker guarantees no [`ObjectPath`]
//! survives it. A process-lifetime registry is obtained by leaking the
//! pair.
//!
//! ```
//! use keel_memory::BlockArena;
//! use keel_path::PathTable;
//!
//! let arena = BlockArena::default();
//! let table = PathTable::new(&arena);
//!
//! let hero = table.set("Art/Characters:Hero*2").unwrap();
//! assert_eq!(hero.to_string(), "Art/Characters:Hero*2");
//! assert_eq!(hero, table.set("Art/Characters:Hero*2").unwrap());
//! ```

use thiserror::Error;

pub mod name;
pub mod parse;
pub mod path;
pub mod table;

pub use name::Name;
pub use parse::{parse_path, PathSegment};
pub use path::ObjectPath;
pub use table::{PathTable, BUCKET_COUNT};

/// Package delimiter character.
pub const PACKAGE_DELIMITER: char = '/';
/// Object delimiter character.
pub const OBJECT_DELIMITER: char = ':';
/// Object instance index delimiter character.
pub const INSTANCE_DELIMITER: char = '*';
/// Separator used in the file-path rendering.
pub const FILE_PATH_SEPARATOR: char = '/';
/// Instance index marker used in the file-path rendering.
pub const FILE_INSTANCE_MARK: char = '!';

/// Errors from path parsing and interning
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("empty path string")]
    Empty,

    #[error("empty path segment at byte {0}")]
    EmptySegment(usize),

    #[error("package delimiter after object delimiter at byte {0}")]
    PackageAfterObject(usize),

    #[error("instance index on non-final segment at byte {0}")]
    InstanceNotLast(usize),

    #[error("malformed instance index: {0:?}")]
    InvalidInstanceIndex(String),

    #[error("invalid character {1:?} in name {0:?}")]
    InvalidName(String, char),

    #[error("package segment below an object segment")]
    PackageBelowObject,

    #[error("path arena exhausted")]
    ArenaExhausted,
}
