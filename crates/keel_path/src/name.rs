//! Interned name tokens
//!
//! A [`Name`] is a short string interned through a [`crate::PathTable`];
//! within one table, equal strings always yield the same token, so
//! comparison and hashing reduce to pointer identity.

use core::fmt;
use core::hash::{Hash, Hasher};

/// Interned string token.
///
/// Cheap to copy and O(1) to compare. Tokens from different tables never
/// compare equal even when their text matches.
#[derive(Clone, Copy)]
pub struct Name<'p>(pub(crate) &'p str);

impl<'p> Name<'p> {
    /// The interned text
    pub fn as_str(&self) -> &'p str {
        self.0
    }

    /// Length of the interned text in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the interned text is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl PartialEq for Name<'_> {
    fn eq(&self, other: &Self) -> bool {
        // Interned: one canonical copy per table, so identity is equality.
        self.0.as_ptr() == other.0.as_ptr() && self.0.len() == other.0.len()
    }
}

impl Eq for Name<'_> {}

impl Hash for Name<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_usize(self.0.as_ptr() as usize);
    }
}

impl fmt::Display for Name<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

impl fmt::Debug for Name<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({:?})", self.0)
    }
}
