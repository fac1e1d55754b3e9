//! # keel_memory - Arena Allocation
//!
//! Block-chained bump allocation for data that lives as long as its
//! owning subsystem:
//! - O(1) allocation with no per-object bookkeeping
//! - Stable addresses (blocks never move or shrink)
//! - No individual deallocation - the whole arena is released on drop

pub mod arena;

pub use arena::BlockArena;

/// Align a value up to the given alignment
#[inline]
pub const fn align_up(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    (value + align - 1) & !(align - 1)
}

/// Align a value down to the given alignment
#[inline]
pub const fn align_down(value: usize, align: usize) -> usize {
    debug_assert!(align.is_power_of_two());
    value & !(align - 1)
}

/// Check if a pointer is aligned
#[inline]
pub fn is_aligned(ptr: *const u8, align: usize) -> bool {
    (ptr as usize) & (align - 1) == 0
}
