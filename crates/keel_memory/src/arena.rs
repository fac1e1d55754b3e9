//! Block-chained bump arena
//!
//! Allocations are served linearly from fixed-size blocks; a fresh block
//! is opened when the current one is exhausted, up to a fixed block
//! budget. Individual deallocations are not supported - everything is
//! released together when the arena is dropped.

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ptr::NonNull;

use parking_lot::Mutex;

use crate::align_up;

/// Default block size (16 KiB)
pub const DEFAULT_BLOCK_SIZE: usize = 16 * 1024;
/// Default block budget
pub const DEFAULT_BLOCK_LIMIT: usize = 4096;

/// Alignment of block base addresses
const BLOCK_ALIGN: usize = 16;

/// Bump arena over a chain of fixed-size blocks.
///
/// Addresses handed out are stable for the lifetime of the arena: block
/// buffers are raw heap allocations that never move once opened.
/// Returned references borrow the arena, so nothing can outlive it.
pub struct BlockArena {
    state: Mutex<BlockChain>,
    block_size: usize,
    block_limit: usize,
}

struct BlockChain {
    /// Opened blocks. Only the last block is bump-allocated from.
    blocks: Vec<NonNull<u8>>,
    /// Allocation offset into the last block.
    offset: usize,
}

// Safety: the block list is only mutated under the mutex, blocks are raw
// allocations (no reference-derived pointers to invalidate), and each
// handed-out region is written exactly once before the caller receives a
// shared reference to it.
unsafe impl Send for BlockArena {}
unsafe impl Sync for BlockArena {}

impl BlockArena {
    /// Create an arena with the given block size and block budget
    pub fn new(block_size: usize, block_limit: usize) -> Self {
        assert!(block_size > 0 && block_limit > 0);
        assert!(Layout::from_size_align(block_size, BLOCK_ALIGN).is_ok());
        Self {
            state: Mutex::new(BlockChain {
                blocks: Vec::new(),
                offset: 0,
            }),
            block_size,
            block_limit,
        }
    }

    /// Create an arena with the given block size in KB
    pub fn with_block_size_kb(kb: usize, block_limit: usize) -> Self {
        Self::new(kb * 1024, block_limit)
    }

    /// Allocate raw memory with the given size and alignment.
    ///
    /// Returns `None` when the request cannot fit in a single block or
    /// when the block budget is exhausted.
    pub fn allocate(&self, size: usize, align: usize) -> Option<*mut u8> {
        if size == 0 {
            return Some(align as *mut u8); // Non-null aligned dangling pointer
        }
        if size > self.block_size {
            return None;
        }

        let mut chain = self.state.lock();
        loop {
            if let Some(&block) = chain.blocks.last() {
                let base = block.as_ptr() as usize;
                let aligned = align_up(base + chain.offset, align) - base;
                if aligned + size <= self.block_size {
                    chain.offset = aligned + size;
                    // Safety: aligned + size fits inside this block.
                    return Some(unsafe { block.as_ptr().add(aligned) });
                }
            }

            // Current block exhausted (or no block yet); open a new one.
            if chain.blocks.len() >= self.block_limit {
                return None;
            }
            // Safety: block_size is non-zero and the layout is valid.
            let ptr = unsafe { alloc_zeroed(self.block_layout()) };
            chain.blocks.push(NonNull::new(ptr)?);
            chain.offset = 0;
        }
    }

    fn block_layout(&self) -> Layout {
        // Checked in `new`.
        debug_assert!(Layout::from_size_align(self.block_size, BLOCK_ALIGN).is_ok());
        unsafe { Layout::from_size_align_unchecked(self.block_size, BLOCK_ALIGN) }
    }

    /// Allocate a single value, returning a reference stable until drop
    pub fn alloc<T: Copy>(&self, value: T) -> Option<&T> {
        let ptr = self.allocate(core::mem::size_of::<T>(), core::mem::align_of::<T>())? as *mut T;
        unsafe {
            ptr.write(value);
            Some(&*ptr)
        }
    }

    /// Copy a string into the arena
    pub fn alloc_str(&self, s: &str) -> Option<&str> {
        if s.is_empty() {
            return Some("");
        }
        let ptr = self.allocate(s.len(), 1)?;
        unsafe {
            core::ptr::copy_nonoverlapping(s.as_ptr(), ptr, s.len());
            let bytes = core::slice::from_raw_parts(ptr, s.len());
            Some(core::str::from_utf8_unchecked(bytes))
        }
    }

    /// Total capacity of the block budget in bytes
    pub fn capacity(&self) -> usize {
        self.block_size * self.block_limit
    }

    /// Bytes consumed so far (including padding and open-block slack)
    pub fn used(&self) -> usize {
        let chain = self.state.lock();
        match chain.blocks.len() {
            0 => 0,
            n => (n - 1) * self.block_size + chain.offset,
        }
    }

    /// Number of blocks opened so far
    pub fn block_count(&self) -> usize {
        self.state.lock().blocks.len()
    }

    /// Configured block size in bytes
    pub fn block_size(&self) -> usize {
        self.block_size
    }
}

impl Default for BlockArena {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_SIZE, DEFAULT_BLOCK_LIMIT)
    }
}

impl Drop for BlockArena {
    fn drop(&mut self) {
        let layout = self.block_layout();
        for block in self.state.get_mut().blocks.drain(..) {
            // Safety: every block was allocated with this exact layout
            // and is freed exactly once.
            unsafe { dealloc(block.as_ptr(), layout) };
        }
    }
}
