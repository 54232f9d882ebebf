//! # Buddy Allocator
//!
//! Power-of-two block allocator over one fixed arena, with eager coalescing.
//!
//! ## Tree Layout
//!
//! ```text
//! level 0   [                 0                 ]   whole arena
//! level 1   [        1        |        2        ]
//! level 2   [   3    |   4    |   5    |   6    ]
//!  ...
//! index(level, position) = 2^level - 1 + position
//! ```
//!
//! Every level keeps a doubly linked free list whose links live in the first
//! bytes of the free blocks themselves. A flat bitset marks which tree nodes
//! are currently in a free list. Requests are rounded up to the next power of
//! two, so internal fragmentation stays just under 50% per allocation.
//!
//! The allocator does not remember allocation sizes: `free` must be called
//! with the size passed to the matching `alloc`.

use std::mem;

use bytemuck::{Pod, Zeroable};

use crate::bitmap::BlockBitmap;
use crate::error::{AllocError, AllocResult};
use crate::usage::{MemoryUsage, UsageReport};

/// Default arena exponent: 16 MiB.
pub const DEFAULT_MAX_LEVEL_EXP: u32 = 24;

/// Default minimum block exponent: 512 bytes.
pub const DEFAULT_MIN_LEVEL_EXP: u32 = 9;

/// Largest arena exponent; offsets are stored as `u32` links.
const MAX_ARENA_EXP: u32 = 31;

/// Deepest tree supported; bounds the bitset at 2^24 - 1 bits.
const MAX_LEVELS: u32 = 24;

/// "No block" link value.
const NIL: u32 = u32::MAX;

/// Free-list links stored inside a free block.
#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct FreeNode {
    prev: u32,
    next: u32,
}

const NODE_SIZE: usize = mem::size_of::<FreeNode>();

/// Free-list link for an arena offset. Arenas are at most 2^31 bytes, so
/// every offset fits.
#[inline]
#[allow(clippy::cast_possible_truncation)]
const fn to_link(offset: usize) -> u32 {
    offset as u32
}

/// Flat index of the `position`-th block (left to right) at `level`.
#[inline]
#[must_use]
pub const fn block_index(level: usize, position: usize) -> usize {
    (1 << level) - 1 + position
}

/// Position of the sibling produced by the same split.
#[inline]
#[must_use]
pub const fn buddy_position(position: usize) -> usize {
    position ^ 1
}

/// Arena geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuddyConfig {
    /// Arena is `2^max_level_exp` bytes.
    pub max_level_exp: u32,
    /// Smallest block is `2^min_level_exp` bytes.
    pub min_level_exp: u32,
}

impl Default for BuddyConfig {
    fn default() -> Self {
        Self {
            max_level_exp: DEFAULT_MAX_LEVEL_EXP,
            min_level_exp: DEFAULT_MIN_LEVEL_EXP,
        }
    }
}

impl BuddyConfig {
    /// Checks that the exponents describe a supported tree.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] describing the first violated
    /// bound.
    pub fn validate(&self) -> AllocResult<()> {
        let min_exp = NODE_SIZE.trailing_zeros();
        if self.min_level_exp < min_exp {
            return Err(AllocError::InvalidConfig(format!(
                "min_level_exp {} is below {min_exp}; blocks must hold a free-list node",
                self.min_level_exp
            )));
        }
        if self.max_level_exp > MAX_ARENA_EXP {
            return Err(AllocError::InvalidConfig(format!(
                "max_level_exp {} exceeds {MAX_ARENA_EXP}",
                self.max_level_exp
            )));
        }
        if self.min_level_exp > self.max_level_exp {
            return Err(AllocError::InvalidConfig(format!(
                "min_level_exp {} exceeds max_level_exp {}",
                self.min_level_exp, self.max_level_exp
            )));
        }
        if self.max_level_exp - self.min_level_exp + 1 > MAX_LEVELS {
            return Err(AllocError::InvalidConfig(format!(
                "{} levels requested, at most {MAX_LEVELS} supported",
                self.max_level_exp - self.min_level_exp + 1
            )));
        }
        Ok(())
    }

    /// Number of levels in the tree.
    #[inline]
    #[must_use]
    pub const fn levels(&self) -> usize {
        (self.max_level_exp - self.min_level_exp + 1) as usize
    }

    /// Arena size in bytes.
    #[inline]
    #[must_use]
    pub const fn arena_size(&self) -> usize {
        1 << self.max_level_exp
    }

    /// Smallest block size in bytes.
    #[inline]
    #[must_use]
    pub const fn min_block_size(&self) -> usize {
        1 << self.min_level_exp
    }

    /// Block size at `level`.
    #[inline]
    #[must_use]
    pub const fn level_size(&self, level: usize) -> usize {
        self.arena_size() >> level
    }

    /// Level serving a request of `size` bytes, or `None` if it exceeds the
    /// arena.
    ///
    /// Sizes are rounded up to the next power of two and to at least the
    /// minimum block; bigger blocks map to smaller levels.
    #[must_use]
    pub fn level_for_size(&self, size: usize) -> Option<usize> {
        let rounded = size.max(self.min_block_size()).checked_next_power_of_two()?;
        if rounded > self.arena_size() {
            return None;
        }
        Some((self.max_level_exp - rounded.trailing_zeros()) as usize)
    }

    /// Number of nodes in the tree.
    const fn node_count(self) -> usize {
        (1 << self.levels()) - 1
    }
}

/// A block handed out by [`BuddyAllocator::alloc`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BuddyBlock {
    /// Byte offset from the arena start.
    offset: usize,
    /// Size of the block's class (power of two).
    size: usize,
}

impl BuddyBlock {
    /// Byte offset from the arena start.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> usize {
        self.offset
    }

    /// Size of the block in bytes (the request rounded up).
    #[inline]
    #[must_use]
    pub const fn size(&self) -> usize {
        self.size
    }
}

/// A binary buddy allocator.
///
/// # Thread Safety
///
/// NOT thread-safe. Use one allocator per thread.
///
/// # Example
///
/// ```rust
/// use strata_alloc::{BuddyAllocator, BuddyConfig};
///
/// let mut buddy = BuddyAllocator::new(BuddyConfig { max_level_exp: 16, min_level_exp: 9 })?;
///
/// let block = buddy.alloc(600)?;
/// assert_eq!(block.size(), 1024);
///
/// buddy.free(block.offset(), 600)?;
/// assert_eq!(buddy.unused_bytes(), 65_536);
/// # Ok::<(), strata_alloc::AllocError>(())
/// ```
pub struct BuddyAllocator {
    /// The arena. Free blocks carry a `FreeNode` in their first bytes.
    arena: Box<[u8]>,
    /// Tree geometry.
    config: BuddyConfig,
    /// Head of each level's free list.
    first_free: Vec<u32>,
    /// Free bit per tree node.
    free_blocks: BlockBitmap,
    /// Bytes in outstanding blocks (class sizes, not request sizes).
    used_bytes: usize,
    /// Number of outstanding blocks.
    live_blocks: usize,
}

impl BuddyAllocator {
    /// Creates an allocator whose arena is one free top-level block.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidConfig`] if the exponents are out of
    /// range.
    pub fn new(config: BuddyConfig) -> AllocResult<Self> {
        config.validate()?;

        let mut allocator = Self {
            arena: vec![0u8; config.arena_size()].into_boxed_slice(),
            config,
            first_free: vec![NIL; config.levels()],
            free_blocks: BlockBitmap::new(config.node_count()),
            used_bytes: 0,
            live_blocks: 0,
        };
        allocator.reset();

        tracing::debug!(
            arena_bytes = config.arena_size(),
            min_block = config.min_block_size(),
            levels = config.levels(),
            "buddy allocator created"
        );
        Ok(allocator)
    }

    /// Allocates a block of at least `size` bytes.
    ///
    /// # Errors
    ///
    /// - [`AllocError::RequestTooLarge`] if `size` exceeds the arena.
    /// - [`AllocError::Exhausted`] if no block of the class can be produced.
    pub fn alloc(&mut self, size: usize) -> AllocResult<BuddyBlock> {
        let level = self
            .config
            .level_for_size(size)
            .ok_or(AllocError::RequestTooLarge {
                requested: size,
                max: self.config.arena_size(),
            })?;

        let offset = self
            .take_block(level)?
            .ok_or(AllocError::Exhausted { requested: size })?;

        let block_size = self.config.level_size(level);
        self.used_bytes += block_size;
        self.live_blocks += 1;

        Ok(BuddyBlock {
            offset,
            size: block_size,
        })
    }

    /// Returns the block at `offset` to the allocator and merges it with its
    /// buddy as far up the tree as possible.
    ///
    /// `size` must be the size passed to the matching [`BuddyAllocator::alloc`].
    /// A mismatched size corrupts the bookkeeping and is not detected.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidFree`] if the offset lies outside the
    /// arena, is not aligned to the size class, or the block is already in a
    /// free list. These checks are cheap and do not catch every misuse.
    /// Returns [`AllocError::Corrupted`] if a free-list link read while
    /// merging points outside the arena.
    pub fn free(&mut self, offset: usize, size: usize) -> AllocResult<()> {
        let level = self
            .config
            .level_for_size(size)
            .ok_or(AllocError::InvalidFree { offset })?;
        let block_size = self.config.level_size(level);

        if offset >= self.arena.len() || offset % block_size != 0 {
            return Err(AllocError::InvalidFree { offset });
        }
        if self.free_blocks.get(self.index_of(offset, level)) {
            return Err(AllocError::InvalidFree { offset });
        }

        self.push_free(level, offset)?;
        self.free_blocks.set(self.index_of(offset, level));
        self.used_bytes = self.used_bytes.saturating_sub(block_size);
        self.live_blocks = self.live_blocks.saturating_sub(1);

        self.coalesce(offset, level)
    }

    /// Frees a block using the size recorded in it.
    ///
    /// # Errors
    ///
    /// Same as [`BuddyAllocator::free`].
    #[inline]
    pub fn release(&mut self, block: BuddyBlock) -> AllocResult<()> {
        self.free(block.offset, block.size)
    }

    /// Drops every outstanding block and returns to a single free arena.
    pub fn reset(&mut self) {
        self.first_free.fill(NIL);
        self.free_blocks.clear_all();

        // Only the root starts free; every other node is unavailable until a
        // split produces it.
        self.first_free[0] = 0;
        self.write_node(0, FreeNode { prev: NIL, next: NIL });
        self.free_blocks.set(block_index(0, 0));

        self.used_bytes = 0;
        self.live_blocks = 0;
    }

    /// Arena bytes not covered by an outstanding block.
    #[inline]
    #[must_use]
    pub fn unused_bytes(&self) -> usize {
        self.arena.len() - self.used_bytes
    }

    /// Bytes in outstanding blocks.
    #[inline]
    #[must_use]
    pub const fn used_bytes(&self) -> usize {
        self.used_bytes
    }

    /// Number of outstanding blocks.
    #[inline]
    #[must_use]
    pub const fn live_blocks(&self) -> usize {
        self.live_blocks
    }

    /// Tree geometry.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> BuddyConfig {
        self.config
    }

    /// Number of blocks in `level`'s free list.
    #[must_use]
    pub fn free_blocks_at(&self, level: usize) -> usize {
        self.free_list(level).count()
    }

    /// Sum of all free-list block sizes.
    #[must_use]
    pub fn free_list_bytes(&self) -> usize {
        (0..self.config.levels())
            .map(|level| self.free_blocks_at(level) * self.config.level_size(level))
            .sum()
    }

    /// Data of an outstanding block, `None` once the block is back in a
    /// free list.
    #[must_use]
    pub fn block(&self, block: &BuddyBlock) -> Option<&[u8]> {
        let range = self.live_range(block)?;
        self.arena.get(range)
    }

    /// Mutable data of an outstanding block, `None` once the block is back
    /// in a free list. Free blocks hold the list links.
    pub fn block_mut(&mut self, block: &BuddyBlock) -> Option<&mut [u8]> {
        let range = self.live_range(block)?;
        self.arena.get_mut(range)
    }

    /// Byte range of `block` if it is in bounds and not marked free.
    fn live_range(&self, block: &BuddyBlock) -> Option<std::ops::Range<usize>> {
        let level = self.config.level_for_size(block.size)?;
        let end = block.offset.checked_add(block.size)?;
        if end > self.arena.len() || self.free_blocks.get(self.index_of(block.offset, level)) {
            return None;
        }
        Some(block.offset..end)
    }

    /// Verifies that the bitset and the free lists agree: every listed block
    /// is aligned, in range and marked free, the back links match, and no
    /// other node is marked free.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::Corrupted`] describing the first disagreement.
    pub fn check_consistency(&self) -> AllocResult<()> {
        let mut listed = 0;
        for level in 0..self.config.levels() {
            let block_size = self.config.level_size(level);
            let limit = 1usize << level;
            let mut prev = NIL;
            let mut cursor = self.first_free[level];
            let mut count = 0;

            while cursor != NIL {
                let offset = cursor as usize;
                if offset >= self.arena.len() || offset % block_size != 0 {
                    return Err(AllocError::Corrupted(format!(
                        "level {level}: listed offset {offset} is not a block start"
                    )));
                }
                if !self.free_blocks.get(self.index_of(offset, level)) {
                    return Err(AllocError::Corrupted(format!(
                        "level {level}: listed block {offset} is not marked free"
                    )));
                }
                let node = self.read_node(offset)?;
                if node.prev != prev {
                    return Err(AllocError::Corrupted(format!(
                        "level {level}: block {offset} has a broken back link"
                    )));
                }
                count += 1;
                if count > limit {
                    return Err(AllocError::Corrupted(format!(
                        "level {level}: free list longer than the level"
                    )));
                }
                prev = cursor;
                cursor = node.next;
            }
            listed += count;
        }

        if listed != self.free_blocks.count_set() {
            return Err(AllocError::Corrupted(format!(
                "{} nodes marked free but {listed} listed",
                self.free_blocks.count_set()
            )));
        }
        Ok(())
    }

    /// Pops or splits until a block is available at `level`. The returned
    /// block is marked used. `Ok(None)` means the arena is exhausted.
    fn take_block(&mut self, level: usize) -> AllocResult<Option<usize>> {
        if let Some(offset) = self.pop_free(level)? {
            self.free_blocks.clear(self.index_of(offset, level));
            return Ok(Some(offset));
        }
        if level == 0 {
            return Ok(None);
        }

        // First half goes back up (or to the caller), second half is listed.
        let Some(first) = self.take_block(level - 1)? else {
            return Ok(None);
        };
        let second = first + self.config.level_size(level);
        self.push_free(level, second)?;
        self.free_blocks.set(self.index_of(second, level));

        tracing::trace!(level, first, second, "split block");
        Ok(Some(first))
    }

    /// Merges the free block at `offset` with its buddy while both are free.
    fn coalesce(&mut self, mut offset: usize, mut level: usize) -> AllocResult<()> {
        while level > 0 {
            let block_size = self.config.level_size(level);
            let position = offset / block_size;
            let buddy_pos = buddy_position(position);
            if !self.free_blocks.get(block_index(level, buddy_pos)) {
                break;
            }

            let buddy = buddy_pos * block_size;
            self.unlink(level, offset)?;
            self.unlink(level, buddy)?;
            self.free_blocks.clear(block_index(level, position));
            self.free_blocks.clear(block_index(level, buddy_pos));

            offset = offset.min(buddy);
            level -= 1;
            self.push_free(level, offset)?;
            self.free_blocks.set(self.index_of(offset, level));

            tracing::trace!(level, offset, "merged buddies");
        }
        Ok(())
    }

    #[inline]
    fn index_of(&self, offset: usize, level: usize) -> usize {
        block_index(level, offset / self.config.level_size(level))
    }

    fn free_list(&self, level: usize) -> impl Iterator<Item = usize> + '_ {
        let mut cursor = self.first_free[level];
        std::iter::from_fn(move || {
            if cursor == NIL {
                return None;
            }
            let offset = cursor as usize;
            cursor = self.read_node(offset).map_or(NIL, |node| node.next);
            Some(offset)
        })
        .take(1 << level)
    }

    fn pop_free(&mut self, level: usize) -> AllocResult<Option<usize>> {
        let head = self.first_free[level];
        if head == NIL {
            return Ok(None);
        }
        let offset = head as usize;
        let next = self.read_node(offset)?.next;
        if next != NIL {
            let block_size = self.config.level_size(level);
            if next as usize >= self.arena.len() || next as usize % block_size != 0 {
                return Err(AllocError::Corrupted(format!(
                    "level {level}: block {offset} links to {next}, not a block start"
                )));
            }
            self.set_prev(next as usize, NIL)?;
        }
        self.first_free[level] = next;
        Ok(Some(offset))
    }

    fn push_free(&mut self, level: usize, offset: usize) -> AllocResult<()> {
        let old_head = self.first_free[level];
        let link = to_link(offset);
        if old_head != NIL {
            self.set_prev(old_head as usize, link)?;
        }
        self.write_node(
            offset,
            FreeNode {
                prev: NIL,
                next: old_head,
            },
        );
        self.first_free[level] = link;
        Ok(())
    }

    fn unlink(&mut self, level: usize, offset: usize) -> AllocResult<()> {
        let node = self.read_node(offset)?;
        if node.prev == NIL {
            self.first_free[level] = node.next;
        } else {
            let mut prev = self.read_node(node.prev as usize)?;
            prev.next = node.next;
            self.write_node(node.prev as usize, prev);
        }
        if node.next != NIL {
            self.set_prev(node.next as usize, node.prev)?;
        }
        Ok(())
    }

    fn set_prev(&mut self, offset: usize, prev: u32) -> AllocResult<()> {
        let mut node = self.read_node(offset)?;
        node.prev = prev;
        self.write_node(offset, node);
        Ok(())
    }

    /// Reads the links of a free block. Fails on a link outside the arena.
    #[inline]
    fn read_node(&self, offset: usize) -> AllocResult<FreeNode> {
        offset
            .checked_add(NODE_SIZE)
            .and_then(|end| self.arena.get(offset..end))
            .map(bytemuck::pod_read_unaligned)
            .ok_or_else(|| {
                AllocError::Corrupted(format!("free-list link {offset} is outside the arena"))
            })
    }

    #[inline]
    fn write_node(&mut self, offset: usize, node: FreeNode) {
        self.arena[offset..offset + NODE_SIZE].copy_from_slice(bytemuck::bytes_of(&node));
    }
}

impl UsageReport for BuddyAllocator {
    fn name(&self) -> &'static str {
        "buddy"
    }

    fn usage(&self) -> MemoryUsage {
        MemoryUsage {
            used_bytes: self.used_bytes,
            capacity_bytes: self.arena.len(),
            live_allocations: self.live_blocks,
        }
    }
}
