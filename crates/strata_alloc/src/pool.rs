//! # Pool Allocator
//!
//! Fixed-size chunk allocator for objects that are frequently allocated and
//! freed within a frame.
//!
//! ```text
//! chunks:  [ Live(a) | Free -> 3 | Live(b) | Free -> None ]
//!                        ^
//!                      head
//! ```
//!
//! A free chunk stores only the index of the next free chunk, inside its own
//! slot. Allocation pops the head, deletion pushes the chunk back on the
//! head, so reuse is LIFO.

use std::mem;

use crate::error::{AllocError, AllocResult};
use crate::usage::{MemoryUsage, UsageReport};

/// One storage slot. Either holds a live object or a link in the free list,
/// never both.
enum Chunk<T> {
    /// Member of the free list.
    Free {
        /// Next free chunk, `None` at the tail.
        next: Option<usize>,
    },
    /// Holds a constructed object.
    Live(T),
}

/// A pool allocator for fixed-size objects.
///
/// All chunks are reserved at construction. Allocation and deletion are
/// O(1) and never touch the global heap.
///
/// # Thread Safety
///
/// Single-threaded. A pool belongs to the frame loop that owns it.
///
/// # Example
///
/// ```rust
/// use strata_alloc::PoolAllocator;
///
/// #[derive(Debug, PartialEq)]
/// struct Cube { edge: f32, color: u32 }
///
/// let mut pool: PoolAllocator<Cube> = PoolAllocator::new("cubes", 4)?;
///
/// let handle = pool.allocate(Cube { edge: 1.0, color: 0xff00ff })?;
/// assert_eq!(pool.get(handle).map(|c| c.color), Some(0xff00ff));
/// assert_eq!(pool.take(handle)?, Cube { edge: 1.0, color: 0xff00ff });
/// # Ok::<(), strata_alloc::AllocError>(())
/// ```
pub struct PoolAllocator<T> {
    /// Contiguous chunk storage.
    chunks: Box<[Chunk<T>]>,
    /// First free chunk.
    head: Option<usize>,
    /// Name shown in usage reports.
    tag: String,
    /// Number of live objects.
    used_count: usize,
    /// Whether the driver currently routes allocations here.
    enabled: bool,
}

/// Handle to an object allocated from a [`PoolAllocator`].
///
/// Handles carry no pool identity: passing a handle to a pool other than
/// the one that issued it is a caller bug and is not detected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PoolHandle {
    /// Index of the chunk.
    index: usize,
}

impl PoolHandle {
    /// Index of the chunk this handle refers to.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index
    }
}

impl<T> PoolAllocator<T> {
    /// Creates a pool with room for `capacity` objects.
    ///
    /// Chunks are linked into one ascending free list, so the first
    /// allocations come out in address order.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidCapacity`] if `capacity` is zero.
    pub fn new(tag: impl Into<String>, capacity: usize) -> AllocResult<Self> {
        if capacity == 0 {
            return Err(AllocError::InvalidCapacity);
        }

        let chunks: Vec<Chunk<T>> = (0..capacity)
            .map(|index| Chunk::Free {
                next: (index + 1 < capacity).then_some(index + 1),
            })
            .collect();

        let tag = tag.into();
        tracing::debug!(
            tag = %tag,
            capacity,
            object_bytes = mem::size_of::<T>(),
            chunk_bytes = mem::size_of::<Chunk<T>>(),
            "pool allocator created"
        );

        Ok(Self {
            chunks: chunks.into_boxed_slice(),
            head: Some(0),
            tag,
            used_count: 0,
            enabled: false,
        })
    }

    /// Stores `value` in a free chunk.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::Exhausted`] when every chunk is live. The value
    /// is dropped in that case.
    #[inline]
    pub fn allocate(&mut self, value: T) -> AllocResult<PoolHandle> {
        self.allocate_with(|| value)
    }

    /// Builds an object directly in a free chunk.
    ///
    /// `init` only runs when a chunk is available.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::Exhausted`] when every chunk is live, or
    /// [`AllocError::Corrupted`] if the free list points at a live chunk.
    pub fn allocate_with(&mut self, init: impl FnOnce() -> T) -> AllocResult<PoolHandle> {
        let Some(index) = self.head else {
            return Err(AllocError::Exhausted {
                requested: mem::size_of::<T>(),
            });
        };

        let chunk = &mut self.chunks[index];
        let next = match chunk {
            Chunk::Free { next } => *next,
            Chunk::Live(_) => {
                return Err(AllocError::Corrupted(format!(
                    "pool '{}': free list head {index} is live",
                    self.tag
                )));
            }
        };

        *chunk = Chunk::Live(init());
        self.head = next;
        self.used_count += 1;

        Ok(PoolHandle { index })
    }

    /// Removes the object and returns it, relinking its chunk at the head of
    /// the free list.
    ///
    /// # Errors
    ///
    /// Returns [`AllocError::InvalidHandle`] if the handle is out of range or
    /// its chunk is already free.
    pub fn take(&mut self, handle: PoolHandle) -> AllocResult<T> {
        let chunk = self
            .chunks
            .get_mut(handle.index)
            .ok_or(AllocError::InvalidHandle { index: handle.index })?;

        match mem::replace(chunk, Chunk::Free { next: self.head }) {
            Chunk::Live(value) => {
                self.head = Some(handle.index);
                self.used_count -= 1;
                Ok(value)
            }
            free @ Chunk::Free { .. } => {
                *chunk = free;
                Err(AllocError::InvalidHandle { index: handle.index })
            }
        }
    }

    /// Drops the object and returns its chunk to the free list.
    ///
    /// # Errors
    ///
    /// Same as [`PoolAllocator::take`].
    #[inline]
    pub fn delete(&mut self, handle: PoolHandle) -> AllocResult<()> {
        self.take(handle).map(drop)
    }

    /// Gets a reference to a live object.
    #[inline]
    #[must_use]
    pub fn get(&self, handle: PoolHandle) -> Option<&T> {
        match self.chunks.get(handle.index)? {
            Chunk::Live(value) => Some(value),
            Chunk::Free { .. } => None,
        }
    }

    /// Gets a mutable reference to a live object.
    #[inline]
    pub fn get_mut(&mut self, handle: PoolHandle) -> Option<&mut T> {
        match self.chunks.get_mut(handle.index)? {
            Chunk::Live(value) => Some(value),
            Chunk::Free { .. } => None,
        }
    }

    /// Name given at construction.
    #[must_use]
    pub fn tag(&self) -> &str {
        &self.tag
    }

    /// Bytes occupied by live objects.
    #[inline]
    #[must_use]
    pub const fn usage_bytes(&self) -> usize {
        self.used_count * mem::size_of::<T>()
    }

    /// Bytes the pool can hand out in total.
    #[inline]
    #[must_use]
    pub fn capacity_bytes(&self) -> usize {
        self.chunks.len() * mem::size_of::<T>()
    }

    /// Number of live objects.
    #[inline]
    #[must_use]
    pub const fn usage_count(&self) -> usize {
        self.used_count
    }

    /// Maximum number of live objects.
    #[inline]
    #[must_use]
    pub fn capacity_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of chunks reachable from the free-list head.
    ///
    /// Walks the list, so this is O(free chunks). Meant for monitoring and
    /// tests, not the hot path.
    #[must_use]
    pub fn free_list_len(&self) -> usize {
        let mut len = 0;
        let mut cursor = self.head;
        while let Some(index) = cursor {
            if len == self.chunks.len() {
                break;
            }
            match &self.chunks[index] {
                Chunk::Free { next } => cursor = *next,
                Chunk::Live(_) => break,
            }
            len += 1;
        }
        len
    }

    /// Bytes held by chunks in the free list.
    #[must_use]
    pub fn free_list_bytes(&self) -> usize {
        self.free_list_len() * mem::size_of::<T>()
    }

    /// Returns true if the driver routes allocations to this pool.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Flips the enabled flag and returns the new state.
    pub fn toggle_enabled(&mut self) -> bool {
        self.enabled = !self.enabled;
        self.enabled
    }

    /// Deletes every live object referenced by `handles`.
    ///
    /// Handles that are stale or out of range are skipped. Returns the number
    /// of objects deleted.
    pub fn free_all(&mut self, handles: &[PoolHandle]) -> usize {
        let freed = handles
            .iter()
            .filter(|&&handle| self.delete(handle).is_ok())
            .count();
        tracing::debug!(tag = %self.tag, freed, "pool freed all known objects");
        freed
    }

    /// Drops every live object and rebuilds the ascending free list.
    pub fn clear(&mut self) {
        let capacity = self.chunks.len();
        for (index, chunk) in self.chunks.iter_mut().enumerate() {
            *chunk = Chunk::Free {
                next: (index + 1 < capacity).then_some(index + 1),
            };
        }
        self.head = Some(0);
        self.used_count = 0;
    }

    /// Iterates over all live objects.
    pub fn iter(&self) -> impl Iterator<Item = (PoolHandle, &T)> {
        self.chunks
            .iter()
            .enumerate()
            .filter_map(|(index, chunk)| match chunk {
                Chunk::Live(value) => Some((PoolHandle { index }, value)),
                Chunk::Free { .. } => None,
            })
    }
}

impl<T> UsageReport for PoolAllocator<T> {
    fn name(&self) -> &str {
        &self.tag
    }

    fn usage(&self) -> MemoryUsage {
        MemoryUsage {
            used_bytes: self.usage_bytes(),
            capacity_bytes: self.capacity_bytes(),
            live_allocations: self.used_count,
        }
    }
}
