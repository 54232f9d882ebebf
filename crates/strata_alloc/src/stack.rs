//! # Stack Allocator
//!
//! Bump arena for heterogeneous per-frame objects, torn down in bulk.
//!
//! ## Layout
//!
//! ```text
//! base                                                    cursor
//!  │                                                         │
//!  ▼                                                         ▼
//!  [ A ][pad][ Header(A) ][ B ][pad][ Header(B) ] ........... free
//!                 ▲                      │
//!                 └──────── under ───────┘◄── top
//! ```
//!
//! Each object is followed by a header holding a link to the previous
//! header, the object's address and a drop function specialized to the
//! object's type. `clean_up` walks the chain from `top`, so objects are
//! destroyed in exact reverse construction order.
//!
//! ## One arena per thread
//!
//! [`StackAllocator::create`] refuses to build a second arena while one is
//! alive on the same thread. The owner passes `&StackAllocator` to whoever
//! needs to allocate.

// SAFETY: This module places objects of arbitrary type into a raw byte arena.
// Every unsafe block states the invariant it relies on.
#![allow(unsafe_code)]

use std::alloc::{alloc, dealloc, Layout};
use std::cell::Cell;
use std::mem;
use std::ptr::{self, NonNull};

use crate::error::{AllocError, AllocResult};
use crate::usage::{MemoryUsage, UsageReport};

/// Alignment of the arena base. Objects needing more are rejected.
pub const ARENA_ALIGN: usize = 64;

thread_local! {
    /// Set while a `StackAllocator` is alive on this thread.
    static ARENA_LIVE: Cell<bool> = const { Cell::new(false) };
}

/// Intrusive record written right after each object.
struct ObjectHeader {
    /// Header of the object allocated before this one.
    under: Option<NonNull<ObjectHeader>>,
    /// The object this header guards.
    object: NonNull<u8>,
    /// Drops the object in place.
    drop_fn: unsafe fn(NonNull<u8>),
}

/// Type-erased destructor stored in [`ObjectHeader`].
///
/// # Safety
///
/// `object` must point to a live, properly aligned `T` that is not used
/// again after this call.
unsafe fn drop_object<T>(object: NonNull<u8>) {
    // SAFETY: guaranteed by the caller.
    unsafe { ptr::drop_in_place(object.cast::<T>().as_ptr()) };
}

/// Rounds `offset` up to a multiple of `align` (a power of two).
fn align_up(offset: usize, align: usize) -> Option<usize> {
    Some(offset.checked_add(align - 1)? & !(align - 1))
}

/// Where one allocation lands inside the arena.
struct Reservation {
    object: usize,
    header: usize,
    end: usize,
}

/// A bump-pointer arena with ordered teardown.
///
/// Allocation takes `&self`, so any number of objects can be live at once.
/// [`StackAllocator::clean_up`] takes `&mut self`, which guarantees every
/// reference handed out has been released before the objects are dropped.
///
/// # Thread Safety
///
/// NOT thread-safe, and not `Send`: the arena belongs to the thread that
/// created it.
///
/// # Example
///
/// ```rust
/// use strata_alloc::StackAllocator;
///
/// let mut arena = StackAllocator::create(4096)?;
/// let name = arena.alloc(String::from("frame scratch"))?;
/// let count = arena.alloc(42_u64)?;
/// assert_eq!(name.len() as u64 + *count, 55);
///
/// arena.clean_up(); // drops `count`, then `name`
/// assert_eq!(arena.current_size(), 0);
/// # Ok::<(), strata_alloc::AllocError>(())
/// ```
pub struct StackAllocator {
    /// Start of the arena.
    base: NonNull<u8>,
    /// Layout used to allocate (and free) the arena.
    layout: Layout,
    /// Offset of the first unused byte.
    cursor: Cell<usize>,
    /// Header of the most recent object.
    top: Cell<Option<NonNull<ObjectHeader>>>,
    /// Number of objects since the last clean-up.
    objects: Cell<usize>,
    /// Whether the driver currently routes allocations here.
    enabled: bool,
}

impl StackAllocator {
    /// Creates the arena for this thread.
    ///
    /// # Errors
    ///
    /// - [`AllocError::InvalidCapacity`] if `total_bytes` is zero.
    /// - [`AllocError::ArenaAlreadyCreated`] if another arena is alive on
    ///   this thread.
    /// - [`AllocError::Exhausted`] if the system allocator refuses the arena.
    pub fn create(total_bytes: usize) -> AllocResult<Self> {
        if total_bytes == 0 {
            return Err(AllocError::InvalidCapacity);
        }
        if ARENA_LIVE.with(Cell::get) {
            tracing::warn!(total_bytes, "refusing to create a second stack arena");
            return Err(AllocError::ArenaAlreadyCreated);
        }

        let layout = Layout::from_size_align(total_bytes, ARENA_ALIGN)
            .map_err(|err| AllocError::InvalidConfig(err.to_string()))?;

        // SAFETY: layout has a non-zero size.
        let raw = unsafe { alloc(layout) };
        let base = NonNull::new(raw).ok_or(AllocError::Exhausted {
            requested: total_bytes,
        })?;

        ARENA_LIVE.with(|live| live.set(true));
        tracing::debug!(total_bytes, "stack arena created");

        Ok(Self {
            base,
            layout,
            cursor: Cell::new(0),
            top: Cell::new(None),
            objects: Cell::new(0),
            enabled: false,
        })
    }

    /// Moves `value` into the arena.
    ///
    /// # Errors
    ///
    /// Same as [`StackAllocator::alloc_with`].
    #[inline]
    pub fn alloc<T: 'static>(&self, value: T) -> AllocResult<&mut T> {
        self.alloc_with(|| value)
    }

    /// Builds an object with `init` and places it in the arena.
    ///
    /// `init` may itself allocate from this arena; space is reserved after
    /// it returns.
    ///
    /// # Errors
    ///
    /// - [`AllocError::UnsupportedAlignment`] if `T` needs more than
    ///   [`ARENA_ALIGN`].
    /// - [`AllocError::CapacityExceeded`] if the object, its header and the
    ///   alignment padding in front of each do not fit. Nothing is written
    ///   and the built value is dropped.
    #[allow(clippy::mut_from_ref, clippy::cast_ptr_alignment)]
    pub fn alloc_with<T: 'static>(&self, init: impl FnOnce() -> T) -> AllocResult<&mut T> {
        let align = mem::align_of::<T>();
        if align > ARENA_ALIGN {
            return Err(AllocError::UnsupportedAlignment {
                align,
                max: ARENA_ALIGN,
            });
        }

        let value = init();
        let slot = self.reserve(mem::size_of::<T>(), align)?;

        // SAFETY: `reserve` checked that `slot.object..slot.end` lies inside
        // the arena and past every live object. The base is aligned to
        // ARENA_ALIGN, so offsets aligned for T and ObjectHeader give aligned
        // pointers.
        unsafe {
            let object = self.base.as_ptr().add(slot.object).cast::<T>();
            ptr::write(object, value);

            let header = self.base.as_ptr().add(slot.header).cast::<ObjectHeader>();
            ptr::write(
                header,
                ObjectHeader {
                    under: self.top.get(),
                    object: NonNull::new_unchecked(object.cast::<u8>()),
                    drop_fn: drop_object::<T>,
                },
            );

            self.top.set(Some(NonNull::new_unchecked(header)));
            self.cursor.set(slot.end);
            self.objects.set(self.objects.get() + 1);

            // Each reservation is disjoint, so this is the only reference to
            // the object until `clean_up` takes `&mut self`.
            Ok(&mut *object)
        }
    }

    /// Computes aligned offsets for an object and its header.
    fn reserve(&self, size: usize, align: usize) -> AllocResult<Reservation> {
        let start = self.cursor.get();
        let remaining = self.max_size() - start;

        let slot = align_up(start, align).and_then(|object| {
            let header =
                align_up(object.checked_add(size)?, mem::align_of::<ObjectHeader>())?;
            let end = header.checked_add(mem::size_of::<ObjectHeader>())?;
            Some(Reservation { object, header, end })
        });

        match slot {
            Some(slot) if slot.end <= self.max_size() => Ok(slot),
            Some(slot) => Err(AllocError::CapacityExceeded {
                requested: slot.end - start,
                remaining,
            }),
            None => Err(AllocError::CapacityExceeded {
                requested: usize::MAX,
                remaining,
            }),
        }
    }

    /// Drops every object allocated since the last clean-up, newest first,
    /// and rewinds the arena to its start.
    pub fn clean_up(&mut self) {
        let mut cursor = self.top.take();
        while let Some(header) = cursor {
            // SAFETY: every header in the chain was written by `alloc_with`
            // and guards an object that has not been dropped yet. `&mut self`
            // means no reference into the arena is still alive.
            unsafe {
                let header = header.as_ptr().read();
                (header.drop_fn)(header.object);
                cursor = header.under;
            }
        }
        self.cursor.set(0);
        self.objects.set(0);
    }

    /// Bytes in use, padding and headers included.
    #[inline]
    #[must_use]
    pub fn current_size(&self) -> usize {
        self.cursor.get()
    }

    /// Total arena size in bytes.
    #[inline]
    #[must_use]
    pub const fn max_size(&self) -> usize {
        self.layout.size()
    }

    /// Bytes left before the arena is full.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.max_size() - self.current_size()
    }

    /// Fraction of the arena still free, in `0.0..=1.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn remaining_fraction(&self) -> f32 {
        self.remaining() as f32 / self.max_size() as f32
    }

    /// Number of objects awaiting clean-up.
    #[inline]
    #[must_use]
    pub fn object_count(&self) -> usize {
        self.objects.get()
    }

    /// Byte offset of `object` from the arena start, if it lies inside the
    /// arena.
    #[must_use]
    pub fn offset_of<T>(&self, object: &T) -> Option<usize> {
        let base = self.base.as_ptr() as usize;
        let addr = (object as *const T) as usize;
        (base..base + self.max_size())
            .contains(&addr)
            .then(|| addr - base)
    }

    /// Returns true if the driver routes allocations to this arena.
    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Sets the enabled flag. Disabling runs [`StackAllocator::clean_up`]
    /// so no object stays addressable while the arena is off.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.enabled && !enabled {
            self.clean_up();
        }
        self.enabled = enabled;
    }

    /// Flips the enabled flag and returns the new state.
    pub fn toggle_enabled(&mut self) -> bool {
        self.set_enabled(!self.enabled);
        self.enabled
    }
}

impl UsageReport for StackAllocator {
    fn name(&self) -> &'static str {
        "stack"
    }

    fn usage(&self) -> MemoryUsage {
        MemoryUsage {
            used_bytes: self.current_size(),
            capacity_bytes: self.max_size(),
            live_allocations: self.object_count(),
        }
    }
}

impl Drop for StackAllocator {
    fn drop(&mut self) {
        self.clean_up();
        // SAFETY: `base` was allocated with `layout` in `create`.
        unsafe {
            dealloc(self.base.as_ptr(), self.layout);
        }
        let _ = ARENA_LIVE.try_with(|live| live.set(false));
    }
}
