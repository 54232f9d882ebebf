//! # STRATA Region Allocators
//!
//! Three allocators built for high-frequency allocate/free cycles inside a
//! frame loop:
//! - [`PoolAllocator`] - fixed-size chunks for one type, O(1), LIFO reuse
//! - [`StackAllocator`] - bump arena for mixed types, torn down in reverse
//!   construction order
//! - [`BuddyAllocator`] - power-of-two blocks with eager coalescing
//!
//! ## Architecture Rules
//!
//! 1. **Arenas are reserved once** - no allocator touches the global heap
//!    after construction
//! 2. **Exhaustion is a value** - every allocator returns [`AllocError`],
//!    nothing aborts
//! 3. **Single-threaded** - one instance per thread, no locks
//!
//! ## Example
//!
//! ```rust
//! use strata_alloc::{BuddyAllocator, BuddyConfig, PoolAllocator, StackAllocator};
//!
//! let mut pool: PoolAllocator<[u8; 100]> = PoolAllocator::new("cubes", 1_000)?;
//! let cube = pool.allocate([0; 100])?;
//! pool.delete(cube)?;
//!
//! let mut arena = StackAllocator::create(64 * 1024)?;
//! let _scratch = arena.alloc(vec![1, 2, 3])?;
//! arena.clean_up();
//!
//! let mut buddy = BuddyAllocator::new(BuddyConfig::default())?;
//! let block = buddy.alloc(1487)?;
//! buddy.release(block)?;
//! # Ok::<(), strata_alloc::AllocError>(())
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

mod bitmap;
pub mod buddy;
pub mod error;
pub mod pool;
pub mod stack;
pub mod usage;

pub use buddy::{BuddyAllocator, BuddyBlock, BuddyConfig};
pub use error::{AllocError, AllocResult};
pub use pool::{PoolAllocator, PoolHandle};
pub use stack::StackAllocator;
pub use usage::{MemoryUsage, UsageReport};
