//! # Frame Scenario Tests
//!
//! Drives each allocator through the allocate-N / release-N pattern of a
//! frame loop, using only the public API.

use std::cell::RefCell;
use std::rc::Rc;

use strata_alloc::{
    AllocError, BuddyAllocator, BuddyConfig, PoolAllocator, StackAllocator, UsageReport,
};

// ============================================================================
// POOL
// ============================================================================

#[test]
fn pool_capacity_four() {
    let mut pool: PoolAllocator<[u8; 100]> = PoolAllocator::new("cubes", 4).unwrap();

    let handles: Vec<_> = (0..4).map(|_| pool.allocate([1; 100]).unwrap()).collect();
    assert!(matches!(
        pool.allocate([2; 100]),
        Err(AllocError::Exhausted { .. })
    ));

    pool.delete(handles[0]).unwrap();
    let reused = pool.allocate([3; 100]).unwrap();
    assert_eq!(reused, handles[0]);
    assert_eq!(pool.usage_count(), 4);
}

#[test]
fn pool_many_frames_leave_no_residue() {
    let mut pool: PoolAllocator<u64> = PoolAllocator::new("frames", 256).unwrap();

    for frame in 0..50u64 {
        let count = (frame as usize * 37) % 256 + 1;
        let handles: Vec<_> = (0..count)
            .map(|i| pool.allocate(frame * 1000 + i as u64).unwrap())
            .collect();
        assert_eq!(pool.usage_count(), count);
        assert_eq!(pool.free_all(&handles), count);
        assert_eq!(pool.usage_count(), 0);
    }
    assert_eq!(pool.free_list_len(), 256);
}

// ============================================================================
// STACK
// ============================================================================

struct Noisy {
    id: u32,
    log: Rc<RefCell<Vec<u32>>>,
    _bytes: [u8; 64],
}

impl Drop for Noisy {
    fn drop(&mut self) {
        self.log.borrow_mut().push(self.id);
    }
}

#[test]
fn stack_frames_unwind_in_reverse() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let mut arena = StackAllocator::create(16 * 1024).unwrap();
    arena.set_enabled(true);

    for frame in 0..10u32 {
        for id in 0..20 {
            let _ = arena
                .alloc(Noisy {
                    id: frame * 100 + id,
                    log: Rc::clone(&log),
                    _bytes: [0; 64],
                })
                .unwrap();
        }
        arena.clean_up();

        let expected: Vec<u32> = (0..20).rev().map(|id| frame * 100 + id).collect();
        assert_eq!(*log.borrow(), expected);
        log.borrow_mut().clear();
        assert_eq!(arena.current_size(), 0);
    }
}

#[test]
fn stack_overflow_is_recoverable() {
    let mut arena = StackAllocator::create(1024).unwrap();

    let mut placed = 0;
    let err = loop {
        match arena.alloc([0u8; 100]) {
            Ok(_) => placed += 1,
            Err(err) => break err,
        }
    };
    assert!(matches!(err, AllocError::CapacityExceeded { .. }));
    assert_eq!(arena.object_count(), placed);

    arena.clean_up();
    assert!(arena.alloc([0u8; 100]).is_ok());
}

// ============================================================================
// BUDDY
// ============================================================================

#[test]
fn buddy_mixed_object_sizes() {
    let mut buddy = BuddyAllocator::new(BuddyConfig {
        max_level_exp: 16,
        min_level_exp: 9,
    })
    .unwrap();

    // Cube, pyramid and sphere sized requests.
    let sizes = [100usize, 1487, 10_000];
    let mut live = Vec::new();
    for round in 0..3 {
        for &size in &sizes {
            let block = buddy.alloc(size).unwrap();
            buddy.block_mut(&block).unwrap()[0] = round;
            live.push((block, size));
        }
    }
    assert_eq!(buddy.usage().live_allocations, 9);
    assert_eq!(buddy.used_bytes(), 3 * (512 + 2048 + 16_384));

    // Free in allocation order, which exercises partial merges.
    for (block, size) in live {
        buddy.free(block.offset(), size).unwrap();
        buddy.check_consistency().unwrap();
    }
    assert_eq!(buddy.unused_bytes(), 65_536);
    assert_eq!(buddy.free_blocks_at(0), 1);
}
