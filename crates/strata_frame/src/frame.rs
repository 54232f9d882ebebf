//! # Frame Driver
//!
//! Owns one instance of each allocator and runs them through the
//! allocate-N / release-N cycle of a frame.
//!
//! ## Frame Layout
//!
//! ```text
//! pool      cubes     allocate xN  -> delete each
//! stack     mixed     alloc xN     -> clean_up (reverse order)
//! buddy     mixed     alloc xN     -> free each, shuffled
//! baseline  cubes     Box::new xN  -> drop
//! ```
//!
//! An allocator that runs out of space mid-frame stops allocating for the
//! rest of that frame; the shortfall is logged and counted, not raised.

use std::time::Instant;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use strata_alloc::{
    AllocError, BuddyAllocator, BuddyBlock, PoolAllocator, PoolHandle, StackAllocator,
    UsageReport,
};

use crate::config::FrameConfig;
use crate::error::FrameResult;
use crate::objects::{Cube, ObjectKind, Pyramid, Sphere};
use crate::profiler::{ProfileReport, ScopeTimer};

/// Phase names recorded in the [`ProfileReport`].
pub mod phase {
    /// Whole frame.
    pub const FRAME: &str = "frame";
    /// Pool allocation.
    pub const POOL_ALLOC: &str = "pool.alloc";
    /// Pool release.
    pub const POOL_FREE: &str = "pool.free";
    /// Stack allocation.
    pub const STACK_ALLOC: &str = "stack.alloc";
    /// Stack clean-up.
    pub const STACK_FREE: &str = "stack.free";
    /// Buddy allocation.
    pub const BUDDY_ALLOC: &str = "buddy.alloc";
    /// Buddy release.
    pub const BUDDY_FREE: &str = "buddy.free";
    /// Boxed allocation.
    pub const BASELINE_ALLOC: &str = "baseline.alloc";
    /// Boxed drop.
    pub const BASELINE_FREE: &str = "baseline.free";
}

/// What one frame managed to allocate.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Cubes taken from the pool.
    pub pool: usize,
    /// Objects placed in the stack arena.
    pub stack: usize,
    /// Blocks taken from the buddy allocator.
    pub buddy: usize,
    /// Boxed cubes.
    pub baseline: usize,
    /// Allocators that ran out of space this frame.
    pub exhausted: usize,
}

/// Runs the allocators frame by frame and profiles them.
///
/// # Thread Safety
///
/// The driver owns this thread's stack arena, so only one driver can be
/// alive per thread.
pub struct FrameDriver {
    config: FrameConfig,
    pool: PoolAllocator<Cube>,
    pool_handles: Vec<PoolHandle>,
    stack: StackAllocator,
    buddy: BuddyAllocator,
    buddy_enabled: bool,
    /// Live blocks with the size originally requested.
    buddy_blocks: Vec<(BuddyBlock, usize)>,
    baseline_enabled: bool,
    baseline: Vec<Box<Cube>>,
    rng: StdRng,
    report: ProfileReport,
    frames_run: u64,
}

impl FrameDriver {
    /// Builds every allocator described by `config`.
    ///
    /// # Errors
    ///
    /// - [`crate::FrameError::InvalidConfig`] if `config` does not validate.
    /// - [`crate::FrameError::Alloc`] if an allocator cannot be built, for
    ///   example because another stack arena is alive on this thread.
    pub fn new(config: FrameConfig) -> FrameResult<Self> {
        config.validate()?;

        let mut pool = PoolAllocator::new("cubes", config.pool.capacity)?;
        if config.pool.enabled {
            pool.toggle_enabled();
        }

        let mut stack = StackAllocator::create(config.stack.arena_bytes)?;
        stack.set_enabled(config.stack.enabled);

        let buddy = BuddyAllocator::new(config.buddy.allocator_config())?;

        tracing::info!(
            pool_capacity = config.pool.capacity,
            stack_bytes = config.stack.arena_bytes,
            buddy_bytes = buddy.config().arena_size(),
            "frame driver ready"
        );

        Ok(Self {
            pool_handles: Vec::with_capacity(config.pool.objects_per_frame),
            buddy_blocks: Vec::with_capacity(config.buddy.allocations_per_frame),
            baseline: Vec::with_capacity(config.pool.objects_per_frame),
            buddy_enabled: config.buddy.enabled,
            baseline_enabled: config.baseline.enabled,
            rng: StdRng::seed_from_u64(config.seed),
            report: ProfileReport::new(),
            frames_run: 0,
            pool,
            stack,
            buddy,
            config,
        })
    }

    /// Runs one frame through every enabled allocator.
    ///
    /// # Errors
    ///
    /// [`crate::FrameError::Alloc`] for allocator failures other than
    /// exhaustion.
    pub fn run_frame(&mut self) -> FrameResult<FrameStats> {
        let start = Instant::now();
        let fill = (self.frames_run % 251) as u8;
        let mut stats = FrameStats::default();

        if self.pool.is_enabled() {
            self.pool_frame(fill, &mut stats)?;
        }
        if self.stack.is_enabled() {
            self.stack_frame(fill, &mut stats)?;
        }
        if self.buddy_enabled {
            self.buddy_frame(fill, &mut stats)?;
        }
        if self.baseline_enabled {
            self.baseline_frame(fill, &mut stats);
        }

        let elapsed = start.elapsed();
        self.report.phase_mut(phase::FRAME).record(elapsed);
        self.frames_run += 1;

        tracing::debug!(
            frame = self.frames_run,
            micros = elapsed.as_micros() as u64,
            pool = stats.pool,
            stack = stats.stack,
            buddy = stats.buddy,
            baseline = stats.baseline,
            "frame finished"
        );
        Ok(stats)
    }

    /// Runs `frames` frames, logs a summary and returns the profile so far.
    ///
    /// # Errors
    ///
    /// Stops at the first frame that fails; see [`FrameDriver::run_frame`].
    pub fn run(&mut self, frames: u64) -> FrameResult<ProfileReport> {
        let mut exhausted_frames = 0u64;
        for _ in 0..frames {
            if self.run_frame()?.exhausted > 0 {
                exhausted_frames += 1;
            }
        }
        if exhausted_frames > 0 {
            tracing::warn!(exhausted_frames, "some frames ran out of allocator space");
        }
        self.log_usage();
        self.report.log_summary();
        Ok(self.report.clone())
    }

    fn pool_frame(&mut self, fill: u8, stats: &mut FrameStats) -> FrameResult<()> {
        {
            let _timer = ScopeTimer::start(self.report.phase_mut(phase::POOL_ALLOC));
            for _ in 0..self.config.pool.objects_per_frame {
                match self.pool.allocate(Cube::filled(fill)) {
                    Ok(handle) => self.pool_handles.push(handle),
                    Err(err) => {
                        note_exhaustion(self.pool.tag(), err, stats)?;
                        break;
                    }
                }
            }
        }
        stats.pool = self.pool_handles.len();

        let _timer = ScopeTimer::start(self.report.phase_mut(phase::POOL_FREE));
        for handle in self.pool_handles.drain(..) {
            self.pool.delete(handle)?;
        }
        Ok(())
    }

    fn stack_frame(&mut self, fill: u8, stats: &mut FrameStats) -> FrameResult<()> {
        {
            let _timer = ScopeTimer::start(self.report.phase_mut(phase::STACK_ALLOC));
            for index in 0..self.config.stack.objects_per_frame {
                let placed = match ObjectKind::rotating(index) {
                    ObjectKind::Cube => self.stack.alloc(Cube::filled(fill)).map(|_| ()),
                    ObjectKind::Pyramid => self.stack.alloc(Pyramid::filled(fill)).map(|_| ()),
                    ObjectKind::Sphere => self.stack.alloc(Sphere::filled(fill)).map(|_| ()),
                };
                if let Err(err) = placed {
                    note_exhaustion("stack", err, stats)?;
                    break;
                }
            }
        }
        stats.stack = self.stack.object_count();

        let _timer = ScopeTimer::start(self.report.phase_mut(phase::STACK_FREE));
        self.stack.clean_up();
        Ok(())
    }

    fn buddy_frame(&mut self, fill: u8, stats: &mut FrameStats) -> FrameResult<()> {
        {
            let _timer = ScopeTimer::start(self.report.phase_mut(phase::BUDDY_ALLOC));
            for index in 0..self.config.buddy.allocations_per_frame {
                let size = ObjectKind::rotating(index).size();
                match self.buddy.alloc(size) {
                    Ok(block) => {
                        if let Some(bytes) = self.buddy.block_mut(&block) {
                            bytes[..size].fill(fill);
                        }
                        self.buddy_blocks.push((block, size));
                    }
                    Err(err) => {
                        note_exhaustion("buddy", err, stats)?;
                        break;
                    }
                }
            }
        }
        stats.buddy = self.buddy_blocks.len();

        // Random order exercises partial merges instead of a clean unwind.
        self.buddy_blocks.shuffle(&mut self.rng);

        let _timer = ScopeTimer::start(self.report.phase_mut(phase::BUDDY_FREE));
        for (block, size) in self.buddy_blocks.drain(..) {
            self.buddy.free(block.offset(), size)?;
        }
        Ok(())
    }

    fn baseline_frame(&mut self, fill: u8, stats: &mut FrameStats) {
        {
            let _timer = ScopeTimer::start(self.report.phase_mut(phase::BASELINE_ALLOC));
            for _ in 0..self.config.pool.objects_per_frame {
                self.baseline.push(Box::new(Cube::filled(fill)));
            }
        }
        stats.baseline = self.baseline.len();

        let _timer = ScopeTimer::start(self.report.phase_mut(phase::BASELINE_FREE));
        self.baseline.clear();
    }

    /// Enables or disables the pool. Disabling deletes anything the driver
    /// still holds in it.
    pub fn set_pool_enabled(&mut self, enabled: bool) {
        if self.pool.is_enabled() == enabled {
            return;
        }
        if !enabled {
            self.pool.free_all(&self.pool_handles);
            self.pool_handles.clear();
        }
        self.pool.toggle_enabled();
        tracing::info!(enabled, "pool toggled");
    }

    /// Enables or disables the stack arena. Disabling cleans it up.
    pub fn set_stack_enabled(&mut self, enabled: bool) {
        self.stack.set_enabled(enabled);
        tracing::info!(enabled, "stack toggled");
    }

    /// Enables or disables the buddy allocator. Disabling frees anything
    /// the driver still holds in it.
    ///
    /// # Errors
    ///
    /// [`crate::FrameError::Alloc`] if a held block cannot be freed.
    pub fn set_buddy_enabled(&mut self, enabled: bool) -> FrameResult<()> {
        if !enabled {
            for (block, size) in self.buddy_blocks.drain(..) {
                self.buddy.free(block.offset(), size)?;
            }
        }
        self.buddy_enabled = enabled;
        tracing::info!(enabled, "buddy toggled");
        Ok(())
    }

    /// Enables or disables the boxed baseline.
    pub fn set_baseline_enabled(&mut self, enabled: bool) {
        if !enabled {
            self.baseline.clear();
        }
        self.baseline_enabled = enabled;
    }

    /// Emits one `info` event per allocator with its current usage.
    pub fn log_usage(&self) {
        let reports: [&dyn UsageReport; 3] = [&self.pool, &self.stack, &self.buddy];
        for report in reports {
            let usage = report.usage();
            tracing::info!(
                allocator = report.name(),
                used = usage.used_bytes,
                capacity = usage.capacity_bytes,
                free_fraction = usage.free_fraction(),
                "usage"
            );
        }
    }

    /// The pool of cubes.
    #[must_use]
    pub const fn pool(&self) -> &PoolAllocator<Cube> {
        &self.pool
    }

    /// This thread's stack arena.
    #[must_use]
    pub const fn stack(&self) -> &StackAllocator {
        &self.stack
    }

    /// The buddy allocator.
    #[must_use]
    pub const fn buddy(&self) -> &BuddyAllocator {
        &self.buddy
    }

    /// Returns true if the buddy allocator runs each frame.
    #[must_use]
    pub const fn buddy_enabled(&self) -> bool {
        self.buddy_enabled
    }

    /// Returns true if the baseline runs each frame.
    #[must_use]
    pub const fn baseline_enabled(&self) -> bool {
        self.baseline_enabled
    }

    /// Configuration the driver was built with.
    #[must_use]
    pub const fn config(&self) -> &FrameConfig {
        &self.config
    }

    /// Profile collected so far.
    #[must_use]
    pub const fn report(&self) -> &ProfileReport {
        &self.report
    }

    /// Number of frames run.
    #[must_use]
    pub const fn frames_run(&self) -> u64 {
        self.frames_run
    }
}

/// Logs and counts an exhaustion, passes every other error through.
fn note_exhaustion(allocator: &str, err: AllocError, stats: &mut FrameStats) -> FrameResult<()> {
    if !err.is_exhaustion() {
        return Err(err.into());
    }
    tracing::warn!(allocator, error = %err, "allocator exhausted mid-frame");
    stats.exhausted += 1;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> FrameConfig {
        let mut config = FrameConfig::default();
        config.pool.capacity = 64;
        config.pool.objects_per_frame = 64;
        config.stack.arena_bytes = 256 * 1024;
        config.stack.objects_per_frame = 30;
        config.buddy.max_level_exp = 20;
        config.buddy.allocations_per_frame = 30;
        config
    }

    #[test]
    fn test_frame_allocates_and_releases() {
        let mut driver = FrameDriver::new(small_config()).unwrap();
        let stats = driver.run_frame().unwrap();

        assert_eq!(stats.pool, 64);
        assert_eq!(stats.stack, 30);
        assert_eq!(stats.buddy, 30);
        assert_eq!(stats.baseline, 64);
        assert_eq!(stats.exhausted, 0);

        assert_eq!(driver.pool().usage_count(), 0);
        assert_eq!(driver.stack().current_size(), 0);
        assert_eq!(driver.buddy().used_bytes(), 0);
        assert_eq!(driver.buddy().free_blocks_at(0), 1);
    }

    #[test]
    fn test_pool_exhaustion_is_counted() {
        let mut config = small_config();
        config.pool.objects_per_frame = 100;
        let mut driver = FrameDriver::new(config).unwrap();

        let stats = driver.run_frame().unwrap();
        assert_eq!(stats.pool, 64);
        assert_eq!(stats.exhausted, 1);
        assert_eq!(driver.pool().usage_count(), 0);
    }

    #[test]
    fn test_report_phases() {
        let mut driver = FrameDriver::new(small_config()).unwrap();
        let report = driver.run(3).unwrap();

        for name in [
            phase::FRAME,
            phase::POOL_ALLOC,
            phase::POOL_FREE,
            phase::STACK_ALLOC,
            phase::STACK_FREE,
            phase::BUDDY_ALLOC,
            phase::BUDDY_FREE,
            phase::BASELINE_ALLOC,
            phase::BASELINE_FREE,
        ] {
            assert_eq!(report.phase(name).map(|m| m.samples()), Some(3), "{name}");
        }
        assert_eq!(driver.frames_run(), 3);
    }

    #[test]
    fn test_disabled_allocators_are_skipped() {
        let mut driver = FrameDriver::new(small_config()).unwrap();
        driver.set_pool_enabled(false);
        driver.set_stack_enabled(false);
        driver.set_buddy_enabled(false).unwrap();
        driver.set_baseline_enabled(false);

        let stats = driver.run_frame().unwrap();
        assert_eq!(stats, FrameStats::default());
        assert!(driver.report().phase(phase::POOL_ALLOC).is_none());
        assert!(driver.report().phase(phase::FRAME).is_some());

        driver.set_pool_enabled(true);
        assert_eq!(driver.run_frame().unwrap().pool, 64);
    }
}
