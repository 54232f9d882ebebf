//! Usage snapshots shared by every allocator.

/// Point-in-time memory usage of one allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MemoryUsage {
    /// Bytes handed out to callers.
    pub used_bytes: usize,
    /// Total bytes the allocator manages.
    pub capacity_bytes: usize,
    /// Number of live allocations.
    pub live_allocations: usize,
}

impl MemoryUsage {
    /// Bytes still available.
    #[inline]
    #[must_use]
    pub const fn free_bytes(&self) -> usize {
        self.capacity_bytes.saturating_sub(self.used_bytes)
    }

    /// Fraction of capacity still free, in `0.0..=1.0`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn free_fraction(&self) -> f32 {
        if self.capacity_bytes == 0 {
            return 0.0;
        }
        self.free_bytes() as f32 / self.capacity_bytes as f32
    }
}

/// Allocators that can report a [`MemoryUsage`] snapshot.
pub trait UsageReport {
    /// Short name used in logs.
    fn name(&self) -> &str;

    /// Current usage.
    fn usage(&self) -> MemoryUsage;
}
