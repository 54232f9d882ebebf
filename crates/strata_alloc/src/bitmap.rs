//! Flat bitset over the nodes of the buddy tree.

/// One bit per tree node, 64 nodes per word.
///
/// ## Performance
///
/// - Set / clear / test: O(1)
/// - Clear all: O(n/64)
pub(crate) struct BlockBitmap {
    /// 1 = free, 0 = used or not materialized.
    bits: Vec<u64>,
    /// Number of addressable nodes.
    len: usize,
    /// Cached count of set bits.
    set_count: usize,
}

impl BlockBitmap {
    /// Creates a bitmap of `len` clear bits.
    pub(crate) fn new(len: usize) -> Self {
        Self {
            bits: vec![0u64; len.div_ceil(64)],
            len,
            set_count: 0,
        }
    }

    /// Sets bit `index`.
    #[inline]
    pub(crate) fn set(&mut self, index: usize) {
        debug_assert!(index < self.len, "node index out of bounds");
        let mask = 1u64 << (index % 64);
        let word = &mut self.bits[index / 64];
        if *word & mask == 0 {
            *word |= mask;
            self.set_count += 1;
        }
    }

    /// Clears bit `index`.
    #[inline]
    pub(crate) fn clear(&mut self, index: usize) {
        debug_assert!(index < self.len, "node index out of bounds");
        let mask = 1u64 << (index % 64);
        let word = &mut self.bits[index / 64];
        if *word & mask != 0 {
            *word &= !mask;
            self.set_count -= 1;
        }
    }

    /// Tests bit `index`. Out-of-range indices read as clear.
    #[inline]
    pub(crate) fn get(&self, index: usize) -> bool {
        if index >= self.len {
            return false;
        }
        (self.bits[index / 64] >> (index % 64)) & 1 == 1
    }

    /// Clears every bit.
    pub(crate) fn clear_all(&mut self) {
        self.bits.fill(0);
        self.set_count = 0;
    }

    /// Number of set bits.
    #[inline]
    pub(crate) fn count_set(&self) -> usize {
        self.set_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_clear() {
        let mut bitmap = BlockBitmap::new(130);
        bitmap.set(0);
        bitmap.set(64);
        bitmap.set(129);
        bitmap.set(129);
        assert!(bitmap.get(0) && bitmap.get(64) && bitmap.get(129));
        assert_eq!(bitmap.count_set(), 3);

        bitmap.clear(64);
        bitmap.clear(64);
        assert!(!bitmap.get(64));
        assert_eq!(bitmap.count_set(), 2);

        bitmap.clear_all();
        assert_eq!(bitmap.count_set(), 0);
        assert!(!bitmap.get(0));
    }

    #[test]
    fn test_out_of_range_reads_clear() {
        let bitmap = BlockBitmap::new(3);
        assert!(!bitmap.get(3));
        assert!(!bitmap.get(1000));
    }
}
