use std::collections::HashMap;

use crate::glyph_id::GlyphId;

/// Hands out ranges of glyph ids, reusing freed ranges before growing.
///
/// Freed ranges are kept in one pool per range width (pool `n - 1` only holds
/// ranges of exactly `n` ids), so a freed range is only ever reused for an
/// entry of the same width. When the pool for a width is empty, a fresh range
/// is carved off the monotonic `next_id` counter.
///
/// The pool table grows to the widest range ever freed and is never shrunk.
/// Widths are bounded by the sub-variant count of a glyph, so the table stays
/// small in practice; freed ids are likewise never returned to the counter.
pub struct IdAllocator {
    free_by_width: Vec<Vec<GlyphId>>,
    /// range base -> width, for every range currently handed out
    outstanding: HashMap<GlyphId, u32, fxhash::FxBuildHasher>,
    next_id: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            free_by_width: vec![Vec::new()],
            outstanding: HashMap::with_hasher(fxhash::FxBuildHasher::default()),
            // 0 is the "not cached" sentinel
            next_id: 1,
        }
    }

    /// Allocates a range of `count` contiguous ids and returns its base.
    ///
    /// # Panics
    /// When `count` is zero or the 32-bit id space is exhausted.
    pub fn allocate(&mut self, count: u32) -> GlyphId {
        assert!(count > 0, "cannot allocate an empty id range");

        let reused = self
            .free_by_width
            .get_mut(count as usize - 1)
            .and_then(|pool| pool.pop());

        let id = match reused {
            Some(id) => id,
            None => {
                let Some(next_id) = self.next_id.checked_add(count) else {
                    panic!("glyph id space exhausted");
                };
                let Some(id) = GlyphId::new(self.next_id) else {
                    unreachable!("next_id starts at 1 and only grows");
                };
                self.next_id = next_id;
                id
            }
        };

        self.outstanding.insert(id, count);
        id
    }

    /// Returns the range starting at `id` to the pool for `count`.
    ///
    /// # Panics
    /// When the range is not currently allocated, or was allocated with a
    /// different width. Either would let a live id be handed out twice.
    pub fn free(&mut self, id: GlyphId, count: u32) {
        match self.outstanding.remove(&id) {
            Some(width) if width == count => {}
            Some(width) => panic!(
                "id range {} freed with width {count}, but was allocated with width {width}",
                id.get()
            ),
            None => panic!("id range {} freed twice or never allocated", id.get()),
        }

        let index = count as usize - 1;
        if index >= self.free_by_width.len() {
            self.free_by_width.resize_with(index + 1, Vec::new);
        }
        self.free_by_width[index].push(id);
    }

    /// Whether `id` is the base of a range that is currently handed out.
    pub fn is_allocated(&self, id: GlyphId) -> bool {
        self.outstanding.contains_key(&id)
    }

    /// Number of ranges currently handed out.
    pub fn allocated_ranges(&self) -> usize {
        self.outstanding.len()
    }

    /// One past the highest id ever handed out.
    pub fn high_water_mark(&self) -> u32 {
        self.next_id
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_start_at_one_and_advance_by_width() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.allocate(1).get(), 1);
        assert_eq!(alloc.allocate(4).get(), 2);
        assert_eq!(alloc.allocate(1).get(), 6);
        assert_eq!(alloc.high_water_mark(), 7);
    }

    #[test]
    fn freed_range_is_reused_before_counter_moves() {
        let mut alloc = IdAllocator::new();
        let _a = alloc.allocate(2);
        let b = alloc.allocate(2);
        let mark = alloc.high_water_mark();

        alloc.free(b, 2);
        let again = alloc.allocate(2);

        assert_eq!(again, b);
        assert_eq!(alloc.high_water_mark(), mark);
    }

    #[test]
    fn pools_are_separated_by_width() {
        let mut alloc = IdAllocator::new();
        let wide = alloc.allocate(8);
        alloc.free(wide, 8);

        // a narrow request must not take a slice of the freed wide range
        let narrow = alloc.allocate(1);
        assert_eq!(narrow.get(), 9);

        assert_eq!(alloc.allocate(8), wide);
    }

    #[test]
    fn pool_table_grows_on_free_of_unseen_width() {
        let mut alloc = IdAllocator::new();
        let id = alloc.allocate(16);
        alloc.free(id, 16);
        assert_eq!(alloc.free_by_width.len(), 16);
        assert_eq!(alloc.allocate(16), id);
    }

    #[test]
    fn lifo_reuse_within_a_pool() {
        let mut alloc = IdAllocator::new();
        let a = alloc.allocate(1);
        let b = alloc.allocate(1);
        alloc.free(a, 1);
        alloc.free(b, 1);
        assert_eq!(alloc.allocate(1), b);
        assert_eq!(alloc.allocate(1), a);
        assert_eq!(alloc.allocated_ranges(), 2);
    }

    #[test]
    #[should_panic(expected = "freed twice")]
    fn double_free_panics() {
        let mut alloc = IdAllocator::new();
        let a = alloc.allocate(1);
        alloc.free(a, 1);
        alloc.free(a, 1);
    }

    #[test]
    #[should_panic(expected = "allocated with width")]
    fn width_mismatch_panics() {
        let mut alloc = IdAllocator::new();
        let a = alloc.allocate(4);
        alloc.free(a, 2);
    }

    #[test]
    #[should_panic(expected = "empty id range")]
    fn zero_width_panics() {
        IdAllocator::new().allocate(0);
    }
}
