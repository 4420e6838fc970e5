use std::num::NonZeroU32;

/// Identifier assigned by a [`GlyphCache`](crate::GlyphCache) to a resident glyph.
///
/// An entry with several sub-variants owns the contiguous range
/// `id..id + slot_count`; `GlyphId` is always the base of that range.
///
/// Ids are only meaningful while the glyph is resident. The same glyph is not
/// guaranteed to receive the same `GlyphId` after it was evicted or disposed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GlyphId(NonZeroU32);

impl GlyphId {
    /// Returns `None` for the "not cached" sentinel `0`.
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    pub const fn get(self) -> u32 {
        self.0.get()
    }

    /// Every raw id in the range starting at this id.
    pub fn range(self, slot_count: u32) -> impl Iterator<Item = u32> {
        let base = self.get();
        base..base + slot_count
    }
}

impl From<GlyphId> for u32 {
    fn from(id: GlyphId) -> Self {
        id.get()
    }
}
