use std::collections::HashMap;
use std::sync::{Arc, Weak};

use crate::backend::GlyphSetId;
use crate::glyph_id::GlyphId;
use crate::glyph_image::{GlyphHandle, GlyphImage, GlyphMetrics, ResourceType};

/// A glyph resident in the cache, as returned from
/// [`GlyphCache::cache_batch`](super::GlyphCache::cache_batch).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CachedGlyph {
    /// Base of the id range. For glyph set types, `id + variant` is the
    /// backend glyph id of each subpixel variant.
    pub id: GlyphId,
    pub slot_count: u32,
    pub resource_type: ResourceType,
    /// The set the glyph lives in; `None` for out-of-band images.
    pub glyph_set: Option<GlyphSetId>,
    pub metrics: GlyphMetrics,
}

pub(super) struct CacheEntry {
    /// Weak so the cache never extends the life of a rasterizer image.
    pub image: Weak<GlyphImage>,
    pub handle: u64,
    pub id: GlyphId,
    pub resource_type: ResourceType,
    pub metrics: GlyphMetrics,
    pub slot_count: u32,
    pub pixel_count: usize,
    pub last_used: u64,
    pub pinned: bool,
}

impl CacheEntry {
    /// A freshly registered entry, pinned for the batch that created it.
    pub fn new(image: &GlyphHandle, id: GlyphId, now: u64) -> Self {
        Self {
            image: Arc::downgrade(image),
            handle: image.handle(),
            id,
            resource_type: image.resource_type(),
            metrics: *image.metrics(),
            slot_count: image.slot_count(),
            pixel_count: image.pixel_count(),
            last_used: now,
            pinned: true,
        }
    }

    pub fn touch(&mut self, now: u64) {
        self.last_used = now;
        self.pinned = true;
    }

    pub fn cached(&self, glyph_set: Option<GlyphSetId>) -> CachedGlyph {
        CachedGlyph {
            id: self.id,
            slot_count: self.slot_count,
            resource_type: self.resource_type,
            glyph_set,
            metrics: self.metrics,
        }
    }
}

/// Resident entries keyed by the id stamped into their image, plus the
/// running pixel total charged against the budget.
pub(super) struct GlyphKeyIndex {
    entries: HashMap<GlyphId, CacheEntry, fxhash::FxBuildHasher>,
    resident_pixels: usize,
}

impl GlyphKeyIndex {
    pub fn new() -> Self {
        Self {
            entries: HashMap::with_capacity_and_hasher(256, fxhash::FxBuildHasher::default()),
            resident_pixels: 0,
        }
    }

    pub fn insert(&mut self, entry: CacheEntry) {
        let id = entry.id;
        self.resident_pixels += entry.pixel_count;
        if self.entries.insert(id, entry).is_some() {
            panic!("glyph id {} is already resident", id.get());
        }
    }

    pub fn remove(&mut self, id: GlyphId) -> Option<CacheEntry> {
        let entry = self.entries.remove(&id)?;
        self.resident_pixels -= entry.pixel_count;
        Some(entry)
    }

    pub fn get(&self, id: GlyphId) -> Option<&CacheEntry> {
        self.entries.get(&id)
    }

    pub fn get_mut(&mut self, id: GlyphId) -> Option<&mut CacheEntry> {
        self.entries.get_mut(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CacheEntry> {
        self.entries.values()
    }

    pub fn ids(&self) -> Vec<GlyphId> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn resident_pixels(&self) -> usize {
        self.resident_pixels
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use euclid::default::{Point2D, Size2D, Vector2D};

    use super::*;

    fn image(handle: u64, width: u32, height: u32) -> GlyphHandle {
        let metrics = GlyphMetrics::new(
            Point2D::zero(),
            Size2D::new(width, height),
            Vector2D::zero(),
        );
        let len = (width * height) as usize;
        Arc::new(GlyphImage::new(
            handle,
            ResourceType::Grayscale,
            metrics,
            vec![0; len],
        ))
    }

    #[test]
    fn pixel_total_follows_inserts_and_removes() {
        let mut index = GlyphKeyIndex::new();
        let a = image(1, 4, 4);
        let b = image(2, 2, 3);
        let id_a = GlyphId::new(1).unwrap();
        let id_b = GlyphId::new(2).unwrap();

        index.insert(CacheEntry::new(&a, id_a, 1));
        index.insert(CacheEntry::new(&b, id_b, 1));
        assert_eq!(index.resident_pixels(), 22);
        assert_eq!(index.len(), 2);

        let removed = index.remove(id_a).unwrap();
        assert_eq!(removed.handle, 1);
        assert_eq!(index.resident_pixels(), 6);
        assert!(index.remove(id_a).is_none());
        assert!(index.get(id_b).is_some());
    }

    #[test]
    fn entry_does_not_keep_image_alive() {
        let a = image(1, 1, 1);
        let entry = CacheEntry::new(&a, GlyphId::new(1).unwrap(), 1);
        drop(a);
        assert!(entry.image.upgrade().is_none());
    }

    #[test]
    #[should_panic(expected = "already resident")]
    fn duplicate_id_panics() {
        let mut index = GlyphKeyIndex::new();
        let a = image(1, 1, 1);
        let id = GlyphId::new(1).unwrap();
        index.insert(CacheEntry::new(&a, id, 1));
        index.insert(CacheEntry::new(&a, id, 1));
    }
}
