use crate::glyph_id::GlyphId;

use super::entry::GlyphKeyIndex;

/// Picks the entries to evict so the resident total drops to `budget`.
///
/// Pinned entries are never picked. The rest are visited least recently used
/// first; entries touched in the same batch share a timestamp and are visited
/// in ascending id order. Picking stops as soon as the deficit is covered, so
/// the result may leave the cache over budget when too much of it is pinned.
pub(super) fn select_victims(index: &GlyphKeyIndex, budget: usize) -> Vec<GlyphId> {
    let mut deficit = index.resident_pixels().saturating_sub(budget);
    if deficit == 0 {
        return Vec::new();
    }

    let mut candidates: Vec<_> = index
        .iter()
        .filter(|entry| !entry.pinned)
        .map(|entry| (entry.last_used, entry.id, entry.pixel_count))
        .collect();
    candidates.sort_unstable_by_key(|&(last_used, id, _)| (last_used, id));

    let mut victims = Vec::new();
    for (_, id, pixel_count) in candidates {
        if deficit == 0 {
            break;
        }
        victims.push(id);
        deficit = deficit.saturating_sub(pixel_count);
    }

    victims
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use euclid::default::{Point2D, Size2D, Vector2D};

    use super::*;
    use crate::glyph_cache::entry::CacheEntry;
    use crate::glyph_image::{GlyphImage, GlyphMetrics, ResourceType};

    /// Inserts an entry of `pixels` cost (as a `pixels x 1` image).
    fn insert(index: &mut GlyphKeyIndex, raw_id: u32, pixels: u32, last_used: u64, pinned: bool) {
        let metrics = GlyphMetrics::new(Point2D::zero(), Size2D::new(pixels, 1), Vector2D::zero());
        let image = Arc::new(GlyphImage::new(
            raw_id as u64,
            ResourceType::Grayscale,
            metrics,
            vec![0; pixels as usize],
        ));
        let mut entry = CacheEntry::new(&image, GlyphId::new(raw_id).unwrap(), last_used);
        entry.pinned = pinned;
        index.insert(entry);
    }

    fn raw(ids: Vec<GlyphId>) -> Vec<u32> {
        ids.into_iter().map(GlyphId::get).collect()
    }

    #[test]
    fn nothing_to_do_within_budget() {
        let mut index = GlyphKeyIndex::new();
        insert(&mut index, 1, 50, 1, false);
        assert!(select_victims(&index, 50).is_empty());
    }

    #[test]
    fn oldest_entries_go_first() {
        let mut index = GlyphKeyIndex::new();
        insert(&mut index, 1, 10, 3, false);
        insert(&mut index, 2, 10, 1, false);
        insert(&mut index, 3, 10, 2, false);

        assert_eq!(raw(select_victims(&index, 20)), vec![2]);
        assert_eq!(raw(select_victims(&index, 10)), vec![2, 3]);
    }

    #[test]
    fn ties_are_broken_by_id() {
        let mut index = GlyphKeyIndex::new();
        insert(&mut index, 9, 10, 1, false);
        insert(&mut index, 4, 10, 1, false);
        insert(&mut index, 6, 10, 1, false);

        assert_eq!(raw(select_victims(&index, 10)), vec![4, 6]);
    }

    #[test]
    fn pinned_entries_are_skipped_even_when_coldest() {
        let mut index = GlyphKeyIndex::new();
        insert(&mut index, 1, 30, 1, true);
        insert(&mut index, 2, 30, 2, false);

        assert_eq!(raw(select_victims(&index, 40)), vec![2]);
    }

    #[test]
    fn all_pinned_leaves_budget_exceeded() {
        let mut index = GlyphKeyIndex::new();
        insert(&mut index, 1, 40, 1, true);
        insert(&mut index, 2, 40, 1, true);
        insert(&mut index, 3, 40, 1, true);

        assert!(select_victims(&index, 100).is_empty());
    }

    #[test]
    fn one_large_entry_can_cover_the_deficit() {
        let mut index = GlyphKeyIndex::new();
        insert(&mut index, 1, 80, 1, false);
        insert(&mut index, 2, 5, 2, false);

        assert_eq!(raw(select_victims(&index, 10)), vec![1]);
    }
}
