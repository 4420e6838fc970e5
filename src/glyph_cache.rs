mod entry;
mod eviction;
mod upload;

use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::Mutex;

use crate::backend::{GlyphBackend, GlyphSetId, SurfaceId};
use crate::error::{ConfigError, CreateCacheError};
use crate::glyph_id::GlyphId;
use crate::glyph_image::{GlyphHandle, GlyphImage, ResourceType};
use crate::id_allocator::IdAllocator;

pub use entry::CachedGlyph;

use entry::{CacheEntry, GlyphKeyIndex};
use upload::{FreeBatch, GlyphSets, PendingGlyph};

/// Configuration for a [`GlyphCache`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GlyphCacheConfig {
    /// Resident pixels above which cold glyphs are evicted after a batch.
    ///
    /// Glyphs used by the current batch are never evicted, so the cache may
    /// stay above this limit until a later batch releases them.
    pub pixel_budget: usize,
    /// Upload all new glyphs of a type with one backend call.
    ///
    /// Turn off for servers that fail on multi-glyph uploads; every glyph is
    /// then sent on its own.
    pub batch_upload: bool,
}

impl Default for GlyphCacheConfig {
    fn default() -> Self {
        Self {
            pixel_budget: 100_000,
            batch_upload: true,
        }
    }
}

impl GlyphCacheConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pixel_budget == 0 {
            return Err(ConfigError::new("pixel_budget must be greater than zero"));
        }
        Ok(())
    }
}

/// Point-in-time counters of a [`GlyphCache`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheStats {
    pub resident_glyphs: usize,
    pub resident_pixels: usize,
    pub pixel_budget: usize,
    /// Number of batches served so far.
    pub time: u64,
    /// One past the highest glyph id ever handed out.
    pub id_high_water_mark: u32,
}

/// Keeps rasterized glyphs resident on a [`GlyphBackend`].
///
/// Every [`cache_batch`](Self::cache_batch) call resolves the glyphs of one
/// draw call, uploads the ones the backend does not have yet and then evicts
/// the least recently used glyphs while the resident pixel total is over
/// budget. Glyphs of the running batch are never evicted.
///
/// A glyph image is identified by the id the cache stamps into it, never by
/// its handle, so an image may only be registered with one cache at a time.
/// Each stamp carries the tag of the cache that made it; other caches
/// ignore it on disposal.
///
/// All state, the backend included, sits behind one mutex. The rendering
/// thread and the disposal path ([`dispose_glyphs`](Self::dispose_glyphs))
/// can therefore run on different threads.
pub struct GlyphCache<B: GlyphBackend> {
    state: Mutex<CacheState<B>>,
}

impl<B: GlyphBackend> GlyphCache<B> {
    /// Creates the glyph sets on `backend` and an empty cache on top of them.
    ///
    /// `config` is validated first; a rejected config never reaches the backend.
    pub fn new(
        mut backend: B,
        config: GlyphCacheConfig,
    ) -> Result<Self, CreateCacheError<B::Error>> {
        config.validate()?;

        let sets = GlyphSets::create(&mut backend).map_err(CreateCacheError::Backend)?;
        let tag = NEXT_CACHE_TAG.fetch_add(1, Ordering::Relaxed);
        log::debug!(
            "glyph cache {tag} created: grayscale set {}, subpixel set {}, budget {} px",
            sets.grayscale.0,
            sets.subpixel.0,
            config.pixel_budget
        );

        Ok(Self {
            state: Mutex::new(CacheState {
                tag,
                backend,
                config,
                sets,
                index: GlyphKeyIndex::new(),
                ids: IdAllocator::new(),
                time: 0,
            }),
        })
    }

    /// Makes every glyph in `glyphs` resident and returns where each one lives.
    ///
    /// `None` entries and invisible glyphs resolve to `None`. `surface` is only
    /// used for out-of-band images.
    ///
    /// Backend errors are returned as-is. Glyphs the backend did not accept
    /// are dropped again and come back as misses in the next batch.
    pub fn cache_batch(
        &self,
        glyphs: &[Option<GlyphHandle>],
        surface: SurfaceId,
    ) -> Result<Vec<Option<CachedGlyph>>, B::Error> {
        self.state.lock().cache_batch(glyphs, surface)
    }

    /// Forgets glyphs whose images are about to be destroyed and frees them
    /// on the backend.
    ///
    /// Glyphs that are not resident here, including glyphs resident in another
    /// cache, are skipped.
    ///
    /// # Panics
    /// When a glyph carries an id from this cache that has no resident entry.
    pub fn dispose_glyphs(&self, glyphs: &[GlyphHandle]) -> Result<(), B::Error> {
        self.state.lock().dispose(glyphs)
    }

    /// Evicts every glyph and frees it on the backend.
    pub fn clear(&self) -> Result<(), B::Error> {
        self.state.lock().clear()
    }

    /// Looks up a resident glyph without touching its recency.
    pub fn get(&self, image: &GlyphImage) -> Option<CachedGlyph> {
        let state = self.state.lock();
        let (owner, id) = image.stamp_owner()?;
        if owner != state.tag {
            return None;
        }
        state
            .index
            .get(id)
            .filter(|entry| entry.handle == image.handle())
            .map(|entry| entry.cached(state.sets.for_type(entry.resource_type)))
    }

    pub fn glyph_set(&self, resource_type: ResourceType) -> Option<GlyphSetId> {
        self.state.lock().sets.for_type(resource_type)
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.state.lock();
        CacheStats {
            resident_glyphs: state.index.len(),
            resident_pixels: state.index.resident_pixels(),
            pixel_budget: state.config.pixel_budget,
            time: state.time,
            id_high_water_mark: state.ids.high_water_mark(),
        }
    }

    /// Runs `f` with the backend while holding the cache lock.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.state.lock().backend)
    }
}

static NEXT_CACHE_TAG: AtomicU32 = AtomicU32::new(1);

struct CacheState<B: GlyphBackend> {
    /// written into the high half of every stamp this cache makes
    tag: u32,
    backend: B,
    config: GlyphCacheConfig,
    sets: GlyphSets,
    index: GlyphKeyIndex,
    ids: IdAllocator,
    /// virtual time, advanced once per batch
    time: u64,
}

impl<B: GlyphBackend> CacheState<B> {
    fn cache_batch(
        &mut self,
        glyphs: &[Option<GlyphHandle>],
        surface: SurfaceId,
    ) -> Result<Vec<Option<CachedGlyph>>, B::Error> {
        self.time += 1;

        let mut resolved = Vec::with_capacity(glyphs.len());
        let mut touched = Vec::with_capacity(glyphs.len());
        let mut pending = Vec::new();

        for glyph in glyphs {
            let Some(image) = glyph.as_ref().filter(|image| !image.is_invisible()) else {
                resolved.push(None);
                continue;
            };

            let entry = match self.lookup(image) {
                Some(id) => {
                    let Some(entry) = self.index.get_mut(id) else {
                        unreachable!("lookup only returns resident ids");
                    };
                    entry.touch(self.time);
                    entry
                }
                None => {
                    let id = self.register(image);
                    pending.push(PendingGlyph {
                        id,
                        image: GlyphHandle::clone(image),
                    });
                    let Some(entry) = self.index.get_mut(id) else {
                        unreachable!("glyph was registered above");
                    };
                    entry
                }
            };

            touched.push(entry.id);
            resolved.push(Some(entry.cached(self.sets.for_type(entry.resource_type))));
        }

        log::trace!(
            "batch {}: {} glyphs, {} new, {} px resident",
            self.time,
            touched.len(),
            pending.len(),
            self.index.resident_pixels()
        );

        let mut uploaded = Vec::with_capacity(pending.len());
        let result = match self.upload(&pending, surface, &mut uploaded) {
            Ok(()) => self.evict_over_budget(),
            Err(err) => {
                self.discard_unsent(&pending, uploaded);
                Err(err)
            }
        };

        for id in touched {
            if let Some(entry) = self.index.get_mut(id) {
                entry.pinned = false;
            }
        }

        result.map(|()| resolved)
    }

    /// Resolves an image to its resident id through the stamped side slot.
    fn lookup(&self, image: &GlyphImage) -> Option<GlyphId> {
        let (owner, id) = image.stamp_owner()?;
        if owner != self.tag {
            panic!(
                "glyph {:#x} is already resident in glyph cache {owner}",
                image.handle()
            );
        }
        match self.index.get(id) {
            Some(entry) if entry.handle == image.handle() => Some(id),
            Some(entry) => panic!(
                "glyph {:#x} is stamped with id {} which belongs to glyph {:#x}",
                image.handle(),
                id.get(),
                entry.handle
            ),
            None => panic!(
                "glyph {:#x} is stamped with id {} which is not resident",
                image.handle(),
                id.get()
            ),
        }
    }

    fn register(&mut self, image: &GlyphHandle) -> GlyphId {
        let id = self.ids.allocate(image.slot_count());
        image.stamp(self.tag, id);
        self.index.insert(CacheEntry::new(image, id, self.time));
        id
    }

    fn upload(
        &mut self,
        pending: &[PendingGlyph],
        surface: SurfaceId,
        uploaded: &mut Vec<GlyphId>,
    ) -> Result<(), B::Error> {
        if pending.is_empty() {
            return Ok(());
        }
        upload::upload_glyphs(
            &mut self.backend,
            &self.sets,
            self.config.batch_upload,
            pending,
            surface,
            uploaded,
        )
    }

    /// Drops glyphs of a failed upload that never reached the backend.
    fn discard_unsent(&mut self, pending: &[PendingGlyph], mut uploaded: Vec<GlyphId>) {
        uploaded.sort_unstable();
        let mut discarded = 0;
        for glyph in pending {
            if uploaded.binary_search(&glyph.id).is_ok() {
                continue;
            }
            let entry = self.unindex(glyph.id);
            self.ids.free(entry.id, entry.slot_count);
            discarded += 1;
        }
        log::debug!("upload failed, dropped {discarded} glyphs the backend never received");
    }

    fn evict_over_budget(&mut self) -> Result<(), B::Error> {
        let budget = self.config.pixel_budget;
        if self.index.resident_pixels() <= budget {
            return Ok(());
        }

        let mut batch = FreeBatch::default();
        for id in eviction::select_victims(&self.index, budget) {
            let entry = self.unindex(id);
            batch.push(&entry);
        }

        log::debug!(
            "evicted {} glyphs ({} px), {} px resident",
            batch.entries(),
            batch.pixels(),
            self.index.resident_pixels()
        );
        if self.index.resident_pixels() > budget {
            log::warn!(
                "glyph cache still over budget after eviction: {} > {} px, remaining glyphs are in use",
                self.index.resident_pixels(),
                budget
            );
        }

        self.submit_frees(batch)
    }

    fn dispose(&mut self, glyphs: &[GlyphHandle]) -> Result<(), B::Error> {
        let mut batch = FreeBatch::default();
        for image in glyphs {
            let Some((owner, id)) = image.stamp_owner() else {
                continue;
            };
            if owner != self.tag {
                continue;
            }
            match self.index.get(id) {
                Some(entry) if entry.handle == image.handle() => {}
                Some(entry) => panic!(
                    "disposed glyph {:#x} is stamped with id {} which belongs to glyph {:#x}",
                    image.handle(),
                    id.get(),
                    entry.handle
                ),
                None => panic!(
                    "disposed glyph {:#x} is stamped with id {} which is not resident",
                    image.handle(),
                    id.get()
                ),
            }
            let entry = self.unindex(id);
            batch.push(&entry);
        }

        if batch.is_empty() {
            return Ok(());
        }
        log::debug!(
            "disposed {} glyphs ({} px), {} px resident",
            batch.entries(),
            batch.pixels(),
            self.index.resident_pixels()
        );
        self.submit_frees(batch)
    }

    fn clear(&mut self) -> Result<(), B::Error> {
        let mut batch = FreeBatch::default();
        for id in self.index.ids() {
            let entry = self.unindex(id);
            batch.push(&entry);
        }
        log::debug!("cleared {} glyphs", batch.entries());
        self.submit_frees(batch)
    }

    /// Drops the entry and clears its image's side slot. The ids stay
    /// allocated until the caller hands them back.
    fn unindex(&mut self, id: GlyphId) -> CacheEntry {
        let Some(entry) = self.index.remove(id) else {
            panic!("glyph id {} released but not resident", id.get());
        };
        if let Some(image) = entry.image.upgrade() {
            image.unstamp(self.tag, id);
        }
        entry
    }

    /// Frees `batch` on the backend, then returns its ids to the allocator.
    ///
    /// If the backend fails the ids stay allocated for good, so they are never
    /// handed to a new glyph while the backend may still hold the old one.
    fn submit_frees(&mut self, batch: FreeBatch) -> Result<(), B::Error> {
        if batch.is_empty() {
            return Ok(());
        }
        if let Err(err) = batch.submit(&mut self.backend, &self.sets) {
            log::error!(
                "backend failed to free {} glyphs, retiring their ids",
                batch.entries()
            );
            return Err(err);
        }
        for &(id, slot_count) in batch.ranges() {
            self.ids.free(id, slot_count);
        }
        Ok(())
    }
}
