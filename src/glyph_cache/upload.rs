use crate::backend::{
    GlyphBackend, GlyphInfo, GlyphSetFormat, GlyphSetId, OutOfBandImage, SurfaceId,
};
use crate::glyph_id::GlyphId;
use crate::glyph_image::{GlyphHandle, ResourceType};

use super::entry::CacheEntry;

/// The glyph sets created for a cache, one per set-backed resource type.
#[derive(Clone, Copy, Debug)]
pub(super) struct GlyphSets {
    pub grayscale: GlyphSetId,
    pub subpixel: GlyphSetId,
}

impl GlyphSets {
    pub fn create<B: GlyphBackend>(backend: &mut B) -> Result<Self, B::Error> {
        Ok(Self {
            grayscale: backend.create_glyph_set(GlyphSetFormat::A8)?,
            subpixel: backend.create_glyph_set(GlyphSetFormat::Argb32)?,
        })
    }

    pub fn for_type(&self, resource_type: ResourceType) -> Option<GlyphSetId> {
        match resource_type {
            ResourceType::Grayscale => Some(self.grayscale),
            ResourceType::Subpixel => Some(self.subpixel),
            ResourceType::OutOfBand => None,
        }
    }
}

/// A glyph registered in the current batch and waiting for upload.
pub(super) struct PendingGlyph {
    pub id: GlyphId,
    pub image: GlyphHandle,
}

/// Uploads newly registered glyphs, one backend call per resource type.
///
/// With `batch_upload` off, every set-backed glyph gets its own call instead;
/// some servers cannot take more than one glyph per request.
///
/// Ids of the glyphs the backend accepted are appended to `uploaded`, also
/// when a later call fails.
pub(super) fn upload_glyphs<B: GlyphBackend>(
    backend: &mut B,
    sets: &GlyphSets,
    batch_upload: bool,
    pending: &[PendingGlyph],
    surface: SurfaceId,
    uploaded: &mut Vec<GlyphId>,
) -> Result<(), B::Error> {
    let mut grayscale = Vec::new();
    let mut subpixel = Vec::new();
    let mut out_of_band = Vec::new();

    for glyph in pending {
        match glyph.image.resource_type() {
            ResourceType::Grayscale => grayscale.push(glyph),
            ResourceType::Subpixel => subpixel.push(glyph),
            ResourceType::OutOfBand => out_of_band.push(glyph),
        }
    }

    upload_to_set(backend, sets.grayscale, GlyphSetFormat::A8, &grayscale, batch_upload, uploaded)?;
    upload_to_set(backend, sets.subpixel, GlyphSetFormat::Argb32, &subpixel, batch_upload, uploaded)?;

    if !out_of_band.is_empty() {
        let images: Vec<_> = out_of_band
            .iter()
            .map(|glyph| OutOfBandImage {
                handle: glyph.image.handle(),
                metrics: *glyph.image.metrics(),
                pixels: glyph.image.pixels(),
            })
            .collect();
        log::debug!("uploading {} out-of-band glyph images", images.len());
        backend.add_out_of_band_images(surface, &images)?;
        uploaded.extend(out_of_band.iter().map(|glyph| glyph.id));
    }

    Ok(())
}

fn upload_to_set<B: GlyphBackend>(
    backend: &mut B,
    set: GlyphSetId,
    format: GlyphSetFormat,
    glyphs: &[&PendingGlyph],
    batch_upload: bool,
    uploaded: &mut Vec<GlyphId>,
) -> Result<(), B::Error> {
    if glyphs.is_empty() {
        return Ok(());
    }

    if batch_upload {
        let (infos, pixels) = glyph_stream(format, glyphs);
        log::debug!(
            "uploading {} glyphs ({} bytes) to {format:?} set {}",
            infos.len(),
            pixels.len(),
            set.0
        );
        backend.add_glyphs(set, &infos, &pixels)?;
        uploaded.extend(glyphs.iter().map(|glyph| glyph.id));
    } else {
        for glyph in glyphs {
            let (infos, pixels) = glyph_stream(format, std::slice::from_ref(glyph));
            backend.add_glyphs(set, &infos, &pixels)?;
            uploaded.push(glyph.id);
        }
    }
    Ok(())
}

/// Serializes glyphs into the backend stream for `format`.
///
/// Each subpixel variant becomes its own backend glyph with id `base + variant`.
pub(super) fn glyph_stream(
    format: GlyphSetFormat,
    glyphs: &[&PendingGlyph],
) -> (Vec<GlyphInfo>, Vec<u8>) {
    let capacity = glyphs
        .iter()
        .map(|glyph| {
            let metrics = glyph.image.metrics();
            format.stride(metrics.width()) * metrics.height() * glyph.image.slot_count() as usize
        })
        .sum();

    let mut infos = Vec::with_capacity(glyphs.len());
    let mut pixels = Vec::with_capacity(capacity);

    for glyph in glyphs {
        let image = &glyph.image;
        let metrics = *image.metrics();
        for (variant, id) in glyph.id.range(image.slot_count()).enumerate() {
            infos.push(GlyphInfo { id, metrics });
            write_variant(
                format,
                metrics.width(),
                image.variant_pixels(variant as u32),
                &mut pixels,
            );
        }
    }

    (infos, pixels)
}

fn write_variant(format: GlyphSetFormat, width: usize, src: &[u8], out: &mut Vec<u8>) {
    match format {
        GlyphSetFormat::A8 => {
            let padding = format.stride(width) - width;
            for row in src.chunks_exact(width) {
                out.extend_from_slice(row);
                out.resize(out.len() + padding, 0);
            }
        }
        GlyphSetFormat::Argb32 => {
            // RGB coverage -> BGRA
            let words: Vec<[u8; 4]> = src
                .chunks_exact(3)
                .map(|rgb| [rgb[2], rgb[1], rgb[0], 0xff])
                .collect();
            out.extend_from_slice(bytemuck::cast_slice(&words));
        }
    }
}

/// Ids and handles released in one eviction or disposal pass, grouped so each
/// resource type is freed with a single backend call.
#[derive(Default)]
pub(super) struct FreeBatch {
    grayscale: Vec<u32>,
    subpixel: Vec<u32>,
    out_of_band: Vec<u64>,
    /// allocator ranges to return once the backend has freed them
    ranges: Vec<(GlyphId, u32)>,
    pixels: usize,
}

impl FreeBatch {
    pub fn push(&mut self, entry: &CacheEntry) {
        match entry.resource_type {
            ResourceType::Grayscale => self.grayscale.extend(entry.id.range(entry.slot_count)),
            ResourceType::Subpixel => self.subpixel.extend(entry.id.range(entry.slot_count)),
            ResourceType::OutOfBand => self.out_of_band.push(entry.handle),
        }
        self.ranges.push((entry.id, entry.slot_count));
        self.pixels += entry.pixel_count;
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    pub fn entries(&self) -> usize {
        self.ranges.len()
    }

    pub fn ranges(&self) -> &[(GlyphId, u32)] {
        &self.ranges
    }

    pub fn pixels(&self) -> usize {
        self.pixels
    }

    pub fn submit<B: GlyphBackend>(&self, backend: &mut B, sets: &GlyphSets) -> Result<(), B::Error> {
        if !self.grayscale.is_empty() {
            backend.free_glyphs(sets.grayscale, &self.grayscale)?;
        }
        if !self.subpixel.is_empty() {
            backend.free_glyphs(sets.subpixel, &self.subpixel)?;
        }
        if !self.out_of_band.is_empty() {
            backend.free_out_of_band_images(&self.out_of_band)?;
        }
        Ok(())
    }
}
