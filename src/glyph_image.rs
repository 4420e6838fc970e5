use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use euclid::default::{Point2D, Size2D, Vector2D};

use crate::glyph_id::GlyphId;

/// Shared handle to a rasterized glyph image.
///
/// The rasterizer owns the image; the cache only reads it and stamps its
/// [`GlyphId`] into the image's side slot.
pub type GlyphHandle = Arc<GlyphImage>;

/// How a glyph is stored on the backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceType {
    /// 8-bit coverage, kept in the A8 glyph set.
    Grayscale,
    /// Per-channel (LCD) coverage, kept in the ARGB32 glyph set.
    Subpixel,
    /// Full-color images which do not fit the glyph set model and are handed
    /// to the backend as plain images.
    OutOfBand,
}

impl ResourceType {
    /// Bytes per pixel of the source payload.
    pub const fn source_bytes_per_pixel(self) -> usize {
        match self {
            Self::Grayscale => 1,
            Self::Subpixel => 3,
            Self::OutOfBand => 4,
        }
    }
}

/// Placement metrics of a glyph image.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphMetrics {
    /// Offset from the pen position to the top-left pixel, y pointing down.
    pub origin: Point2D<f32>,
    /// Size of one variant in pixels.
    pub size: Size2D<u32>,
    /// Pen advance after drawing this glyph.
    pub advance: Vector2D<f32>,
}

impl GlyphMetrics {
    pub fn new(origin: Point2D<f32>, size: Size2D<u32>, advance: Vector2D<f32>) -> Self {
        Self {
            origin,
            size,
            advance,
        }
    }

    pub fn width(&self) -> usize {
        self.size.width as usize
    }

    pub fn height(&self) -> usize {
        self.size.height as usize
    }

    pub fn area(&self) -> usize {
        self.width() * self.height()
    }
}

/// A rasterized glyph bitmap together with the cache side slot.
///
/// The payload holds `subpixel_resolution.0 * subpixel_resolution.1` variants
/// stored one after another, each `width * height` pixels in the layout
/// given by [`ResourceType::source_bytes_per_pixel`].
#[derive(Debug)]
pub struct GlyphImage {
    handle: u64,
    resource_type: ResourceType,
    metrics: GlyphMetrics,
    subpixel_resolution: (u8, u8),
    pixels: Vec<u8>,
    /// `0` while the glyph is not resident, otherwise the owning cache's tag
    /// in the high half and the glyph id in the low half.
    cache_slot: AtomicU64,
}

impl GlyphImage {
    /// # Panics
    /// When `pixels` does not hold exactly one variant of `metrics.size`.
    pub fn new(
        handle: u64,
        resource_type: ResourceType,
        metrics: GlyphMetrics,
        pixels: Vec<u8>,
    ) -> Self {
        Self::with_subpixel_resolution(handle, resource_type, metrics, (1, 1), pixels)
    }

    /// Creates an image carrying `resolution.0 * resolution.1` subpixel-phase variants.
    ///
    /// # Panics
    /// When a resolution axis is zero, or `pixels` does not hold exactly the
    /// declared number of variants.
    pub fn with_subpixel_resolution(
        handle: u64,
        resource_type: ResourceType,
        metrics: GlyphMetrics,
        resolution: (u8, u8),
        pixels: Vec<u8>,
    ) -> Self {
        assert!(
            resolution.0 > 0 && resolution.1 > 0,
            "subpixel resolution must be at least 1x1"
        );

        let variants = resolution.0 as usize * resolution.1 as usize;
        let expected = metrics.area() * resource_type.source_bytes_per_pixel() * variants;
        assert_eq!(
            pixels.len(),
            expected,
            "glyph {handle:#x}: payload is {} bytes, expected {expected}",
            pixels.len()
        );

        Self {
            handle,
            resource_type,
            metrics,
            subpixel_resolution: resolution,
            pixels,
            cache_slot: AtomicU64::new(0),
        }
    }

    /// A glyph with nothing to draw (e.g. a space). Never cached.
    pub fn invisible(handle: u64, advance: Vector2D<f32>) -> Self {
        let metrics = GlyphMetrics::new(Point2D::zero(), Size2D::zero(), advance);
        Self::new(handle, ResourceType::Grayscale, metrics, Vec::new())
    }

    /// Builds a grayscale glyph from `fontdue` rasterizer output.
    #[cfg(feature = "fontdue")]
    pub fn from_fontdue(handle: u64, metrics: &fontdue::Metrics, coverage: Vec<u8>) -> Self {
        let height = metrics.height as f32;
        let metrics = GlyphMetrics::new(
            Point2D::new(metrics.xmin as f32, -(metrics.ymin as f32 + height)),
            Size2D::new(metrics.width as u32, metrics.height as u32),
            Vector2D::new(metrics.advance_width, metrics.advance_height),
        );
        Self::new(handle, ResourceType::Grayscale, metrics, coverage)
    }
}

impl GlyphImage {
    /// The opaque handle the rasterizer identifies this image by.
    pub fn handle(&self) -> u64 {
        self.handle
    }

    pub fn resource_type(&self) -> ResourceType {
        self.resource_type
    }

    pub fn metrics(&self) -> &GlyphMetrics {
        &self.metrics
    }

    pub fn subpixel_resolution(&self) -> (u8, u8) {
        self.subpixel_resolution
    }

    /// Number of ids the glyph consumes, one per subpixel variant.
    pub fn slot_count(&self) -> u32 {
        self.subpixel_resolution.0 as u32 * self.subpixel_resolution.1 as u32
    }

    /// Cost of keeping this glyph resident.
    pub fn pixel_count(&self) -> usize {
        self.metrics.area() * self.slot_count() as usize
    }

    pub fn is_invisible(&self) -> bool {
        self.metrics.area() == 0
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Source payload of a single subpixel variant.
    pub fn variant_pixels(&self, variant: u32) -> &[u8] {
        let len = self.metrics.area() * self.resource_type.source_bytes_per_pixel();
        let start = variant as usize * len;
        &self.pixels[start..start + len]
    }

    /// The id stamped by the cache, or `None` while the glyph is not resident.
    pub fn cache_id(&self) -> Option<GlyphId> {
        self.stamp_owner().map(|(_, id)| id)
    }

    /// Tag of the cache holding this glyph, and the id it handed out.
    pub(crate) fn stamp_owner(&self) -> Option<(u32, GlyphId)> {
        let slot = self.cache_slot.load(Ordering::Acquire);
        GlyphId::new(slot as u32).map(|id| ((slot >> 32) as u32, id))
    }

    pub(crate) fn stamp(&self, owner: u32, id: GlyphId) {
        self.cache_slot.store(pack(owner, id), Ordering::Release);
    }

    /// Clears the slot if it still holds `id` from `owner`.
    pub(crate) fn unstamp(&self, owner: u32, id: GlyphId) -> bool {
        self.cache_slot
            .compare_exchange(pack(owner, id), 0, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

fn pack(owner: u32, id: GlyphId) -> u64 {
    (u64::from(owner) << 32) | u64::from(id.get())
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn metrics(width: u32, height: u32) -> GlyphMetrics {
        GlyphMetrics::new(
            Point2D::new(0.0, -(height as f32)),
            Size2D::new(width, height),
            Vector2D::new(width as f32, 0.0),
        )
    }

    #[test]
    fn slot_count_and_cost_include_every_variant() {
        let image = GlyphImage::with_subpixel_resolution(
            1,
            ResourceType::Grayscale,
            metrics(3, 2),
            (4, 2),
            vec![0; 6 * 8],
        );
        assert_eq!(image.slot_count(), 8);
        assert_eq!(image.pixel_count(), 48);
        assert_eq!(image.variant_pixels(7).len(), 6);
    }

    #[test]
    fn variants_are_stored_back_to_back() {
        let image = GlyphImage::with_subpixel_resolution(
            1,
            ResourceType::Grayscale,
            metrics(2, 1),
            (2, 1),
            vec![1, 2, 3, 4],
        );
        assert_eq!(image.variant_pixels(0), &[1, 2]);
        assert_eq!(image.variant_pixels(1), &[3, 4]);
    }

    #[test]
    fn side_slot_starts_empty_and_round_trips() {
        let image = GlyphImage::new(9, ResourceType::Subpixel, metrics(1, 1), vec![0; 3]);
        assert_eq!(image.cache_id(), None);

        let id = GlyphId::new(42).unwrap();
        image.stamp(7, id);
        assert_eq!(image.cache_id(), Some(id));
        assert_eq!(image.stamp_owner(), Some((7, id)));

        // another cache cannot clear it
        assert!(!image.unstamp(8, id));
        assert!(image.unstamp(7, id));
        assert_eq!(image.cache_id(), None);
    }

    #[test]
    fn invisible_glyph_has_no_pixels() {
        let image = GlyphImage::invisible(5, Vector2D::new(4.0, 0.0));
        assert!(image.is_invisible());
        assert_eq!(image.pixel_count(), 0);
    }

    #[test]
    #[should_panic(expected = "payload is 3 bytes")]
    fn payload_size_is_checked() {
        GlyphImage::new(1, ResourceType::OutOfBand, metrics(1, 1), vec![0; 3]);
    }

    #[cfg(feature = "fontdue")]
    #[test]
    fn fontdue_metrics_are_converted() {
        let fd = fontdue::Metrics {
            xmin: 1,
            ymin: -2,
            width: 4,
            height: 5,
            advance_width: 6.0,
            ..Default::default()
        };
        let image = GlyphImage::from_fontdue(3, &fd, vec![0; 20]);
        assert_eq!(image.resource_type(), ResourceType::Grayscale);
        assert_eq!(image.metrics().origin, Point2D::new(1.0, -3.0));
        assert_eq!(image.metrics().size, Size2D::new(4, 5));
        assert_eq!(image.metrics().advance.x, 6.0);
    }
}
