use crate::glyph_image::GlyphMetrics;

/// Backend-side glyph set handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct GlyphSetId(pub u32);

/// Caller-supplied drawable that out-of-band images are associated with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u32);

/// Pixel format of a glyph set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GlyphSetFormat {
    /// One coverage byte per pixel, rows padded to 4 bytes.
    A8,
    /// One little-endian BGRA word per pixel.
    Argb32,
}

impl GlyphSetFormat {
    pub const fn bytes_per_pixel(self) -> usize {
        match self {
            Self::A8 => 1,
            Self::Argb32 => 4,
        }
    }

    /// Length of one row in the upload stream.
    pub const fn stride(self, width: usize) -> usize {
        match self {
            Self::A8 => (width + 3) & !3,
            Self::Argb32 => width * 4,
        }
    }
}

/// Per-id header accompanying a glyph set upload.
///
/// Headers appear in the same order as their pixels in the upload stream.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GlyphInfo {
    pub id: u32,
    pub metrics: GlyphMetrics,
}

/// A full-color glyph handed to the backend outside of any glyph set.
#[derive(Clone, Copy, Debug)]
pub struct OutOfBandImage<'a> {
    /// Source handle, later used to free the image.
    pub handle: u64,
    pub metrics: GlyphMetrics,
    /// Premultiplied BGRA, `metrics.size` pixels per variant.
    pub pixels: &'a [u8],
}

/// The rendering backend the cache keeps glyphs resident on.
///
/// All calls are synchronous from the cache's point of view. Errors are
/// passed through to the caller of the cache operation unchanged.
pub trait GlyphBackend {
    type Error;

    /// Creates a glyph set. Called once per format when the cache is built.
    fn create_glyph_set(&mut self, format: GlyphSetFormat) -> Result<GlyphSetId, Self::Error>;

    /// Adds the glyphs described by `glyphs` to `set`.
    ///
    /// `pixels` is the concatenation of every glyph's rows in the set format.
    fn add_glyphs(
        &mut self,
        set: GlyphSetId,
        glyphs: &[GlyphInfo],
        pixels: &[u8],
    ) -> Result<(), Self::Error>;

    fn free_glyphs(&mut self, set: GlyphSetId, ids: &[u32]) -> Result<(), Self::Error>;

    fn add_out_of_band_images(
        &mut self,
        surface: SurfaceId,
        images: &[OutOfBandImage<'_>],
    ) -> Result<(), Self::Error>;

    fn free_out_of_band_images(&mut self, handles: &[u64]) -> Result<(), Self::Error>;
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a8_rows_are_padded_to_four_bytes() {
        assert_eq!(GlyphSetFormat::A8.stride(1), 4);
        assert_eq!(GlyphSetFormat::A8.stride(4), 4);
        assert_eq!(GlyphSetFormat::A8.stride(5), 8);
        assert_eq!(GlyphSetFormat::Argb32.stride(5), 20);
    }
}
