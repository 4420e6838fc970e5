//! # glyphset-cache
//!
//! Keeps rasterized glyph images resident on a glyph-set rendering backend
//! (XRender-style), so unchanged glyphs are not uploaded again every frame.
//!
//! ## Overview
//!
//! The core of the crate is the [`GlyphCache`]. For every draw call the
//! renderer hands it the glyph images it is about to draw; the cache
//!
//! 1. resolves each image through the id stamped into it on first sight,
//! 2. uploads images it has not seen yet, one backend call per glyph set,
//! 3. evicts the least recently used glyphs once a pixel budget is exceeded,
//!    never touching glyphs of the running draw call.
//!
//! When the rasterizer destroys glyph images it tells the cache through a
//! [`DisposalNotifier`], and the cache frees them on the backend.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use glyphset_cache::{DisposalNotifier, GlyphBackend, GlyphCache, GlyphCacheConfig, SurfaceId};
//!
//! fn draw<B: GlyphBackend + Send + 'static>(backend: B, glyphs: &[Option<glyphset_cache::GlyphHandle>])
//! where
//!     B::Error: std::fmt::Debug,
//! {
//!     let notifier = DisposalNotifier::new();
//!     let Ok(cache) = GlyphCache::new(backend, GlyphCacheConfig::default()) else {
//!         return;
//!     };
//!     let cache = Arc::new(cache);
//!     notifier.register(&cache);
//!
//!     // once per draw call
//!     let _placed = cache.cache_batch(glyphs, SurfaceId(1));
//! }
//! ```
//!
//! ## Features
//!
//! *   **fontdue** (default): build glyph images straight from `fontdue` rasterizer output.

pub mod backend;
pub mod disposal;
pub mod error;
pub mod glyph_cache;
pub mod glyph_id;
pub mod glyph_image;
pub mod id_allocator;

// common re-exports
pub use backend::{GlyphBackend, GlyphInfo, GlyphSetFormat, GlyphSetId, OutOfBandImage, SurfaceId};
pub use disposal::{DisposalNotifier, GlyphDisposedListener};
pub use error::{ConfigError, CreateCacheError};
pub use glyph_cache::{CacheStats, CachedGlyph, GlyphCache, GlyphCacheConfig};
pub use glyph_id::GlyphId;
pub use glyph_image::{GlyphHandle, GlyphImage, GlyphMetrics, ResourceType};

// re-export dependencies
pub use euclid;
#[cfg(feature = "fontdue")]
pub use fontdue;
pub use parking_lot;
