use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::backend::GlyphBackend;
use crate::glyph_cache::GlyphCache;
use crate::glyph_image::GlyphHandle;

/// Receives glyph images that are about to be destroyed.
///
/// Called from whatever thread reclaims glyph memory, not from the render
/// thread.
pub trait GlyphDisposedListener: Send + Sync {
    fn glyphs_disposed(&self, glyphs: &[GlyphHandle]);
}

impl<B> GlyphDisposedListener for GlyphCache<B>
where
    B: GlyphBackend + Send,
    B::Error: fmt::Debug,
{
    fn glyphs_disposed(&self, glyphs: &[GlyphHandle]) {
        if let Err(err) = self.dispose_glyphs(glyphs) {
            log::error!("Failed to free {} disposed glyphs: {:?}", glyphs.len(), err);
        }
    }
}

/// Fan-out point between a glyph rasterizer and the caches holding its images.
///
/// Listeners are held weakly; a dropped cache is pruned on the next
/// notification.
#[derive(Default)]
pub struct DisposalNotifier {
    listeners: Mutex<Vec<Weak<dyn GlyphDisposedListener>>>,
}

impl DisposalNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<L: GlyphDisposedListener + 'static>(&self, listener: &Arc<L>) {
        let listener: Weak<L> = Arc::downgrade(listener);
        self.listeners.lock().push(listener);
    }

    /// Tells every live listener that `glyphs` are going away.
    ///
    /// Listeners run after the notifier's own lock is released, so a listener
    /// may register further listeners. Returns the number of listeners reached.
    pub fn notify(&self, glyphs: &[GlyphHandle]) -> usize {
        if glyphs.is_empty() {
            return 0;
        }

        let live: Vec<_> = {
            let mut listeners = self.listeners.lock();
            listeners.retain(|listener| listener.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };

        for listener in &live {
            listener.glyphs_disposed(glyphs);
        }
        live.len()
    }

    pub fn listener_count(&self) -> usize {
        self.listeners
            .lock()
            .iter()
            .filter(|listener| listener.strong_count() > 0)
            .count()
    }
}
