use std::fmt;

/// Returned when [`GlyphCacheConfig`](crate::GlyphCacheConfig) parameters are invalid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigError(String);

impl ConfigError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ConfigError {}

/// Returned by [`GlyphCache::new`](crate::GlyphCache::new).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateCacheError<E> {
    /// The configuration was rejected before the backend was touched.
    Config(ConfigError),
    /// The backend failed to create a glyph set.
    Backend(E),
}

impl<E: fmt::Display> fmt::Display for CreateCacheError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config(err) => write!(f, "invalid glyph cache config: {err}"),
            Self::Backend(err) => write!(f, "failed to create glyph sets: {err}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for CreateCacheError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(err) => Some(err),
            Self::Backend(err) => Some(err),
        }
    }
}

impl<E> From<ConfigError> for CreateCacheError<E> {
    fn from(err: ConfigError) -> Self {
        Self::Config(err)
    }
}
