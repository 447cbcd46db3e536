//! Asset catalog boundary
//!
//! Sprites and sounds are decoded and played by excluded collaborators (the
//! renderer and the mixer). The simulation only ever holds opaque handles, so
//! a headless run needs no files on disk at all.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Opaque reference to a loaded sprite frame
#[derive(Clone, PartialEq, Eq)]
pub struct SpriteHandle(Arc<str>);

impl SpriteHandle {
    /// Name of the asset this handle refers to
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SpriteHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sprite({})", self.0)
    }
}

/// Opaque reference to a loaded sound clip
#[derive(Clone, PartialEq, Eq)]
pub struct SoundHandle(Arc<str>);

impl SoundHandle {
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SoundHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sound({})", self.0)
    }
}

/// Resolves asset names to handles. Called from the animation loader thread.
pub trait AssetCatalog: Send + Sync {
    /// Resolve a sprite frame by file name. A missing sprite is a soft
    /// degradation: implementations log a warning and hand back a
    /// placeholder handle rather than failing the load.
    fn sprite(&self, name: &str) -> SpriteHandle;

    /// Resolve an optional sound clip. A missing sound is a soft warning;
    /// the animation simply plays silently.
    fn sound(&self, name: &str) -> Option<SoundHandle>;
}

/// Catalog that accepts every name. Used for headless runs and tests.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCatalog;

impl AssetCatalog for NullCatalog {
    fn sprite(&self, name: &str) -> SpriteHandle {
        SpriteHandle(Arc::from(name))
    }

    fn sound(&self, name: &str) -> Option<SoundHandle> {
        Some(SoundHandle(Arc::from(name)))
    }
}

/// Catalog backed by a directory on disk. Handles still carry only the asset
/// name; the renderer decodes the file itself.
#[derive(Debug, Clone)]
pub struct DirCatalog {
    root: PathBuf,
}

impl DirCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl AssetCatalog for DirCatalog {
    fn sprite(&self, name: &str) -> SpriteHandle {
        if !self.root.join(name).is_file() {
            log::warn!("missing sprite {name}, using placeholder");
        }
        SpriteHandle(Arc::from(name))
    }

    fn sound(&self, name: &str) -> Option<SoundHandle> {
        if self.root.join(name).is_file() {
            Some(SoundHandle(Arc::from(name)))
        } else {
            log::warn!("couldn't open sound {name}");
            None
        }
    }
}
