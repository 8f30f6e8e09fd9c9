//! Collaborators notified while a model loads

use crate::document::ModelDocument;
use kiln_core::Result;
use std::path::{Path, PathBuf};

/// Where a texture's pixels can be decoded from when the GPU-native file
/// is missing
#[derive(Debug, Clone, PartialEq)]
pub enum ImageSource {
    File(PathBuf),
    /// Image embedded in a buffer view (GLB)
    Bytes(Vec<u8>),
}

/// Receives every image a model references
pub trait TextureRegistry {
    fn register(&mut self, name: &str, path: &Path, fallback: Option<ImageSource>);
}

/// Receives animated model documents
pub trait AnimationSink {
    /// `Ok(false)` when `name` is already loaded; errors mean nothing usable
    /// could be extracted.
    fn accept_document(&mut self, name: &str, model: &ModelDocument) -> Result<bool>;
}

/// Sink for callers that never load animated models
pub struct NoAnimations;

impl AnimationSink for NoAnimations {
    fn accept_document(&mut self, _name: &str, _model: &ModelDocument) -> Result<bool> {
        Ok(false)
    }
}

/// Both collaborators a load needs
pub struct LoadHooks<'a> {
    pub textures: &'a mut dyn TextureRegistry,
    pub animations: &'a mut dyn AnimationSink,
}

impl<'a> LoadHooks<'a> {
    pub fn new(
        textures: &'a mut dyn TextureRegistry,
        animations: &'a mut dyn AnimationSink,
    ) -> Self {
        Self {
            textures,
            animations,
        }
    }
}
