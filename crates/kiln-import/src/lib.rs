//! Kiln Import - glTF model documents and the model cache
//!
//! Models are parsed once (text `.gltf` or binary `.glb`) and cached under
//! their file basename. Loading a model also announces its images to a
//! [`TextureRegistry`] and, for animated models, hands the document to an
//! [`AnimationSink`].

mod cache;
mod document;
mod hooks;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use cache::ModelCache;
pub use document::{is_base_color_uri, node_trs, strip_extension, ModelDocument, ModelFormat};
pub use hooks::{AnimationSink, ImageSource, LoadHooks, NoAnimations, TextureRegistry};
