//! Parsed glTF documents

use glam::{Quat, Vec3};
use kiln_core::{KilnError, Result};
use std::path::{Path, PathBuf};

const GLB_MAGIC: &[u8; 4] = b"glTF";

/// The two glTF container variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// `.gltf` JSON document with external or data-URI buffers
    Text,
    /// `.glb` binary container with an embedded BIN chunk
    Binary,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("gltf") => Ok(ModelFormat::Text),
            Some("glb") => Ok(ModelFormat::Binary),
            _ => Err(KilnError::UnsupportedFormat(path.display().to_string())),
        }
    }
}

/// An immutable, fully loaded glTF asset
pub struct ModelDocument {
    name: String,
    path: PathBuf,
    document: gltf::Document,
    buffers: Vec<gltf::buffer::Data>,
}

impl std::fmt::Debug for ModelDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelDocument")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("meshes", &self.document.meshes().len())
            .field("buffers", &self.buffers.len())
            .finish()
    }
}

impl ModelDocument {
    /// Parse a document and resolve its buffers relative to `path`'s directory.
    pub fn parse(name: &str, bytes: &[u8], format: ModelFormat, path: &Path) -> Result<Self> {
        if format == ModelFormat::Binary && !bytes.starts_with(GLB_MAGIC) {
            return Err(KilnError::ImportError(format!(
                "{}: not a binary glTF container",
                path.display()
            )));
        }

        let gltf::Gltf { document, blob } = gltf::Gltf::from_slice(bytes)
            .map_err(|e| KilnError::ImportError(format!("{}: {}", path.display(), e)))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        let buffers = gltf::import_buffers(&document, Some(base), blob)
            .map_err(|e| KilnError::ImportError(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            name: name.to_string(),
            path: path.to_path_buf(),
            document,
            buffers,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory the model was loaded from; texture paths hang off it
    pub fn directory(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new(""))
    }

    pub fn document(&self) -> &gltf::Document {
        &self.document
    }

    /// Raw bytes backing a buffer, for accessor readers
    pub fn buffer_data(&self, buffer: gltf::Buffer<'_>) -> Option<&[u8]> {
        self.buffers.get(buffer.index()).map(|d| d.0.as_slice())
    }

    /// Bytes of a buffer view (embedded images)
    pub fn view_data(&self, view: &gltf::buffer::View<'_>) -> Option<&[u8]> {
        let data = self.buffer_data(view.buffer())?;
        data.get(view.offset()..view.offset() + view.length())
    }

    /// Name an image is registered under with the texture registry
    pub fn texture_name(&self, image: &gltf::Image<'_>) -> String {
        match image.source() {
            gltf::image::Source::Uri { uri, .. } => strip_extension(uri).to_string(),
            gltf::image::Source::View { .. } => match image.name() {
                Some(name) => name.to_string(),
                None => format!("{}#image{}", strip_extension(&self.name), image.index()),
            },
        }
    }

    /// First base-color texture for a primitive: the material's own base-color
    /// texture, else any document image following the `*_baseColor.*` naming.
    pub fn base_color_texture(&self, primitive: &gltf::Primitive<'_>) -> Option<String> {
        let from_material = primitive
            .material()
            .pbr_metallic_roughness()
            .base_color_texture()
            .map(|info| self.texture_name(&info.texture().source()));

        from_material.or_else(|| {
            self.document
                .textures()
                .map(|t| t.source())
                .find(|image| match image.source() {
                    gltf::image::Source::Uri { uri, .. } => is_base_color_uri(uri),
                    gltf::image::Source::View { .. } => {
                        image.name().is_some_and(is_base_color_uri)
                    }
                })
                .map(|image| self.texture_name(&image))
        })
    }

    pub fn has_skin(&self) -> bool {
        self.document.skins().len() > 0
    }
}

/// Local TRS of a node, identity for missing fields
pub fn node_trs(node: &gltf::Node<'_>) -> (Vec3, Quat, Vec3) {
    let (t, r, s) = node.transform().decomposed();
    (Vec3::from(t), Quat::from_array(r), Vec3::from(s))
}

/// `textures/crate_baseColor.png` -> `textures/crate_baseColor`
pub fn strip_extension(uri: &str) -> &str {
    let file_start = uri.rfind('/').map(|i| i + 1).unwrap_or(0);
    match uri[file_start..].rfind('.') {
        Some(dot) => &uri[..file_start + dot],
        None => uri,
    }
}

/// True when the text between the last `_` and the extension is `baseColor`
pub fn is_base_color_uri(uri: &str) -> bool {
    let stem = strip_extension(uri);
    let file = stem.rsplit('/').next().unwrap_or(stem);
    matches!(file.rsplit_once('_'), Some((_, "baseColor")))
}
