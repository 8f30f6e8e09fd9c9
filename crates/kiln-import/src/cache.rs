//! Model cache keyed by file basename

use crate::document::{ModelDocument, ModelFormat};
use crate::hooks::{ImageSource, LoadHooks};
use kiln_core::{KilnError, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Owns every loaded model document until `clear_all`
pub struct ModelCache {
    models: HashMap<String, ModelDocument>,
    /// Extension of the GPU-native texture files that sit next to models
    texture_extension: String,
}

impl Default for ModelCache {
    fn default() -> Self {
        Self::new("ktx2")
    }
}

impl ModelCache {
    pub fn new(texture_extension: impl Into<String>) -> Self {
        Self {
            models: HashMap::new(),
            texture_extension: texture_extension.into(),
        }
    }

    /// Load a `.gltf` or `.glb` file and return the name it is cached under.
    pub fn load(&mut self, path: &Path, has_animation: bool, hooks: LoadHooks<'_>) -> Result<String> {
        let format = ModelFormat::from_path(path)?;
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| KilnError::ImportError(format!("bad model path {}", path.display())))?
            .to_string();

        let bytes = fs::read(path)?;
        let model = ModelDocument::parse(&name, &bytes, format, path)?;
        self.insert(model, has_animation, hooks)
    }

    /// Load a document already in memory. External buffers resolve against
    /// `base_dir`.
    pub fn load_from_slice(
        &mut self,
        name: &str,
        bytes: &[u8],
        base_dir: &Path,
        has_animation: bool,
        hooks: LoadHooks<'_>,
    ) -> Result<String> {
        let path = base_dir.join(name);
        let format = ModelFormat::from_path(&path)?;
        let model = ModelDocument::parse(name, bytes, format, &path)?;
        self.insert(model, has_animation, hooks)
    }

    fn insert(
        &mut self,
        model: ModelDocument,
        has_animation: bool,
        hooks: LoadHooks<'_>,
    ) -> Result<String> {
        let name = model.name().to_string();

        self.register_images(&model, hooks.textures);

        if has_animation {
            match hooks.animations.accept_document(&name, &model) {
                Ok(true) => log::debug!("skeletal animation extracted for '{}'", name),
                Ok(false) => log::debug!("skeletal animation for '{}' already loaded", name),
                Err(e) => log::warn!("no skeletal animation for '{}': {}", name, e),
            }
        }

        if let Some(old) = self.models.insert(name.clone(), model) {
            log::warn!(
                "model '{}' from {} replaced by a file with the same name",
                name,
                old.path().display()
            );
        }
        Ok(name)
    }

    fn register_images(&self, model: &ModelDocument, textures: &mut dyn crate::TextureRegistry) {
        let dir = model.directory();
        for image in model.document().images() {
            let texture_name = model.texture_name(&image);
            let native = dir.join(format!("{}.{}", texture_name, self.texture_extension));
            let fallback = match image.source() {
                gltf::image::Source::Uri { uri, .. } if uri.starts_with("data:") => None,
                gltf::image::Source::Uri { uri, .. } => Some(ImageSource::File(dir.join(uri))),
                gltf::image::Source::View { view, .. } => model
                    .view_data(&view)
                    .map(|bytes| ImageSource::Bytes(bytes.to_vec())),
            };
            textures.register(&texture_name, &native, fallback);
        }
    }

    pub fn get(&self, name: &str) -> Result<&ModelDocument> {
        self.models
            .get(name)
            .ok_or_else(|| KilnError::ModelNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    /// Cached model names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.models.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn clear_all(&mut self) {
        self.models.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::hooks::{AnimationSink, NoAnimations, TextureRegistry};
    use std::path::PathBuf;

    #[derive(Default)]
    struct Registered(Vec<(String, PathBuf, Option<ImageSource>)>);

    impl TextureRegistry for Registered {
        fn register(&mut self, name: &str, path: &Path, fallback: Option<ImageSource>) {
            self.0.push((name.to_string(), path.to_path_buf(), fallback));
        }
    }

    #[derive(Default)]
    struct CountingSink {
        seen: Vec<String>,
        fail: bool,
    }

    impl AnimationSink for CountingSink {
        fn accept_document(&mut self, name: &str, _model: &ModelDocument) -> Result<bool> {
            if self.fail {
                return Err(KilnError::ImportError("unreadable skin".into()));
            }
            if self.seen.iter().any(|n| n == name) {
                return Ok(false);
            }
            self.seen.push(name.to_string());
            Ok(true)
        }
    }

    fn scratch_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kiln-import-{}-{}", tag, std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_load_from_slice_and_get() {
        let mut cache = ModelCache::default();
        let mut textures = Registered::default();
        let bytes = fixtures::triangle().to_glb();
        let name = cache
            .load_from_slice(
                "tri.glb",
                &bytes,
                Path::new("assets"),
                false,
                LoadHooks::new(&mut textures, &mut NoAnimations),
            )
            .unwrap();

        assert_eq!(name, "tri.glb");
        assert!(cache.contains("tri.glb"));
        assert_eq!(cache.get("tri.glb").unwrap().path(), Path::new("assets/tri.glb"));
        assert!(matches!(cache.get("nope.glb"), Err(KilnError::ModelNotFound(_))));
        assert!(textures.0.is_empty());
    }

    #[test]
    fn test_unsupported_extension() {
        let mut cache = ModelCache::default();
        let mut textures = Registered::default();
        let result = cache.load(
            Path::new("missing/model.fbx"),
            false,
            LoadHooks::new(&mut textures, &mut NoAnimations),
        );
        assert!(matches!(result, Err(KilnError::UnsupportedFormat(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let mut cache = ModelCache::default();
        let mut textures = Registered::default();
        let result = cache.load(
            Path::new("definitely/not/here.glb"),
            false,
            LoadHooks::new(&mut textures, &mut NoAnimations),
        );
        assert!(matches!(result, Err(KilnError::IoError(_))));
    }

    #[test]
    fn test_load_text_gltf_from_disk() {
        let dir = scratch_dir("text");
        let path = fixtures::pair().write_gltf(&dir, "pair").unwrap();
        let mut cache = ModelCache::default();
        let mut textures = Registered::default();
        let name = cache
            .load(&path, false, LoadHooks::new(&mut textures, &mut NoAnimations))
            .unwrap();
        assert_eq!(name, "pair.gltf");
        assert_eq!(cache.get(&name).unwrap().document().nodes().len(), 3);
    }

    #[test]
    fn test_textures_registered_with_native_path_and_fallback() {
        let mut cache = ModelCache::new("ktx2");
        let mut textures = Registered::default();
        let bytes = fixtures::textured().to_glb();
        cache
            .load_from_slice(
                "crate.glb",
                &bytes,
                Path::new("assets/props"),
                false,
                LoadHooks::new(&mut textures, &mut NoAnimations),
            )
            .unwrap();

        assert_eq!(textures.0.len(), 2);
        let (name, path, fallback) = &textures.0[0];
        assert_eq!(name, "crate_baseColor");
        assert_eq!(path, Path::new("assets/props/crate_baseColor.ktx2"));
        assert_eq!(
            fallback,
            &Some(ImageSource::File(PathBuf::from("assets/props/crate_baseColor.png")))
        );
        assert_eq!(textures.0[1].0, "crate_normal");
    }

    #[test]
    fn test_animation_handoff() {
        let mut cache = ModelCache::default();
        let mut textures = Registered::default();
        let mut sink = CountingSink::default();
        let bytes = fixtures::skinned().to_glb();

        cache
            .load_from_slice("fox.glb", &bytes, Path::new(""), true, LoadHooks::new(&mut textures, &mut sink))
            .unwrap();
        cache
            .load_from_slice("fox.glb", &bytes, Path::new(""), true, LoadHooks::new(&mut textures, &mut sink))
            .unwrap();
        assert_eq!(sink.seen, vec!["fox.glb".to_string()]);

        // not animated: sink untouched
        cache
            .load_from_slice("still.glb", &bytes, Path::new(""), false, LoadHooks::new(&mut textures, &mut sink))
            .unwrap();
        assert_eq!(sink.seen.len(), 1);
    }

    #[test]
    fn test_animation_failure_does_not_fail_load() {
        let mut cache = ModelCache::default();
        let mut textures = Registered::default();
        let mut sink = CountingSink {
            fail: true,
            ..Default::default()
        };
        let bytes = fixtures::triangle().to_glb();
        let name = cache
            .load_from_slice("tri.glb", &bytes, Path::new(""), true, LoadHooks::new(&mut textures, &mut sink))
            .unwrap();
        assert!(cache.contains(&name));
    }

    #[test]
    fn test_basename_collision_replaces() {
        let a = scratch_dir("collide-a");
        let b = scratch_dir("collide-b");
        let first = fixtures::triangle().write_glb(&a, "thing").unwrap();
        let second = fixtures::pair().write_glb(&b, "thing").unwrap();

        let mut cache = ModelCache::default();
        let mut textures = Registered::default();
        cache
            .load(&first, false, LoadHooks::new(&mut textures, &mut NoAnimations))
            .unwrap();
        cache
            .load(&second, false, LoadHooks::new(&mut textures, &mut NoAnimations))
            .unwrap();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get("thing.glb").unwrap().path(), second.as_path());
    }

    #[test]
    fn test_names_and_clear() {
        let mut cache = ModelCache::default();
        let mut textures = Registered::default();
        let bytes = fixtures::triangle().to_glb();
        for name in ["b.glb", "a.glb"] {
            cache
                .load_from_slice(name, &bytes, Path::new(""), false, LoadHooks::new(&mut textures, &mut NoAnimations))
                .unwrap();
        }
        assert_eq!(cache.names(), vec!["a.glb", "b.glb"]);
        cache.clear_all();
        assert!(cache.is_empty());
    }
}
