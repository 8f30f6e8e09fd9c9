//! Texture library: name registry, texture-unit binding and the GPU
//! base-color texture array.
//!
//! Models register every image they reference at load time. During batching
//! a base-color texture is bound to a texture unit; each unit is one layer
//! of a `texture_2d_array`, filled lazily when its binding changes.

use image::imageops::FilterType;
use kiln_import::{ImageSource, TextureRegistry};
use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use wgpu::util::DeviceExt;

/// Binds named textures to texture units during batching
pub trait TextureBinder {
    /// Returns false if the texture is unknown or the unit is out of range
    fn bind(&mut self, name: &str, unit: u32) -> bool;
}

#[derive(Debug, Clone)]
struct TextureEntry {
    native: PathBuf,
    fallback: Option<ImageSource>,
}

pub struct TextureLibrary {
    entries: HashMap<String, TextureEntry>,
    /// Texture name per unit
    units: Vec<Option<String>>,
    /// Units whose binding changed since the last GPU flush
    dirty: BTreeSet<u32>,
    layer_size: u32,
}

impl TextureLibrary {
    pub fn new(max_units: u32, layer_size: u32) -> Self {
        Self {
            entries: HashMap::new(),
            units: vec![None; max_units as usize],
            dirty: BTreeSet::new(),
            layer_size: layer_size.max(1),
        }
    }

    pub fn max_units(&self) -> u32 {
        self.units.len() as u32
    }

    pub fn layer_size(&self) -> u32 {
        self.layer_size
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Texture currently bound to `unit`
    pub fn bound(&self, unit: u32) -> Option<&str> {
        self.units.get(unit as usize)?.as_deref()
    }

    pub fn take_dirty_units(&mut self) -> Vec<u32> {
        std::mem::take(&mut self.dirty).into_iter().collect()
    }

    /// RGBA8 pixels for `name`, resized to one array layer.
    ///
    /// Tries the GPU-native file, then the fallback image, then white.
    pub fn decode_layer(&self, name: &str) -> Vec<u8> {
        let size = self.layer_size;
        match self.entries.get(name).and_then(|e| decode(name, e)) {
            Some(img) => img
                .resize_exact(size, size, FilterType::Triangle)
                .to_rgba8()
                .into_raw(),
            None => white_layer(size),
        }
    }
}

fn decode(name: &str, entry: &TextureEntry) -> Option<image::DynamicImage> {
    match image::open(&entry.native) {
        Ok(img) => return Some(img),
        Err(e) => log::debug!("{}: {} not decodable ({})", name, entry.native.display(), e),
    }
    let decoded = match entry.fallback.as_ref()? {
        ImageSource::File(path) => image::open(path),
        ImageSource::Bytes(bytes) => image::load_from_memory(bytes),
    };
    match decoded {
        Ok(img) => Some(img),
        Err(e) => {
            log::warn!("texture '{}' could not be decoded, using white: {}", name, e);
            None
        }
    }
}

fn white_layer(size: u32) -> Vec<u8> {
    let size = size as usize;
    vec![255u8; size * size * 4]
}

impl TextureRegistry for TextureLibrary {
    fn register(&mut self, name: &str, path: &Path, fallback: Option<ImageSource>) {
        self.entries.insert(
            name.to_string(),
            TextureEntry {
                native: path.to_path_buf(),
                fallback,
            },
        );
        // A re-registered texture must be re-decoded wherever it is bound
        for (unit, bound) in self.units.iter().enumerate() {
            if bound.as_deref() == Some(name) {
                self.dirty.insert(unit as u32);
            }
        }
    }
}

impl TextureBinder for TextureLibrary {
    fn bind(&mut self, name: &str, unit: u32) -> bool {
        if !self.entries.contains_key(name) {
            log::warn!("texture '{}' was never registered", name);
            return false;
        }
        let Some(slot) = self.units.get_mut(unit as usize) else {
            return false;
        };
        if slot.as_deref() != Some(name) {
            *slot = Some(name.to_string());
            self.dirty.insert(unit);
        }
        true
    }
}

/// The base-color `texture_2d_array`, one layer per texture unit
pub struct GpuTextureArray {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    layers: u32,
    size: u32,
}

impl GpuTextureArray {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, layers: u32, size: u32) -> Self {
        let layers = layers.max(1);
        let size = size.max(1);
        let pixels = white_layer(size).repeat(layers as usize);

        let texture = device.create_texture_with_data(
            queue,
            &wgpu::TextureDescriptor {
                label: Some("Base Color Array"),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: layers,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba8UnormSrgb,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            },
            wgpu::util::TextureDataOrder::LayerMajor,
            &pixels,
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Base Color Array View"),
            dimension: Some(wgpu::TextureViewDimension::D2Array),
            ..Default::default()
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Base Color Sampler"),
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            ..Default::default()
        });

        Self {
            texture,
            view,
            sampler,
            layers,
            size,
        }
    }

    /// Upload every layer whose binding changed
    pub fn flush(&self, queue: &wgpu::Queue, library: &mut TextureLibrary) {
        for unit in library.take_dirty_units() {
            if unit >= self.layers {
                continue;
            }
            let pixels = match library.bound(unit) {
                Some(name) if library.layer_size() == self.size => library.decode_layer(name),
                _ => white_layer(self.size),
            };
            queue.write_texture(
                wgpu::ImageCopyTexture {
                    texture: &self.texture,
                    mip_level: 0,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: unit,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                &pixels,
                wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * self.size),
                    rows_per_image: Some(self.size),
                },
                wgpu::Extent3d {
                    width: self.size,
                    height: self.size,
                    depth_or_array_layers: 1,
                },
            );
        }
    }
}
