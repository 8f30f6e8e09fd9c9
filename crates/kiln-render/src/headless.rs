//! Offscreen device and render target for the batched pass
//!
//! The batched pass needs `first_instance` in indirect commands, so adapter
//! selection rejects anything without `INDIRECT_FIRST_INSTANCE`. Multi-draw
//! is requested opportunistically.

use crate::pipeline::DEPTH_FORMAT;
use kiln_core::KilnError;
use thiserror::Error;

const COLOR_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;
const BYTES_PER_PIXEL: u32 = 4;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("No GPU adapter available")]
    AdapterNotFound,
    #[error("Adapter lacks required features: {0:?}")]
    MissingFeatures(wgpu::Features),
    #[error("Failed to create device: {0}")]
    DeviceCreation(String),
    #[error("Failed to read back frame: {0}")]
    BufferReadFailed(String),
}

impl From<RenderError> for KilnError {
    fn from(e: RenderError) -> Self {
        KilnError::RenderError(e.to_string())
    }
}

/// Features the batched pass cannot run without
pub const REQUIRED_FEATURES: wgpu::Features = wgpu::Features::INDIRECT_FIRST_INSTANCE;
/// Used when present; otherwise commands are drawn one at a time
pub const OPTIONAL_FEATURES: wgpu::Features = wgpu::Features::MULTI_DRAW_INDIRECT;

/// Features to request from an adapter offering `available`
pub fn negotiate_features(available: wgpu::Features) -> Result<wgpu::Features, RenderError> {
    if !available.contains(REQUIRED_FEATURES) {
        return Err(RenderError::MissingFeatures(REQUIRED_FEATURES - available));
    }
    Ok(REQUIRED_FEATURES | (available & OPTIONAL_FEATURES))
}

/// Row pitch of a readback buffer: `COPY_BYTES_PER_ROW_ALIGNMENT`-aligned
fn padded_row_bytes(width: u32) -> u32 {
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    (width * BYTES_PER_PIXEL).div_ceil(align) * align
}

fn frame_extent(width: u32, height: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: 1,
    }
}

fn attachment(
    device: &wgpu::Device,
    label: &str,
    extent: wgpu::Extent3d,
    format: wgpu::TextureFormat,
    usage: wgpu::TextureUsages,
) -> (wgpu::Texture, wgpu::TextureView) {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT | usage,
        view_formats: &[],
    });
    let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
    (texture, view)
}

/// Device, queue and an offscreen color/depth target
pub struct HeadlessContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub adapter_name: String,
    pub color_texture: wgpu::Texture,
    pub color_view: wgpu::TextureView,
    pub depth_texture: wgpu::Texture,
    pub depth_view: wgpu::TextureView,
}

impl HeadlessContext {
    pub async fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        let (width, height) = (width.max(1), height.max(1));

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(RenderError::AdapterNotFound)?;
        let features = negotiate_features(adapter.features())?;
        let adapter_name = adapter.get_info().name;
        log::info!("adapter '{}' features {:?}", adapter_name, features);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Kiln Device"),
                    required_features: features,
                    required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| RenderError::DeviceCreation(e.to_string()))?;

        let extent = frame_extent(width, height);
        let (color_texture, color_view) = attachment(
            &device,
            "Kiln Color Target",
            extent,
            COLOR_FORMAT,
            wgpu::TextureUsages::COPY_SRC,
        );
        let (depth_texture, depth_view) = attachment(
            &device,
            "Kiln Depth Target",
            extent,
            DEPTH_FORMAT,
            wgpu::TextureUsages::empty(),
        );

        Ok(Self {
            device,
            queue,
            format: COLOR_FORMAT,
            width,
            height,
            adapter_name,
            color_texture,
            color_view,
            depth_texture,
            depth_view,
        })
    }

    /// Copy the color target back as tightly packed RGBA rows
    pub async fn read_pixels(&self) -> Result<Vec<u8>, RenderError> {
        let pitch = padded_row_bytes(self.width);
        let readback = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Kiln Readback"),
            size: pitch as u64 * self.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Kiln Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            self.color_texture.as_image_copy(),
            wgpu::ImageCopyBuffer {
                buffer: &readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(pitch),
                    rows_per_image: Some(self.height),
                },
            },
            frame_extent(self.width, self.height),
        );
        self.queue.submit(std::iter::once(encoder.finish()));

        let slice = readback.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| RenderError::BufferReadFailed(e.to_string()))?
            .map_err(|e| RenderError::BufferReadFailed(e.to_string()))?;

        let row = (self.width * BYTES_PER_PIXEL) as usize;
        let pixels = {
            let mapped = slice.get_mapped_range();
            mapped
                .chunks(pitch as usize)
                .take(self.height as usize)
                .flat_map(|line| &line[..row])
                .copied()
                .collect()
        };
        readback.unmap();
        Ok(pixels)
    }

    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}
