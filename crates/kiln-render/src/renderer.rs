//! Render dispatch for the batched mesh pass

use crate::assembler::{build_and_upload, AssembledDraws};
use crate::batch::GeometryBatch;
use crate::config::RendererConfig;
use crate::gpu_batch::GpuBatchBuffers;
use crate::headless::OPTIONAL_FEATURES;
use crate::pipeline::MeshPipeline;
use crate::textures::{GpuTextureArray, TextureLibrary};
use crate::types::{DrawIndexedIndirect, FrameUniforms, LightRecord};
use glam::Mat4;
use kiln_core::Result;

/// How a frame's command list is submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPlan {
    None,
    Single,
    Multi(u32),
    /// One indirect draw per command, for devices without multi-draw
    Sequential(u32),
}

impl DispatchPlan {
    pub fn for_commands(count: u32, multi_draw: bool) -> Self {
        match count {
            0 => Self::None,
            1 => Self::Single,
            n if multi_draw => Self::Multi(n),
            n => Self::Sequential(n),
        }
    }

    /// Draw calls recorded into the pass
    pub fn draw_calls(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Single | Self::Multi(_) => 1,
            Self::Sequential(n) => *n,
        }
    }
}

/// Per-frame inputs the renderer uploads besides the batch itself
pub struct FrameInputs<'a> {
    pub uniforms: FrameUniforms,
    pub palette: &'a [Mat4],
    /// Terminated by the sentinel record
    pub lights: &'a [LightRecord],
}

pub struct MeshRenderer {
    pipeline: MeshPipeline,
    buffers: GpuBatchBuffers,
    textures: GpuTextureArray,
    texture_bind_group: wgpu::BindGroup,
    multi_draw: bool,
}

impl MeshRenderer {
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        format: wgpu::TextureFormat,
        config: &RendererConfig,
    ) -> Self {
        let pipeline = MeshPipeline::new(device, format);
        let buffers = GpuBatchBuffers::new(device, &pipeline.frame_bind_group_layout, config);
        let textures =
            GpuTextureArray::new(device, queue, config.max_texture_units, config.texture_size);
        let texture_bind_group = pipeline.texture_bind_group(device, &textures);
        let multi_draw = device.features().contains(OPTIONAL_FEATURES);
        if !multi_draw {
            log::info!("multi-draw indirect unavailable, issuing one indirect draw per command");
        }

        Self {
            pipeline,
            buffers,
            textures,
            texture_bind_group,
            multi_draw,
        }
    }

    pub fn supports_multi_draw(&self) -> bool {
        self.multi_draw
    }

    pub fn buffers(&self) -> &GpuBatchBuffers {
        &self.buffers
    }

    /// Write textures, geometry, instances, palette, lights and uniforms.
    ///
    /// On error nothing is drawn until the next successful upload.
    pub fn upload(
        &mut self,
        queue: &wgpu::Queue,
        batch: &mut GeometryBatch,
        draws: &AssembledDraws,
        library: &mut TextureLibrary,
        frame: &FrameInputs<'_>,
    ) -> Result<()> {
        self.textures.flush(queue, library);
        self.buffers.upload_uniforms(queue, &frame.uniforms);

        let capacity = self.buffers.capacity();
        let frame_fits = capacity
            .check_palette(frame.palette)
            .and_then(|()| capacity.check_lights(frame.lights));
        if let Err(e) = frame_fits {
            self.buffers.disable_draws();
            return Err(e);
        }

        build_and_upload(batch, draws, &mut self.buffers, queue)?;
        self.buffers.upload_palette(queue, frame.palette)?;
        self.buffers.upload_lights(queue, frame.lights)
    }

    pub fn plan(&self) -> DispatchPlan {
        DispatchPlan::for_commands(self.buffers.draw_count(), self.multi_draw)
    }

    /// Record the uploaded commands into `pass`
    pub fn render(&self, pass: &mut wgpu::RenderPass<'_>) -> DispatchPlan {
        let plan = self.plan();
        if plan == DispatchPlan::None {
            return plan;
        }

        let buffers = &self.buffers;
        pass.set_pipeline(&self.pipeline.pipeline);
        pass.set_bind_group(0, &buffers.bind_group, &[]);
        pass.set_bind_group(1, &self.texture_bind_group, &[]);
        pass.set_vertex_buffer(0, buffers.positions.slice(..));
        pass.set_vertex_buffer(1, buffers.normals.slice(..));
        pass.set_vertex_buffer(2, buffers.texcoords.slice(..));
        pass.set_vertex_buffer(3, buffers.joints.slice(..));
        pass.set_vertex_buffer(4, buffers.weights.slice(..));
        pass.set_index_buffer(buffers.indices.slice(..), wgpu::IndexFormat::Uint32);

        match plan {
            DispatchPlan::None => {}
            DispatchPlan::Single => pass.draw_indexed_indirect(&buffers.indirect, 0),
            DispatchPlan::Multi(count) => {
                pass.multi_draw_indexed_indirect(&buffers.indirect, 0, count)
            }
            DispatchPlan::Sequential(count) => {
                for i in 0..count {
                    pass.draw_indexed_indirect(
                        &buffers.indirect,
                        i as u64 * DrawIndexedIndirect::SIZE,
                    );
                }
            }
        }
        plan
    }

    /// Clear `color`/`depth` and draw the batch into them
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        color: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear_color: [f32; 4],
    ) -> DispatchPlan {
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Batched Mesh Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: clear_color[0] as f64,
                        g: clear_color[1] as f64,
                        b: clear_color[2] as f64,
                        a: clear_color[3] as f64,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.render(&mut pass)
    }
}
