//! GPU-side buffers for the batched mesh pass
//!
//! Allocated once at the capacities in [`BufferLimits`]; every frame only
//! writes into them. Nothing grows on the fly: data past a capacity fails
//! with `CapacityExceeded` and the frame draws nothing.

use crate::assembler::AssembledDraws;
use crate::batch::StagingGeometry;
use crate::config::{BufferLimits, RendererConfig};
use crate::types::{
    DrawIndexedIndirect, FrameUniforms, InstanceOrientation, LightRecord, MaterialBinding,
};
use glam::Mat4;
use kiln_core::{KilnError, Result};
use std::mem::size_of;

/// Fail if `needed` elements will not fit in a buffer holding `capacity`
pub fn ensure_capacity(buffer: &'static str, needed: usize, capacity: u32) -> Result<()> {
    if needed as u64 > capacity as u64 {
        return Err(KilnError::CapacityExceeded {
            buffer,
            needed: needed as u64,
            capacity: capacity as u64,
        });
    }
    Ok(())
}

/// Capacities and the live draw count of [`GpuBatchBuffers`].
///
/// Holds no device state, so a frame can be checked against it before any
/// buffer is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchCapacity {
    limits: BufferLimits,
    material_capacity: u32,
    /// Light records including the terminating sentinel
    light_capacity: u32,
    draw_count: u32,
}

impl BatchCapacity {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            limits: config.limits,
            material_capacity: config.max_texture_units.max(1),
            light_capacity: config.limits.max_lights + 1,
            draw_count: 0,
        }
    }

    pub fn check_geometry(&self, staging: &StagingGeometry) -> Result<()> {
        ensure_capacity("vertex", staging.vertex_count(), self.limits.max_vertices)?;
        ensure_capacity("index", staging.indices.len(), self.limits.max_indices)
    }

    pub fn check_draws(&self, draws: &AssembledDraws) -> Result<()> {
        ensure_capacity("indirect", draws.commands.len(), self.limits.max_draws)?;
        ensure_capacity("instance", draws.instances.len(), self.limits.max_instances)?;
        ensure_capacity("material", draws.materials.len(), self.material_capacity)
    }

    pub fn check_palette(&self, palette: &[Mat4]) -> Result<()> {
        ensure_capacity("palette", palette.len(), self.limits.max_palette_matrices)
    }

    pub fn check_lights(&self, lights: &[LightRecord]) -> Result<()> {
        ensure_capacity("light", lights.len(), self.light_capacity)
    }

    /// Commands written by the last successful upload
    pub fn draw_count(&self) -> u32 {
        self.draw_count
    }

    pub(crate) fn set_draw_count(&mut self, count: u32) {
        self.draw_count = count;
    }

    pub fn disable_draws(&mut self) {
        self.draw_count = 0;
    }

    pub fn limits(&self) -> &BufferLimits {
        &self.limits
    }

    pub fn material_capacity(&self) -> u32 {
        self.material_capacity
    }

    pub fn light_capacity(&self) -> u32 {
        self.light_capacity
    }
}

fn create_buffer(
    device: &wgpu::Device,
    label: &str,
    elements: u32,
    element_size: usize,
    usage: wgpu::BufferUsages,
) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some(label),
        size: (elements.max(1) as u64) * element_size as u64,
        usage: usage | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

pub struct GpuBatchBuffers {
    pub positions: wgpu::Buffer,
    pub normals: wgpu::Buffer,
    pub texcoords: wgpu::Buffer,
    pub joints: wgpu::Buffer,
    pub weights: wgpu::Buffer,
    pub indices: wgpu::Buffer,
    pub instances: wgpu::Buffer,
    pub materials: wgpu::Buffer,
    pub palette: wgpu::Buffer,
    pub lights: wgpu::Buffer,
    pub indirect: wgpu::Buffer,
    pub uniforms: wgpu::Buffer,
    /// Group 0: uniforms, instances, materials, palette, lights
    pub bind_group: wgpu::BindGroup,
    capacity: BatchCapacity,
}

impl GpuBatchBuffers {
    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        config: &RendererConfig,
    ) -> Self {
        use wgpu::BufferUsages as U;
        let capacity = BatchCapacity::new(config);
        let limits = *capacity.limits();

        let positions = create_buffer(device, "Batch Positions", limits.max_vertices, 12, U::VERTEX);
        let normals = create_buffer(device, "Batch Normals", limits.max_vertices, 12, U::VERTEX);
        let texcoords = create_buffer(device, "Batch Texcoords", limits.max_vertices, 8, U::VERTEX);
        let joints = create_buffer(device, "Batch Joints", limits.max_vertices, 16, U::VERTEX);
        let weights = create_buffer(device, "Batch Weights", limits.max_vertices, 16, U::VERTEX);
        let indices = create_buffer(device, "Batch Indices", limits.max_indices, 4, U::INDEX);
        let instances = create_buffer(
            device,
            "Batch Instances",
            limits.max_instances,
            size_of::<InstanceOrientation>(),
            U::STORAGE,
        );
        let materials = create_buffer(
            device,
            "Batch Materials",
            capacity.material_capacity(),
            size_of::<MaterialBinding>(),
            U::STORAGE,
        );
        let palette = create_buffer(
            device,
            "Joint Palette",
            limits.max_palette_matrices,
            size_of::<Mat4>(),
            U::STORAGE,
        );
        let lights = create_buffer(
            device,
            "Batch Lights",
            capacity.light_capacity(),
            size_of::<LightRecord>(),
            U::STORAGE,
        );
        let indirect = create_buffer(
            device,
            "Batch Indirect Commands",
            limits.max_draws,
            DrawIndexedIndirect::SIZE as usize,
            U::INDIRECT,
        );
        let uniforms = create_buffer(device, "Frame Uniforms", 1, size_of::<FrameUniforms>(), U::UNIFORM);

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Batch Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniforms.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: instances.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: materials.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: palette.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: lights.as_entire_binding(),
                },
            ],
        });

        Self {
            positions,
            normals,
            texcoords,
            joints,
            weights,
            indices,
            instances,
            materials,
            palette,
            lights,
            indirect,
            uniforms,
            bind_group,
            capacity,
        }
    }

    pub fn capacity(&self) -> &BatchCapacity {
        &self.capacity
    }

    pub fn capacity_mut(&mut self) -> &mut BatchCapacity {
        &mut self.capacity
    }

    pub fn upload_geometry(&self, queue: &wgpu::Queue, staging: &StagingGeometry) -> Result<()> {
        self.capacity.check_geometry(staging)?;
        if staging.vertex_count() == 0 {
            return Ok(());
        }
        queue.write_buffer(&self.positions, 0, bytemuck::cast_slice(&staging.positions));
        queue.write_buffer(&self.normals, 0, bytemuck::cast_slice(&staging.normals));
        queue.write_buffer(&self.texcoords, 0, bytemuck::cast_slice(&staging.texcoords));
        queue.write_buffer(&self.joints, 0, bytemuck::cast_slice(&staging.joints));
        queue.write_buffer(&self.weights, 0, bytemuck::cast_slice(&staging.weights));
        if !staging.indices.is_empty() {
            queue.write_buffer(&self.indices, 0, bytemuck::cast_slice(&staging.indices));
        }
        Ok(())
    }

    pub fn upload_draws(&mut self, queue: &wgpu::Queue, draws: &AssembledDraws) -> Result<()> {
        self.capacity.check_draws(draws)?;
        if !draws.instances.is_empty() {
            queue.write_buffer(&self.instances, 0, bytemuck::cast_slice(&draws.instances));
        }
        if !draws.materials.is_empty() {
            queue.write_buffer(&self.materials, 0, bytemuck::cast_slice(&draws.materials));
        }
        if !draws.commands.is_empty() {
            queue.write_buffer(&self.indirect, 0, bytemuck::cast_slice(&draws.commands));
        }
        self.capacity.set_draw_count(draws.command_count());
        Ok(())
    }

    pub fn upload_palette(&self, queue: &wgpu::Queue, palette: &[Mat4]) -> Result<()> {
        self.capacity.check_palette(palette)?;
        if !palette.is_empty() {
            queue.write_buffer(&self.palette, 0, bytemuck::cast_slice(palette));
        }
        Ok(())
    }

    /// `lights` must already end with the sentinel record
    pub fn upload_lights(&self, queue: &wgpu::Queue, lights: &[LightRecord]) -> Result<()> {
        self.capacity.check_lights(lights)?;
        if !lights.is_empty() {
            queue.write_buffer(&self.lights, 0, bytemuck::cast_slice(lights));
        }
        Ok(())
    }

    pub fn upload_uniforms(&self, queue: &wgpu::Queue, uniforms: &FrameUniforms) {
        queue.write_buffer(&self.uniforms, 0, bytemuck::bytes_of(uniforms));
    }

    pub fn draw_count(&self) -> u32 {
        self.capacity.draw_count()
    }

    pub fn disable_draws(&mut self) {
        self.capacity.disable_draws();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capacity_boundary() {
        assert!(ensure_capacity("vertex", 0, 0).is_ok());
        assert!(ensure_capacity("vertex", 10, 10).is_ok());
        let err = ensure_capacity("instance", 11, 10).unwrap_err();
        match err {
            KilnError::CapacityExceeded {
                buffer,
                needed,
                capacity,
            } => {
                assert_eq!(buffer, "instance");
                assert_eq!(needed, 11);
                assert_eq!(capacity, 10);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn light_capacity_counts_the_sentinel() {
        let mut config = RendererConfig::default();
        config.limits.max_lights = 1;
        let capacity = BatchCapacity::new(&config);
        let sun = LightRecord {
            kind: 1,
            ..LightRecord::ending()
        };
        assert!(capacity.check_lights(&[sun, LightRecord::ending()]).is_ok());
        assert!(capacity.check_lights(&[sun, sun, LightRecord::ending()]).is_err());
    }

    #[test]
    fn palette_capacity_in_matrices() {
        let mut config = RendererConfig::default();
        config.limits.max_palette_matrices = 40;
        let capacity = BatchCapacity::new(&config);
        assert!(capacity.check_palette(&[Mat4::IDENTITY; 40]).is_ok());
        assert!(matches!(
            capacity.check_palette(&[Mat4::IDENTITY; 41]),
            Err(KilnError::CapacityExceeded { buffer: "palette", .. })
        ));
    }
}
