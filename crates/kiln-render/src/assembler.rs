//! Indirect draw assembly
//!
//! Turns the batch's entry table and instance lists into one indexed
//! indirect command per entry plus a consolidated instance array. Command N
//! starts at the sum of the instance counts of commands 0..N.

use crate::batch::GeometryBatch;
use crate::gpu_batch::{BatchCapacity, GpuBatchBuffers};
use crate::types::{DrawIndexedIndirect, InstanceOrientation, MaterialBinding};
use kiln_core::Result;

/// Everything the assembler produces for one frame
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssembledDraws {
    pub commands: Vec<DrawIndexedIndirect>,
    pub instances: Vec<InstanceOrientation>,
    pub materials: Vec<MaterialBinding>,
}

impl AssembledDraws {
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn command_count(&self) -> u32 {
        self.commands.len() as u32
    }

    pub fn instance_count(&self) -> u32 {
        self.instances.len() as u32
    }

    pub fn triangle_count(&self) -> u64 {
        self.commands
            .iter()
            .map(|c| (c.index_count / 3) as u64 * c.instance_count as u64)
            .sum()
    }
}

/// Build the command list and instance array from `batch`
pub fn assemble(batch: &GeometryBatch) -> AssembledDraws {
    let mut draws = AssembledDraws {
        materials: batch.registry().bindings().to_vec(),
        ..Default::default()
    };

    for (i, entry) in batch.entries().iter().enumerate() {
        let first_instance = draws.instances.len() as u32;
        let records = batch.registry().instances(i);
        if records.is_empty() {
            draws.instances.extend(
                std::iter::repeat(InstanceOrientation::IDENTITY).take(entry.instance_count as usize),
            );
        } else {
            draws.instances.extend_from_slice(records);
        }

        let instance_count = draws.instances.len() as u32 - first_instance;
        if instance_count == 0 {
            continue;
        }
        draws.commands.push(DrawIndexedIndirect {
            index_count: entry.index_count,
            instance_count,
            first_index: entry.first_index,
            base_vertex: entry.base_vertex as i32,
            first_instance,
        });
    }

    draws
}

/// Device-free half of an upload: pads staged geometry and checks every
/// capacity against `draws`. Returns whether geometry must be rewritten.
///
/// On error the draw count drops to zero and nothing may be written, so the
/// GPU buffers keep the previous frame.
pub fn prepare_upload(
    batch: &mut GeometryBatch,
    draws: &AssembledDraws,
    capacity: &mut BatchCapacity,
) -> Result<bool> {
    let geometry = batch.is_dirty();
    if geometry {
        batch.staging_mut().pad_to_vertex_count();
    }
    let checked = if geometry {
        capacity.check_geometry(batch.staging())
    } else {
        Ok(())
    };
    if let Err(e) = checked.and_then(|()| capacity.check_draws(draws)) {
        capacity.disable_draws();
        return Err(e);
    }
    Ok(geometry)
}

/// Upload staged geometry if it changed, then the instance, material and
/// command buffers for `draws` (assembled from the same batch).
pub fn build_and_upload(
    batch: &mut GeometryBatch,
    draws: &AssembledDraws,
    buffers: &mut GpuBatchBuffers,
    queue: &wgpu::Queue,
) -> Result<()> {
    if prepare_upload(batch, draws, buffers.capacity_mut())? {
        buffers.upload_geometry(queue, batch.staging())?;
        batch.mark_clean();
    }
    buffers.upload_draws(queue, draws)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RendererConfig;
    use crate::textures::TextureLibrary;
    use kiln_core::KilnError;
    use glam::Vec3;
    use kiln_core::Transform;
    use kiln_import::fixtures;
    use kiln_import::{LoadHooks, ModelCache, NoAnimations};
    use std::path::Path;

    fn triangles(cache: &ModelCache, textures: &mut TextureLibrary, count: usize) -> GeometryBatch {
        let mut batch = GeometryBatch::new(16, 20);
        for i in 0..count {
            let at = Transform::from_position(Vec3::X * i as f32);
            batch
                .add_model_instance(cache, &mut *textures, "tri.glb", &at, -1)
                .unwrap();
        }
        batch
    }

    fn cache() -> (ModelCache, TextureLibrary) {
        let mut cache = ModelCache::default();
        let mut textures = TextureLibrary::new(16, 4);
        for (name, fixture) in [
            ("tri.glb", fixtures::triangle()),
            ("pair.glb", fixtures::pair()),
            ("crate.glb", fixtures::textured()),
        ] {
            cache
                .load_from_slice(
                    name,
                    &fixture.to_glb(),
                    Path::new(""),
                    false,
                    LoadHooks::new(&mut textures, &mut NoAnimations),
                )
                .unwrap();
        }
        (cache, textures)
    }

    fn check_instance_slots(draws: &AssembledDraws) {
        let mut expected = 0;
        for command in &draws.commands {
            assert_eq!(command.first_instance, expected);
            assert!(command.instance_count > 0);
            expected += command.instance_count;
        }
        assert_eq!(expected as usize, draws.instances.len());
    }

    #[test]
    fn five_triangles_one_command() {
        let (cache, mut textures) = cache();
        let mut batch = GeometryBatch::new(16, 20);
        let positions: Vec<Vec3> = (0..5).map(|i| Vec3::new(i as f32, 2.0 * i as f32, 0.0)).collect();
        for p in &positions {
            batch
                .add_model_instance(&cache, &mut textures, "tri.glb", &Transform::from_position(*p), -1)
                .unwrap();
        }

        let draws = assemble(&batch);
        assert_eq!(draws.commands.len(), 1);
        let command = draws.commands[0];
        assert_eq!(command.instance_count, 5);
        assert_eq!(command.index_count, 3);
        assert_eq!(command.first_instance, 0);
        assert_eq!(draws.instances.len(), 5);
        for p in &positions {
            assert!(draws.instances.iter().any(|r| r.transform().position == *p));
        }
    }

    #[test]
    fn mixed_models_form_prefix_sums() {
        let (cache, mut textures) = cache();
        let mut batch = GeometryBatch::new(16, 20);
        let plan = ["pair.glb", "tri.glb", "crate.glb", "pair.glb", "tri.glb", "tri.glb"];
        for name in plan {
            batch
                .add_model_instance(&cache, &mut textures, name, &Transform::default(), -1)
                .unwrap();
        }

        let draws = assemble(&batch);
        // pair: 2 entries, tri: 1, crate: 2
        assert_eq!(draws.commands.len(), 5);
        check_instance_slots(&draws);
        let counts: Vec<u32> = draws.commands.iter().map(|c| c.instance_count).collect();
        assert_eq!(counts, vec![2, 2, 3, 1, 1]);

        let bases: Vec<i32> = draws.commands.iter().map(|c| c.base_vertex).collect();
        assert_eq!(bases, vec![0, 3, 9, 12, 15]);
        assert_eq!(draws.materials.len(), 2);
        assert_eq!(draws.triangle_count(), 2 + 2 * 2 + 3 + 1 + 1);
    }

    #[test]
    fn records_follow_entry_order() {
        let (cache, mut textures) = cache();
        let mut batch = GeometryBatch::new(16, 20);
        batch
            .add_model_instance(&cache, &mut textures, "tri.glb", &Transform::from_position(Vec3::X), -1)
            .unwrap();
        batch
            .add_model_instance(&cache, &mut textures, "pair.glb", &Transform::from_position(Vec3::Z), -1)
            .unwrap();
        batch
            .add_model_instance(&cache, &mut textures, "tri.glb", &Transform::from_position(Vec3::Y), -1)
            .unwrap();

        let draws = assemble(&batch);
        check_instance_slots(&draws);
        assert_eq!(draws.instances[0].transform().position, Vec3::X);
        assert_eq!(draws.instances[1].transform().position, Vec3::Y);
        assert_eq!(draws.instances[2].transform().position, Vec3::new(0.0, 1.0, 1.0));
    }

    #[test]
    fn empty_after_clean_up() {
        let (cache, mut textures) = cache();
        let mut batch = GeometryBatch::new(16, 20);
        batch
            .add_model_instance(&cache, &mut textures, "pair.glb", &Transform::default(), -1)
            .unwrap();
        batch.clean_up();

        let draws = assemble(&batch);
        assert!(draws.is_empty());
        assert!(draws.instances.is_empty());
        assert!(draws.materials.is_empty());
        assert_eq!(draws.triangle_count(), 0);
    }

    #[test]
    fn prepare_pads_and_reports_new_geometry() {
        let (cache, mut textures) = cache();
        let mut capacity = BatchCapacity::new(&RendererConfig::default());
        let mut batch = triangles(&cache, &mut textures, 2);
        let draws = assemble(&batch);

        assert!(prepare_upload(&mut batch, &draws, &mut capacity).unwrap());
        let staging = batch.staging();
        assert_eq!(staging.normals.len(), staging.positions.len());
        assert_eq!(staging.weights.len(), staging.positions.len());

        batch.mark_clean();
        assert!(!prepare_upload(&mut batch, &draws, &mut capacity).unwrap());
    }

    #[test]
    fn instance_overflow_draws_nothing_and_writes_nothing() {
        let (cache, mut textures) = cache();
        let mut config = RendererConfig::default();
        config.limits.max_instances = 4;
        let mut capacity = BatchCapacity::new(&config);

        let mut batch = triangles(&cache, &mut textures, 3);
        let draws = assemble(&batch);
        assert!(prepare_upload(&mut batch, &draws, &mut capacity).unwrap());
        batch.mark_clean();
        capacity.set_draw_count(draws.command_count());
        assert_eq!(capacity.draw_count(), 1);

        for _ in 0..2 {
            batch
                .add_model_instance(&cache, &mut textures, "tri.glb", &Transform::default(), -1)
                .unwrap();
        }
        let too_many = assemble(&batch);
        assert_eq!(too_many.instance_count(), 5);
        let err = prepare_upload(&mut batch, &too_many, &mut capacity).unwrap_err();
        assert!(matches!(
            err,
            KilnError::CapacityExceeded { buffer: "instance", needed: 5, capacity: 4 }
        ));
        assert_eq!(capacity.draw_count(), 0);
    }

    #[test]
    fn geometry_overflow_keeps_batch_dirty() {
        let (cache, mut textures) = cache();
        let mut config = RendererConfig::default();
        config.limits.max_vertices = 2;
        let mut capacity = BatchCapacity::new(&config);
        capacity.set_draw_count(7);

        let mut batch = triangles(&cache, &mut textures, 1);
        let draws = assemble(&batch);
        assert!(matches!(
            prepare_upload(&mut batch, &draws, &mut capacity),
            Err(KilnError::CapacityExceeded { buffer: "vertex", .. })
        ));
        assert_eq!(capacity.draw_count(), 0);
        // staged geometry was never uploaded, so the next attempt retries it
        assert!(batch.is_dirty());
    }
}
