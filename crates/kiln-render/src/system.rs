//! Per-frame mesh renderer system
//!
//! Order per frame: static meshes, animated meshes (each gets a palette
//! slot), lights, then assembly. Entities that fail to batch are logged and
//! skipped; the rest of the frame still renders.

use crate::assembler::{assemble, AssembledDraws};
use crate::batch::GeometryBatch;
use crate::config::RendererConfig;
use crate::lights::collect_lights;
use crate::renderer::{FrameInputs, MeshRenderer};
use crate::textures::TextureLibrary;
use crate::types::{FrameUniforms, LightRecord};
use glam::Mat4;
use kiln_animation::SkeletalAnimationStore;
use kiln_core::Result;
use kiln_ecs::{KilnWorld, SceneFile};
use kiln_import::{LoadHooks, ModelCache};
use std::path::Path;

/// Model, animation and texture services shared by loading and rendering
pub struct Assets {
    pub models: ModelCache,
    pub animations: SkeletalAnimationStore,
    pub textures: TextureLibrary,
}

impl Assets {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            models: ModelCache::new(config.texture_extension.clone()),
            animations: SkeletalAnimationStore::new(config.max_joints),
            textures: TextureLibrary::new(config.max_texture_units, config.texture_size),
        }
    }

    pub fn load_model(&mut self, path: &Path, has_animation: bool) -> Result<String> {
        self.models.load(
            path,
            has_animation,
            LoadHooks::new(&mut self.textures, &mut self.animations),
        )
    }

    pub fn load_model_from_slice(
        &mut self,
        name: &str,
        bytes: &[u8],
        base_dir: &Path,
        has_animation: bool,
    ) -> Result<String> {
        self.models.load_from_slice(
            name,
            bytes,
            base_dir,
            has_animation,
            LoadHooks::new(&mut self.textures, &mut self.animations),
        )
    }

    /// Load every model a scene lists, relative to `base_dir`.
    ///
    /// Failures are logged; returns how many models loaded.
    pub fn load_scene_models(&mut self, scene: &SceneFile, base_dir: &Path) -> usize {
        let mut loaded = 0;
        for def in &scene.models {
            let path = base_dir.join(&def.path);
            match self.load_model(&path, def.animated) {
                Ok(name) => {
                    log::info!("loaded model '{}'", name);
                    loaded += 1;
                }
                Err(e) => log::warn!("model {} not loaded: {}", path.display(), e),
            }
        }
        loaded
    }
}

/// Counters for the last built frame
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub static_instances: u32,
    pub animated_instances: u32,
    pub skipped_entities: u32,
    pub lights: u32,
    pub mesh_entries: u32,
    pub commands: u32,
    pub instances: u32,
    pub triangles: u64,
}

pub struct MeshRendererSystem {
    batch: GeometryBatch,
    draws: AssembledDraws,
    palette: Vec<Mat4>,
    lights: Vec<LightRecord>,
    max_joints: usize,
    palette_slots: usize,
    max_lights: usize,
    stats: FrameStats,
}

impl MeshRendererSystem {
    pub fn new(config: &RendererConfig) -> Self {
        Self {
            batch: GeometryBatch::new(config.max_texture_units, config.max_joints),
            draws: AssembledDraws::default(),
            palette: Vec::new(),
            lights: vec![LightRecord::ending()],
            max_joints: config.max_joints.max(1),
            palette_slots: config.palette_slots() as usize,
            max_lights: config.limits.max_lights as usize,
            stats: FrameStats::default(),
        }
    }

    /// Rebuild the batch, joint palette and light list from `world`
    pub fn build_frame(&mut self, world: &KilnWorld, assets: &mut Assets) -> FrameStats {
        let Self {
            batch,
            palette,
            max_joints,
            palette_slots,
            ..
        } = self;
        let max_joints = *max_joints;
        let palette_slots = *palette_slots;

        batch.clean_up();
        palette.clear();
        let mut stats = FrameStats::default();
        let models = &assets.models;
        let animations = &assets.animations;
        let textures = &mut assets.textures;

        world.each_static_mesh(|id, transform, mesh| {
            match batch.add_model_instance(models, &mut *textures, &mesh.model, transform, -1) {
                Ok(()) => stats.static_instances += 1,
                Err(e) => {
                    log::warn!("entity {} ({}) skipped: {}", id, mesh.model, e);
                    stats.skipped_entities += 1;
                }
            }
        });

        world.each_animated_mesh(|id, transform, mesh, anim| {
            let animation = match animations.get(&mesh.model) {
                Ok(animation) => animation,
                Err(e) => {
                    log::warn!("entity {} ({}) skipped: {}", id, mesh.model, e);
                    stats.skipped_entities += 1;
                    return;
                }
            };
            let slot = palette.len() / max_joints;
            if slot >= palette_slots {
                log::warn!(
                    "entity {} skipped: joint palette full ({} skeletons)",
                    id,
                    palette_slots
                );
                stats.skipped_entities += 1;
                return;
            }
            match batch.add_model_instance(models, &mut *textures, &mesh.model, transform, slot as i32) {
                Ok(()) => {
                    let start = palette.len();
                    palette.resize(start + max_joints, Mat4::IDENTITY);
                    animation.write_joint_matrices(anim.time, &mut palette[start..]);
                    stats.animated_instances += 1;
                }
                Err(e) => {
                    log::warn!("entity {} ({}) skipped: {}", id, mesh.model, e);
                    stats.skipped_entities += 1;
                }
            }
        });

        self.lights = collect_lights(world, self.max_lights);
        self.draws = assemble(&self.batch);

        stats.lights = self.lights.len() as u32 - 1;
        stats.mesh_entries = self.batch.entries().len() as u32;
        stats.commands = self.draws.command_count();
        stats.instances = self.draws.instance_count();
        stats.triangles = self.draws.triangle_count();
        self.stats = stats;
        log::debug!("frame built: {:?}", stats);
        stats
    }

    /// Send the last built frame to the GPU
    pub fn upload(
        &mut self,
        renderer: &mut MeshRenderer,
        queue: &wgpu::Queue,
        assets: &mut Assets,
        uniforms: FrameUniforms,
    ) -> Result<()> {
        let frame = FrameInputs {
            uniforms,
            palette: &self.palette,
            lights: &self.lights,
        };
        renderer.upload(queue, &mut self.batch, &self.draws, &mut assets.textures, &frame)
    }

    pub fn batch(&self) -> &GeometryBatch {
        &self.batch
    }

    pub fn draws(&self) -> &AssembledDraws {
        &self.draws
    }

    pub fn palette(&self) -> &[Mat4] {
        &self.palette
    }

    pub fn lights(&self) -> &[LightRecord] {
        &self.lights
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn max_joints(&self) -> usize {
        self.max_joints
    }
}
