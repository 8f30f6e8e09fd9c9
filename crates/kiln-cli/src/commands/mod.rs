//! CLI command implementations

pub mod batch;
pub mod inspect;
pub mod pose;
pub mod render;

use anyhow::{Context, Result};
use kiln_ecs::{KilnWorld, SceneFile};
use kiln_render::{Assets, RendererConfig};
use std::path::Path;

/// Load a scene and every model it lists
pub fn load_scene_with_assets(
    scene: &str,
    config: &RendererConfig,
) -> Result<(KilnWorld, SceneFile, Assets)> {
    let (world, scene_file) = kiln_ecs::load_scene(scene)
        .with_context(|| format!("Failed to load scene {}", scene))?;
    println!("Loaded scene: {}", scene_file.scene.name);
    println!("Entities: {}", world.entity_count());

    let scene_dir = Path::new(scene).parent().unwrap_or_else(|| Path::new("."));
    let mut assets = Assets::new(config);
    let loaded = assets.load_scene_models(&scene_file, scene_dir);
    println!("Models: {}/{} loaded", loaded, scene_file.models.len());
    Ok((world, scene_file, assets))
}
