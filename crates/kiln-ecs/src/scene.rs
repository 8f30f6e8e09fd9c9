//! Scene files: the models a scene needs plus its entities, in TOML

use crate::components::{AnimationComponent, LightComponent, MeshComponent};
use crate::world::KilnWorld;
use glam::Vec3;
use kiln_core::{EntityId, Result, Transform};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Root structure of a scene TOML file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneFile {
    pub scene: SceneMetadata,
    #[serde(default)]
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub camera: CameraDef,
    #[serde(default)]
    pub entities: BTreeMap<String, EntityDef>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A model file to load before the first frame
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDef {
    /// Relative paths resolve against the scene file's directory
    pub path: String,
    #[serde(default)]
    pub animated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraDef {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for CameraDef {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 2.0, 6.0),
            target: Vec3::ZERO,
            fov_degrees: 60.0,
            near: 0.1,
            far: 500.0,
        }
    }
}

/// Definition of an entity in a scene file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityDef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mesh: Option<MeshComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub animation: Option<AnimationComponent>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub light: Option<LightComponent>,
}

/// Load a scene from a TOML file
pub fn load_scene<P: AsRef<Path>>(path: P) -> Result<(KilnWorld, SceneFile)> {
    let content = fs::read_to_string(path)?;
    load_scene_string(&content)
}

/// Load a scene from a TOML string
pub fn load_scene_string(content: &str) -> Result<(KilnWorld, SceneFile)> {
    let scene_file: SceneFile = toml::from_str(content)?;
    let mut world = KilnWorld::new();

    // Pinned ids first so free allocation never collides with them
    for (name, def) in scene_file.entities.iter().filter(|(_, d)| d.id.is_some()) {
        if let Some(raw) = def.id {
            world.spawn_with_id(EntityId::from_raw(raw), name.clone())?;
            apply_components(&mut world, EntityId::from_raw(raw), def)?;
        }
    }
    for (name, def) in scene_file.entities.iter().filter(|(_, d)| d.id.is_none()) {
        let id = world.spawn(name.clone())?;
        apply_components(&mut world, id, def)?;
    }

    log::debug!(
        "loaded scene '{}': {} entities, {} models",
        scene_file.scene.name,
        world.entity_count(),
        scene_file.models.len()
    );
    Ok((world, scene_file))
}

fn apply_components(world: &mut KilnWorld, id: EntityId, def: &EntityDef) -> Result<()> {
    // Anything drawable or lit needs a transform, so default one in
    let needs_transform = def.mesh.is_some() || def.light.is_some();
    match def.transform {
        Some(t) => world.insert(id, t)?,
        None if needs_transform => world.insert(id, Transform::default())?,
        None => {}
    }
    if let Some(mesh) = &def.mesh {
        world.insert(id, mesh.clone())?;
    }
    if let Some(anim) = def.animation {
        world.insert(id, anim)?;
    }
    if let Some(light) = def.light {
        world.insert(id, light)?;
    }
    Ok(())
}
