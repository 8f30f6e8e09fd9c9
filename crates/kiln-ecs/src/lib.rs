//! Kiln ECS - hecs world with stable ids and typed render components
//!
//! The renderer owns no entity state; every frame it walks the three
//! queries exposed here (static meshes, animated meshes, lights).

mod components;
mod scene;
mod world;

pub use components::{AnimationComponent, LightComponent, LightKind, MeshComponent};
pub use scene::{load_scene, load_scene_string, CameraDef, EntityDef, ModelDef, SceneFile};
pub use world::KilnWorld;
