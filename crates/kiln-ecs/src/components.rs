//! Component types the renderer queries for

use glam::Vec3;
use serde::{Deserialize, Serialize};

/// References a cached model by name (the model file's basename).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshComponent {
    pub model: String,
}

impl MeshComponent {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }
}

/// Marks an entity as skinned and tracks its playback clock.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnimationComponent {
    pub enabled: bool,
    /// Playback rate multiplier
    pub speed: f32,
    /// Seconds since playback started (wrapped by the sampler, not here)
    pub time: f32,
}

impl Default for AnimationComponent {
    fn default() -> Self {
        Self {
            enabled: true,
            speed: 1.0,
            time: 0.0,
        }
    }
}

impl AnimationComponent {
    pub fn advance(&mut self, dt: f32) {
        if self.enabled {
            self.time += dt * self.speed;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LightKind {
    #[default]
    Directional,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightComponent {
    pub kind: LightKind,
    pub color: Vec3,
    pub ambient_strength: f32,
    pub diffuse_strength: f32,
    pub specular_strength: f32,
}

impl Default for LightComponent {
    fn default() -> Self {
        Self {
            kind: LightKind::Directional,
            color: Vec3::ONE,
            ambient_strength: 0.1,
            diffuse_strength: 0.8,
            specular_strength: 0.5,
        }
    }
}
