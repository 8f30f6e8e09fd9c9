//! Light collection from the ECS world

use crate::types::{LightRecord, LIGHT_DIRECTIONAL};
use glam::Vec3;
use kiln_core::Transform;
use kiln_ecs::{KilnWorld, LightComponent, LightKind};

/// Direction a light with `transform` shines along: its local -Z
pub fn light_direction(transform: &Transform) -> Vec3 {
    (transform.rotation_quat() * Vec3::NEG_Z).normalize_or_zero()
}

pub fn light_record(transform: &Transform, light: &LightComponent) -> LightRecord {
    let kind = match light.kind {
        LightKind::Directional => LIGHT_DIRECTIONAL,
    };
    LightRecord {
        kind,
        ambient_strength: light.ambient_strength,
        diffuse_strength: light.diffuse_strength,
        specular_strength: light.specular_strength,
        position: transform.position.extend(1.0).to_array(),
        direction: light_direction(transform).extend(0.0).to_array(),
        color: light.color.extend(1.0).to_array(),
    }
}

/// Every light in `world`, at most `max_lights`, followed by the sentinel
pub fn collect_lights(world: &KilnWorld, max_lights: usize) -> Vec<LightRecord> {
    let mut lights = Vec::new();
    let mut dropped = 0;
    world.each_light(|_, transform, light| {
        if lights.len() < max_lights {
            lights.push(light_record(transform, light));
        } else {
            dropped += 1;
        }
    });
    if dropped > 0 {
        log::warn!("{} light(s) past the limit of {} ignored", dropped, max_lights);
    }
    lights.push(LightRecord::ending());
    lights
}
