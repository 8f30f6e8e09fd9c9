//! GPU-visible record layouts shared with `mesh_shader.wgsl`

use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use kiln_core::Transform;

/// Per-instance transform and material/animation references (64 bytes)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct InstanceOrientation {
    pub position: [f32; 4],
    /// Euler degrees (x, y, z, unused)
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
    /// Index into the material bindings, -1 for untextured
    pub material_index: i32,
    /// Joint palette slot, -1 for static
    pub animation_index: i32,
    pub _pad: [u32; 3],
}

impl InstanceOrientation {
    pub const IDENTITY: Self = Self {
        position: [0.0, 0.0, 0.0, 1.0],
        rotation: [0.0; 4],
        scale: [1.0; 3],
        material_index: -1,
        animation_index: -1,
        _pad: [0; 3],
    };

    pub fn new(transform: &Transform, material_index: i32, animation_index: i32) -> Self {
        Self {
            position: transform.position.extend(1.0).to_array(),
            rotation: transform.rotation.extend(0.0).to_array(),
            scale: transform.scale.to_array(),
            material_index,
            animation_index,
            _pad: [0; 3],
        }
    }

    pub fn transform(&self) -> Transform {
        Transform {
            position: Vec3::from_slice(&self.position[..3]),
            rotation: Vec3::from_slice(&self.rotation[..3]),
            scale: Vec3::from(self.scale),
        }
    }
}

/// Texture unit a mesh entry's base color lives in (16 bytes)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Eq, Pod, Zeroable)]
pub struct MaterialBinding {
    pub texture_unit: i32,
    pub _pad: [i32; 3],
}

impl MaterialBinding {
    pub fn new(texture_unit: u32) -> Self {
        Self {
            texture_unit: texture_unit as i32,
            _pad: [0; 3],
        }
    }
}

/// Arguments of one indexed indirect draw (20 bytes, wgpu/Vulkan layout)
#[repr(C)]
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Pod, Zeroable)]
pub struct DrawIndexedIndirect {
    pub index_count: u32,
    pub instance_count: u32,
    pub first_index: u32,
    pub base_vertex: i32,
    pub first_instance: u32,
}

impl DrawIndexedIndirect {
    pub const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

pub const LIGHT_DIRECTIONAL: u32 = 0;
/// Terminates the light array for shader traversal
pub const LIGHT_ENDING: u32 = 1;

/// One light in the light storage buffer (64 bytes)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct LightRecord {
    pub kind: u32,
    pub ambient_strength: f32,
    pub diffuse_strength: f32,
    pub specular_strength: f32,
    pub position: [f32; 4],
    /// Direction the light travels, w = 0
    pub direction: [f32; 4],
    pub color: [f32; 4],
}

impl LightRecord {
    pub fn ending() -> Self {
        Self {
            kind: LIGHT_ENDING,
            ..Self::zeroed()
        }
    }

    pub fn is_ending(&self) -> bool {
        self.kind == LIGHT_ENDING
    }
}

/// Per-frame uniforms (group 0, binding 0)
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub view_pos: [f32; 4],
    /// x = joint matrices per palette slot
    pub params: [u32; 4],
}

impl FrameUniforms {
    pub fn new(view: Mat4, projection: Mat4, view_pos: Vec3, max_joints: u32) -> Self {
        Self {
            view: view.to_cols_array_2d(),
            projection: projection.to_cols_array_2d(),
            view_pos: view_pos.extend(1.0).to_array(),
            params: [max_joints, 0, 0, 0],
        }
    }

    /// Right-handed perspective camera with a 0..1 depth range
    pub fn look_at(
        eye: Vec3,
        target: Vec3,
        fov_degrees: f32,
        aspect: f32,
        near: f32,
        far: f32,
        max_joints: u32,
    ) -> Self {
        let view = Mat4::look_at_rh(eye, target, Vec3::Y);
        let projection = Mat4::perspective_rh(fov_degrees.to_radians(), aspect, near, far);
        Self::new(view, projection, eye, max_joints)
    }
}
