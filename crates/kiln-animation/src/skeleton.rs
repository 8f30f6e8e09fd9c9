//! Skeleton record and pose evaluation

use crate::track::Track;
use glam::{Mat4, Quat, Vec3};

/// One joint of a skin with its rest pose and keyframe tracks.
///
/// Translation, rotation and scale are keyed independently and need not
/// share timestamps.
#[derive(Debug, Clone)]
pub struct Bone {
    pub name: String,
    /// glTF node index of the joint
    pub node: usize,
    /// Index of the parent bone; `None` for roots
    pub parent: Option<usize>,
    pub inverse_bind: Mat4,
    pub rest_translation: Vec3,
    pub rest_rotation: Quat,
    pub rest_scale: Vec3,
    pub translation: Track<Vec3>,
    pub rotation: Track<Quat>,
    pub scale: Track<Vec3>,
}

impl Bone {
    pub fn new(name: impl Into<String>, node: usize) -> Self {
        Self {
            name: name.into(),
            node,
            parent: None,
            inverse_bind: Mat4::IDENTITY,
            rest_translation: Vec3::ZERO,
            rest_rotation: Quat::IDENTITY,
            rest_scale: Vec3::ONE,
            translation: Track::default(),
            rotation: Track::default(),
            scale: Track::default(),
        }
    }

    /// Local TRS at `time`, falling back to the rest pose per property
    pub fn local_pose(&self, time: f32) -> (Vec3, Quat, Vec3) {
        (
            self.translation.sample(time).unwrap_or(self.rest_translation),
            self.rotation.sample(time).unwrap_or(self.rest_rotation),
            self.scale.sample(time).unwrap_or(self.rest_scale),
        )
    }

    /// Local matrix = translate · rotate · scale
    pub fn local_matrix(&self, time: f32) -> Mat4 {
        let (t, r, s) = self.local_pose(time);
        Mat4::from_translation(t) * Mat4::from_quat(r) * Mat4::from_scale(s)
    }

    pub fn is_animated(&self) -> bool {
        !(self.translation.is_empty() && self.rotation.is_empty() && self.scale.is_empty())
    }
}

/// Everything needed to pose one skinned model.
///
/// Bones are stored in skin joint order and must list parents before
/// children so a single forward pass produces valid global transforms.
#[derive(Debug, Clone)]
pub struct SkeletalAnimation {
    pub name: String,
    pub clip_name: Option<String>,
    pub bones: Vec<Bone>,
    /// Largest keyframe timestamp across all tracks
    pub duration: f32,
    /// Length of every matrix array handed out
    pub max_joints: usize,
}

impl SkeletalAnimation {
    pub fn bone_count(&self) -> usize {
        self.bones.len()
    }

    /// Wrap `time` into `[0, duration)`. A zero-length clip always samples 0.
    pub fn wrap_time(&self, time: f32) -> f32 {
        if self.duration > 0.0 {
            time.rem_euclid(self.duration)
        } else {
            0.0
        }
    }

    /// Skinning matrices (`global · inverse_bind`) at `time`.
    ///
    /// Always `max_joints` long; entries past the last bone are identity.
    pub fn joint_matrices(&self, time: f32) -> Vec<Mat4> {
        let mut out = vec![Mat4::IDENTITY; self.max_joints];
        self.write_joint_matrices(time, &mut out);
        out
    }

    /// Same as [`joint_matrices`](Self::joint_matrices) into a caller slice.
    /// Writes `min(out.len(), bones)` matrices and fills the rest with identity.
    pub fn write_joint_matrices(&self, time: f32, out: &mut [Mat4]) {
        let time = self.wrap_time(time);
        let count = self.bones.len().min(out.len());
        let mut globals = vec![Mat4::IDENTITY; count];

        for i in 0..count {
            let bone = &self.bones[i];
            let local = bone.local_matrix(time);
            globals[i] = match bone.parent {
                Some(p) if p < count => globals[p] * local,
                _ => local,
            };
            out[i] = globals[i] * bone.inverse_bind;
        }
        for slot in out.iter_mut().skip(count) {
            *slot = Mat4::IDENTITY;
        }
    }

    /// True if any parent appears after its child
    pub fn has_unordered_parents(&self) -> bool {
        self.bones
            .iter()
            .enumerate()
            .any(|(i, b)| b.parent.is_some_and(|p| p >= i))
    }
}
