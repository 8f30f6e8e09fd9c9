//! Skeletal animation for Kiln
//!
//! A model's first skin and first clip are extracted once into a
//! [`SkeletalAnimation`] record, cached in the [`SkeletalAnimationStore`]
//! under the model's name. Poses are evaluated on demand with
//! [`SkeletalAnimation::joint_matrices`]; sampling has no mutable state, so
//! the same time always yields the same matrices.

pub mod extract;
pub mod skeleton;
pub mod store;
pub mod track;

pub use extract::extract_skeletal_animation;
pub use skeleton::{Bone, SkeletalAnimation};
pub use store::{SkeletalAnimationStore, DEFAULT_MAX_JOINTS};
pub use track::{find_keyframe, quat_slerp, Interpolation, KeyPosition, Track};
