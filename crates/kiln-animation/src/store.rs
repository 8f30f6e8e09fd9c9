//! Per-model cache of extracted skeletal animations

use crate::extract::extract_skeletal_animation;
use crate::skeleton::SkeletalAnimation;
use kiln_core::{KilnError, Result};
use kiln_import::{AnimationSink, ModelDocument};
use std::collections::HashMap;

/// Joint cap used when none is configured
pub const DEFAULT_MAX_JOINTS: usize = 20;

/// Skeletal animation records keyed by model name.
///
/// A record is extracted once and never overwritten: a second load for the
/// same name is a no-op returning `false`.
pub struct SkeletalAnimationStore {
    records: HashMap<String, SkeletalAnimation>,
    max_joints: usize,
}

impl Default for SkeletalAnimationStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_JOINTS)
    }
}

impl SkeletalAnimationStore {
    pub fn new(max_joints: usize) -> Self {
        Self {
            records: HashMap::new(),
            max_joints: max_joints.max(1),
        }
    }

    pub fn max_joints(&self) -> usize {
        self.max_joints
    }

    pub fn load_from_document(&mut self, name: &str, model: &ModelDocument) -> Result<bool> {
        if self.records.contains_key(name) {
            return Ok(false);
        }
        let record = extract_skeletal_animation(name, model, self.max_joints)?;
        log::debug!(
            "'{}': {} bones, clip {:?} ({:.2}s)",
            name,
            record.bone_count(),
            record.clip_name,
            record.duration
        );
        self.records.insert(name.to_string(), record);
        Ok(true)
    }

    pub fn get(&self, name: &str) -> Result<&SkeletalAnimation> {
        self.records
            .get(name)
            .ok_or_else(|| KilnError::AnimationNotFound(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.records.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl AnimationSink for SkeletalAnimationStore {
    fn accept_document(&mut self, name: &str, model: &ModelDocument) -> Result<bool> {
        self.load_from_document(name, model)
    }
}
