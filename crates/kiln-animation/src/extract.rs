//! Build a [`SkeletalAnimation`] from a loaded glTF document

use crate::skeleton::{Bone, SkeletalAnimation};
use crate::track::{Interpolation, Track};
use glam::{Mat4, Quat, Vec3};
use gltf::animation::util::ReadOutputs;
use gltf::animation::Property;
use kiln_core::Result;
use kiln_import::{node_trs, ModelDocument};

/// Extract the first skin and first animation clip of `model`.
///
/// Joints beyond `max_joints` are dropped with a warning. Channels that
/// target nodes outside the (kept) joint list are skipped. A document
/// without a skin yields a record with no bones, which poses as identity.
pub fn extract_skeletal_animation(
    name: &str,
    model: &ModelDocument,
    max_joints: usize,
) -> Result<SkeletalAnimation> {
    let document = model.document();
    let Some(skin) = document.skins().next() else {
        log::debug!("{}: no skin, posing with an empty skeleton", name);
        return Ok(SkeletalAnimation {
            name: name.to_string(),
            clip_name: None,
            bones: Vec::new(),
            duration: 0.0,
            max_joints,
        });
    };

    if document.skins().len() > 1 {
        log::warn!("{}: only the first of {} skins is used", name, document.skins().len());
    }

    let mut joints: Vec<gltf::Node<'_>> = skin.joints().collect();
    if joints.len() > max_joints {
        log::warn!(
            "{}: skin has {} joints, keeping the first {}",
            name,
            joints.len(),
            max_joints
        );
        joints.truncate(max_joints);
    }

    let inverse_binds: Vec<Mat4> = skin
        .reader(|buffer| model.buffer_data(buffer))
        .read_inverse_bind_matrices()
        .map(|iter| iter.map(|m| Mat4::from_cols_array_2d(&m)).collect())
        .unwrap_or_default();

    let mut bones: Vec<Bone> = joints
        .iter()
        .enumerate()
        .map(|(i, node)| {
            let (t, r, s) = node_trs(node);
            let mut bone = Bone::new(
                node.name().map(String::from).unwrap_or_else(|| format!("joint_{}", i)),
                node.index(),
            );
            bone.inverse_bind = inverse_binds.get(i).copied().unwrap_or(Mat4::IDENTITY);
            bone.rest_translation = t;
            bone.rest_rotation = r;
            bone.rest_scale = s;
            bone
        })
        .collect();

    // Parent links: scan each joint's children against the joint list
    for (parent_index, joint) in joints.iter().enumerate() {
        for child in joint.children() {
            if let Some(child_index) = joints.iter().position(|j| j.index() == child.index()) {
                bones[child_index].parent = Some(parent_index);
            }
        }
    }

    let mut record = SkeletalAnimation {
        name: name.to_string(),
        clip_name: None,
        bones,
        duration: 0.0,
        max_joints,
    };

    if record.has_unordered_parents() {
        log::warn!("{}: skin lists a child joint before its parent, poses will be wrong", name);
    }

    if let Some(clip) = document.animations().next() {
        record.clip_name = clip.name().map(String::from);
        read_clip(&mut record, model, &clip);
    } else {
        log::debug!("{}: skin has no animation clip, rest pose only", name);
    }

    Ok(record)
}

fn read_clip(record: &mut SkeletalAnimation, model: &ModelDocument, clip: &gltf::Animation<'_>) {
    for channel in clip.channels() {
        let target = channel.target().node().index();
        let Some(bone_index) = record.bones.iter().position(|b| b.node == target) else {
            log::debug!("{}: channel targets non-joint node {}", record.name, target);
            continue;
        };

        let reader = channel.reader(|buffer| model.buffer_data(buffer));
        let (Some(inputs), Some(outputs)) = (reader.read_inputs(), reader.read_outputs()) else {
            log::warn!("{}: channel on node {} has no data", record.name, target);
            continue;
        };
        let times: Vec<f32> = inputs.collect();

        let (interpolation, cubic) = match channel.sampler().interpolation() {
            gltf::animation::Interpolation::Step => (Interpolation::Step, false),
            gltf::animation::Interpolation::Linear => (Interpolation::Linear, false),
            gltf::animation::Interpolation::CubicSpline => (Interpolation::Linear, true),
        };

        let bone = &mut record.bones[bone_index];
        let stored = match (channel.target().property(), outputs) {
            (Property::Translation, ReadOutputs::Translations(values)) => {
                let values = key_values(values.map(Vec3::from).collect(), cubic);
                store(&mut bone.translation, times, values, interpolation)
            }
            (Property::Rotation, ReadOutputs::Rotations(values)) => {
                let values = key_values(values.into_f32().map(Quat::from_array).collect(), cubic);
                store(&mut bone.rotation, times, values, interpolation)
            }
            (Property::Scale, ReadOutputs::Scales(values)) => {
                let values = key_values(values.map(Vec3::from).collect(), cubic);
                store(&mut bone.scale, times, values, interpolation)
            }
            _ => None,
        };

        match stored {
            Some(end) => record.duration = record.duration.max(end),
            None => log::debug!(
                "{}: skipped {:?} channel on joint '{}'",
                record.name,
                channel.target().property(),
                record.bones[bone_index].name
            ),
        }
    }
}

/// Cubic-spline outputs come as (in-tangent, value, out-tangent) triples;
/// keep the value of each.
fn key_values<T: Copy>(raw: Vec<T>, cubic: bool) -> Vec<T> {
    if cubic {
        raw.chunks_exact(3).map(|triple| triple[1]).collect()
    } else {
        raw
    }
}

/// Install a track, truncating times and values to the shorter of the two;
/// returns its last timestamp.
fn store<T: crate::track::Interpolate>(
    track: &mut Track<T>,
    mut times: Vec<f32>,
    mut values: Vec<T>,
    interpolation: Interpolation,
) -> Option<f32> {
    let keys = times.len().min(values.len());
    if keys == 0 {
        return None;
    }
    if times.len() != values.len() {
        log::debug!("{} times vs {} values, keeping {} keys", times.len(), values.len(), keys);
        times.truncate(keys);
        values.truncate(keys);
    }
    *track = Track::new(times, values, interpolation);
    track.last_time()
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_import::{fixtures, ModelFormat};
    use std::path::Path;

    fn skinned_model() -> ModelDocument {
        let bytes = fixtures::skinned().to_glb();
        ModelDocument::parse("fox.glb", &bytes, ModelFormat::Binary, Path::new("fox.glb")).unwrap()
    }

    #[test]
    fn extracts_bones_and_hierarchy() {
        let model = skinned_model();
        let anim = extract_skeletal_animation("fox.glb", &model, 20).unwrap();

        assert_eq!(anim.bone_count(), 2);
        assert_eq!(anim.bones[0].name, "root");
        assert_eq!(anim.bones[0].parent, None);
        assert_eq!(anim.bones[1].name, "child");
        assert_eq!(anim.bones[1].parent, Some(0));
        assert_eq!(anim.bones[1].rest_translation, Vec3::new(0.0, 1.0, 0.0));
        assert!(anim.bones[1]
            .inverse_bind
            .abs_diff_eq(Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0)), 1e-6));
        assert_eq!(anim.duration, 1.0);
        assert_eq!(anim.max_joints, 20);
    }

    #[test]
    fn reads_tracks_and_skips_non_joint_channels() {
        let model = skinned_model();
        let anim = extract_skeletal_animation("fox.glb", &model, 20).unwrap();

        let child = &anim.bones[1];
        assert_eq!(child.translation.times, vec![0.0, 1.0]);
        assert_eq!(child.translation.values[1], Vec3::new(1.0, 0.0, 0.0));
        assert!(child.rotation.is_empty());

        let root = &anim.bones[0];
        assert_eq!(root.scale.interpolation, Interpolation::Step);
        assert!(root.translation.is_empty());
        // the mesh node's rotation channel is not a joint
        assert!(anim.bones.iter().all(|b| b.rotation.is_empty()));
    }

    #[test]
    fn scenario_half_second_pose() {
        let model = skinned_model();
        let anim = extract_skeletal_animation("fox.glb", &model, 20).unwrap();
        let m = anim.joint_matrices(0.5);

        assert_eq!(m.len(), 20);
        // root: step-held scale of 1 at t=0.5, identity inverse bind
        assert!(m[0].abs_diff_eq(Mat4::IDENTITY, 1e-6));
        // child: translated (0.5,0,0), then inverse bind translate(0,-1,0)
        let expected = Mat4::from_translation(Vec3::new(0.5, 0.0, 0.0))
            * Mat4::from_translation(Vec3::new(0.0, -1.0, 0.0));
        assert!(m[1].abs_diff_eq(expected, 1e-6));
        assert!(m[2..].iter().all(|m| *m == Mat4::IDENTITY));
    }

    #[test]
    fn boundary_samples_hit_first_and_last_keys() {
        let model = skinned_model();
        let anim = extract_skeletal_animation("fox.glb", &model, 20).unwrap();
        let track = &anim.bones[1].translation;
        assert_eq!(track.sample(0.0), Some(Vec3::ZERO));
        assert_eq!(track.sample(1.0), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(track.sample(1.5), Some(Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn joint_cap_truncates() {
        let model = skinned_model();
        let anim = extract_skeletal_animation("fox.glb", &model, 1).unwrap();
        assert_eq!(anim.bone_count(), 1);
        assert_eq!(anim.joint_matrices(0.5).len(), 1);
    }

    #[test]
    fn model_without_skin_poses_as_identity() {
        let bytes = fixtures::triangle().to_glb();
        let model =
            ModelDocument::parse("tri.glb", &bytes, ModelFormat::Binary, Path::new("tri.glb")).unwrap();
        let anim = extract_skeletal_animation("tri.glb", &model, 20).unwrap();
        assert_eq!(anim.bone_count(), 0);
        assert_eq!(anim.duration, 0.0);
        assert_eq!(anim.joint_matrices(0.7), vec![Mat4::IDENTITY; 20]);
    }

    #[test]
    fn mismatched_key_counts_truncate() {
        let mut track = Track::<Vec3>::default();
        let end = store(
            &mut track,
            vec![0.0, 0.5, 2.0],
            vec![Vec3::ZERO, Vec3::X],
            Interpolation::Linear,
        );
        assert_eq!(end, Some(0.5));
        assert_eq!(track.times, vec![0.0, 0.5]);
        assert_eq!(track.values, vec![Vec3::ZERO, Vec3::X]);

        let end = store(
            &mut track,
            vec![0.0, 1.5],
            vec![Vec3::ZERO, Vec3::Y, Vec3::Z],
            Interpolation::Step,
        );
        assert_eq!(end, Some(1.5));
        assert_eq!(track.values.len(), 2);

        assert_eq!(store(&mut track, Vec::new(), vec![Vec3::ONE], Interpolation::Linear), None);
    }

    #[test]
    fn cubic_values_keep_middle_of_triple() {
        let raw = vec![1, 2, 3, 4, 5, 6];
        assert_eq!(key_values(raw.clone(), true), vec![2, 5]);
        assert_eq!(key_values(raw, false), vec![1, 2, 3, 4, 5, 6]);
    }
}
