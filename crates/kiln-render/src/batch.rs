//! Geometry batch builder
//!
//! Flattens the primitives of every (model, node) pair seen in a frame into
//! one set of shared staging arrays. Geometry for a pair is copied once per
//! frame no matter how many instances reference it; later instances only
//! add an orientation record.

use crate::registry::InstanceRegistry;
use crate::textures::TextureBinder;
use crate::types::InstanceOrientation;
use gltf::accessor::{DataType, Dimensions};
use gltf::Semantic;
use kiln_core::{KilnError, Result, Transform};
use kiln_import::{node_trs, ModelCache, ModelDocument};
use std::collections::HashMap;
use std::fmt;

/// Identifies one top-level node of one model
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeshKey {
    pub model: String,
    pub node: usize,
}

impl MeshKey {
    pub fn new(model: impl Into<String>, node: usize) -> Self {
        Self {
            model: model.into(),
            node,
        }
    }
}

impl fmt::Display for MeshKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.model, self.node)
    }
}

/// A registered (model, node) slice of the staging arrays.
///
/// Offsets are fixed once the entry exists; only `instance_count` grows.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshEntry {
    pub key: MeshKey,
    pub first_index: u32,
    pub index_count: u32,
    /// First vertex of the entry. Staged indices are entry-relative and the
    /// draw adds this as its base vertex, so it must not be baked into them.
    pub base_vertex: u32,
    pub vertex_count: u32,
    pub instance_count: u32,
    pub skinned: bool,
}

/// CPU-side vertex and index data for the whole frame.
///
/// Attribute arrays stay aligned with `positions`; indices are relative to
/// the owning entry's `base_vertex`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StagingGeometry {
    pub positions: Vec<[f32; 3]>,
    pub normals: Vec<[f32; 3]>,
    pub texcoords: Vec<[f32; 2]>,
    pub joints: Vec<[u32; 4]>,
    pub weights: Vec<[f32; 4]>,
    pub indices: Vec<u32>,
}

impl StagingGeometry {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Zero-fill any attribute array lagging behind the vertex count
    pub fn pad_to_vertex_count(&mut self) {
        let n = self.positions.len();
        self.normals.resize(n, [0.0; 3]);
        self.texcoords.resize(n, [0.0; 2]);
        self.joints.resize(n, [0; 4]);
        self.weights.resize(n, [0.0; 4]);
    }

    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.texcoords.clear();
        self.joints.clear();
        self.weights.clear();
        self.indices.clear();
    }
}

/// Decoded primitive awaiting commit to the staging arrays
struct PrimitiveData {
    positions: Vec<[f32; 3]>,
    normals: Option<Vec<[f32; 3]>>,
    texcoords: Option<Vec<[f32; 2]>>,
    joints: Option<Vec<[u32; 4]>>,
    weights: Option<Vec<[f32; 4]>>,
    /// Relative to the primitive's first vertex
    indices: Vec<u32>,
}

/// A new entry fully decoded but not yet committed
struct PendingEntry {
    key: MeshKey,
    primitives: Vec<PrimitiveData>,
    base_color: Option<String>,
}

pub struct GeometryBatch {
    entries: Vec<MeshEntry>,
    lookup: HashMap<MeshKey, usize>,
    registry: InstanceRegistry,
    staging: StagingGeometry,
    dirty: bool,
    max_joints: u32,
    geometry_copies: usize,
}

impl GeometryBatch {
    pub fn new(max_texture_units: u32, max_joints: usize) -> Self {
        Self {
            entries: Vec::new(),
            lookup: HashMap::new(),
            registry: InstanceRegistry::new(max_texture_units),
            staging: StagingGeometry::default(),
            dirty: false,
            max_joints: max_joints.max(1) as u32,
            geometry_copies: 0,
        }
    }

    /// Drop every entry, instance, binding and staged vertex
    pub fn clean_up(&mut self) {
        self.entries.clear();
        self.lookup.clear();
        self.registry.clear();
        self.staging.clear();
        self.dirty = false;
        self.geometry_copies = 0;
    }

    /// Register one instance of `model_name` at `transform`.
    ///
    /// Every top-level node with a mesh contributes one orientation record.
    /// Nodes not yet seen this frame are decoded and validated first; on any
    /// error nothing from this call is kept.
    pub fn add_model_instance(
        &mut self,
        models: &ModelCache,
        binder: &mut dyn TextureBinder,
        model_name: &str,
        transform: &Transform,
        animation_index: i32,
    ) -> Result<()> {
        let model = models.get(model_name)?;
        let scene = model
            .document()
            .default_scene()
            .ok_or_else(|| KilnError::NoDefaultScene(model_name.to_string()))?;

        let mut pending = Vec::new();
        for node in scene.nodes() {
            let Some(mesh) = node.mesh() else {
                continue;
            };
            let key = MeshKey::new(model_name, node.index());
            if self.lookup.contains_key(&key) {
                continue;
            }
            let primitives = mesh
                .primitives()
                .map(|p| decode_primitive(model, &p, self.max_joints))
                .collect::<Result<Vec<_>>>()?;
            let base_color = mesh
                .primitives()
                .find_map(|p| model.base_color_texture(&p));
            pending.push(PendingEntry {
                key,
                primitives,
                base_color,
            });
        }

        for entry in pending {
            self.commit_entry(entry, binder);
        }

        for node in scene.nodes() {
            if node.mesh().is_none() {
                continue;
            }
            let key = MeshKey::new(model_name, node.index());
            let Some(&entry) = self.lookup.get(&key) else {
                continue;
            };
            let (t, r, s) = node_trs(&node);
            let placed = transform.combine_additive(t, r, s);
            let material = self.registry.material(entry).map_or(-1, |m| m as i32);
            self.registry
                .push(entry, InstanceOrientation::new(&placed, material, animation_index));
            self.entries[entry].instance_count += 1;
        }

        self.dirty = true;
        Ok(())
    }

    fn commit_entry(&mut self, pending: PendingEntry, binder: &mut dyn TextureBinder) {
        let base_vertex = self.staging.vertex_count() as u32;
        let first_index = self.staging.indices.len() as u32;
        let mut skinned = false;

        for prim in pending.primitives {
            let n = prim.positions.len();
            let offset = self.staging.vertex_count() as u32 - base_vertex;
            skinned |= prim.joints.is_some() && prim.weights.is_some();

            let staging = &mut self.staging;
            staging.positions.extend(prim.positions);
            staging
                .normals
                .extend(prim.normals.unwrap_or_else(|| vec![[0.0; 3]; n]));
            staging
                .texcoords
                .extend(prim.texcoords.unwrap_or_else(|| vec![[0.0; 2]; n]));
            match (prim.joints, prim.weights) {
                (Some(joints), Some(weights)) => {
                    staging.joints.extend(joints);
                    staging.weights.extend(weights);
                }
                _ => {
                    staging.joints.extend(std::iter::repeat([0; 4]).take(n));
                    staging.weights.extend(std::iter::repeat([0.0; 4]).take(n));
                }
            }
            staging.indices.extend(prim.indices.iter().map(|i| i + offset));
        }
        self.geometry_copies += 1;

        let index = self.registry.add_entry();
        let entry = MeshEntry {
            key: pending.key.clone(),
            first_index,
            index_count: self.staging.indices.len() as u32 - first_index,
            base_vertex,
            vertex_count: self.staging.vertex_count() as u32 - base_vertex,
            instance_count: 0,
            skinned,
        };
        log::trace!(
            "mesh entry {}: {} vertices, {} indices",
            entry.key,
            entry.vertex_count,
            entry.index_count
        );
        self.entries.push(entry);
        self.lookup.insert(pending.key, index);

        if let Some(texture) = pending.base_color {
            self.registry.bind_material(index, &texture, binder);
        }
    }

    /// Entries in registration order
    pub fn entries(&self) -> &[MeshEntry] {
        &self.entries
    }

    pub fn entry(&self, key: &MeshKey) -> Option<&MeshEntry> {
        self.lookup.get(key).map(|&i| &self.entries[i])
    }

    pub fn registry(&self) -> &InstanceRegistry {
        &self.registry
    }

    pub fn staging(&self) -> &StagingGeometry {
        &self.staging
    }

    pub fn staging_mut(&mut self) -> &mut StagingGeometry {
        &mut self.staging
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// How many entries had their geometry copied since the last clean-up
    pub fn geometry_copies(&self) -> usize {
        self.geometry_copies
    }

    pub fn instance_count(&self) -> usize {
        self.registry.total_instances()
    }
}

#[derive(Debug, Clone, Copy)]
enum Encoding {
    Float,
    FloatOrNormalized,
    Unsigned,
    Index,
}

fn encoding_supported(encoding: Encoding, data_type: DataType, normalized: bool) -> bool {
    match encoding {
        Encoding::Float => data_type == DataType::F32,
        Encoding::FloatOrNormalized => {
            data_type == DataType::F32
                || (normalized && matches!(data_type, DataType::U8 | DataType::U16))
        }
        Encoding::Unsigned => !normalized && matches!(data_type, DataType::U8 | DataType::U16),
        Encoding::Index => matches!(data_type, DataType::U8 | DataType::U16 | DataType::U32),
    }
}

fn check_accessor(
    model: &str,
    attribute: &str,
    accessor: Option<gltf::Accessor<'_>>,
    encoding: Encoding,
    dimensions: Dimensions,
    required: bool,
) -> Result<()> {
    match accessor {
        None if required => Err(KilnError::MissingAttribute {
            model: model.to_string(),
            attribute: attribute.to_string(),
        }),
        None => Ok(()),
        Some(a)
            if a.dimensions() == dimensions
                && encoding_supported(encoding, a.data_type(), a.normalized()) =>
        {
            Ok(())
        }
        Some(_) => Err(KilnError::UnsupportedEncoding {
            model: model.to_string(),
            attribute: attribute.to_string(),
        }),
    }
}

fn decode_primitive(
    model: &ModelDocument,
    primitive: &gltf::Primitive<'_>,
    max_joints: u32,
) -> Result<PrimitiveData> {
    let name = model.name();
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        return Err(KilnError::UnsupportedEncoding {
            model: name.to_string(),
            attribute: format!("mode {:?}", primitive.mode()),
        });
    }
    let get = |s: Semantic| primitive.get(&s);
    check_accessor(name, "POSITION", get(Semantic::Positions), Encoding::Float, Dimensions::Vec3, true)?;
    check_accessor(name, "NORMAL", get(Semantic::Normals), Encoding::Float, Dimensions::Vec3, false)?;
    check_accessor(name, "TEXCOORD_0", get(Semantic::TexCoords(0)), Encoding::FloatOrNormalized, Dimensions::Vec2, false)?;
    check_accessor(name, "JOINTS_0", get(Semantic::Joints(0)), Encoding::Unsigned, Dimensions::Vec4, false)?;
    check_accessor(name, "WEIGHTS_0", get(Semantic::Weights(0)), Encoding::FloatOrNormalized, Dimensions::Vec4, false)?;
    check_accessor(name, "indices", primitive.indices(), Encoding::Index, Dimensions::Scalar, false)?;

    let reader = primitive.reader(|buffer| model.buffer_data(buffer));
    let positions: Vec<[f32; 3]> = reader
        .read_positions()
        .ok_or_else(|| KilnError::MissingAttribute {
            model: name.to_string(),
            attribute: "POSITION".to_string(),
        })?
        .collect();
    let n = positions.len();

    let normals = reader
        .read_normals()
        .map(|it| it.collect::<Vec<_>>())
        .filter(|v| v.len() == n);
    let texcoords = reader
        .read_tex_coords(0)
        .map(|it| it.into_f32().collect::<Vec<_>>())
        .filter(|v| v.len() == n);
    let mut joints = reader
        .read_joints(0)
        .map(|it| {
            it.into_u16()
                .map(|j| j.map(u32::from))
                .collect::<Vec<[u32; 4]>>()
        })
        .filter(|v| v.len() == n);
    let mut weights = reader
        .read_weights(0)
        .map(|it| it.into_f32().collect::<Vec<_>>())
        .filter(|v| v.len() == n);

    // Influences from joints past the cap would read another skeleton's slot
    if let (Some(joints), Some(weights)) = (joints.as_mut(), weights.as_mut()) {
        for (j, w) in joints.iter_mut().zip(weights.iter_mut()) {
            for k in 0..4 {
                if j[k] >= max_joints {
                    j[k] = 0;
                    w[k] = 0.0;
                }
            }
        }
    } else {
        joints = None;
        weights = None;
    }

    let indices: Vec<u32> = match reader.read_indices() {
        Some(it) => it.into_u32().collect(),
        None => (0..n as u32).collect(),
    };
    if let Some(bad) = indices.iter().find(|&&i| i as usize >= n) {
        return Err(KilnError::ImportError(format!(
            "{}: index {} out of range for {} vertices",
            name, bad, n
        )));
    }

    Ok(PrimitiveData {
        positions,
        normals,
        texcoords,
        joints,
        weights,
        indices,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textures::TextureLibrary;
    use glam::Vec3;
    use kiln_import::fixtures::{self, Fixture};
    use kiln_import::{LoadHooks, NoAnimations};
    use std::path::Path;

    fn load(cache: &mut ModelCache, textures: &mut TextureLibrary, name: &str, fixture: Fixture) {
        cache
            .load_from_slice(
                name,
                &fixture.to_glb(),
                Path::new("assets"),
                false,
                LoadHooks::new(textures, &mut NoAnimations),
            )
            .unwrap();
    }

    fn setup(name: &str, fixture: Fixture) -> (ModelCache, TextureLibrary, GeometryBatch) {
        let mut cache = ModelCache::default();
        let mut textures = TextureLibrary::new(16, 4);
        load(&mut cache, &mut textures, name, fixture);
        (cache, textures, GeometryBatch::new(16, 20))
    }

    #[test]
    fn five_instances_share_one_entry() {
        let (cache, mut textures, mut batch) = setup("tri.glb", fixtures::triangle());
        for i in 0..5 {
            let t = Transform::from_position(Vec3::new(i as f32, 0.0, 0.0));
            batch
                .add_model_instance(&cache, &mut textures, "tri.glb", &t, -1)
                .unwrap();
        }

        assert_eq!(batch.entries().len(), 1);
        assert_eq!(batch.geometry_copies(), 1);
        let entry = &batch.entries()[0];
        assert_eq!(entry.instance_count, 5);
        assert_eq!(entry.index_count, 3);
        assert_eq!(entry.vertex_count, 3);
        assert_eq!(batch.staging().positions.len(), 3);
        assert_eq!(batch.staging().indices, vec![0, 1, 2]);
        assert_eq!(batch.registry().instances(0).len(), 5);
        assert!(batch.is_dirty());
    }

    #[test]
    fn nodes_become_separate_entries() {
        let (cache, mut textures, mut batch) = setup("pair.glb", fixtures::pair());
        let t = Transform::from_position(Vec3::new(10.0, 0.0, 0.0));
        batch
            .add_model_instance(&cache, &mut textures, "pair.glb", &t, -1)
            .unwrap();
        batch
            .add_model_instance(&cache, &mut textures, "pair.glb", &Transform::default(), -1)
            .unwrap();

        // empty node skipped
        assert_eq!(batch.entries().len(), 2);
        assert_eq!(batch.geometry_copies(), 2);

        let tri = batch.entry(&MeshKey::new("pair.glb", 0)).unwrap();
        let quad = batch.entry(&MeshKey::new("pair.glb", 1)).unwrap();
        assert_eq!((tri.base_vertex, tri.vertex_count, tri.first_index), (0, 3, 0));
        assert_eq!((quad.base_vertex, quad.vertex_count, quad.first_index), (3, 6, 3));
        assert_eq!(quad.index_count, 6);
        assert_eq!(tri.instance_count, 2);
        assert_eq!(quad.instance_count, 2);

        // synthesized indices, relative to the entry
        assert_eq!(&batch.staging().indices[3..], &[0, 1, 2, 3, 4, 5]);
        for entry in batch.entries() {
            let start = entry.first_index as usize;
            let indices = &batch.staging().indices[start..start + entry.index_count as usize];
            assert!(indices.iter().all(|i| *i < entry.vertex_count));
        }
        // normals zero-filled for the quad
        let staging = batch.staging();
        assert_eq!(staging.normals.len(), 9);
        assert_eq!(staging.normals[0], [0.0, 0.0, 1.0]);
        assert_eq!(staging.normals[5], [0.0; 3]);
        assert_eq!(staging.texcoords.len(), 9);
    }

    #[test]
    fn node_transform_combines_additively() {
        let (cache, mut textures, mut batch) = setup("pair.glb", fixtures::pair());
        let t = Transform::from_position(Vec3::new(10.0, 0.0, 0.0)).with_scale(Vec3::splat(3.0));
        batch
            .add_model_instance(&cache, &mut textures, "pair.glb", &t, -1)
            .unwrap();

        let tri = batch.registry().instances(0)[0].transform();
        assert_eq!(tri.position, Vec3::new(10.0, 1.0, 0.0));
        assert_eq!(tri.scale, Vec3::splat(3.0));
        let quad = batch.registry().instances(1)[0].transform();
        assert_eq!(quad.position, Vec3::new(10.0, 0.0, 0.0));
        assert_eq!(quad.scale, Vec3::splat(6.0));
    }

    #[test]
    fn missing_model_and_missing_scene() {
        let (mut cache, mut textures, mut batch) = setup("tri.glb", fixtures::triangle());
        let err = batch
            .add_model_instance(&cache, &mut textures, "nope.glb", &Transform::default(), -1)
            .unwrap_err();
        assert!(matches!(err, KilnError::ModelNotFound(_)));

        load(&mut cache, &mut textures, "loose.glb", fixtures::sceneless());
        let err = batch
            .add_model_instance(&cache, &mut textures, "loose.glb", &Transform::default(), -1)
            .unwrap_err();
        assert!(matches!(err, KilnError::NoDefaultScene(_)));
        assert!(batch.entries().is_empty());
        assert!(!batch.is_dirty());
    }

    #[test]
    fn clean_up_resets_everything() {
        let (cache, mut textures, mut batch) = setup("pair.glb", fixtures::pair());
        batch
            .add_model_instance(&cache, &mut textures, "pair.glb", &Transform::default(), -1)
            .unwrap();
        batch.clean_up();

        assert!(batch.entries().is_empty());
        assert_eq!(batch.staging(), &StagingGeometry::default());
        assert_eq!(batch.instance_count(), 0);
        assert!(batch.registry().bindings().is_empty());
        assert!(!batch.is_dirty());

        // re-registration after clean-up copies geometry again
        batch
            .add_model_instance(&cache, &mut textures, "pair.glb", &Transform::default(), -1)
            .unwrap();
        assert_eq!(batch.geometry_copies(), 2);
    }

    #[test]
    fn base_color_textures_bind_per_entry() {
        let (cache, mut textures, mut batch) = setup("crate.glb", fixtures::textured());
        for _ in 0..3 {
            batch
                .add_model_instance(&cache, &mut textures, "crate.glb", &Transform::default(), -1)
                .unwrap();
        }

        assert_eq!(batch.registry().bindings().len(), 2);
        assert_eq!(batch.registry().material(0), Some(0));
        assert_eq!(batch.registry().material(1), Some(1));
        assert!(batch.registry().instances(1).iter().all(|r| r.material_index == 1));
        assert_eq!(textures.bound(0), Some("crate_baseColor"));
        assert_eq!(textures.bound(1), Some("crate_baseColor"));
    }

    #[test]
    fn texture_unit_cap_leaves_entries_untextured() {
        let mut cache = ModelCache::default();
        let mut textures = TextureLibrary::new(16, 4);
        load(&mut cache, &mut textures, "crate.glb", fixtures::textured());
        let mut batch = GeometryBatch::new(1, 20);
        batch
            .add_model_instance(&cache, &mut textures, "crate.glb", &Transform::default(), -1)
            .unwrap();

        assert_eq!(batch.registry().instances(0)[0].material_index, 0);
        assert_eq!(batch.registry().instances(1)[0].material_index, -1);
    }

    #[test]
    fn skin_attributes_staged_and_capped() {
        let (cache, mut textures, _) = setup("fox.glb", fixtures::skinned());
        let mut batch = GeometryBatch::new(16, 1);
        batch
            .add_model_instance(&cache, &mut textures, "fox.glb", &Transform::default(), 0)
            .unwrap();

        // node 1 (root joint) has no mesh: one entry
        assert_eq!(batch.entries().len(), 1);
        let entry = &batch.entries()[0];
        assert!(entry.skinned);
        let staging = batch.staging();
        assert_eq!(staging.joints[0], [0, 0, 0, 0]);
        assert_eq!(staging.weights[0], [1.0, 0.0, 0.0, 0.0]);
        // joint 1 is past a cap of 1
        assert_eq!(staging.joints[1], [0, 0, 0, 0]);
        assert_eq!(staging.weights[1], [0.0; 4]);
        assert_eq!(batch.registry().instances(0)[0].animation_index, 0);
    }

    #[test]
    fn encodings() {
        assert!(encoding_supported(Encoding::Float, DataType::F32, false));
        assert!(!encoding_supported(Encoding::Float, DataType::U16, true));
        assert!(encoding_supported(Encoding::FloatOrNormalized, DataType::U8, true));
        assert!(!encoding_supported(Encoding::FloatOrNormalized, DataType::U8, false));
        assert!(encoding_supported(Encoding::Unsigned, DataType::U16, false));
        assert!(!encoding_supported(Encoding::Unsigned, DataType::U32, false));
        assert!(encoding_supported(Encoding::Index, DataType::U32, false));
        assert!(!encoding_supported(Encoding::Index, DataType::F32, false));
    }
}
