//! Small glTF documents built in memory for tests.
//!
//! Each fixture can be packed into a GLB container or written to disk as a
//! `.gltf` + `.bin` pair.

use serde_json::{json, Map, Value};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;

/// A glTF document under construction: one binary buffer plus JSON members
#[derive(Debug, Clone, Default)]
pub struct Fixture {
    bin: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
    members: Map<String, Value>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_view(&mut self, bytes: &[u8]) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let offset = self.bin.len();
        self.bin.extend_from_slice(bytes);
        self.views.push(json!({
            "buffer": 0,
            "byteOffset": offset,
            "byteLength": bytes.len(),
        }));
        self.views.len() - 1
    }

    /// Float accessor with min/max bounds; returns the accessor index
    pub fn floats(&mut self, values: &[f32], kind: &str, width: usize) -> usize {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes);

        let mut min = vec![f32::INFINITY; width];
        let mut max = vec![f32::NEG_INFINITY; width];
        for element in values.chunks(width) {
            for (i, v) in element.iter().enumerate() {
                min[i] = min[i].min(*v);
                max[i] = max[i].max(*v);
            }
        }

        self.accessors.push(json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": values.len() / width,
            "type": kind,
            "min": min,
            "max": max,
        }));
        self.accessors.len() - 1
    }

    /// u16 accessor (indices, joint ids); returns the accessor index
    pub fn shorts(&mut self, values: &[u16], kind: &str, width: usize) -> usize {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes);
        self.accessors.push(json!({
            "bufferView": view,
            "componentType": UNSIGNED_SHORT,
            "count": values.len() / width,
            "type": kind,
        }));
        self.accessors.len() - 1
    }

    /// Set a top-level member such as `nodes` or `scene`
    pub fn member(&mut self, key: &str, value: Value) -> &mut Self {
        self.members.insert(key.to_string(), value);
        self
    }

    /// The glTF document, with the buffer pointing at `buffer_uri` when given
    pub fn document(&self, buffer_uri: Option<&str>) -> Value {
        let mut buffer = json!({ "byteLength": self.bin.len() });
        if let Some(uri) = buffer_uri {
            buffer["uri"] = json!(uri);
        }
        let mut root = json!({
            "asset": { "version": "2.0" },
            "buffers": [buffer],
            "bufferViews": self.views,
            "accessors": self.accessors,
        });
        if let Value::Object(map) = &mut root {
            map.extend(self.members.clone());
        }
        root
    }

    /// [`document`](Self::document) serialized to JSON text
    pub fn json(&self, buffer_uri: Option<&str>) -> String {
        self.document(buffer_uri).to_string()
    }

    /// Pack into a binary container
    pub fn to_glb(&self) -> Vec<u8> {
        let mut json = self.json(None).into_bytes();
        while json.len() % 4 != 0 {
            json.push(b' ');
        }
        let mut bin = self.bin.clone();
        while bin.len() % 4 != 0 {
            bin.push(0);
        }

        let total = 12 + 8 + json.len() + 8 + bin.len();
        let mut out = Vec::with_capacity(total);
        out.extend_from_slice(b"glTF");
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&(total as u32).to_le_bytes());
        out.extend_from_slice(&(json.len() as u32).to_le_bytes());
        out.extend_from_slice(b"JSON");
        out.extend_from_slice(&json);
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
        out
    }

    /// Write `<stem>.gltf` and `<stem>.bin` into `dir`
    pub fn write_gltf(&self, dir: &Path, stem: &str) -> io::Result<PathBuf> {
        let bin_name = format!("{}.bin", stem);
        fs::write(dir.join(&bin_name), &self.bin)?;
        let path = dir.join(format!("{}.gltf", stem));
        let text = serde_json::to_string_pretty(&self.document(Some(&bin_name)))?;
        fs::write(&path, text)?;
        Ok(path)
    }

    /// Write `<stem>.glb` into `dir`
    pub fn write_glb(&self, dir: &Path, stem: &str) -> io::Result<PathBuf> {
        let path = dir.join(format!("{}.glb", stem));
        fs::write(&path, self.to_glb())?;
        Ok(path)
    }
}

const TRIANGLE: [f32; 9] = [0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0];

/// One node, one mesh, one indexed primitive of 3 vertices
pub fn triangle() -> Fixture {
    let mut f = Fixture::new();
    let pos = f.floats(&TRIANGLE, "VEC3", 3);
    let idx = f.shorts(&[0, 1, 2], "SCALAR", 1);
    f.member(
        "meshes",
        json!([{ "primitives": [{ "attributes": { "POSITION": pos }, "indices": idx }] }]),
    )
    .member("nodes", json!([{ "mesh": 0 }]))
    .member("scenes", json!([{ "nodes": [0] }]))
    .member("scene", json!(0));
    f
}

/// Scenes exist but none is marked default
pub fn sceneless() -> Fixture {
    let mut f = Fixture::new();
    let pos = f.floats(&TRIANGLE, "VEC3", 3);
    f.member(
        "meshes",
        json!([{ "primitives": [{ "attributes": { "POSITION": pos } }] }]),
    )
    .member("nodes", json!([{ "mesh": 0 }]))
    .member("scenes", json!([{ "nodes": [0] }]));
    f
}

/// Three top-level nodes: an indexed triangle with normals and UVs
/// (translated +Y), a non-indexed 6-vertex quad (scaled 2x), and an empty node.
pub fn pair() -> Fixture {
    let mut f = Fixture::new();
    let pos = f.floats(&TRIANGLE, "VEC3", 3);
    let nrm = f.floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0], "VEC3", 3);
    let uv = f.floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0], "VEC2", 2);
    let idx = f.shorts(&[0, 1, 2], "SCALAR", 1);
    let quad = f.floats(
        &[
            0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0, 1.0, 0.0, 0.0, 1.0, 0.0,
        ],
        "VEC3",
        3,
    );
    f.member(
        "meshes",
        json!([
            { "primitives": [{
                "attributes": { "POSITION": pos, "NORMAL": nrm, "TEXCOORD_0": uv },
                "indices": idx,
            }] },
            { "primitives": [{ "attributes": { "POSITION": quad } }] },
        ]),
    )
    .member(
        "nodes",
        json!([
            { "mesh": 0, "translation": [0.0, 1.0, 0.0] },
            { "mesh": 1, "scale": [2.0, 2.0, 2.0] },
            { "name": "empty" },
        ]),
    )
    .member("scenes", json!([{ "nodes": [0, 1, 2] }]))
    .member("scene", json!(0));
    f
}

/// Skinned triangle with a two-joint skeleton (`root` -> `child`).
///
/// - `child` rests at (0,1,0); its inverse bind is translate(0,-1,0)
/// - clip 0 moves `child` linearly from (0,0,0) at t=0 to (1,0,0) at t=1,
///   steps `root` scale from 1 to 2, and rotates the (non-joint) mesh node
pub fn skinned() -> Fixture {
    let mut f = Fixture::new();
    let pos = f.floats(&TRIANGLE, "VEC3", 3);
    let joints = f.shorts(&[0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0], "VEC4", 4);
    let weights = f.floats(
        &[1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0],
        "VEC4",
        4,
    );
    let idx = f.shorts(&[0, 1, 2], "SCALAR", 1);
    let ibm = f.floats(
        &[
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, //
            1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, -1.0, 0.0, 1.0,
        ],
        "MAT4",
        16,
    );
    let times = f.floats(&[0.0, 1.0], "SCALAR", 1);
    let moves = f.floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0], "VEC3", 3);
    let spins = f.floats(&[0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0], "VEC4", 4);
    let grows = f.floats(&[1.0, 1.0, 1.0, 2.0, 2.0, 2.0], "VEC3", 3);

    f.member(
        "meshes",
        json!([{ "primitives": [{
            "attributes": { "POSITION": pos, "JOINTS_0": joints, "WEIGHTS_0": weights },
            "indices": idx,
        }] }]),
    )
    .member(
        "nodes",
        json!([
            { "mesh": 0, "skin": 0 },
            { "name": "root", "children": [2] },
            { "name": "child", "translation": [0.0, 1.0, 0.0] },
        ]),
    )
    .member(
        "skins",
        json!([{ "joints": [1, 2], "inverseBindMatrices": ibm }]),
    )
    .member(
        "animations",
        json!([{
            "samplers": [
                { "input": times, "output": moves },
                { "input": times, "output": spins },
                { "input": times, "output": grows, "interpolation": "STEP" },
            ],
            "channels": [
                { "sampler": 0, "target": { "node": 2, "path": "translation" } },
                { "sampler": 1, "target": { "node": 0, "path": "rotation" } },
                { "sampler": 2, "target": { "node": 1, "path": "scale" } },
            ],
        }]),
    )
    .member("scenes", json!([{ "nodes": [0, 1] }]))
    .member("scene", json!(0));
    f
}

/// Two meshes sharing a `crate_baseColor.png` image: mesh 0 references it
/// through its material, mesh 1 has no material at all.
pub fn textured() -> Fixture {
    let mut f = Fixture::new();
    let pos = f.floats(&TRIANGLE, "VEC3", 3);
    let uv = f.floats(&[0.0, 0.0, 1.0, 0.0, 0.0, 1.0], "VEC2", 2);
    let idx = f.shorts(&[0, 1, 2], "SCALAR", 1);
    f.member(
        "images",
        json!([{ "uri": "crate_baseColor.png" }, { "uri": "crate_normal.png" }]),
    )
    .member("textures", json!([{ "source": 0 }, { "source": 1 }]))
    .member(
        "materials",
        json!([{
            "pbrMetallicRoughness": { "baseColorTexture": { "index": 0 } },
            "normalTexture": { "index": 1 },
        }]),
    )
    .member(
        "meshes",
        json!([
            { "primitives": [{
                "attributes": { "POSITION": pos, "TEXCOORD_0": uv },
                "indices": idx,
                "material": 0,
            }] },
            { "primitives": [{ "attributes": { "POSITION": pos }, "indices": idx }] },
        ]),
    )
    .member(
        "nodes",
        json!([{ "mesh": 0 }, { "mesh": 1, "translation": [2.0, 0.0, 0.0] }]),
    )
    .member("scenes", json!([{ "nodes": [0, 1] }]))
    .member("scene", json!(0));
    f
}
