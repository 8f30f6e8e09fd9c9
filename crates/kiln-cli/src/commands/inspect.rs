//! Model inspection command

use anyhow::{Context, Result};
use kiln_render::{Assets, RendererConfig};
use std::path::Path;

pub fn run(model: &str, animated: bool, config: &RendererConfig) -> Result<()> {
    let mut assets = Assets::new(config);
    let name = assets
        .load_model(Path::new(model), animated)
        .with_context(|| format!("Failed to load model {}", model))?;
    let doc = assets.models.get(&name)?;
    let gltf = doc.document();

    println!("Model: {}", name);
    println!("Path: {}", doc.path().display());

    match gltf.default_scene() {
        Some(scene) => {
            let roots: Vec<usize> = scene.nodes().map(|n| n.index()).collect();
            println!("Default scene: {} (root nodes {:?})", scene.index(), roots);
        }
        None => println!("Default scene: none"),
    }

    println!("\nNodes ({}):", gltf.nodes().len());
    for node in gltf.nodes() {
        let mut parts = Vec::new();
        if let Some(mesh) = node.mesh() {
            parts.push(format!("mesh {}", mesh.index()));
        }
        if let Some(skin) = node.skin() {
            parts.push(format!("skin {}", skin.index()));
        }
        let children = node.children().count();
        if children > 0 {
            parts.push(format!("{} children", children));
        }
        println!(
            "  [{}] {:<20} {}",
            node.index(),
            node.name().unwrap_or("-"),
            parts.join(", ")
        );
    }

    println!("\nMeshes ({}):", gltf.meshes().len());
    for mesh in gltf.meshes() {
        let primitives = mesh.primitives().len();
        let vertices: usize = mesh
            .primitives()
            .filter_map(|p| p.get(&gltf::Semantic::Positions).map(|a| a.count()))
            .sum();
        let texture = mesh.primitives().find_map(|p| doc.base_color_texture(&p));
        println!(
            "  [{}] {:<20} {} primitive(s), {} vertices{}",
            mesh.index(),
            mesh.name().unwrap_or("-"),
            primitives,
            vertices,
            texture
                .map(|t| format!(", base color '{}'", t))
                .unwrap_or_default()
        );
    }

    println!("\nSkins: {}", gltf.skins().len());
    println!("Animations: {}", gltf.animations().len());
    println!("Textures registered: {}", assets.textures.len());

    if animated {
        match assets.animations.get(&name) {
            Ok(anim) => {
                println!(
                    "\nSkeletal animation: {} bones (cap {}), clip {}, {:.3}s",
                    anim.bone_count(),
                    anim.max_joints,
                    anim.clip_name.as_deref().unwrap_or("-"),
                    anim.duration
                );
                for (i, bone) in anim.bones.iter().enumerate() {
                    let parent = bone
                        .parent
                        .map(|p| p.to_string())
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  [{}] {:<20} parent {:<3} {}",
                        i,
                        bone.name,
                        parent,
                        if bone.is_animated() { "animated" } else { "rest" }
                    );
                }
            }
            Err(e) => println!("\nSkeletal animation: none ({})", e),
        }
    }

    Ok(())
}
