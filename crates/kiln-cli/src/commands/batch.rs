//! One CPU-side frame build, printed as mesh entries and indirect commands

use super::load_scene_with_assets;
use anyhow::Result;
use kiln_render::{MeshRendererSystem, RendererConfig};

pub fn run(scene: &str, time: f32, config: &RendererConfig) -> Result<()> {
    let (mut world, _, mut assets) = load_scene_with_assets(scene, config)?;
    if time != 0.0 {
        world.advance_animations(time);
    }

    let mut system = MeshRendererSystem::new(config);
    let stats = system.build_frame(&world, &mut assets);

    println!(
        "\nInstances: {} static, {} animated, {} skipped; {} light(s)",
        stats.static_instances, stats.animated_instances, stats.skipped_entities, stats.lights
    );

    println!("\nMesh entries ({}):", stats.mesh_entries);
    for entry in system.batch().entries() {
        println!(
            "  {:<28} vertices {:>6} @ {:<7} indices {:>6} @ {:<7} instances {}{}",
            entry.key.to_string(),
            entry.vertex_count,
            entry.base_vertex,
            entry.index_count,
            entry.first_index,
            entry.instance_count,
            if entry.skinned { " (skinned)" } else { "" }
        );
    }

    let draws = system.draws();
    println!("\nIndirect commands ({}):", draws.commands.len());
    for (i, c) in draws.commands.iter().enumerate() {
        println!(
            "  [{}] index_count {} instance_count {} first_index {} base_vertex {} first_instance {}",
            i, c.index_count, c.instance_count, c.first_index, c.base_vertex, c.first_instance
        );
    }
    println!(
        "\nMaterials: {}  Palette matrices: {}  Triangles: {}",
        draws.materials.len(),
        system.palette().len(),
        stats.triangles
    );
    Ok(())
}
