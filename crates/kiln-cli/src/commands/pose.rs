//! Print skinning matrices for a model at a point in its clip

use anyhow::{bail, Context, Result};
use kiln_render::{Assets, RendererConfig};
use std::path::Path;

pub fn run(model: &str, time: f32, config: &RendererConfig) -> Result<()> {
    let mut assets = Assets::new(config);
    let name = assets
        .load_model(Path::new(model), true)
        .with_context(|| format!("Failed to load model {}", model))?;
    let anim = match assets.animations.get(&name) {
        Ok(anim) => anim,
        Err(e) => bail!("{} has no skeletal animation: {}", name, e),
    };

    println!(
        "{}: {} bones, clip {:.3}s, t = {} (wrapped {:.4})",
        name,
        anim.bone_count(),
        anim.duration,
        time,
        anim.wrap_time(time)
    );

    let matrices = anim.joint_matrices(time);
    for (i, (bone, m)) in anim.bones.iter().zip(&matrices).enumerate() {
        println!("\njoint {} {}", i, bone.name);
        // row-major for reading
        for row in 0..4 {
            let r = m.row(row);
            println!("  [{:>9.4} {:>9.4} {:>9.4} {:>9.4}]", r.x, r.y, r.z, r.w);
        }
    }
    Ok(())
}
