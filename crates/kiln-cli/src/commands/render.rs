//! Headless frame through the full batched pipeline

use super::load_scene_with_assets;
use anyhow::{Context, Result};
use kiln_render::{FrameUniforms, HeadlessContext, MeshRenderer, MeshRendererSystem, RendererConfig};

pub struct RenderArgs {
    pub scene: String,
    pub output: Option<String>,
    pub width: u32,
    pub height: u32,
    pub time: f32,
}

pub fn run(args: RenderArgs, config: &RendererConfig) -> Result<()> {
    let (mut world, scene_file, mut assets) = load_scene_with_assets(&args.scene, config)?;
    if args.time != 0.0 {
        world.advance_animations(args.time);
    }

    let ctx = pollster::block_on(HeadlessContext::new(args.width, args.height))
        .context("Failed to create headless render context")?;
    println!("Adapter: {}", ctx.adapter_name);

    let mut renderer = MeshRenderer::new(&ctx.device, &ctx.queue, ctx.format, config);
    let mut system = MeshRendererSystem::new(config);
    let stats = system.build_frame(&world, &mut assets);

    let camera = scene_file.camera;
    let uniforms = FrameUniforms::look_at(
        camera.position,
        camera.target,
        camera.fov_degrees,
        ctx.aspect_ratio(),
        camera.near,
        camera.far,
        system.max_joints() as u32,
    );
    system
        .upload(&mut renderer, &ctx.queue, &mut assets, uniforms)
        .context("Failed to upload frame")?;

    let mut encoder = ctx
        .device
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Kiln Frame Encoder"),
        });
    let plan = renderer.encode(&mut encoder, &ctx.color_view, &ctx.depth_view, config.clear_color);
    ctx.queue.submit(std::iter::once(encoder.finish()));

    println!(
        "Frame: {} entries, {} commands, {} instances, {} triangles",
        stats.mesh_entries, stats.commands, stats.instances, stats.triangles
    );
    println!(
        "Dispatch: {:?} ({} draw call(s), multi-draw {})",
        plan,
        plan.draw_calls(),
        if renderer.supports_multi_draw() { "available" } else { "unavailable" }
    );

    let pixels = pollster::block_on(ctx.read_pixels()).context("Failed to read rendered pixels")?;
    if let Some(output) = &args.output {
        let img = image::RgbaImage::from_raw(ctx.width, ctx.height, pixels)
            .context("Failed to create image from pixel data")?;
        img.save(output)
            .with_context(|| format!("Failed to save image to {}", output))?;
        println!("Rendered {}x{} image to {}", ctx.width, ctx.height, output);
    }

    Ok(())
}
