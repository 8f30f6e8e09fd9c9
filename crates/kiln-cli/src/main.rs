//! Kiln CLI - inspect models, pose skeletons and run batched frames

mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use commands::{batch, inspect, pose, render};
use kiln_render::RendererConfig;
use std::path::Path;

#[derive(Parser)]
#[command(name = "kiln")]
#[command(about = "Batched glTF renderer with skeletal animation", long_about = None)]
#[command(version)]
struct Cli {
    /// Renderer configuration file (defaults apply if missing)
    #[arg(long, global = true, default_value = "kiln.toml")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show nodes, meshes, skins and animations of a model
    Inspect {
        /// Path to a .gltf or .glb file
        model: String,

        /// Extract the skeletal animation as well
        #[arg(long)]
        animated: bool,
    },

    /// Print joint matrices of a skinned model at a time
    Pose {
        /// Path to a .gltf or .glb file
        model: String,

        /// Clip time in seconds (wrapped to the clip length)
        #[arg(long, default_value = "0")]
        time: f32,
    },

    /// Build one frame on the CPU and print the batch
    Batch {
        /// Path to scene file
        scene: String,

        /// Advance animation clocks by this many seconds first
        #[arg(long, default_value = "0")]
        time: f32,
    },

    /// Render one frame headless through the GPU pipeline
    Render {
        /// Path to scene file
        scene: String,

        /// Write the frame to this PNG
        #[arg(short, long)]
        output: Option<String>,

        /// Image width in pixels
        #[arg(long, default_value = "1280")]
        width: u32,

        /// Image height in pixels
        #[arg(long, default_value = "720")]
        height: u32,

        /// Advance animation clocks by this many seconds first
        #[arg(long, default_value = "0")]
        time: f32,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config = RendererConfig::load_or_default(Path::new(&cli.config))
        .with_context(|| format!("Failed to load config {}", cli.config))?;

    match cli.command {
        Commands::Inspect { model, animated } => inspect::run(&model, animated, &config),
        Commands::Pose { model, time } => pose::run(&model, time, &config),
        Commands::Batch { scene, time } => batch::run(&scene, time, &config),
        Commands::Render {
            scene,
            output,
            width,
            height,
            time,
        } => render::run(
            render::RenderArgs {
                scene,
                output,
                width,
                height,
                time,
            },
            &config,
        ),
    }
}
