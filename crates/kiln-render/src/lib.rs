//! Kiln Render - batched indirect-draw renderer for glTF models
//!
//! Every frame the [`MeshRendererSystem`] walks the ECS world, folds each
//! mesh-bearing entity into a [`GeometryBatch`] (one geometry copy per
//! distinct model node, one orientation record per instance), evaluates
//! joint palettes for animated entities and assembles one indexed indirect
//! command per mesh entry. [`MeshRenderer`] uploads the result and submits
//! it with a single multi-draw call.

pub mod assembler;
pub mod batch;
pub mod config;
pub mod gpu_batch;
mod headless;
pub mod lights;
mod pipeline;
pub mod registry;
mod renderer;
mod system;
pub mod textures;
pub mod types;

pub use assembler::{assemble, build_and_upload, prepare_upload, AssembledDraws};
pub use batch::{GeometryBatch, MeshEntry, MeshKey, StagingGeometry};
pub use config::{BufferLimits, RendererConfig};
pub use gpu_batch::{BatchCapacity, GpuBatchBuffers};
pub use headless::{HeadlessContext, RenderError, OPTIONAL_FEATURES, REQUIRED_FEATURES};
pub use lights::collect_lights;
pub use pipeline::{MeshPipeline, DEPTH_FORMAT};
pub use registry::InstanceRegistry;
pub use renderer::{DispatchPlan, FrameInputs, MeshRenderer};
pub use system::{Assets, FrameStats, MeshRendererSystem};
pub use textures::{GpuTextureArray, TextureBinder, TextureLibrary};
pub use types::{DrawIndexedIndirect, FrameUniforms, InstanceOrientation, LightRecord, MaterialBinding};
