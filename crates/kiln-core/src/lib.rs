//! Kiln Core - Foundational types for the Kiln engine
//!
//! This crate provides the types that all other Kiln crates depend on:
//! - `EntityId` - Stable entity identifiers
//! - `Transform` - Flat per-entity spatial transform (Euler degrees)
//! - Error types and Result alias

mod error;
mod id;
mod types;

pub use error::{KilnError, Result};
pub use id::{EntityId, IdAllocator};
pub use types::{quat_to_euler_degrees, Transform};

pub use glam::{Mat4, Quat, Vec3, Vec4};
