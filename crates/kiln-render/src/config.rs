//! Renderer configuration (`kiln.toml`)

use kiln_core::{KilnError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Largest texture array layer edge; wgpu's default `max_texture_dimension_2d`
pub const MAX_TEXTURE_SIZE: u32 = 8192;

/// GPU buffer capacities, in elements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferLimits {
    #[serde(default = "default_max_vertices")]
    pub max_vertices: u32,
    #[serde(default = "default_max_indices")]
    pub max_indices: u32,
    #[serde(default = "default_max_instances")]
    pub max_instances: u32,
    #[serde(default = "default_max_draws")]
    pub max_draws: u32,
    #[serde(default = "default_max_lights")]
    pub max_lights: u32,
    /// Joint matrices across all animated instances of a frame
    #[serde(default = "default_max_palette_matrices")]
    pub max_palette_matrices: u32,
}

impl Default for BufferLimits {
    fn default() -> Self {
        Self {
            max_vertices: default_max_vertices(),
            max_indices: default_max_indices(),
            max_instances: default_max_instances(),
            max_draws: default_max_draws(),
            max_lights: default_max_lights(),
            max_palette_matrices: default_max_palette_matrices(),
        }
    }
}

fn default_max_vertices() -> u32 {
    1 << 20
}
fn default_max_indices() -> u32 {
    3 << 20
}
fn default_max_instances() -> u32 {
    20_000
}
fn default_max_draws() -> u32 {
    4096
}
fn default_max_lights() -> u32 {
    16
}
fn default_max_palette_matrices() -> u32 {
    20 * 512
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Joint cap per skin; skins with more joints are truncated
    #[serde(default = "default_max_joints")]
    pub max_joints: usize,
    /// Texture units handed out per frame; entries past the cap draw untextured
    #[serde(default = "default_max_texture_units")]
    pub max_texture_units: u32,
    /// Extension of GPU-native textures next to each model
    #[serde(default = "default_texture_extension")]
    pub texture_extension: String,
    /// Edge length of each layer in the base-color texture array
    #[serde(default = "default_texture_size")]
    pub texture_size: u32,
    #[serde(default = "default_clear_color")]
    pub clear_color: [f32; 4],
    #[serde(default)]
    pub limits: BufferLimits,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            max_joints: default_max_joints(),
            max_texture_units: default_max_texture_units(),
            texture_extension: default_texture_extension(),
            texture_size: default_texture_size(),
            clear_color: default_clear_color(),
            limits: BufferLimits::default(),
        }
    }
}

fn default_max_joints() -> usize {
    kiln_animation::DEFAULT_MAX_JOINTS
}
fn default_max_texture_units() -> u32 {
    16
}
fn default_texture_extension() -> String {
    "ktx2".to_string()
}
fn default_texture_size() -> u32 {
    256
}
fn default_clear_color() -> [f32; 4] {
    [0.05, 0.05, 0.08, 1.0]
}

impl RendererConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content).map_err(|e| {
            KilnError::ConfigError(format!("Failed to parse config {}: {}", path.display(), e))
        })
    }

    /// Load `path` if it exists, defaults otherwise
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_joints == 0 {
            return Err(KilnError::ConfigError("max_joints must be at least 1".into()));
        }
        if self.texture_size == 0 || self.texture_size > MAX_TEXTURE_SIZE {
            return Err(KilnError::ConfigError(format!(
                "texture_size must be between 1 and {}",
                MAX_TEXTURE_SIZE
            )));
        }
        if self.limits.max_palette_matrices < self.max_joints as u32 {
            return Err(KilnError::ConfigError(
                "limits.max_palette_matrices must hold at least one skeleton".into(),
            ));
        }
        Ok(())
    }

    /// Whole skeletons that fit in the palette buffer
    pub fn palette_slots(&self) -> u32 {
        self.limits.max_palette_matrices / self.max_joints as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_is_default() {
        let config = RendererConfig::from_toml_str("").unwrap();
        assert_eq!(config, RendererConfig::default());
        assert_eq!(config.max_joints, 20);
        assert_eq!(config.texture_extension, "ktx2");
    }

    #[test]
    fn test_partial_override() {
        let config = RendererConfig::from_toml_str(
            r#"
max_joints = 64
texture_extension = "dds"

[limits]
max_instances = 100
"#,
        )
        .unwrap();
        assert_eq!(config.max_joints, 64);
        assert_eq!(config.texture_extension, "dds");
        assert_eq!(config.limits.max_instances, 100);
        assert_eq!(config.limits.max_draws, 4096);
        assert_eq!(config.palette_slots(), 20 * 512 / 64);
    }

    #[test]
    fn test_rejects_zero_joints() {
        assert!(matches!(
            RendererConfig::from_toml_str("max_joints = 0"),
            Err(KilnError::ConfigError(_))
        ));
    }

    #[test]
    fn test_texture_size_bounds() {
        let max = format!("texture_size = {}", MAX_TEXTURE_SIZE);
        assert_eq!(RendererConfig::from_toml_str(&max).unwrap().texture_size, MAX_TEXTURE_SIZE);
        for bad in ["texture_size = 0", "texture_size = 40000"] {
            assert!(matches!(
                RendererConfig::from_toml_str(bad),
                Err(KilnError::ConfigError(_))
            ));
        }
    }

    #[test]
    fn test_missing_file_defaults() {
        let config = RendererConfig::load_or_default(Path::new("no/such/kiln.toml")).unwrap();
        assert_eq!(config.max_texture_units, 16);
    }
}
