//! Error types for Kiln

use thiserror::Error;

/// The main error type for Kiln operations
#[derive(Debug, Error)]
pub enum KilnError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Import error: {0}")]
    ImportError(String),

    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("Model '{0}' has no default scene")]
    NoDefaultScene(String),

    #[error("Missing vertex attribute {attribute} in {model}")]
    MissingAttribute { model: String, attribute: String },

    #[error("Unsupported component encoding for {attribute} in {model}")]
    UnsupportedEncoding { model: String, attribute: String },

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Animation not found: {0}")]
    AnimationNotFound(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("Duplicate entity name: {0}")]
    DuplicateEntityName(String),

    #[error("Config error: {0}")]
    ConfigError(String),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("Scene error: {0}")]
    SceneError(String),

    #[error("Render error: {0}")]
    RenderError(String),

    #[error("{buffer} capacity exceeded: need {needed}, have {capacity}")]
    CapacityExceeded {
        buffer: &'static str,
        needed: u64,
        capacity: u64,
    },
}

/// Result type alias for Kiln operations
pub type Result<T> = std::result::Result<T, KilnError>;

impl From<toml::de::Error> for KilnError {
    fn from(err: toml::de::Error) -> Self {
        KilnError::TomlParseError(err.to_string())
    }
}
