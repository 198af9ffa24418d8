use thiserror::Error;

#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Invalid geometry for {subject}: {reason}")]
    InputGeometry { subject: String, reason: String },

    #[error("Seed layout does not match asset requests: {0}")]
    SeedMismatch(String),

    #[error("Duplicate constraint id: {0}")]
    DuplicateConstraint(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl LayoutError {
    pub fn geometry(subject: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InputGeometry {
            subject: subject.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LayoutError>;
