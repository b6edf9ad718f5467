use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum EstimatorError {
    /// Fusion needs at least one photo to take a maximum over
    #[error("cannot fuse an empty set of room estimates")]
    EmptyFusionInput,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to read config file {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, EstimatorError>;
