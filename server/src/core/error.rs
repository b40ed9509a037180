// skystrike/server/src/core/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SimError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Physics table missing entry: {0}")]
    MissingPhysicsTable(String),

    #[error("Map error: {0}")]
    Map(String),

    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Initialization failed: {0}")]
    InitializationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_yaml::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type SimResult<T> = Result<T, SimError>;
