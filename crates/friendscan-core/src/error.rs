use thiserror::Error;

use crate::config_manager::ConfigError;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Invalid batch size: {0} (must be at least 1)")]
    InvalidBatchSize(usize),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type Result<T> = std::result::Result<T, CoreError>;
