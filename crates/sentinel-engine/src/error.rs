//! Engine error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Storage error: {0}")]
    Storage(#[from] sentinel_storage::StorageError),

    #[error("Unclassifiable URL: {0}")]
    Unclassifiable(String),

    #[error("Invalid threshold: {0}")]
    InvalidThreshold(u32),
}
