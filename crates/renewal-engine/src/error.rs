use renewal_store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid reminder settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The pass could not read the tracked resources at all.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, EngineError>;
