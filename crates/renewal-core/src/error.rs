use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenewalError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid resource name '{name}': {reason}")]
    InvalidResourceName { name: String, reason: String },

    #[error("Missing owner address")]
    MissingOwner,

    #[error("Resource not found: {name}")]
    ResourceNotFound { name: String },

    #[error("Unknown interval tag: {0}")]
    UnknownInterval(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}

impl RenewalError {
    /// Short error code string returned to HTTP clients.
    pub fn code(&self) -> &'static str {
        match self {
            RenewalError::Config(_) => "CONFIG_ERROR",
            RenewalError::InvalidResourceName { .. } => "INVALID_RESOURCE_NAME",
            RenewalError::MissingOwner => "MISSING_OWNER",
            RenewalError::ResourceNotFound { .. } => "RESOURCE_NOT_FOUND",
            RenewalError::UnknownInterval(_) => "UNKNOWN_INTERVAL",
            RenewalError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    /// Input errors are reported straight back to the caller with no state change.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            RenewalError::InvalidResourceName { .. } | RenewalError::MissingOwner
        )
    }
}

pub type Result<T> = std::result::Result<T, RenewalError>;
