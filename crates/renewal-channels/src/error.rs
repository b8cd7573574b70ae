use thiserror::Error;

/// Errors raised by delivery adapters and the expiry resolver.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The remote endpoint could not be reached.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// The endpoint answered but refused the message.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// An operation exceeded its allowed time budget.
    #[error("Operation timed out after {ms}ms")]
    Timeout { ms: u64 },

    /// The adapter configuration is invalid or missing.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<reqwest::Error> for ChannelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            ChannelError::ConnectionFailed(e.to_string())
        } else {
            ChannelError::SendFailed(e.to_string())
        }
    }
}
