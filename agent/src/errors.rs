//! Error types for the upload agent

use thiserror::Error;

/// Main error type for the upload agent
#[derive(Error, Debug)]
pub enum UploadError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// The command payload did not have the expected shape
    #[error("Decode error: {0}")]
    DecodeError(String),

    /// The decoded command is not something this agent can upload
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// A control-plane call failed (network, status or body)
    #[error("Remote error: {0}")]
    RemoteError(String),

    #[error("Tag error: {0}")]
    TagError(String),

    #[error("Login error: {0}")]
    LoginError(String),

    /// A single push attempt failed
    #[error("Push error: {0}")]
    PushError(String),

    /// Every push attempt failed. `notified` is set when the failure
    /// notification reached the control plane.
    #[error("Push failed after {attempts} attempts: {last_error}")]
    PushExhausted {
        attempts: u32,
        last_error: String,
        notified: bool,
    },

    #[error("Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid transition: {0}")]
    TransitionError(String),
}

impl UploadError {
    /// Whether the control plane accepted a failure notification for this error
    pub fn is_reported(&self) -> bool {
        matches!(self, UploadError::PushExhausted { notified: true, .. })
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(err: reqwest::Error) -> Self {
        UploadError::RemoteError(err.to_string())
    }
}
