//! Error types for CDP

use thiserror::Error;

/// Result type alias for CDP operations
pub type Result<T> = std::result::Result<T, CdpError>;

/// Main error type for CDP
#[derive(Error, Debug)]
pub enum CdpError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid fingerprint: {0}")]
    InvalidFingerprint(String),
}
