//! Error types for Earcheck app services
//!
//! Application-level errors that wrap engine errors and add app-specific variants.

use earcheck::error::TestError;
use thiserror::Error;

/// Application error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error(transparent)]
    Engine(#[from] TestError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// An external collaborator (email capture, analytics) failed
    #[error("Collaborator error: {0}")]
    Collaborator(String),
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::Engine(TestError::Io(e))
    }
}

/// Result type alias for Earcheck app services
pub type Result<T> = std::result::Result<T, AppError>;
