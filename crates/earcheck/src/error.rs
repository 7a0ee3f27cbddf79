//! Error types for Earcheck
//!
//! Centralized error handling using thiserror.

use thiserror::Error;

/// Main error type for the Earcheck engine
#[derive(Error, Debug)]
pub enum TestError {
    #[error("Audio error: {0}")]
    Audio(String),

    /// A response arrived before any tone was played for the current stimulus
    #[error("Play the tone before answering")]
    PrematureResponse,

    #[error("Cannot {operation} while {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: String,
    },

    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TestError {
    pub(crate) fn invalid_phase(operation: &'static str, phase: impl std::fmt::Display) -> Self {
        TestError::InvalidPhase {
            operation,
            phase: phase.to_string(),
        }
    }
}

/// Result type alias for Earcheck
pub type Result<T> = std::result::Result<T, TestError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn premature_response_message_is_user_facing() {
        assert_eq!(
            TestError::PrematureResponse.to_string(),
            "Play the tone before answering"
        );
    }

    #[test]
    fn invalid_phase_names_operation_and_phase() {
        let err = TestError::invalid_phase("respond", "presenting");
        assert_eq!(err.to_string(), "Cannot respond while presenting");
    }

    #[test]
    fn io_error_converts() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: TestError = io.into();
        assert!(err.to_string().contains("boom"));
    }
}
