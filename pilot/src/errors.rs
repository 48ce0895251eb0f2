use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PilotError {
    #[error("Screen capture failed: {0}")]
    CaptureFailed(String),

    #[error("Decision oracle unavailable: {0}")]
    OracleUnavailable(String),

    #[error("Malformed action: {0}")]
    MalformedAction(String),

    #[error("No focused element to receive text")]
    NoFocusedElement,

    #[error("Gesture dispatch failed: {0}")]
    DispatchFailed(String),

    #[error("Image encoding failed: {0}")]
    ImageEncoding(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PilotError {
    /// Errors worth another attempt under an explicit retry policy.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PilotError::OracleUnavailable(_))
    }
}
