//! Seam to the remote decision service

use crate::{EncodedImage, PilotError};

pub mod gemini;

pub use gemini::{GeminiConfig, GeminiOracle};

/// Everything the oracle sees for one decision.
#[derive(Debug, Clone)]
pub struct OracleRequest {
    /// Full prompt: task, element summary and response-format instructions
    pub prompt: String,
    pub image: EncodedImage,
}

/// A request/response service mapping an observation to one raw textual reply.
///
/// Implementations return `OracleUnavailable` for transport failures,
/// service errors and empty replies.
#[async_trait::async_trait]
pub trait DecisionOracle: Send + Sync {
    async fn complete(&self, request: &OracleRequest) -> Result<String, PilotError>;
}
