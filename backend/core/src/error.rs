use thiserror::Error;

/// Top-level error type for the Vigil broker.
///
/// Every variant except `Other` is recoverable at the transport boundary:
/// adapters convert it into the uniform response envelope and the process
/// keeps running. Only unexpected faults escalate to shutdown.
#[derive(Debug, Error)]
pub enum VigilError {
    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("invalid image data: {0}")]
    InvalidImageData(String),

    #[error("OCR failed: {0}")]
    OcrFailure(String),

    #[error("invalid tool input: {0}")]
    SchemaValidation(String),

    #[error("request timed out")]
    RequestTimeout,

    #[error("transport rejected request: {0}")]
    TransportFault(String),

    #[error("capture unavailable: {0}")]
    CaptureUnavailable(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl VigilError {
    /// Schema violations are rejected before dispatch and map to a
    /// JSON-RPC invalid-params error instead of a tool-result envelope.
    pub fn is_schema_violation(&self) -> bool {
        matches!(self, VigilError::SchemaValidation(_))
    }
}
