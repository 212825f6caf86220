use async_trait::async_trait;
use serde_json::Value;

use crate::error::VigilError;

/// A named, schema-validated request/response operation exposed by the
/// stateless transport adapter.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique name of the tool (e.g., "extract_text").
    fn name(&self) -> &str;

    /// Description shown to tool-calling clients.
    fn description(&self) -> &str;

    /// JSON Schema for the tool's input.
    fn input_schema(&self) -> Value;

    /// Execute the tool. Implementations validate `args` against their
    /// schema before touching any pipeline and return
    /// `VigilError::SchemaValidation` on shape/type mismatches.
    async fn call(&self, args: Value) -> Result<Value, VigilError>;
}
