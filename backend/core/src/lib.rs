pub mod envelope;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod tools;
pub mod traits;

pub use error::VigilError;
pub use metrics::{Metrics, MetricsSnapshot, OperationKind, ProcessStats};
pub use protocol::{
    Chunk, ChunkKind, ClientMessage, Dimensions, OcrResult, ServerMessage,
};
pub use tools::{ToolDefinition, ToolRegistry};
pub use traits::Tool;
