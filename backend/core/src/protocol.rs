//! Wire protocol for the duplex transport.
//!
//! The message catalog is closed: one variant per event name, validated at
//! the transport boundary before any handler sees it. Tags and payload
//! field names match the original socket wire format (kebab-case events,
//! camelCase fields).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of streamed screen data.
///
/// Delta chunks are opaque to the broker: they are forwarded identically
/// to full frames and never decoded or diffed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    #[serde(default)]
    pub kind: ChunkKind,
    /// Base64 image data, optionally prefixed with a data-URL scheme.
    pub payload: String,
    /// Producer-assigned capture time, epoch milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChunkKind {
    #[default]
    Full,
    Delta,
}

/// Optional width/height hint on a chunk. Informational only.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

/// Output of the OCR pipeline for one frame or ad-hoc image.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OcrResult {
    /// Extracted text, trimmed of leading/trailing whitespace.
    pub text: String,
    /// Normalized to [0.0, 1.0].
    pub confidence: f64,
    pub processing_time_ms: u64,
    pub word_count: usize,
    pub text_length: usize,
}

/// Messages a connected peer may send to the broker.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ClientMessage {
    CreateSession,
    #[serde(rename_all = "camelCase")]
    JoinSession { session_id: String },
    #[serde(rename_all = "camelCase")]
    ScreenData { session_id: String, chunk: Chunk },
    #[serde(rename_all = "camelCase")]
    RequestOcr { session_id: String, image_data: String },
    /// A producer answering a broker-initiated capture request.
    #[serde(rename_all = "camelCase")]
    CaptureResponse {
        request_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        image_data: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// Messages the broker sends to connected peers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ServerMessage {
    #[serde(rename_all = "camelCase")]
    SessionCreated { session_id: String },
    #[serde(rename_all = "camelCase")]
    SessionJoined { session_id: String },
    #[serde(rename_all = "camelCase")]
    ViewerJoined { viewer_id: String },
    #[serde(rename_all = "camelCase")]
    ViewerLeft { viewer_id: String },
    #[serde(rename_all = "camelCase")]
    SessionEnded { session_id: String },
    /// Re-broadcast of a host's chunk to the other session members.
    #[serde(rename_all = "camelCase")]
    ScreenData { session_id: String, chunk: Chunk },
    /// OCR result, sent to the originating connection only.
    #[serde(rename_all = "camelCase")]
    OcrResult {
        session_id: String,
        timestamp: DateTime<Utc>,
        #[serde(flatten)]
        result: OcrResult,
    },
    /// Broker asking connected producers for a one-shot capture.
    #[serde(rename_all = "camelCase")]
    CaptureRequest { request_id: String },
    Error { message: String },
}
