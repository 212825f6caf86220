use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::RwLock;
use tracing::info;

use vigil_core::{Tool, VigilError};

/// A recorded activity observation.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ActivityEntry {
    pub description: String,
    pub confidence: f64,
    pub screen_text_length: u64,
    pub processing_time: u64,
    pub timestamp: DateTime<Utc>,
}

/// Bounded in-memory buffer of recent activity entries. Durable storage is
/// the caller's concern; the broker only keeps the recent tail.
pub struct ActivityLog {
    entries: RwLock<VecDeque<ActivityEntry>>,
    capacity: usize,
}

impl ActivityLog {
    pub fn new(capacity: usize) -> Arc<Self> {
        Arc::new(Self {
            entries: RwLock::new(VecDeque::with_capacity(capacity)),
            capacity,
        })
    }

    pub async fn record(&self, entry: ActivityEntry) {
        info!(
            target: "activity",
            description = %entry.description,
            confidence = entry.confidence,
            "activity logged"
        );
        let mut entries = self.entries.write().await;
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub async fn recent(&self) -> Vec<ActivityEntry> {
        self.entries.read().await.iter().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

/// Record one activity observation from a tool-calling client.
pub struct LogActivityTool {
    log: Arc<ActivityLog>,
}

impl LogActivityTool {
    pub fn new(log: Arc<ActivityLog>) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Tool for LogActivityTool {
    fn name(&self) -> &str {
        "log_activity"
    }

    fn description(&self) -> &str {
        "Record a described user activity with optional confidence and timing."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "description": {
                    "type": "string",
                    "description": "What the user is doing"
                },
                "confidence": { "type": "number" },
                "screen_text_length": { "type": "number" },
                "processing_time": { "type": "number" }
            },
            "required": ["description"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value, VigilError> {
        let description = args
            .get("description")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                VigilError::SchemaValidation("description must be a string".into())
            })?;
        if description.trim().is_empty() {
            return Err(VigilError::SchemaValidation(
                "description must not be empty".into(),
            ));
        }

        let entry = ActivityEntry {
            description: description.to_string(),
            confidence: optional_number(&args, "confidence")?,
            screen_text_length: optional_number(&args, "screen_text_length")? as u64,
            processing_time: optional_number(&args, "processing_time")? as u64,
            timestamp: Utc::now(),
        };
        self.log.record(entry.clone()).await;
        Ok(json!({ "entry": entry }))
    }
}

/// Optional numeric field, defaulting to zero when absent or null.
fn optional_number(args: &Value, key: &str) -> Result<f64, VigilError> {
    match args.get(key) {
        None | Some(Value::Null) => Ok(0.0),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| VigilError::SchemaValidation(format!("{key} must be a number"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tool_with_capacity(capacity: usize) -> (LogActivityTool, Arc<ActivityLog>) {
        let log = ActivityLog::new(capacity);
        (LogActivityTool::new(log.clone()), log)
    }

    #[tokio::test]
    async fn optional_fields_default_to_zero() {
        let (tool, log) = tool_with_capacity(10);
        let result = tool.call(json!({ "description": "test" })).await.unwrap();

        let entry = &result["entry"];
        assert_eq!(entry["description"], "test");
        assert_eq!(entry["confidence"], 0.0);
        assert_eq!(entry["screen_text_length"], 0);
        assert_eq!(entry["processing_time"], 0);
        assert!(entry["timestamp"].is_string());
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn full_arguments_are_recorded() {
        let (tool, log) = tool_with_capacity(10);
        tool.call(json!({
            "description": "Reading documentation",
            "confidence": 0.85,
            "screen_text_length": 1423,
            "processing_time": 212
        }))
        .await
        .unwrap();

        let recent = log.recent().await;
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].confidence, 0.85);
        assert_eq!(recent[0].screen_text_length, 1423);
        assert_eq!(recent[0].processing_time, 212);
    }

    #[tokio::test]
    async fn missing_or_blank_description_is_a_schema_error() {
        let (tool, _log) = tool_with_capacity(10);
        for args in [json!({}), json!({ "description": "  " }), json!({ "description": 7 })] {
            let err = tool.call(args).await.unwrap_err();
            assert!(matches!(err, VigilError::SchemaValidation(_)));
        }
    }

    #[tokio::test]
    async fn non_numeric_optionals_are_rejected() {
        let (tool, _log) = tool_with_capacity(10);
        let err = tool
            .call(json!({ "description": "x", "confidence": "high" }))
            .await
            .unwrap_err();
        assert!(matches!(err, VigilError::SchemaValidation(_)));
    }

    #[tokio::test]
    async fn buffer_keeps_only_the_recent_tail() {
        let (tool, log) = tool_with_capacity(2);
        for i in 0..3 {
            tool.call(json!({ "description": format!("entry {i}") }))
                .await
                .unwrap();
        }
        let recent = log.recent().await;
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].description, "entry 1");
        assert_eq!(recent[1].description, "entry 2");
    }
}
