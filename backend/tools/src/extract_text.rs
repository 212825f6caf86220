use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use vigil_core::{Tool, VigilError};
use vigil_ocr::OcrPipeline;

/// One-shot OCR over a caller-supplied image payload.
pub struct ExtractTextTool {
    pipeline: Arc<OcrPipeline>,
}

impl ExtractTextTool {
    pub fn new(pipeline: Arc<OcrPipeline>) -> Self {
        Self { pipeline }
    }
}

#[async_trait]
impl Tool for ExtractTextTool {
    fn name(&self) -> &str {
        "extract_text"
    }

    fn description(&self) -> &str {
        "Extract visible text from a screenshot image using OCR."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "imageData": {
                    "type": "string",
                    "description": "Base64-encoded image, optionally as a data URL"
                }
            },
            "required": ["imageData"]
        })
    }

    async fn call(&self, args: Value) -> Result<Value, VigilError> {
        let image_data = args
            .get("imageData")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                VigilError::SchemaValidation("imageData must be a string".into())
            })?;

        let result = self.pipeline.extract(image_data).await?;
        Ok(serde_json::to_value(&result).unwrap_or(Value::Null))
    }
}
