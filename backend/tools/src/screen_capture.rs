use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use tracing::debug;

use vigil_broker::CaptureBroker;
use vigil_core::{Tool, VigilError};

/// Request a one-shot capture from a connected producer.
///
/// The core never touches capture devices itself; the connected browser or
/// agent layer answers the broadcast with an already-captured payload.
pub struct ScreenCaptureTool {
    capture: Arc<CaptureBroker>,
    timeout: Duration,
}

impl ScreenCaptureTool {
    pub fn new(capture: Arc<CaptureBroker>, timeout: Duration) -> Self {
        Self { capture, timeout }
    }
}

#[async_trait]
impl Tool for ScreenCaptureTool {
    fn name(&self) -> &str {
        "screen_capture"
    }

    fn description(&self) -> &str {
        "Capture the current screen from the connected producer."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn call(&self, _args: Value) -> Result<Value, VigilError> {
        if !self.capture.has_listeners() {
            return Err(VigilError::CaptureUnavailable(
                "no capture source connected".into(),
            ));
        }

        let (request_id, rx) = self.capture.request().await;
        debug!(%request_id, "awaiting capture response");

        match tokio::time::timeout(self.timeout, rx).await {
            Ok(Ok(Ok(image_data))) => Ok(json!({
                "imageData": image_data,
                "capturedAt": Utc::now(),
            })),
            Ok(Ok(Err(message))) => Err(VigilError::CaptureUnavailable(message)),
            Ok(Err(_closed)) => Err(VigilError::CaptureUnavailable(
                "capture source went away".into(),
            )),
            Err(_elapsed) => {
                // Expire the entry so a late response is dropped, not leaked.
                self.capture.abandon(&request_id).await;
                Err(VigilError::RequestTimeout)
            }
        }
    }
}
