pub mod extract_text;
pub mod log_activity;
pub mod screen_capture;

pub use extract_text::ExtractTextTool;
pub use log_activity::{ActivityEntry, ActivityLog, LogActivityTool};
pub use screen_capture::ScreenCaptureTool;

use std::sync::Arc;
use std::time::Duration;

use vigil_broker::CaptureBroker;
use vigil_core::ToolRegistry;
use vigil_ocr::OcrPipeline;

/// Build the registry with the full Vigil toolset.
pub fn default_registry(
    pipeline: Arc<OcrPipeline>,
    capture: Arc<CaptureBroker>,
    activity_log: Arc<ActivityLog>,
    capture_timeout: Duration,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(ScreenCaptureTool::new(capture, capture_timeout)));
    registry.register(Arc::new(ExtractTextTool::new(pipeline)));
    registry.register(Arc::new(LogActivityTool::new(activity_log)));
    registry
}
