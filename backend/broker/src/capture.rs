//! Capture broker: bridges the stateless `screen_capture` tool to
//! connected duplex producers.
//!
//! Flow: tool → `request()` → broadcast to host connections → producer
//! captures and answers with `capture-response` → `resolve()` completes the
//! pending oneshot → tool gets the image payload. The caller owns the
//! timeout on the receiver.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, oneshot, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Either the base64 image payload or a producer-reported error.
pub type CaptureOutcome = Result<String, String>;

pub struct CaptureBroker {
    pending: Mutex<HashMap<String, oneshot::Sender<CaptureOutcome>>>,
    request_tx: broadcast::Sender<String>,
}

impl CaptureBroker {
    pub fn new() -> Arc<Self> {
        let (request_tx, _) = broadcast::channel(16);
        Arc::new(Self {
            pending: Mutex::new(HashMap::new()),
            request_tx,
        })
    }

    /// Register a capture request and announce it to connected producers.
    /// Returns the request id and the receiver the caller awaits.
    pub async fn request(&self) -> (String, oneshot::Receiver<CaptureOutcome>) {
        let request_id = format!("cap-{}", Uuid::new_v4());
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(request_id.clone(), tx);
        }
        let receivers = self.request_tx.send(request_id.clone()).unwrap_or(0);
        debug!(%request_id, receivers, "capture request broadcast");
        (request_id, rx)
    }

    /// Whether any connection is currently listening for capture requests.
    pub fn has_listeners(&self) -> bool {
        self.request_tx.receiver_count() > 0
    }

    /// Complete a pending request. Responses for unknown or expired ids are
    /// logged and dropped.
    pub async fn resolve(&self, request_id: &str, outcome: CaptureOutcome) {
        let tx = {
            let mut pending = self.pending.lock().await;
            pending.remove(request_id)
        };
        match tx {
            Some(tx) => {
                let _ = tx.send(outcome);
                debug!(%request_id, "capture request resolved");
            }
            None => warn!(%request_id, "capture response for unknown or expired request"),
        }
    }

    /// Drop a request the caller gave up on, so a late response is treated
    /// as expired rather than delivered into the void.
    pub async fn abandon(&self, request_id: &str) {
        let mut pending = self.pending.lock().await;
        pending.remove(request_id);
    }

    /// Subscribe to capture request announcements. Connection handlers
    /// forward these to producers they serve.
    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.request_tx.subscribe()
    }
}
