//! Uniform response envelope for the stateless tool surface.
//!
//! Every tool response, success or failure, carries `success` and
//! `timestamp`; callers branch on `success`, never on transport status.

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

/// Wrap a successful tool payload. Object payloads are flattened into the
/// envelope; anything else lands under a `result` key.
pub fn ok(payload: Value) -> Value {
    let mut map = match payload {
        Value::Object(map) => map,
        other => {
            let mut map = serde_json::Map::new();
            map.insert("result".into(), other);
            map
        }
    };
    map.insert("success".into(), Value::Bool(true));
    map.insert("timestamp".into(), json!(Utc::now()));
    Value::Object(map)
}

/// Wrap a serializable payload.
pub fn ok_with<T: Serialize>(payload: &T) -> Value {
    ok(serde_json::to_value(payload).unwrap_or(Value::Null))
}

/// Wrap a failure with a human-readable message.
pub fn err(message: impl AsRef<str>) -> Value {
    json!({
        "success": false,
        "error": message.as_ref(),
        "timestamp": Utc::now(),
    })
}
