//! Config validation, run once after file and env merging.

use anyhow::{bail, Result};

use crate::schema::{Config, TransportKind};

const KNOWN_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error", "off"];

pub fn validate(config: &Config) -> Result<()> {
    if !KNOWN_LEVELS.contains(&config.log_level.to_ascii_lowercase().as_str()) {
        bail!(
            "logLevel must be one of {KNOWN_LEVELS:?}, got {:?}",
            config.log_level
        );
    }
    if config.transport == TransportKind::Http && config.allowed_origins.is_empty() {
        bail!("allowedOrigins must not be empty when transport is http");
    }
    if config.request_timeout_ms == 0 {
        bail!("requestTimeoutMs must be greater than zero");
    }
    if config.shutdown_timeout_ms == 0 {
        bail!("shutdownTimeoutMs must be greater than zero");
    }
    if config.ocr_languages.is_empty() {
        bail!("ocrLanguages must name at least one language");
    }
    if config.activity_buffer_size == 0 {
        bail!("activityBufferSize must be greater than zero");
    }
    Ok(())
}
