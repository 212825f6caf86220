//! `VIGIL_*` environment variable overrides.
//!
//! Overrides are applied after the config file and take precedence over it.
//! The resolver takes the variable map as an argument so tests never touch
//! the process environment.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};

use crate::schema::{Config, TransportKind};

/// Apply recognized `VIGIL_*` overrides to `config`.
pub fn apply_env_overrides(config: &mut Config, env: &HashMap<String, String>) -> Result<()> {
    if let Some(host) = non_empty(env, "VIGIL_HOST") {
        config.host = host.to_string();
    }
    if let Some(port) = non_empty(env, "VIGIL_PORT") {
        config.port = port.parse().context("VIGIL_PORT must be a port number")?;
    }
    if let Some(transport) = non_empty(env, "VIGIL_TRANSPORT") {
        config.transport = transport
            .parse::<TransportKind>()
            .map_err(|e| anyhow::anyhow!("VIGIL_TRANSPORT: {e}"))?;
    }
    if let Some(level) = non_empty(env, "VIGIL_LOG_LEVEL") {
        config.log_level = level.to_string();
    }
    if let Some(origins) = non_empty(env, "VIGIL_ALLOWED_ORIGINS") {
        config.allowed_origins = split_list(origins);
    }
    if let Some(v) = non_empty(env, "VIGIL_DNS_REBINDING_PROTECTION") {
        config.dns_rebinding_protection = parse_bool("VIGIL_DNS_REBINDING_PROTECTION", v)?;
    }
    if let Some(v) = non_empty(env, "VIGIL_ENABLE_METRICS") {
        config.enable_metrics = parse_bool("VIGIL_ENABLE_METRICS", v)?;
    }
    if let Some(v) = non_empty(env, "VIGIL_ENABLE_HEALTH_CHECK") {
        config.enable_health_check = parse_bool("VIGIL_ENABLE_HEALTH_CHECK", v)?;
    }
    if let Some(v) = non_empty(env, "VIGIL_SHUTDOWN_TIMEOUT_MS") {
        config.shutdown_timeout_ms = v
            .parse()
            .context("VIGIL_SHUTDOWN_TIMEOUT_MS must be milliseconds")?;
    }
    if let Some(v) = non_empty(env, "VIGIL_REQUEST_TIMEOUT_MS") {
        config.request_timeout_ms = v
            .parse()
            .context("VIGIL_REQUEST_TIMEOUT_MS must be milliseconds")?;
    }
    if let Some(langs) = non_empty(env, "VIGIL_OCR_LANGUAGES") {
        config.ocr_languages = split_list(langs);
    }
    if let Some(path) = non_empty(env, "VIGIL_TESSERACT_PATH") {
        config.tesseract_path = path.to_string();
    }
    if let Some(v) = non_empty(env, "VIGIL_SESSION_SWEEP_INTERVAL_MS") {
        config.session_sweep_interval_ms = v
            .parse()
            .context("VIGIL_SESSION_SWEEP_INTERVAL_MS must be milliseconds")?;
    }
    if let Some(v) = non_empty(env, "VIGIL_ACTIVITY_BUFFER_SIZE") {
        config.activity_buffer_size = v
            .parse()
            .context("VIGIL_ACTIVITY_BUFFER_SIZE must be a count")?;
    }
    Ok(())
}

fn non_empty<'a>(env: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    env.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => bail!("{key} must be a boolean, got {other:?}"),
    }
}
