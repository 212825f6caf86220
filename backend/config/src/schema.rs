//! Typed configuration schema for the Vigil broker.
//!
//! Read once at startup; there is no hot reload. Every field has a default
//! so a partial config file (or none at all) is valid.

use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which stateless binding the process runs.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Line-delimited JSON-RPC on stdin/stdout.
    #[default]
    Stdio,
    /// HTTP listener: tool endpoint, health, metrics, and the duplex
    /// WebSocket upgrade.
    Http,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "stdio" => Ok(TransportKind::Stdio),
            "http" => Ok(TransportKind::Http),
            other => Err(format!("unknown transport kind: {other}")),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub transport: TransportKind,
    pub log_level: String,
    /// Origins allowed to reach the HTTP binding. Mandatory when the
    /// transport is HTTP; requests from other origins are rejected before
    /// any handler runs.
    pub allowed_origins: Vec<String>,
    /// Also bind the allow-list check to the `Host` header.
    pub dns_rebinding_protection: bool,
    /// Include the metrics snapshot in `/health` responses.
    pub enable_metrics: bool,
    pub enable_health_check: bool,
    pub shutdown_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub ocr_languages: Vec<String>,
    pub tesseract_path: String,
    pub session_sweep_interval_ms: u64,
    pub activity_buffer_size: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3001,
            transport: TransportKind::default(),
            log_level: "info".into(),
            allowed_origins: vec![
                "http://localhost:3000".into(),
                "http://127.0.0.1:3000".into(),
            ],
            dns_rebinding_protection: true,
            enable_metrics: true,
            enable_health_check: true,
            shutdown_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            ocr_languages: vec!["eng".into()],
            tesseract_path: "tesseract".into(),
            session_sweep_interval_ms: 60_000,
            activity_buffer_size: 100,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let config = Config::default();
        assert_eq!(config.transport, TransportKind::Stdio);
        assert!(config.dns_rebinding_protection);
        assert!(!config.allowed_origins.is_empty());
        assert_eq!(config.ocr_languages, vec!["eng".to_string()]);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"port": 8080, "transport": "http"}"#).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.transport, TransportKind::Http);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.shutdown_timeout_ms, 10_000);
    }

    #[test]
    fn transport_kind_parses_case_insensitively() {
        assert_eq!("HTTP".parse::<TransportKind>(), Ok(TransportKind::Http));
        assert_eq!("stdio".parse::<TransportKind>(), Ok(TransportKind::Stdio));
        assert!("websocket".parse::<TransportKind>().is_err());
    }
}
