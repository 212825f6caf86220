//! Origin allow-list enforcement for the HTTP binding.
//!
//! Runs before any handler: a request whose `Origin` is outside the
//! allow-list is refused with no partial state created. With DNS-rebinding
//! protection on (the default), the `Host` header is held to the same
//! allow-list plus the loopback names.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Json, Response},
};
use tracing::warn;

use vigil_core::envelope;

use crate::GatewayState;

const LOOPBACK_HOSTS: &[&str] = &["localhost", "127.0.0.1", "::1"];

pub async fn enforce(
    State(state): State<GatewayState>,
    request: Request,
    next: Next,
) -> Response {
    let headers = request.headers();

    if let Some(origin) = headers.get(header::ORIGIN).and_then(|v| v.to_str().ok()) {
        if !origin_allowed(origin, &state.config.allowed_origins) {
            warn!(%origin, "rejected request from disallowed origin");
            state.metrics.record_error();
            return reject("origin not allowed");
        }
    }

    if state.config.dns_rebinding_protection {
        if let Some(host) = headers.get(header::HOST).and_then(|v| v.to_str().ok()) {
            if !host_allowed(host, &state.config.allowed_origins) {
                warn!(%host, "rejected request with disallowed host header");
                state.metrics.record_error();
                return reject("host not allowed");
            }
        }
    }

    next.run(request).await
}

fn reject(message: &str) -> Response {
    (StatusCode::FORBIDDEN, Json(envelope::err(message))).into_response()
}

/// Exact match against the allow-list, ignoring a trailing slash.
pub fn origin_allowed(origin: &str, allowlist: &[String]) -> bool {
    let origin = origin.trim_end_matches('/');
    allowlist
        .iter()
        .any(|allowed| allowed.trim_end_matches('/') == origin)
}

/// The `Host` header must name loopback or a host that appears in the
/// origin allow-list.
pub fn host_allowed(host: &str, allowlist: &[String]) -> bool {
    let name = strip_port(host);
    if LOOPBACK_HOSTS.contains(&name) {
        return true;
    }
    allowlist
        .iter()
        .filter_map(|origin| origin_host(origin))
        .any(|allowed| allowed == name)
}

/// Drop a `:port` suffix, handling bracketed IPv6 literals.
fn strip_port(host: &str) -> &str {
    if let Some(rest) = host.strip_prefix('[') {
        if let Some(end) = rest.find(']') {
            return &rest[..end];
        }
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

/// Host portion of an origin like `http://localhost:3000`.
fn origin_host(origin: &str) -> Option<&str> {
    let after_scheme = origin.split_once("://").map(|(_, rest)| rest)?;
    let end = after_scheme
        .find('/')
        .unwrap_or(after_scheme.len());
    Some(strip_port(&after_scheme[..end]))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn allowlist() -> Vec<String> {
        vec![
            "http://localhost:3000".to_string(),
            "https://viewer.example.com".to_string(),
        ]
    }

    #[test]
    fn allowlisted_origins_pass() {
        assert!(origin_allowed("http://localhost:3000", &allowlist()));
        assert!(origin_allowed("http://localhost:3000/", &allowlist()));
        assert!(origin_allowed("https://viewer.example.com", &allowlist()));
    }

    #[test]
    fn unknown_origins_are_rejected() {
        assert!(!origin_allowed("http://evil.example", &allowlist()));
        assert!(!origin_allowed("http://localhost:9999", &allowlist()));
        // Prefix tricks don't pass the exact match.
        assert!(!origin_allowed("http://localhost:3000.evil.example", &allowlist()));
    }

    #[test]
    fn loopback_hosts_always_pass() {
        assert!(host_allowed("localhost:3001", &allowlist()));
        assert!(host_allowed("127.0.0.1:8080", &allowlist()));
        assert!(host_allowed("[::1]:3001", &allowlist()));
        assert!(host_allowed("localhost", &allowlist()));
    }

    #[test]
    fn allowlisted_hosts_pass_rebinding_check() {
        assert!(host_allowed("viewer.example.com", &allowlist()));
        assert!(host_allowed("viewer.example.com:443", &allowlist()));
    }

    #[test]
    fn rebinding_hosts_are_rejected() {
        assert!(!host_allowed("evil.example", &allowlist()));
        assert!(!host_allowed("attacker.test:3001", &allowlist()));
    }

    #[test]
    fn strip_port_handles_ipv6_literals() {
        assert_eq!(strip_port("[::1]:3001"), "::1");
        assert_eq!(strip_port("localhost:80"), "localhost");
        assert_eq!(strip_port("localhost"), "localhost");
    }
}
