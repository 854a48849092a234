//! Request/response audit capture middleware.
//!
//! Runs exactly once per request: assigns a correlation id, measures
//! duration, derives the client address, captures small declared-length
//! response bodies without altering the bytes sent, and dispatches the
//! audit write after the response is built. The write happens off the
//! response path; a slow or failing audit store is never visible to the
//! client. Streaming and oversized bodies are never buffered.

use axum::{
    body::{to_bytes, Body},
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;
use vigil_audit::{AuditAction, AuditEvent, AuditRecorder};
use vigil_crypto::sanitize_for_logging;

/// Header carrying the correlation id on both request and response.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Proxy header with the original client chain, first entry wins.
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

/// Single-value proxy header, consulted after the forwarded-for chain.
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Sentinel when no client address source is available.
pub const UNKNOWN_ADDRESS: &str = "unknown";

/// Response bodies above this size are neither buffered nor included in
/// the detail map.
const DEFAULT_MAX_CAPTURED_BODY: usize = 64 * 1024;

/// Correlation id of the current request, available to downstream handlers
/// via request extensions.
#[derive(Debug, Clone)]
pub struct CorrelationId(pub String);

/// Authenticated principal for the current request. Inserted by the
/// authentication layer (an external collaborator); when present, captured
/// entries are attributed to it.
#[derive(Debug, Clone)]
pub struct AuditPrincipal(pub String);

/// Shared state for the capture middleware.
#[derive(Clone)]
pub struct AuditCapture {
    recorder: Arc<AuditRecorder>,
    max_captured_body: usize,
}

impl AuditCapture {
    /// Creates capture state over a recorder.
    pub fn new(recorder: Arc<AuditRecorder>) -> Self {
        Self {
            recorder,
            max_captured_body: DEFAULT_MAX_CAPTURED_BODY,
        }
    }

    /// Overrides the captured-body size cap.
    pub fn with_max_captured_body(mut self, bytes: usize) -> Self {
        self.max_captured_body = bytes;
        self
    }
}

/// The middleware function. Install with
/// `axum::middleware::from_fn_with_state(capture, audit_capture_middleware)`.
pub async fn audit_capture_middleware(
    State(capture): State<AuditCapture>,
    mut request: Request,
    next: Next,
) -> Response {
    let started = Instant::now();

    let correlation_id = request
        .headers()
        .get(CORRELATION_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let client_ip = client_address(
        request.headers(),
        request.extensions().get::<ConnectInfo<SocketAddr>>(),
    );
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let principal = request
        .extensions()
        .get::<AuditPrincipal>()
        .map(|p| p.0.clone());

    // Propagate downstream before running the handler chain.
    request
        .extensions_mut()
        .insert(CorrelationId(correlation_id.clone()));

    let response = next.run(request).await;
    let status = response.status();
    let duration_ms = started.elapsed().as_millis() as u64;

    let (mut parts, body) = response.into_parts();
    if let Ok(value) = HeaderValue::from_str(&correlation_id) {
        parts
            .headers
            .insert(HeaderName::from_static(CORRELATION_ID_HEADER), value);
    }

    // Buffer only when the response declares a length within the cap; a
    // streaming or oversized body flows to the client unbuffered.
    let (body, captured) = if declared_length_within(&parts.headers, capture.max_captured_body) {
        match to_bytes(body, capture.max_captured_body).await {
            Ok(bytes) => (Body::from(bytes.clone()), Some(bytes)),
            Err(e) => {
                tracing::error!(error = %e, correlation_id = %correlation_id, "failed to buffer response body");
                (Body::empty(), None)
            }
        }
    } else {
        (body, None)
    };

    let mut details = json!({
        "method": method.as_str(),
        "path": path,
        "status": status.as_u16(),
        "duration_ms": duration_ms,
        "correlation_id": correlation_id,
    });
    if let Some(bytes) = captured.filter(|b| !b.is_empty()) {
        if let Ok(body_json) = serde_json::from_slice::<Value>(&bytes) {
            details["response"] = sanitize_for_logging(&body_json);
        }
    }

    let mut event = AuditEvent::new(AuditAction::from_http_method(method.as_str()), path)
        .with_details(details)
        .with_ip(client_ip);
    if let Some(user_id) = principal {
        event = event.with_user(user_id);
    }
    if let Some(ua) = user_agent {
        event = event.with_user_agent(ua);
    }
    if status.is_client_error() || status.is_server_error() {
        event = event.failed();
    }

    // Fire and forget: the audit write never adds latency to the response
    // path and its failures are never visible to the client.
    let recorder = capture.recorder.clone();
    tokio::spawn(async move {
        recorder.record(event).await;
    });

    Response::from_parts(parts, body)
}

/// Whether the response declares a content length at or below `cap`.
/// Streaming responses carry no content length and are never buffered.
fn declared_length_within(headers: &HeaderMap, cap: usize) -> bool {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
        .is_some_and(|len| len <= cap)
}

/// Derives the client address: first forwarded-for entry, then real-ip,
/// then the transport peer, then `"unknown"`. First match wins.
fn client_address(headers: &HeaderMap, peer: Option<&ConnectInfo<SocketAddr>>) -> String {
    if let Some(forwarded) = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
    {
        if let Some(first) = forwarded
            .split(',')
            .next()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            return first.to_string();
        }
    }

    if let Some(real_ip) = headers
        .get(REAL_IP_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        return real_ip.to_string();
    }

    if let Some(ConnectInfo(addr)) = peer {
        return addr.ip().to_string();
    }

    UNKNOWN_ADDRESS.to_string()
}
