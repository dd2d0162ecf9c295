//! Per-request tracing for the HTTP API
//!
//! Each request runs inside an `http_request` span carrying its request id.
//! The id comes from the caller's `X-Request-ID` header when present, else a
//! fresh UUID, and is echoed back on the response.

use axum::{
    body::Body,
    http::{HeaderMap, HeaderValue, Request, Response, StatusCode},
    middleware::Next,
};
use std::time::{Duration, Instant};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "X-Request-ID";

pub fn generate_request_id() -> String {
    Uuid::new_v4().to_string()
}

/// Reuse a caller-supplied id if it is a valid header value
fn request_id_from(headers: &HeaderMap) -> String {
    headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.is_empty())
        .map(str::to_owned)
        .unwrap_or_else(generate_request_id)
}

fn log_completion(status: StatusCode, elapsed: Duration) {
    let status_code = status.as_u16();
    let duration_ms = elapsed.as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(status = status_code, duration_ms, "request failed");
    } else if status.is_client_error() {
        tracing::warn!(status = status_code, duration_ms, "request rejected");
    } else {
        tracing::info!(status = status_code, duration_ms, "request served");
    }
}

pub async fn request_tracing_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let started = Instant::now();
    let request_id = request_id_from(request.headers());

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        tracing::debug!("request received");
        let mut response = next.run(request).await;

        log_completion(response.status(), started.elapsed());

        if let Ok(value) = HeaderValue::from_str(&request_id) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        response
    }
    .instrument(span)
    .await
}
