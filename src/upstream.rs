//! Single-attempt forwarding to an agent upstream.
//!
//! Every forward produces exactly one [`UpstreamOutcome`]. Nothing here retries:
//! the caller owns retry policy.

use crate::constants::{
    HEADER_CORRELATION_ID, HEADER_SERVICE_TOKEN, HEADER_USER_ID, HEADER_USER_ROLE,
    OUTCOME_HTTP_ERROR, OUTCOME_UNKNOWN, OUTCOME_UNREACHABLE,
};
use crate::routes::{AuthMode, Route};
use axum::http::{HeaderValue, StatusCode};
use bytes::Bytes;
use std::time::Duration;

/// Result of one forward attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamOutcome {
    /// Upstream answered with a 2xx (after redirects).
    Success { status: u16, body: Bytes },
    /// Upstream answered with anything else.
    HttpError { status: u16, body: String },
    /// Connection refused, DNS failure, timeout or another network-layer fault.
    Unreachable { reason: String },
    /// Anything that is not a network fault (bad URL, body decode failure, ...).
    Unknown { reason: String },
}

impl UpstreamOutcome {
    /// Status actually received from the upstream, if one was.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            UpstreamOutcome::Success { status, .. } | UpstreamOutcome::HttpError { status, .. } => {
                Some(*status)
            }
            UpstreamOutcome::Unreachable { .. } | UpstreamOutcome::Unknown { .. } => None,
        }
    }

    /// Outer status returned to the gateway's caller together with the
    /// `resp` payload. Only `200` or `502`; the real upstream code travels
    /// inside the payload.
    pub fn normalize(&self) -> (StatusCode, serde_json::Value) {
        match self {
            UpstreamOutcome::Success { body, .. } => (StatusCode::OK, success_payload(body)),
            UpstreamOutcome::HttpError { status, body } => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({
                    "ok": false,
                    "error": OUTCOME_HTTP_ERROR,
                    "status": status,
                    "body": body,
                }),
            ),
            UpstreamOutcome::Unreachable { reason } => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({
                    "ok": false,
                    "error": OUTCOME_UNREACHABLE,
                    "reason": reason,
                }),
            ),
            UpstreamOutcome::Unknown { reason } => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({
                    "ok": false,
                    "error": OUTCOME_UNKNOWN,
                    "reason": reason,
                }),
            ),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            UpstreamOutcome::Success { .. } => "success",
            UpstreamOutcome::HttpError { .. } => OUTCOME_HTTP_ERROR,
            UpstreamOutcome::Unreachable { .. } => OUTCOME_UNREACHABLE,
            UpstreamOutcome::Unknown { .. } => OUTCOME_UNKNOWN,
        }
    }
}

/// Empty bodies read as `{}`; non-JSON bodies are wrapped as `{ok, raw}`.
fn success_payload(body: &[u8]) -> serde_json::Value {
    if body.is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(v) => v,
        Err(_) => serde_json::json!({
            "ok": true,
            "raw": String::from_utf8_lossy(body),
        }),
    }
}

/// Maps a transport error onto the closed outcome set.
pub fn classify_error(err: &reqwest::Error) -> UpstreamOutcome {
    let reason = err.to_string();
    if err.is_timeout() || err.is_connect() || err.is_request() {
        UpstreamOutcome::Unreachable { reason }
    } else {
        UpstreamOutcome::Unknown { reason }
    }
}

/// Context propagated on each forward.
#[derive(Debug, Clone, Default)]
pub struct ForwardContext<'a> {
    pub correlation_id: Option<&'a HeaderValue>,
    pub user_id: Option<&'a str>,
    pub user_role: Option<&'a str>,
}

pub struct UpstreamClient {
    client: reqwest::Client,
    timeout: Duration,
    service_token: Option<String>,
}

impl UpstreamClient {
    pub fn with_client(
        client: reqwest::Client,
        timeout: Duration,
        service_token: Option<String>,
    ) -> Self {
        Self {
            client,
            timeout,
            service_token: service_token.filter(|t| !t.is_empty()),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// POSTs `body` to the route's URL and reports what happened.
    pub async fn forward(
        &self,
        route: &Route,
        body: Bytes,
        ctx: &ForwardContext<'_>,
    ) -> UpstreamOutcome {
        let mut request = self
            .client
            .post(&route.url)
            .timeout(self.timeout)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        if let Some(cid) = ctx.correlation_id {
            request = request.header(HEADER_CORRELATION_ID, cid.clone());
        }
        if let Some(uid) = ctx.user_id {
            request = request.header(HEADER_USER_ID, uid);
        }
        if let Some(role) = ctx.user_role {
            request = request.header(HEADER_USER_ROLE, role);
        }
        if route.auth_mode == AuthMode::Header {
            if let Some(token) = &self.service_token {
                request = request.header(HEADER_SERVICE_TOKEN, token);
            }
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("[gateway -> {}] Send failed: {}", route.id, e);
                return classify_error(&e);
            }
        };

        let status = response.status();
        let body = match response.bytes().await {
            Ok(b) => b,
            Err(e) => {
                tracing::warn!(
                    "[gateway -> {}] Failed reading body (status {}): {}",
                    route.id,
                    status,
                    e
                );
                return classify_error(&e);
            }
        };

        if status.is_success() {
            UpstreamOutcome::Success {
                status: status.as_u16(),
                body,
            }
        } else {
            let text = String::from_utf8_lossy(&body).into_owned();
            tracing::warn!(
                "[gateway -> {}] Upstream returned {}: {}",
                route.id,
                status,
                crate::str_utils::preview(&text, 200)
            );
            UpstreamOutcome::HttpError {
                status: status.as_u16(),
                body: text,
            }
        }
    }
}
