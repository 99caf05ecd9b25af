use crate::constants::{BEARER_PREFIX, HEADER_CORRELATION_ID, HEADER_ROUTE};
use crate::types::{GatewayError, Result};
use axum::http::{header, HeaderMap, HeaderValue};
use bytes::Bytes;

/// One inbound invoke call, as read off the wire. Absent headers are held as
/// empty strings; non-ASCII bytes are decoded lossily rather than dropped.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub agent_id: String,
    pub authorization: String,
    pub route_hint: String,
    pub correlation_id: String,
    /// Correlation header exactly as received, for propagation upstream.
    pub correlation_header: Option<HeaderValue>,
    pub body: Bytes,
}

pub fn header_lossy(headers: &HeaderMap, name: impl header::AsHeaderName) -> String {
    headers
        .get(name)
        .map(|h| String::from_utf8_lossy(h.as_bytes()).into_owned())
        .unwrap_or_default()
}

impl InboundRequest {
    pub fn from_parts(agent_id: impl Into<String>, headers: &HeaderMap, body: Bytes) -> Self {
        Self {
            agent_id: agent_id.into(),
            authorization: header_lossy(headers, header::AUTHORIZATION),
            route_hint: header_lossy(headers, HEADER_ROUTE),
            correlation_id: header_lossy(headers, HEADER_CORRELATION_ID),
            correlation_header: headers
                .get(HEADER_CORRELATION_ID)
                .filter(|v| !v.is_empty())
                .cloned(),
            body,
        }
    }

    /// Runs the request contract in its fixed order: bearer scheme, then the
    /// routing headers, then agent membership. The first failure wins.
    pub fn validate(&self, known_agents: &[String]) -> Result<()> {
        if !self.authorization.starts_with(BEARER_PREFIX) {
            return Err(GatewayError::MissingAuthorization.into());
        }

        if self.route_hint.is_empty() || self.correlation_id.is_empty() {
            return Err(GatewayError::MissingRouteHeaders.into());
        }

        if !known_agents.iter().any(|a| a == &self.agent_id) {
            return Err(GatewayError::UnknownAgent {
                agent_id: self.agent_id.clone(),
                available: known_agents.to_vec(),
            }
            .into());
        }

        Ok(())
    }

    /// Token portion of the Authorization header. Only meaningful after `validate`.
    pub fn bearer_token(&self) -> &str {
        self.authorization
            .strip_prefix(BEARER_PREFIX)
            .unwrap_or_default()
    }

    /// Body bytes sent upstream. An empty body goes out as `{}`.
    pub fn raw_body(&self) -> Bytes {
        if self.body.is_empty() {
            Bytes::from_static(b"{}")
        } else {
            self.body.clone()
        }
    }

    /// Parsed body for simulation echo. Unparseable input is swallowed into `{}`.
    pub fn parsed_body(&self) -> serde_json::Value {
        parse_body_lenient(&self.body)
    }
}

pub fn parse_body_lenient(body: &[u8]) -> serde_json::Value {
    if body.is_empty() {
        return serde_json::json!({});
    }
    match serde_json::from_slice::<serde_json::Value>(body) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!("Inbound body is not JSON, echoing {{}} instead: {}", e);
            serde_json::json!({})
        }
    }
}
