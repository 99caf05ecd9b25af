use axum::http::StatusCode;
use serde::Serialize;
use std::fmt;
use thiserror::Error;
use tracing_error::SpanTrace;

/// Process-wide dispatch mode, fixed at startup.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Simulation,
    Forward,
}

impl Mode {
    pub fn from_forward_flag(forward_enabled: bool) -> Self {
        if forward_enabled {
            Mode::Forward
        } else {
            Mode::Simulation
        }
    }

    /// Wire name used by `/api/health`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Forward => "forward",
            Mode::Simulation => "sim",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Missing or invalid Authorization Bearer token")]
    MissingAuthorization,

    #[error("Missing required headers: X-Route, X-Correlation-Id")]
    MissingRouteHeaders,

    #[error("Unknown agent ID: {agent_id}")]
    UnknownAgent {
        agent_id: String,
        available: Vec<String>,
    },

    #[error("Authentication failed: {0}")]
    Unauthenticated(String),

    #[error("No upstream route configured for agent {0}")]
    RoutingMissing(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::MissingAuthorization | GatewayError::Unauthenticated(_) => {
                StatusCode::UNAUTHORIZED
            }
            GatewayError::MissingRouteHeaders => StatusCode::BAD_REQUEST,
            GatewayError::UnknownAgent { .. } => StatusCode::NOT_FOUND,
            GatewayError::RoutingMissing(_) | GatewayError::Network(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Serialization(_) | GatewayError::Io(_) | GatewayError::Config(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            GatewayError::MissingAuthorization => "MISSING_AUTHORIZATION",
            GatewayError::MissingRouteHeaders => "MISSING_HEADERS",
            GatewayError::UnknownAgent { .. } => "UNKNOWN_AGENT",
            GatewayError::Unauthenticated(_) => "AUTHENTICATION_FAILED",
            GatewayError::RoutingMissing(_) => "ROUTING_MISSING",
            GatewayError::Network(_) => "NETWORK_ERROR",
            GatewayError::Serialization(_) => "SERIALIZATION_ERROR",
            GatewayError::Io(_) => "IO_ERROR",
            GatewayError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// JSON body reported to the caller. Always carries `error` and `code`.
    pub fn body(&self) -> serde_json::Value {
        let code = self.code();
        match self {
            GatewayError::MissingAuthorization => serde_json::json!({
                "error": "Missing or invalid Authorization Bearer token",
                "code": code,
            }),
            GatewayError::MissingRouteHeaders => serde_json::json!({
                "error": "Missing required headers",
                "required": ["X-Route", "X-Correlation-Id"],
                "code": code,
            }),
            GatewayError::UnknownAgent {
                agent_id,
                available,
            } => serde_json::json!({
                "error": "Unknown agent ID",
                "agent_id": agent_id,
                "available": available,
                "code": code,
            }),
            GatewayError::Unauthenticated(detail) => serde_json::json!({
                "error": "Authentication failed",
                "detail": detail,
                "code": code,
            }),
            GatewayError::RoutingMissing(_) => serde_json::json!({
                "error": crate::constants::ROUTING_MISSING,
                "hint": "Check routing configuration",
                "code": code,
            }),
            other => serde_json::json!({
                "error": other.to_string(),
                "code": code,
            }),
        }
    }
}

#[derive(Debug)]
pub struct ObservedError {
    pub inner: GatewayError,
    pub span_trace: SpanTrace,
}

impl fmt::Display for ObservedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n\nSpan Trace:\n{}", self.inner, self.span_trace)
    }
}

impl std::error::Error for ObservedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.inner)
    }
}

impl<E> From<E> for ObservedError
where
    E: Into<GatewayError>,
{
    fn from(error: E) -> Self {
        Self {
            inner: error.into(),
            span_trace: SpanTrace::capture(),
        }
    }
}

impl axum::response::IntoResponse for ObservedError {
    fn into_response(self) -> axum::response::Response {
        let status = self.inner.status();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::debug!(code = self.inner.code(), "Rejected request: {}", self.inner);
        }
        (status, axum::Json(self.inner.body())).into_response()
    }
}

pub type Result<T> = std::result::Result<T, ObservedError>;
