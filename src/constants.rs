use std::time::Duration;

/// Inbound/outbound header names
pub const HEADER_ROUTE: &str = "x-route";
pub const HEADER_CORRELATION_ID: &str = "x-correlation-id";
pub const HEADER_SERVICE_TOKEN: &str = "x-make-token";
pub const HEADER_USER_ID: &str = "x-user-id";
pub const HEADER_USER_ROLE: &str = "x-user-role";

/// Scheme prefix required on the inbound Authorization header (case-sensitive, trailing space included)
pub const BEARER_PREFIX: &str = "Bearer ";

/// Agent ids served by the gateway when none are configured
pub const DEFAULT_AGENT_PREFIX: &str = "neura-";
pub const DEFAULT_AGENT_COUNT: usize = 10;

/// Forward defaults
pub const DEFAULT_FORWARD_TIMEOUT_SECS: f64 = 4.0;
pub const DEFAULT_ROUTING_PATH: &str = "packages/config/agent-routing.json";

/// Auth collaborator defaults
pub const DEFAULT_AUTH_SERVICE_URL: &str = "http://localhost:5000";
pub const AUTH_VERIFY_TIMEOUT: Duration = Duration::from_secs(2);

/// Identity used when remote verification is switched off
pub const DEV_USER_ID: &str = "dev-user";
pub const DEV_USER_EMAIL: &str = "dev@localhost";
pub const DEV_USER_ROLE: &str = "admin";

/// Upstream outcome tags reported inside forward envelopes
pub const OUTCOME_HTTP_ERROR: &str = "make_http_error";
pub const OUTCOME_UNREACHABLE: &str = "make_unreachable";
pub const OUTCOME_UNKNOWN: &str = "make_unknown";
pub const ROUTING_MISSING: &str = "routing-missing";

/// CORS preflight allow-lists
pub const CORS_ALLOW_METHODS: &[&str] = &["GET", "POST", "OPTIONS"];
pub const CORS_ALLOW_HEADERS: &[&str] = &[
    "authorization",
    "content-type",
    "x-route",
    "x-correlation-id",
];

pub fn default_agent_ids() -> Vec<String> {
    (1..=DEFAULT_AGENT_COUNT)
        .map(|i| format!("{}{}", DEFAULT_AGENT_PREFIX, i))
        .collect()
}
