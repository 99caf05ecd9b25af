//! Turns one inbound invoke call into exactly one JSON envelope.
//!
//! The outer status is always one of 200/400/401/404/502. Upstream business
//! failures are carried inside the envelope (`resp`), never as the outer code.

use crate::auth::{AuthVerifier, Identity};
use crate::ingress::InboundRequest;
use crate::routes::RouteTable;
use crate::types::{Mode, ObservedError};
use crate::upstream::{ForwardContext, UpstreamClient, UpstreamOutcome};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::Instrument;

/// Resolved once at startup and never mutated.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    pub forward_enabled: bool,
    pub timeout: Duration,
    pub service_token: Option<String>,
    pub known_agents: Vec<String>,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            forward_enabled: false,
            timeout: Duration::from_secs_f64(crate::constants::DEFAULT_FORWARD_TIMEOUT_SECS),
            service_token: None,
            known_agents: crate::constants::default_agent_ids(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DispatchReply {
    pub status: StatusCode,
    pub body: serde_json::Value,
}

impl DispatchReply {
    fn rejected(err: ObservedError) -> Self {
        tracing::info!(code = err.inner.code(), "Invoke rejected: {}", err.inner);
        Self {
            status: err.inner.status(),
            body: err.inner.body(),
        }
    }
}

impl IntoResponse for DispatchReply {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}

pub struct Dispatcher {
    routes: Arc<RouteTable>,
    config: DispatchConfig,
    upstream: UpstreamClient,
    auth: AuthVerifier,
}

impl Dispatcher {
    pub fn new(
        routes: Arc<RouteTable>,
        config: DispatchConfig,
        client: reqwest::Client,
        auth: AuthVerifier,
    ) -> Self {
        let upstream = UpstreamClient::with_client(client, config.timeout, config.service_token.clone());
        Self {
            routes,
            config,
            upstream,
            auth,
        }
    }

    pub fn mode(&self) -> Mode {
        Mode::from_forward_flag(self.config.forward_enabled)
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn auth(&self) -> &AuthVerifier {
        &self.auth
    }

    pub async fn handle(&self, req: InboundRequest) -> DispatchReply {
        let span = tracing::info_span!(
            "dispatch",
            agent_id = %req.agent_id,
            correlation_id = %crate::str_utils::prefix_chars(&req.correlation_id, 36),
            mode = %self.mode(),
            outcome = tracing::field::Empty,
        );
        self.handle_inner(req).instrument(span).await
    }

    async fn handle_inner(&self, req: InboundRequest) -> DispatchReply {
        if let Err(e) = req.validate(&self.config.known_agents) {
            return DispatchReply::rejected(e);
        }

        let identity = match self.auth.verify(req.bearer_token()).await {
            Ok(identity) => identity,
            Err(e) => return DispatchReply::rejected(e),
        };

        tracing::info!(
            "[client -> gateway] Invoke {} | user={} role={} | route={}",
            req.agent_id,
            identity.user_id.as_deref().unwrap_or("-"),
            identity.role.as_deref().unwrap_or("-"),
            req.route_hint
        );

        if self.config.forward_enabled {
            self.forward(&req, &identity).await
        } else {
            self.simulate(&req)
        }
    }

    fn simulate(&self, req: &InboundRequest) -> DispatchReply {
        tracing::Span::current().record("outcome", "simulated");
        DispatchReply {
            status: StatusCode::OK,
            body: serde_json::json!({
                "id": req.agent_id,
                "ok": true,
                "forward": false,
                "echo": req.parsed_body(),
                "route": req.route_hint,
                "correlation_id": req.correlation_id,
            }),
        }
    }

    async fn forward(&self, req: &InboundRequest, identity: &Identity) -> DispatchReply {
        let span = tracing::Span::current();

        let route = match self.routes.resolve(&req.agent_id) {
            Some(r) => r,
            None => {
                span.record("outcome", crate::constants::ROUTING_MISSING);
                tracing::error!(
                    "No route configured for known agent {}; check the routing file",
                    req.agent_id
                );
                let err = crate::types::GatewayError::RoutingMissing(req.agent_id.clone());
                let mut body = self.envelope(req, None);
                merge(&mut body, err.body());
                return DispatchReply {
                    status: err.status(),
                    body,
                };
            }
        };

        let ctx = ForwardContext {
            correlation_id: req.correlation_header.as_ref(),
            user_id: identity.user_id.as_deref(),
            user_role: identity.role.as_deref(),
        };

        let started = Instant::now();
        let outcome = self.upstream.forward(route, req.raw_body(), &ctx).await;
        let latency_ms = started.elapsed().as_millis();
        span.record("outcome", outcome.label());

        match &outcome {
            UpstreamOutcome::Success { status, .. } => tracing::info!(
                "[gateway -> {}] {} in {}ms",
                route.id,
                status,
                latency_ms
            ),
            UpstreamOutcome::HttpError { status, .. } => tracing::warn!(
                "[gateway -> {}] HTTP {} in {}ms",
                route.id,
                status,
                latency_ms
            ),
            UpstreamOutcome::Unreachable { reason } | UpstreamOutcome::Unknown { reason } => {
                tracing::warn!(
                    "[gateway -> {}] {} after {}ms: {}",
                    route.id,
                    outcome.label(),
                    latency_ms,
                    reason
                )
            }
        }

        let (status, payload) = outcome.normalize();
        let mut body = self.envelope(req, outcome.upstream_status());
        body["resp"] = payload;
        DispatchReply { status, body }
    }

    fn envelope(&self, req: &InboundRequest, upstream_status: Option<u16>) -> serde_json::Value {
        serde_json::json!({
            "id": req.agent_id,
            "route": req.route_hint,
            "forward": true,
            "correlation_id": req.correlation_id,
            "upstream_status": upstream_status,
        })
    }
}

fn merge(target: &mut serde_json::Value, extra: serde_json::Value) {
    if let (Some(target), serde_json::Value::Object(extra)) = (target.as_object_mut(), extra) {
        target.extend(extra);
    }
}
