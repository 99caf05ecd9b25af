use crate::constants::{CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS};
use crate::dispatcher::DispatchReply;
use crate::health;
use crate::ingress::InboundRequest;
use crate::logging::request_span_middleware;
use crate::AppState;
use axum::{
    extract::{rejection::PathRejection, DefaultBodyLimit, Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Uri},
    middleware,
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

/// Raw path prefix of the invoke route.
pub const INVOKE_PATH_PREFIX: &str = "/api/invoke/";

/// Origin always allowed alongside an explicit origin list (local frontend).
pub const DEV_FRONTEND_ORIGIN: &str = "http://localhost:5173";

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(state.args.allowed_origin.as_deref());
    let max_body_size = state.args.max_body_size;

    Router::new()
        .route("/api/health", get(health::health))
        .route("/readyz", get(health::readiness))
        .route("/api/routes", get(health::list_routes))
        .route("/api/agents", get(health::list_agents))
        .route(
            "/api/invoke/:agent_id",
            post(invoke_handler).fallback(health::not_found),
        )
        .fallback(health::not_found)
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(middleware::from_fn(request_span_middleware))
        .layer(cors)
        .with_state(state)
}

/// An agent id that does not percent-decode is kept in its raw form, so the
/// usual bearer/header/agent checks still decide the answer.
async fn invoke_handler(
    State(state): State<Arc<AppState>>,
    agent_id: std::result::Result<Path<String>, PathRejection>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> DispatchReply {
    let agent_id = match agent_id {
        Ok(Path(id)) => id,
        Err(e) => {
            tracing::debug!("Agent id in {} not decodable: {}", uri.path(), e);
            raw_agent_segment(&uri)
        }
    };
    let req = InboundRequest::from_parts(agent_id, &headers, body);
    state.dispatcher.handle(req).await
}

fn raw_agent_segment(uri: &Uri) -> String {
    uri.path()
        .strip_prefix(INVOKE_PATH_PREFIX)
        .unwrap_or_default()
        .to_string()
}

/// Answers every `OPTIONS` request itself and stamps
/// `Access-Control-Allow-Origin` on ordinary responses.
pub fn cors_layer(allowed_origin: Option<&str>) -> CorsLayer {
    let methods: Vec<Method> = CORS_ALLOW_METHODS
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    let headers: Vec<HeaderName> = CORS_ALLOW_HEADERS
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    let layer = CorsLayer::new().allow_methods(methods).allow_headers(headers);

    let requested: Vec<&str> = allowed_origin
        .map(|raw| raw.split(',').map(str::trim).filter(|o| !o.is_empty()).collect())
        .unwrap_or_default();

    if requested.is_empty() || requested.contains(&"*") {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = std::iter::once(DEV_FRONTEND_ORIGIN)
        .chain(requested)
        .filter_map(|o| match HeaderValue::from_str(o) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!("Ignoring invalid CORS origin '{}': {}", o, e);
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(origins))
}

/// Resolves on Ctrl-C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received, draining connections");
}
