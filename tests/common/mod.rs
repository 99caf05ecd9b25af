#![allow(dead_code)]

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    routing::{get, post},
    Router,
};
use bytes::Bytes;
use neura_gateway::routes::RouteTable;
use neura_gateway::server::build_router;
use neura_gateway::{AppState, Args};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::util::ServiceExt;

pub fn test_args(forward: bool) -> Args {
    Args {
        host: "127.0.0.1".to_string(),
        port: 0,
        make_forward: if forward { "1" } else { "0" }.to_string(),
        make_timeout: Duration::from_secs(4),
        make_token: Some("svc-token".to_string()),
        routing_path: PathBuf::from("unused-agent-routing.json"),
        agent_ids: Vec::new(),
        use_auth: "0".to_string(),
        auth_service_url: "http://127.0.0.1:9".to_string(),
        allowed_origin: None,
        max_body_size: 1024 * 1024,
        connect_timeout_secs: 2,
        log_dir: None,
        log_json: false,
    }
}

pub fn app_with(args: Args, routes: RouteTable) -> Router {
    let state = match AppState::with_routes(Arc::new(args), Arc::new(routes)) {
        Ok(s) => s,
        Err(e) => panic!("Failed to build state: {}", e),
    };
    build_router(Arc::new(state))
}

pub fn sim_app() -> Router {
    app_with(test_args(false), RouteTable::empty())
}

pub fn routes_json(json: &str) -> RouteTable {
    match RouteTable::from_json_str(json) {
        Ok(t) => t,
        Err(e) => panic!("Bad routing json in test: {}", e),
    }
}

pub fn invoke_request(
    agent_id: &str,
    auth: Option<&str>,
    route: Option<&str>,
    correlation_id: Option<&str>,
    body: &str,
) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(format!("/api/invoke/{}", agent_id))
        .header("content-type", "application/json");
    if let Some(v) = auth {
        builder = builder.header("authorization", v);
    }
    if let Some(v) = route {
        builder = builder.header("x-route", v);
    }
    if let Some(v) = correlation_id {
        builder = builder.header("x-correlation-id", v);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

pub fn valid_invoke(agent_id: &str, body: &str) -> Request<Body> {
    invoke_request(agent_id, Some("Bearer x"), Some("r1"), Some("c1"), body)
}

pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, serde_json::Value) {
    let response = app.oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, json)
}

/// Everything a stub agent received.
#[derive(Clone, Default)]
pub struct Captured {
    inner: Arc<Mutex<Vec<(HeaderMap, Bytes)>>>,
}

impl Captured {
    pub fn calls(&self) -> Vec<(HeaderMap, Bytes)> {
        self.inner.lock().unwrap().clone()
    }
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

/// Stub agent answering every POST /hook with a fixed status and body.
pub async fn spawn_agent(status: StatusCode, body: &'static str) -> (String, Captured) {
    spawn_slow_agent(status, body, Duration::ZERO).await
}

pub async fn spawn_slow_agent(
    status: StatusCode,
    body: &'static str,
    delay: Duration,
) -> (String, Captured) {
    let captured = Captured::default();
    let sink = captured.clone();
    let app = Router::new().route(
        "/hook",
        post(move |headers: HeaderMap, payload: Bytes| {
            let sink = sink.clone();
            async move {
                sink.inner.lock().unwrap().push((headers, payload));
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                (status, body)
            }
        }),
    );
    let base = serve(app).await;
    (format!("{}/hook", base), captured)
}

/// Stub auth collaborator: token "good" verifies, "anon" verifies without an
/// identity, anything else is a 401.
pub async fn spawn_auth_service() -> String {
    let app = Router::new().route(
        "/verify",
        get(|headers: HeaderMap| async move {
            let auth = headers
                .get("authorization")
                .and_then(|h| h.to_str().ok())
                .unwrap_or_default();
            if auth == "Bearer good" {
                (
                    StatusCode::OK,
                    axum::Json(serde_json::json!({
                        "user_id": "u-42",
                        "email": "ana@example.com",
                        "role": "analyst",
                    })),
                )
            } else if auth == "Bearer anon" {
                (
                    StatusCode::OK,
                    axum::Json(serde_json::json!({ "user_id": null, "email": null })),
                )
            } else {
                (
                    StatusCode::UNAUTHORIZED,
                    axum::Json(serde_json::json!({ "error": "invalid token" })),
                )
            }
        }),
    );
    serve(app).await
}

/// An address nothing is listening on.
pub async fn closed_port_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}/hook", addr)
}
