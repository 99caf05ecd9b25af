mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use common::*;
use neura_gateway::logging::REQUEST_ID_HEADER;
use neura_gateway::routes::RouteTable;
use serde_json::json;

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_reports_mode_and_timestamp() {
    let (status, _, body) = send(sim_app(), get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["ok"], true);
    assert_eq!(body["mode"], "sim");
    let ts = body["ts"].as_str().unwrap();
    assert!(chrono::DateTime::parse_from_rfc3339(ts).is_ok());
    assert_eq!(body.as_object().map(|o| o.len()), Some(3));

    let app = app_with(test_args(true), RouteTable::empty());
    let (_, _, body) = send(app, get("/api/health")).await;
    assert_eq!(body["mode"], "forward");
}

#[tokio::test]
async fn test_readiness() {
    let (status, _, body) = send(sim_app(), get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["auth_enabled"], false);

    let app = app_with(test_args(true), RouteTable::empty());
    let (status, _, body) = send(app, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unready");
    assert_eq!(body["routes_loaded"], 0);

    let routes = routes_json(r#"[{"id":"neura-1","url":"http://127.0.0.1:9/hook"}]"#);
    let app = app_with(test_args(true), routes);
    let (status, _, body) = send(app, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routes_loaded"], 1);
}

#[tokio::test]
async fn test_route_and_agent_listing() {
    let routes = routes_json(
        r#"[{"id":"neura-3","url":"http://agents/cfo","auth":"header"},{"id":"neura-1","url":"http://agents/analytics"}]"#,
    );
    let app = app_with(test_args(true), routes.clone());
    let (status, _, body) = send(app, get("/api/routes")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["routes"].as_array().map(|a| a.len()), Some(10));
    assert_eq!(body["configured"], json!(["neura-1", "neura-3"]));

    let app = app_with(test_args(true), routes);
    let (status, _, body) = send(app, get("/api/agents")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 10);
    let agents = body["agents"].as_array().unwrap();
    let cfo = agents.iter().find(|a| a["id"] == "neura-3").unwrap();
    assert_eq!(cfo["status"], "configured");
    assert_eq!(cfo["endpoint"], "http://agents/cfo");
    assert_eq!(cfo["auth"], "header");
    let other = agents.iter().find(|a| a["id"] == "neura-5").unwrap();
    assert_eq!(other["status"], "unconfigured");
    assert!(other["endpoint"].is_null());
}

#[tokio::test]
async fn test_unknown_path_is_404() {
    let (status, _, body) = send(sim_app(), get("/nowhere")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({"error": "Not found"}));

    let (status, _, _) = send(sim_app(), get("/api/invoke/neura-1")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_preflight_allows_everything() {
    let req = Request::builder()
        .method("OPTIONS")
        .uri("/api/invoke/neura-1")
        .header("origin", "https://app.example.com")
        .header("access-control-request-method", "POST")
        .header("access-control-request-headers", "authorization,x-route")
        .body(Body::empty())
        .unwrap();
    let (status, headers, _) = send(sim_app(), req).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], "*");
    let methods = headers["access-control-allow-methods"].to_str().unwrap();
    assert!(methods.contains("POST"));
    assert!(methods.contains("OPTIONS"));
    let allowed = headers["access-control-allow-headers"]
        .to_str()
        .unwrap()
        .to_ascii_lowercase();
    assert!(allowed.contains("x-correlation-id"));
    assert!(allowed.contains("x-route"));
}

#[tokio::test]
async fn test_cors_header_on_regular_responses() {
    let mut req = valid_invoke("neura-1", "{}");
    req.headers_mut()
        .insert("origin", "https://app.example.com".parse().unwrap());
    let (status, headers, _) = send(sim_app(), req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["access-control-allow-origin"], "*");
}

#[tokio::test]
async fn test_cors_explicit_origin_list() {
    let mut args = test_args(false);
    args.allowed_origin = Some("https://app.example.com, https://admin.example.com".into());

    let mut req = valid_invoke("neura-1", "{}");
    req.headers_mut()
        .insert("origin", "https://admin.example.com".parse().unwrap());
    let (_, headers, _) = send(app_with(args.clone(), RouteTable::empty()), req).await;
    assert_eq!(
        headers["access-control-allow-origin"],
        "https://admin.example.com"
    );

    let mut req = valid_invoke("neura-1", "{}");
    req.headers_mut()
        .insert("origin", "https://evil.example.com".parse().unwrap());
    let (_, headers, _) = send(app_with(args, RouteTable::empty()), req).await;
    assert!(headers.get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_responses_carry_request_id() {
    let (_, headers, _) = send(sim_app(), valid_invoke("neura-1", "{}")).await;
    let id = headers[REQUEST_ID_HEADER].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(id).is_ok());
}

#[tokio::test]
async fn test_remote_auth_rejects_bad_token() {
    let auth_url = spawn_auth_service().await;
    let mut args = test_args(false);
    args.use_auth = "1".into();
    args.auth_service_url = auth_url;
    let app = app_with(args, RouteTable::empty());

    let req = invoke_request("neura-1", Some("Bearer bad"), Some("r1"), Some("c1"), "{}");
    let (status, _, body) = send(app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Authentication failed");
    assert_eq!(body["detail"], "Invalid or expired token");
}

#[tokio::test]
async fn test_remote_auth_accepts_good_token_and_propagates_identity() {
    let auth_url = spawn_auth_service().await;
    let (agent_url, captured) = spawn_agent(StatusCode::OK, r#"{"ok":true}"#).await;
    let mut args = test_args(true);
    args.use_auth = "1".into();
    args.auth_service_url = auth_url;
    let routes = routes_json(&format!(r#"[{{"id":"neura-1","url":"{}"}}]"#, agent_url));
    let app = app_with(args, routes);

    let req = invoke_request("neura-1", Some("Bearer good"), Some("r1"), Some("c1"), "{}");
    let (status, _, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp"], json!({"ok": true}));

    let calls = captured.calls();
    assert_eq!(calls[0].0["x-user-id"], "u-42");
    assert_eq!(calls[0].0["x-user-role"], "analyst");
}

#[tokio::test]
async fn test_remote_auth_runs_after_request_validation() {
    let mut args = test_args(false);
    args.use_auth = "1".into();
    // Nothing listens here; validation must fail before it is contacted.
    args.auth_service_url = closed_port_url().await;
    let app = app_with(args.clone(), RouteTable::empty());

    let (status, _, _) = send(app, valid_invoke("neura-42", "{}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let app = app_with(args, RouteTable::empty());
    let (status, _, body) = send(app, valid_invoke("neura-1", "{}")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"]
        .as_str()
        .unwrap()
        .starts_with("Auth verification failed"));
}

#[tokio::test]
async fn test_remote_auth_without_identity_fields_still_forwards() {
    let auth_url = spawn_auth_service().await;
    let (agent_url, captured) = spawn_agent(StatusCode::OK, r#"{"ok":true}"#).await;
    let mut args = test_args(true);
    args.use_auth = "1".into();
    args.auth_service_url = auth_url;
    let routes = routes_json(&format!(r#"[{{"id":"neura-1","url":"{}"}}]"#, agent_url));
    let app = app_with(args, routes);

    let req = invoke_request("neura-1", Some("Bearer anon"), Some("r1"), Some("c1"), "{}");
    let (status, _, body) = send(app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["resp"], json!({"ok": true}));

    let calls = captured.calls();
    assert!(calls[0].0.get("x-user-id").is_none());
    assert!(calls[0].0.get("x-user-role").is_none());
}
