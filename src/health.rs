use crate::routes::AuthMode;
use crate::types::Mode;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

#[derive(Serialize)]
pub struct HealthResponse {
    pub ok: bool,
    pub mode: &'static str,
    pub ts: String,
}

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub mode: &'static str,
    pub routes_loaded: usize,
    pub auth_enabled: bool,
}

#[derive(Serialize)]
pub struct RoutesResponse {
    pub routes: Vec<String>,
    pub configured: Vec<String>,
}

#[derive(Serialize)]
pub struct AgentEntry {
    pub id: String,
    pub endpoint: Option<String>,
    pub auth: Option<AuthMode>,
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct AgentsResponse {
    pub total: usize,
    pub agents: Vec<AgentEntry>,
}

/// ISO-8601 UTC timestamp with millisecond precision and a `Z` suffix.
pub fn utc_timestamp() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        mode: state.dispatcher.mode().as_str(),
        ts: utc_timestamp(),
    })
}

/// Forward mode with nothing routable is reported unready; simulation is
/// always ready.
pub async fn readiness(
    State(state): State<Arc<AppState>>,
) -> (StatusCode, Json<ReadinessResponse>) {
    let mode = state.dispatcher.mode();
    let routes_loaded = state.dispatcher.routes().len();
    let ready = mode == Mode::Simulation || routes_loaded > 0;

    if !ready {
        tracing::error!("Readiness check: forward mode with an empty route table");
    }

    (
        if ready {
            StatusCode::OK
        } else {
            StatusCode::SERVICE_UNAVAILABLE
        },
        Json(ReadinessResponse {
            status: if ready { "ready" } else { "unready" },
            mode: mode.as_str(),
            routes_loaded,
            auth_enabled: state.dispatcher.auth().is_enabled(),
        }),
    )
}

pub async fn list_routes(State(state): State<Arc<AppState>>) -> Json<RoutesResponse> {
    Json(RoutesResponse {
        routes: state.dispatcher.config().known_agents.clone(),
        configured: state.dispatcher.routes().ids(),
    })
}

pub async fn list_agents(State(state): State<Arc<AppState>>) -> Json<AgentsResponse> {
    let routes = state.dispatcher.routes();
    let agents: Vec<AgentEntry> = state
        .dispatcher
        .config()
        .known_agents
        .iter()
        .map(|id| match routes.resolve(id) {
            Some(route) => AgentEntry {
                id: id.clone(),
                endpoint: Some(route.url.clone()),
                auth: Some(route.auth_mode),
                status: "configured",
            },
            None => AgentEntry {
                id: id.clone(),
                endpoint: None,
                auth: None,
                status: "unconfigured",
            },
        })
        .collect();

    Json(AgentsResponse {
        total: agents.len(),
        agents,
    })
}

pub async fn not_found() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": "Not found" })),
    )
}
