//! In-process fake execution agent for integration tests
//!
//! Serves `/health`, `/execute` and `/stop` on an ephemeral localhost port
//! and records every request it sees.

#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const AGENT_VERSION: &str = "1.4.2";
pub const AGENT_TOOLS: [&str; 4] = ["nmap", "id", "whoami", "echo"];

/// Commands starting with this prefix are rejected with HTTP 403
pub const FORBIDDEN_PREFIX: &str = "rm";

#[derive(Debug, Clone)]
pub struct AgentBehavior {
    pub health_delay: Duration,
    pub healthy: bool,
    pub execute_delay: Duration,
}

impl Default for AgentBehavior {
    fn default() -> Self {
        Self {
            health_delay: Duration::ZERO,
            healthy: true,
            execute_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
pub struct Recorded {
    pub health_calls: AtomicUsize,
    pub execute_calls: AtomicUsize,
    pub commands: Mutex<Vec<(String, u64)>>,
    pub stops: Mutex<Vec<i64>>,
}

impl Recorded {
    pub fn total_requests(&self) -> usize {
        self.health_calls.load(Ordering::SeqCst)
            + self.execute_calls.load(Ordering::SeqCst)
            + self.stops.lock().unwrap().len()
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }
}

#[derive(Clone)]
struct AppState {
    behavior: AgentBehavior,
    recorded: Arc<Recorded>,
}

pub struct FakeAgent {
    pub url: String,
    pub recorded: Arc<Recorded>,
}

impl FakeAgent {
    pub async fn start() -> Self {
        Self::with_behavior(AgentBehavior::default()).await
    }

    pub async fn with_behavior(behavior: AgentBehavior) -> Self {
        let recorded = Arc::new(Recorded::default());
        let app = Router::new()
            .route("/health", get(health))
            .route("/execute", post(execute))
            .route("/stop", post(stop))
            .with_state(AppState {
                behavior,
                recorded: Arc::clone(&recorded),
            });

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            url: format!("http://{}", addr),
            recorded,
        }
    }
}

/// URL of a localhost port with nothing listening
pub fn closed_port_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

async fn health(State(state): State<AppState>) -> Response {
    state.recorded.health_calls.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(state.behavior.health_delay).await;
    if !state.behavior.healthy {
        return (StatusCode::SERVICE_UNAVAILABLE, "agent starting").into_response();
    }
    Json(json!({
        "status": "ok",
        "version": AGENT_VERSION,
        "allowed_tools": AGENT_TOOLS,
    }))
    .into_response()
}

async fn execute(State(state): State<AppState>, Json(body): Json<Value>) -> Response {
    state.recorded.execute_calls.fetch_add(1, Ordering::SeqCst);
    let command = body["command"].as_str().unwrap_or_default().to_string();
    let timeout = body["timeout"].as_u64().unwrap_or_default();
    state.recorded.commands.lock().unwrap().push((command.clone(), timeout));

    tokio::time::sleep(state.behavior.execute_delay).await;

    if command.starts_with(FORBIDDEN_PREFIX) {
        return (
            StatusCode::FORBIDDEN,
            Json(json!({
                "success": false,
                "error": "Command not in allowed list",
            })),
        )
            .into_response();
    }

    if command == "false" {
        return Json(json!({
            "success": false,
            "output": "",
            "error": "",
            "return_code": 1,
            "process_id": 4243,
        }))
        .into_response();
    }

    Json(json!({
        "success": true,
        "output": format!("ok: {}", command),
        "error": "",
        "return_code": 0,
        "process_id": 4242,
    }))
    .into_response()
}

async fn stop(State(state): State<AppState>, Json(body): Json<Value>) -> Json<Value> {
    let process_id = body["process_id"].as_i64().unwrap_or(-1);
    state.recorded.stops.lock().unwrap().push(process_id);
    Json(json!({ "success": true }))
}
