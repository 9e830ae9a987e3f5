//! Common test utilities for sextant integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't read the
//! user's `~/.config/sextant/` directory or ambient `SX_*` variables.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assert_cmd::Command;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::Value;
pub use tempfile::TempDir;

/// Two groups, three projects, three users, three tasks, in the loose shape
/// the dashboard API returns (`_id`, camelCase, embedded references).
///
/// - G1 owns P1 (ongoing, owner U1, access U2) and P2 (closed, owner U1)
/// - G2 owns P3 (ongoing, owner U3)
/// - T1 (P1, U1, completed), T2 (P1, U2, overdue), T3 (P3, U3)
pub const SCENARIO: &str = r#"{
  "groups": [
    {"_id": "G1", "name": "Platform", "projectCount": 2},
    {"_id": "G2", "name": "Mobile", "projectCount": 1}
  ],
  "projects": [
    {"_id": "P1", "name": "Billing", "status": "ongoing", "group": {"_id": "G1"},
     "owner": "U1", "accessUserIds": ["U2"], "endDate": "2030-01-01T00:00:00Z"},
    {"_id": "P2", "name": "Legacy", "status": "closed", "groupId": "G1", "owner": {"_id": "U1"}},
    {"_id": "P3", "name": "App", "status": "ongoing", "groupId": "G2", "ownerId": "U3"}
  ],
  "users": [
    {"_id": "U1", "name": "Ada", "email": "ada@example.com"},
    {"_id": "U2", "name": "Brook", "email": "brook@example.com"},
    {"_id": "U3", "name": "Cyd", "email": "cyd@example.com"}
  ],
  "tasks": [
    {"_id": "T1", "title": "Invoices", "projectId": "P1", "status": "completed", "assignees": ["U1"]},
    {"_id": "T2", "title": "Refunds", "projectId": "P1", "status": "in progress",
     "assignees": [{"_id": "U2"}], "dueDate": "2026-03-01"},
    {"_id": "T3", "title": "Login", "project": {"_id": "P3"}, "assigneeIds": ["U3"]}
  ]
}"#;

/// A test environment with an isolated working and config directory.
///
/// The `sx()` method returns a `Command` that runs inside `work_dir`, points
/// `SX_CONFIG_DIR` at `config_dir` and clears the other `SX_*` variables,
/// making tests parallel-safe.
pub struct TestEnv {
    pub work_dir: TempDir,
    pub config_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            work_dir: TempDir::new().unwrap(),
            config_dir: TempDir::new().unwrap(),
        }
    }

    /// Create an environment with the scenario snapshot written to `data.json`.
    pub fn with_scenario() -> Self {
        let env = Self::new();
        env.write("data.json", SCENARIO);
        env
    }

    /// Get a Command for the sx binary with isolated config.
    pub fn sx(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_sx"));
        cmd.current_dir(self.work_dir.path());
        cmd.env("SX_CONFIG_DIR", self.config_dir.path());
        for var in ["SX_DATA", "SX_INSIGHT_ENDPOINT", "SX_API_TOKEN", "SX_LOG"] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Get a Command with `--data` pointing at the scenario snapshot.
    pub fn sx_with_data(&self) -> Command {
        let mut cmd = self.sx();
        cmd.arg("--data").arg(self.data_path());
        cmd
    }

    /// Write a file relative to the working directory.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.work_dir.path().join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    /// Write the system config file.
    pub fn write_system_config(&self, contents: &str) -> PathBuf {
        let path = self.config_dir.path().join("config.kdl");
        std::fs::write(&path, contents).unwrap();
        path
    }

    pub fn data_path(&self) -> PathBuf {
        self.work_dir.path().join("data.json")
    }

    pub fn path(&self) -> &Path {
        self.work_dir.path()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse the JSON printed on stdout.
pub fn parse_stdout(output: &std::process::Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).unwrap()
}

// === Mock HTTP services ===

/// One request received by the mock insight generator.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct GeneratorState {
    status: StatusCode,
    body: Value,
    delay: Duration,
    requests: Arc<Mutex<Vec<Recorded>>>,
}

async fn generate(
    State(state): State<GeneratorState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    state.requests.lock().unwrap().push(Recorded {
        authorization: headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });
    if !state.delay.is_zero() {
        tokio::time::sleep(state.delay).await;
    }
    (state.status, Json(state.body.clone()))
}

/// A local insight generator answering every POST with a fixed response.
pub struct MockGenerator {
    /// Full endpoint URL
    pub url: String,
    pub requests: Arc<Mutex<Vec<Recorded>>>,
}

impl MockGenerator {
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
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

/// Start a mock generator on the current runtime.
pub async fn spawn_generator(status: u16, body: Value, delay: Duration) -> MockGenerator {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = GeneratorState {
        status: StatusCode::from_u16(status).unwrap(),
        body,
        delay,
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/api/ai/admin/insights/filters", post(generate))
        .with_state(state);
    let base = serve(app).await;
    MockGenerator {
        url: format!("{}/api/ai/admin/insights/filters", base),
        requests,
    }
}

/// Start a dashboard API serving `snapshot` under `/api/<collection>`.
pub async fn spawn_entity_api(snapshot: Value) -> String {
    let mut app = Router::new();
    for collection in ["groups", "projects", "users", "tasks"] {
        let mut wrapped = serde_json::Map::new();
        wrapped.insert(collection.to_string(), snapshot[collection].clone());
        let body = Value::Object(wrapped);
        app = app.route(
            &format!("/api/{}", collection),
            get(move || {
                let body = body.clone();
                async move { Json(body) }
            }),
        );
    }
    serve(app).await
}

/// A runtime kept alive in the background so blocking CLI tests can reach
/// the mock services.
pub struct Background {
    runtime: tokio::runtime::Runtime,
}

impl Background {
    pub fn new() -> Self {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .enable_all()
            .build()
            .unwrap();
        Self { runtime }
    }

    pub fn generator(&self, status: u16, body: Value) -> MockGenerator {
        self.runtime
            .block_on(spawn_generator(status, body, Duration::ZERO))
    }

    pub fn entity_api(&self, snapshot: Value) -> String {
        self.runtime.block_on(spawn_entity_api(snapshot))
    }
}
