//! HTTP API for assistant front-ends.
//!
//! Every tool in the [`ToolRegistry`] is reachable through the same
//! `POST /tools/{name}` handler; `/api/analyze` forwards a raw
//! [`AnalysisRequest`] to the configured model.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `GET`  | `/tools/list` | List all registered tools with schemas |
//! | `POST` | `/tools/{name}` | Call a tool; the answer is wrapped as `{ "result": ... }` |
//! | `POST` | `/api/analyze` | Model analysis, no fallback |
//!
//! # Error Contract
//!
//! Tool routes answer errors as
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "missing required parameter: input" } }
//! ```
//!
//! with codes `bad_request` (400), `not_found` (404) and `tool_error` (500).
//! `/api/analyze` answers `{ "error": "Invalid request body", "details": ... }`
//! (400) for a body that is not JSON, `{ "error": "Unknown analysis type" }`
//! (400) for JSON it cannot read as a request and
//! `{ "error": "Analysis failed", "details": ... }` (500) when the model call
//! fails.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted so browser front-ends can
//! call the API directly.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use tower_http::cors::{Any, CorsLayer};

use crate::analysis::{analyze, create_client, AnalysisRequest, ModelClient};
use crate::clock::SystemClock;
use crate::config::Config;
use crate::progress::ProgressTracker;
use crate::store::FileStore;
use crate::tools::{validate_params, ToolContext, ToolInfo, ToolRegistry};

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    tools: Arc<ToolRegistry>,
    ctx: ToolContext,
}

impl AppState {
    pub fn new(tracker: ProgressTracker, model: Arc<dyn ModelClient>) -> Self {
        Self {
            tools: Arc::new(ToolRegistry::with_builtins()),
            ctx: ToolContext::new(Arc::new(Mutex::new(tracker)), model),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/tools/list", get(handle_list_tools))
        .route("/tools/{name}", post(handle_tool_call))
        .route("/api/analyze", post(handle_analyze))
        .layer(cors)
        .with_state(state)
}

pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let store = FileStore::new(&config.storage.dir);
    let store_dir = store.dir().display().to_string();
    let tracker = ProgressTracker::open(store, SystemClock, config.storage.key.clone());
    let model = create_client(&config.analysis)?;
    let state = AppState::new(tracker, model.clone());

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(
        bind = %config.server.bind,
        store = %store_dir,
        model = model.name(),
        tools = state.tools.len(),
        "AdaptIQ server listening"
    );
    if !config.analysis.is_enabled() {
        tracing::info!("model analysis disabled: /api/analyze fails, *_ai tools use offline fallbacks");
    }
    axum::serve(listener, build_router(state)).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

fn not_found(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found".to_string(),
        message: message.into(),
    }
}

fn tool_error(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "tool_error".to_string(),
        message: message.into(),
    }
}

fn classify_tool_error(tool_name: &str, err: anyhow::Error) -> AppError {
    let msg = err.to_string();

    if msg.contains("not found") {
        not_found(format!("{}: {}", tool_name, msg))
    } else if msg.contains("must not be empty") || msg.contains("invalid") {
        bad_request(format!("{}: {}", tool_name, msg))
    } else {
        tool_error(format!("{}: {}", tool_name, msg))
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ GET /tools/list ============

#[derive(Serialize)]
struct ToolListResponse {
    tools: Vec<ToolInfo>,
}

async fn handle_list_tools(State(state): State<AppState>) -> Json<ToolListResponse> {
    Json(ToolListResponse {
        tools: state.tools.infos(),
    })
}

// ============ POST /tools/{name} ============

async fn handle_tool_call(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(params): Json<serde_json::Value>,
) -> Result<Json<serde_json::Value>, AppError> {
    let tool = state
        .tools
        .find(&name)
        .ok_or_else(|| not_found(format!("no tool registered with name: {}", name)))?;

    let validated_params = validate_params(&tool.parameters_schema(), &params)
        .map_err(|e| bad_request(e.to_string()))?;

    let result = tool
        .execute(validated_params, &state.ctx)
        .await
        .map_err(|e| classify_tool_error(&name, e))?;

    Ok(Json(serde_json::json!({ "result": result })))
}

// ============ POST /api/analyze ============

async fn handle_analyze(State(state): State<AppState>, body: Bytes) -> Response {
    let body: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!(error = %e, "analysis request is not JSON");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({
                    "error": "Invalid request body",
                    "details": e.to_string(),
                })),
            )
                .into_response();
        }
    };
    let request: AnalysisRequest = match serde_json::from_value(body) {
        Ok(request) => request,
        Err(e) => {
            tracing::debug!(error = %e, "rejected analysis request");
            return (
                StatusCode::BAD_REQUEST,
                Json(serde_json::json!({ "error": "Unknown analysis type" })),
            )
                .into_response();
        }
    };

    match analyze(state.ctx.model(), &request).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => {
            tracing::warn!(kind = request.kind(), error = %e, "analysis failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Analysis failed",
                    "details": e.to_string(),
                })),
            )
                .into_response()
        }
    }
}
