//! HTTP server.
//!
//! Exposes the [`LearningService`] operations as a JSON HTTP API for the
//! interactive client.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/start_session` | Open a session, optionally with a topic |
//! | `POST` | `/research` | Research a topic and index the results |
//! | `POST` | `/clarify` | Get the clarification questionnaire |
//! | `POST` | `/analyze_preferences` | Resolve answers into preferences |
//! | `POST` | `/generate_report` | Synthesize the learning report |
//! | `PATCH` | `/modify_report` | Revise the report from feedback |
//! | `GET`  | `/session/{session_id}` | Session summary |
//! | `DELETE` | `/session/{session_id}` | End a session and delete its index |
//! | `GET`  | `/health` | Health check (returns version) |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "topic is required" } }
//! ```
//!
//! Error codes: `bad_request` (400), `not_found` (404),
//! `generation_failed` (502), `internal` (500).
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use axum::{
    body::Bytes,
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use learning_harness_core::models::{ClarificationQuestion, PreferenceOverrides, Preferences};

use crate::config::Config;
use crate::error::LearningError;
use crate::service::{LearningService, ResearchRequest, ResearchResponse, SessionSummary};

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    service: Arc<LearningService>,
}

/// Longest wait between expired-session sweeps.
const MAX_REAP_INTERVAL_SECS: u64 = 60;

/// Starts the HTTP server on `[server].bind`.
///
/// Refuses to start while either model provider is disabled. With
/// `sessions.ttl_secs` set, expired sessions are swept in the background.
/// Runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    config.require_providers()?;
    let service = Arc::new(LearningService::from_config(config)?);

    if let Some(ttl) = config.sessions.ttl_secs {
        let every = Duration::from_secs(ttl.clamp(1, MAX_REAP_INTERVAL_SECS));
        spawn_session_reaper(service.clone(), every);
    }
    let app = build_router(service);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    info!("Learning harness listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

/// Purge expired sessions every `every` until the runtime shuts down.
pub fn spawn_session_reaper(service: Arc<LearningService>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        ticks.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticks.tick().await;
        loop {
            ticks.tick().await;
            if let Err(e) = service.purge_expired_sessions().await {
                warn!(error = %e, "session sweep failed");
            }
        }
    })
}

/// Build the router over an existing service.
pub fn build_router(service: Arc<LearningService>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/start_session", post(handle_start_session))
        .route("/research", post(handle_research))
        .route("/clarify", post(handle_clarify))
        .route("/analyze_preferences", post(handle_analyze_preferences))
        .route("/generate_report", post(handle_generate_report))
        .route("/modify_report", patch(handle_modify_report))
        .route(
            "/session/{session_id}",
            get(handle_get_session).delete(handle_end_session),
        )
        .route("/health", get(handle_health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(AppState { service })
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    /// Machine-readable error code (e.g., `"bad_request"`, `"not_found"`).
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
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

impl From<LearningError> for AppError {
    fn from(err: LearningError) -> Self {
        let message = err.to_string();
        let (status, code) = match &err {
            LearningError::InvalidRequest(_)
            | LearningError::EmptyCorpus
            | LearningError::NoResearchData => (StatusCode::BAD_REQUEST, "bad_request"),
            LearningError::SessionNotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            LearningError::GenerationFailure(_) => (StatusCode::BAD_GATEWAY, "generation_failed"),
            LearningError::ProviderFailure { .. }
            | LearningError::Index(_)
            | LearningError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        };
        if status.is_server_error() {
            error!(error = %message, "request failed");
        }
        AppError {
            status,
            code: code.to_string(),
            message,
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        bad_request(rejection.body_text())
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

// ============ POST /start_session ============

#[derive(Deserialize, Default)]
struct StartSessionRequest {
    #[serde(default)]
    topic: Option<String>,
}

#[derive(Serialize)]
struct StartSessionResponse {
    session_id: String,
}

/// The body is optional; an empty body starts a session without a topic.
async fn handle_start_session(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<StartSessionResponse>, AppError> {
    let request: StartSessionRequest = if body.iter().all(u8::is_ascii_whitespace) {
        StartSessionRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(|e| bad_request(format!("invalid body: {}", e)))?
    };
    let session_id = state.service.start_session(request.topic).await?;
    Ok(Json(StartSessionResponse { session_id }))
}

// ============ POST /research ============

async fn handle_research(
    State(state): State<AppState>,
    payload: Result<Json<ResearchRequest>, JsonRejection>,
) -> Result<Json<ResearchResponse>, AppError> {
    let Json(request) = payload?;
    Ok(Json(state.service.research(request).await?))
}

// ============ POST /clarify ============

#[derive(Deserialize)]
struct ClarifyRequest {
    #[serde(default)]
    answers: HashMap<String, serde_json::Value>,
}

#[derive(Serialize)]
struct ClarifyResponse {
    questions: Vec<ClarificationQuestion>,
}

async fn handle_clarify(
    State(state): State<AppState>,
    payload: Result<Json<ClarifyRequest>, JsonRejection>,
) -> Result<Json<ClarifyResponse>, AppError> {
    let Json(request) = payload?;
    let answers = stringify_answers(request.answers);
    let questions = state.service.clarify(&answers).await?;
    Ok(Json(ClarifyResponse { questions }))
}

// ============ POST /analyze_preferences ============

#[derive(Deserialize)]
struct AnalyzePreferencesRequest {
    #[serde(default)]
    answers: Option<HashMap<String, serde_json::Value>>,
    #[serde(default)]
    session_id: Option<String>,
}

#[derive(Serialize)]
struct PreferencesResponse {
    preferences: Preferences,
}

async fn handle_analyze_preferences(
    State(state): State<AppState>,
    payload: Result<Json<AnalyzePreferencesRequest>, JsonRejection>,
) -> Result<Json<PreferencesResponse>, AppError> {
    let Json(request) = payload?;
    let answers = request
        .answers
        .ok_or_else(|| bad_request("answers are required"))?;
    let answers = stringify_answers(answers);
    let preferences = state
        .service
        .analyze_preferences(&answers, request.session_id.as_deref())
        .await?;
    Ok(Json(PreferencesResponse { preferences }))
}

// ============ POST /generate_report ============

#[derive(Deserialize)]
struct GenerateReportRequest {
    session_id: String,
    #[serde(default)]
    preferences: PreferenceOverrides,
}

#[derive(Serialize)]
struct ReportResponse {
    report: String,
}

async fn handle_generate_report(
    State(state): State<AppState>,
    payload: Result<Json<GenerateReportRequest>, JsonRejection>,
) -> Result<Json<ReportResponse>, AppError> {
    let Json(request) = payload?;
    let report = state
        .service
        .generate_report(&request.session_id, &request.preferences)
        .await?;
    Ok(Json(ReportResponse { report }))
}

// ============ PATCH /modify_report ============

/// Feedback as a bare string or as `{ "text": ... }`.
#[derive(Deserialize)]
#[serde(untagged)]
enum Feedback {
    Text(String),
    Object {
        #[serde(default)]
        text: String,
    },
}

impl Feedback {
    fn text(&self) -> &str {
        match self {
            Feedback::Text(t) => t,
            Feedback::Object { text } => text,
        }
    }
}

#[derive(Deserialize)]
struct ModifyReportRequest {
    session_id: String,
    feedback: Feedback,
}

async fn handle_modify_report(
    State(state): State<AppState>,
    payload: Result<Json<ModifyReportRequest>, JsonRejection>,
) -> Result<Json<ReportResponse>, AppError> {
    let Json(request) = payload?;
    let report = state
        .service
        .modify_report(&request.session_id, request.feedback.text())
        .await?;
    Ok(Json(ReportResponse { report }))
}

// ============ GET /session/{session_id} ============

async fn handle_get_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionSummary>, AppError> {
    Ok(Json(state.service.get_session(&session_id).await?))
}

// ============ DELETE /session/{session_id} ============

async fn handle_end_session(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.service.end_session(&session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flatten JSON answer values to strings; `null` entries are dropped.
fn stringify_answers(answers: HashMap<String, serde_json::Value>) -> HashMap<String, String> {
    answers
        .into_iter()
        .filter_map(|(k, v)| match v {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((k, s)),
            other => Some((k, other.to_string())),
        })
        .collect()
}
