//! Route handlers (spec §6), grounded on
//! `examples/original_source/main.py`'s five routes.

use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_extra::extract::cookie::SignedCookieJar;
use chrono::Utc;
use tokio::io::AsyncWriteExt;
use tracing::{error, instrument, warn};

use scholarqa_llm::ChatMessage;
use scholarqa_orchestrator::{answer_question, OrchestratorResponse};

use crate::session::{read_history, write_history};
use crate::state::AppState;
use crate::types::{DebugLogEntry, ErrorBody, QueryRequest};

/// `GET /` and `GET /index.html` — the static UI document. UI rendering is
/// out of this system's core scope (spec §1); the handler serves
/// `index.html` from the working directory when present, and otherwise a
/// minimal placeholder so the process still answers the route.
pub async fn root() -> Response {
    match tokio::fs::read_to_string("index.html").await {
        Ok(body) => ([("content-type", "text/html; charset=utf-8")], body).into_response(),
        Err(_) => (
            [("content-type", "text/html; charset=utf-8")],
            "<!doctype html><title>Scholar Query Orchestrator</title><p>No index.html found.</p>".to_string(),
        )
            .into_response(),
    }
}

/// `GET /:filename` catch-all for any other root-level file, matching the
/// original's `serve_file` behavior.
pub async fn serve_file(axum::extract::Path(filename): axum::extract::Path<String>) -> Response {
    let path = Path::new(&filename);
    if path.components().count() != 1 {
        return StatusCode::NOT_FOUND.into_response();
    }
    match tokio::fs::read(path).await {
        Ok(bytes) => bytes.into_response(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `POST /api/query` — the main pipeline entry point. Validation errors are
/// the only case surfaced as a non-200 status; every other outcome
/// (candidates, empty-result guidance, caught external failures) is a 200
/// with the appropriate fields populated, per spec §7's propagation
/// policy.
#[instrument(skip(state, jar, body), fields(question_len = body.question.len()))]
pub async fn api_query(State(state): State<AppState>, jar: SignedCookieJar, Json(body): Json<QueryRequest>) -> Response {
    let question = body.question.trim();
    if question.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(ErrorBody { error: "Missing 'question' in request body.".to_string() }),
        )
            .into_response();
    }

    let history = read_history(&jar);

    let result = tokio::time::timeout(
        state.timeouts.outer_request,
        answer_question(question, &history, body.selected_user_id.as_deref(), &state.deps),
    )
    .await;

    let response = match result {
        Ok(r) => r,
        Err(_) => {
            warn!("request exceeded the outer deadline, abandoning in-flight work");
            timed_out_response(question)
        }
    };

    let mut updated_history = history;
    updated_history.push(ChatMessage::user(question));
    updated_history.push(ChatMessage::assistant(response.answer.clone()));

    match write_history(jar, &updated_history) {
        Ok(jar) => (jar, Json(response)).into_response(),
        Err(e) => {
            error!(error = %e, "failed to write session cookie");
            Json(response).into_response()
        }
    }
}

fn timed_out_response(_question: &str) -> OrchestratorResponse {
    OrchestratorResponse {
        answer: "The request took too long to process. Please try again.".to_string(),
        intent: serde_json::Value::Null,
        cypher: String::new(),
        db_rows: Vec::new(),
        semantic_hits: Vec::new(),
        candidates: None,
        telemetry: Default::default(),
        error: Some("request deadline exceeded".to_string()),
    }
}

/// `POST /api/log-debug` — appends one structured line to the debug log.
#[instrument(skip(state, entry))]
pub async fn log_debug(State(state): State<AppState>, Json(entry): Json<DebugLogEntry>) -> Response {
    let line = match serde_json::to_string(&entry) {
        Ok(line) => line,
        Err(e) => {
            error!(error = %e, "failed to serialize debug log entry");
            return (StatusCode::INTERNAL_SERVER_ERROR, "failed to serialize debug log entry").into_response();
        }
    };

    let result = async {
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(state.debug_log_path.as_ref())
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await
    }
    .await;

    match result {
        Ok(()) => Json(serde_json::json!({ "status": "success" })).into_response(),
        Err(e) => {
            error!(error = %e, path = %state.debug_log_path, "failed to write debug log");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Failed to write debug log: {e}")).into_response()
        }
    }
}

/// `GET /api/debug-log` — returns the debug log's raw contents, or an empty
/// body when it has not been created yet.
#[instrument(skip(state))]
pub async fn get_debug_log(State(state): State<AppState>) -> Response {
    match tokio::fs::read_to_string(state.debug_log_path.as_ref()).await {
        Ok(content) => ([("content-type", "text/plain; charset=utf-8")], content).into_response(),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            ([("content-type", "text/plain; charset=utf-8")], String::new()).into_response()
        }
        Err(e) => {
            error!(error = %e, "failed to read debug log");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("Error reading log file: {e}")).into_response()
        }
    }
}

/// Stamps the current time for a debug log entry the frontend assembles
/// client-side minus a timestamp; unused by any route directly but kept
/// alongside the other debug-log plumbing since `main.py`'s entry always
/// carries one.
#[allow(dead_code)]
pub fn now_rfc3339() -> String {
    Utc::now().to_rfc3339()
}
