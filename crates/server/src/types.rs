//! Request/response wire shapes for the HTTP surface (spec §6), grounded
//! directly on `examples/original_source/main.py`'s `QueryRequest` and
//! `DebugLogEntry` Pydantic models.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    #[serde(default)]
    pub selected_user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct DebugLogEntry {
    pub timestamp: String,
    pub question: String,
    pub answer: String,
    pub intent: Value,
    pub cypher: String,
    #[serde(rename = "dbRows")]
    pub db_rows: Vec<Value>,
    #[serde(rename = "semanticHits")]
    pub semantic_hits: Vec<Value>,
    #[serde(default)]
    pub telemetry: Option<Value>,
}
