//! Route-level tests against fake graph/LLM backends, driven through the
//! router with `tower::ServiceExt::oneshot` rather than a bound socket —
//! no network involved, matching the no-live-backends posture of
//! `scholarqa-orchestrator`'s own pipeline tests.

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use scholarqa_config::{AppConfig, GraphConfig, LlmConfig, ServerConfig, TimeoutConfig};
use scholarqa_graph::{GraphClient, QueryRow, ScoredRow};
use scholarqa_llm::{ChatMessage, LlmError, LlmProvider};
use scholarqa_orchestrator::OrchestratorDeps;
use scholarqa_prompt::PromptRegistry;
use scholarqa_server::{build_router, AppState};

struct FakeGraph;

#[async_trait]
impl GraphClient for FakeGraph {
    async fn execute(&self, _query: &str, _params: Value) -> anyhow::Result<Vec<QueryRow>> {
        Ok(Vec::new())
    }
    async fn vector_search(
        &self,
        _index_name: &str,
        _k: usize,
        _embedding: &[f32],
        _restrict_to_cohort: bool,
    ) -> anyhow::Result<Vec<ScoredRow>> {
        Ok(Vec::new())
    }
    async fn fulltext_search(&self, _index_name: &str, _term_expression: &str) -> anyhow::Result<Vec<ScoredRow>> {
        Ok(Vec::new())
    }
}

struct FakeLlm;

#[async_trait]
impl LlmProvider for FakeLlm {
    async fn chat(
        &self,
        system_prompt: &str,
        _user_content: &str,
        _history: &[ChatMessage],
        _temperature: Option<f32>,
    ) -> Result<String, LlmError> {
        if system_prompt.contains("intent") {
            Ok(json!({
                "intent_kind": "OPEN_QUESTION",
                "author": null, "second_author": null, "topic": null,
                "department": null, "start_year": null, "end_year": null, "scope": null,
            })
            .to_string())
        } else {
            Ok("I could not find any relevant publications.".to_string())
        }
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>, LlmError> {
        Ok(Vec::new())
    }
}

fn test_prompts_dir() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    for &name in scholarqa_prompt::PROMPT_NAMES {
        let file = match name {
            "intent_classification" => "intent_prompt.txt",
            "cypher_generation" => "cypher_prompt.txt",
            "answer_synthesis" => "answer_prompt.txt",
            "author_discovery" => "author_discovery_prompt.txt",
            "final_author_answer" => "final_author_answer_prompt.txt",
            "semantic_reask" => "semantic_reask_prompt.txt",
            "name_extraction" => "name_extraction_prompt.txt",
            _ => unreachable!(),
        };
        std::fs::write(tmp.path().join(file), format!("this is the {name} prompt")).unwrap();
    }
    tmp
}

fn test_state(debug_log_path: &str) -> AppState {
    let prompts_dir = test_prompts_dir();
    let prompts = PromptRegistry::load(prompts_dir.path()).unwrap();
    let deps = OrchestratorDeps {
        graph: Arc::new(FakeGraph),
        llm: Arc::new(FakeLlm),
        prompts: Arc::new(prompts),
        vector_index_name: "publication_embeddings".to_string(),
        fulltext_index_name: "researcher_name_index".to_string(),
    };
    let config = AppConfig {
        graph: GraphConfig {
            uri: "bolt://localhost:7687".to_string(),
            user: "neo4j".to_string(),
            password: "password".to_string(),
            vector_index_name: "publication_embeddings".to_string(),
            fulltext_index_name: "researcher_name_index".to_string(),
        },
        llm: LlmConfig {
            api_key: "test".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            embedding_model: "text-embedding-3-large".to_string(),
        },
        server: ServerConfig {
            bind_addr: "127.0.0.1:0".to_string(),
            session_secret: "x".repeat(32),
            debug_log_path: debug_log_path.to_string(),
            static_dirs: Vec::new(),
        },
        timeouts: TimeoutConfig { per_call: std::time::Duration::from_secs(10), outer_request: std::time::Duration::from_secs(30) },
    };
    AppState::new(&config, deps)
}

#[tokio::test]
async fn empty_question_returns_400() {
    let state = test_state("/tmp/scholarqa_test_debug_log_empty.txt");
    let app = build_router(state);

    let request = Request::post("/api/query")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "question": "" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn well_formed_question_returns_200_with_answer() {
    let state = test_state("/tmp/scholarqa_test_debug_log_ok.txt");
    let app = build_router(state);

    let request = Request::post("/api/query")
        .header("content-type", "application/json")
        .body(Body::from(json!({ "question": "Who works on smart grids?" }).to_string()))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn debug_log_roundtrips_through_append_and_read() {
    let path = "/tmp/scholarqa_test_debug_log_roundtrip.txt";
    let _ = std::fs::remove_file(path);
    let state = test_state(path);
    let app = build_router(state);

    let entry = json!({
        "timestamp": "2026-01-01T00:00:00Z",
        "question": "q",
        "answer": "a",
        "intent": {},
        "cypher": "",
        "dbRows": [],
        "semanticHits": [],
    });
    let post_request = Request::post("/api/log-debug")
        .header("content-type", "application/json")
        .body(Body::from(entry.to_string()))
        .unwrap();
    let post_response = app.clone().oneshot(post_request).await.unwrap();
    assert_eq!(post_response.status(), StatusCode::OK);

    let get_request = Request::get("/api/debug-log").body(Body::empty()).unwrap();
    let get_response = app.oneshot(get_request).await.unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);

    let _ = std::fs::remove_file(path);
}
