//! End-to-end pipeline scenarios against fake graph and LLM backends —
//! no network, no live database. Each fake is scripted per-test via a
//! small closure-driven dispatcher keyed on a substring of the Cypher or
//! the prompt name, mirroring how `backend.py`'s own test fixtures stub
//! out `neo4j.GraphDatabase.driver` and the OpenAI client.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};

use scholarqa_graph::{GraphClient, QueryRow, ScoredRow};
use scholarqa_llm::{ChatMessage, LlmError, LlmProvider};
use scholarqa_orchestrator::{answer_question, OrchestratorDeps};
use scholarqa_prompt::{PromptRegistry, PROMPT_NAMES};

struct FakeGraph {
    exact_match_rows: Vec<QueryRow>,
    fuzzy_rows: Vec<ScoredRow>,
    vector_rows: Vec<ScoredRow>,
    query_rows: Vec<QueryRow>,
    calls: Mutex<Vec<String>>,
}

impl FakeGraph {
    fn empty() -> Self {
        Self {
            exact_match_rows: Vec::new(),
            fuzzy_rows: Vec::new(),
            vector_rows: Vec::new(),
            query_rows: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl GraphClient for FakeGraph {
    async fn execute(&self, query: &str, _params: Value) -> anyhow::Result<Vec<QueryRow>> {
        self.calls.lock().unwrap().push(query.to_string());
        if query.contains("toLower($name)") {
            Ok(self.exact_match_rows.clone())
        } else {
            Ok(self.query_rows.clone())
        }
    }

    async fn vector_search(
        &self,
        _index_name: &str,
        _k: usize,
        _embedding: &[f32],
        _restrict_to_cohort: bool,
    ) -> anyhow::Result<Vec<ScoredRow>> {
        Ok(self.vector_rows.clone())
    }

    async fn fulltext_search(&self, _index_name: &str, _term_expression: &str) -> anyhow::Result<Vec<ScoredRow>> {
        Ok(self.fuzzy_rows.clone())
    }
}

struct FakeLlm {
    intent_json: String,
    cypher: String,
    answer: String,
}

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
            Ok(self.intent_json.clone())
        } else if system_prompt.contains("cypher") {
            Ok(self.cypher.clone())
        } else {
            Ok(self.answer.clone())
        }
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, LlmError> {
        if text.is_empty() {
            return Ok(Vec::new());
        }
        Ok(vec![0.1, 0.2, 0.3])
    }
}

/// Builds a registry where only the intent-classification and
/// cypher-generation system prompts carry their respective discriminator
/// word — everything else (`FakeLlm::chat` dispatches on those two
/// substrings) gets a neutral body so synthesis calls fall through to the
/// `answer` branch instead of being misrouted.
fn test_prompts() -> Arc<PromptRegistry> {
    let tmp = tempfile::tempdir().unwrap();
    for &name in PROMPT_NAMES {
        let (file, body) = match name {
            "intent_classification" => ("intent_prompt.txt", "classify the question's intent"),
            "cypher_generation" => ("cypher_prompt.txt", "write a cypher query"),
            "answer_synthesis" => ("answer_prompt.txt", "summarize the results for the user"),
            "author_discovery" => ("author_discovery_prompt.txt", "find the authors of these titles"),
            "final_author_answer" => ("final_author_answer_prompt.txt", "summarize the author data"),
            "semantic_reask" => ("semantic_reask_prompt.txt", "reconsider using the semantic hits"),
            "name_extraction" => ("name_extraction_prompt.txt", "extract the researcher name"),
            _ => unreachable!(),
        };
        std::fs::write(tmp.path().join(file), body).unwrap();
    }
    Arc::new(PromptRegistry::load(tmp.path()).unwrap())
}

fn row(fields: Value) -> QueryRow {
    fields.as_object().unwrap().clone()
}

#[tokio::test]
async fn exact_author_match_routes_straight_to_template() {
    let graph = FakeGraph {
        exact_match_rows: vec![row(json!({ "userId": "u1", "name": "Marek Reformat" }))],
        query_rows: vec![row(json!({ "title": "Paper One", "year": 2022 }))],
        ..FakeGraph::empty()
    };
    let llm = FakeLlm {
        intent_json: json!({
            "intent_kind": "AUTHOR_LATEST_PUBLICATION",
            "author": "Marek Reformat",
            "second_author": null,
            "topic": null,
            "department": null,
            "start_year": null,
            "end_year": null,
            "scope": null,
        })
        .to_string(),
        cypher: "MATCH (r:Researcher)-[:AUTHORED]->(p) RETURN p.title AS title, p.year AS year".to_string(),
        answer: "Marek Reformat's latest publication is Paper One (2022).".to_string(),
    };

    let deps = OrchestratorDeps {
        graph: Arc::new(graph),
        llm: Arc::new(llm),
        prompts: test_prompts(),
        vector_index_name: "publication_embeddings".to_string(),
        fulltext_index_name: "researcher_name_index".to_string(),
    };

    let result = answer_question("What is Marek Reformat's latest publication?", &[], None, &deps).await;

    assert!(result.error.is_none());
    assert!(result.candidates.is_none());
    assert_eq!(result.db_rows.len(), 1);
    assert!(result.answer.contains("Paper One"));
}

#[tokio::test]
async fn fuzzy_matches_return_candidates_for_disambiguation() {
    let graph = FakeGraph {
        fuzzy_rows: vec![
            ScoredRow {
                row: row(json!({ "userId": "u1", "name": "Marek Reformat", "departments": ["ECE"] })),
                score: 0.9,
            },
            ScoredRow {
                row: row(json!({ "userId": "u2", "name": "Marek Reformata", "departments": ["CS"] })),
                score: 0.8,
            },
        ],
        ..FakeGraph::empty()
    };
    let llm = FakeLlm {
        intent_json: json!({
            "intent_kind": "AUTHOR_LATEST_PUBLICATION",
            "author": "Marrek Reformat",
            "second_author": null,
            "topic": null,
            "department": null,
            "start_year": null,
            "end_year": null,
            "scope": null,
        })
        .to_string(),
        cypher: String::new(),
        answer: String::new(),
    };

    let deps = OrchestratorDeps {
        graph: Arc::new(graph),
        llm: Arc::new(llm),
        prompts: test_prompts(),
        vector_index_name: "publication_embeddings".to_string(),
        fulltext_index_name: "researcher_name_index".to_string(),
    };

    let result = answer_question("What did Marrek Reformat publish last?", &[], None, &deps).await;

    assert!(result.error.is_none());
    let candidates = result.candidates.expect("expected fuzzy candidates");
    assert_eq!(candidates.len(), 2);
    assert_eq!(result.telemetry.resolution.path, "FUZZY");
}

#[tokio::test]
async fn selected_user_id_skips_resolution_entirely() {
    let graph = FakeGraph {
        query_rows: vec![row(json!({ "venue": "NeurIPS", "count": 7 }))],
        ..FakeGraph::empty()
    };
    let llm = FakeLlm {
        intent_json: json!({
            "intent_kind": "OPEN_QUESTION",
            "author": null,
            "second_author": null,
            "topic": null,
            "department": null,
            "start_year": null,
            "end_year": null,
            "scope": null,
        })
        .to_string(),
        cypher: "MATCH (r:Researcher {userId: $author_id})-[:AUTHORED]->(p) RETURN p.venue AS venue".to_string(),
        answer: "Their top venue is NeurIPS.".to_string(),
    };

    let deps = OrchestratorDeps {
        graph: Arc::new(graph),
        llm: Arc::new(llm),
        prompts: test_prompts(),
        vector_index_name: "publication_embeddings".to_string(),
        fulltext_index_name: "researcher_name_index".to_string(),
    };

    let result = answer_question("What's their top venue?", &[], Some("u1"), &deps).await;

    assert!(result.error.is_none());
    assert_eq!(result.telemetry.resolution.path, "");
    assert!(result.answer.contains("NeurIPS"));
}

#[tokio::test]
async fn department_umbrella_topic_trends_uses_template_path() {
    let graph = FakeGraph {
        vector_rows: vec![ScoredRow { row: row(json!({ "title": "Grid Resilience" })), score: 0.82 }],
        query_rows: vec![row(json!({ "department": "Electrical and Computer Engineering", "count": 12 }))],
        ..FakeGraph::empty()
    };
    let llm = FakeLlm {
        intent_json: json!({
            "intent_kind": "DEPARTMENT_TOPIC_TRENDS",
            "author": null,
            "second_author": null,
            "topic": "smart grids",
            "department": "Engineering",
            "start_year": null,
            "end_year": null,
            "scope": null,
        })
        .to_string(),
        cypher: "MATCH (d:Department) WHERE d.department = $dept RETURN d.department AS department, count(*) AS count"
            .to_string(),
        answer: "Engineering departments published 12 smart-grid papers.".to_string(),
    };

    let deps = OrchestratorDeps {
        graph: Arc::new(graph),
        llm: Arc::new(llm),
        prompts: test_prompts(),
        vector_index_name: "publication_embeddings".to_string(),
        fulltext_index_name: "researcher_name_index".to_string(),
    };

    let result = answer_question("What are the smart grid trends across engineering?", &[], None, &deps).await;

    assert!(result.error.is_none());
    assert!(result.cypher.contains("abbr"), "expected department clause to be broadened: {}", result.cypher);
    assert_eq!(result.db_rows.len(), 1);
}

#[tokio::test]
async fn topic_question_without_author_falls_back_to_semantic_path() {
    let graph = FakeGraph {
        vector_rows: vec![ScoredRow { row: row(json!({ "title": "Federated Learning at Scale" })), score: 0.88 }],
        query_rows: vec![row(json!({ "userId": "u3", "name": "Sina Rastegari" }))],
        ..FakeGraph::empty()
    };
    let llm = FakeLlm {
        intent_json: json!({
            "intent_kind": "OPEN_QUESTION",
            "author": null,
            "second_author": null,
            "topic": "federated learning",
            "department": null,
            "start_year": null,
            "end_year": null,
            "scope": null,
        })
        .to_string(),
        cypher: String::new(),
        answer: "Sina Rastegari works on federated learning at scale.".to_string(),
    };

    let deps = OrchestratorDeps {
        graph: Arc::new(graph),
        llm: Arc::new(llm),
        prompts: test_prompts(),
        vector_index_name: "publication_embeddings".to_string(),
        fulltext_index_name: "researcher_name_index".to_string(),
    };

    let result = answer_question("Who works on federated learning?", &[], None, &deps).await;

    assert!(result.error.is_none());
    assert_eq!(result.semantic_hits.len(), 1);
    assert!(result.answer.contains("federated learning"));
}

#[tokio::test]
async fn vector_index_unavailable_still_returns_guidance_instead_of_erroring() {
    let graph = FakeGraph::empty();
    let llm = FakeLlm {
        intent_json: json!({
            "intent_kind": "OPEN_QUESTION",
            "author": null,
            "second_author": null,
            "topic": "quantum computing",
            "department": null,
            "start_year": null,
            "end_year": null,
            "scope": null,
        })
        .to_string(),
        cypher: String::new(),
        answer: String::new(),
    };

    let deps = OrchestratorDeps {
        graph: Arc::new(graph),
        llm: Arc::new(llm),
        prompts: test_prompts(),
        vector_index_name: "publication_embeddings".to_string(),
        fulltext_index_name: "researcher_name_index".to_string(),
    };

    let result = answer_question("Who works on quantum computing?", &[], None, &deps).await;

    assert!(result.error.is_none());
    assert!(result.semantic_hits.is_empty());
    assert!(result.answer.contains("could not find"));
}
