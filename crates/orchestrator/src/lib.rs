//! Orchestrator (C11): drives C4–C10 with the speculative parallelism,
//! fallback, and telemetry the spec requires. `answer_question` is
//! infallible — it catches every internal failure and folds it into the
//! `error` field of a structurally valid response, matching spec §7's
//! propagation policy.

mod telemetry;

pub use telemetry::{ResolutionMetadata, Telemetry};

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{instrument, warn};

use scholarqa_graph::GraphClient;
use scholarqa_intent::{normalize, Intent, IntentKind};
use scholarqa_llm::{ChatMessage, LlmProvider};
use scholarqa_prompt::PromptRegistry;
use scholarqa_query::{generate_author_discovery_cypher, generate_cypher, planner, PlannerState};
use scholarqa_resolver::{resolve, Resolution};
use scholarqa_retriever::{embed, search_cohort, search_topic, PublicationHit};
use scholarqa_synth::{reask_with_semantic_hits, synthesize_fallback, synthesize_template};

/// Everything the orchestrator needs to reach the outside world, grouped so
/// `scholarqa-server` builds it once at startup and shares it across
/// requests (spec §5: a single connection pool, a single LLM client, the
/// prompt registry read-only).
pub struct OrchestratorDeps {
    pub graph: Arc<dyn GraphClient>,
    pub llm: Arc<dyn LlmProvider>,
    pub prompts: Arc<PromptRegistry>,
    pub vector_index_name: String,
    pub fulltext_index_name: String,
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct OrchestratorResponse {
    pub answer: String,
    pub intent: Value,
    pub cypher: String,
    #[serde(rename = "dbRows")]
    pub db_rows: Vec<scholarqa_graph::QueryRow>,
    #[serde(rename = "semanticHits")]
    pub semantic_hits: Vec<PublicationHit>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<scholarqa_resolver::Candidate>>,
    pub telemetry: Telemetry,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OrchestratorResponse {
    fn empty(telemetry: Telemetry) -> Self {
        Self {
            answer: "An internal error occurred while processing your request.".to_string(),
            intent: Value::Null,
            cypher: String::new(),
            db_rows: Vec::new(),
            semantic_hits: Vec::new(),
            candidates: None,
            telemetry,
            error: None,
        }
    }
}

/// Top-level pipeline entry point. `selected_user_id` carries the out-of-
/// band disambiguation choice the HTTP layer supplies after a prior
/// candidate-list response; when present it short-circuits resolution
/// entirely, per spec §4.6.
#[instrument(skip(question, history, deps), fields(question_len = question.len(), has_selection = selected_user_id.is_some()))]
pub async fn answer_question(
    question: &str,
    history: &[ChatMessage],
    selected_user_id: Option<&str>,
    deps: &OrchestratorDeps,
) -> OrchestratorResponse {
    let total_start = Instant::now();
    let mut telemetry = Telemetry::default();
    let mut response = OrchestratorResponse::empty(telemetry.clone());

    let outcome = run_pipeline(question, history, selected_user_id, deps, &mut telemetry).await;

    match outcome {
        Ok(mut r) => {
            telemetry.record("total", total_start.elapsed());
            r.telemetry = telemetry;
            r
        }
        Err(e) => {
            warn!(error = %e, "answer_question pipeline failed before producing a full result");
            telemetry.record("total", total_start.elapsed());
            response.telemetry = telemetry;
            response.error = Some(e.to_string());
            response
        }
    }
}

async fn run_pipeline(
    question: &str,
    history: &[ChatMessage],
    selected_user_id: Option<&str>,
    deps: &OrchestratorDeps,
    telemetry: &mut Telemetry,
) -> anyhow::Result<OrchestratorResponse> {
    // ~~~ Step 0: intent classification and question embedding, speculative parallel ~~~
    let step0_start = Instant::now();
    let (raw_intent, question_embedding) = tokio::join!(
        scholarqa_intent::classify(question, deps.llm.as_ref(), deps.prompts.as_ref()),
        embed(question, deps.llm.as_ref()),
    );
    let question_embedding = question_embedding.unwrap_or_default();
    telemetry.record("step0_setup", step0_start.elapsed());

    let mut intent = normalize(raw_intent);

    // ~~~ Author resolution & intent promotion ~~~
    match planner::after_classification(&intent, selected_user_id.is_some()) {
        PlannerState::Resolve => {
            let resolve_start = Instant::now();
            let author_name = intent.author.clone().unwrap_or_default();
            let resolution = resolve(&author_name, deps.graph.as_ref(), &deps.fulltext_index_name).await?;
            telemetry.record("author_resolution", resolve_start.elapsed());
            telemetry.resolution = ResolutionMetadata {
                path: resolution.path_label().to_string(),
                fuzzy_scores: resolution.fuzzy_scores(),
            };

            match planner::after_resolution(&resolution) {
                PlannerState::ReturnCandidates => {
                    let candidates = match resolution {
                        Resolution::Fuzzy(c) => c,
                        _ => unreachable!(),
                    };
                    return Ok(OrchestratorResponse {
                        answer: format!(
                            "I couldn't find an exact match for '{author_name}', but I found similar researchers. Please select one:"
                        ),
                        intent: serde_json::to_value(&intent)?,
                        cypher: String::new(),
                        db_rows: Vec::new(),
                        semantic_hits: Vec::new(),
                        candidates: Some(candidates),
                        telemetry: telemetry.clone(),
                        error: None,
                    });
                }
                PlannerState::Promoted => {
                    if let Resolution::Exact(author_id) = resolution {
                        intent.author_id = Some(author_id);
                        if intent.intent_kind == IntentKind::OpenQuestion {
                            intent.intent_kind = IntentKind::AuthorPublicationsRange;
                        }
                    }
                }
                _ => unreachable!("after_resolution only yields ReturnCandidates or Promoted"),
            }
        }
        PlannerState::Promoted => {
            if let Some(selected_id) = selected_user_id {
                // Direct user selection short-circuits resolution entirely.
                intent.author_id = Some(selected_id.to_string());
                if let Some(name) = lookup_canonical_name(selected_id, deps.graph.as_ref()).await? {
                    intent.author = Some(name);
                }
                if intent.intent_kind == IntentKind::OpenQuestion {
                    intent.intent_kind = IntentKind::AuthorMainResearchAreas;
                }
            }
        }
        other => unreachable!("after_classification only yields Resolve or Promoted, got {other:?}"),
    }

    // ~~~ ROUTE ~~~
    match planner::route(&intent) {
        PlannerState::Template => run_template_path(question, history, intent, question_embedding, deps, telemetry).await,
        PlannerState::SemanticFallback => run_semantic_fallback_path(question, history, intent, question_embedding, deps, telemetry).await,
        other => unreachable!("route only yields Template or SemanticFallback, got {other:?}"),
    }
}

async fn lookup_canonical_name(user_id: &str, graph: &dyn GraphClient) -> anyhow::Result<Option<String>> {
    let rows = graph
        .execute(
            "MATCH (p:Person {userId: $uid}) RETURN coalesce(p.name, p.normalized_name) AS name",
            serde_json::json!({ "uid": user_id }),
        )
        .await?;
    Ok(rows
        .into_iter()
        .next()
        .and_then(|row| row.get("name").and_then(|v| v.as_str()).map(str::to_string)))
}

async fn run_template_path(
    question: &str,
    history: &[ChatMessage],
    intent: Intent,
    question_embedding: Vec<f32>,
    deps: &OrchestratorDeps,
    telemetry: &mut Telemetry,
) -> anyhow::Result<OrchestratorResponse> {
    let spec_start = Instant::now();
    let intent_value = serde_json::to_value(&intent)?;

    let (cypher, semantic_hits) = if intent.intent_kind.is_topic_bearing() {
        let (cypher, topic_hits) = tokio::join!(
            generate_cypher(&intent, deps.prompts.as_ref(), deps.llm.as_ref()),
            async {
                match intent.topic.as_deref() {
                    Some(topic) => {
                        let embedding = embed(topic, deps.llm.as_ref()).await.unwrap_or_default();
                        search_topic(&embedding, deps.graph.as_ref(), &deps.vector_index_name).await
                    }
                    None => Ok(Vec::new()),
                }
            },
        );
        let hits: Vec<PublicationHit> = topic_hits?
            .into_iter()
            .filter(|h| h.score >= scholarqa_retriever::MIN_RELEVANCE_SCORE)
            .collect();
        (cypher?, hits)
    } else {
        (generate_cypher(&intent, deps.prompts.as_ref(), deps.llm.as_ref()).await?, Vec::new())
    };
    telemetry.record("speculative_generation", spec_start.elapsed());

    let db_start = Instant::now();
    let db_rows = deps.graph.execute(&cypher, Value::Null).await?;
    telemetry.record("db_query", db_start.elapsed());

    let mut semantic_hits = semantic_hits;
    if db_rows.is_empty() && semantic_hits.is_empty() {
        let fallback_start = Instant::now();
        semantic_hits = search_cohort(&question_embedding, deps.graph.as_ref(), &deps.vector_index_name).await?;
        telemetry.record("semantic_fallback", fallback_start.elapsed());
    }

    let db_rows_value = serde_json::to_value(&db_rows)?;
    let semantic_hits_value = serde_json::to_value(&semantic_hits)?;

    let synth_start = Instant::now();
    let mut answer = synthesize_template(
        question,
        &intent_value,
        &cypher,
        &db_rows_value,
        &semantic_hits_value,
        history,
        deps.prompts.as_ref(),
        deps.llm.as_ref(),
    )
    .await?;
    telemetry.record("synthesis", synth_start.elapsed());

    if db_rows.is_empty() && !semantic_hits.is_empty() {
        match reask_with_semantic_hits(question, &semantic_hits_value, &answer, deps.prompts.as_ref(), deps.llm.as_ref()).await {
            Ok(reasked) => answer = reasked,
            Err(e) => warn!(error = %e, "semantic re-ask failed, keeping first-pass answer"),
        }
    }

    Ok(OrchestratorResponse {
        answer,
        intent: intent_value,
        cypher,
        db_rows,
        semantic_hits,
        candidates: None,
        telemetry: telemetry.clone(),
        error: None,
    })
}

async fn run_semantic_fallback_path(
    question: &str,
    history: &[ChatMessage],
    intent: Intent,
    question_embedding: Vec<f32>,
    deps: &OrchestratorDeps,
    telemetry: &mut Telemetry,
) -> anyhow::Result<OrchestratorResponse> {
    let open_start = Instant::now();
    let intent_value = serde_json::to_value(&intent)?;
    let semantic_hits = search_cohort(&question_embedding, deps.graph.as_ref(), &deps.vector_index_name).await?;

    if semantic_hits.is_empty() {
        telemetry.record("open_question", open_start.elapsed());
        return Ok(OrchestratorResponse {
            answer: no_results_guidance(),
            intent: intent_value,
            cypher: String::new(),
            db_rows: Vec::new(),
            semantic_hits: Vec::new(),
            candidates: None,
            telemetry: telemetry.clone(),
            error: None,
        });
    }

    let disc_start = Instant::now();
    let titles: Vec<String> = semantic_hits.iter().filter_map(|h| h.title.clone()).collect();
    let author_cypher = generate_author_discovery_cypher(&titles, deps.prompts.as_ref(), deps.llm.as_ref()).await?;
    let author_rows = if author_cypher.is_empty() {
        Vec::new()
    } else {
        deps.graph
            .execute(&author_cypher, serde_json::json!({ "titles": titles }))
            .await?
    };
    telemetry.record("author_discovery", disc_start.elapsed());

    let semantic_hits_value = serde_json::to_value(&semantic_hits)?;
    let author_rows_value = serde_json::to_value(&author_rows)?;

    let synth_start = Instant::now();
    let answer = synthesize_fallback(
        question,
        &semantic_hits_value,
        &author_rows_value,
        history,
        deps.prompts.as_ref(),
        deps.llm.as_ref(),
    )
    .await?;
    telemetry.record("synthesis", synth_start.elapsed());
    telemetry.record("open_question_pipeline", open_start.elapsed());

    Ok(OrchestratorResponse {
        answer,
        intent: intent_value,
        cypher: author_cypher,
        db_rows: author_rows,
        semantic_hits,
        candidates: None,
        telemetry: telemetry.clone(),
        error: None,
    })
}

fn no_results_guidance() -> String {
    "I could not find any relevant publications or researchers matching your question with high confidence.\n\n\
     Suggestions:\n\
     - Try asking about a more specific topic.\n\
     - Ask about a specific researcher or department by name.\n\
     - Check the spelling of any names in your question."
        .to_string()
}
