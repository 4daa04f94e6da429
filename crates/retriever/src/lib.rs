//! Semantic retriever (C9): embeds text once per request and runs two
//! distinct vector-search modes over it — an unrestricted topic sweep and a
//! cohort-restricted fallback sweep.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use scholarqa_graph::GraphClient;
use scholarqa_llm::LlmProvider;

/// Minimum similarity score a cohort-fallback hit must clear to be
/// returned (spec §4.9).
pub const MIN_RELEVANCE_SCORE: f64 = 0.7;

const TOPIC_SEARCH_K: usize = 200;
const COHORT_SEARCH_K: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicationHit {
    pub work_url: Option<String>,
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub abstract_text: Option<String>,
    pub year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cited_by_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    pub score: f64,
}

fn hit_from_row(row: scholarqa_graph::QueryRow, score: f64) -> PublicationHit {
    PublicationHit {
        work_url: row.get("openalex_url").or_else(|| row.get("work_url")).and_then(|v| v.as_str()).map(str::to_string),
        title: row.get("title").and_then(|v| v.as_str()).map(str::to_string),
        abstract_text: row.get("abstract").and_then(|v| v.as_str()).map(str::to_string),
        year: row
            .get("publication_year")
            .or_else(|| row.get("year"))
            .and_then(|v| v.as_i64())
            .map(|v| v as i32),
        cited_by_count: row.get("cited_by_count").and_then(|v| v.as_i64()),
        doi: row.get("doi").and_then(|v| v.as_str()).map(str::to_string),
        score,
    }
}

/// Embeds `text`, shared between both search modes so it is computed once
/// per request (spec §4.9, §5's speculative-embedding note).
#[instrument(skip(text, llm), fields(text_len = text.len()))]
pub async fn embed(text: &str, llm: &dyn LlmProvider) -> anyhow::Result<Vec<f32>> {
    Ok(llm.embed(text).await?)
}

/// Topic mode: unrestricted nearest-neighbor search over the publication
/// index, up to 200 hits, no cohort filter and no relevance threshold —
/// callers apply their own threshold if they want one (the template path
/// filters by `MIN_RELEVANCE_SCORE` itself before treating hits as
/// "present" for the purposes of skipping the semantic-fallback branch).
#[instrument(skip(embedding, graph, index_name))]
pub async fn search_topic(
    embedding: &[f32],
    graph: &dyn GraphClient,
    index_name: &str,
) -> anyhow::Result<Vec<PublicationHit>> {
    if embedding.is_empty() {
        return Ok(Vec::new());
    }
    let scored = graph.vector_search(index_name, TOPIC_SEARCH_K, embedding, false).await?;
    Ok(scored.into_iter().map(|s| hit_from_row(s.row, s.score)).collect())
}

/// Cohort fallback mode: nearest-neighbor search restricted to
/// publications with at least one in-house author (joined via
/// author-profile nodes carrying `user_id`/`ccid`), up to 20 hits, with the
/// minimum-relevance threshold applied before returning.
#[instrument(skip(embedding, graph, index_name))]
pub async fn search_cohort(
    embedding: &[f32],
    graph: &dyn GraphClient,
    index_name: &str,
) -> anyhow::Result<Vec<PublicationHit>> {
    if embedding.is_empty() {
        return Ok(Vec::new());
    }
    let scored = graph.vector_search(index_name, COHORT_SEARCH_K, embedding, true).await?;
    Ok(scored
        .into_iter()
        .filter(|s| s.score >= MIN_RELEVANCE_SCORE)
        .map(|s| hit_from_row(s.row, s.score))
        .collect())
}
