//! Author-name resolution (C6): exact match with fuzzy fallback, restricted
//! to the in-house cohort (a researcher with a `user_id` or `ccid`).

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use scholarqa_graph::GraphClient;

/// A fuzzy-match researcher row returned to the user for disambiguation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub user_id: Option<String>,
    pub name: String,
    pub normalized_name: Option<String>,
    pub departments: Vec<String>,
    pub score: f64,
}

#[derive(Debug, Clone)]
pub enum Resolution {
    /// Single unambiguous match; carries the resolved stable id.
    Exact(String),
    /// Ambiguous; caller must present these to the user for selection.
    Fuzzy(Vec<Candidate>),
    /// No author slot to resolve, or nothing matched at all.
    None,
}

impl Resolution {
    pub fn path_label(&self) -> &'static str {
        match self {
            Resolution::Exact(_) => "EXACT",
            Resolution::Fuzzy(_) => "FUZZY",
            Resolution::None => "NONE",
        }
    }

    pub fn fuzzy_scores(&self) -> Vec<f64> {
        match self {
            Resolution::Fuzzy(candidates) => candidates.iter().map(|c| c.score).collect(),
            _ => Vec::new(),
        }
    }
}

const EXACT_MATCH_CYPHER: &str = "
MATCH (r:Researcher)
WHERE (toLower(r.name) = toLower($name) OR toLower(r.normalized_name) = toLower($name))
  AND (r.userId IS NOT NULL OR r.ccid IS NOT NULL)
RETURN r.userId AS userId, coalesce(r.name, r.normalized_name) AS name, r.normalized_name AS normalized_name
ORDER BY r.name DESC
LIMIT 1
";

/// Turns a raw name into a fulltext fuzzy expression by suffixing each
/// whitespace-separated token with `~`.
pub fn to_fuzzy_expression(name: &str) -> String {
    name.split_whitespace()
        .map(|part| format!("{part}~"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Resolves `author_name` against the in-house cohort: exact lookup first,
/// then fuzzy fulltext fallback capped at five candidates. Never called
/// when the HTTP layer already supplied `selected_user_id` (spec §4.6:
/// that short-circuits resolution entirely — callers just skip this
/// function).
#[instrument(skip(graph, fulltext_index_name), fields(author_name))]
pub async fn resolve(
    author_name: &str,
    graph: &dyn GraphClient,
    fulltext_index_name: &str,
) -> anyhow::Result<Resolution> {
    let author_name = author_name.trim();
    if author_name.is_empty() {
        return Ok(Resolution::None);
    }

    let exact_rows = graph
        .execute(EXACT_MATCH_CYPHER, json!({ "name": author_name }))
        .await?;
    if let Some(row) = exact_rows.into_iter().next() {
        if let Some(user_id) = row.get("userId").and_then(|v| v.as_str()) {
            return Ok(Resolution::Exact(user_id.to_string()));
        }
    }

    let fuzzy_term = to_fuzzy_expression(author_name);
    let hits = graph.fulltext_search(fulltext_index_name, &fuzzy_term).await?;

    let candidates: Vec<Candidate> = hits
        .into_iter()
        .filter(|hit| {
            hit.row.get("userId").and_then(|v| v.as_str()).is_some()
                || hit.row.get("ccid").and_then(|v| v.as_str()).is_some()
        })
        .take(5)
        .map(|hit| Candidate {
            user_id: hit.row.get("userId").and_then(|v| v.as_str()).map(str::to_string),
            name: hit
                .row
                .get("name")
                .and_then(|v| v.as_str())
                .unwrap_or(author_name)
                .to_string(),
            normalized_name: hit.row.get("normalized_name").and_then(|v| v.as_str()).map(str::to_string),
            departments: hit
                .row
                .get("departments")
                .and_then(|v| v.as_array())
                .map(|arr| arr.iter().filter_map(|d| d.as_str().map(str::to_string)).collect())
                .unwrap_or_default(),
            score: hit.score,
        })
        .collect();

    if candidates.is_empty() {
        Ok(Resolution::None)
    } else {
        Ok(Resolution::Fuzzy(candidates))
    }
}
