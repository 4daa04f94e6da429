//! Graph database access (C1).
//!
//! `GraphClient` is the trait boundary every other component talks to —
//! never `neo4rs` directly — so `scholarqa-orchestrator`'s tests can swap in
//! a fake. `execute` is a thin pass-through; `vector_search` is the one
//! operation that never propagates a hard failure: the vector index can be
//! offline or still warming, and the spec treats that as routine, not
//! exceptional.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use neo4rs::{BoltType, Graph, Query};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{instrument, warn};

/// A single result row, column name to scalar/list/property-bag value.
pub type QueryRow = Map<String, Value>;

/// A row plus the similarity/fulltext score the index assigned it.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ScoredRow {
    pub row: QueryRow,
    pub score: f64,
}

#[derive(Debug, Error)]
pub enum GraphError {
    #[error("failed to connect to graph database: {0}")]
    ConnectionFailed(String),
    #[error("query execution failed: {0}")]
    QueryFailed(String),
    /// Caught internally by `vector_search`/`fulltext_search` and converted
    /// to an empty result; never observed outside this crate.
    #[error("index unavailable: {0}")]
    IndexUnavailable(String),
    /// The query did not complete within the configured per-call timeout
    /// (spec §5). Caught internally by `vector_search`/`fulltext_search`
    /// the same as any other query failure; propagated as `Err` by `execute`.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

#[async_trait]
pub trait GraphClient: Send + Sync {
    /// Runs a parameterized query and returns its rows.
    async fn execute(&self, query: &str, params: Value) -> anyhow::Result<Vec<QueryRow>>;

    /// Vector-index nearest-neighbor search. Never returns `Err` for an
    /// index that is offline or warming — callers see an empty vector and a
    /// logged warning instead.
    ///
    /// `restrict_to_cohort` selects between the two projections the spec's
    /// two retrieval modes need (§4.9): topic mode (`false`) returns every
    /// nearest node unrestricted; cohort-fallback mode (`true`) joins through
    /// the publication's author-profile nodes and keeps only hits with at
    /// least one in-house author (`userId` or `ccid` present).
    async fn vector_search(
        &self,
        index_name: &str,
        k: usize,
        embedding: &[f32],
        restrict_to_cohort: bool,
    ) -> anyhow::Result<Vec<ScoredRow>>;

    /// Fulltext-index search with a pre-built term expression (e.g. a
    /// per-token fuzzy-suffixed name query).
    async fn fulltext_search(
        &self,
        index_name: &str,
        term_expression: &str,
    ) -> anyhow::Result<Vec<ScoredRow>>;
}

pub struct Neo4jGraphClient {
    graph: Graph,
    per_call_timeout: Duration,
}

impl Neo4jGraphClient {
    pub async fn connect(
        uri: &str,
        user: &str,
        password: &str,
        per_call_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let graph = Graph::new(uri, user, password)
            .await
            .map_err(|e| GraphError::ConnectionFailed(e.to_string()))?;
        Ok(Self { graph, per_call_timeout })
    }

    /// Runs one query and collects its rows, bounded by `per_call_timeout`
    /// (spec §5: every external call carries an individual deadline). This
    /// is the single chokepoint `execute`/`vector_search`/`fulltext_search`
    /// all funnel through, so wrapping it here covers every `GraphClient`
    /// call without each caller needing to know about timeouts.
    async fn run(&self, cypher: &str, params: &[(&str, BoltType)]) -> anyhow::Result<Vec<QueryRow>> {
        match tokio::time::timeout(self.per_call_timeout, self.run_uncapped(cypher, params)).await {
            Ok(result) => result,
            Err(_) => Err(GraphError::Timeout(self.per_call_timeout).into()),
        }
    }

    async fn run_uncapped(&self, cypher: &str, params: &[(&str, BoltType)]) -> anyhow::Result<Vec<QueryRow>> {
        let mut query = Query::new(cypher.to_string());
        for (key, value) in params {
            query = query.param(key, value.clone());
        }

        let mut stream = self
            .graph
            .execute(query)
            .await
            .map_err(|e| GraphError::QueryFailed(e.to_string()))?;

        let mut rows = Vec::new();
        while let Some(row) = stream
            .next()
            .await
            .map_err(|e| GraphError::QueryFailed(e.to_string()))?
        {
            rows.push(row_to_map(&row));
        }
        Ok(rows)
    }
}

#[async_trait]
impl GraphClient for Neo4jGraphClient {
    #[instrument(skip(self, params), fields(query_len = query.len()))]
    async fn execute(&self, query: &str, params: Value) -> anyhow::Result<Vec<QueryRow>> {
        let bolt_params = json_object_to_bolt_params(&params);
        self.run(query, &bolt_params).await
    }

    #[instrument(skip(self, embedding), fields(index = %index_name, k, restrict_to_cohort))]
    async fn vector_search(
        &self,
        index_name: &str,
        k: usize,
        embedding: &[f32],
        restrict_to_cohort: bool,
    ) -> anyhow::Result<Vec<ScoredRow>> {
        let cypher = if restrict_to_cohort {
            "CALL db.index.vector.queryNodes($index_name, $k, $embedding) \
             YIELD node, score \
             MATCH (node)<-[:PUBLISHED]-(ap:AuthorProfile) \
             OPTIONAL MATCH (person:Person)-[:HAS_PROFILE {source: 'openalex'}]->(ap) \
             WITH node, score, person \
             WHERE person IS NOT NULL AND (person.userId IS NOT NULL OR person.ccid IS NOT NULL) \
             RETURN node, score \
             ORDER BY score DESC"
        } else {
            "CALL db.index.vector.queryNodes($index_name, $k, $embedding) \
             YIELD node, score RETURN node, score"
        };
        let params = [
            ("index_name", BoltType::from(index_name)),
            ("k", BoltType::from(k as i64)),
            (
                "embedding",
                BoltType::from(embedding.iter().map(|v| *v as f64).collect::<Vec<_>>()),
            ),
        ];
        match self.run(cypher, &params).await {
            Ok(rows) => Ok(rows_to_scored(rows)),
            Err(e) => {
                warn!(error = %e, index = index_name, "vector index unavailable, returning empty hits");
                Ok(Vec::new())
            }
        }
    }

    #[instrument(skip(self), fields(index = %index_name))]
    async fn fulltext_search(
        &self,
        index_name: &str,
        term_expression: &str,
    ) -> anyhow::Result<Vec<ScoredRow>> {
        // The only fulltext index in this system is the researcher name
        // index (C6); its candidates must come back enriched with
        // departments (spec §4.6 step 2), so the join lives directly in
        // this fixed query rather than behind a caller-supplied template.
        let cypher = "CALL db.index.fulltext.queryNodes($index_name, $term) \
                      YIELD node, score \
                      OPTIONAL MATCH (node)-[:BELONGS_TO]->(d:Department) \
                      WITH node, score, collect(DISTINCT d.department) AS departments \
                      RETURN node, score, departments \
                      ORDER BY score DESC";
        let params = [
            ("index_name", BoltType::from(index_name)),
            ("term", BoltType::from(term_expression)),
        ];
        match self.run(cypher, &params).await {
            Ok(rows) => Ok(rows_to_scored(rows)),
            Err(e) => {
                warn!(error = %e, index = index_name, "fulltext index unavailable, returning empty hits");
                Ok(Vec::new())
            }
        }
    }
}

fn rows_to_scored(rows: Vec<QueryRow>) -> Vec<ScoredRow> {
    rows.into_iter()
        .map(|mut row| {
            let score = row
                .remove("score")
                .and_then(|v| v.as_f64())
                .unwrap_or(0.0);
            let mut node = row
                .remove("node")
                .and_then(|v| v.as_object().cloned())
                .unwrap_or_default();
            // Any columns projected alongside `node`/`score` (e.g.
            // `fulltext_search`'s `departments`) layer onto the node's own
            // properties rather than being dropped on the floor.
            node.extend(row);
            ScoredRow { row: node, score }
        })
        .collect()
}

fn row_to_map(row: &neo4rs::Row) -> QueryRow {
    let mut map = Map::new();
    for key in row.keys() {
        if let Ok(value) = row.get::<Value>(key) {
            map.insert(key.to_string(), value);
        }
    }
    map
}

fn json_object_to_bolt_params(value: &Value) -> Vec<(&'static str, BoltType)> {
    // Leaked keys are bounded (one per query parameter, never per-row), and
    // neo4rs's `Query::param` takes a `&str` key for the lifetime of the
    // call — a small owned-string arena would add ceremony for no benefit
    // at this call volume.
    let object = match value.as_object() {
        Some(o) => o,
        None => return Vec::new(),
    };
    object
        .iter()
        .map(|(k, v)| (Box::leak(k.clone().into_boxed_str()) as &'static str, json_to_bolt(v)))
        .collect()
}

fn json_to_bolt(value: &Value) -> BoltType {
    match value {
        Value::Null => BoltType::Null(neo4rs::BoltNull),
        Value::Bool(b) => BoltType::from(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                BoltType::from(i)
            } else {
                BoltType::from(n.as_f64().unwrap_or(0.0))
            }
        }
        Value::String(s) => BoltType::from(s.as_str()),
        Value::Array(items) => BoltType::from(items.iter().map(json_to_bolt).collect::<Vec<_>>()),
        Value::Object(map) => {
            let converted: BTreeMap<String, BoltType> =
                map.iter().map(|(k, v)| (k.clone(), json_to_bolt(v))).collect();
            BoltType::from(converted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn rows_to_scored_merges_node_and_score() {
        let row = json!({ "node": { "userId": "u1", "name": "Marek Reformat" }, "score": 0.75 })
            .as_object()
            .unwrap()
            .clone();
        let scored = rows_to_scored(vec![row]);
        assert_eq!(scored.len(), 1);
        assert_eq!(scored[0].score, 0.75);
        assert_eq!(scored[0].row.get("userId").and_then(|v| v.as_str()), Some("u1"));
    }

    #[test]
    fn rows_to_scored_layers_extra_projected_columns_onto_the_node() {
        // Mirrors `fulltext_search`'s `RETURN node, score, departments` shape:
        // a column projected alongside `node`/`score` must survive onto the
        // returned row rather than being dropped.
        let row = json!({
            "node": { "userId": "u1", "name": "Marek Reformat" },
            "score": 0.9,
            "departments": ["Electrical and Computer Engineering"],
        })
        .as_object()
        .unwrap()
        .clone();

        let scored = rows_to_scored(vec![row]);
        assert_eq!(scored.len(), 1);
        let departments = scored[0].row.get("departments").and_then(|v| v.as_array()).unwrap();
        assert_eq!(departments.len(), 1);
        assert_eq!(departments[0].as_str(), Some("Electrical and Computer Engineering"));
    }

    #[test]
    fn rows_to_scored_falls_back_to_whole_row_without_a_node_column() {
        let row = json!({ "title": "Grid Resilience", "score": 0.5 }).as_object().unwrap().clone();
        let scored = rows_to_scored(vec![row]);
        assert_eq!(scored[0].row.get("title").and_then(|v| v.as_str()), Some("Grid Resilience"));
        assert_eq!(scored[0].score, 0.5);
    }

    #[test]
    fn timeout_error_message_names_the_configured_duration() {
        let err = GraphError::Timeout(Duration::from_secs(10));
        assert!(err.to_string().contains("10s"));
    }
}
