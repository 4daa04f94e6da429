//! Answer synthesizer (C10): builds the sanitized payload for each
//! synthesis prompt and runs the optional second-pass re-ask.

use serde_json::{json, Value};
use tracing::instrument;

use scholarqa_llm::{ChatMessage, LlmProvider};
use scholarqa_prompt::PromptRegistry;

const MAX_ITEMS: usize = 15;
const MAX_TEXT_LEN: usize = 500;
const TRUNCATION_MARKER: &str = "...(truncated)";

/// Truncates `s` to its first `MAX_TEXT_LEN` *characters* (codepoints, not
/// bytes) plus a marker, matching the Python original's `v[:500]` slicing.
/// Slicing a `String` by raw byte index panics when the cut point falls
/// inside a multi-byte codepoint — routine in abstracts containing
/// accented characters, em-dashes, or non-Latin scripts — so this walks
/// `char_indices` to find a valid boundary instead.
fn truncate_text(s: &str) -> String {
    match s.char_indices().nth(MAX_TEXT_LEN) {
        Some((boundary, _)) => format!("{}{TRUNCATION_MARKER}", &s[..boundary]),
        None => s.to_string(),
    }
}

/// Recursively truncates `value` before it is sent to the LLM: lists are
/// capped at `MAX_ITEMS` entries, strings longer than `MAX_TEXT_LEN`
/// characters are cut with a marker. Abstracts and titles are the primary
/// bloat sources this guards against (spec §4.10).
pub fn sanitize_payload(value: &Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(items.iter().take(MAX_ITEMS).map(sanitize_payload).collect()),
        Value::Object(map) => {
            let sanitized = map
                .iter()
                .map(|(k, v)| {
                    let sanitized_value = match v {
                        Value::String(s) if s.len() > MAX_TEXT_LEN => Value::String(truncate_text(s)),
                        Value::Array(_) | Value::Object(_) => sanitize_payload(v),
                        other => other.clone(),
                    };
                    (k.clone(), sanitized_value)
                })
                .collect();
            Value::Object(sanitized)
        }
        other => other.clone(),
    }
}

/// Template-path synthesis: inputs are the question, intent, executed
/// query, rows, and semantic hits, plus recent conversation history.
#[instrument(skip(question, intent, cypher, db_rows, semantic_hits, history, prompts, llm))]
#[allow(clippy::too_many_arguments)]
pub async fn synthesize_template(
    question: &str,
    intent: &Value,
    cypher: &str,
    db_rows: &Value,
    semantic_hits: &Value,
    history: &[ChatMessage],
    prompts: &PromptRegistry,
    llm: &dyn LlmProvider,
) -> anyhow::Result<String> {
    let payload = json!({
        "question": question,
        "intent": intent,
        "cypher": cypher,
        "db_rows": sanitize_payload(db_rows),
        "semantic_hits": sanitize_payload(semantic_hits),
    });
    let user_content = serde_json::to_string(&payload)?;
    Ok(llm
        .chat(prompts.get("answer_synthesis"), &user_content, history, None)
        .await?
        .trim()
        .to_string())
}

/// Semantic-fallback synthesis: inputs are the question, semantic hits,
/// and in-house author data discovered for those hits, plus history.
#[instrument(skip(question, semantic_hits, author_data, history, prompts, llm))]
pub async fn synthesize_fallback(
    question: &str,
    semantic_hits: &Value,
    author_data: &Value,
    history: &[ChatMessage],
    prompts: &PromptRegistry,
    llm: &dyn LlmProvider,
) -> anyhow::Result<String> {
    let payload = json!({
        "question": question,
        "semantic_hits": sanitize_payload(semantic_hits),
        "author_data": sanitize_payload(author_data),
    });
    let user_content = serde_json::to_string(&payload)?;
    Ok(llm
        .chat(prompts.get("final_author_answer"), &user_content, history, None)
        .await?
        .trim()
        .to_string())
}

/// Second-pass re-ask (spec §4.10): run only when the template path
/// produced zero rows but semantic hits exist. Its output replaces the
/// first-pass answer. Best-effort: a failure here leaves the first-pass
/// answer standing rather than failing the whole request.
#[instrument(skip(question, semantic_hits, first_pass_answer, prompts, llm))]
pub async fn reask_with_semantic_hits(
    question: &str,
    semantic_hits: &Value,
    first_pass_answer: &str,
    prompts: &PromptRegistry,
    llm: &dyn LlmProvider,
) -> anyhow::Result<String> {
    let payload = json!({
        "question": question,
        "semantic_hits": sanitize_payload(semantic_hits),
        "first_pass_summary": first_pass_answer,
    });
    let user_content = serde_json::to_string(&payload)?;
    Ok(llm.chat(prompts.get("semantic_reask"), &user_content, &[], None).await?)
}
