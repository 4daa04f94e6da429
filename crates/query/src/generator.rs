//! Structured query generator (C8): turns a fully-slotted `Intent` into a
//! graph query via the LLM, then applies the post-generation patches the
//! spec calls for (department abbreviation broadening) before the
//! orchestrator executes it.

use regex::Regex;
use scholarqa_intent::Intent;
use scholarqa_llm::LlmProvider;
use scholarqa_prompt::PromptRegistry;
use tracing::instrument;

#[instrument(skip(intent, prompts, llm))]
pub async fn generate_cypher(
    intent: &Intent,
    prompts: &PromptRegistry,
    llm: &dyn LlmProvider,
) -> anyhow::Result<String> {
    let user_content = serde_json::to_string(intent)?;
    let raw = llm
        .chat(prompts.get("cypher_generation"), &user_content, &[], Some(0.0))
        .await?;
    Ok(broaden_department_clause(strip_code_fence(&raw)))
}

/// Generates the author-discovery query used on the semantic-fallback path
/// once topic hits exist: finds the in-house authors of the given
/// publication titles. Returns an empty string when `titles` is empty,
/// matching the reference behavior of skipping the LLM call entirely.
#[instrument(skip(titles, prompts, llm))]
pub async fn generate_author_discovery_cypher(
    titles: &[String],
    prompts: &PromptRegistry,
    llm: &dyn LlmProvider,
) -> anyhow::Result<String> {
    if titles.is_empty() {
        return Ok(String::new());
    }
    let user_content = format!(
        "Here is the list of titles to find authors for: {}",
        serde_json::to_string(titles)?
    );
    let raw = llm
        .chat(prompts.get("author_discovery"), &user_content, &[], Some(0.0))
        .await?;
    Ok(strip_code_fence(&raw).to_string())
}

pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```cypher")
        .or_else(|| trimmed.strip_prefix("```json"))
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed)
        .trim()
}

/// Broadens `WHERE ... department = $value` style clauses to also match
/// the `abbr` property via an `OR` coalesce, so an abbreviation like "ECE"
/// resolves correctly even though the LLM only wrote a name comparison.
/// Pattern-based post-fix, not a re-prompt — the spec's explicit preference
/// (§9) because free LLM output drifts off-spec in predictable, narrow
/// ways that are cheaper to patch than to argue the model out of.
pub fn broaden_department_clause(cypher: &str) -> String {
    let pattern = Regex::new(
        r"(?i)(\w+)\.department\s*=\s*(\$\w+|'[^']*'|\"[^\"]*\")",
    )
    .expect("department-broadening regex is a compile-time constant");

    pattern
        .replace_all(cypher, |caps: &regex::Captures| {
            let node = &caps[1];
            let value = &caps[2];
            format!(
                "coalesce({node}.department, {node}.abbr) = {value} OR {node}.abbr = {value}"
            )
        })
        .into_owned()
}
