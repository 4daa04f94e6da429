//! Prompt registry (C3).
//!
//! Loads a fixed set of named prompts at process initialization and holds
//! them immutably thereafter. A missing prompt file is a startup-fatal
//! error — unlike `scholarqa-config`, which tolerates a missing config
//! *file* and falls back to defaults, there is no sensible default for a
//! prompt the orchestrator is about to depend on.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;

/// Symbolic names the registry guarantees to hold after a successful load.
pub const PROMPT_NAMES: &[&str] = &[
    "intent_classification",
    "cypher_generation",
    "answer_synthesis",
    "author_discovery",
    "final_author_answer",
    "semantic_reask",
    "name_extraction",
];

fn file_for(name: &str) -> &'static str {
    match name {
        "intent_classification" => "intent_prompt.txt",
        "cypher_generation" => "cypher_prompt.txt",
        "answer_synthesis" => "answer_prompt.txt",
        "author_discovery" => "author_discovery_prompt.txt",
        "final_author_answer" => "final_author_answer_prompt.txt",
        "semantic_reask" => "semantic_reask_prompt.txt",
        "name_extraction" => "name_extraction_prompt.txt",
        other => unreachable!("unknown prompt name {other}"),
    }
}

#[derive(Debug, Clone)]
pub struct PromptRegistry {
    prompts: HashMap<&'static str, String>,
}

impl PromptRegistry {
    /// Loads all seven named prompts from `dir`. Fails loudly if any file
    /// is missing or unreadable — this runs once, at startup.
    pub fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        let mut prompts = HashMap::with_capacity(PROMPT_NAMES.len());
        for &name in PROMPT_NAMES {
            let path = dir.join(file_for(name));
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("failed to load prompt '{name}' from {}", path.display()))?;
            prompts.insert(name, contents);
        }
        info!(count = prompts.len(), dir = %dir.display(), "loaded prompt registry");
        Ok(Self { prompts })
    }

    /// Returns the prompt text for `name`. Panics on an unknown name — the
    /// set of valid names is closed and compiled-in (`PROMPT_NAMES`), so an
    /// unknown name here is a programming error, not a runtime condition.
    pub fn get(&self, name: &str) -> &str {
        self.prompts
            .get(name)
            .unwrap_or_else(|| panic!("prompt '{name}' was never loaded — not in PROMPT_NAMES?"))
    }
}
