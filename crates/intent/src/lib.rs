//! Intent classification and normalization (C4, C5).
//!
//! `Intent` is a single tagged record — one struct with an `intent_kind`
//! discriminant and optional slots — rather than one struct per intent
//! kind, per the design note in the spec this crate implements: the
//! classifier's output is a loose, partially-filled record, and modeling
//! twelve near-identical structs would just scatter the same optional
//! fields across twelve names.

use serde::{Deserialize, Serialize};
use tracing::{instrument, warn};

use scholarqa_llm::LlmProvider;
use scholarqa_prompt::PromptRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentKind {
    AuthorPublicationsRange,
    AuthorLatestPublication,
    AuthorTopVenue,
    AuthorPairSharedPublications,
    AuthorTopCoauthors,
    AuthorTopicPublicationCount,
    AuthorTopicExtent,
    AuthorMainResearchAreas,
    AuthorTopicSynergy,
    AuthorInstitutionCollabFrequency,
    AuthorTopicPeersAtUofa,
    DepartmentTopicTrends,
    OpenQuestion,
}

/// The five topic-bearing intents that trigger parallel topic semantic
/// search in the planner (C7).
pub const TOPIC_INTENTS: &[IntentKind] = &[
    IntentKind::AuthorTopicPublicationCount,
    IntentKind::AuthorTopicExtent,
    IntentKind::AuthorTopicSynergy,
    IntentKind::AuthorTopicPeersAtUofa,
    IntentKind::DepartmentTopicTrends,
];

impl IntentKind {
    pub fn is_topic_bearing(self) -> bool {
        TOPIC_INTENTS.contains(&self)
    }

    /// Every kind in the closed catalog except the `OpenQuestion` sentinel
    /// has a dedicated query shape (glossary: "template intent").
    pub fn is_template_intent(self) -> bool {
        self != IntentKind::OpenQuestion
    }
}

/// Either a single department name or an already-expanded list — the
/// normalizer (C5) produces the list form from the umbrella alias case;
/// an explicit list from the classifier passes through unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DepartmentSlot {
    Single(String),
    List(Vec<String>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Intent {
    pub intent_kind: IntentKind,
    pub author: Option<String>,
    pub second_author: Option<String>,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub second_author_id: Option<String>,
    pub topic: Option<String>,
    pub department: Option<DepartmentSlot>,
    pub start_year: Option<i32>,
    pub end_year: Option<i32>,
    pub scope: Option<String>,
}

impl Intent {
    pub fn open_question() -> Self {
        Self {
            intent_kind: IntentKind::OpenQuestion,
            author: None,
            second_author: None,
            author_id: None,
            second_author_id: None,
            topic: None,
            department: None,
            start_year: None,
            end_year: None,
            scope: None,
        }
    }
}

/// Raw classifier JSON shape. The LLM is prompted to return exactly this
/// shape, but it does not know about `author_id`/`second_author_id` — those
/// are populated later by the resolver (C6), never by the classifier.
#[derive(Debug, Deserialize)]
struct RawIntent {
    intent_kind: IntentKind,
    author: Option<String>,
    second_author: Option<String>,
    topic: Option<String>,
    department: Option<DepartmentSlot>,
    start_year: Option<i32>,
    end_year: Option<i32>,
    scope: Option<String>,
}

impl From<RawIntent> for Intent {
    fn from(raw: RawIntent) -> Self {
        Self {
            intent_kind: raw.intent_kind,
            author: raw.author,
            second_author: raw.second_author,
            author_id: None,
            second_author_id: None,
            topic: raw.topic,
            department: raw.department,
            start_year: raw.start_year,
            end_year: raw.end_year,
            scope: raw.scope,
        }
    }
}

/// Classifies `question` into an `Intent`. Never raises: malformed or
/// non-JSON model output falls back to `Intent::open_question()` with all
/// slots null, per spec §4.4.
#[instrument(skip(question, llm, prompts), fields(question_len = question.len()))]
pub async fn classify(question: &str, llm: &dyn LlmProvider, prompts: &PromptRegistry) -> Intent {
    let raw_text = match llm
        .chat(prompts.get("intent_classification"), question, &[], Some(0.0))
        .await
    {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "intent classification call failed, falling back to OPEN_QUESTION");
            return Intent::open_question();
        }
    };

    let cleaned = strip_code_fence(&raw_text);
    match serde_json::from_str::<RawIntent>(cleaned) {
        Ok(raw) => raw.into(),
        Err(e) => {
            warn!(error = %e, raw = %raw_text, "intent classifier returned unparseable JSON, falling back to OPEN_QUESTION");
            Intent::open_question()
        }
    }
}

fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|s| s.strip_suffix("```").unwrap_or(s))
        .unwrap_or(trimmed)
        .trim()
}

const ENGINEERING_ALIASES: &[&str] = &[
    "engineering",
    "uofa engineering",
    "ualberta engineering",
    "faculty of engineering",
    "faculty engineering",
    "engg",
];

const ENGINEERING_DEPARTMENTS: &[&str] = &[
    "Electrical and Computer Engineering",
    "Mechanical Engineering",
    "Civil and Environmental Engineering",
    "Chemical and Materials Engineering",
    "Biomedical Engineering",
];

/// Expands an engineering-umbrella department string into the concrete
/// department list; leaves every other shape unchanged. Pure and total, so
/// applying it twice is a no-op (spec §8's idempotence property) — once
/// `department` is a list, the match arm below that looks for a string
/// umbrella alias simply never fires again.
pub fn normalize(mut intent: Intent) -> Intent {
    intent.department = match intent.department {
        Some(DepartmentSlot::Single(s)) => {
            let norm = s.trim().to_lowercase();
            if ENGINEERING_ALIASES.contains(&norm.as_str()) {
                Some(DepartmentSlot::List(
                    ENGINEERING_DEPARTMENTS.iter().map(|d| d.to_string()).collect(),
                ))
            } else {
                Some(DepartmentSlot::Single(s))
            }
        }
        other => other,
    };
    intent
}
