//! Query planner (C7): the state table from the spec, made literal as an
//! enum plus straight-line matches. The reference implementation drives
//! this procedurally inside one large orchestrator function; there are no
//! cycles in the table, so a handful of small pure functions is a closer
//! idiomatic fit than reproducing a looping state machine.

use scholarqa_intent::Intent;
use scholarqa_resolver::Resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    Classified,
    Resolve,
    Promoted,
    Route,
    Template,
    SemanticFallback,
    ReturnCandidates,
}

/// First transition: after classification, do we need to resolve an
/// author, or has the caller already supplied a `selected_user_id` that
/// short-circuits resolution entirely?
pub fn after_classification(intent: &Intent, selected_user_id_supplied: bool) -> PlannerState {
    let has_author = intent.author.as_deref().is_some_and(|a| !a.trim().is_empty());
    if has_author && !selected_user_id_supplied {
        PlannerState::Resolve
    } else {
        PlannerState::Promoted
    }
}

/// Second transition: once resolution has run, fuzzy candidates are
/// terminal (user must disambiguate); exact and "no match" both proceed
/// to promotion.
pub fn after_resolution(resolution: &Resolution) -> PlannerState {
    match resolution {
        Resolution::Fuzzy(_) => PlannerState::ReturnCandidates,
        Resolution::Exact(_) | Resolution::None => PlannerState::Promoted,
    }
}

/// Required-slot predicate (spec §4.7): `DEPARTMENT_TOPIC_TRENDS` needs a
/// department; `AUTHOR_PAIR_SHARED_PUBLICATIONS` needs both the resolved
/// author id and a (possibly unresolved) second-author name; every other
/// template intent needs the resolved author id.
pub fn has_required_slots(intent: &Intent) -> bool {
    use scholarqa_intent::IntentKind::*;
    match intent.intent_kind {
        DepartmentTopicTrends => intent.department.is_some(),
        AuthorPairSharedPublications => {
            intent.author_id.is_some() && intent.second_author.as_deref().is_some_and(|s| !s.trim().is_empty())
        }
        OpenQuestion => false,
        _ => intent.author_id.is_some(),
    }
}

/// ROUTE transition: template path if the intent is in the closed catalog
/// and its required slots are present, semantic fallback otherwise.
pub fn route(intent: &Intent) -> PlannerState {
    if intent.intent_kind.is_template_intent() && has_required_slots(intent) {
        PlannerState::Template
    } else {
        PlannerState::SemanticFallback
    }
}
