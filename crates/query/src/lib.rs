pub mod generator;
pub mod planner;

pub use generator::{broaden_department_clause, generate_author_discovery_cypher, generate_cypher, strip_code_fence};
pub use planner::{has_required_slots, PlannerState};
