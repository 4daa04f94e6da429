//! Per-request timing and resolution metadata (spec §4.11), assembled
//! stage-by-stage with `std::time::Instant` the way the teacher's runtime
//! loop times its own stages inside an instrumented span.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct ResolutionMetadata {
    pub path: String,
    pub fuzzy_scores: Vec<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Telemetry {
    /// Stage name to elapsed seconds, in insertion-independent sorted order
    /// so the same request always serializes its stages identically.
    pub timings: BTreeMap<String, f64>,
    pub resolution: ResolutionMetadata,
}

impl Telemetry {
    pub fn record(&mut self, stage: &str, elapsed: Duration) {
        self.timings.insert(stage.to_string(), elapsed.as_secs_f64());
    }
}
