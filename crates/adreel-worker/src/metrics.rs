//! Metrics recorded by the composition pipeline and the generation engine.
//!
//! The recorder itself is installed by the binary that exposes it.

use adreel_models::{CompositionMode, Stage};
use metrics::{counter, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const COMPOSITION_RUNS_TOTAL: &str = "adreel_composition_runs_total";
    pub const COMPOSITION_STAGE_DURATION_SECONDS: &str =
        "adreel_composition_stage_duration_seconds";

    pub const GENERATION_SUBMITTED_TOTAL: &str = "adreel_generation_submitted_total";
    pub const GENERATION_POLLS_TOTAL: &str = "adreel_generation_polls_total";
    pub const GENERATION_JOBS_TOTAL: &str = "adreel_generation_jobs_total";
}

pub fn record_composition_run(mode: CompositionMode, outcome: &str) {
    let labels = [
        ("mode", mode.as_str().to_string()),
        ("outcome", outcome.to_string()),
    ];
    counter!(names::COMPOSITION_RUNS_TOTAL, &labels).increment(1);
}

pub fn record_stage_duration(stage: Stage, duration_secs: f64) {
    let labels = [("stage", stage.as_str().to_string())];
    histogram!(names::COMPOSITION_STAGE_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_generation_submitted() {
    counter!(names::GENERATION_SUBMITTED_TOTAL).increment(1);
}

/// Record one poll, labelled with the remote status it observed.
pub fn record_generation_poll(status: &str) {
    let labels = [("status", status.to_string())];
    counter!(names::GENERATION_POLLS_TOTAL, &labels).increment(1);
}

/// Record a job reaching a terminal state.
pub fn record_generation_outcome(outcome: &str) {
    let labels = [("outcome", outcome.to_string())];
    counter!(names::GENERATION_JOBS_TOTAL, &labels).increment(1);
}
