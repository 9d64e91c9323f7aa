//! Reliability telemetry - error budget and quality scoring.

mod outcome;
mod quality;

pub use outcome::{BudgetSnapshot, OutcomeTracker};
pub use quality::{
    PRODUCTION_GATE, Pillar, QualityInputs, QualityScore, QualityScorer, SloAlert, SloThresholds,
};
