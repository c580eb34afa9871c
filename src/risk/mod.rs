// Risk module
// Turns detector output and session history into a final risk level

mod aggregator;
mod types;

pub use aggregator::{
    instantaneous_score, AggregatorConfig, RiskAggregator, BREADTH_WEIGHT, HISTORY_WEIGHT,
    IMPROVING_RUN, SEVERITY_WEIGHT, UNCORROBORATED_CAP,
};
pub use types::{
    RiskAssessment, RiskLevel, Trend, CONCERN_THRESHOLD, DANGER_THRESHOLD, IMMINENT_THRESHOLD,
};
