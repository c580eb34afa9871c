// Crisis module
// Rule-driven crisis pattern detection

mod detector;

pub use detector::{
    best_category, category_severities, CrisisDetector, MatchResult, CONTEXT_WINDOW,
    NEGATION_DAMPING,
};
