// Mood module
// Dominant emotional-state classification per message

mod classifier;
mod trend;

pub use classifier::{
    MoodClassifier, MoodReading, CONFIDENCE_FLOOR, MIXED_EPSILON, NEGATION_TRANSFER,
};
pub use trend::{MoodAnalytics, MoodTrend, MOOD_TREND_DELTA, MOOD_TREND_WINDOW};
