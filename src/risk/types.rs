// Risk levels, trends and assessments

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

use crate::catalog::CrisisCategory;

pub const CONCERN_THRESHOLD: f64 = 0.3;
pub const DANGER_THRESHOLD: f64 = 0.6;
pub const IMMINENT_THRESHOLD: f64 = 0.85;

/// Ordered risk level. Derived from a score, never the other way round.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Safe,
    Concern,
    Danger,
    Imminent,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score >= IMMINENT_THRESHOLD {
            RiskLevel::Imminent
        } else if score >= DANGER_THRESHOLD {
            RiskLevel::Danger
        } else if score >= CONCERN_THRESHOLD {
            RiskLevel::Concern
        } else {
            RiskLevel::Safe
        }
    }

    /// Smallest score that maps to this level
    pub fn lower_threshold(&self) -> f64 {
        match self {
            RiskLevel::Safe => 0.0,
            RiskLevel::Concern => CONCERN_THRESHOLD,
            RiskLevel::Danger => DANGER_THRESHOLD,
            RiskLevel::Imminent => IMMINENT_THRESHOLD,
        }
    }

    /// One level lower, saturating at `Safe`
    pub fn step_down(&self) -> Self {
        match self {
            RiskLevel::Imminent => RiskLevel::Danger,
            RiskLevel::Danger => RiskLevel::Concern,
            RiskLevel::Concern | RiskLevel::Safe => RiskLevel::Safe,
        }
    }

    pub fn is_crisis(&self) -> bool {
        *self >= RiskLevel::Danger
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Concern => "concern",
            RiskLevel::Danger => "danger",
            RiskLevel::Imminent => "imminent",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Improving,
    Stable,
    Declining,
    Escalating,
}

impl Trend {
    pub fn is_downward(&self) -> bool {
        matches!(self, Trend::Declining | Trend::Improving)
    }
}

/// Final per-turn risk decision.
///
/// Only the aggregator and the engine's fail-safe path construct these, so
/// `level` always agrees with `score` and `trend` is always derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    level: RiskLevel,
    score: f64,
    matched_categories: BTreeSet<CrisisCategory>,
    trend: Trend,
    timestamp: DateTime<Utc>,
}

impl RiskAssessment {
    pub(crate) fn new(
        score: f64,
        matched_categories: BTreeSet<CrisisCategory>,
        trend: Trend,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let score = score.clamp(0.0, 1.0);
        Self {
            level: RiskLevel::from_score(score),
            score,
            matched_categories,
            trend,
            timestamp,
        }
    }

    /// Assessment for a turn with nothing to score
    pub fn safe(timestamp: DateTime<Utc>) -> Self {
        Self::new(0.0, BTreeSet::new(), Trend::Stable, timestamp)
    }

    /// Assessment pinned to the floor of `level`, used when scoring failed
    pub fn at_level(level: RiskLevel, timestamp: DateTime<Utc>) -> Self {
        Self::new(level.lower_threshold(), BTreeSet::new(), Trend::Stable, timestamp)
    }

    pub fn level(&self) -> RiskLevel {
        self.level
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn matched_categories(&self) -> &BTreeSet<CrisisCategory> {
        &self.matched_categories
    }

    pub fn trend(&self) -> Trend {
        self.trend
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Same decision, ignoring when it was made
    pub fn same_decision(&self, other: &RiskAssessment) -> bool {
        self.level == other.level
            && (self.score - other.score).abs() < 1e-12
            && self.matched_categories == other.matched_categories
            && self.trend == other.trend
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_boundaries() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::Safe);
        assert_eq!(RiskLevel::from_score(0.299), RiskLevel::Safe);
        assert_eq!(RiskLevel::from_score(0.3), RiskLevel::Concern);
        assert_eq!(RiskLevel::from_score(0.6), RiskLevel::Danger);
        assert_eq!(RiskLevel::from_score(0.849), RiskLevel::Danger);
        assert_eq!(RiskLevel::from_score(0.85), RiskLevel::Imminent);
        assert_eq!(RiskLevel::from_score(1.0), RiskLevel::Imminent);
    }

    #[test]
    fn test_lower_threshold_round_trips() {
        for level in [
            RiskLevel::Safe,
            RiskLevel::Concern,
            RiskLevel::Danger,
            RiskLevel::Imminent,
        ] {
            assert_eq!(RiskLevel::from_score(level.lower_threshold()), level);
        }
    }

    #[test]
    fn test_step_down_saturates() {
        assert_eq!(RiskLevel::Imminent.step_down(), RiskLevel::Danger);
        assert_eq!(RiskLevel::Safe.step_down(), RiskLevel::Safe);
    }

    #[test]
    fn test_score_is_clamped() {
        let assessment = RiskAssessment::new(1.7, BTreeSet::new(), Trend::Stable, Utc::now());
        assert_eq!(assessment.score(), 1.0);
        assert_eq!(assessment.level(), RiskLevel::Imminent);
    }
}
