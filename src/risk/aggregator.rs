// Risk aggregator
// Folds the current message's matches together with session history into one
// assessment, then applies corroboration and the escalation ratchet.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::types::{RiskAssessment, RiskLevel, Trend, DANGER_THRESHOLD, IMMINENT_THRESHOLD};
use crate::catalog::CrisisCategory;
use crate::crisis::{category_severities, MatchResult};

pub const SEVERITY_WEIGHT: f64 = 0.6;
pub const BREADTH_WEIGHT: f64 = 0.15;
pub const HISTORY_WEIGHT: f64 = 0.25;

/// Highest score an uncorroborated assessment may keep
pub const UNCORROBORATED_CAP: f64 = 0.849;

/// Consecutive downward turns, including the current one, before a
/// declining trend counts as improving
pub const IMPROVING_RUN: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    /// Prior turns considered by the history factor
    pub history_window: usize,
    /// Weight multiplier per step back in history
    pub history_decay: f64,
    /// Gap between instantaneous and history scores that counts as movement
    pub trend_delta: f64,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            history_window: 5,
            history_decay: 0.5,
            trend_delta: 0.1,
        }
    }
}

/// Intermediate values of one evaluation, logged at debug level
#[derive(Debug, Clone, Copy)]
struct Factors {
    instantaneous: f64,
    history: f64,
    combined: f64,
}

#[derive(Debug, Clone, Default)]
pub struct RiskAggregator {
    config: AggregatorConfig,
}

impl RiskAggregator {
    pub fn new(config: AggregatorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    /// Evaluate one turn.
    ///
    /// `prior` holds the session's earlier assessments, oldest first. Only the
    /// trailing `history_window` entries are read.
    pub fn evaluate(
        &self,
        matches: &[MatchResult],
        prior: &[RiskAssessment],
        now: DateTime<Utc>,
    ) -> RiskAssessment {
        let window_start = prior.len().saturating_sub(self.config.history_window);
        let recent = &prior[window_start..];

        let instantaneous = instantaneous_score(matches);
        let history = self.history_factor(recent);
        let blended = (1.0 - HISTORY_WEIGHT) * instantaneous + HISTORY_WEIGHT * history;
        let mut score = instantaneous.max(blended).clamp(0.0, 1.0);

        if score >= IMMINENT_THRESHOLD && !corroborated(matches, history) {
            tracing::debug!(score, "Imminent score not corroborated, capping at danger");
            score = UNCORROBORATED_CAP;
        }

        let trend = self.trend(instantaneous, history, recent);

        if let Some(previous) = recent.last() {
            let floor = previous.level().step_down();
            if RiskLevel::from_score(score) < floor {
                score = floor.lower_threshold();
            }
        }

        let factors = Factors {
            instantaneous,
            history,
            combined: score,
        };
        tracing::debug!(?factors, ?trend, "Risk evaluated");

        let categories: BTreeSet<CrisisCategory> = matches.iter().map(|m| m.category).collect();
        RiskAssessment::new(score, categories, trend, now)
    }

    /// Exponentially weighted average of prior scores, newest weighted 1
    fn history_factor(&self, recent: &[RiskAssessment]) -> f64 {
        let mut weight = 1.0;
        let mut weighted = 0.0;
        let mut total = 0.0;

        for assessment in recent.iter().rev() {
            weighted += weight * assessment.score();
            total += weight;
            weight *= self.config.history_decay;
        }

        if total > 0.0 {
            weighted / total
        } else {
            0.0
        }
    }

    fn trend(&self, instantaneous: f64, history: f64, recent: &[RiskAssessment]) -> Trend {
        let delta = self.config.trend_delta;
        if recent.is_empty() {
            return if instantaneous > delta {
                Trend::Escalating
            } else {
                Trend::Stable
            };
        }

        if instantaneous > history + delta {
            return Trend::Escalating;
        }
        if instantaneous >= history - delta {
            return Trend::Stable;
        }

        let previous_run = recent
            .iter()
            .rev()
            .take_while(|a| a.trend().is_downward())
            .count();
        if previous_run + 1 >= IMPROVING_RUN {
            Trend::Improving
        } else {
            Trend::Declining
        }
    }
}

/// Score from the current message alone: max severity plus breadth, scaled
/// so that both components together span [0, 1].
pub fn instantaneous_score(matches: &[MatchResult]) -> f64 {
    let severities = category_severities(matches);
    if severities.is_empty() {
        return 0.0;
    }

    let max_severity = severities.values().copied().fold(0.0_f64, f64::max);
    let breadth = 1.0 - 0.5_f64.powi(severities.len() as i32);

    ((SEVERITY_WEIGHT * max_severity + BREADTH_WEIGHT * breadth)
        / (SEVERITY_WEIGHT + BREADTH_WEIGHT))
        .clamp(0.0, 1.0)
}

/// An Imminent score needs independent support
fn corroborated(matches: &[MatchResult], history: f64) -> bool {
    let strong_match = matches
        .iter()
        .any(|m| !m.negated && m.adjusted_severity >= IMMINENT_THRESHOLD);
    let broad = category_severities(matches)
        .values()
        .filter(|severity| **severity >= DANGER_THRESHOLD)
        .count()
        >= 2;

    strong_match || broad || history >= DANGER_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hit(category: CrisisCategory, severity: f64, negated: bool) -> MatchResult {
        MatchResult {
            category,
            matched_text: "x".to_string(),
            token_index: 0,
            raw_severity: severity,
            negated,
            context_factor: 1.0,
            adjusted_severity: severity,
        }
    }

    fn run(aggregator: &RiskAggregator, turns: &[Vec<MatchResult>]) -> Vec<RiskAssessment> {
        let mut history = Vec::new();
        for matches in turns {
            let assessment = aggregator.evaluate(matches, &history, Utc::now());
            history.push(assessment);
        }
        history
    }

    #[test]
    fn test_no_matches_cold_start_is_safe() {
        let aggregator = RiskAggregator::default();
        let assessment = aggregator.evaluate(&[], &[], Utc::now());

        assert_eq!(assessment.level(), RiskLevel::Safe);
        assert_eq!(assessment.score(), 0.0);
        assert_eq!(assessment.trend(), Trend::Stable);
    }

    #[test]
    fn test_instantaneous_score() {
        let single = instantaneous_score(&[hit(CrisisCategory::SuicideRisk, 0.97, false)]);
        assert!((single - (0.6 * 0.97 + 0.15 * 0.5) / 0.75).abs() < 1e-9);

        // Repeats of one category do not add breadth
        let repeated = instantaneous_score(&[
            hit(CrisisCategory::GeneralDistress, 0.5, false),
            hit(CrisisCategory::GeneralDistress, 0.5, false),
        ]);
        let once = instantaneous_score(&[hit(CrisisCategory::GeneralDistress, 0.5, false)]);
        assert_eq!(repeated, once);
    }

    #[test]
    fn test_strong_suicide_match_is_imminent_on_cold_start() {
        let aggregator = RiskAggregator::default();
        let assessment =
            aggregator.evaluate(&[hit(CrisisCategory::SuicideRisk, 0.97, false)], &[], Utc::now());

        assert_eq!(assessment.level(), RiskLevel::Imminent);
        assert!(assessment
            .matched_categories()
            .contains(&CrisisCategory::SuicideRisk));
        assert_eq!(assessment.trend(), Trend::Escalating);
    }

    #[test]
    fn test_uncorroborated_imminent_is_capped() {
        let aggregator = RiskAggregator::default();
        // Severity 1.0 but negated and non-negatable: high score, no corroboration
        let assessment =
            aggregator.evaluate(&[hit(CrisisCategory::SubstanceCrisis, 1.0, true)], &[], Utc::now());

        assert_eq!(assessment.level(), RiskLevel::Danger);
        assert!((assessment.score() - UNCORROBORATED_CAP).abs() < 1e-9);
    }

    #[test]
    fn test_two_strong_categories_corroborate() {
        let aggregator = RiskAggregator::default();
        let assessment = aggregator.evaluate(
            &[
                hit(CrisisCategory::SelfHarm, 0.9, true),
                hit(CrisisCategory::Violence, 0.9, true),
                hit(CrisisCategory::GeneralDistress, 0.6, true),
            ],
            &[],
            Utc::now(),
        );
        assert_eq!(assessment.level(), RiskLevel::Imminent);
    }

    #[test]
    fn test_ratchet_limits_drop_to_one_step() {
        let aggregator = RiskAggregator::default();
        let history = run(
            &aggregator,
            &[
                vec![],
                vec![hit(CrisisCategory::SuicideRisk, 0.97, false)],
                vec![],
                vec![],
                vec![],
            ],
        );

        let levels: Vec<RiskLevel> = history.iter().map(|a| a.level()).collect();
        assert_eq!(
            levels,
            vec![
                RiskLevel::Safe,
                RiskLevel::Imminent,
                RiskLevel::Danger,
                RiskLevel::Concern,
                RiskLevel::Safe
            ]
        );
        // Held-up level keeps the score consistent with it
        assert!((history[2].score() - DANGER_THRESHOLD).abs() < 1e-9);
    }

    #[test]
    fn test_history_holds_score_up_but_never_down() {
        let aggregator = RiskAggregator::default();
        let history = run(
            &aggregator,
            &[
                vec![hit(CrisisCategory::GeneralDistress, 0.6, false)],
                vec![hit(CrisisCategory::GeneralDistress, 0.6, false)],
            ],
        );
        let fresh = instantaneous_score(&[hit(CrisisCategory::SuicideRisk, 0.97, false)]);
        let next = aggregator.evaluate(
            &[hit(CrisisCategory::SuicideRisk, 0.97, false)],
            &history,
            Utc::now(),
        );
        assert!(next.score() >= fresh);
    }

    #[test]
    fn test_sustained_decline_becomes_improving() {
        let aggregator = RiskAggregator::default();
        let history = run(
            &aggregator,
            &[
                vec![hit(CrisisCategory::SuicideRisk, 0.97, false)],
                vec![],
                vec![],
                vec![],
            ],
        );

        let trends: Vec<Trend> = history.iter().map(|a| a.trend()).collect();
        assert_eq!(
            trends,
            vec![
                Trend::Escalating,
                Trend::Declining,
                Trend::Declining,
                Trend::Improving
            ]
        );
    }

    #[test]
    fn test_history_window_is_bounded() {
        let aggregator = RiskAggregator::new(AggregatorConfig {
            history_window: 2,
            ..Default::default()
        });
        let mut prior = vec![RiskAssessment::at_level(RiskLevel::Imminent, Utc::now())];
        prior.extend((0..2).map(|_| RiskAssessment::safe(Utc::now())));

        let assessment = aggregator.evaluate(&[], &prior, Utc::now());
        assert_eq!(assessment.score(), 0.0);
    }
}
