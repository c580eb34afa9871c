// Safety engine
// Per-message pipeline: normalize, detect and classify, aggregate against
// session history, decide escalation. Any internal failure degrades to a
// fail-safe-high outcome instead of an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use crate::catalog::{CrisisCategory, PatternCatalog};
use crate::crisis::{CrisisDetector, MatchResult};
use crate::errors::EngineError;
use crate::escalation::{resource_names, EscalationActions, EscalationPolicy};
use crate::mood::{MoodClassifier, MoodReading};
use crate::risk::{
    instantaneous_score, AggregatorConfig, RiskAggregator, RiskAssessment, RiskLevel, Trend,
};
use crate::session::{SessionStore, Turn};
use crate::text::{normalize, NormalizedText};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    #[serde(flatten)]
    pub aggregator: AggregatorConfig,
    /// Messages with at least this many tokens run detection and mood
    /// classification on separate threads
    pub parallel_token_threshold: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            aggregator: AggregatorConfig::default(),
            parallel_token_threshold: 64,
        }
    }
}

/// Everything the caller learns about one turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_key: String,
    pub risk: RiskAssessment,
    pub mood: MoodReading,
    pub matches: Vec<MatchResult>,
    pub escalation: EscalationActions,
    /// Assessment failed internally and this is a fail-safe answer
    pub degraded: bool,
    /// The turn was appended to session history
    pub recorded: bool,
}

pub struct SafetyEngine {
    catalog: Arc<PatternCatalog>,
    detector: CrisisDetector,
    classifier: MoodClassifier,
    aggregator: RiskAggregator,
    policy: EscalationPolicy,
    store: Arc<SessionStore>,
    config: EngineConfig,
}

impl SafetyEngine {
    pub fn new(
        catalog: Arc<PatternCatalog>,
        config: EngineConfig,
        policy: EscalationPolicy,
        store: Arc<SessionStore>,
    ) -> Self {
        Self {
            detector: CrisisDetector::new(Arc::clone(&catalog)),
            classifier: MoodClassifier::new(Arc::clone(&catalog)),
            aggregator: RiskAggregator::new(config.aggregator.clone()),
            catalog,
            policy,
            store,
            config,
        }
    }

    pub fn catalog(&self) -> &Arc<PatternCatalog> {
        &self.catalog
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn policy(&self) -> &EscalationPolicy {
        &self.policy
    }

    /// Assess one message for a session.
    ///
    /// Never fails: empty input is reported as safe without touching history,
    /// and internal errors produce a degraded outcome no lower than the
    /// session's recent risk level or this message's own matches.
    pub fn process(&self, session_id: &str, message: &str) -> TurnOutcome {
        let session_key = self.store.key_for(session_id);

        let text = match normalize(message) {
            Ok(text) => text,
            Err(_) => return self.empty_outcome(session_id, session_key),
        };

        let (matches, mood) = match self.run_passes(&text) {
            Ok(passes) => passes,
            Err(error) => return self.fail_safe(session_id, session_key, &[], &error),
        };

        match self.assess(session_id, &session_key, &text, &matches, mood) {
            Ok(outcome) => outcome,
            Err(error) => self.fail_safe(session_id, session_key, &matches, &error),
        }
    }

    fn assess(
        &self,
        session_id: &str,
        session_key: &str,
        text: &NormalizedText,
        matches: &[MatchResult],
        mood: MoodReading,
    ) -> Result<TurnOutcome, EngineError> {
        let message_hash = self.store.hash_message(text.joined());
        let window = self.config.aggregator.history_window;

        let aggregated = catch_unwind(AssertUnwindSafe(|| {
            self.store.with_session(session_id, |record, now| {
                let prior = record.recent_risks(window);
                let risk = self.aggregator.evaluate(matches, &prior, now);
                if !risk.score().is_finite() {
                    return Err(EngineError::NonFiniteScore);
                }

                let mut categories = record.sticky_categories().clone();
                categories.extend(risk.matched_categories().iter().copied());
                let escalation = self.policy.decide(risk.level(), &categories);

                record.append_turn(
                    Turn {
                        message_hash,
                        mood: mood.clone(),
                        risk: risk.clone(),
                    },
                    now,
                );
                Ok((risk, escalation))
            })
        }))
        .map_err(|_| EngineError::PassPanicked("aggregation"))?;
        let (risk, escalation) = aggregated??;

        let short_key = &session_key[..session_key.len().min(12)];
        tracing::debug!(
            session = %short_key,
            level = %risk.level(),
            score = risk.score(),
            mood = %mood.label,
            matches = matches.len(),
            "Turn assessed"
        );
        if escalation.raise_crisis_flag {
            tracing::warn!(
                session = %short_key,
                level = %risk.level(),
                mode = escalation.response_mode.as_str(),
                resources = ?resource_names(&escalation),
                "Crisis flag raised"
            );
        }

        Ok(TurnOutcome {
            session_key: session_key.to_string(),
            risk,
            mood,
            matches: matches.to_vec(),
            escalation,
            degraded: false,
            recorded: true,
        })
    }

    /// Run detection and mood classification, on scoped threads when the
    /// message is long enough
    fn run_passes(
        &self,
        text: &NormalizedText,
    ) -> Result<(Vec<MatchResult>, MoodReading), EngineError> {
        if text.len() >= self.config.parallel_token_threshold {
            std::thread::scope(|scope| {
                let detection = scope.spawn(|| self.detector.detect(text));
                let mood = scope.spawn(|| self.classifier.classify(text));
                let detection = detection.join();
                let mood = mood.join();
                Ok((
                    detection.map_err(|_| EngineError::PassPanicked("detection"))?,
                    mood.map_err(|_| EngineError::PassPanicked("mood"))?,
                ))
            })
        } else {
            let matches = catch_unwind(AssertUnwindSafe(|| self.detector.detect(text)))
                .map_err(|_| EngineError::PassPanicked("detection"))?;
            let mood = catch_unwind(AssertUnwindSafe(|| self.classifier.classify(text)))
                .map_err(|_| EngineError::PassPanicked("mood"))?;
            Ok((matches, mood))
        }
    }

    fn empty_outcome(&self, session_id: &str, session_key: String) -> TurnOutcome {
        let sticky = self
            .store
            .peek(session_id, |record| record.sticky_categories().clone())
            .unwrap_or_default();

        TurnOutcome {
            session_key,
            risk: RiskAssessment::safe(self.store.now()),
            mood: MoodReading::neutral(),
            matches: Vec::new(),
            escalation: self.policy.decide(RiskLevel::Safe, &sticky),
            degraded: false,
            recorded: false,
        }
    }

    /// Fail-safe-high outcome for a turn whose assessment failed.
    ///
    /// The level is the highest of the session's recent history, Concern, and
    /// whatever this message's own matches score on their own. A record
    /// poisoned by a panicked writer is recovered so later turns are scored
    /// normally again.
    fn fail_safe(
        &self,
        session_id: &str,
        session_key: String,
        matches: &[MatchResult],
        error: &EngineError,
    ) -> TurnOutcome {
        let window = self.config.aggregator.history_window;
        let history = self.store.peek(session_id, |record| {
            (
                record.highest_recent_level(window),
                record.sticky_categories().clone(),
            )
        });

        let current = RiskLevel::from_score(instantaneous_score(matches));
        let (recent, mut categories): (RiskLevel, BTreeSet<CrisisCategory>) = match history {
            Ok((recent, sticky)) => (recent.unwrap_or(RiskLevel::Safe), sticky),
            // History unreadable: assume the worst short of imminent
            Err(_) => (RiskLevel::Danger, BTreeSet::new()),
        };
        let level = recent.max(RiskLevel::Concern).max(current);
        let matched: BTreeSet<CrisisCategory> = matches.iter().map(|m| m.category).collect();
        categories.extend(matched.iter().copied());

        let short_key = &session_key[..session_key.len().min(12)];
        tracing::warn!(
            session = %short_key,
            error = %error,
            level = %level,
            matches = matches.len(),
            "Assessment failed, reporting fail-safe outcome"
        );

        self.store.recover(session_id);

        let now = self.store.now();
        TurnOutcome {
            session_key,
            risk: RiskAssessment::new(level.lower_threshold(), matched, Trend::Stable, now),
            mood: MoodReading::neutral(),
            matches: matches.to_vec(),
            escalation: self.policy.fail_safe(level, &categories),
            degraded: true,
            recorded: false,
        }
    }
}
