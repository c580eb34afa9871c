// Crisis pattern detector

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{CrisisCategory, Matcher, PatternCatalog, PatternRule};
use crate::text::NormalizedText;

/// Multiplier applied to a negatable rule when its match is negated.
/// Negation detection is heuristic, so it dampens and never cancels.
pub const NEGATION_DAMPING: f64 = 0.4;

/// Tokens on either side of a match searched for context modifiers
pub const CONTEXT_WINDOW: usize = 4;

/// One rule hit inside a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub category: CrisisCategory,
    pub matched_text: String,
    /// Index of the first matched token
    pub token_index: usize,
    pub raw_severity: f64,
    pub negated: bool,
    /// Product of the context modifiers found around the match
    pub context_factor: f64,
    pub adjusted_severity: f64,
}

#[derive(Clone)]
pub struct CrisisDetector {
    catalog: Arc<PatternCatalog>,
}

impl CrisisDetector {
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    /// Detect every crisis rule hit in a normalized message.
    ///
    /// Results are ordered by token position, then by catalog order, and are
    /// fully determined by the catalog and the input.
    pub fn detect(&self, text: &NormalizedText) -> Vec<MatchResult> {
        let mut hits: Vec<(usize, usize, MatchResult)> = Vec::new();

        for (order, rule) in self.catalog.rules().iter().enumerate() {
            for (start, end) in rule_spans(rule, text) {
                hits.push((start, order, self.score_match(rule, text, start, end)));
            }
        }

        hits.sort_by_key(|(start, order, _)| (*start, *order));
        let matches: Vec<MatchResult> = hits.into_iter().map(|(_, _, m)| m).collect();

        for m in &matches {
            tracing::debug!(
                category = %m.category,
                negated = m.negated,
                severity = m.adjusted_severity,
                "Crisis pattern matched"
            );
        }
        matches
    }

    fn score_match(
        &self,
        rule: &PatternRule,
        text: &NormalizedText,
        start: usize,
        end: usize,
    ) -> MatchResult {
        let negated = text.is_negated(start);
        let context_factor = self.context_factor(rule.category, text, start, end);

        let mut adjusted = rule.base_severity * context_factor;
        if negated && rule.negatable {
            adjusted *= NEGATION_DAMPING;
        }

        MatchResult {
            category: rule.category,
            matched_text: text.span_text(start, end),
            token_index: start,
            raw_severity: rule.base_severity,
            negated,
            context_factor,
            adjusted_severity: adjusted.clamp(0.0, 1.0),
        }
    }

    /// Multiply together every modifier that applies to `category` and sits
    /// entirely inside the window around `[start, end)`.
    fn context_factor(
        &self,
        category: CrisisCategory,
        text: &NormalizedText,
        start: usize,
        end: usize,
    ) -> f64 {
        let before = start.saturating_sub(CONTEXT_WINDOW);
        let after = (end + CONTEXT_WINDOW).min(text.len());

        self.catalog
            .modifiers()
            .iter()
            .filter(|modifier| modifier.applies_to(category))
            .filter(|modifier| {
                let len = modifier.phrase.len();
                text.find_phrase(&modifier.phrase).any(|pos| {
                    (pos >= before && pos + len <= start) || (pos >= end && pos + len <= after)
                })
            })
            .map(|modifier| modifier.factor)
            .product()
    }
}

/// Token spans `[start, end)` where a rule matches
fn rule_spans(rule: &PatternRule, text: &NormalizedText) -> Vec<(usize, usize)> {
    match &rule.matcher {
        Matcher::Phrase(phrase) => text
            .find_phrase(phrase)
            .map(|start| (start, start + phrase.len()))
            .collect(),
        Matcher::Regex(regex) => regex
            .find_iter(text.joined())
            .filter(|m| !m.as_str().is_empty())
            .filter_map(|m| {
                let start = text.token_at_offset(m.start())?;
                let last = text.token_at_offset(m.end() - 1)?;
                Some((start, last + 1))
            })
            .collect(),
    }
}

/// Per-category severity: the maximum, never the sum, so repeated keywords
/// cannot inflate a category.
pub fn category_severities(matches: &[MatchResult]) -> BTreeMap<CrisisCategory, f64> {
    let mut severities = BTreeMap::new();
    for m in matches {
        let entry = severities.entry(m.category).or_insert(0.0_f64);
        *entry = entry.max(m.adjusted_severity);
    }
    severities
}

/// The single highest-severity category; ties go to the earlier category
pub fn best_category(matches: &[MatchResult]) -> Option<(CrisisCategory, f64)> {
    category_severities(matches)
        .into_iter()
        .fold(None, |best, (category, severity)| match best {
            Some((_, top)) if top >= severity => best,
            _ => Some((category, severity)),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::normalize;

    fn create_test_detector() -> CrisisDetector {
        let catalog = PatternCatalog::from_json(
            r#"{
                "crisis": {
                    "suicide_risk": [
                        {"phrase": "kill myself", "severity": 0.95},
                        {"phrase": "suicidal", "severity": 0.85},
                        {"phrase": "don't want to live", "severity": 0.95}
                    ],
                    "self_harm": [{"phrase": "hurt myself", "severity": 0.8}],
                    "violence": [
                        {"phrase": "hurt someone", "severity": 0.8},
                        {"regex": "\\bstab (?:him|her)\\b", "severity": 0.9}
                    ],
                    "substance_crisis": [{"phrase": "overdose", "severity": 0.8, "negatable": false}],
                    "general_distress": [{"phrase": "hopeless", "severity": 0.5}]
                },
                "modifiers": [
                    {"phrase": "tonight", "factor": 1.3},
                    {"phrase": "in a movie", "factor": 0.4, "categories": ["violence"]}
                ]
            }"#,
        )
        .unwrap();
        CrisisDetector::new(Arc::new(catalog))
    }

    fn detect(detector: &CrisisDetector, message: &str) -> Vec<MatchResult> {
        detector.detect(&normalize(message).unwrap())
    }

    #[test]
    fn test_crisis_detection() {
        let detector = create_test_detector();

        let hits = detect(&detector, "I'm thinking I might kill myself");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].category, CrisisCategory::SuicideRisk);
        assert!(!hits[0].negated);
        assert!(detect(&detector, "What is the meaning of life?").is_empty());
    }

    #[test]
    fn test_case_insensitive() {
        let detector = create_test_detector();

        assert_eq!(detect(&detector, "SUICIDAL").len(), 1);
        assert_eq!(detect(&detector, "SuIcIdAl").len(), 1);
    }

    #[test]
    fn test_negation_dampens_but_keeps_match() {
        let detector = create_test_detector();
        let matches = detect(&detector, "I'm not suicidal");

        assert_eq!(matches.len(), 1);
        assert!(matches[0].negated);
        assert!((matches[0].adjusted_severity - 0.85 * NEGATION_DAMPING).abs() < 1e-9);
    }

    #[test]
    fn test_non_negatable_rule_ignores_negation() {
        let detector = create_test_detector();
        let matches = detect(&detector, "no overdose this time");

        assert!(matches[0].negated);
        assert!((matches[0].adjusted_severity - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_rule_containing_negation_is_not_self_negated() {
        let detector = create_test_detector();
        let matches = detect(&detector, "I don't want to live anymore");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, CrisisCategory::SuicideRisk);
        assert!(!matches[0].negated);
        assert_eq!(matches[0].matched_text, "do not want to live");
    }

    #[test]
    fn test_all_matches_returned_in_order() {
        let detector = create_test_detector();
        let matches = detect(&detector, "I feel hopeless and want to hurt myself, I could hurt someone");

        let categories: Vec<CrisisCategory> = matches.iter().map(|m| m.category).collect();
        assert_eq!(
            categories,
            vec![
                CrisisCategory::GeneralDistress,
                CrisisCategory::SelfHarm,
                CrisisCategory::Violence
            ]
        );
    }

    #[test]
    fn test_repeated_keywords_take_max_not_sum() {
        let detector = create_test_detector();
        let matches = detect(&detector, "hopeless hopeless hopeless hopeless");

        assert_eq!(matches.len(), 4);
        let severities = category_severities(&matches);
        assert_eq!(severities.len(), 1);
        assert!((severities[&CrisisCategory::GeneralDistress] - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_context_modifiers() {
        let detector = create_test_detector();

        let amplified = detect(&detector, "I will hurt myself tonight");
        assert!((amplified[0].adjusted_severity - 1.0).abs() < 1e-9);
        assert!((amplified[0].context_factor - 1.3).abs() < 1e-9);

        let fictional = detect(&detector, "he would hurt someone in a movie");
        assert!((fictional[0].adjusted_severity - 0.8 * 0.4).abs() < 1e-9);

        // Modifier scoped to violence leaves other categories alone
        let scoped = detect(&detector, "I hurt myself in a movie");
        assert!((scoped[0].adjusted_severity - 0.8).abs() < 1e-9);
    }

    #[test]
    fn test_regex_rule_maps_to_tokens() {
        let detector = create_test_detector();
        let matches = detect(&detector, "sometimes I want to stab him.");

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].category, CrisisCategory::Violence);
        assert_eq!(matches[0].token_index, 4);
        assert_eq!(matches[0].matched_text, "stab him");
    }

    #[test]
    fn test_emoji_contributes_no_match() {
        let detector = create_test_detector();
        assert!(detect(&detector, "\u{1F52A}\u{1FA78}").is_empty());
    }

    #[test]
    fn test_best_category() {
        let detector = create_test_detector();
        let matches = detect(&detector, "hopeless, I want to kill myself");

        assert_eq!(
            best_category(&matches),
            Some((CrisisCategory::SuicideRisk, 0.95))
        );
        assert_eq!(best_category(&[]), None);
    }
}
