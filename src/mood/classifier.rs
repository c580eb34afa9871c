// Mood classifier
// Keyword-weighted mood scoring with negation inversion

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::catalog::{MoodLabel, PatternCatalog};
use crate::text::NormalizedText;

/// Top labels closer than this are reported as `Mixed`
pub const MIXED_EPSILON: f64 = 0.05;

/// Below this score or confidence the message is `Neutral`
pub const CONFIDENCE_FLOOR: f64 = 0.15;

/// Share of a negated keyword's weight moved to its opposite label
pub const NEGATION_TRANSFER: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodReading {
    pub label: MoodLabel,
    pub confidence: f64,
    /// Supporting keywords in message order
    pub keywords: Vec<String>,
}

impl MoodReading {
    pub fn neutral() -> Self {
        Self {
            label: MoodLabel::Neutral,
            confidence: 0.0,
            keywords: Vec::new(),
        }
    }
}

/// A keyword hit credited to a label
struct Evidence {
    token_index: usize,
    label: MoodLabel,
    text: String,
}

#[derive(Debug, Default, Clone, Copy)]
struct LabelScore {
    score: f64,
    /// Positive keyword weight only, used to break score ties
    cumulative: f64,
}

#[derive(Clone)]
pub struct MoodClassifier {
    catalog: Arc<PatternCatalog>,
}

impl MoodClassifier {
    pub fn new(catalog: Arc<PatternCatalog>) -> Self {
        Self { catalog }
    }

    pub fn classify(&self, text: &NormalizedText) -> MoodReading {
        let mut scores: BTreeMap<MoodLabel, LabelScore> = MoodLabel::SCORED
            .iter()
            .map(|label| (*label, LabelScore::default()))
            .collect();
        let mut evidence = Vec::new();
        let mut total = 0.0;

        for keyword in self.catalog.mood_keywords() {
            for pos in text.find_phrase(&keyword.phrase) {
                let weight = keyword.weight * self.intensity_before(text, pos);
                let matched = text.span_text(pos, pos + keyword.phrase.len());
                total += weight;

                if text.is_negated(pos) {
                    if let Some(entry) = scores.get_mut(&keyword.label) {
                        entry.score -= weight;
                    }
                    if let Some(opposite) = keyword.label.opposite() {
                        let entry = scores.entry(opposite).or_default();
                        entry.score += weight * NEGATION_TRANSFER;
                        entry.cumulative += weight * NEGATION_TRANSFER;
                        evidence.push(Evidence {
                            token_index: pos,
                            label: opposite,
                            text: format!("not {}", matched),
                        });
                    }
                } else {
                    let entry = scores.entry(keyword.label).or_default();
                    entry.score += weight;
                    entry.cumulative += weight;
                    evidence.push(Evidence {
                        token_index: pos,
                        label: keyword.label,
                        text: matched,
                    });
                }
            }
        }

        let mut ranked: Vec<(MoodLabel, LabelScore)> = scores
            .into_iter()
            .filter(|(_, s)| s.score > 0.0)
            .collect();
        ranked.sort_by(|(la, a), (lb, b)| {
            b.score
                .total_cmp(&a.score)
                .then_with(|| b.cumulative.total_cmp(&a.cumulative))
                .then_with(|| la.cmp(lb))
        });

        let Some(&(top_label, top)) = ranked.first() else {
            return MoodReading::neutral();
        };

        let confidence = if total > 0.0 {
            (top.score / total).clamp(0.0, 1.0)
        } else {
            0.0
        };
        if top.score < CONFIDENCE_FLOOR || confidence < CONFIDENCE_FLOOR {
            return MoodReading::neutral();
        }

        let contenders: Vec<MoodLabel> = ranked
            .iter()
            .take_while(|(_, s)| top.score - s.score <= MIXED_EPSILON)
            .map(|(label, _)| *label)
            .collect();
        let label = if contenders.len() > 1 {
            MoodLabel::Mixed
        } else {
            top_label
        };

        evidence.sort_by_key(|e| e.token_index);
        let keywords = evidence
            .into_iter()
            .filter(|e| contenders.contains(&e.label))
            .map(|e| e.text)
            .collect();

        MoodReading {
            label,
            confidence,
            keywords,
        }
    }

    /// Intensifier multiplier from the token right before a keyword
    fn intensity_before(&self, text: &NormalizedText, pos: usize) -> f64 {
        pos.checked_sub(1)
            .and_then(|prev| text.tokens().get(prev))
            .and_then(|word| self.catalog.intensifier(word))
            .unwrap_or(1.0)
    }
}
