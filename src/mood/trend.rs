// Mood analytics over a session's retained readings

use serde::Serialize;
use std::collections::BTreeMap;

use crate::catalog::MoodLabel;

use super::MoodReading;

/// Readings compared on each side of the trend split
pub const MOOD_TREND_WINDOW: usize = 5;

/// Valence difference needed before the trend leaves `Stable`
pub const MOOD_TREND_DELTA: f64 = 0.3;

/// Fewer readings than this always report `Stable`
const MIN_TREND_READINGS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodTrend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoodAnalytics {
    pub readings: usize,
    pub distribution: BTreeMap<MoodLabel, usize>,
    /// Mean classifier confidence, `None` without readings
    pub average_confidence: Option<f64>,
    pub trend: MoodTrend,
}

impl MoodAnalytics {
    /// Summarize readings given oldest first.
    pub fn from_readings<'a, I>(readings: I) -> Self
    where
        I: IntoIterator<Item = &'a MoodReading>,
    {
        let readings: Vec<&MoodReading> = readings.into_iter().collect();

        let mut distribution = BTreeMap::new();
        for reading in &readings {
            *distribution.entry(reading.label).or_insert(0) += 1;
        }

        let average_confidence = if readings.is_empty() {
            None
        } else {
            let total: f64 = readings.iter().map(|r| r.confidence).sum();
            Some(total / readings.len() as f64)
        };

        let valences: Vec<f64> = readings.iter().map(|r| valence(r.label)).collect();

        Self {
            readings: readings.len(),
            distribution,
            average_confidence,
            trend: mood_trend(&valences),
        }
    }
}

fn valence(label: MoodLabel) -> f64 {
    if label.is_positive() {
        1.0
    } else if label.is_negative() {
        -1.0
    } else {
        0.0
    }
}

/// Compare the latest window with the one before it.
///
/// With fewer than two full windows, everything before the latest window
/// forms the earlier side.
fn mood_trend(valences: &[f64]) -> MoodTrend {
    let n = valences.len();
    if n < MIN_TREND_READINGS {
        return MoodTrend::Stable;
    }

    let split = n.saturating_sub(MOOD_TREND_WINDOW);
    let recent = &valences[split..];
    let previous = &valences[split.saturating_sub(MOOD_TREND_WINDOW)..split];
    if previous.is_empty() {
        return MoodTrend::Stable;
    }

    let diff = mean(recent) - mean(previous);
    if diff > MOOD_TREND_DELTA {
        MoodTrend::Improving
    } else if diff < -MOOD_TREND_DELTA {
        MoodTrend::Declining
    } else {
        MoodTrend::Stable
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}
