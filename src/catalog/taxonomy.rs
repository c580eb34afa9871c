// Crisis categories and mood labels

use serde::{Deserialize, Serialize};
use std::fmt;

/// Crisis taxonomy bucket used to group detection rules
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrisisCategory {
    SuicideRisk,
    SelfHarm,
    Violence,
    SubstanceCrisis,
    GeneralDistress,
}

impl CrisisCategory {
    pub const ALL: [CrisisCategory; 5] = [
        CrisisCategory::SuicideRisk,
        CrisisCategory::SelfHarm,
        CrisisCategory::Violence,
        CrisisCategory::SubstanceCrisis,
        CrisisCategory::GeneralDistress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CrisisCategory::SuicideRisk => "suicide_risk",
            CrisisCategory::SelfHarm => "self_harm",
            CrisisCategory::Violence => "violence",
            CrisisCategory::SubstanceCrisis => "substance_crisis",
            CrisisCategory::GeneralDistress => "general_distress",
        }
    }
}

impl fmt::Display for CrisisCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Dominant emotional state of a single message
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodLabel {
    Happy,
    Sad,
    Anxious,
    Angry,
    Depressed,
    Excited,
    Calm,
    Frustrated,
    Hopeful,
    Neutral,
    Mixed,
}

impl MoodLabel {
    /// Labels that keywords can score. `Neutral` and `Mixed` are outcomes only.
    pub const SCORED: [MoodLabel; 9] = [
        MoodLabel::Happy,
        MoodLabel::Sad,
        MoodLabel::Anxious,
        MoodLabel::Angry,
        MoodLabel::Depressed,
        MoodLabel::Excited,
        MoodLabel::Calm,
        MoodLabel::Frustrated,
        MoodLabel::Hopeful,
    ];

    pub fn is_scored(&self) -> bool {
        !matches!(self, MoodLabel::Neutral | MoodLabel::Mixed)
    }

    /// Direct semantic opposite used for negation inversion, if one exists
    pub fn opposite(&self) -> Option<MoodLabel> {
        match self {
            MoodLabel::Happy => Some(MoodLabel::Sad),
            MoodLabel::Sad => Some(MoodLabel::Happy),
            MoodLabel::Anxious => Some(MoodLabel::Calm),
            MoodLabel::Calm => Some(MoodLabel::Anxious),
            MoodLabel::Hopeful => Some(MoodLabel::Depressed),
            MoodLabel::Depressed => Some(MoodLabel::Hopeful),
            _ => None,
        }
    }

    /// True for the sad/negative family of labels
    pub fn is_negative(&self) -> bool {
        matches!(
            self,
            MoodLabel::Sad
                | MoodLabel::Anxious
                | MoodLabel::Angry
                | MoodLabel::Depressed
                | MoodLabel::Frustrated
        )
    }

    /// True for the happy/positive family of labels
    pub fn is_positive(&self) -> bool {
        matches!(
            self,
            MoodLabel::Happy | MoodLabel::Excited | MoodLabel::Hopeful | MoodLabel::Calm
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MoodLabel::Happy => "happy",
            MoodLabel::Sad => "sad",
            MoodLabel::Anxious => "anxious",
            MoodLabel::Angry => "angry",
            MoodLabel::Depressed => "depressed",
            MoodLabel::Excited => "excited",
            MoodLabel::Calm => "calm",
            MoodLabel::Frustrated => "frustrated",
            MoodLabel::Hopeful => "hopeful",
            MoodLabel::Neutral => "neutral",
            MoodLabel::Mixed => "mixed",
        }
    }
}

impl fmt::Display for MoodLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
