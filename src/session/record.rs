// Per-session conversation state
// Holds hashed turns only; raw message text never reaches this module.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeSet, VecDeque};

use crate::catalog::CrisisCategory;
use crate::mood::{MoodAnalytics, MoodReading};
use crate::risk::{RiskAssessment, RiskLevel};

/// One assessed message
#[derive(Debug, Clone)]
pub struct Turn {
    pub message_hash: String,
    pub mood: MoodReading,
    pub risk: RiskAssessment,
}

#[derive(Debug)]
pub struct SessionRecord {
    session_key: String,
    created_at: DateTime<Utc>,
    last_active_at: DateTime<Utc>,
    turns: VecDeque<Turn>,
    max_turns: usize,
    escalation_count: u64,
    sticky_categories: BTreeSet<CrisisCategory>,
    total_turns: u64,
    /// Set when the store drops this record; writers must re-resolve
    retired: bool,
}

impl SessionRecord {
    pub fn new(session_key: String, now: DateTime<Utc>, max_turns: usize) -> Self {
        Self {
            session_key,
            created_at: now,
            last_active_at: now,
            turns: VecDeque::with_capacity(max_turns.min(16)),
            max_turns: max_turns.max(1),
            escalation_count: 0,
            sticky_categories: BTreeSet::new(),
            total_turns: 0,
            retired: false,
        }
    }

    /// Append a turn, evicting the oldest beyond `max_turns`.
    ///
    /// The escalation counter compares against the previous turn's level
    /// (`Safe` when there is none) and is never rolled back by eviction.
    pub fn append_turn(&mut self, turn: Turn, now: DateTime<Utc>) {
        let previous = self.last_level().unwrap_or(RiskLevel::Safe);
        if turn.risk.level() > previous {
            self.escalation_count += 1;
        }

        self.sticky_categories
            .extend(turn.risk.matched_categories().iter().copied());
        self.turns.push_back(turn);
        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }

        self.total_turns += 1;
        self.touch(now);
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        if now > self.last_active_at {
            self.last_active_at = now;
        }
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_active_at(&self) -> DateTime<Utc> {
        self.last_active_at
    }

    pub fn turns(&self) -> impl DoubleEndedIterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn turn_count(&self) -> usize {
        self.turns.len()
    }

    pub fn total_turns(&self) -> u64 {
        self.total_turns
    }

    pub fn escalation_count(&self) -> u64 {
        self.escalation_count
    }

    pub fn sticky_categories(&self) -> &BTreeSet<CrisisCategory> {
        &self.sticky_categories
    }

    pub fn last_level(&self) -> Option<RiskLevel> {
        self.turns.back().map(|t| t.risk.level())
    }

    /// The last `n` assessments, oldest first
    pub fn recent_risks(&self, n: usize) -> Vec<RiskAssessment> {
        let skip = self.turns.len().saturating_sub(n);
        self.turns.iter().skip(skip).map(|t| t.risk.clone()).collect()
    }

    /// Highest level among the last `n` turns
    pub fn highest_recent_level(&self, n: usize) -> Option<RiskLevel> {
        self.turns.iter().rev().take(n).map(|t| t.risk.level()).max()
    }

    /// Mood distribution, confidence and trend over the retained turns
    pub fn mood_analytics(&self) -> MoodAnalytics {
        MoodAnalytics::from_readings(self.turns.iter().map(|t| &t.mood))
    }

    pub fn is_expired(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now.signed_duration_since(self.last_active_at) > ttl
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    pub(crate) fn retire(&mut self) {
        self.retired = true;
    }

    pub fn summary(&self) -> SessionSummary {
        let last = self.turns.back();
        SessionSummary {
            session_key: self.session_key.clone(),
            created_at: self.created_at,
            last_active_at: self.last_active_at,
            retained_turns: self.turns.len(),
            total_turns: self.total_turns,
            escalation_count: self.escalation_count,
            current_level: last.map(|t| t.risk.level()).unwrap_or(RiskLevel::Safe),
            current_mood: last.map(|t| t.mood.label.as_str().to_string()),
            sticky_categories: self.sticky_categories.iter().copied().collect(),
            mood: self.mood_analytics(),
        }
    }
}

/// Serializable view of a session, without message hashes or text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSummary {
    pub session_key: String,
    pub created_at: DateTime<Utc>,
    pub last_active_at: DateTime<Utc>,
    pub retained_turns: usize,
    pub total_turns: u64,
    pub escalation_count: u64,
    pub current_level: RiskLevel,
    pub current_mood: Option<String>,
    pub sticky_categories: Vec<CrisisCategory>,
    pub mood: MoodAnalytics,
}
