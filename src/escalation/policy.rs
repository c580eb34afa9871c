// Escalation policy
// Pure mapping from a risk level and crisis categories to concrete actions

use serde::Serialize;
use std::collections::{BTreeSet, HashSet};

use super::resources::{CrisisResource, ResourceKind, SafetyConfig};
use crate::catalog::CrisisCategory;
use crate::risk::RiskLevel;

pub const DISCLAIMER: &str = "This is an automated support tool, not a replacement for a \
    mental health professional, and it cannot diagnose any condition.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseMode {
    ContinueConversation,
    SupportiveResponse,
    EnhancedSupport,
    SafetyPlanning,
    CrisisProtocol,
    ImmediateIntervention,
}

impl ResponseMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseMode::ContinueConversation => "continue_conversation",
            ResponseMode::SupportiveResponse => "supportive_response",
            ResponseMode::EnhancedSupport => "enhanced_support",
            ResponseMode::SafetyPlanning => "safety_planning",
            ResponseMode::CrisisProtocol => "crisis_protocol",
            ResponseMode::ImmediateIntervention => "immediate_intervention",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EscalationActions {
    pub resources: Vec<CrisisResource>,
    pub raise_crisis_flag: bool,
    pub disclaimer: Option<String>,
    pub response_mode: ResponseMode,
}

impl EscalationActions {
    pub fn has_resource(&self, kind: ResourceKind) -> bool {
        self.resources.iter().any(|r| r.kind == kind)
    }
}

#[derive(Debug, Clone, Default)]
pub struct EscalationPolicy {
    safety: SafetyConfig,
}

impl EscalationPolicy {
    pub fn new(safety: SafetyConfig) -> Self {
        Self { safety }
    }

    pub fn safety(&self) -> &SafetyConfig {
        &self.safety
    }

    /// Decide the actions for a level.
    ///
    /// `categories` should include the session's sticky categories so
    /// resources persist across turns even when the level falls.
    pub fn decide(&self, level: RiskLevel, categories: &BTreeSet<CrisisCategory>) -> EscalationActions {
        let mut kinds = base_resources(level);

        for category in categories {
            match category {
                CrisisCategory::SuicideRisk => {
                    kinds.insert(ResourceKind::SuicideLifeline);
                }
                CrisisCategory::SelfHarm => {
                    kinds.insert(ResourceKind::CrisisTextLine);
                }
                CrisisCategory::SubstanceCrisis => {
                    kinds.insert(ResourceKind::SubstanceHelpline);
                }
                CrisisCategory::Violence if level >= RiskLevel::Danger => {
                    kinds.insert(ResourceKind::EmergencyServices);
                }
                CrisisCategory::Violence => {
                    kinds.insert(ResourceKind::CrisisTextLine);
                }
                CrisisCategory::GeneralDistress => {
                    kinds.insert(ResourceKind::NamiHelpline);
                }
            }
        }

        let response_mode = match level {
            RiskLevel::Safe if categories.is_empty() => ResponseMode::ContinueConversation,
            RiskLevel::Safe => ResponseMode::SupportiveResponse,
            RiskLevel::Concern => ResponseMode::EnhancedSupport,
            RiskLevel::Danger
                if categories.contains(&CrisisCategory::SuicideRisk)
                    || categories.contains(&CrisisCategory::Violence) =>
            {
                ResponseMode::CrisisProtocol
            }
            RiskLevel::Danger => ResponseMode::SafetyPlanning,
            RiskLevel::Imminent => ResponseMode::ImmediateIntervention,
        };

        EscalationActions {
            resources: self.build(kinds),
            raise_crisis_flag: level.is_crisis(),
            disclaimer: (level > RiskLevel::Safe).then(|| DISCLAIMER.to_string()),
            response_mode,
        }
    }

    /// Actions used when assessment itself failed: treat the turn as at
    /// least `level` and always include the core crisis lines.
    pub fn fail_safe(&self, level: RiskLevel, categories: &BTreeSet<CrisisCategory>) -> EscalationActions {
        let mut actions = self.decide(level, categories);
        let mut kinds: BTreeSet<ResourceKind> = actions.resources.iter().map(|r| r.kind).collect();
        kinds.extend([
            ResourceKind::SuicideLifeline,
            ResourceKind::CrisisTextLine,
            ResourceKind::EmergencyServices,
        ]);
        actions.resources = self.build(kinds);
        actions.disclaimer = Some(DISCLAIMER.to_string());
        actions
    }

    fn build(&self, kinds: BTreeSet<ResourceKind>) -> Vec<CrisisResource> {
        kinds
            .into_iter()
            .map(|kind| CrisisResource::build(kind, &self.safety))
            .collect()
    }
}

fn base_resources(level: RiskLevel) -> BTreeSet<ResourceKind> {
    let kinds: &[ResourceKind] = match level {
        RiskLevel::Safe => &[],
        RiskLevel::Concern => &[
            ResourceKind::NamiHelpline,
            ResourceKind::MentalHealthProfessionals,
        ],
        RiskLevel::Danger => &[
            ResourceKind::SuicideLifeline,
            ResourceKind::CrisisTextLine,
            ResourceKind::MentalHealthProfessionals,
        ],
        RiskLevel::Imminent => &[
            ResourceKind::SuicideLifeline,
            ResourceKind::CrisisTextLine,
            ResourceKind::EmergencyServices,
        ],
    };
    kinds.iter().copied().collect()
}

/// Distinct resource names, for quick display
pub fn resource_names(actions: &EscalationActions) -> Vec<String> {
    let mut seen = HashSet::new();
    actions
        .resources
        .iter()
        .filter(|r| seen.insert(r.name.clone()))
        .map(|r| r.name.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn categories(list: &[CrisisCategory]) -> BTreeSet<CrisisCategory> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_safe_without_categories() {
        let policy = EscalationPolicy::default();
        let actions = policy.decide(RiskLevel::Safe, &BTreeSet::new());

        assert!(actions.resources.is_empty());
        assert!(!actions.raise_crisis_flag);
        assert!(actions.disclaimer.is_none());
        assert_eq!(actions.response_mode, ResponseMode::ContinueConversation);
    }

    #[test]
    fn test_imminent_raises_flag_with_core_lines() {
        let policy = EscalationPolicy::default();
        let actions = policy.decide(RiskLevel::Imminent, &categories(&[CrisisCategory::SuicideRisk]));

        assert!(actions.raise_crisis_flag);
        assert_eq!(actions.response_mode, ResponseMode::ImmediateIntervention);
        assert_eq!(actions.resources[0].kind, ResourceKind::SuicideLifeline);
        assert!(actions.has_resource(ResourceKind::EmergencyServices));
    }

    #[test]
    fn test_suicide_risk_always_adds_lifeline() {
        let policy = EscalationPolicy::default();
        for level in [RiskLevel::Safe, RiskLevel::Concern] {
            let actions = policy.decide(level, &categories(&[CrisisCategory::SuicideRisk]));
            assert!(actions.has_resource(ResourceKind::SuicideLifeline));
        }
    }

    #[test]
    fn test_category_overrides() {
        let policy = EscalationPolicy::default();

        let substance = policy.decide(RiskLevel::Concern, &categories(&[CrisisCategory::SubstanceCrisis]));
        assert!(substance.has_resource(ResourceKind::SubstanceHelpline));

        let self_harm = policy.decide(RiskLevel::Safe, &categories(&[CrisisCategory::SelfHarm]));
        assert!(self_harm.has_resource(ResourceKind::CrisisTextLine));
        assert_eq!(self_harm.response_mode, ResponseMode::SupportiveResponse);
    }

    #[test]
    fn test_violence_needs_danger_for_emergency_services() {
        let policy = EscalationPolicy::default();
        let violence = categories(&[CrisisCategory::Violence]);

        let concern = policy.decide(RiskLevel::Concern, &violence);
        assert!(!concern.has_resource(ResourceKind::EmergencyServices));
        assert!(concern.has_resource(ResourceKind::CrisisTextLine));

        let danger = policy.decide(RiskLevel::Danger, &violence);
        assert!(danger.has_resource(ResourceKind::EmergencyServices));
        assert_eq!(danger.response_mode, ResponseMode::CrisisProtocol);
    }

    #[test]
    fn test_danger_without_suicide_or_violence_is_safety_planning() {
        let policy = EscalationPolicy::default();
        let actions = policy.decide(RiskLevel::Danger, &categories(&[CrisisCategory::SelfHarm]));
        assert_eq!(actions.response_mode, ResponseMode::SafetyPlanning);
        assert!(actions.raise_crisis_flag);
    }

    #[test]
    fn test_fail_safe_includes_core_lines() {
        let policy = EscalationPolicy::default();
        let actions = policy.fail_safe(RiskLevel::Concern, &BTreeSet::new());

        assert!(actions.has_resource(ResourceKind::SuicideLifeline));
        assert!(actions.has_resource(ResourceKind::CrisisTextLine));
        assert!(actions.has_resource(ResourceKind::EmergencyServices));
        assert!(actions.disclaimer.is_some());
    }

    #[test]
    fn test_resources_are_unique() {
        let policy = EscalationPolicy::default();
        let actions = policy.decide(
            RiskLevel::Concern,
            &categories(&[CrisisCategory::GeneralDistress]),
        );
        assert_eq!(resource_names(&actions).len(), actions.resources.len());
    }
}
