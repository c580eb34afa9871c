// Crisis resources and the contact numbers they are built from

use serde::{Deserialize, Serialize};

/// Contact numbers used when building resource entries
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SafetyConfig {
    pub crisis_hotline: String,
    pub crisis_text_line: String,
    pub emergency_number: String,
    pub samhsa_helpline: String,
    pub nami_helpline: String,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            crisis_hotline: "988".to_string(),
            crisis_text_line: "741741".to_string(),
            emergency_number: "911".to_string(),
            samhsa_helpline: "1-800-662-4357".to_string(),
            nami_helpline: "1-800-950-6264".to_string(),
        }
    }
}

/// Resource kinds, ordered by urgency. Lists are rendered in this order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    SuicideLifeline,
    CrisisTextLine,
    EmergencyServices,
    SubstanceHelpline,
    NamiHelpline,
    MentalHealthProfessionals,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::SuicideLifeline => "suicide_lifeline",
            ResourceKind::CrisisTextLine => "crisis_text_line",
            ResourceKind::EmergencyServices => "emergency_services",
            ResourceKind::SubstanceHelpline => "substance_helpline",
            ResourceKind::NamiHelpline => "nami_helpline",
            ResourceKind::MentalHealthProfessionals => "mental_health_professionals",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CrisisResource {
    pub kind: ResourceKind,
    pub name: String,
    pub contact: String,
    pub availability: String,
    pub description: String,
}

impl CrisisResource {
    pub fn build(kind: ResourceKind, safety: &SafetyConfig) -> Self {
        let (name, contact, availability, description) = match kind {
            ResourceKind::SuicideLifeline => (
                "988 Suicide & Crisis Lifeline",
                format!("Call or text {}", safety.crisis_hotline),
                "24/7",
                "Free, confidential support for people in distress",
            ),
            ResourceKind::CrisisTextLine => (
                "Crisis Text Line",
                format!("Text HOME to {}", safety.crisis_text_line),
                "24/7",
                "Free crisis counseling via text message",
            ),
            ResourceKind::EmergencyServices => (
                "Emergency Services",
                format!("Call {}", safety.emergency_number),
                "24/7",
                "For immediate life-threatening emergencies",
            ),
            ResourceKind::SubstanceHelpline => (
                "SAMHSA National Helpline",
                format!("Call {}", safety.samhsa_helpline),
                "24/7",
                "Treatment referral and information for substance use",
            ),
            ResourceKind::NamiHelpline => (
                "NAMI HelpLine",
                format!("Call {}", safety.nami_helpline),
                "Mon-Fri 10am-6pm ET",
                "Information, referrals and support",
            ),
            ResourceKind::MentalHealthProfessionals => (
                "Mental health professionals",
                "https://findtreatment.gov".to_string(),
                "Varies by provider",
                "Directory of licensed counselors and treatment services",
            ),
        };

        Self {
            kind,
            name: name.to_string(),
            contact,
            availability: availability.to_string(),
            description: description.to_string(),
        }
    }

    /// One-line rendering for replies and the CLI
    pub fn render(&self) -> String {
        format!("{}: {} ({})", self.name, self.contact, self.availability)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contacts_come_from_config() {
        let safety = SafetyConfig {
            crisis_hotline: "000".to_string(),
            ..Default::default()
        };
        let lifeline = CrisisResource::build(ResourceKind::SuicideLifeline, &safety);
        assert_eq!(lifeline.contact, "Call or text 000");
    }

    #[test]
    fn test_render() {
        let resource = CrisisResource::build(ResourceKind::CrisisTextLine, &SafetyConfig::default());
        assert_eq!(
            resource.render(),
            "Crisis Text Line: Text HOME to 741741 (24/7)"
        );
    }
}
