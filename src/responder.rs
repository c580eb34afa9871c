// Response generation seam
//
// The engine never writes free text itself. A Responder turns a message and
// its assessment into a reply; compose_reply wraps any responder so crisis
// resources are always attached when the crisis flag is raised.

use anyhow::Result;
use async_trait::async_trait;

use crate::catalog::MoodLabel;
use crate::engine::TurnOutcome;
use crate::escalation::ResponseMode;

/// Produces an empathetic reply given the message and its risk context.
///
/// Implementations receive the outcome read-only and cannot change the
/// escalation decision.
#[async_trait]
pub trait Responder: Send + Sync {
    async fn generate(&self, message: &str, outcome: &TurnOutcome) -> Result<String>;

    /// Responder name for logs
    fn name(&self) -> &str;
}

/// Deterministic responder backed by fixed templates
#[derive(Debug, Clone, Default)]
pub struct TemplateResponder;

impl TemplateResponder {
    pub fn new() -> Self {
        Self
    }

    pub fn template(mode: ResponseMode, mood: MoodLabel) -> &'static str {
        match mode {
            ResponseMode::ImmediateIntervention => {
                "I'm very concerned about what you've shared. Your safety is the most \
                 important thing right now. Please reach out to one of the services below \
                 right away, and if you are in immediate danger call emergency services or \
                 go to your nearest emergency room."
            }
            ResponseMode::CrisisProtocol => {
                "I can hear that you're going through something really difficult right now. \
                 It's important that you have support. Would you be willing to talk with a \
                 crisis counselor? Trained counselors are available around the clock."
            }
            ResponseMode::SafetyPlanning => {
                "It sounds like you're struggling with some painful feelings. Let's think \
                 about ways to keep you safe and supported. Are there people you trust, or \
                 things that usually help you feel a little steadier?"
            }
            ResponseMode::EnhancedSupport => {
                "Thank you for sharing this with me. It takes courage to reach out when \
                 you're struggling. It might also help to connect with someone who can offer \
                 more support. Would you like some options?"
            }
            ResponseMode::SupportiveResponse => {
                "I'm here to listen. Your feelings are valid, and it's okay to not be okay \
                 sometimes. Can you tell me more about what's been on your mind?"
            }
            ResponseMode::ContinueConversation => match mood {
                MoodLabel::Happy | MoodLabel::Excited | MoodLabel::Hopeful => {
                    "That's really good to hear. What's been going well for you?"
                }
                MoodLabel::Calm => "It sounds like things feel fairly settled. What's on your mind?",
                MoodLabel::Mixed => {
                    "It sounds like you're feeling a few different things at once. Which part \
                     feels biggest right now?"
                }
                label if label.is_negative() => {
                    "That sounds hard. I'm here to listen if you want to say more."
                }
                _ => "I'm listening. Tell me more.",
            },
        }
    }
}

#[async_trait]
impl Responder for TemplateResponder {
    async fn generate(&self, _message: &str, outcome: &TurnOutcome) -> Result<String> {
        Ok(Self::template(outcome.escalation.response_mode, outcome.mood.label).to_string())
    }

    fn name(&self) -> &str {
        "template"
    }
}

/// Generate a reply and attach the escalation's resources and disclaimer.
///
/// If the responder fails, the template for the decided response mode is
/// used instead. Resources are appended whenever the crisis flag is raised,
/// whatever the responder produced.
pub async fn compose_reply(
    responder: &dyn Responder,
    message: &str,
    outcome: &TurnOutcome,
) -> String {
    let mut reply = match responder.generate(message, outcome).await {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => {
            tracing::warn!(responder = responder.name(), "Responder returned an empty reply");
            TemplateResponder::template(outcome.escalation.response_mode, outcome.mood.label)
                .to_string()
        }
        Err(e) => {
            tracing::warn!(responder = responder.name(), error = %e, "Responder failed");
            TemplateResponder::template(outcome.escalation.response_mode, outcome.mood.label)
                .to_string()
        }
    };

    let escalation = &outcome.escalation;
    if escalation.raise_crisis_flag || outcome.degraded {
        reply.push_str("\n\nImmediate help is available:");
        for resource in &escalation.resources {
            reply.push_str("\n- ");
            reply.push_str(&resource.render());
        }
    } else if !escalation.resources.is_empty() {
        reply.push_str("\n\nSome resources that may help:");
        for resource in &escalation.resources {
            reply.push_str("\n- ");
            reply.push_str(&resource.render());
        }
    }

    if let Some(disclaimer) = &escalation.disclaimer {
        reply.push_str("\n\n");
        reply.push_str(disclaimer);
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::PatternCatalog;
    use crate::engine::{EngineConfig, SafetyEngine};
    use crate::escalation::EscalationPolicy;
    use crate::session::{SessionConfig, SessionStore};
    use std::sync::Arc;

    struct DismissiveResponder;

    #[async_trait]
    impl Responder for DismissiveResponder {
        async fn generate(&self, _message: &str, _outcome: &TurnOutcome) -> Result<String> {
            Ok("Everything is fine, no need for help.".to_string())
        }

        fn name(&self) -> &str {
            "dismissive"
        }
    }

    struct FailingResponder;

    #[async_trait]
    impl Responder for FailingResponder {
        async fn generate(&self, _message: &str, _outcome: &TurnOutcome) -> Result<String> {
            anyhow::bail!("upstream unavailable")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    fn engine() -> SafetyEngine {
        SafetyEngine::new(
            Arc::new(PatternCatalog::builtin().unwrap()),
            EngineConfig::default(),
            EscalationPolicy::default(),
            Arc::new(SessionStore::new(SessionConfig::default())),
        )
    }

    #[tokio::test]
    async fn test_generator_cannot_drop_crisis_resources() {
        let engine = engine();
        let message = "I want to kill myself tonight";
        let outcome = engine.process("s", message);
        assert!(outcome.escalation.raise_crisis_flag);

        let reply = compose_reply(&DismissiveResponder, message, &outcome).await;
        assert!(reply.starts_with("Everything is fine"));
        assert!(reply.contains("988"));
        assert!(reply.contains("741741"));
    }

    #[tokio::test]
    async fn test_failing_responder_falls_back_to_template() {
        let engine = engine();
        let outcome = engine.process("s", "I feel so happy today");

        let reply = compose_reply(&FailingResponder, "I feel so happy today", &outcome).await;
        assert!(reply.starts_with("That's really good to hear"));
    }

    #[tokio::test]
    async fn test_template_responder_uses_response_mode() {
        let engine = engine();
        let outcome = engine.process("s", "I don't want to live anymore");

        let reply = compose_reply(&TemplateResponder::new(), "", &outcome).await;
        assert!(reply.starts_with("I'm very concerned"));
        assert!(reply.contains(crate::escalation::DISCLAIMER));
    }
}
