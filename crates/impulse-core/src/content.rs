//! Content-generation collaborator.
//!
//! Given the agent, the winning motivation and a snapshot of its needs, a
//! [`ContentGenerator`] produces the text an action carries (a message, a
//! narrative line). The engine treats a failure as "no action this cycle".

use std::future::Future;

use impulse_types::{ActionType, AgentId, Motivation, Need};

use crate::error::CollaboratorError;

/// Everything a generator sees when asked for action content.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentRequest {
    /// The acting agent.
    pub agent_id: AgentId,
    /// The action the content is for.
    pub action_type: ActionType,
    /// The motivation that fired.
    pub motivation: Motivation,
    /// The agent's needs at the time of the request.
    pub needs: Vec<Need>,
}

/// Produces the textual payload of an action.
pub trait ContentGenerator: Send + Sync + 'static {
    /// Generate content for one action.
    fn generate(
        &self,
        request: &ContentRequest,
    ) -> impl Future<Output = Result<String, CollaboratorError>> + Send;
}

/// Deterministic generator that fills a fixed sentence from the request.
///
/// Used when no language model is wired in, and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateContentGenerator;

impl TemplateContentGenerator {
    /// Render the sentence for a request.
    pub fn render(request: &ContentRequest) -> String {
        let m = &request.motivation;
        let urgency = if m.critical { "urgently " } else { "" };
        format!(
            "{urgency}{impulse}: {action} ({need} at {value:.0}/{threshold:.0})",
            impulse = m.action_impulse,
            action = request.action_type,
            need = m.need_type,
            value = m.current_value,
            threshold = m.threshold,
        )
    }
}

impl ContentGenerator for TemplateContentGenerator {
    async fn generate(&self, request: &ContentRequest) -> Result<String, CollaboratorError> {
        Ok(Self::render(request))
    }
}

#[cfg(test)]
mod tests {
    use impulse_types::NeedType;

    use super::*;

    fn request(critical: bool) -> ContentRequest {
        ContentRequest {
            agent_id: AgentId::new(),
            action_type: ActionType::SendMessage,
            motivation: Motivation {
                need_type: NeedType::Communication,
                priority: 8,
                threshold: 70.0,
                current_value: 91.4,
                critical,
                action_impulse: String::from("reach out"),
            },
            needs: Vec::new(),
        }
    }

    #[test]
    fn renders_motivation() {
        assert_eq!(
            TemplateContentGenerator::render(&request(false)),
            "reach out: send_message (communication at 91/70)"
        );
        assert!(TemplateContentGenerator::render(&request(true)).starts_with("urgently "));
    }

    #[tokio::test]
    async fn generate_never_fails() {
        let out = TemplateContentGenerator.generate(&request(false)).await;
        assert!(out.is_ok());
    }
}
