//! Notification/dispatch collaborator.
//!
//! Delivery happens after effects are final. A failed delivery is logged
//! and never rolls anything back.

use std::future::Future;

use impulse_types::AgentId;
use tracing::info;

use crate::error::CollaboratorError;

/// Delivers action content to whoever the agent is talking to.
pub trait Notifier: Send + Sync + 'static {
    /// Attempt delivery of `message` on behalf of `agent_id`.
    fn notify(
        &self,
        agent_id: AgentId,
        message: &str,
    ) -> impl Future<Output = Result<(), CollaboratorError>> + Send;
}

/// Notifier that writes each message to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    async fn notify(&self, agent_id: AgentId, message: &str) -> Result<(), CollaboratorError> {
        info!(agent_id = %agent_id, message, "delivering message");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_notifier_accepts_everything() {
        assert!(LogNotifier.notify(AgentId::new(), "hello").await.is_ok());
    }
}
