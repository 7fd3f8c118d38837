//! Error types for the impulse-core crate.

use impulse_actions::ActionError;
use impulse_needs::NeedError;
use impulse_types::AgentId;

/// Failure reported by an external collaborator.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    /// The requested record does not exist.
    #[error("{what} not found")]
    NotFound {
        /// Description of the missing record.
        what: String,
    },

    /// The collaborator could not serve the request right now.
    #[error("{collaborator} unavailable: {reason}")]
    Unavailable {
        /// Which collaborator failed (`storage`, `content`, `notifier`).
        collaborator: &'static str,
        /// Description of the failure.
        reason: String,
    },

    /// An I/O failure inside the collaborator.
    #[error("collaborator I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}

impl CollaboratorError {
    /// Whether retrying the same request might succeed.
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Io { .. })
    }
}

/// Errors surfaced by [`Engine`](crate::engine::Engine) operations.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The agent is not registered with the engine.
    #[error("agent {agent_id} is not registered")]
    AgentNotFound {
        /// The unknown agent.
        agent_id: AgentId,
    },

    /// A need operation failed.
    #[error("need error: {source}")]
    Need {
        /// The underlying need error.
        #[from]
        source: NeedError,
    },

    /// A lifecycle or catalog operation failed.
    #[error("action error: {source}")]
    Action {
        /// The underlying action error.
        #[from]
        source: ActionError,
    },

    /// A collaborator failed.
    #[error("collaborator error: {source}")]
    Collaborator {
        /// The underlying collaborator error.
        #[from]
        source: CollaboratorError,
    },
}

impl EngineError {
    /// Whether the failure came from a collaborator that may recover.
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Collaborator { source } => source.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(CollaboratorError::Unavailable {
            collaborator: "content",
            reason: String::from("timeout"),
        }
        .is_transient());
        assert!(CollaboratorError::from(std::io::Error::other("disk")).is_transient());
        assert!(!CollaboratorError::NotFound {
            what: String::from("action"),
        }
        .is_transient());
    }

    #[test]
    fn engine_error_wraps_sources() {
        let agent_id = AgentId::new();
        let err = EngineError::from(ActionError::UnknownActionType(
            impulse_types::ActionType::Rest,
        ));
        assert!(err.to_string().contains("no catalog entry"));
        let err = EngineError::AgentNotFound { agent_id };
        assert!(err.to_string().contains(&agent_id.to_string()));
        assert!(!err.is_transient());
        let err = EngineError::from(CollaboratorError::Unavailable {
            collaborator: "storage",
            reason: String::from("connection reset"),
        });
        assert!(err.is_transient());
    }
}
