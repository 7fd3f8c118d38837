//! Error types for the impulse-actions crate.

use impulse_needs::NeedError;
use impulse_types::{ActionId, ActionStatus, ActionType, AgentId};

/// Errors that can occur while building, resolving or transitioning actions.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    /// The lifecycle state machine does not permit this move.
    #[error("invalid transition for action {action_id}: {from} -> {to}")]
    InvalidTransition {
        /// The action that was asked to move.
        action_id: ActionId,
        /// Its status at the time.
        from: ActionStatus,
        /// The requested status.
        to: ActionStatus,
    },

    /// The agent already has a different action pending or in progress.
    #[error("agent {agent_id} is already performing action {active}")]
    AlreadyActive {
        /// The busy agent.
        agent_id: AgentId,
        /// The action occupying the slot.
        active: ActionId,
    },

    /// No action with the given id occupies the agent's slot.
    #[error("agent {agent_id} has no active action {action_id}")]
    NotActive {
        /// The agent that was queried.
        agent_id: AgentId,
        /// The action the caller expected.
        action_id: ActionId,
    },

    /// The catalog has no entry for the action type.
    #[error("no catalog entry for action type {0}")]
    UnknownActionType(ActionType),

    /// A catalog entry failed validation.
    #[error("invalid catalog entry for {action_type}: {reason}")]
    InvalidCatalog {
        /// The offending action type.
        action_type: ActionType,
        /// Description of what is wrong.
        reason: String,
    },

    /// A need lookup failed during resolution.
    #[error("need error: {source}")]
    Need {
        /// The underlying need error.
        #[from]
        source: NeedError,
    },
}
