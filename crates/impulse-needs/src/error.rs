//! Error types for the impulse-needs crate.

use impulse_types::{AgentId, NeedType};

/// Errors that can occur during need operations.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NeedError {
    /// The agent has no need of the requested type. Default needs must be
    /// created before use.
    #[error("need not found: agent {agent_id} has no {need_type} need")]
    NotFound {
        /// The agent that was queried.
        agent_id: AgentId,
        /// The missing need type.
        need_type: NeedType,
    },

    /// A need configuration entry failed validation.
    #[error("invalid need configuration for {need_type}: {reason}")]
    InvalidConfig {
        /// The offending need type.
        need_type: NeedType,
        /// Description of what is wrong.
        reason: String,
    },
}
