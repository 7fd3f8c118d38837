//! Enumeration types for the impulse engine.
//!
//! Need channels, need states, action kinds, the action lifecycle status
//! and the kinds of events the engine emits. Every enum serializes in
//! `snake_case` so configuration files and event payloads read naturally.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Needs
// ---------------------------------------------------------------------------

/// A drive channel tracked per agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedType {
    /// Pressure to stop and recover.
    Rest,
    /// Spendable capacity. Actions draw their resource cost from it by default.
    Energy,
    /// Urge to reach out and exchange messages.
    Communication,
    /// Desire to be noticed.
    Attention,
    /// Desire for acknowledgement of past actions.
    Recognition,
    /// Desire to steer the course of an interaction.
    Control,
    /// Appetite for new stimulus.
    Novelty,
    /// Desire for a predictable, safe situation.
    Security,
}

impl NeedType {
    /// Every need channel, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Rest,
        Self::Energy,
        Self::Communication,
        Self::Attention,
        Self::Recognition,
        Self::Control,
        Self::Novelty,
        Self::Security,
    ];

    /// Stable lowercase name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rest => "rest",
            Self::Energy => "energy",
            Self::Communication => "communication",
            Self::Attention => "attention",
            Self::Recognition => "recognition",
            Self::Control => "control",
            Self::Novelty => "novelty",
            Self::Security => "security",
        }
    }
}

impl core::fmt::Display for NeedType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Derived condition of a need, recomputed after every mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NeedState {
    /// Below threshold.
    #[default]
    Satisfied,
    /// At or above threshold and eligible to drive an action.
    Unfulfilled,
    /// Suppressed until `blocked_until` passes or it is explicitly unblocked.
    Blocked,
    /// Far above threshold or heavily frustrated.
    Critical,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Kind of behavior an action represents.
///
/// Cost, probability, duration and reward defaults for each kind live in
/// the action catalog, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Compose and deliver a message.
    SendMessage,
    /// Idle and recover.
    Rest,
    /// Review recent outcomes.
    Reflect,
    /// Look for something new.
    Explore,
    /// Try to draw attention.
    SeekAttention,
    /// Try to steer the interaction.
    AssertControl,
    /// Apply a named technique with parameters carried in the reward payload.
    ApplyTechnique,
}

impl ActionType {
    /// Stable lowercase name, matching the serialized form.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::SendMessage => "send_message",
            Self::Rest => "rest",
            Self::Reflect => "reflect",
            Self::Explore => "explore",
            Self::SeekAttention => "seek_attention",
            Self::AssertControl => "assert_control",
            Self::ApplyTechnique => "apply_technique",
        }
    }
}

impl core::fmt::Display for ActionType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a [`CharacterAction`](crate::CharacterAction).
///
/// ```text
/// pending -> in_progress -> completed | failed
/// pending | in_progress -> interrupted
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionStatus {
    /// Created, not yet started.
    #[default]
    Pending,
    /// Started and awaiting completion.
    InProgress,
    /// Finished with a successful resolution.
    Completed,
    /// Finished with a failed resolution.
    Failed,
    /// Cancelled before it finished.
    Interrupted,
}

impl ActionStatus {
    /// Whether no further transition is possible from this status.
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Interrupted)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::InProgress | Self::Interrupted)
                | (
                    Self::InProgress,
                    Self::Completed | Self::Failed | Self::Interrupted
                )
        )
    }
}

impl core::fmt::Display for ActionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Interrupted => "interrupted",
        };
        f.write_str(s)
    }
}

/// Why a resolution did not succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The resource need held less than the action's cost. No roll was made.
    ResourceInsufficient,
    /// The probability roll exceeded the success probability.
    RollFailed,
}

impl core::fmt::Display for FailureReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ResourceInsufficient => f.write_str("insufficient resource"),
            Self::RollFailed => f.write_str("roll failed"),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Kind of observability event emitted by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineEventKind {
    /// An action entered `in_progress`.
    ActionStarted,
    /// An action reached `completed` or `failed`.
    ActionCompleted,
    /// An action was interrupted.
    ActionInterrupted,
    /// A need rose past its threshold.
    NeedThresholdCrossed,
}
