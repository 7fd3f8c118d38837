//! Core entity structs: needs, actions, motivations, resolutions and events.
//!
//! Needs and actions are persisted through the storage collaborator and so
//! derive `Serialize`/`Deserialize`. Motivations are derived on demand and
//! never stored.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::enums::{
    ActionStatus, ActionType, EngineEventKind, FailureReason, NeedState, NeedType,
};
use crate::ids::{ActionId, AgentId, EventId};

/// A need is critical once its value reaches this multiple of its threshold.
pub const CRITICAL_MULTIPLIER: f64 = 1.5;

/// A need is critical once its frustration reaches this level.
pub const CRITICAL_FRUSTRATION: f64 = 70.0;

/// Upper bound of [`Need::frustration_level`].
pub const MAX_FRUSTRATION: f64 = 100.0;

// ---------------------------------------------------------------------------
// Need
// ---------------------------------------------------------------------------

/// A signed propagation weight from one need to another.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelatedNeed {
    /// The need that receives the propagated delta.
    pub need_type: NeedType,
    /// Multiplier applied to the source delta. Negative values dampen.
    pub influence_coefficient: f64,
}

/// One drive channel of one agent.
///
/// `(agent_id, need_type)` is unique. `current_value` always stays within
/// `[0, max_value]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Need {
    /// Owning agent.
    pub agent_id: AgentId,
    /// Which channel this is.
    pub need_type: NeedType,
    /// Current drive level, `0..=max_value`.
    pub current_value: f64,
    /// Ceiling of `current_value`. Always positive.
    pub max_value: f64,
    /// Units added per hour by the periodic tick.
    pub growth_rate: f64,
    /// Units removed per hour by the periodic tick.
    pub decay_rate: f64,
    /// Static ranking weight. Higher wins.
    pub priority: u32,
    /// Value at which the need becomes unfulfilled.
    pub threshold: f64,
    /// `0..=100`. Rises while unfulfilled, falls on satisfaction.
    pub frustration_level: f64,
    /// End of the current suppression window, if any.
    pub blocked_until: Option<DateTime<Utc>>,
    /// Why the need is suppressed.
    pub block_reason: Option<String>,
    /// Blocks applied since the need was last satisfied.
    pub consecutive_blocks_count: u32,
    /// One-hop influence targets.
    pub related_needs: Vec<RelatedNeed>,
    /// Derived condition.
    pub state: NeedState,
    /// Inactive needs ignore growth and decay.
    pub is_active: bool,
    /// Last time the value was mutated.
    pub last_updated: DateTime<Utc>,
    /// Last time the need was reset.
    pub last_satisfied: Option<DateTime<Utc>>,
}

impl Need {
    /// Whether the need is at or above its threshold.
    pub fn has_reached_threshold(&self) -> bool {
        self.current_value >= self.threshold
    }

    /// Whether a suppression window covers `now`.
    pub fn is_blocked(&self, now: DateTime<Utc>) -> bool {
        self.blocked_until.is_some_and(|until| now <= until)
    }

    /// Whether the need is far past threshold or heavily frustrated.
    pub fn is_critical(&self) -> bool {
        self.current_value >= self.threshold * CRITICAL_MULTIPLIER
            || self.frustration_level >= CRITICAL_FRUSTRATION
    }

    /// Clamp an arbitrary value into this need's legal range.
    ///
    /// A NaN or negative `max_value` collapses the range to zero.
    pub fn clamp_value(&self, value: f64) -> f64 {
        if value.is_nan() {
            return 0.0;
        }
        value.clamp(0.0, self.max_value.max(0.0))
    }

    /// Compute the state implied by the current fields.
    pub fn derive_state(&self, now: DateTime<Utc>) -> NeedState {
        if self.is_blocked(now) {
            NeedState::Blocked
        } else if self.is_critical() {
            NeedState::Critical
        } else if self.has_reached_threshold() {
            NeedState::Unfulfilled
        } else {
            NeedState::Satisfied
        }
    }
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// What an action yields when it succeeds.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PotentialReward {
    /// Delta applied to each need at full effectiveness.
    pub need_impacts: BTreeMap<NeedType, f64>,
    /// Short human-readable summary.
    pub description: String,
    /// Opaque parameters, e.g. a technique name and its arguments.
    #[serde(default)]
    pub payload: serde_json::Value,
}

/// One instance of scheduled or executing behavior.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterAction {
    /// Unique id.
    pub id: ActionId,
    /// The acting agent.
    pub agent_id: AgentId,
    /// Kind of behavior.
    pub action_type: ActionType,
    /// Lifecycle status.
    pub status: ActionStatus,
    /// Set on entering `in_progress` (or on interruption of a pending action).
    pub start_time: Option<DateTime<Utc>>,
    /// Set on reaching any terminal status.
    pub end_time: Option<DateTime<Utc>>,
    /// Planned elapsed time in milliseconds. Zero completes immediately.
    pub duration_ms: u64,
    /// The need the cost is drawn from.
    pub resource_need: NeedType,
    /// Amount drawn from `resource_need`.
    pub resource_cost: f64,
    /// `0..=100`.
    pub success_probability: f64,
    /// Applied only on success.
    pub potential_reward: PotentialReward,
    /// Needs this action is meant to address.
    pub related_needs: Vec<NeedType>,
    /// Generated content, once the content collaborator has produced it.
    pub content: Option<String>,
    /// Outcome, once resolved.
    pub resolution: Option<Resolution>,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl CharacterAction {
    /// Planned duration as a [`Duration`].
    pub const fn duration(&self) -> Duration {
        Duration::from_millis(self.duration_ms)
    }

    /// Percentage of the planned duration elapsed at `now`, in `[0, 100]`.
    ///
    /// Pending actions report 0. Terminal actions and zero-duration actions
    /// report 100.
    #[allow(clippy::cast_precision_loss)] // Millisecond durations are far below f64's exact range.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        if self.status.is_terminal() {
            return 100.0;
        }
        let Some(start) = self.start_time else {
            return 0.0;
        };
        if self.duration_ms == 0 {
            return 100.0;
        }
        let elapsed_ms = now.signed_duration_since(start).num_milliseconds().max(0);
        let pct = elapsed_ms as f64 / self.duration_ms as f64 * 100.0;
        pct.clamp(0.0, 100.0)
    }
}

/// Derived ranking entry for one unmet need. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Motivation {
    /// The unmet need.
    pub need_type: NeedType,
    /// The need's static priority.
    pub priority: u32,
    /// The need's threshold.
    pub threshold: f64,
    /// The need's value at derivation time.
    pub current_value: f64,
    /// Whether the need was critical at derivation time.
    pub critical: bool,
    /// Short descriptive label, e.g. `"seek rest"`.
    pub action_impulse: String,
}

/// A consequence of resolving an action, beyond the reward itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SideEffect {
    /// The action's cost was drawn from the resource need.
    ResourceSpent {
        /// Resource need.
        need_type: NeedType,
        /// Amount actually removed.
        amount: f64,
    },
    /// A failed action wasted extra resource.
    WastedResource {
        /// Resource need.
        need_type: NeedType,
        /// Amount actually removed.
        amount: f64,
    },
    /// Frustration rose after a failure.
    FrustrationRaised {
        /// Affected need.
        need_type: NeedType,
        /// Frustration after the increase.
        level: f64,
    },
    /// A need was blocked after a failure.
    NeedBlocked {
        /// Affected need.
        need_type: NeedType,
        /// Block length in hours.
        hours: f64,
    },
    /// A need was fully satisfied.
    NeedReset {
        /// Affected need.
        need_type: NeedType,
    },
    /// A delta rippled to a related need.
    InfluencePropagated {
        /// Need the delta originated from.
        from: NeedType,
        /// Need that received it.
        to: NeedType,
        /// Delta actually applied.
        delta: f64,
    },
}

/// Outcome of resolving one action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    /// Whether the action succeeded.
    pub success: bool,
    /// `0..=100` score of how the outcome matched the intended probability.
    pub effectiveness: f64,
    /// The probability roll, absent when resolution failed fast.
    pub roll: Option<f64>,
    /// Set when `success` is false.
    pub failure: Option<FailureReason>,
    /// Consequences beyond the reward.
    pub side_effects: Vec<SideEffect>,
    /// Deltas actually applied from the reward map.
    pub actual_reward: BTreeMap<NeedType, f64>,
}

impl Resolution {
    /// A failed resolution that stopped before the probability roll.
    pub const fn insufficient_resource() -> Self {
        Self {
            success: false,
            effectiveness: 0.0,
            roll: None,
            failure: Some(FailureReason::ResourceInsufficient),
            side_effects: Vec::new(),
            actual_reward: BTreeMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A best-effort observability record emitted by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineEvent {
    /// Unique id.
    pub id: EventId,
    /// Agent the event concerns.
    pub agent_id: AgentId,
    /// What happened.
    pub kind: EngineEventKind,
    /// Related action, for lifecycle events.
    pub action_id: Option<ActionId>,
    /// When it happened.
    pub occurred_at: DateTime<Utc>,
    /// Kind-specific details.
    pub payload: serde_json::Value,
}

impl EngineEvent {
    /// Build an event with a fresh id.
    pub fn new(
        agent_id: AgentId,
        kind: EngineEventKind,
        action_id: Option<ActionId>,
        occurred_at: DateTime<Utc>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            id: EventId::new(),
            agent_id,
            kind,
            action_id,
            occurred_at,
            payload,
        }
    }
}
