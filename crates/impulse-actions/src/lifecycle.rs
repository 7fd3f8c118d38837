//! Per-agent action slot and lifecycle state machine.
//!
//! ```text
//! pending -> in_progress -> completed | failed
//! pending | in_progress -> interrupted
//! ```
//!
//! An [`ActionSlot`] holds at most one non-terminal action. That is the
//! single-active-action invariant: a second action is rejected while the
//! slot is occupied. Terminal actions move into a bounded history.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use impulse_needs::NeedBook;
use impulse_types::{ActionId, ActionStatus, AgentId, CharacterAction, Resolution};
use tracing::{debug, error, info};

use crate::error::ActionError;

/// Number of terminal actions kept per agent.
pub const HISTORY_LIMIT: usize = 64;

/// The active-action slot of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionSlot {
    agent_id: AgentId,
    current: Option<CharacterAction>,
    history: VecDeque<CharacterAction>,
    history_limit: usize,
}

/// Log and build an `InvalidTransition` error.
fn invalid_transition(action_id: ActionId, from: ActionStatus, to: ActionStatus) -> ActionError {
    error!(%action_id, %from, %to, "rejected illegal action transition");
    ActionError::InvalidTransition {
        action_id,
        from,
        to,
    }
}

impl ActionSlot {
    /// An empty slot with the default history bound.
    pub fn new(agent_id: AgentId) -> Self {
        Self::with_history_limit(agent_id, HISTORY_LIMIT)
    }

    /// An empty slot keeping at most `limit` terminal actions.
    pub fn with_history_limit(agent_id: AgentId, limit: usize) -> Self {
        Self {
            agent_id,
            current: None,
            history: VecDeque::with_capacity(limit.min(HISTORY_LIMIT)),
            history_limit: limit,
        }
    }

    /// Owner of the slot.
    pub const fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// The pending or in-progress action, if any.
    pub const fn current(&self) -> Option<&CharacterAction> {
        self.current.as_ref()
    }

    /// Whether an action is in progress.
    pub fn is_performing(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|a| a.status == ActionStatus::InProgress)
    }

    /// Whether any action, pending or in progress, holds the slot.
    pub const fn is_occupied(&self) -> bool {
        self.current.is_some()
    }

    /// Progress of the current action, 0 when the slot is empty.
    pub fn progress(&self, now: DateTime<Utc>) -> f64 {
        self.current.as_ref().map_or(0.0, |a| a.progress(now))
    }

    /// Terminal actions, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &CharacterAction> {
        self.history.iter()
    }

    /// Whether `candidate` could start now.
    ///
    /// False while another action holds the slot, or when the candidate's
    /// resource need holds less than its cost. A pending action may be
    /// checked against its own slot.
    pub fn can_execute(&self, book: &NeedBook, candidate: &CharacterAction) -> bool {
        if self
            .current
            .as_ref()
            .is_some_and(|a| a.id != candidate.id || a.status != ActionStatus::Pending)
        {
            return false;
        }
        book.get(candidate.resource_need)
            .is_ok_and(|n| n.current_value >= candidate.resource_cost)
    }

    /// Place a pending action in the empty slot.
    pub fn stage(&mut self, action: CharacterAction) -> Result<(), ActionError> {
        if let Some(active) = &self.current {
            return Err(ActionError::AlreadyActive {
                agent_id: self.agent_id,
                active: active.id,
            });
        }
        if action.status != ActionStatus::Pending {
            return Err(invalid_transition(action.id, action.status, ActionStatus::Pending));
        }
        debug!(agent_id = %self.agent_id, action_id = %action.id, action = %action.action_type, "action staged");
        self.current = Some(action);
        Ok(())
    }

    /// Replace the content of the pending or in-progress action.
    pub fn attach_content(&mut self, action_id: ActionId, content: String) -> Result<(), ActionError> {
        match self.current.as_mut() {
            Some(a) if a.id == action_id => {
                a.content = Some(content);
                Ok(())
            }
            _ => Err(ActionError::NotActive {
                agent_id: self.agent_id,
                action_id,
            }),
        }
    }

    /// Move `action` to `in_progress` with `start_time = now`.
    ///
    /// A pending action already staged under the same id is promoted; the
    /// incoming copy replaces it. A different action holding the slot is
    /// rejected with [`ActionError::AlreadyActive`].
    pub fn begin(
        &mut self,
        mut action: CharacterAction,
        now: DateTime<Utc>,
    ) -> Result<&CharacterAction, ActionError> {
        if let Some(active) = &self.current {
            if active.id != action.id {
                return Err(ActionError::AlreadyActive {
                    agent_id: self.agent_id,
                    active: active.id,
                });
            }
            if active.status != ActionStatus::Pending {
                return Err(invalid_transition(active.id, active.status, ActionStatus::InProgress));
            }
        }
        if !action.status.can_transition_to(ActionStatus::InProgress) {
            return Err(invalid_transition(action.id, action.status, ActionStatus::InProgress));
        }
        if action.agent_id != self.agent_id {
            return Err(ActionError::NotActive {
                agent_id: self.agent_id,
                action_id: action.id,
            });
        }

        action.status = ActionStatus::InProgress;
        action.start_time = Some(now);
        info!(
            agent_id = %self.agent_id,
            action_id = %action.id,
            action = %action.action_type,
            duration_ms = action.duration_ms,
            "action started"
        );
        Ok(&*self.current.insert(action))
    }

    /// Record the resolution of the in-progress action `action_id` and free
    /// the slot. Returns the terminal action.
    pub fn finish(
        &mut self,
        action_id: ActionId,
        resolution: Resolution,
        now: DateTime<Utc>,
    ) -> Result<CharacterAction, ActionError> {
        let Some(active) = self.current.as_ref().filter(|a| a.id == action_id) else {
            return Err(ActionError::NotActive {
                agent_id: self.agent_id,
                action_id,
            });
        };
        let to = if resolution.success {
            ActionStatus::Completed
        } else {
            ActionStatus::Failed
        };
        if !active.status.can_transition_to(to) {
            return Err(invalid_transition(action_id, active.status, to));
        }

        let Some(mut action) = self.current.take() else {
            return Err(ActionError::NotActive {
                agent_id: self.agent_id,
                action_id,
            });
        };
        action.status = to;
        action.end_time = Some(now);
        action.resolution = Some(resolution);
        info!(
            agent_id = %self.agent_id,
            action_id = %action.id,
            status = %action.status,
            "action finished"
        );
        self.record(action.clone());
        Ok(action)
    }

    /// Interrupt whatever holds the slot.
    ///
    /// Returns the interrupted action, or `None` when the slot was empty.
    /// A pending action that never started gets `start_time = now` so every
    /// terminal action carries both timestamps.
    pub fn interrupt(&mut self, now: DateTime<Utc>) -> Option<CharacterAction> {
        let mut action = self.current.take()?;
        action.status = ActionStatus::Interrupted;
        action.start_time.get_or_insert(now);
        action.end_time = Some(now);
        info!(agent_id = %self.agent_id, action_id = %action.id, "action interrupted");
        self.record(action.clone());
        Some(action)
    }

    /// Drop the pending action `action_id` without recording it.
    ///
    /// Used when an action never got off the ground, e.g. its content could
    /// not be generated. In-progress actions must be interrupted instead.
    pub fn withdraw(&mut self, action_id: ActionId) -> Option<CharacterAction> {
        let pending = self
            .current
            .as_ref()
            .is_some_and(|a| a.id == action_id && a.status == ActionStatus::Pending);
        if !pending {
            return None;
        }
        debug!(agent_id = %self.agent_id, %action_id, "pending action withdrawn");
        self.current.take()
    }

    fn record(&mut self, action: CharacterAction) {
        if self.history_limit == 0 {
            return;
        }
        while self.history.len() >= self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(action);
    }
}
