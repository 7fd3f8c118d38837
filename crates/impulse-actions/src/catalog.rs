//! Action catalog: one table of defaults per action type.
//!
//! Cost, success probability, duration and reward are looked up here by
//! [`ActionType`] instead of being branched on inside the resolver. The
//! table deserializes from the `actions` section of `impulse-config.yaml`;
//! the built-in values below apply when the section is absent.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use impulse_types::{
    ActionId, ActionStatus, ActionType, AgentId, CharacterAction, NeedType, PotentialReward,
};
use serde::{Deserialize, Serialize};

use crate::error::ActionError;

/// Defaults for one action type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDefaults {
    /// Amount drawn from the resource need.
    pub resource_cost: f64,
    /// Chance of success, `0..=100`.
    pub success_probability: f64,
    /// Planned duration in seconds. Zero completes immediately.
    #[serde(default)]
    pub duration_secs: u64,
    /// Needs this action is meant to address, in preference order.
    #[serde(default)]
    pub addresses: Vec<NeedType>,
    /// Need deltas applied on success at full effectiveness.
    #[serde(default)]
    pub reward: BTreeMap<NeedType, f64>,
    /// Human-readable summary of the reward.
    #[serde(default)]
    pub description: String,
    /// Overrides the engine-wide resource need for this action type.
    #[serde(default)]
    pub resource_need: Option<NeedType>,
    /// Opaque parameters copied into the reward payload.
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ActionDefaults {
    fn validate(&self, action_type: ActionType) -> Result<(), ActionError> {
        let fail = |reason: &str| -> Result<(), ActionError> {
            Err(ActionError::InvalidCatalog {
                action_type,
                reason: reason.to_owned(),
            })
        };
        if !self.resource_cost.is_finite() || self.resource_cost < 0.0 {
            return fail("resource_cost must be non-negative");
        }
        if !(0.0..=100.0).contains(&self.success_probability) {
            return fail("success_probability must be within 0..=100");
        }
        if self.reward.values().any(|d| !d.is_finite()) {
            return fail("reward deltas must be finite");
        }
        Ok(())
    }
}

/// Lookup table from action type to defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionCatalog {
    entries: BTreeMap<ActionType, ActionDefaults>,
}

impl Default for ActionCatalog {
    fn default() -> Self {
        Self {
            entries: default_catalog(),
        }
    }
}

impl ActionCatalog {
    /// Build a catalog from explicit entries.
    pub const fn new(entries: BTreeMap<ActionType, ActionDefaults>) -> Self {
        Self { entries }
    }

    /// Check every entry.
    pub fn validate(&self) -> Result<(), ActionError> {
        for (&action_type, defaults) in &self.entries {
            defaults.validate(action_type)?;
        }
        Ok(())
    }

    /// Defaults for one action type.
    pub fn get(&self, action_type: ActionType) -> Result<&ActionDefaults, ActionError> {
        self.entries
            .get(&action_type)
            .ok_or(ActionError::UnknownActionType(action_type))
    }

    /// The first action type (in `ActionType` order) that addresses `need`.
    pub fn action_for(&self, need: NeedType) -> Option<ActionType> {
        self.entries
            .iter()
            .find(|(_, d)| d.addresses.contains(&need))
            .map(|(&t, _)| t)
    }

    /// Instantiate a pending action of `action_type` for `agent_id`.
    ///
    /// `default_resource_need` is used unless the entry overrides it.
    /// `addressing` is recorded as the action's related need when given,
    /// otherwise the entry's `addresses` list is used.
    pub fn build(
        &self,
        agent_id: AgentId,
        action_type: ActionType,
        addressing: Option<NeedType>,
        default_resource_need: NeedType,
        now: DateTime<Utc>,
    ) -> Result<CharacterAction, ActionError> {
        let d = self.get(action_type)?;
        let related_needs = addressing.map_or_else(|| d.addresses.clone(), |n| vec![n]);
        Ok(CharacterAction {
            id: ActionId::new(),
            agent_id,
            action_type,
            status: ActionStatus::Pending,
            start_time: None,
            end_time: None,
            duration_ms: d.duration_secs.saturating_mul(1000),
            resource_need: d.resource_need.unwrap_or(default_resource_need),
            resource_cost: d.resource_cost,
            success_probability: d.success_probability,
            potential_reward: PotentialReward {
                need_impacts: d.reward.clone(),
                description: d.description.clone(),
                payload: d.payload.clone(),
            },
            related_needs,
            content: None,
            resolution: None,
            created_at: now,
        })
    }
}

/// Shorthand for a catalog row.
fn entry(
    resource_cost: f64,
    success_probability: f64,
    duration_secs: u64,
    addresses: &[NeedType],
    reward: &[(NeedType, f64)],
    description: &str,
) -> ActionDefaults {
    ActionDefaults {
        resource_cost,
        success_probability,
        duration_secs,
        addresses: addresses.to_vec(),
        reward: reward.iter().copied().collect(),
        description: description.to_owned(),
        resource_need: None,
        payload: serde_json::Value::Null,
    }
}

/// The built-in action table.
fn default_catalog() -> BTreeMap<ActionType, ActionDefaults> {
    let mut technique = entry(
        30.0,
        40.0,
        600,
        &[],
        &[(NeedType::Recognition, -30.0), (NeedType::Control, -30.0)],
        "a technique lands as intended",
    );
    technique.payload = serde_json::json!({ "technique": null, "parameters": {} });

    BTreeMap::from([
        (
            ActionType::SendMessage,
            entry(
                10.0,
                80.0,
                60,
                &[NeedType::Communication],
                &[(NeedType::Communication, -60.0), (NeedType::Attention, -10.0)],
                "the message is read",
            ),
        ),
        (
            ActionType::Rest,
            entry(0.0, 95.0, 1800, &[NeedType::Rest], &[(NeedType::Rest, -70.0)], "recovered"),
        ),
        (
            ActionType::Reflect,
            entry(
                5.0,
                90.0,
                300,
                &[NeedType::Security],
                &[(NeedType::Security, -40.0), (NeedType::Recognition, -10.0)],
                "settled on a clearer picture",
            ),
        ),
        (
            ActionType::Explore,
            entry(
                25.0,
                70.0,
                900,
                &[NeedType::Novelty],
                &[(NeedType::Novelty, -60.0)],
                "found something new",
            ),
        ),
        (
            ActionType::SeekAttention,
            entry(
                15.0,
                60.0,
                120,
                &[NeedType::Attention, NeedType::Recognition],
                &[(NeedType::Attention, -50.0), (NeedType::Recognition, -20.0)],
                "got noticed",
            ),
        ),
        (
            ActionType::AssertControl,
            entry(
                20.0,
                50.0,
                300,
                &[NeedType::Control],
                &[(NeedType::Control, -50.0)],
                "the interaction follows the lead",
            ),
        ),
        (ActionType::ApplyTechnique, technique),
    ])
}
