//! Configuration defaults for the need model.
//!
//! [`NeedConfig`] bundles every tunable of the drive simulation so that
//! callers (the engine, tests) can override defaults. It deserializes from
//! the `needs` section of `impulse-config.yaml`; every field falls back to
//! the values below when omitted.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use impulse_types::{AgentId, Need, NeedState, NeedType, RelatedNeed};
use serde::{Deserialize, Serialize};

use crate::error::NeedError;

/// Tunables of the drive simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedConfig {
    /// Need that actions draw their resource cost from unless they say
    /// otherwise (default: `energy`).
    #[serde(default = "default_resource_need")]
    pub resource_need: NeedType,

    /// Frustration removed by a reset (default: 20).
    #[serde(default = "default_frustration_decrement")]
    pub frustration_decrement: f64,

    /// Frustration added per hour while a need stays unfulfilled (default: 10).
    #[serde(default = "default_frustration_rate")]
    pub frustration_rate_per_hour: f64,

    /// Initial parameters for each need channel.
    #[serde(default = "default_need_table")]
    pub defaults: BTreeMap<NeedType, NeedDefaults>,
}

impl Default for NeedConfig {
    fn default() -> Self {
        Self {
            resource_need: default_resource_need(),
            frustration_decrement: default_frustration_decrement(),
            frustration_rate_per_hour: default_frustration_rate(),
            defaults: default_need_table(),
        }
    }
}

impl NeedConfig {
    /// Check every entry for values the need model cannot honor.
    pub fn validate(&self) -> Result<(), NeedError> {
        for (&need_type, defaults) in &self.defaults {
            defaults.validate(need_type)?;
        }
        if !self.defaults.contains_key(&self.resource_need) {
            return Err(NeedError::InvalidConfig {
                need_type: self.resource_need,
                reason: String::from("resource need has no default entry"),
            });
        }
        Ok(())
    }

    /// Build the initial need set for a freshly instantiated agent.
    pub fn instantiate(&self, agent_id: AgentId, now: DateTime<Utc>) -> Vec<Need> {
        self.defaults
            .iter()
            .map(|(&need_type, d)| d.instantiate(agent_id, need_type, now))
            .collect()
    }
}

/// Initial parameters of one need channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeedDefaults {
    /// Ceiling of the need value. Must be positive.
    pub max_value: f64,
    /// Starting value, clamped into `[0, max_value]`.
    #[serde(default)]
    pub initial_value: f64,
    /// Units added per hour.
    pub growth_rate: f64,
    /// Units removed per hour.
    #[serde(default)]
    pub decay_rate: f64,
    /// Ranking weight.
    pub priority: u32,
    /// Value at which the need becomes unfulfilled.
    pub threshold: f64,
    /// One-hop influence targets.
    #[serde(default)]
    pub related: Vec<RelatedNeed>,
    /// Whether the periodic tick moves this need at all.
    #[serde(default = "default_true")]
    pub is_active: bool,
}

impl NeedDefaults {
    fn validate(&self, need_type: NeedType) -> Result<(), NeedError> {
        let fail = |reason: &str| -> Result<(), NeedError> {
            Err(NeedError::InvalidConfig {
                need_type,
                reason: reason.to_owned(),
            })
        };
        if !(self.max_value.is_finite() && self.max_value > 0.0) {
            return fail("max_value must be a positive number");
        }
        if !self.threshold.is_finite() || self.threshold < 0.0 {
            return fail("threshold must be non-negative");
        }
        if !self.growth_rate.is_finite() || self.growth_rate < 0.0 {
            return fail("growth_rate must be non-negative");
        }
        if !self.decay_rate.is_finite() || self.decay_rate < 0.0 {
            return fail("decay_rate must be non-negative");
        }
        if self.related.iter().any(|r| r.need_type == need_type) {
            return fail("a need cannot influence itself");
        }
        Ok(())
    }

    fn instantiate(&self, agent_id: AgentId, need_type: NeedType, now: DateTime<Utc>) -> Need {
        let mut need = Need {
            agent_id,
            need_type,
            current_value: 0.0,
            max_value: self.max_value,
            growth_rate: self.growth_rate,
            decay_rate: self.decay_rate,
            priority: self.priority,
            threshold: self.threshold,
            frustration_level: 0.0,
            blocked_until: None,
            block_reason: None,
            consecutive_blocks_count: 0,
            related_needs: self.related.clone(),
            state: NeedState::Satisfied,
            is_active: self.is_active,
            last_updated: now,
            last_satisfied: None,
        };
        need.current_value = need.clamp_value(self.initial_value);
        need.state = need.derive_state(now);
        need
    }
}

const fn default_resource_need() -> NeedType {
    NeedType::Energy
}

const fn default_frustration_decrement() -> f64 {
    20.0
}

const fn default_frustration_rate() -> f64 {
    10.0
}

const fn default_true() -> bool {
    true
}

/// Shorthand for a default-table row.
fn row(
    initial_value: f64,
    growth_rate: f64,
    decay_rate: f64,
    priority: u32,
    threshold: f64,
    related: &[(NeedType, f64)],
) -> NeedDefaults {
    NeedDefaults {
        max_value: 100.0,
        initial_value,
        growth_rate,
        decay_rate,
        priority,
        threshold,
        related: related
            .iter()
            .map(|&(need_type, influence_coefficient)| RelatedNeed {
                need_type,
                influence_coefficient,
            })
            .collect(),
        is_active: true,
    }
}

/// The built-in need table.
///
/// Energy behaves as the spendable resource: it regenerates over time and
/// actions draw from it. Every other channel is a drive that builds up.
pub fn default_need_table() -> BTreeMap<NeedType, NeedDefaults> {
    BTreeMap::from([
        (NeedType::Rest, row(20.0, 4.0, 0.0, 6, 80.0, &[(NeedType::Energy, -0.5)])),
        (NeedType::Energy, row(80.0, 6.0, 0.0, 1, 100.0, &[])),
        (
            NeedType::Communication,
            row(30.0, 8.0, 0.0, 8, 70.0, &[(NeedType::Attention, 0.3)]),
        ),
        (
            NeedType::Attention,
            row(20.0, 5.0, 0.0, 6, 75.0, &[(NeedType::Recognition, 0.2)]),
        ),
        (NeedType::Recognition, row(10.0, 3.0, 0.0, 4, 80.0, &[])),
        (
            NeedType::Control,
            row(10.0, 2.0, 0.0, 5, 85.0, &[(NeedType::Security, -0.3)]),
        ),
        (NeedType::Novelty, row(30.0, 6.0, 1.0, 3, 70.0, &[])),
        (NeedType::Security, row(10.0, 1.0, 2.0, 7, 60.0, &[])),
    ])
}
