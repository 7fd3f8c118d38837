//! Execution resolver: resource check, probability roll, effects.
//!
//! # Order of operations
//!
//! 1. Verify the resource need holds at least `resource_cost`. If not, fail
//!    fast with [`FailureReason::ResourceInsufficient`] and touch nothing.
//! 2. Draw `r` in `[0, 100)`; success when `r <= success_probability`.
//! 3. Effectiveness is `50 + (p - r)` on success and `r - p` on failure,
//!    both clamped to `[0, 100]`.
//! 4. On success apply the reward map scaled by effectiveness, propagate
//!    each applied delta one hop, and reset the addressed needs when the
//!    outcome was effective enough. On failure waste extra resource, raise
//!    frustration and briefly block the addressed needs.
//! 5. Deduct `resource_cost` regardless of outcome. On failure the cost is
//!    drawn before the wasted penalty, so the full cost is always reported.
//!
//! A missing resource or addressed need is reported before any of this.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use impulse_needs::{NeedBook, NeedError};
use impulse_types::{CharacterAction, FailureReason, Resolution, SideEffect};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::roll::{ROLL_MAX, RollSource};

/// Tunables for the consequences of a resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionPolicy {
    /// Extra amount drawn from the resource need on failure (default: 5).
    #[serde(default = "default_wasted_resource_penalty")]
    pub wasted_resource_penalty: f64,
    /// Frustration added to each addressed need on failure (default: 10).
    #[serde(default = "default_failure_frustration")]
    pub failure_frustration: f64,
    /// Hours each addressed need is blocked after a failure (default: 0.5).
    /// Zero disables the block.
    #[serde(default = "default_failure_block_hours")]
    pub failure_block_hours: f64,
    /// Effectiveness at or above which addressed needs are fully reset
    /// (default: 75).
    #[serde(default = "default_reset_effectiveness")]
    pub reset_effectiveness: f64,
}

impl Default for ResolutionPolicy {
    fn default() -> Self {
        Self {
            wasted_resource_penalty: default_wasted_resource_penalty(),
            failure_frustration: default_failure_frustration(),
            failure_block_hours: default_failure_block_hours(),
            reset_effectiveness: default_reset_effectiveness(),
        }
    }
}

const fn default_wasted_resource_penalty() -> f64 {
    5.0
}

const fn default_failure_frustration() -> f64 {
    10.0
}

const fn default_failure_block_hours() -> f64 {
    0.5
}

const fn default_reset_effectiveness() -> f64 {
    75.0
}

/// Effectiveness score for a roll against a probability.
pub fn effectiveness(success: bool, probability: f64, roll: f64) -> f64 {
    let raw = if success {
        50.0 + (probability - roll)
    } else {
        roll - probability
    };
    raw.clamp(0.0, 100.0)
}

/// Resolve `action` against `book`, mutating the book with its effects.
///
/// Insufficient resource is a normal failed [`Resolution`], not an error.
/// Errors are reserved for a missing resource need or addressed need, and
/// are raised before the book is touched.
pub fn resolve<R: RollSource + ?Sized>(
    book: &mut NeedBook,
    action: &CharacterAction,
    policy: &ResolutionPolicy,
    rng: &mut R,
    now: DateTime<Utc>,
) -> Result<Resolution, NeedError> {
    let available = book.get(action.resource_need)?.current_value;
    for &need_type in &action.related_needs {
        book.get(need_type)?;
    }
    if available < action.resource_cost {
        debug!(
            agent_id = %action.agent_id,
            action_id = %action.id,
            resource = %action.resource_need,
            available,
            cost = action.resource_cost,
            "insufficient resource, skipping roll"
        );
        return Ok(Resolution::insufficient_resource());
    }

    let roll = {
        let r = rng.roll();
        if r.is_finite() { r.clamp(0.0, ROLL_MAX) } else { ROLL_MAX }
    };
    let success = roll <= action.success_probability;
    let effectiveness = effectiveness(success, action.success_probability, roll);

    let mut side_effects = Vec::new();
    let mut actual_reward = BTreeMap::new();

    if success {
        let scale = effectiveness / 100.0;
        for (&need_type, &delta) in &action.potential_reward.need_impacts {
            if book.get(need_type).is_err() {
                warn!(
                    agent_id = %action.agent_id,
                    action_id = %action.id,
                    need = %need_type,
                    "reward targets a need the agent does not have"
                );
                continue;
            }
            let applied = book.update_level(need_type, delta * scale, now)?;
            actual_reward.insert(need_type, applied);
            for (to, d) in book.propagate_influence(need_type, applied, now)? {
                side_effects.push(SideEffect::InfluencePropagated {
                    from: need_type,
                    to,
                    delta: d,
                });
            }
        }
        if effectiveness >= policy.reset_effectiveness {
            for &need_type in &action.related_needs {
                book.reset(need_type, now)?;
                side_effects.push(SideEffect::NeedReset { need_type });
            }
        }
        side_effects.push(spend(book, action, now)?);
    } else {
        side_effects.push(spend(book, action, now)?);
        let wasted = book.update_level(action.resource_need, -policy.wasted_resource_penalty, now)?;
        side_effects.push(SideEffect::WastedResource {
            need_type: action.resource_need,
            amount: -wasted,
        });
        for &need_type in &action.related_needs {
            let level = book.add_frustration(need_type, policy.failure_frustration, now)?;
            side_effects.push(SideEffect::FrustrationRaised { need_type, level });
            if policy.failure_block_hours > 0.0 {
                book.block_for(need_type, policy.failure_block_hours, "action failed", now)?;
                side_effects.push(SideEffect::NeedBlocked {
                    need_type,
                    hours: policy.failure_block_hours,
                });
            }
        }
    }

    debug!(
        agent_id = %action.agent_id,
        action_id = %action.id,
        roll,
        success,
        effectiveness,
        "action resolved"
    );

    Ok(Resolution {
        success,
        effectiveness,
        roll: Some(roll),
        failure: (!success).then_some(FailureReason::RollFailed),
        side_effects,
        actual_reward,
    })
}

/// Deduct the action's cost from its resource need.
fn spend(
    book: &mut NeedBook,
    action: &CharacterAction,
    now: DateTime<Utc>,
) -> Result<SideEffect, NeedError> {
    let spent = book.update_level(action.resource_need, -action.resource_cost, now)?;
    Ok(SideEffect::ResourceSpent {
        need_type: action.resource_need,
        amount: -spent,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use impulse_needs::{FrustrationPolicy, NeedConfig};
    use impulse_types::{
        ActionId, ActionStatus, ActionType, AgentId, Need, NeedState, NeedType, PotentialReward,
    };

    use super::*;
    use crate::roll::{FixedRoll, SeededRoll};

    const EPS: f64 = 1e-9;

    fn need(agent_id: AgentId, need_type: NeedType, value: f64) -> Need {
        Need {
            agent_id,
            need_type,
            current_value: value,
            max_value: 100.0,
            growth_rate: 0.0,
            decay_rate: 0.0,
            priority: 5,
            threshold: 80.0,
            frustration_level: 0.0,
            blocked_until: None,
            block_reason: None,
            consecutive_blocks_count: 0,
            related_needs: Vec::new(),
            state: NeedState::Satisfied,
            is_active: true,
            last_updated: Utc::now(),
            last_satisfied: None,
        }
    }

    fn book(agent: AgentId, needs: Vec<Need>) -> NeedBook {
        NeedBook::from_needs(agent, needs, FrustrationPolicy::from(&NeedConfig::default()))
    }

    fn action(agent_id: AgentId, resource_need: NeedType, cost: f64, p: f64) -> CharacterAction {
        CharacterAction {
            id: ActionId::new(),
            agent_id,
            action_type: ActionType::Rest,
            status: ActionStatus::InProgress,
            start_time: Some(Utc::now()),
            end_time: None,
            duration_ms: 0,
            resource_need,
            resource_cost: cost,
            success_probability: p,
            potential_reward: PotentialReward {
                need_impacts: BTreeMap::from([(NeedType::Communication, -40.0)]),
                description: String::new(),
                payload: serde_json::Value::Null,
            },
            related_needs: vec![NeedType::Communication],
            content: None,
            resolution: None,
            created_at: Utc::now(),
        }
    }

    /// A roll source that fails the test if it is ever consulted.
    struct NoRoll;

    impl RollSource for NoRoll {
        fn roll(&mut self) -> f64 {
            panic!("roll must not be drawn");
        }
    }

    #[test]
    fn insufficient_resource_fails_fast() {
        let agent = AgentId::new();
        let mut b = book(
            agent,
            vec![need(agent, NeedType::Rest, 10.0), need(agent, NeedType::Communication, 90.0)],
        );
        let before = b.clone();
        let a = action(agent, NeedType::Rest, 20.0, 80.0);
        let res = resolve(&mut b, &a, &ResolutionPolicy::default(), &mut NoRoll, Utc::now()).unwrap();
        assert!(!res.success);
        assert_eq!(res.failure, Some(FailureReason::ResourceInsufficient));
        assert!(res.roll.is_none());
        assert!(res.side_effects.is_empty());
        assert_eq!(b, before);
    }

    #[test]
    fn roll_of_fifty_against_eighty_succeeds() {
        let agent = AgentId::new();
        let mut b = book(
            agent,
            vec![need(agent, NeedType::Energy, 100.0), need(agent, NeedType::Communication, 90.0)],
        );
        let a = action(agent, NeedType::Energy, 20.0, 80.0);
        let res = resolve(&mut b, &a, &ResolutionPolicy::default(), &mut FixedRoll(50.0), Utc::now())
            .unwrap();
        assert!(res.success);
        assert!((res.effectiveness - 80.0).abs() < EPS);
        assert_eq!(res.roll, Some(50.0));
        assert!(res.failure.is_none());
        // Reward scaled by 0.8, then reset because 80 >= 75.
        let applied = res.actual_reward.get(&NeedType::Communication).copied().unwrap();
        assert!((applied + 32.0).abs() < EPS);
        assert!(b.get(NeedType::Communication).unwrap().current_value.abs() < EPS);
        assert!((b.get(NeedType::Energy).unwrap().current_value - 80.0).abs() < EPS);
    }

    #[test]
    fn roll_equal_to_probability_succeeds() {
        let agent = AgentId::new();
        let mut b = book(agent, vec![need(agent, NeedType::Energy, 100.0), need(agent, NeedType::Communication, 90.0)]);
        let a = action(agent, NeedType::Energy, 0.0, 40.0);
        let res = resolve(&mut b, &a, &ResolutionPolicy::default(), &mut FixedRoll(40.0), Utc::now())
            .unwrap();
        assert!(res.success);
        assert!((res.effectiveness - 50.0).abs() < EPS);
    }

    #[test]
    fn partial_success_does_not_reset() {
        let agent = AgentId::new();
        let mut b = book(agent, vec![need(agent, NeedType::Energy, 100.0), need(agent, NeedType::Communication, 90.0)]);
        let a = action(agent, NeedType::Energy, 0.0, 60.0);
        // effectiveness = 50 + (60 - 55) = 55
        let res = resolve(&mut b, &a, &ResolutionPolicy::default(), &mut FixedRoll(55.0), Utc::now())
            .unwrap();
        assert!(res.success);
        assert!((b.get(NeedType::Communication).unwrap().current_value - 68.0).abs() < EPS);
        assert!(!res.side_effects.iter().any(|e| matches!(e, SideEffect::NeedReset { .. })));
    }

    #[test]
    fn failure_wastes_resource_and_blocks() {
        let agent = AgentId::new();
        let now = Utc::now();
        let mut b = book(agent, vec![need(agent, NeedType::Energy, 50.0), need(agent, NeedType::Communication, 90.0)]);
        let a = action(agent, NeedType::Energy, 20.0, 30.0);
        let res = resolve(&mut b, &a, &ResolutionPolicy::default(), &mut FixedRoll(90.0), now).unwrap();
        assert!(!res.success);
        assert_eq!(res.failure, Some(FailureReason::RollFailed));
        assert!((res.effectiveness - 60.0).abs() < EPS);
        assert!(res.actual_reward.is_empty());
        // 50 - 5 wasted - 20 cost
        assert!((b.get(NeedType::Energy).unwrap().current_value - 25.0).abs() < EPS);
        let comm = b.get(NeedType::Communication).unwrap();
        assert!((comm.current_value - 90.0).abs() < EPS);
        assert!((comm.frustration_level - 10.0).abs() < EPS);
        assert!(comm.is_blocked(now));
    }

    #[test]
    fn failure_spends_cost_before_waste() {
        let agent = AgentId::new();
        let mut b = book(agent, vec![need(agent, NeedType::Energy, 20.0), need(agent, NeedType::Communication, 90.0)]);
        let a = action(agent, NeedType::Energy, 20.0, 30.0);
        let res = resolve(&mut b, &a, &ResolutionPolicy::default(), &mut FixedRoll(90.0), Utc::now()).unwrap();
        assert!(!res.success);
        assert!(res.side_effects.iter().any(|e| matches!(
            e,
            SideEffect::ResourceSpent { amount, .. } if (amount - 20.0).abs() < EPS
        )));
        assert!(res.side_effects.iter().any(|e| matches!(
            e,
            SideEffect::WastedResource { amount, .. } if amount.abs() < EPS
        )));
        assert!(b.get(NeedType::Energy).unwrap().current_value.abs() < EPS);
    }

    #[test]
    fn missing_addressed_need_leaves_book_untouched() {
        let agent = AgentId::new();
        let mut b = book(agent, vec![need(agent, NeedType::Energy, 80.0), need(agent, NeedType::Communication, 90.0)]);
        let before = b.clone();
        let mut a = action(agent, NeedType::Energy, 10.0, 80.0);
        a.related_needs.push(NeedType::Security);
        let err = resolve(&mut b, &a, &ResolutionPolicy::default(), &mut NoRoll, Utc::now()).unwrap_err();
        assert!(matches!(err, NeedError::NotFound { need_type: NeedType::Security, .. }));
        assert_eq!(b, before);
    }

    #[test]
    fn success_propagates_influence() {
        let agent = AgentId::new();
        let mut comm = need(agent, NeedType::Communication, 90.0);
        comm.related_needs.push(impulse_types::RelatedNeed {
            need_type: NeedType::Attention,
            influence_coefficient: 0.5,
        });
        let mut b = book(
            agent,
            vec![need(agent, NeedType::Energy, 100.0), comm, need(agent, NeedType::Attention, 60.0)],
        );
        let a = action(agent, NeedType::Energy, 0.0, 100.0);
        // roll 50 -> effectiveness 100, full reward of -40
        let res = resolve(&mut b, &a, &ResolutionPolicy::default(), &mut FixedRoll(50.0), Utc::now())
            .unwrap();
        assert!((b.get(NeedType::Attention).unwrap().current_value - 40.0).abs() < EPS);
        assert!(res.side_effects.iter().any(|e| matches!(
            e,
            SideEffect::InfluencePropagated { to: NeedType::Attention, .. }
        )));
    }

    #[test]
    fn missing_resource_need_is_an_error() {
        let agent = AgentId::new();
        let mut b = book(agent, vec![need(agent, NeedType::Communication, 90.0)]);
        let a = action(agent, NeedType::Energy, 0.0, 100.0);
        let res = resolve(&mut b, &a, &ResolutionPolicy::default(), &mut FixedRoll(0.0), Utc::now());
        assert!(matches!(res, Err(NeedError::NotFound { need_type: NeedType::Energy, .. })));
    }

    #[test]
    fn effectiveness_is_clamped() {
        assert!((effectiveness(true, 100.0, 0.0) - 100.0).abs() < EPS);
        assert!((effectiveness(false, 0.0, 99.0) - 99.0).abs() < EPS);
        assert!(effectiveness(false, 80.0, 80.5) < 1.0);
    }

    #[test]
    fn success_rate_converges_to_probability() {
        let agent = AgentId::new();
        let policy = ResolutionPolicy {
            failure_block_hours: 0.0,
            ..ResolutionPolicy::default()
        };
        let mut rng = SeededRoll::new(0x5eed);
        for p in [10.0, 35.0, 80.0] {
            let mut b = book(
                agent,
                vec![need(agent, NeedType::Energy, 100.0), need(agent, NeedType::Communication, 90.0)],
            );
            let a = action(agent, NeedType::Energy, 0.0, p);
            let n = 10_000_u32;
            let mut wins = 0_u32;
            for _ in 0..n {
                if resolve(&mut b, &a, &policy, &mut rng, Utc::now()).unwrap().success {
                    wins += 1;
                }
            }
            let rate = f64::from(wins) / f64::from(n);
            assert!((rate - p / 100.0).abs() < 0.02, "p={p} observed {rate}");
        }
    }
}
