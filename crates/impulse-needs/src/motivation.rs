//! Motivation derivation: turning need state into ranked impulses.
//!
//! A motivation is recomputed from the current [`NeedBook`] every time it is
//! asked for. Only needs at or above threshold and not blocked qualify.
//! Ordering is by priority (descending), then by current value (descending).

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use impulse_types::{Motivation, Need, NeedType};

use crate::book::NeedBook;

/// Short descriptive label for the impulse a need produces.
pub const fn action_impulse(need_type: NeedType) -> &'static str {
    match need_type {
        NeedType::Rest => "seek rest",
        NeedType::Energy => "spend surplus energy",
        NeedType::Communication => "reach out",
        NeedType::Attention => "draw attention",
        NeedType::Recognition => "seek acknowledgement",
        NeedType::Control => "take the lead",
        NeedType::Novelty => "look for something new",
        NeedType::Security => "seek reassurance",
    }
}

fn qualifies(need: &Need, now: DateTime<Utc>) -> bool {
    need.has_reached_threshold() && !need.is_blocked(now)
}

fn rank(a: &Motivation, b: &Motivation) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then_with(|| b.current_value.total_cmp(&a.current_value))
}

/// Ranked motivations for one agent. Empty when nothing qualifies.
pub fn derive_motivations(book: &NeedBook, now: DateTime<Utc>) -> Vec<Motivation> {
    let mut motivations: Vec<Motivation> = book
        .iter()
        .filter(|n| qualifies(n, now))
        .map(|n| Motivation {
            need_type: n.need_type,
            priority: n.priority,
            threshold: n.threshold,
            current_value: n.current_value,
            critical: n.is_critical(),
            action_impulse: action_impulse(n.need_type).to_owned(),
        })
        .collect();
    motivations.sort_by(rank);
    motivations
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;
    use impulse_types::{AgentId, NeedState};

    use super::*;
    use crate::book::FrustrationPolicy;

    fn need(agent_id: AgentId, need_type: NeedType, value: f64, threshold: f64, priority: u32) -> Need {
        Need {
            agent_id,
            need_type,
            current_value: value,
            max_value: 100.0,
            growth_rate: 1.0,
            decay_rate: 0.0,
            priority,
            threshold,
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
        NeedBook::from_needs(
            agent,
            needs,
            FrustrationPolicy {
                decrement_on_reset: 20.0,
                rate_per_hour: 10.0,
            },
        )
    }

    #[test]
    fn rest_above_threshold_motivates() {
        let agent = AgentId::new();
        let b = book(agent, vec![need(agent, NeedType::Rest, 90.0, 80.0, 5)]);
        assert!(b.has_reached_threshold(NeedType::Rest).unwrap());
        let m = derive_motivations(&b, Utc::now());
        assert_eq!(m.len(), 1);
        assert_eq!(m.first().map(|m| m.need_type), Some(NeedType::Rest));
        assert_eq!(m.first().map(|m| m.action_impulse.as_str()), Some("seek rest"));
    }

    #[test]
    fn empty_when_nothing_qualifies() {
        let agent = AgentId::new();
        let b = book(agent, vec![need(agent, NeedType::Rest, 10.0, 80.0, 5)]);
        assert!(derive_motivations(&b, Utc::now()).is_empty());
        let empty = book(agent, Vec::new());
        assert!(derive_motivations(&empty, Utc::now()).is_empty());
    }

    #[test]
    fn blocked_needs_are_excluded() {
        let agent = AgentId::new();
        let now = Utc::now();
        let mut b = book(agent, vec![need(agent, NeedType::Rest, 90.0, 80.0, 5)]);
        b.block_for(NeedType::Rest, 1.0, "cooldown", now).unwrap();
        assert!(derive_motivations(&b, now).is_empty());
        assert_eq!(derive_motivations(&b, now + TimeDelta::hours(2)).len(), 1);
    }

    #[test]
    fn ordered_by_priority_then_value() {
        let agent = AgentId::new();
        let b = book(
            agent,
            vec![
                need(agent, NeedType::Rest, 85.0, 80.0, 5),
                need(agent, NeedType::Communication, 95.0, 70.0, 5),
                need(agent, NeedType::Security, 61.0, 60.0, 9),
                need(agent, NeedType::Novelty, 99.0, 70.0, 1),
            ],
        );
        let order: Vec<NeedType> = derive_motivations(&b, Utc::now())
            .into_iter()
            .map(|m| m.need_type)
            .collect();
        assert_eq!(
            order,
            vec![
                NeedType::Security,
                NeedType::Communication,
                NeedType::Rest,
                NeedType::Novelty
            ]
        );
    }

    #[test]
    fn derivation_does_not_mutate() {
        let agent = AgentId::new();
        let b = book(agent, vec![need(agent, NeedType::Rest, 90.0, 80.0, 5)]);
        let before = b.clone();
        let _ = derive_motivations(&b, Utc::now());
        assert_eq!(b, before);
    }
}
