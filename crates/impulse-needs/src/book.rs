//! Per-agent need set and the operations that mutate it.
//!
//! A [`NeedBook`] owns every [`Need`] of one agent. It is the unit the
//! engine locks, so nothing here synchronizes: callers serialize access.
//!
//! Every mutation keeps `current_value` within `[0, max_value]`, stamps
//! `last_updated`, and recomputes the derived [`NeedState`]. Time is always
//! passed in explicitly so the model stays deterministic under test.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use impulse_types::{AgentId, MAX_FRUSTRATION, Need, NeedState, NeedType};
use tracing::{debug, trace, warn};

use crate::config::NeedConfig;
use crate::error::NeedError;

/// The frustration tunables a book applies on its own.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrustrationPolicy {
    /// Frustration removed by [`NeedBook::reset`].
    pub decrement_on_reset: f64,
    /// Frustration added per hour while a need stays unfulfilled.
    pub rate_per_hour: f64,
}

impl From<&NeedConfig> for FrustrationPolicy {
    fn from(config: &NeedConfig) -> Self {
        Self {
            decrement_on_reset: config.frustration_decrement,
            rate_per_hour: config.frustration_rate_per_hour,
        }
    }
}

/// Result of one periodic tick over a book.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Needs that rose past their threshold during this tick.
    pub crossed_threshold: Vec<NeedType>,
    /// Needs whose block window had expired and were released.
    pub unblocked: Vec<NeedType>,
}

/// All needs of one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct NeedBook {
    agent_id: AgentId,
    needs: BTreeMap<NeedType, Need>,
    policy: FrustrationPolicy,
}

/// Convert fractional hours into a [`TimeDelta`] at millisecond precision.
#[allow(clippy::cast_possible_truncation)] // Clamped to a range i64 holds exactly.
fn hours_to_delta(hours: f64) -> TimeDelta {
    const MAX_HOURS: f64 = 24.0 * 365.0 * 100.0;
    let hours = if hours.is_finite() { hours.clamp(0.0, MAX_HOURS) } else { 0.0 };
    TimeDelta::milliseconds((hours * 3_600_000.0).round() as i64)
}

impl NeedBook {
    /// Build a book from already-loaded needs. Entries belonging to other
    /// agents are ignored, as are entries without a positive finite
    /// `max_value`.
    pub fn from_needs(
        agent_id: AgentId,
        needs: impl IntoIterator<Item = Need>,
        policy: FrustrationPolicy,
    ) -> Self {
        let needs = needs
            .into_iter()
            .filter(|n| n.agent_id == agent_id)
            .filter(|n| {
                let valid = n.max_value.is_finite() && n.max_value > 0.0;
                if !valid {
                    warn!(
                        agent_id = %agent_id,
                        need = %n.need_type,
                        max_value = n.max_value,
                        "dropping need with invalid max_value"
                    );
                }
                valid
            })
            .map(|n| (n.need_type, n))
            .collect();
        Self {
            agent_id,
            needs,
            policy,
        }
    }

    /// Build a book holding the configured default needs.
    pub fn with_defaults(agent_id: AgentId, config: &NeedConfig, now: DateTime<Utc>) -> Self {
        Self::from_needs(
            agent_id,
            config.instantiate(agent_id, now),
            FrustrationPolicy::from(config),
        )
    }

    /// The owning agent.
    pub const fn agent_id(&self) -> AgentId {
        self.agent_id
    }

    /// Number of needs held.
    pub fn len(&self) -> usize {
        self.needs.len()
    }

    /// Whether the book holds no needs at all.
    pub fn is_empty(&self) -> bool {
        self.needs.is_empty()
    }

    /// Iterate needs in `NeedType` order.
    pub fn iter(&self) -> impl Iterator<Item = &Need> {
        self.needs.values()
    }

    /// Clone every need, e.g. for persistence or a content request.
    pub fn snapshot(&self) -> Vec<Need> {
        self.needs.values().cloned().collect()
    }

    /// Look up one need.
    pub fn get(&self, need_type: NeedType) -> Result<&Need, NeedError> {
        self.needs.get(&need_type).ok_or(NeedError::NotFound {
            agent_id: self.agent_id,
            need_type,
        })
    }

    fn get_mut(&mut self, need_type: NeedType) -> Result<&mut Need, NeedError> {
        let agent_id = self.agent_id;
        self.needs
            .get_mut(&need_type)
            .ok_or(NeedError::NotFound { agent_id, need_type })
    }

    // -----------------------------------------------------------------------
    // Mutations
    // -----------------------------------------------------------------------

    /// Add `growth_rate * elapsed_hours`, clamped to `max_value`.
    ///
    /// Blocked or inactive needs are left untouched.
    pub fn grow(
        &mut self,
        need_type: NeedType,
        elapsed_hours: f64,
        now: DateTime<Utc>,
    ) -> Result<(), NeedError> {
        let need = self.get_mut(need_type)?;
        if !need.is_active || need.is_blocked(now) {
            return Ok(());
        }
        let delta = need.growth_rate * elapsed_hours.max(0.0);
        need.current_value = need.clamp_value(need.current_value + delta);
        need.last_updated = now;
        need.state = need.derive_state(now);
        Ok(())
    }

    /// Remove `decay_rate * elapsed_hours`, clamped to 0.
    ///
    /// Blocked or inactive needs are left untouched.
    pub fn decay(
        &mut self,
        need_type: NeedType,
        elapsed_hours: f64,
        now: DateTime<Utc>,
    ) -> Result<(), NeedError> {
        let need = self.get_mut(need_type)?;
        if !need.is_active || need.is_blocked(now) || need.decay_rate <= 0.0 {
            return Ok(());
        }
        let delta = need.decay_rate * elapsed_hours.max(0.0);
        need.current_value = need.clamp_value(need.current_value - delta);
        need.last_updated = now;
        need.state = need.derive_state(now);
        Ok(())
    }

    /// Fully satisfy a need.
    ///
    /// Sets the value to 0, lowers frustration by the configured decrement
    /// (not below 0) and clears the consecutive block count. The state
    /// becomes `satisfied`, unless a block window is still open.
    pub fn reset(&mut self, need_type: NeedType, now: DateTime<Utc>) -> Result<(), NeedError> {
        let decrement = self.policy.decrement_on_reset;
        let need = self.get_mut(need_type)?;
        need.current_value = 0.0;
        need.frustration_level = (need.frustration_level - decrement).max(0.0);
        need.consecutive_blocks_count = 0;
        need.last_updated = now;
        need.last_satisfied = Some(now);
        need.state = if need.is_blocked(now) {
            NeedState::Blocked
        } else {
            NeedState::Satisfied
        };
        debug!(agent_id = %need.agent_id, need = %need_type, "need reset");
        Ok(())
    }

    /// Add `delta` to the value, clamped to `[0, max_value]`.
    ///
    /// Returns the delta actually applied after clamping.
    pub fn update_level(
        &mut self,
        need_type: NeedType,
        delta: f64,
        now: DateTime<Utc>,
    ) -> Result<f64, NeedError> {
        let need = self.get_mut(need_type)?;
        let before = need.current_value;
        need.current_value = need.clamp_value(before + delta);
        need.last_updated = now;
        need.state = need.derive_state(now);
        Ok(need.current_value - before)
    }

    /// Suppress a need for `hours` from `now`.
    pub fn block_for(
        &mut self,
        need_type: NeedType,
        hours: f64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<(), NeedError> {
        let need = self.get_mut(need_type)?;
        need.blocked_until = Some(now + hours_to_delta(hours));
        need.block_reason = Some(reason.to_owned());
        need.consecutive_blocks_count = need.consecutive_blocks_count.saturating_add(1);
        need.state = NeedState::Blocked;
        debug!(
            agent_id = %need.agent_id,
            need = %need_type,
            hours,
            reason,
            consecutive = need.consecutive_blocks_count,
            "need blocked"
        );
        Ok(())
    }

    /// Clear any block on a need.
    pub fn unblock(&mut self, need_type: NeedType, now: DateTime<Utc>) -> Result<(), NeedError> {
        let need = self.get_mut(need_type)?;
        need.blocked_until = None;
        need.block_reason = None;
        need.state = need.derive_state(now);
        Ok(())
    }

    /// Raise frustration by `amount`, capped at 100.
    ///
    /// Returns the new frustration level.
    pub fn add_frustration(
        &mut self,
        need_type: NeedType,
        amount: f64,
        now: DateTime<Utc>,
    ) -> Result<f64, NeedError> {
        let need = self.get_mut(need_type)?;
        need.frustration_level = (need.frustration_level + amount).clamp(0.0, MAX_FRUSTRATION);
        need.state = need.derive_state(now);
        Ok(need.frustration_level)
    }

    /// Apply `delta * influence_coefficient` to each related need.
    ///
    /// Single hop: the related needs' own relations are not followed.
    /// Related needs the book does not hold are skipped. Returns the deltas
    /// actually applied, per target.
    pub fn propagate_influence(
        &mut self,
        need_type: NeedType,
        delta: f64,
        now: DateTime<Utc>,
    ) -> Result<Vec<(NeedType, f64)>, NeedError> {
        let related = self.get(need_type)?.related_needs.clone();
        let mut applied = Vec::with_capacity(related.len());
        for rel in related {
            if !self.needs.contains_key(&rel.need_type) {
                trace!(
                    agent_id = %self.agent_id,
                    from = %need_type,
                    to = %rel.need_type,
                    "related need absent, skipping"
                );
                continue;
            }
            let actual = self.update_level(rel.need_type, delta * rel.influence_coefficient, now)?;
            applied.push((rel.need_type, actual));
        }
        Ok(applied)
    }

    // -----------------------------------------------------------------------
    // Predicates
    // -----------------------------------------------------------------------

    /// Whether the need is at or above its threshold.
    pub fn has_reached_threshold(&self, need_type: NeedType) -> Result<bool, NeedError> {
        Ok(self.get(need_type)?.has_reached_threshold())
    }

    /// Whether a block window covers `now`.
    pub fn is_blocked(&self, need_type: NeedType, now: DateTime<Utc>) -> Result<bool, NeedError> {
        Ok(self.get(need_type)?.is_blocked(now))
    }

    /// Whether the need is at 1.5x its threshold or frustration is 70+.
    pub fn is_critical(&self, need_type: NeedType) -> Result<bool, NeedError> {
        Ok(self.get(need_type)?.is_critical())
    }

    // -----------------------------------------------------------------------
    // Periodic tick
    // -----------------------------------------------------------------------

    /// Advance every need by `elapsed_hours`.
    ///
    /// # Order of operations
    ///
    /// 1. Release blocks whose window has passed
    /// 2. Apply growth, then decay
    /// 3. Raise frustration of needs that are still unfulfilled
    /// 4. Recompute state and record threshold crossings
    pub fn tick(&mut self, elapsed_hours: f64, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();
        let rate = self.policy.rate_per_hour;
        let hours = if elapsed_hours.is_finite() { elapsed_hours.max(0.0) } else { 0.0 };

        for need in self.needs.values_mut() {
            if need.blocked_until.is_some() && !need.is_blocked(now) {
                debug!(
                    agent_id = %need.agent_id,
                    need = %need.need_type,
                    reason = need.block_reason.as_deref().unwrap_or(""),
                    "block expired"
                );
                need.blocked_until = None;
                need.block_reason = None;
                report.unblocked.push(need.need_type);
            }

            let was_above = need.has_reached_threshold();

            if need.is_active && !need.is_blocked(now) {
                need.current_value = need.clamp_value(need.current_value + need.growth_rate * hours);
                need.current_value = need.clamp_value(need.current_value - need.decay_rate * hours);
                if need.has_reached_threshold() {
                    need.frustration_level =
                        (need.frustration_level + rate * hours).clamp(0.0, MAX_FRUSTRATION);
                }
                need.last_updated = now;
            }

            need.state = need.derive_state(now);
            if !was_above && need.has_reached_threshold() {
                report.crossed_threshold.push(need.need_type);
            }
        }
        report
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use impulse_types::RelatedNeed;

    use super::*;

    const EPS: f64 = 1e-9;

    fn policy() -> FrustrationPolicy {
        FrustrationPolicy {
            decrement_on_reset: 20.0,
            rate_per_hour: 10.0,
        }
    }

    fn need(agent_id: AgentId, need_type: NeedType, value: f64, threshold: f64) -> Need {
        Need {
            agent_id,
            need_type,
            current_value: value,
            max_value: 100.0,
            growth_rate: 10.0,
            decay_rate: 0.0,
            priority: 5,
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

    fn book_with(needs: Vec<Need>) -> NeedBook {
        let agent = needs.first().map_or_else(AgentId::new, |n| n.agent_id);
        NeedBook::from_needs(agent, needs, policy())
    }

    fn value(book: &NeedBook, need_type: NeedType) -> f64 {
        book.get(need_type).unwrap().current_value
    }

    #[test]
    fn unknown_need_is_not_found() {
        let agent = AgentId::new();
        let mut book = NeedBook::from_needs(agent, Vec::new(), policy());
        let err = book.grow(NeedType::Rest, 1.0, Utc::now());
        assert_eq!(
            err,
            Err(NeedError::NotFound {
                agent_id: agent,
                need_type: NeedType::Rest
            })
        );
        assert!(book.has_reached_threshold(NeedType::Rest).is_err());
    }

    #[test]
    fn needs_with_invalid_max_value_are_dropped() {
        let agent = AgentId::new();
        let mut nan = need(agent, NeedType::Rest, 10.0, 80.0);
        nan.max_value = f64::NAN;
        let mut negative = need(agent, NeedType::Security, 10.0, 80.0);
        negative.max_value = -1.0;
        let good = need(agent, NeedType::Energy, 10.0, 80.0);
        let mut book = NeedBook::from_needs(agent, vec![nan, negative, good], policy());

        assert_eq!(book.len(), 1);
        assert!(book.get(NeedType::Rest).is_err());
        assert!(book.get(NeedType::Security).is_err());
        assert!(book.update_level(NeedType::Energy, 500.0, Utc::now()).is_ok());
        assert!((value(&book, NeedType::Energy) - 100.0).abs() < EPS);
    }

    #[test]
    fn foreign_needs_are_ignored() {
        let agent = AgentId::new();
        let other = need(AgentId::new(), NeedType::Rest, 10.0, 80.0);
        let book = NeedBook::from_needs(agent, vec![other], policy());
        assert!(book.is_empty());
    }

    #[test]
    fn grow_adds_rate_times_hours_and_clamps() {
        let agent = AgentId::new();
        let mut book = book_with(vec![need(agent, NeedType::Rest, 10.0, 80.0)]);
        book.grow(NeedType::Rest, 2.5, Utc::now()).unwrap();
        assert!((value(&book, NeedType::Rest) - 35.0).abs() < EPS);
        book.grow(NeedType::Rest, 100.0, Utc::now()).unwrap();
        assert!((value(&book, NeedType::Rest) - 100.0).abs() < EPS);
    }

    #[test]
    fn grow_is_noop_when_blocked_or_inactive() {
        let agent = AgentId::new();
        let now = Utc::now();
        let mut inactive = need(agent, NeedType::Novelty, 10.0, 80.0);
        inactive.is_active = false;
        let mut book = book_with(vec![need(agent, NeedType::Rest, 10.0, 80.0), inactive]);
        book.block_for(NeedType::Rest, 1.0, "cooldown", now).unwrap();
        assert!(book.grow(NeedType::Rest, 1.0, now).is_ok());
        assert!(book.grow(NeedType::Novelty, 1.0, now).is_ok());
        assert!((value(&book, NeedType::Rest) - 10.0).abs() < EPS);
        assert!((value(&book, NeedType::Novelty) - 10.0).abs() < EPS);
    }

    #[test]
    fn decay_floors_at_zero() {
        let agent = AgentId::new();
        let mut n = need(agent, NeedType::Security, 5.0, 60.0);
        n.decay_rate = 2.0;
        let mut book = book_with(vec![n]);
        book.decay(NeedType::Security, 1.0, Utc::now()).unwrap();
        assert!((value(&book, NeedType::Security) - 3.0).abs() < EPS);
        book.decay(NeedType::Security, 10.0, Utc::now()).unwrap();
        assert!(value(&book, NeedType::Security).abs() < EPS);
    }

    #[test]
    fn update_level_stays_in_range() {
        let agent = AgentId::new();
        let mut book = book_with(vec![need(agent, NeedType::Rest, 50.0, 80.0)]);
        let now = Utc::now();
        for (delta, expected) in [(-500.0, 0.0), (30.0, 30.0), (1e9, 100.0), (-0.5, 99.5)] {
            book.update_level(NeedType::Rest, delta, now).unwrap();
            let v = value(&book, NeedType::Rest);
            assert!((0.0..=100.0).contains(&v));
            assert!((v - expected).abs() < EPS, "delta {delta}: got {v}");
        }
    }

    #[test]
    fn update_level_reports_clamped_delta() {
        let agent = AgentId::new();
        let mut book = book_with(vec![need(agent, NeedType::Rest, 90.0, 80.0)]);
        let applied = book.update_level(NeedType::Rest, 25.0, Utc::now()).unwrap();
        assert!((applied - 10.0).abs() < EPS);
    }

    #[test]
    fn reset_clears_value_and_lowers_frustration() {
        let agent = AgentId::new();
        let mut n = need(agent, NeedType::Rest, 95.0, 80.0);
        n.frustration_level = 15.0;
        n.consecutive_blocks_count = 3;
        let mut book = book_with(vec![n]);
        book.reset(NeedType::Rest, Utc::now()).unwrap();
        let rest = book.get(NeedType::Rest).unwrap();
        assert!(rest.current_value.abs() < EPS);
        assert!(rest.frustration_level.abs() < EPS);
        assert_eq!(rest.consecutive_blocks_count, 0);
        assert_eq!(rest.state, NeedState::Satisfied);
        assert!(rest.last_satisfied.is_some());
    }

    #[test]
    fn block_lifetime() {
        let agent = AgentId::new();
        let now = Utc::now();
        let mut book = book_with(vec![need(agent, NeedType::Rest, 10.0, 80.0)]);
        book.block_for(NeedType::Rest, 2.0, "failed", now).unwrap();
        assert!(book.is_blocked(NeedType::Rest, now).unwrap());
        let rest = book.get(NeedType::Rest).unwrap();
        assert_eq!(rest.state, NeedState::Blocked);
        assert_eq!(rest.consecutive_blocks_count, 1);
        assert_eq!(rest.block_reason.as_deref(), Some("failed"));

        let later = now + TimeDelta::hours(2) + TimeDelta::seconds(1);
        assert!(!book.is_blocked(NeedType::Rest, later).unwrap());
    }

    #[test]
    fn unblock_clears_fields() {
        let agent = AgentId::new();
        let now = Utc::now();
        let mut book = book_with(vec![need(agent, NeedType::Rest, 10.0, 80.0)]);
        book.block_for(NeedType::Rest, 2.0, "failed", now).unwrap();
        book.unblock(NeedType::Rest, now).unwrap();
        let rest = book.get(NeedType::Rest).unwrap();
        assert!(rest.blocked_until.is_none());
        assert!(rest.block_reason.is_none());
        assert_eq!(rest.state, NeedState::Satisfied);
    }

    #[test]
    fn blocked_state_survives_value_changes() {
        let agent = AgentId::new();
        let now = Utc::now();
        let mut book = book_with(vec![need(agent, NeedType::Rest, 10.0, 80.0)]);
        book.block_for(NeedType::Rest, 1.0, "cooldown", now).unwrap();
        book.update_level(NeedType::Rest, 85.0, now).unwrap();
        assert_eq!(book.get(NeedType::Rest).unwrap().state, NeedState::Blocked);
        book.reset(NeedType::Rest, now).unwrap();
        assert_eq!(book.get(NeedType::Rest).unwrap().state, NeedState::Blocked);
    }

    #[test]
    fn critical_predicate() {
        let agent = AgentId::new();
        let mut frustrated = need(agent, NeedType::Control, 10.0, 80.0);
        frustrated.frustration_level = 70.0;
        let book = book_with(vec![need(agent, NeedType::Rest, 60.0, 40.0), frustrated]);
        assert!(book.is_critical(NeedType::Rest).unwrap());
        assert!(book.is_critical(NeedType::Control).unwrap());
    }

    #[test]
    fn propagation_is_single_hop() {
        let agent = AgentId::new();
        let mut a = need(agent, NeedType::Communication, 50.0, 70.0);
        a.related_needs.push(RelatedNeed {
            need_type: NeedType::Attention,
            influence_coefficient: 0.5,
        });
        let mut b = need(agent, NeedType::Attention, 50.0, 70.0);
        b.related_needs.push(RelatedNeed {
            need_type: NeedType::Recognition,
            influence_coefficient: 1.0,
        });
        let c = need(agent, NeedType::Recognition, 50.0, 70.0);
        let mut book = book_with(vec![a, b, c]);

        let applied = book
            .propagate_influence(NeedType::Communication, -20.0, Utc::now())
            .unwrap();
        assert_eq!(applied.len(), 1);
        assert!((value(&book, NeedType::Attention) - 40.0).abs() < EPS);
        assert!((value(&book, NeedType::Recognition) - 50.0).abs() < EPS);
        assert!((value(&book, NeedType::Communication) - 50.0).abs() < EPS);
    }

    #[test]
    fn propagation_skips_absent_targets() {
        let agent = AgentId::new();
        let mut a = need(agent, NeedType::Rest, 50.0, 70.0);
        a.related_needs.push(RelatedNeed {
            need_type: NeedType::Energy,
            influence_coefficient: -0.5,
        });
        let mut book = book_with(vec![a]);
        let applied = book.propagate_influence(NeedType::Rest, -10.0, Utc::now()).unwrap();
        assert!(applied.is_empty());
    }

    #[test]
    fn tick_grows_and_reports_crossings() {
        let agent = AgentId::new();
        let now = Utc::now();
        let mut book = book_with(vec![
            need(agent, NeedType::Rest, 75.0, 80.0),
            need(agent, NeedType::Novelty, 10.0, 80.0),
        ]);
        let report = book.tick(1.0, now);
        assert_eq!(report.crossed_threshold, vec![NeedType::Rest]);
        let rest = book.get(NeedType::Rest).unwrap();
        assert!((rest.current_value - 85.0).abs() < EPS);
        assert!((rest.frustration_level - 10.0).abs() < EPS);
        assert_eq!(rest.state, NeedState::Unfulfilled);
        assert!(book.get(NeedType::Novelty).unwrap().frustration_level.abs() < EPS);
    }

    #[test]
    fn tick_releases_expired_blocks() {
        let agent = AgentId::new();
        let now = Utc::now();
        let mut book = book_with(vec![need(agent, NeedType::Rest, 10.0, 80.0)]);
        book.block_for(NeedType::Rest, 0.5, "cooldown", now).unwrap();

        let report = book.tick(0.25, now + TimeDelta::minutes(15));
        assert!(report.unblocked.is_empty());
        assert!((value(&book, NeedType::Rest) - 10.0).abs() < EPS);

        let report = book.tick(0.5, now + TimeDelta::minutes(45));
        assert_eq!(report.unblocked, vec![NeedType::Rest]);
        assert!((value(&book, NeedType::Rest) - 15.0).abs() < EPS);
        assert_eq!(book.get(NeedType::Rest).unwrap().state, NeedState::Satisfied);
    }

    #[test]
    fn tick_applies_net_drift() {
        let agent = AgentId::new();
        let mut n = need(agent, NeedType::Security, 50.0, 60.0);
        n.growth_rate = 1.0;
        n.decay_rate = 3.0;
        let mut book = book_with(vec![n]);
        book.tick(2.0, Utc::now());
        assert!((value(&book, NeedType::Security) - 46.0).abs() < EPS);
    }

    #[test]
    fn hours_conversion_is_bounded() {
        assert_eq!(hours_to_delta(1.5), TimeDelta::minutes(90));
        assert_eq!(hours_to_delta(-3.0), TimeDelta::zero());
        assert_eq!(hours_to_delta(f64::NAN), TimeDelta::zero());
    }
}
