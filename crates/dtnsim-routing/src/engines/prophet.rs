//! PRoPHET (Probabilistic Routing Protocol using History of Encounters)
//!
//! Each host keeps a delivery predictability `P(dest)` for every host it
//! has learned about:
//! - **Encounter**: `P(b) = P(b) + (1 - P(b)) * P_init` when meeting `b`
//! - **Transitivity**: `P(c) = P(c) + (1 - P(c)) * P(b) * P_b(c) * beta`
//! - **Aging**: every value is multiplied by `gamma^k`, `k` being the
//!   number of time units since the last aging
//!
//! A host's predictability for itself is pinned at 1. A message moves to a
//! peer whose predictability for the destination beats ours.

use std::any::Any;
use std::collections::BTreeMap;

use dtnsim_core::{ConfigResult, HostId, Message, Settings};
use tracing::warn;

use super::peer_engine_as;
use crate::decision::{DecisionEngine, ExchangeContext};

pub const INITIAL_PROBABILITY_SETTING: &str = "initialProbability";
pub const BETA_SETTING: &str = "beta";
pub const GAMMA_SETTING: &str = "gamma";
pub const SECONDS_IN_UNIT_SETTING: &str = "secondsInTimeUnit";

/// PRoPHET protocol configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProphetConfig {
    /// Predictability set on encounter (P_init)
    pub initial_probability: f64,
    /// Aging constant (gamma)
    pub aging_constant: f64,
    /// Transitivity scaling factor (beta)
    pub transitivity_constant: f64,
    /// Seconds per aging unit
    pub seconds_in_time_unit: f64,
}

impl Default for ProphetConfig {
    fn default() -> Self {
        Self {
            initial_probability: 0.75,
            aging_constant: 0.98,
            transitivity_constant: 0.25,
            seconds_in_time_unit: 30.0,
        }
    }
}

impl ProphetConfig {
    pub fn from_settings(s: &Settings) -> ConfigResult<Self> {
        Self::from_settings_with(s, Self::default())
    }

    /// Read the configuration, falling back to `d` for absent keys
    pub fn from_settings_with(s: &Settings, d: Self) -> ConfigResult<Self> {
        Ok(Self {
            initial_probability: s.get_non_negative_or(INITIAL_PROBABILITY_SETTING, d.initial_probability)?,
            aging_constant: s.get_non_negative_or(GAMMA_SETTING, d.aging_constant)?,
            transitivity_constant: s.get_non_negative_or(BETA_SETTING, d.transitivity_constant)?,
            seconds_in_time_unit: s.get_non_negative_or(SECONDS_IN_UNIT_SETTING, d.seconds_in_time_unit)?,
        })
    }
}

/// PRoPHET routing state of one host
#[derive(Debug, Clone)]
pub struct ProphetDecisionEngine {
    config: ProphetConfig,
    local_id: HostId,
    probabilities: BTreeMap<HostId, f64>,
    last_aging: f64,
}

impl ProphetDecisionEngine {
    pub fn new(local_id: HostId, config: ProphetConfig) -> Self {
        Self {
            config,
            local_id,
            probabilities: BTreeMap::new(),
            last_aging: 0.0,
        }
    }

    pub fn with_defaults(local_id: HostId) -> Self {
        Self::new(local_id, ProphetConfig::default())
    }

    pub fn config(&self) -> &ProphetConfig {
        &self.config
    }

    /// Stored predictability for `destination`, without pending aging
    pub fn get_probability(&self, destination: HostId) -> f64 {
        if destination == self.local_id {
            return 1.0;
        }
        self.probabilities.get(&destination).copied().unwrap_or(0.0)
    }

    /// Predictability for `destination` as if aged to `now`
    pub fn probability_at(&self, destination: HostId, now: f64) -> f64 {
        if destination == self.local_id {
            return 1.0;
        }
        self.get_probability(destination) * self.aging_factor(now)
    }

    /// Known destinations and their stored predictabilities
    pub fn all_probabilities(&self) -> Vec<(HostId, f64)> {
        self.probabilities.iter().map(|(&h, &p)| (h, p)).collect()
    }

    pub fn known_destinations(&self) -> usize {
        self.probabilities.len()
    }

    fn aging_factor(&self, now: f64) -> f64 {
        if self.config.seconds_in_time_unit <= 0.0 || now <= self.last_aging {
            return 1.0;
        }
        let units = (now - self.last_aging) / self.config.seconds_in_time_unit;
        self.config.aging_constant.powf(units)
    }

    /// Age every predictability to `now`
    pub fn age_all(&mut self, now: f64) {
        let factor = self.aging_factor(now);
        for p in self.probabilities.values_mut() {
            *p *= factor;
        }
        self.last_aging = self.last_aging.max(now);
    }

    /// Record a direct encounter with `peer`
    pub fn encounter(&mut self, peer: HostId) {
        if peer == self.local_id {
            return;
        }
        let p_old = self.get_probability(peer);
        let p_new = p_old + (1.0 - p_old) * self.config.initial_probability;
        self.probabilities.insert(peer, p_new);
    }

    /// Learn from the predictabilities of `intermediary`
    pub fn transitive_update(&mut self, intermediary: HostId, intermediary_probs: &[(HostId, f64)]) {
        let p_ab = self.get_probability(intermediary);
        for &(destination, p_bc) in intermediary_probs {
            if destination == self.local_id || destination == intermediary {
                continue;
            }
            let p_old = self.get_probability(destination);
            let p_new = p_old + (1.0 - p_old) * p_ab * p_bc * self.config.transitivity_constant;
            self.probabilities.insert(destination, p_new);
        }
    }
}

impl DecisionEngine for ProphetDecisionEngine {
    fn connection_up(&mut self, _me: HostId, _peer: HostId, _now: f64) {}

    fn connection_down(
        &mut self,
        _me: HostId,
        _peer: HostId,
        _peer_engine: Option<&dyn DecisionEngine>,
        _now: f64,
    ) {
    }

    fn do_exchange_for_new_connection(&mut self, ctx: &ExchangeContext, peer: &mut dyn DecisionEngine) {
        let Some(other) = peer.as_any_mut().downcast_mut::<ProphetDecisionEngine>() else {
            warn!(host = %ctx.me, peer = %ctx.peer, "Peer does not run PRoPHET");
            return;
        };
        self.age_all(ctx.now);
        other.age_all(ctx.now);
        let mine = self.all_probabilities();
        let theirs = other.all_probabilities();

        self.encounter(ctx.peer);
        other.encounter(ctx.me);
        self.transitive_update(ctx.peer, &theirs);
        other.transitive_update(ctx.me, &mine);
    }

    fn new_message(&mut self, _m: &mut Message) -> bool {
        true
    }

    fn is_final_dest(&mut self, m: &mut Message, host: HostId) -> bool {
        m.to() == host
    }

    fn should_save_received_message(&self, m: &Message, host: HostId) -> bool {
        m.to() != host
    }

    fn should_send_message_to_host(
        &self,
        m: &Message,
        peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
        now: f64,
    ) -> bool {
        if m.to() == peer {
            return true;
        }
        let Some(other) = peer_engine_as::<ProphetDecisionEngine>(peer_engine) else {
            return false;
        };
        other.probability_at(m.to(), now) > self.probability_at(m.to(), now)
    }

    fn should_delete_sent_message(
        &mut self,
        _m: &mut Message,
        _peer: HostId,
        _peer_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        false
    }

    fn should_delete_old_message(
        &self,
        m: &Message,
        reporter: HostId,
        _reporter_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        m.to() == reporter
    }

    fn replicate(&self, host: HostId) -> Box<dyn DecisionEngine> {
        Box::new(Self::new(host, self.config.clone()))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtnsim_core::{ConnectionId, Coord};

    fn ctx(me: u32, peer: u32, now: f64) -> ExchangeContext {
        ExchangeContext {
            conn: ConnectionId(0),
            me: HostId(me),
            peer: HostId(peer),
            now,
            my_location: Coord::new(0.0, 0.0),
            peer_location: Coord::new(1.0, 0.0),
            my_speed: 0.0,
            peer_speed: 0.0,
        }
    }

    #[test]
    fn test_initial_encounter() {
        let mut a = ProphetDecisionEngine::with_defaults(HostId(0));
        assert_eq!(a.get_probability(HostId(1)), 0.0);
        a.encounter(HostId(1));
        assert!((a.get_probability(HostId(1)) - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_repeated_encounters() {
        let mut a = ProphetDecisionEngine::with_defaults(HostId(0));
        a.encounter(HostId(1));
        let p1 = a.get_probability(HostId(1));
        a.encounter(HostId(1));
        let p2 = a.get_probability(HostId(1));
        assert!(p2 > p1);
        assert!(p2 < 1.0);
    }

    #[test]
    fn test_self_is_pinned() {
        let mut a = ProphetDecisionEngine::with_defaults(HostId(0));
        a.encounter(HostId(0));
        assert_eq!(a.known_destinations(), 0);
        assert_eq!(a.probability_at(HostId(0), 1e6), 1.0);
    }

    #[test]
    fn test_exchange_is_symmetric_and_transitive() {
        let mut a = ProphetDecisionEngine::with_defaults(HostId(0));
        let mut b = ProphetDecisionEngine::with_defaults(HostId(1));
        let mut c = ProphetDecisionEngine::with_defaults(HostId(2));

        b.do_exchange_for_new_connection(&ctx(1, 2, 0.0), &mut c);
        assert!((b.get_probability(HostId(2)) - 0.75).abs() < 1e-9);
        assert!((c.get_probability(HostId(1)) - 0.75).abs() < 1e-9);

        a.do_exchange_for_new_connection(&ctx(0, 1, 0.0), &mut b);
        // 0.75 * 0.75 * 0.25
        assert!((a.get_probability(HostId(2)) - 0.140625).abs() < 1e-9);
        assert_eq!(b.get_probability(HostId(0)), 0.75);
    }

    #[test]
    fn test_aging_is_monotone() {
        let mut a = ProphetDecisionEngine::with_defaults(HostId(0));
        a.encounter(HostId(1));
        let p0 = a.probability_at(HostId(1), 0.0);
        let p1 = a.probability_at(HostId(1), 30.0);
        let p2 = a.probability_at(HostId(1), 300.0);
        assert!((p1 - 0.75 * 0.98).abs() < 1e-9);
        assert!(p0 >= p1 && p1 >= p2);

        a.age_all(30.0);
        assert!((a.get_probability(HostId(1)) - p1).abs() < 1e-9);
    }

    #[test]
    fn test_forward_to_better_peer() {
        let mut a = ProphetDecisionEngine::with_defaults(HostId(0));
        let mut b = ProphetDecisionEngine::with_defaults(HostId(1));
        b.encounter(HostId(2));
        let m = Message::new(HostId(0), HostId(2), "m", 1, 0.0);
        assert!(a.should_send_message_to_host(&m, HostId(1), Some(&b as &dyn DecisionEngine), 0.0));
        a.encounter(HostId(2));
        a.encounter(HostId(2));
        assert!(!a.should_send_message_to_host(&m, HostId(1), Some(&b as &dyn DecisionEngine), 0.0));
        assert!(a.should_send_message_to_host(&m, HostId(2), None, 0.0));
    }
}
