//! PRoPHET over destination keys
//!
//! Predictabilities are kept per [`DestinationKey`]: a topic for pub/sub
//! data, the destination host for ordinary messages. A host "subscribes"
//! to its own address, so host-keyed traffic is routed like plain PRoPHET.
//!
//! Subscribed keys are pinned at [`P_SUBSCRIBER`] and never age. On each
//! encounter both sides update every key either of them knows, from the
//! other side's value before the exchange:
//! - peer subscribes and we knew nothing: `P = P_init`
//! - otherwise: `P = P + (1 - P) * P_peer * beta`

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use dtnsim_core::{ConfigResult, HostId, Message, Settings};
use tracing::{debug, warn};

use super::{ProphetConfig, peer_engine_as};
use crate::decision::{DecisionEngine, ExchangeContext};
use crate::pubsub::{DestinationKey, PubSubKind, Publication};

/// Predictability of a subscribed key
pub const P_SUBSCRIBER: f64 = 1.0;

/// Defaults tuned for topic routing
pub fn pubsub_prophet_defaults() -> ProphetConfig {
    ProphetConfig {
        initial_probability: 0.75,
        aging_constant: 0.92,
        transitivity_constant: 0.45,
        seconds_in_time_unit: 30.0,
    }
}

#[derive(Debug, Clone)]
pub struct PubSubProphetDecisionEngine {
    config: ProphetConfig,
    local_id: HostId,
    subscriptions: BTreeSet<String>,
    table: BTreeMap<DestinationKey, f64>,
    last_aging: f64,
}

impl PubSubProphetDecisionEngine {
    pub fn new(local_id: HostId, config: ProphetConfig) -> Self {
        Self {
            config,
            local_id,
            subscriptions: BTreeSet::new(),
            table: BTreeMap::new(),
            last_aging: 0.0,
        }
    }

    pub fn from_settings(local_id: HostId, s: &Settings) -> ConfigResult<Self> {
        let config = ProphetConfig::from_settings_with(s, pubsub_prophet_defaults())?;
        Ok(Self::new(local_id, config))
    }

    pub fn config(&self) -> &ProphetConfig {
        &self.config
    }

    pub fn subscriptions(&self) -> &BTreeSet<String> {
        &self.subscriptions
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.contains(topic)
    }

    pub fn subscribe(&mut self, topic: &str) {
        debug!(host = %self.local_id, topic, "Subscribed");
        self.subscriptions.insert(topic.to_string());
        self.table.insert(DestinationKey::Topic(topic.to_string()), P_SUBSCRIBER);
    }

    /// Drop a subscription; the topic's predictability restarts from zero
    pub fn unsubscribe(&mut self, topic: &str) {
        debug!(host = %self.local_id, topic, "Unsubscribed");
        self.subscriptions.remove(topic);
        self.table.insert(DestinationKey::Topic(topic.to_string()), 0.0);
    }

    fn is_pinned(&self, key: &DestinationKey) -> bool {
        match key {
            DestinationKey::Host(h) => *h == self.local_id,
            DestinationKey::Topic(t) => self.subscriptions.contains(t),
        }
    }

    /// The key is known, either pinned or learned
    pub fn knows(&self, key: &DestinationKey) -> bool {
        self.is_pinned(key) || self.table.contains_key(key)
    }

    /// Stored predictability, without pending aging
    pub fn value(&self, key: &DestinationKey) -> f64 {
        if self.is_pinned(key) {
            return P_SUBSCRIBER;
        }
        self.table.get(key).copied().unwrap_or(0.0)
    }

    /// Predictability as if aged to `now`
    pub fn value_at(&self, key: &DestinationKey, now: f64) -> f64 {
        if self.is_pinned(key) {
            return P_SUBSCRIBER;
        }
        self.value(key) * self.aging_factor(now)
    }

    fn known_keys(&self) -> BTreeSet<DestinationKey> {
        let mut keys: BTreeSet<DestinationKey> = self.table.keys().cloned().collect();
        keys.insert(DestinationKey::Host(self.local_id));
        keys.extend(self.subscriptions.iter().cloned().map(DestinationKey::Topic));
        keys
    }

    fn aging_factor(&self, now: f64) -> f64 {
        if self.config.seconds_in_time_unit <= 0.0 || now <= self.last_aging {
            return 1.0;
        }
        let units = (now - self.last_aging) / self.config.seconds_in_time_unit;
        self.config.aging_constant.powf(units)
    }

    /// Age every unpinned value to `now`
    pub fn age_all(&mut self, now: f64) {
        let factor = self.aging_factor(now);
        let pinned: Vec<DestinationKey> = self
            .table
            .keys()
            .filter(|k| self.is_pinned(k))
            .cloned()
            .collect();
        for (key, p) in self.table.iter_mut() {
            if !pinned.contains(key) {
                *p *= factor;
            }
        }
        self.last_aging = self.last_aging.max(now);
    }

    fn updated(&self, mine: f64, peer: f64, peer_pinned: bool) -> f64 {
        if peer_pinned && mine == 0.0 {
            self.config.initial_probability
        } else {
            mine + (1.0 - mine) * peer * self.config.transitivity_constant
        }
    }

    /// `host` is a final destination of `key`
    fn is_destination(&self, key: &DestinationKey, host: HostId) -> bool {
        match key {
            DestinationKey::Host(h) => *h == host,
            DestinationKey::Topic(t) => self.subscriptions.contains(t),
        }
    }
}

impl DecisionEngine for PubSubProphetDecisionEngine {
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
        let Some(other) = peer.as_any_mut().downcast_mut::<PubSubProphetDecisionEngine>() else {
            warn!(host = %ctx.me, peer = %ctx.peer, "Peer does not run pub/sub PRoPHET");
            return;
        };
        self.age_all(ctx.now);
        other.age_all(ctx.now);

        let mut keys = self.known_keys();
        keys.extend(other.known_keys());
        for key in keys {
            let (mine, theirs) = (self.value(&key), other.value(&key));
            let (my_pin, their_pin) = (self.is_pinned(&key), other.is_pinned(&key));
            if !my_pin {
                let p = self.updated(mine, theirs, their_pin);
                self.table.insert(key.clone(), p);
            }
            if !their_pin {
                let p = other.updated(theirs, mine, my_pin);
                other.table.insert(key, p);
            }
        }
    }

    fn new_message(&mut self, m: &mut Message) -> bool {
        let Some(publication) = Publication::of(m) else {
            return true;
        };
        match publication.kind {
            PubSubKind::Data => true,
            PubSubKind::Create => false,
            PubSubKind::Subscribe => {
                self.subscribe(&publication.topic);
                false
            }
            PubSubKind::Unsubscribe => {
                self.unsubscribe(&publication.topic);
                false
            }
        }
    }

    fn is_final_dest(&mut self, m: &mut Message, host: HostId) -> bool {
        self.is_destination(&DestinationKey::of(m), host)
    }

    fn should_save_received_message(&self, m: &Message, host: HostId) -> bool {
        !self.is_destination(&DestinationKey::of(m), host)
    }

    fn should_send_message_to_host(
        &self,
        m: &Message,
        peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
        now: f64,
    ) -> bool {
        let key = DestinationKey::of(m);
        if key == DestinationKey::Host(peer) {
            return true;
        }
        let Some(other) = peer_engine_as::<PubSubProphetDecisionEngine>(peer_engine) else {
            return false;
        };
        if !other.knows(&key) {
            return false;
        }
        if !self.knows(&key) {
            return true;
        }
        self.value_at(&key, now) < other.value_at(&key, now)
    }

    fn should_delete_sent_message(
        &mut self,
        m: &mut Message,
        peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        self.should_delete_old_message(m, peer, peer_engine)
    }

    fn should_delete_old_message(
        &self,
        m: &Message,
        reporter: HostId,
        reporter_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        match DestinationKey::of(m) {
            DestinationKey::Host(h) => h == reporter,
            DestinationKey::Topic(t) => peer_engine_as::<PubSubProphetDecisionEngine>(reporter_engine)
                .is_some_and(|e| e.is_subscribed(&t)),
        }
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

    fn engine(id: u32) -> PubSubProphetDecisionEngine {
        PubSubProphetDecisionEngine::new(HostId(id), pubsub_prophet_defaults())
    }

    fn topic(t: &str) -> DestinationKey {
        DestinationKey::Topic(t.to_string())
    }

    fn control(kind: PubSubKind, t: &str) -> Message {
        Publication::new(kind, t).message(HostId(0), "c", 0, 0.0)
    }

    #[test]
    fn test_subscribe_and_unsubscribe_messages_are_consumed() {
        let mut e = engine(0);
        assert!(!e.new_message(&mut control(PubSubKind::Subscribe, "news")));
        assert!(e.is_subscribed("news"));
        assert_eq!(e.value(&topic("news")), P_SUBSCRIBER);

        assert!(!e.new_message(&mut control(PubSubKind::Unsubscribe, "news")));
        assert!(!e.is_subscribed("news"));
        assert!(e.knows(&topic("news")));
        assert_eq!(e.value(&topic("news")), 0.0);

        assert!(!e.new_message(&mut control(PubSubKind::Create, "news")));
        assert!(e.new_message(&mut control(PubSubKind::Data, "news")));
        assert!(e.new_message(&mut Message::new(HostId(0), HostId(4), "m", 1, 0.0)));
    }

    #[test]
    fn test_subscriber_value_is_pinned_through_aging() {
        let mut e = engine(0);
        e.subscribe("news");
        e.age_all(3000.0);
        assert_eq!(e.value(&topic("news")), P_SUBSCRIBER);
        assert_eq!(e.value_at(&topic("news"), 1e6), P_SUBSCRIBER);
        assert_eq!(e.value_at(&DestinationKey::Host(HostId(0)), 1e6), P_SUBSCRIBER);
    }

    #[test]
    fn test_exchange_learns_topics_and_hosts() {
        let mut relay = engine(0);
        let mut sub = engine(1);
        sub.subscribe("news");

        relay.do_exchange_for_new_connection(&ctx(0, 1, 0.0), &mut sub);
        assert!((relay.value(&topic("news")) - 0.75).abs() < 1e-9);
        assert!((relay.value(&DestinationKey::Host(HostId(1))) - 0.75).abs() < 1e-9);
        assert!((sub.value(&DestinationKey::Host(HostId(0))) - 0.75).abs() < 1e-9);
        // the subscriber never learns about its own topic
        assert_eq!(sub.value(&topic("news")), P_SUBSCRIBER);

        // second meeting: 0.75 + 0.25 * 1.0 * 0.45
        relay.do_exchange_for_new_connection(&ctx(0, 1, 0.0), &mut sub);
        assert!((relay.value(&topic("news")) - 0.8625).abs() < 1e-9);
    }

    #[test]
    fn test_unpinned_values_age() {
        let mut relay = engine(0);
        let mut sub = engine(1);
        sub.subscribe("news");
        relay.do_exchange_for_new_connection(&ctx(0, 1, 0.0), &mut sub);

        let aged = relay.value_at(&topic("news"), 30.0);
        assert!((aged - 0.75 * 0.92).abs() < 1e-9);
        relay.age_all(30.0);
        assert!((relay.value(&topic("news")) - aged).abs() < 1e-9);
    }

    #[test]
    fn test_data_moves_towards_subscribers() {
        let mut publisher = engine(0);
        let mut relay = engine(1);
        let mut sub = engine(2);
        sub.subscribe("news");
        relay.do_exchange_for_new_connection(&ctx(1, 2, 0.0), &mut sub);

        let data = Publication::new(PubSubKind::Data, "news").message(HostId(0), "d", 10, 0.0);
        let relay_engine: &dyn DecisionEngine = &relay;
        assert!(publisher.should_send_message_to_host(&data, HostId(1), Some(relay_engine), 0.0));

        // a peer that never heard of the topic gets nothing
        let stranger = engine(3);
        assert!(!publisher.should_send_message_to_host(&data, HostId(3), Some(&stranger as &dyn DecisionEngine), 0.0));

        // once the publisher knows the topic better, the relay is skipped
        publisher.do_exchange_for_new_connection(&ctx(0, 2, 0.0), &mut sub);
        publisher.do_exchange_for_new_connection(&ctx(0, 2, 0.0), &mut sub);
        assert!(!publisher.should_send_message_to_host(&data, HostId(1), Some(&relay as &dyn DecisionEngine), 0.0));
        assert!(publisher.should_send_message_to_host(&data, HostId(2), Some(&sub as &dyn DecisionEngine), 0.0));
    }

    #[test]
    fn test_subscriber_is_final_and_does_not_store() {
        let mut sub = engine(2);
        sub.subscribe("news");
        let mut data = Publication::new(PubSubKind::Data, "news").message(HostId(0), "d", 10, 0.0);
        assert!(sub.is_final_dest(&mut data, HostId(2)));
        assert!(!sub.should_save_received_message(&data, HostId(2)));

        let mut relay = engine(1);
        assert!(!relay.is_final_dest(&mut data, HostId(1)));
        assert!(relay.should_save_received_message(&data, HostId(1)));
        assert!(relay.should_delete_sent_message(&mut data, HostId(2), Some(&sub as &dyn DecisionEngine)));
        assert!(!relay.should_delete_old_message(&data, HostId(0), Some(&engine(0) as &dyn DecisionEngine)));
    }
}
