//! LABEL: forward into the destination's community
//!
//! A message is handed to a peer only if the peer is the destination or the
//! peer's local community contains the destination.

use std::any::Any;
use std::collections::BTreeSet;

use dtnsim_core::{ConfigResult, HostId, Message, Settings};
use dtnsim_social::community_from_settings;
use tracing::warn;

use super::{COMMUNITY_ALG_SETTING, ContactTracker, DEFAULT_COMMUNITY_ALG, peer_engine_as};
use crate::decision::{DecisionEngine, ExchangeContext};

#[derive(Debug)]
pub struct LabelDecisionEngine {
    tracker: ContactTracker,
}

impl LabelDecisionEngine {
    pub fn new(tracker: ContactTracker) -> Self {
        Self { tracker }
    }

    pub fn from_settings(s: &Settings) -> ConfigResult<Self> {
        let class = s.get_or(COMMUNITY_ALG_SETTING, DEFAULT_COMMUNITY_ALG);
        Ok(Self::new(ContactTracker::new(community_from_settings(class, s)?)))
    }

    pub fn tracker(&self) -> &ContactTracker {
        &self.tracker
    }

    pub fn communes_with(&self, host: HostId) -> bool {
        self.tracker.community().is_host_in_community(host)
    }
}

impl DecisionEngine for LabelDecisionEngine {
    fn connection_up(&mut self, _me: HostId, _peer: HostId, _now: f64) {}

    fn connection_down(
        &mut self,
        me: HostId,
        peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
        now: f64,
    ) {
        let peer_community = peer_engine_as::<LabelDecisionEngine>(peer_engine)
            .map(|e| e.tracker.community());
        self.tracker.contact_lost(me, peer, peer_community, now);
    }

    fn do_exchange_for_new_connection(&mut self, ctx: &ExchangeContext, peer: &mut dyn DecisionEngine) {
        match peer.as_any_mut().downcast_mut::<LabelDecisionEngine>() {
            Some(other) => self
                .tracker
                .exchange(&mut other.tracker, ctx.me, ctx.peer, ctx.now),
            None => warn!(host = %ctx.me, peer = %ctx.peer, "Peer does not run LABEL"),
        }
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
        _now: f64,
    ) -> bool {
        if m.to() == peer {
            return true;
        }
        peer_engine_as::<LabelDecisionEngine>(peer_engine).is_some_and(|e| e.communes_with(m.to()))
    }

    fn should_delete_sent_message(
        &mut self,
        m: &mut Message,
        _peer: HostId,
        _peer_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        !self.communes_with(m.to())
    }

    fn should_delete_old_message(
        &self,
        _m: &Message,
        _reporter: HostId,
        _reporter_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        true
    }

    fn replicate(&self, host: HostId) -> Box<dyn DecisionEngine> {
        Box::new(Self::new(self.tracker.replicate(host)))
    }

    fn local_community(&self) -> Option<&BTreeSet<HostId>> {
        Some(self.tracker.community().local_community())
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
    use dtnsim_social::SimpleCommunityDetection;

    fn engine(host: u32) -> Box<dyn DecisionEngine> {
        let proto = LabelDecisionEngine::new(ContactTracker::new(Box::new(
            SimpleCommunityDetection::new(0.0, 0.0, 100.0),
        )));
        proto.replicate(HostId(host))
    }

    fn meet(
        (ha, a): (HostId, &mut Box<dyn DecisionEngine>),
        (hb, b): (HostId, &mut Box<dyn DecisionEngine>),
        start: f64,
        end: f64,
    ) {
        let ctx = ExchangeContext {
            conn: ConnectionId(0),
            me: ha,
            peer: hb,
            now: start,
            my_location: Coord::new(0.0, 0.0),
            peer_location: Coord::new(0.0, 0.0),
            my_speed: 0.0,
            peer_speed: 0.0,
        };
        a.do_exchange_for_new_connection(&ctx, &mut **b);
        a.connection_down(ha, hb, Some(&**b), end);
        b.connection_down(hb, ha, Some(&**a), end);
    }

    #[test]
    fn test_forward_only_into_destination_community() {
        let a = engine(0);
        let mut b = engine(1);
        let mut c = engine(2);
        let m = Message::new(HostId(0), HostId(2), "m", 1, 0.0);
        assert!(!a.should_send_message_to_host(&m, HostId(1), Some(b.as_ref()), 0.0));

        meet((HostId(1), &mut b), (HostId(2), &mut c), 0.0, 500.0);
        assert!(b.local_community().unwrap().contains(&HostId(2)));
        assert!(a.should_send_message_to_host(&m, HostId(1), Some(b.as_ref()), 500.0));
        assert!(a.should_send_message_to_host(&m, HostId(2), None, 500.0));
    }

    #[test]
    fn test_short_contacts_do_not_befriend() {
        let mut a = engine(0);
        let mut b = engine(1);
        meet((HostId(0), &mut a), (HostId(1), &mut b), 0.0, 50.0);
        assert_eq!(a.local_community().unwrap().len(), 1);
    }

    #[test]
    fn test_sender_keeps_copy_inside_destination_community() {
        let mut b = engine(1);
        let mut c = engine(2);
        meet((HostId(1), &mut b), (HostId(2), &mut c), 0.0, 500.0);
        let mut to_c = Message::new(HostId(0), HostId(2), "m", 1, 0.0);
        let mut to_x = Message::new(HostId(0), HostId(7), "x", 1, 0.0);
        assert!(!b.should_delete_sent_message(&mut to_c, HostId(3), None));
        assert!(b.should_delete_sent_message(&mut to_x, HostId(3), None));
    }
}
