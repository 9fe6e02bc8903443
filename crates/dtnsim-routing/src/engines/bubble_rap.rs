//! Distributed BubbleRap
//!
//! Messages bubble up the global centrality ranking until they reach a host
//! in the destination's community, then climb the local ranking inside it.

use std::any::Any;
use std::collections::BTreeSet;

use dtnsim_core::{ConfigResult, HostId, Message, Settings};
use dtnsim_social::{Centrality, centrality_from_settings, community_from_settings};
use tracing::warn;

use super::{
    CENTRALITY_ALG_SETTING, COMMUNITY_ALG_SETTING, ContactTracker, DEFAULT_CENTRALITY_ALG,
    DEFAULT_COMMUNITY_ALG, peer_engine_as,
};
use crate::decision::{DecisionEngine, ExchangeContext};

#[derive(Debug)]
pub struct DistributedBubbleRap {
    tracker: ContactTracker,
    centrality: Box<dyn Centrality>,
}

impl DistributedBubbleRap {
    pub fn new(tracker: ContactTracker, centrality: Box<dyn Centrality>) -> Self {
        Self { tracker, centrality }
    }

    pub fn from_settings(s: &Settings) -> ConfigResult<Self> {
        let community = s.get_or(COMMUNITY_ALG_SETTING, DEFAULT_COMMUNITY_ALG);
        let centrality = s.get_or(CENTRALITY_ALG_SETTING, DEFAULT_CENTRALITY_ALG);
        Ok(Self::new(
            ContactTracker::new(community_from_settings(community, s)?),
            centrality_from_settings(centrality, s)?,
        ))
    }

    pub fn tracker(&self) -> &ContactTracker {
        &self.tracker
    }

    pub fn global_centrality(&self, now: f64) -> f64 {
        self.centrality.global(self.tracker.history(), now)
    }

    pub fn local_centrality(&self, now: f64) -> f64 {
        self.centrality
            .local(self.tracker.history(), self.tracker.community(), now)
    }

    pub fn communes_with(&self, host: HostId) -> bool {
        self.tracker.community().is_host_in_community(host)
    }

    /// Peer shares the destination's community while this host does not
    fn peer_is_closer(&self, dest: HostId, peer_engine: Option<&dyn DecisionEngine>) -> bool {
        peer_engine_as::<DistributedBubbleRap>(peer_engine)
            .is_some_and(|peer| peer.communes_with(dest) && !self.communes_with(dest))
    }
}

impl DecisionEngine for DistributedBubbleRap {
    fn connection_up(&mut self, _me: HostId, _peer: HostId, _now: f64) {}

    fn connection_down(
        &mut self,
        me: HostId,
        peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
        now: f64,
    ) {
        let peer_community = peer_engine_as::<DistributedBubbleRap>(peer_engine)
            .map(|e| e.tracker.community());
        self.tracker.contact_lost(me, peer, peer_community, now);
    }

    fn do_exchange_for_new_connection(&mut self, ctx: &ExchangeContext, peer: &mut dyn DecisionEngine) {
        match peer.as_any_mut().downcast_mut::<DistributedBubbleRap>() {
            Some(other) => self
                .tracker
                .exchange(&mut other.tracker, ctx.me, ctx.peer, ctx.now),
            None => warn!(host = %ctx.me, peer = %ctx.peer, "Peer does not run BubbleRap"),
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
        now: f64,
    ) -> bool {
        let dest = m.to();
        if dest == peer {
            return true;
        }
        let Some(other) = peer_engine_as::<DistributedBubbleRap>(peer_engine) else {
            return false;
        };
        match (self.communes_with(dest), other.communes_with(dest)) {
            (false, true) => true,
            (true, false) => false,
            (true, true) => other.local_centrality(now) > self.local_centrality(now),
            (false, false) => other.global_centrality(now) > self.global_centrality(now),
        }
    }

    fn should_delete_sent_message(
        &mut self,
        m: &mut Message,
        _peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        self.peer_is_closer(m.to(), peer_engine)
    }

    fn should_delete_old_message(
        &self,
        m: &Message,
        _reporter: HostId,
        reporter_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        self.peer_is_closer(m.to(), reporter_engine)
    }

    fn replicate(&self, host: HostId) -> Box<dyn DecisionEngine> {
        Box::new(Self::new(
            self.tracker.replicate(host),
            self.centrality.replicate(),
        ))
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
    use dtnsim_social::{DegreeCentrality, SimpleCommunityDetection};

    fn engine(host: u32) -> Box<dyn DecisionEngine> {
        let proto = DistributedBubbleRap::new(
            ContactTracker::new(Box::new(SimpleCommunityDetection::new(0.0, 0.0, 100.0))),
            Box::new(DegreeCentrality),
        );
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

    fn bubble(e: &dyn DecisionEngine) -> &DistributedBubbleRap {
        e.as_any().downcast_ref().unwrap()
    }

    #[test]
    fn test_global_ranking_outside_community() {
        let a = engine(0);
        let mut hub = engine(1);
        for i in 10..13 {
            let mut other = engine(i);
            meet((HostId(1), &mut hub), (HostId(i), &mut other), 0.0, 10.0);
        }
        assert_eq!(bubble(hub.as_ref()).global_centrality(20.0), 3.0);

        let m = Message::new(HostId(0), HostId(9), "m", 1, 0.0);
        assert!(a.should_send_message_to_host(&m, HostId(1), Some(hub.as_ref()), 20.0));
        assert!(!hub.should_send_message_to_host(&m, HostId(0), Some(a.as_ref()), 20.0));
        assert!(a.should_send_message_to_host(&m, HostId(9), None, 20.0));
    }

    #[test]
    fn test_community_member_takes_over() {
        let mut a = engine(0);
        let mut b = engine(1);
        let mut dest = engine(2);
        meet((HostId(1), &mut b), (HostId(2), &mut dest), 0.0, 500.0);

        let mut m = Message::new(HostId(0), HostId(2), "m", 1, 0.0);
        assert!(a.should_send_message_to_host(&m, HostId(1), Some(b.as_ref()), 500.0));
        assert!(!b.should_send_message_to_host(&m, HostId(0), Some(a.as_ref()), 500.0));

        assert!(a.should_delete_sent_message(&mut m, HostId(1), Some(b.as_ref())));
        assert!(a.should_delete_old_message(&m, HostId(1), Some(b.as_ref())));
        assert!(!b.should_delete_old_message(&m, HostId(0), Some(a.as_ref())));
    }

    #[test]
    fn test_local_ranking_inside_community() {
        let mut a = engine(0);
        let mut b = engine(1);
        let mut dest = engine(2);
        let mut extra = engine(3);
        meet((HostId(0), &mut a), (HostId(2), &mut dest), 0.0, 500.0);
        meet((HostId(1), &mut b), (HostId(2), &mut dest), 0.0, 500.0);
        meet((HostId(1), &mut b), (HostId(3), &mut extra), 600.0, 1200.0);

        let m = Message::new(HostId(5), HostId(2), "m", 1, 0.0);
        assert!(a.should_send_message_to_host(&m, HostId(1), Some(b.as_ref()), 1200.0));
        assert!(!b.should_send_message_to_host(&m, HostId(0), Some(a.as_ref()), 1200.0));
    }
}
