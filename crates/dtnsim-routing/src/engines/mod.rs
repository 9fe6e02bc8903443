//! Decision engines for the [`DecisionEngineRouter`](crate::DecisionEngineRouter)

mod bubble_rap;
mod label;
mod prophet;
mod pubsub_prophet;
mod spray_focus;

pub use bubble_rap::*;
pub use label::*;
pub use prophet::*;
pub use pubsub_prophet::*;
pub use spray_focus::*;

use dtnsim_core::HostId;
use dtnsim_social::{CommunityDetection, ContactHistory};

use crate::decision::DecisionEngine;

pub const COMMUNITY_ALG_SETTING: &str = "communityDetectAlg";
pub const CENTRALITY_ALG_SETTING: &str = "centralityAlg";
pub const DEFAULT_COMMUNITY_ALG: &str = "SimpleCommunityDetection";
pub const DEFAULT_CENTRALITY_ALG: &str = "SWindowCentrality";

/// The peer's engine, if it is of type `T`
pub(crate) fn peer_engine_as<T: 'static>(engine: Option<&dyn DecisionEngine>) -> Option<&T> {
    engine.and_then(|e| e.as_any().downcast_ref::<T>())
}

/// Contact history and community view of a community-aware engine
#[derive(Debug)]
pub struct ContactTracker {
    history: ContactHistory,
    community: Box<dyn CommunityDetection>,
}

impl ContactTracker {
    pub fn new(community: Box<dyn CommunityDetection>) -> Self {
        Self {
            history: ContactHistory::new(),
            community,
        }
    }

    pub fn history(&self) -> &ContactHistory {
        &self.history
    }

    pub fn community(&self) -> &dyn CommunityDetection {
        self.community.as_ref()
    }

    pub fn replicate(&self, me: HostId) -> Self {
        Self::new(self.community.replicate(me))
    }

    /// Open the contact on both sides and let the communities meet
    pub fn exchange(&mut self, other: &mut ContactTracker, me: HostId, peer: HostId, now: f64) {
        self.history.open_contact(peer, now);
        other.history.open_contact(me, now);
        self.community
            .new_connection(me, peer, other.community.as_mut());
    }

    /// Close the contact with `peer` and report it to the community
    pub fn contact_lost(
        &mut self,
        me: HostId,
        peer: HostId,
        peer_community: Option<&dyn CommunityDetection>,
        now: f64,
    ) {
        self.history.close_contact(peer, now);
        self.community
            .connection_lost(me, peer, peer_community, self.history.intervals(peer));
    }
}
