//! SIMPLE community detection
//!
//! A peer is adopted when enough of its familiar set already belongs to my
//! community (ratio above `lambda`); two communities merge when an adoption
//! happened and their overlap exceeds `gamma` of their union.

use std::any::Any;
use std::collections::BTreeSet;

use dtnsim_core::{ConfigResult, HostId, Settings};
use tracing::debug;

use super::{
    CommunityDetection, DEFAULT_FAMILIAR_THRESHOLD, FAMILIAR_THRESHOLD_SETTING, contact_time,
    overlap,
};
use crate::history::ContactInterval;

pub const LAMBDA_SETTING: &str = "lambda";
pub const GAMMA_SETTING: &str = "gamma";

#[derive(Debug, Clone)]
pub struct SimpleCommunityDetection {
    lambda: f64,
    gamma: f64,
    familiar_threshold: f64,
    familiar: BTreeSet<HostId>,
    community: BTreeSet<HostId>,
}

impl SimpleCommunityDetection {
    pub fn new(lambda: f64, gamma: f64, familiar_threshold: f64) -> Self {
        Self {
            lambda,
            gamma,
            familiar_threshold,
            familiar: BTreeSet::new(),
            community: BTreeSet::new(),
        }
    }

    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        Ok(Self::new(
            settings.get_f64_or(LAMBDA_SETTING, 0.0)?,
            settings.get_f64_or(GAMMA_SETTING, 0.0)?,
            settings.get_non_negative_or(FAMILIAR_THRESHOLD_SETTING, DEFAULT_FAMILIAR_THRESHOLD)?,
        ))
    }

    /// Share of `familiar` already inside `community`; zero for an empty set
    fn familiar_ratio(familiar: &BTreeSet<HostId>, community: &BTreeSet<HostId>) -> f64 {
        if familiar.is_empty() {
            return 0.0;
        }
        overlap(familiar, community) as f64 / familiar.len() as f64
    }
}

impl CommunityDetection for SimpleCommunityDetection {
    fn new_connection(&mut self, me: HostId, peer: HostId, peer_cd: &mut dyn CommunityDetection) {
        let Some(other) = peer_cd.as_any_mut().downcast_mut::<SimpleCommunityDetection>() else {
            return;
        };
        self.community.insert(me);
        other.community.insert(peer);

        let mut adopt_peer = false;
        if !self.community.contains(&peer) {
            adopt_peer = Self::familiar_ratio(&other.familiar, &self.community) > self.lambda;
            if adopt_peer {
                self.community.insert(peer);
            }
        }
        let mut adopt_me = false;
        if !other.community.contains(&me) {
            adopt_me = Self::familiar_ratio(&self.familiar, &other.community) > other.lambda;
            if adopt_me {
                other.community.insert(me);
            }
        }
        if !(adopt_peer || adopt_me) {
            return;
        }

        let union = self.community.union(&other.community).count();
        let common = overlap(&self.community, &other.community);
        if adopt_peer && common as f64 > self.gamma * union as f64 {
            debug!(host = %me, peer = %peer, "merging peer community");
            self.community.extend(other.community.iter().copied());
        }
        if adopt_me && common as f64 > other.gamma * union as f64 {
            other.community.extend(self.community.iter().copied());
        }
    }

    fn connection_lost(
        &mut self,
        me: HostId,
        peer: HostId,
        _peer_cd: Option<&dyn CommunityDetection>,
        history: &[ContactInterval],
    ) {
        if self.familiar.contains(&peer) {
            return;
        }
        if contact_time(history) > self.familiar_threshold {
            debug!(host = %me, peer = %peer, "peer became familiar");
            self.familiar.insert(peer);
            self.community.insert(peer);
        }
    }

    fn local_community(&self) -> &BTreeSet<HostId> {
        &self.community
    }

    fn familiar_set(&self) -> &BTreeSet<HostId> {
        &self.familiar
    }

    fn replicate(&self, me: HostId) -> Box<dyn CommunityDetection> {
        let mut copy = Self::new(self.lambda, self.gamma, self.familiar_threshold);
        copy.community.insert(me);
        Box::new(copy)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
