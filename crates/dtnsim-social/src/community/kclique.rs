//! K-clique community detection
//!
//! Besides its own familiar set, each host keeps an approximation of the
//! familiar sets of its community members. A peer joins my community when
//! its familiar set shares at least `k - 1` hosts with my community; the
//! peer's own community members are then tested the same way using the
//! approximations the peer holds.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use dtnsim_core::{ConfigResult, HostId, Settings};
use tracing::debug;

use super::{
    CommunityDetection, DEFAULT_FAMILIAR_THRESHOLD, FAMILIAR_THRESHOLD_SETTING, contact_time,
    overlap,
};
use crate::history::ContactInterval;

pub const K_SETTING: &str = "K";
pub const DEFAULT_K: f64 = 5.0;

/// State shared by the clique-based detectors
#[derive(Debug, Clone, Default)]
pub(crate) struct CliqueView {
    pub(crate) k: f64,
    pub(crate) familiar_threshold: f64,
    pub(crate) familiar: BTreeSet<HostId>,
    pub(crate) community: BTreeSet<HostId>,
    pub(crate) familiars_of: BTreeMap<HostId, BTreeSet<HostId>>,
}

impl CliqueView {
    pub(crate) fn new(k: f64, familiar_threshold: f64) -> Self {
        Self {
            k,
            familiar_threshold,
            ..Default::default()
        }
    }

    pub(crate) fn seeded(&self, me: HostId) -> Self {
        let mut copy = Self::new(self.k, self.familiar_threshold);
        copy.community.insert(me);
        copy
    }

    fn enough_in_common(&self, familiar: Option<&BTreeSet<HostId>>) -> bool {
        let count = familiar.map_or(0, |f| overlap(f, &self.community));
        count as f64 >= self.k - 1.0
    }

    /// Try to adopt `peer` (and members of its community) into this view
    fn absorb(&mut self, me: HostId, peer: HostId, other: &CliqueView) {
        if self.community.contains(&peer) || !self.enough_in_common(Some(&other.familiar)) {
            return;
        }
        debug!(host = %me, peer = %peer, "peer joins k-clique community");
        self.community.insert(peer);
        self.familiars_of.insert(peer, other.familiar.clone());

        for &h in &other.community {
            if h == me || h == peer {
                continue;
            }
            let approx = other.familiars_of.get(&h);
            if self.enough_in_common(approx) {
                self.community.insert(h);
                self.familiars_of.insert(h, approx.cloned().unwrap_or_default());
            }
        }
    }

    /// Symmetric adoption step run once per link
    pub(crate) fn exchange(&mut self, me: HostId, peer: HostId, other: &mut CliqueView) {
        self.community.insert(me);
        other.community.insert(peer);

        self.absorb(me, peer, other);
        let mine = self.clone();
        other.absorb(peer, me, &mine);
    }

    pub(crate) fn contact_closed(
        &mut self,
        peer: HostId,
        peer_view: Option<&CliqueView>,
        history: &[ContactInterval],
    ) {
        if self.familiar.contains(&peer) {
            return;
        }
        if contact_time(history) > self.familiar_threshold {
            self.familiar.insert(peer);
            self.community.insert(peer);
            if let Some(view) = peer_view {
                self.familiars_of.insert(peer, view.familiar.clone());
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct KCliqueCommunityDetection {
    view: CliqueView,
}

impl KCliqueCommunityDetection {
    pub fn new(k: f64, familiar_threshold: f64) -> Self {
        Self {
            view: CliqueView::new(k, familiar_threshold),
        }
    }

    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        Ok(Self::new(
            settings.get_non_negative_or(K_SETTING, DEFAULT_K)?,
            settings.get_non_negative_or(FAMILIAR_THRESHOLD_SETTING, DEFAULT_FAMILIAR_THRESHOLD)?,
        ))
    }

    /// This host's approximation of `member`'s familiar set
    pub fn approximate_familiar_set(&self, member: HostId) -> Option<&BTreeSet<HostId>> {
        self.view.familiars_of.get(&member)
    }
}

impl CommunityDetection for KCliqueCommunityDetection {
    fn new_connection(&mut self, me: HostId, peer: HostId, peer_cd: &mut dyn CommunityDetection) {
        if let Some(other) = peer_cd.as_any_mut().downcast_mut::<KCliqueCommunityDetection>() {
            self.view.exchange(me, peer, &mut other.view);
        }
    }

    fn connection_lost(
        &mut self,
        _me: HostId,
        peer: HostId,
        peer_cd: Option<&dyn CommunityDetection>,
        history: &[ContactInterval],
    ) {
        let peer_view = peer_cd
            .and_then(|cd| cd.as_any().downcast_ref::<KCliqueCommunityDetection>())
            .map(|cd| &cd.view);
        self.view.contact_closed(peer, peer_view, history);
    }

    fn local_community(&self) -> &BTreeSet<HostId> {
        &self.view.community
    }

    fn familiar_set(&self) -> &BTreeSet<HostId> {
        &self.view.familiar
    }

    fn replicate(&self, me: HostId) -> Box<dyn CommunityDetection> {
        Box::new(Self {
            view: self.view.seeded(me),
        })
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

    fn contact() -> Vec<ContactInterval> {
        vec![ContactInterval { start: 0.0, end: 1000.0 }]
    }

    fn node(k: f64, id: u32) -> Box<dyn CommunityDetection> {
        KCliqueCommunityDetection::new(k, 600.0).replicate(HostId(id))
    }

    /// Make `a` and `b` familiar with each other
    fn befriend(nodes: &mut [Box<dyn CommunityDetection>], a: usize, b: usize) {
        let (ha, hb) = (HostId(a as u32), HostId(b as u32));
        nodes[a].connection_lost(ha, hb, None, &contact());
        nodes[b].connection_lost(hb, ha, None, &contact());
    }

    #[test]
    fn test_peer_needs_k_minus_one_common_members() {
        let mut nodes: Vec<_> = (0..4).map(|i| node(3.0, i)).collect();
        // 0 knows 2 and 3; 1 knows 2 and 3
        befriend(&mut nodes, 0, 2);
        befriend(&mut nodes, 0, 3);
        befriend(&mut nodes, 1, 2);
        befriend(&mut nodes, 1, 3);

        let (left, right) = nodes.split_at_mut(1);
        left[0].new_connection(HostId(0), HostId(1), right[0].as_mut());
        assert!(nodes[0].is_host_in_community(HostId(1)));
        assert!(nodes[1].is_host_in_community(HostId(0)));
    }

    #[test]
    fn test_single_common_member_is_not_enough() {
        let mut nodes: Vec<_> = (0..3).map(|i| node(3.0, i)).collect();
        befriend(&mut nodes, 0, 2);
        befriend(&mut nodes, 1, 2);
        let (left, right) = nodes.split_at_mut(1);
        left[0].new_connection(HostId(0), HostId(1), right[0].as_mut());
        assert!(!nodes[0].is_host_in_community(HostId(1)));
    }

    #[test]
    fn test_adoption_records_familiar_approximation() {
        let mut nodes: Vec<_> = (0..3).map(|i| node(2.0, i)).collect();
        befriend(&mut nodes, 0, 2);
        befriend(&mut nodes, 1, 2);
        let (left, right) = nodes.split_at_mut(1);
        left[0].new_connection(HostId(0), HostId(1), right[0].as_mut());
        let kc = nodes[0]
            .as_any()
            .downcast_ref::<KCliqueCommunityDetection>()
            .unwrap();
        assert!(kc.approximate_familiar_set(HostId(1)).unwrap().contains(&HostId(2)));
    }
}
