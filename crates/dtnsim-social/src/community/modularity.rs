//! Modularity-style community detection
//!
//! Works like [`KCliqueCommunityDetection`](super::KCliqueCommunityDetection)
//! but first pools the familiar-set approximations both hosts hold for
//! members they have in common, so knowledge spreads with every contact.

use std::any::Any;
use std::collections::BTreeSet;

use dtnsim_core::{ConfigResult, HostId, Settings};

use super::kclique::{CliqueView, K_SETTING};
use super::{CommunityDetection, DEFAULT_FAMILIAR_THRESHOLD, FAMILIAR_THRESHOLD_SETTING};
use crate::history::ContactInterval;

pub const DEFAULT_MODULARITY_K: f64 = 3.0;

#[derive(Debug, Clone)]
pub struct ModularityCommunityDetection {
    view: CliqueView,
}

impl ModularityCommunityDetection {
    pub fn new(k: f64, familiar_threshold: f64) -> Self {
        Self {
            view: CliqueView::new(k, familiar_threshold),
        }
    }

    pub fn from_settings(settings: &Settings) -> ConfigResult<Self> {
        Ok(Self::new(
            settings.get_non_negative_or(K_SETTING, DEFAULT_MODULARITY_K)?,
            settings.get_non_negative_or(FAMILIAR_THRESHOLD_SETTING, DEFAULT_FAMILIAR_THRESHOLD)?,
        ))
    }

    pub fn approximate_familiar_set(&self, member: HostId) -> Option<&BTreeSet<HostId>> {
        self.view.familiars_of.get(&member)
    }

    /// Extend my approximations with the peer's for members we both track
    fn pool_approximations(&mut self, other: &CliqueView) {
        for (member, approx) in self.view.familiars_of.iter_mut() {
            if let Some(theirs) = other.familiars_of.get(member) {
                approx.extend(theirs.iter().copied());
            }
        }
    }
}

impl CommunityDetection for ModularityCommunityDetection {
    fn new_connection(&mut self, me: HostId, peer: HostId, peer_cd: &mut dyn CommunityDetection) {
        let Some(other) = peer_cd.as_any_mut().downcast_mut::<ModularityCommunityDetection>() else {
            return;
        };
        self.pool_approximations(&other.view);
        self.view.exchange(me, peer, &mut other.view);
    }

    fn connection_lost(
        &mut self,
        _me: HostId,
        peer: HostId,
        peer_cd: Option<&dyn CommunityDetection>,
        history: &[ContactInterval],
    ) {
        let peer_view = peer_cd
            .and_then(|cd| cd.as_any().downcast_ref::<ModularityCommunityDetection>())
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
