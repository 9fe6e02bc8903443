//! Distributed community detection
//!
//! Each host holds its own subjective view: a familiar set (peers with
//! enough cumulative contact time) and a local community that always
//! contains the host itself and its familiar set. Views grow when two hosts
//! meet ([`CommunityDetection::new_connection`], run once per link with
//! both sides mutable) and when a contact closes
//! ([`CommunityDetection::connection_lost`], run on each side).

mod kclique;
mod modularity;
mod simple;

pub use kclique::KCliqueCommunityDetection;
pub use modularity::ModularityCommunityDetection;
pub use simple::SimpleCommunityDetection;

use std::any::Any;
use std::collections::BTreeSet;
use std::fmt::Debug;

use dtnsim_core::{ConfigError, ConfigResult, HostId, Settings};

use crate::history::ContactInterval;

pub const FAMILIAR_THRESHOLD_SETTING: &str = "familiarThreshold";
pub const DEFAULT_FAMILIAR_THRESHOLD: f64 = 600.0;

pub trait CommunityDetection: Debug + Any {
    /// Exchange community knowledge with a newly met peer
    ///
    /// `peer_cd` belongs to `peer` and is updated in the same call. A peer
    /// running a different algorithm is ignored.
    fn new_connection(&mut self, me: HostId, peer: HostId, peer_cd: &mut dyn CommunityDetection);

    /// A contact with `peer` closed; `history` holds every closed interval
    /// with that peer, the newest last
    fn connection_lost(
        &mut self,
        me: HostId,
        peer: HostId,
        peer_cd: Option<&dyn CommunityDetection>,
        history: &[ContactInterval],
    );

    fn is_host_in_community(&self, host: HostId) -> bool {
        self.local_community().contains(&host)
    }

    fn local_community(&self) -> &BTreeSet<HostId>;

    fn familiar_set(&self) -> &BTreeSet<HostId>;

    /// Fresh per-host instance of this prototype, seeded with `me`
    fn replicate(&self, me: HostId) -> Box<dyn CommunityDetection>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Cumulative time covered by `history`
pub(crate) fn contact_time(history: &[ContactInterval]) -> f64 {
    history.iter().map(ContactInterval::duration).sum()
}

pub(crate) fn overlap(a: &BTreeSet<HostId>, b: &BTreeSet<HostId>) -> usize {
    a.iter().filter(|h| b.contains(h)).count()
}

/// Build the prototype named by `class` from the engine's settings
///
/// Names may be fully qualified; only the last segment is matched.
pub fn community_from_settings(
    class: &str,
    settings: &Settings,
) -> ConfigResult<Box<dyn CommunityDetection>> {
    let prototype: Box<dyn CommunityDetection> = match class.rsplit('.').next().unwrap_or(class) {
        "SimpleCommunityDetection" => Box::new(SimpleCommunityDetection::from_settings(settings)?),
        "KCliqueCommunityDetection" => Box::new(KCliqueCommunityDetection::from_settings(settings)?),
        "ModularityCommunityDetection" => {
            Box::new(ModularityCommunityDetection::from_settings(settings)?)
        }
        other => {
            return Err(ConfigError::UnknownClass {
                kind: "community detection",
                name: other.to_string(),
            });
        }
    };
    Ok(prototype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_matches_last_segment() {
        let s = Settings::new();
        let cd = community_from_settings("routing.community.KCliqueCommunityDetection", &s).unwrap();
        assert!(cd.as_any().is::<KCliqueCommunityDetection>());
        assert!(matches!(
            community_from_settings("Louvain", &s),
            Err(ConfigError::UnknownClass { .. })
        ));
    }

    #[test]
    fn test_replica_contains_itself() {
        let s = Settings::new();
        for class in [
            "SimpleCommunityDetection",
            "KCliqueCommunityDetection",
            "ModularityCommunityDetection",
        ] {
            let cd = community_from_settings(class, &s).unwrap().replicate(HostId(7));
            assert!(cd.is_host_in_community(HostId(7)));
            assert!(cd.familiar_set().is_empty());
        }
    }
}
