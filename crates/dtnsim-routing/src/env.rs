//! What a router can reach while it runs

use dtnsim_core::{EventBus, HostId};
use dtnsim_net::Network;
use rand::rngs::StdRng;

use crate::router::MessageRouter;

/// Routers of every host, indexed by address
///
/// A slot is empty while its router is taken out for an update.
#[derive(Debug, Default)]
pub struct RouterTable {
    slots: Vec<Option<Box<dyn MessageRouter>>>,
}

impl RouterTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `router` for `host`, replacing any previous one
    pub fn insert(&mut self, host: HostId, router: Box<dyn MessageRouter>) {
        let i = host.index();
        if self.slots.len() <= i {
            self.slots.resize_with(i + 1, || None);
        }
        self.slots[i] = Some(router);
    }

    pub fn get(&self, host: HostId) -> Option<&dyn MessageRouter> {
        self.slots.get(host.index())?.as_deref()
    }

    pub fn get_mut(&mut self, host: HostId) -> Option<&mut (dyn MessageRouter + 'static)> {
        self.slots.get_mut(host.index())?.as_deref_mut()
    }

    /// Take a router out of its slot
    pub fn take(&mut self, host: HostId) -> Option<Box<dyn MessageRouter>> {
        self.slots.get_mut(host.index())?.take()
    }

    /// Put a taken router back
    pub fn restore(&mut self, router: Box<dyn MessageRouter>) {
        let host = router.host();
        self.insert(host, router);
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn MessageRouter> {
        self.slots.iter().filter_map(|s| s.as_deref())
    }
}

/// Full environment of the router being updated
pub struct RouterEnv<'a> {
    pub now: f64,
    pub network: &'a mut Network,
    pub routers: &'a mut RouterTable,
    pub events: &'a mut EventBus,
    pub rng: &'a mut StdRng,
}

impl RouterEnv<'_> {
    /// Narrow view handed to a peer router
    pub fn peer_env(&mut self) -> PeerEnv<'_> {
        PeerEnv {
            now: self.now,
            network: &*self.network,
            events: &mut *self.events,
        }
    }
}

/// Environment of a router called by another one
pub struct PeerEnv<'a> {
    pub now: f64,
    pub network: &'a Network,
    pub events: &'a mut EventBus,
}
