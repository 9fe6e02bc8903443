//! Arena of hosts, interfaces and connections
//!
//! All link policy runs here, against handles into the arenas. Link
//! formation and teardown are queued as [`LinkChange`]s; the driver drains
//! them after each host's interface update and notifies listeners and
//! routers.

use std::collections::{BTreeMap, BTreeSet};

use dtnsim_core::{
    ConnectionId, Coord, HostId, InterfaceId, ModuleCommBus, RANGE_ID, SCAN_INTERVAL_ID,
    SPEED_ID, SimError, SimResult,
};
use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::connection::{Connection, Proxy};
use crate::grid::ConnectivityGrid;
use crate::interface::{InterfaceConfig, LinkPolicy, NetworkInterface};

/// A host as seen by the connectivity engine
#[derive(Debug)]
pub struct HostNode {
    id: HostId,
    name: String,
    group: String,
    location: Coord,
    speed: f64,
    interfaces: Vec<InterfaceId>,
    comm_bus: ModuleCommBus,
}

impl HostNode {
    pub fn id(&self) -> HostId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn location(&self) -> Coord {
        self.location
    }

    /// Current movement speed in m/s
    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn interfaces(&self) -> &[InterfaceId] {
        &self.interfaces
    }

    pub fn comm_bus(&self) -> &ModuleCommBus {
        &self.comm_bus
    }
}

/// Topology change awaiting dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkChange {
    Up {
        conn: ConnectionId,
        from: HostId,
        to: HostId,
    },
    Down {
        conn: ConnectionId,
        from: HostId,
        to: HostId,
    },
}

#[derive(Debug)]
pub struct Network {
    hosts: Vec<HostNode>,
    interfaces: Vec<NetworkInterface>,
    connections: Vec<Connection>,
    grids: BTreeMap<String, ConnectivityGrid>,
    /// Access point to the mobiles it currently has in range
    ap_peers: BTreeMap<InterfaceId, BTreeSet<InterfaceId>>,
    internet_members: BTreeMap<String, Vec<InterfaceId>>,
    changes: Vec<LinkChange>,
    cell_size_mult: f64,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    pub fn new() -> Self {
        Self {
            hosts: Vec::new(),
            interfaces: Vec::new(),
            connections: Vec::new(),
            grids: BTreeMap::new(),
            ap_peers: BTreeMap::new(),
            internet_members: BTreeMap::new(),
            changes: Vec::new(),
            cell_size_mult: 1.0,
        }
    }

    /// Scale grid cells to `mult` times the medium range (at least 1)
    pub fn with_cell_size_mult(mut self, mult: f64) -> Self {
        self.cell_size_mult = mult.max(1.0);
        self
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Register a host under the next address
    pub fn add_host(
        &mut self,
        id: HostId,
        name: impl Into<String>,
        group: impl Into<String>,
        location: Coord,
    ) -> SimResult<HostId> {
        if id.index() != self.hosts.len() {
            return Err(SimError::Invariant(format!(
                "host address {id} out of sequence (expected h{})",
                self.hosts.len()
            )));
        }
        self.hosts.push(HostNode {
            id,
            name: name.into(),
            group: group.into(),
            location,
            speed: 0.0,
            interfaces: Vec::new(),
            comm_bus: ModuleCommBus::new(),
        });
        Ok(id)
    }

    /// Bind an interface built from `config` to `host`
    pub fn add_interface(
        &mut self,
        host: HostId,
        id: InterfaceId,
        config: &InterfaceConfig,
        rng: &mut StdRng,
    ) -> SimResult<InterfaceId> {
        if id.index() != self.interfaces.len() {
            return Err(SimError::Invariant(format!(
                "interface address {id} out of sequence"
            )));
        }
        let location = self.host(host).ok_or(SimError::UnknownHost(host))?.location;
        let iface = NetworkInterface::from_config(config, id, host, rng);
        let cell = iface.range * self.cell_size_mult;
        match &iface.policy {
            LinkPolicy::SimpleBroadcast => {
                self.grid_for(&iface.medium, cell).add(id, location);
            }
            LinkPolicy::Internet => {
                self.internet_members
                    .entry(iface.medium.clone())
                    .or_default()
                    .push(id);
            }
            LinkPolicy::AccessPoint { media } => {
                for medium in media.clone() {
                    self.grid_for(&medium, cell).add(id, location);
                }
                self.ap_peers.insert(id, BTreeSet::new());
            }
        }

        let node = &mut self.hosts[host.index()];
        for (key, value) in [
            (RANGE_ID, iface.range),
            (SPEED_ID, iface.speed as f64),
            (SCAN_INTERVAL_ID, iface.scan_interval),
        ] {
            node.comm_bus.add_property(key, value);
            node.comm_bus.subscribe(key, id.0);
        }
        node.interfaces.push(id);
        self.interfaces.push(iface);
        Ok(id)
    }

    fn grid_for(&mut self, medium: &str, cell: f64) -> &mut ConnectivityGrid {
        let grid = self
            .grids
            .entry(medium.to_string())
            .or_insert_with(|| ConnectivityGrid::new(cell));
        grid.ensure_cell_size(cell);
        grid
    }

    // ========================================================================
    // Queries
    // ========================================================================

    pub fn host(&self, id: HostId) -> Option<&HostNode> {
        self.hosts.get(id.index())
    }

    pub fn hosts(&self) -> &[HostNode] {
        &self.hosts
    }

    pub fn host_count(&self) -> usize {
        self.hosts.len()
    }

    pub fn interface(&self, id: InterfaceId) -> Option<&NetworkInterface> {
        self.interfaces.get(id.index())
    }

    pub fn interfaces(&self) -> &[NetworkInterface] {
        &self.interfaces
    }

    pub fn connection(&self, id: ConnectionId) -> Option<&Connection> {
        self.connections.get(id.index())
    }

    pub fn connection_mut(&mut self, id: ConnectionId) -> Option<&mut Connection> {
        self.connections.get_mut(id.index())
    }

    /// Every connection ever formed, live or not
    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn grid(&self, medium: &str) -> Option<&ConnectivityGrid> {
        self.grids.get(medium)
    }

    /// Mobiles an access point currently bridges
    pub fn ap_peers(&self, ap: InterfaceId) -> Option<&BTreeSet<InterfaceId>> {
        self.ap_peers.get(&ap)
    }

    /// Live connections of all interfaces of `host`
    pub fn host_connections(&self, host: HostId) -> Vec<ConnectionId> {
        let Some(node) = self.host(host) else {
            return Vec::new();
        };
        node.interfaces
            .iter()
            .flat_map(|i| self.interfaces[i.index()].connections.iter().copied())
            .collect()
    }

    /// Whether any live link of `host` carries a message
    pub fn is_host_busy(&self, host: HostId) -> bool {
        self.host_connections(host)
            .into_iter()
            .any(|c| !self.connections[c.index()].is_ready_for_transfer())
    }

    /// Live connection between two hosts, if any
    pub fn connection_between(&self, a: HostId, b: HostId) -> Option<ConnectionId> {
        self.host_connections(a)
            .into_iter()
            .find(|c| self.connections[c.index()].other_host(a) == b)
    }

    fn location_of(&self, iface: InterfaceId) -> Coord {
        self.hosts[self.interfaces[iface.index()].host.index()].location
    }

    /// Both hosts lie within the shorter of the two ranges
    pub fn within_range(&self, a: InterfaceId, b: InterfaceId) -> bool {
        let (ia, ib) = (&self.interfaces[a.index()], &self.interfaces[b.index()]);
        let d = self.location_of(a).distance(&self.location_of(b));
        d <= ia.range.min(ib.range)
    }

    /// `a` has a live link whose near side is `b`
    pub fn is_connected(&self, a: InterfaceId, b: InterfaceId) -> bool {
        self.interfaces[a.index()]
            .connections
            .iter()
            .any(|&c| self.connections[c.index()].other_interface(a) == b)
    }

    /// `a` has a live link whose far endpoint is `b`
    fn has_link_between(&self, a: InterfaceId, b: InterfaceId) -> bool {
        self.interfaces[a.index()]
            .connections
            .iter()
            .any(|&c| self.connections[c.index()].endpoint_interface(a) == b)
    }

    // ========================================================================
    // Movement and tuning
    // ========================================================================

    pub fn set_location(&mut self, host: HostId, location: Coord, speed: f64) {
        if let Some(node) = self.hosts.get_mut(host.index()) {
            node.location = location;
            node.speed = speed;
        }
    }

    pub fn comm_bus_mut(&mut self, host: HostId) -> Option<&mut ModuleCommBus> {
        self.hosts.get_mut(host.index()).map(|n| &mut n.comm_bus)
    }

    /// Apply queued comm-bus changes to the host's interfaces
    pub fn apply_bus_notices(&mut self, host: HostId) {
        let Some(node) = self.hosts.get_mut(host.index()) else {
            return;
        };
        for notice in node.comm_bus.drain_notices() {
            let idx = notice.subscriber as usize;
            let Some(iface) = self.interfaces.get_mut(idx) else {
                continue;
            };
            match notice.key.as_str() {
                RANGE_ID => {
                    iface.range = notice.value.max(0.0);
                    let cell = iface.range * self.cell_size_mult;
                    let media = match &iface.policy {
                        LinkPolicy::AccessPoint { media } => media.clone(),
                        _ => vec![iface.medium.clone()],
                    };
                    for medium in media {
                        if let Some(grid) = self.grids.get_mut(&medium) {
                            grid.ensure_cell_size(cell);
                        }
                    }
                }
                SPEED_ID => iface.speed = notice.value.max(0.0) as u64,
                SCAN_INTERVAL_ID => iface.scan_interval = notice.value.max(0.0),
                _ => {}
            }
        }
    }

    // ========================================================================
    // Link policy
    // ========================================================================

    /// Apply bus notices, then update every interface of `host`
    pub fn update_host(&mut self, host: HostId, now: f64, rng: &mut StdRng) {
        self.apply_bus_notices(host);
        let Some(node) = self.host(host) else {
            return;
        };
        for iface in node.interfaces.clone() {
            self.update_interface(iface, now, rng);
        }
    }

    /// Per-tick maintenance of one interface's links
    pub fn update_interface(&mut self, iface: InterfaceId, now: f64, rng: &mut StdRng) {
        match self.interfaces[iface.index()].policy.clone() {
            LinkPolicy::SimpleBroadcast => self.update_simple(iface, now, rng),
            LinkPolicy::Internet => self.update_internet(iface),
            LinkPolicy::AccessPoint { media } => self.update_access_point(iface, &media, now, rng),
        }
    }

    /// Offer `other` as a link candidate to `iface`
    pub fn connect(&mut self, iface: InterfaceId, other: InterfaceId, now: f64, rng: &mut StdRng) {
        match self.interfaces[iface.index()].policy {
            LinkPolicy::SimpleBroadcast => self.connect_simple(iface, other, now, rng),
            LinkPolicy::Internet => self.create_connection(iface, other, now, rng),
            LinkPolicy::AccessPoint { .. } => self.attach_mobile(iface, other, false, now, rng),
        }
    }

    /// Link `iface` to `other` without range, scan or activeness checks
    pub fn create_connection(
        &mut self,
        iface: InterfaceId,
        other: InterfaceId,
        now: f64,
        rng: &mut StdRng,
    ) {
        if self.interfaces[iface.index()].is_access_point() {
            self.attach_mobile(iface, other, true, now, rng);
            return;
        }
        if self.same_host(iface, other) || self.is_connected(iface, other) {
            return;
        }
        let speed = self.interfaces[iface.index()]
            .speed
            .min(self.interfaces[other.index()].speed);
        self.link_up(iface, other, speed, None);
    }

    /// Tear down every link from `iface` to `host`
    pub fn destroy_connection(&mut self, iface: InterfaceId, host: HostId) {
        let me = self.interfaces[iface.index()].host;
        for c in self.interfaces[iface.index()].connections.clone() {
            if self.connections[c.index()].other_host(me) == host {
                self.disconnect(c);
            }
        }
    }

    fn same_host(&self, a: InterfaceId, b: InterfaceId) -> bool {
        self.interfaces[a.index()].host == self.interfaces[b.index()].host
    }

    fn update_simple(&mut self, iface: InterfaceId, now: f64, rng: &mut StdRng) {
        let location = self.location_of(iface);
        let medium = self.interfaces[iface.index()].medium.clone();
        if let Some(grid) = self.grids.get_mut(&medium) {
            grid.update_location(iface, location);
        }

        if !self.interfaces[iface.index()].is_active(now, rng) {
            for c in self.interfaces[iface.index()].connections.clone() {
                self.disconnect(c);
            }
            return;
        }

        for c in self.interfaces[iface.index()].connections.clone() {
            let other = self.connections[c.index()].other_interface(iface);
            if !self.within_range(iface, other) {
                self.disconnect(c);
            }
        }

        let near = self
            .grids
            .get(&medium)
            .map(|g| g.get_near(iface))
            .unwrap_or_default();
        for other in near {
            self.connect_simple(iface, other, now, rng);
        }
    }

    fn connect_simple(&mut self, iface: InterfaceId, other: InterfaceId, now: f64, rng: &mut StdRng) {
        if iface == other || self.same_host(iface, other) {
            return;
        }
        if !self.interfaces[iface.index()].is_scanning(now) {
            return;
        }
        if !self.interfaces[other.index()].accepting_connections(now, rng) {
            return;
        }
        if !self.within_range(iface, other) || self.is_connected(iface, other) {
            return;
        }
        let speed = self.interfaces[iface.index()]
            .speed
            .min(self.interfaces[other.index()].speed);
        self.link_up(iface, other, speed, None);
    }

    fn update_internet(&mut self, iface: InterfaceId) {
        if self.interfaces[iface.index()].mesh_formed {
            return;
        }
        let medium = &self.interfaces[iface.index()].medium;
        let members = self
            .internet_members
            .get(medium)
            .cloned()
            .unwrap_or_default();
        for other in members {
            if other == iface || self.same_host(iface, other) || self.is_connected(iface, other) {
                continue;
            }
            let speed = self.interfaces[iface.index()]
                .speed
                .min(self.interfaces[other.index()].speed);
            self.link_up(iface, other, speed, None);
        }
        self.interfaces[iface.index()].mesh_formed = true;
    }

    fn update_access_point(
        &mut self,
        ap: InterfaceId,
        media: &[String],
        now: f64,
        rng: &mut StdRng,
    ) {
        let location = self.location_of(ap);
        for medium in media {
            if let Some(grid) = self.grids.get_mut(medium) {
                grid.update_location(ap, location);
            }
        }

        let attached: Vec<InterfaceId> = self
            .ap_peers
            .get(&ap)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default();
        for mobile in attached {
            let gone = !self.within_range(ap, mobile)
                || !self.interfaces[mobile.index()].is_active(now, rng);
            if gone {
                if let Some(set) = self.ap_peers.get_mut(&ap) {
                    set.remove(&mobile);
                }
                self.detach_mobile(ap, mobile);
            }
        }

        for medium in media {
            let near = self
                .grids
                .get(medium)
                .map(|g| g.get_near(ap))
                .unwrap_or_default();
            for mobile in near {
                self.attach_mobile(ap, mobile, false, now, rng);
            }
        }
    }

    /// Bridge a newly seen mobile to every mobile of every other AP
    fn attach_mobile(
        &mut self,
        ap: InterfaceId,
        mobile: InterfaceId,
        force: bool,
        now: f64,
        rng: &mut StdRng,
    ) {
        if mobile == ap || self.interfaces[mobile.index()].is_access_point() {
            return;
        }
        let serves = match &self.interfaces[ap.index()].policy {
            LinkPolicy::AccessPoint { media } => {
                media.contains(&self.interfaces[mobile.index()].medium)
            }
            _ => false,
        };
        if !serves || self.ap_peers.get(&ap).is_some_and(|s| s.contains(&mobile)) {
            return;
        }
        if !force
            && (!self.interfaces[mobile.index()].is_active(now, rng)
                || !self.within_range(ap, mobile))
        {
            return;
        }

        let remote: Vec<(InterfaceId, InterfaceId)> = self
            .ap_peers
            .iter()
            .filter(|(other_ap, _)| **other_ap != ap)
            .flat_map(|(other_ap, set)| set.iter().map(move |m| (*other_ap, *m)))
            .collect();
        for (far_ap, far) in remote {
            if self.same_host(far, mobile) || self.has_link_between(mobile, far) {
                continue;
            }
            let speed = [ap, far_ap, mobile, far]
                .iter()
                .map(|i| self.interfaces[i.index()].speed)
                .min()
                .unwrap_or(0);
            self.link_up(
                far,
                mobile,
                speed,
                Some(Proxy {
                    from_ap: far_ap,
                    to_ap: ap,
                }),
            );
        }
        self.ap_peers.entry(ap).or_default().insert(mobile);
        trace!(%ap, %mobile, "mobile attached to access point");
    }

    /// Tear down proxied links that reach `mobile` through `ap`
    fn detach_mobile(&mut self, ap: InterfaceId, mobile: InterfaceId) {
        for c in self.interfaces[mobile.index()].connections.clone() {
            let conn = &self.connections[c.index()];
            if let Some(proxy) = conn.proxy() {
                let near_ap = if conn.endpoints().0 == mobile {
                    proxy.from_ap
                } else {
                    proxy.to_ap
                };
                if near_ap == ap {
                    self.disconnect(c);
                }
            }
        }
    }

    fn link_up(
        &mut self,
        from: InterfaceId,
        to: InterfaceId,
        speed: u64,
        proxy: Option<Proxy>,
    ) -> ConnectionId {
        let id = ConnectionId(self.connections.len() as u32);
        let from_host = self.interfaces[from.index()].host;
        let to_host = self.interfaces[to.index()].host;
        let conn = match proxy {
            Some(p) => Connection::proxied(id, (from_host, from), (to_host, to), p, speed),
            None => Connection::new(id, (from_host, from), (to_host, to), speed),
        };
        self.connections.push(conn);
        self.interfaces[from.index()].connections.push(id);
        self.interfaces[to.index()].connections.push(id);
        self.changes.push(LinkChange::Up {
            conn: id,
            from: from_host,
            to: to_host,
        });
        debug!(conn = %id, from = %from_host, to = %to_host, speed, proxied = proxy.is_some(), "link up");
        id
    }

    /// Take a link down and remove it from both endpoints
    pub fn disconnect(&mut self, id: ConnectionId) {
        let Some(conn) = self.connections.get_mut(id.index()) else {
            return;
        };
        if !conn.is_up() {
            return;
        }
        conn.set_down();
        let (a, b) = conn.endpoints();
        let (from, to) = (conn.from_host(), conn.to_host());
        for iface in [a, b] {
            self.interfaces[iface.index()].connections.retain(|&c| c != id);
        }
        self.changes.push(LinkChange::Down { conn: id, from, to });
        debug!(conn = %id, %from, %to, "link down");
    }

    /// Take the queued topology changes
    pub fn drain_changes(&mut self) -> Vec<LinkChange> {
        std::mem::take(&mut self.changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn two_hosts(distance: f64) -> (Network, StdRng) {
        let mut rng = StdRng::seed_from_u64(0);
        let mut net = Network::new();
        let bt = InterfaceConfig::simple_broadcast("bt", 10.0, 100);
        for (i, x) in [0.0, distance].into_iter().enumerate() {
            let h = net
                .add_host(HostId(i as u32), format!("n{i}"), "n", Coord::new(x, 0.0))
                .unwrap();
            net.add_interface(h, InterfaceId(i as u32), &bt, &mut rng)
                .unwrap();
        }
        (net, rng)
    }

    #[test]
    fn test_link_forms_in_range() {
        let (mut net, mut rng) = two_hosts(5.0);
        net.update_host(HostId(0), 0.0, &mut rng);
        let changes = net.drain_changes();
        assert_eq!(changes.len(), 1);
        assert!(matches!(changes[0], LinkChange::Up { from: HostId(0), to: HostId(1), .. }));
        let c = net.connection_between(HostId(1), HostId(0)).unwrap();
        assert_eq!(net.connection(c).unwrap().speed(), 100);

        // the peer does not create a second link
        net.update_host(HostId(1), 0.0, &mut rng);
        assert!(net.drain_changes().is_empty());
        assert_eq!(net.interface(InterfaceId(1)).unwrap().connections(), &[c]);
    }

    #[test]
    fn test_no_link_out_of_range() {
        let (mut net, mut rng) = two_hosts(20.0);
        net.update_host(HostId(0), 0.0, &mut rng);
        net.update_host(HostId(1), 0.0, &mut rng);
        assert!(net.drain_changes().is_empty());
    }

    #[test]
    fn test_link_drops_when_peer_leaves() {
        let (mut net, mut rng) = two_hosts(5.0);
        net.update_host(HostId(0), 0.0, &mut rng);
        net.drain_changes();
        net.set_location(HostId(1), Coord::new(50.0, 0.0), 1.0);
        net.update_host(HostId(1), 1.0, &mut rng);
        let changes = net.drain_changes();
        assert!(matches!(changes[0], LinkChange::Down { .. }));
        assert!(net.host_connections(HostId(0)).is_empty());
        assert!(net.host_connections(HostId(1)).is_empty());
    }

    #[test]
    fn test_duplicate_address_rejected() {
        let mut net = Network::new();
        net.add_host(HostId(0), "a", "g", Coord::default()).unwrap();
        assert!(net.add_host(HostId(0), "b", "g", Coord::default()).is_err());
    }

    #[test]
    fn test_comm_bus_shrinks_range() {
        let (mut net, mut rng) = two_hosts(5.0);
        net.update_host(HostId(0), 0.0, &mut rng);
        net.drain_changes();
        net.comm_bus_mut(HostId(0)).unwrap().update_property(RANGE_ID, 2.0);
        net.update_host(HostId(0), 1.0, &mut rng);
        assert_eq!(net.interface(InterfaceId(0)).unwrap().range(), 2.0);
        assert!(matches!(net.drain_changes()[0], LinkChange::Down { .. }));
    }

    #[test]
    fn test_destroy_connection() {
        let (mut net, mut rng) = two_hosts(5.0);
        net.update_host(HostId(0), 0.0, &mut rng);
        net.drain_changes();
        net.destroy_connection(InterfaceId(1), HostId(0));
        assert!(net.connection_between(HostId(0), HostId(1)).is_none());
        assert_eq!(net.drain_changes().len(), 1);
    }
}
