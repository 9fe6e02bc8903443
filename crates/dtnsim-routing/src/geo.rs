//! Geographic routing towards virtual repositories
//!
//! Every host has a virtual repository (VR): a disc of radius `vrRadius`
//! around a point hashed from its address. Hosts periodically send a
//! self-addressed check-in towards their own VR carrying their current
//! location; nodes that carry check-ins learn where their peers live.
//!
//! A data message is steered to the destination's last known location when
//! the current host knows it (a "look"), otherwise towards the destination's
//! VR. Inside the VR the message is broadcast to every peer that is also
//! inside. Transfers act as custody hand-overs: the sender deletes its copy
//! once the receiver holds it, unless the sender is itself a VR keeper.

use std::collections::{BTreeMap, BTreeSet};

use dtnsim_core::{ConfigResult, Coord, HostId, Message, PropertyValue, Settings, SimResult};
use dtnsim_net::Network;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, trace};

use crate::active::{ActiveRouter, Disposition, ForwardingPolicy, RouterCore, TransferHooks};
use crate::codes::ReceiveCode;
use crate::env::{PeerEnv, RouterEnv};
use crate::router::MessageRouter;

pub const GEO_NS: &str = "GeoRouter";
pub const MAX_VR_AREA_SETTING: &str = "maxVRArea";
pub const VR_ORIGIN_SETTING: &str = "vrOrigin";
pub const VR_RADIUS_SETTING: &str = "vrRadius";
pub const CHECK_IN_INTERVAL_SETTING: &str = "checkInInterval";
pub const NEIGHBOR_EXPIRE_SETTING: &str = "neighborExpireInterval";
pub const CHECK_IN_TTL_SETTING: &str = "checkInTtl";

pub const FOCUS_PROPERTY: &str = "GeoRouter.focus";
pub const LOOK_PROPERTY: &str = "GeoRouter.look";
pub const LOOK_TIMEOUT_PROPERTY: &str = "GeoRouter.lookTimeout";
pub const IS_CHECK_IN_PROPERTY: &str = "GeoRouter.isCheckIn";
pub const HOME_LOCATION_PROPERTY: &str = "GeoRouter.homeLocation";
pub const CHECK_IN_SEQ_PROPERTY: &str = "GeoRouter.checkInID";

const CHECK_IN_SIZE: u64 = 64;
/// Grace period added to a look timeout, in seconds
const LOOK_GRACE: f64 = 600.0;

/// Golden-ratio multiplier of the VR hash
fn hash_multiplier() -> f64 {
    (5.0_f64.sqrt() - 1.0) / 2.0
}

/// Geometry and timing shared by every geographic router of a run
#[derive(Debug, Clone, PartialEq)]
pub struct GeoConfig {
    pub max_vr_area: (f64, f64),
    pub vr_origin: Coord,
    pub vr_radius: f64,
    pub check_in_interval: f64,
    pub neighbor_expire: f64,
    /// TTL of check-ins in minutes; the router's message TTL when absent
    pub check_in_ttl: Option<f64>,
}

impl Default for GeoConfig {
    fn default() -> Self {
        Self {
            max_vr_area: (1000.0, 1000.0),
            vr_origin: Coord::new(0.0, 0.0),
            vr_radius: 50.0,
            check_in_interval: 300.0,
            neighbor_expire: 300.0,
            check_in_ttl: None,
        }
    }
}

impl GeoConfig {
    /// Read the `GeoRouter` namespace; `maxVRArea` is required
    pub fn from_settings(s: &Settings) -> ConfigResult<Self> {
        let area = s.get_csv_f64(MAX_VR_AREA_SETTING, Some(2))?;
        let origin = if s.contains(VR_ORIGIN_SETTING) {
            let o = s.get_csv_f64(VR_ORIGIN_SETTING, Some(2))?;
            Coord::new(o[0], o[1])
        } else {
            Coord::new(0.0, 0.0)
        };
        let check_in_ttl = if s.contains(CHECK_IN_TTL_SETTING) {
            Some(s.get_non_negative(CHECK_IN_TTL_SETTING)?)
        } else {
            None
        };
        Ok(Self {
            max_vr_area: (area[0], area[1]),
            vr_origin: origin,
            vr_radius: s.get_non_negative_or(VR_RADIUS_SETTING, 50.0)?,
            check_in_interval: s.get_non_negative_or(CHECK_IN_INTERVAL_SETTING, 300.0)?,
            neighbor_expire: s.get_non_negative_or(NEIGHBOR_EXPIRE_SETTING, 300.0)?,
            check_in_ttl,
        })
    }

    /// Center of the virtual repository of `host`
    pub fn hash(&self, host: HostId) -> Coord {
        let a = hash_multiplier();
        let addr = host.0 as f64;
        let x = self.max_vr_area.0 * (a * addr).fract() + self.vr_origin.x;
        let y = self.max_vr_area.1 * (a * (x + 1.0) * addr).fract() + self.vr_origin.y;
        Coord::new(x, y)
    }

    /// Whether `location` lies inside the VR of `m`'s destination
    pub fn in_vr(&self, location: Coord, m: &Message) -> bool {
        location.distance(&self.hash(m.to())) < self.vr_radius
    }
}

/// Cached location of another host
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NeighborEntry {
    pub location: Coord,
    /// When the host was at `location`
    pub located_at: f64,
    pub expires: f64,
}

impl NeighborEntry {
    fn new(location: Coord, located_at: f64, now: f64, lifetime: f64) -> Self {
        Self {
            location,
            located_at,
            expires: now.floor() + lifetime,
        }
    }

    pub fn is_expired(&self, now: f64) -> bool {
        self.expires < now
    }
}

pub fn is_check_in(m: &Message) -> bool {
    m.bool_property(IS_CHECK_IN_PROPERTY).unwrap_or(false)
}

pub fn is_looking(m: &Message) -> bool {
    m.bool_property(LOOK_PROPERTY).unwrap_or(false)
}

fn check_in_seq(m: &Message) -> i64 {
    m.int_property(CHECK_IN_SEQ_PROPERTY).unwrap_or(-1)
}

/// Steer `m` to a known location of its destination
fn do_look(m: &mut Message, location: Coord, located_at: f64, now: f64) {
    m.set_property(LOOK_PROPERTY, PropertyValue::Bool(true));
    m.set_property(FOCUS_PROPERTY, PropertyValue::Location(location));
    m.set_property(
        LOOK_TIMEOUT_PROPERTY,
        PropertyValue::Float(2.0 * now - located_at + LOOK_GRACE),
    );
}

/// Virtual-repository router
pub type GeoRouter = ActiveRouter<GeoPolicy>;

#[derive(Debug, Clone)]
pub struct GeoPolicy {
    config: GeoConfig,
    host: HostId,
    neighborhood: BTreeMap<HostId, NeighborEntry>,
    finished: BTreeSet<String>,
    /// Drawn on the first update
    next_check_in: Option<f64>,
    check_in_seq: i64,
}

impl GeoPolicy {
    pub fn new(host: HostId, config: GeoConfig) -> Self {
        Self {
            config,
            host,
            neighborhood: BTreeMap::new(),
            finished: BTreeSet::new(),
            next_check_in: None,
            check_in_seq: 0,
        }
    }

    pub fn config(&self) -> &GeoConfig {
        &self.config
    }

    pub fn neighbor(&self, host: HostId) -> Option<&NeighborEntry> {
        self.neighborhood.get(&host)
    }

    pub fn is_finished(&self, id: &str) -> bool {
        self.finished.contains(id)
    }

    fn focus(&self, m: &Message) -> Coord {
        m.location_property(FOCUS_PROPERTY)
            .unwrap_or_else(|| self.config.hash(m.to()))
    }

    fn host_location(network: &Network, host: HostId) -> Coord {
        network
            .host(host)
            .map(|h| h.location())
            .unwrap_or(Coord::new(f64::NAN, f64::NAN))
    }

    fn finish(&mut self, core: &mut RouterCore, id: &str, env: &mut PeerEnv) {
        self.finished.insert(id.to_string());
        core.delete_message(id, false, env);
    }

    fn create_check_in(&mut self, core: &mut RouterCore, env: &mut PeerEnv) {
        let here = Self::host_location(env.network, self.host);
        let mut m = Message::new(
            self.host,
            self.host,
            format!("checkIN{}_{}", self.host.0, self.check_in_seq),
            CHECK_IN_SIZE,
            env.now,
        );
        m.set_ttl(self.config.check_in_ttl.or(core.settings().msg_ttl));
        m.set_property(CHECK_IN_SEQ_PROPERTY, PropertyValue::Int(self.check_in_seq));
        m.set_property(LOOK_PROPERTY, PropertyValue::Bool(false));
        m.set_property(FOCUS_PROPERTY, PropertyValue::Location(self.config.hash(self.host)));
        m.set_property(IS_CHECK_IN_PROPERTY, PropertyValue::Bool(true));
        m.set_property(HOME_LOCATION_PROPERTY, PropertyValue::Location(here));
        self.check_in_seq += 1;
        debug!(host = %self.host, msg = m.id(), "Check-in");
        if Self::remove_old_check_ins(core, &m, env) {
            core.add_to_buffer(m, true, env);
        }
    }

    /// Keep only the newest check-in per originator
    ///
    /// Returns false when `fresh` is older than the one already held; `fresh`
    /// is then removed from the buffer if it was there.
    fn remove_old_check_ins(core: &mut RouterCore, fresh: &Message, env: &mut PeerEnv) -> bool {
        let other = core
            .messages()
            .iter()
            .find(|m| m.id() != fresh.id() && is_check_in(m) && m.to() == fresh.to())
            .map(|m| (m.id().to_string(), check_in_seq(m)));
        match other {
            Some((id, seq)) if check_in_seq(fresh) > seq => {
                core.delete_message(&id, false, env);
                true
            }
            Some(_) => {
                core.delete_message(fresh.id(), false, env);
                false
            }
            None => true,
        }
    }

    /// Refresh entries of connected peers and drop expired ones
    fn update_neighborhood(&mut self, core: &RouterCore, network: &Network, now: f64) {
        for conn in core.connections(network) {
            let Some(peer) = network.connection(conn).map(|c| c.other_host(self.host)) else {
                continue;
            };
            let entry = NeighborEntry::new(
                Self::host_location(network, peer),
                now,
                now,
                self.config.neighbor_expire,
            );
            self.neighborhood.insert(peer, entry);
        }
        self.neighborhood.retain(|_, e| !e.is_expired(now));
    }

    /// Revert looks that timed out to the hashed focus
    fn expire_looks(&self, core: &mut RouterCore, now: f64) {
        let ids: Vec<String> = core
            .messages()
            .iter()
            .filter(|m| is_looking(m))
            .filter(|m| m.float_property(LOOK_TIMEOUT_PROPERTY).is_some_and(|t| t < now))
            .map(|m| m.id().to_string())
            .collect();
        for id in ids {
            if let Some(m) = core.message_mut(&id) {
                let home = self.config.hash(m.to());
                m.set_property(LOOK_PROPERTY, PropertyValue::Bool(false));
                m.set_property(FOCUS_PROPERTY, PropertyValue::Location(home));
                trace!(host = %self.host, msg = %id, "Look expired");
            }
        }
    }
}

impl TransferHooks for GeoPolicy {
    fn transfer_refused(
        &mut self,
        core: &mut RouterCore,
        m: &Message,
        _peer: HostId,
        _peer_router: Option<&dyn MessageRouter>,
        code: ReceiveCode,
        env: &mut PeerEnv,
    ) {
        match code {
            ReceiveCode::DeniedDelivered => self.finish(core, m.id(), env),
            ReceiveCode::DeniedAlreadyInVr => {
                core.delete_message(m.id(), false, env);
            }
            _ => {}
        }
    }
}

impl ForwardingPolicy for GeoPolicy {
    const NAME: &'static str = "GeoRouter";

    fn replicate(&self, host: HostId) -> Self {
        Self::new(host, self.config.clone())
    }

    fn screen_incoming(
        &self,
        core: &RouterCore,
        m: &Message,
        from: HostId,
        env: &PeerEnv,
    ) -> Option<ReceiveCode> {
        let here = Self::host_location(env.network, self.host);
        let there = Self::host_location(env.network, from);
        if core.has_message(m.id()) && self.config.in_vr(here, m) && !self.config.in_vr(there, m) {
            return Some(ReceiveCode::DeniedAlreadyInVr);
        }
        if is_check_in(m) && m.to() == self.host {
            return Some(ReceiveCode::DeniedCheckIn);
        }
        if self.finished.contains(m.id()) {
            return Some(ReceiveCode::DeniedDelivered);
        }
        None
    }

    fn accept_new_message(&mut self, _core: &RouterCore, m: &mut Message, env: &PeerEnv) -> bool {
        match self.neighborhood.get(&m.to()) {
            Some(entry) => do_look(m, entry.location, entry.located_at, env.now),
            None => {
                m.set_property(LOOK_PROPERTY, PropertyValue::Bool(false));
                m.set_property(FOCUS_PROPERTY, PropertyValue::Location(self.config.hash(m.to())));
                m.remove_property(LOOK_TIMEOUT_PROPERTY);
            }
        }
        true
    }

    fn after_received(
        &mut self,
        core: &mut RouterCore,
        m: &Message,
        _disposition: Disposition,
        env: &mut PeerEnv,
    ) {
        if is_check_in(m) && Self::remove_old_check_ins(core, m, env) {
            let Some(home) = m.location_property(HOME_LOCATION_PROPERTY) else {
                return;
            };
            let entry = NeighborEntry::new(home, m.creation_time(), env.now, self.config.neighbor_expire);
            self.neighborhood.insert(m.from(), entry);

            let here = Self::host_location(env.network, self.host);
            if self.config.in_vr(here, m) {
                let waiting: Vec<String> = core
                    .messages()
                    .iter()
                    .filter(|b| !is_check_in(b) && b.to() == m.from())
                    .map(|b| b.id().to_string())
                    .collect();
                for id in waiting {
                    if let Some(b) = core.message_mut(&id) {
                        do_look(b, home, m.creation_time(), env.now);
                    }
                }
            }
        } else if !is_check_in(m) && !is_looking(m) {
            if let Some(entry) = self.neighborhood.get(&m.to()).copied() {
                if let Some(b) = core.message_mut(m.id()) {
                    debug!(host = %self.host, msg = m.id(), "Starting look");
                    do_look(b, entry.location, entry.located_at, env.now);
                }
            }
        }
    }

    /// Custody acknowledgement from the receiver
    fn transfer_done(
        &mut self,
        core: &mut RouterCore,
        id: &str,
        peer: HostId,
        _peer_router: Option<&dyn MessageRouter>,
        received: &Message,
        env: &mut PeerEnv,
    ) {
        if peer == received.to() {
            self.finish(core, id, env);
            return;
        }
        let here = Self::host_location(env.network, self.host);
        if !self.config.in_vr(here, received) || is_looking(received) {
            core.delete_message(id, false, env);
        }
    }

    fn forward(&mut self, core: &mut RouterCore, env: &mut RouterEnv) -> SimResult<()> {
        let now = env.now;
        let interval = self.config.check_in_interval;
        let next = *self
            .next_check_in
            .get_or_insert_with(|| now + 2.0 * interval * env.rng.random::<f64>());
        if now > next {
            self.create_check_in(core, &mut env.peer_env());
            self.next_check_in = Some(now + interval);
        }
        self.update_neighborhood(core, env.network, now);
        self.expire_looks(core, now);

        if !core.can_start_transfer(env.network) || core.is_transferring(env.network) {
            return Ok(());
        }
        if core.exchange_deliverable_messages(self, env)?.is_some() {
            return Ok(());
        }

        let here = Self::host_location(env.network, self.host);
        let conns = core.connections(env.network);
        let mut candidates = Vec::new();
        for m in core.messages() {
            let known = self.neighborhood.get(&m.to());
            let dest_outside = known.is_none() || is_check_in(m);
            let target = match known {
                Some(entry) if !dest_outside => entry.location,
                _ => self.focus(m),
            };
            let my_dist = here.distance(&target);
            let here_in_vr = my_dist < self.config.vr_radius;

            for &conn in &conns {
                let Some(peer) = env.network.connection(conn).map(|c| c.other_host(self.host)) else {
                    continue;
                };
                let peer_busy = env
                    .routers
                    .get(peer)
                    .is_none_or(|r| r.is_transferring(env.network));
                if peer_busy {
                    continue;
                }
                let peer_loc = Self::host_location(env.network, peer);
                if dest_outside && self.config.in_vr(peer_loc, m) {
                    candidates.push((m.id().to_string(), conn));
                } else if here_in_vr && dest_outside {
                    continue;
                } else if my_dist > peer_loc.distance(&target) {
                    candidates.push((m.id().to_string(), conn));
                }
            }
        }
        candidates.shuffle(&mut *env.rng);
        core.try_messages_for_connected(self, &candidates, env)?;
        Ok(())
    }
}
