//! Active-router template
//!
//! [`ActiveRouter`] implements the transport half of every router: the
//! message buffer with oldest-first eviction, admission control, TTL sweeps
//! and bookkeeping of in-flight transfers. What to forward, and how to react
//! to a peer's answer, is left to a [`ForwardingPolicy`].
//!
//! ## Per-tick step
//!
//! 1. Advance in-flight transfers: completed ones are finalized on the
//!    receiver and reported to the policy, transfers on links that went down
//!    are aborted
//! 2. Sweep expired messages once per [`TTL_CHECK_INTERVAL`] while idle
//! 3. Run the policy's forwarding logic

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use dtnsim_core::{
    ConfigError, ConfigResult, ConnectionId, HostId, Message, Settings, SimError, SimResult,
};
use dtnsim_net::Network;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use tracing::{debug, trace};

use crate::codes::ReceiveCode;
use crate::decision::DecisionEngine;
use crate::env::{PeerEnv, RouterEnv};
use crate::router::{LinkState, MessageRouter};

pub const BUFFER_SIZE_SETTING: &str = "bufferSize";
pub const MSG_TTL_SETTING: &str = "msgTtl";
pub const DELETE_DELIVERED_SETTING: &str = "deleteDelivered";
pub const SEND_QUEUE_SETTING: &str = "sendQueue";

/// Seconds between two sweeps for expired messages
pub const TTL_CHECK_INTERVAL: f64 = 60.0;

/// Order in which buffered messages are offered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SendQueueMode {
    /// Shuffled with the integer simulation time as seed
    #[default]
    Random,
    /// Oldest receive time first
    Fifo,
}

/// Buffer and queue settings shared by all routers of a group
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RouterSettings {
    /// Buffer capacity in bytes; unlimited when absent
    pub buffer_size: Option<u64>,
    /// Default TTL of created messages, in minutes
    pub msg_ttl: Option<f64>,
    /// Drop a message its final recipient reports as already received
    pub delete_delivered: bool,
    pub send_queue: SendQueueMode,
}

impl RouterSettings {
    /// Read the router keys of a group namespace
    pub fn from_settings(s: &Settings) -> ConfigResult<Self> {
        let buffer_size = if s.contains(BUFFER_SIZE_SETTING) {
            Some(s.get_non_negative(BUFFER_SIZE_SETTING)? as u64)
        } else {
            None
        };
        let msg_ttl = if s.contains(MSG_TTL_SETTING) {
            Some(s.get_non_negative(MSG_TTL_SETTING)?)
        } else {
            None
        };
        let send_queue = match s.get_i64_or(SEND_QUEUE_SETTING, 1)? {
            1 => SendQueueMode::Random,
            2 => SendQueueMode::Fifo,
            other => {
                return Err(ConfigError::InvalidValue {
                    key: s.full_key(SEND_QUEUE_SETTING),
                    value: other.to_string(),
                    reason: "expected 1 (random) or 2 (FIFO)".to_string(),
                });
            }
        };
        Ok(Self {
            buffer_size,
            msg_ttl,
            delete_delivered: s.get_bool_or(DELETE_DELIVERED_SETTING, false)?,
            send_queue,
        })
    }
}

/// How a received message is handled by its receiver
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disposition {
    /// This host is a final recipient of the message
    pub final_recipient: bool,
    /// Keep a copy in the buffer for further forwarding
    pub keep: bool,
}

/// Buffer, delivery record and in-flight transfers of one host
#[derive(Debug, Clone)]
pub struct RouterCore {
    host: HostId,
    settings: RouterSettings,
    buffer: Vec<Message>,
    /// Copies admitted but still on the wire, keyed by id and sender
    incoming: BTreeMap<(String, HostId), Message>,
    delivered: BTreeSet<String>,
    /// Transfers this host started and has not yet finalized
    sending: Vec<(ConnectionId, String)>,
    last_ttl_check: f64,
}

impl RouterCore {
    pub fn new(host: HostId, settings: RouterSettings) -> Self {
        Self {
            host,
            settings,
            buffer: Vec::new(),
            incoming: BTreeMap::new(),
            delivered: BTreeSet::new(),
            sending: Vec::new(),
            last_ttl_check: 0.0,
        }
    }

    pub fn host(&self) -> HostId {
        self.host
    }

    pub fn settings(&self) -> &RouterSettings {
        &self.settings
    }

    pub fn messages(&self) -> &[Message] {
        &self.buffer
    }

    pub fn message(&self, id: &str) -> Option<&Message> {
        self.buffer.iter().find(|m| m.id() == id)
    }

    pub fn message_mut(&mut self, id: &str) -> Option<&mut Message> {
        self.buffer.iter_mut().find(|m| m.id() == id)
    }

    pub fn has_message(&self, id: &str) -> bool {
        self.message(id).is_some()
    }

    pub fn is_delivered(&self, id: &str) -> bool {
        self.delivered.contains(id)
    }

    /// Bytes held in the buffer
    pub fn occupancy(&self) -> u64 {
        self.buffer.iter().map(Message::size).sum()
    }

    /// Free buffer bytes; `None` for an unlimited buffer
    pub fn free_space(&self) -> Option<i64> {
        self.settings
            .buffer_size
            .map(|cap| cap as i64 - self.occupancy() as i64)
    }

    pub fn is_sending(&self, id: &str) -> bool {
        self.sending.iter().any(|(_, m)| m == id)
    }

    /// Sending, or any link of the host carries a message
    pub fn is_transferring(&self, network: &Network) -> bool {
        !self.sending.is_empty() || network.is_host_busy(self.host)
    }

    /// Live connections of the host
    pub fn connections(&self, network: &Network) -> Vec<ConnectionId> {
        network.host_connections(self.host)
    }

    /// There is something to send and someone to send it to
    pub fn can_start_transfer(&self, network: &Network) -> bool {
        !self.buffer.is_empty() && !network.host_connections(self.host).is_empty()
    }

    pub fn add_to_buffer(&mut self, m: Message, new: bool, env: &mut PeerEnv) {
        if new {
            env.events.new_message(&m, env.now);
        }
        self.buffer.push(m);
    }

    /// Remove `id` from the buffer, notifying listeners
    pub fn delete_message(&mut self, id: &str, dropped: bool, env: &mut PeerEnv) -> bool {
        let Some(pos) = self.buffer.iter().position(|m| m.id() == id) else {
            return false;
        };
        let m = self.buffer.remove(pos);
        trace!(host = %self.host, msg = id, dropped, "Message removed");
        env.events.deleted(&m, self.host, dropped, env.now);
        true
    }

    /// Evict oldest messages until `size` bytes are free
    ///
    /// Messages being sent are never evicted. `make_room(0)` reclaims an
    /// over-committed buffer.
    pub fn make_room(&mut self, size: u64, env: &mut PeerEnv) -> bool {
        let Some(capacity) = self.settings.buffer_size else {
            return true;
        };
        if size > capacity {
            return false;
        }
        let mut free = capacity as i64 - self.occupancy() as i64;
        while free < size as i64 {
            let Some((id, freed)) = self.oldest_evictable() else {
                return false;
            };
            free += freed as i64;
            self.delete_message(&id, true, env);
        }
        true
    }

    fn oldest_evictable(&self) -> Option<(String, u64)> {
        // self-originated messages have no receive time and go first
        let age = |m: &Message| m.receive_time().unwrap_or(f64::NEG_INFINITY);
        self.buffer
            .iter()
            .filter(|m| !self.is_sending(m.id()))
            .min_by(|a, b| age(a).total_cmp(&age(b)))
            .map(|m| (m.id().to_string(), m.size()))
    }

    /// Standard admission checks for an offered message
    pub fn check_receiving(&mut self, m: &Message, env: &mut PeerEnv) -> ReceiveCode {
        if self.is_transferring(env.network) {
            return ReceiveCode::TryLaterBusy;
        }
        if self.has_message(m.id()) || self.is_delivered(m.id()) {
            return ReceiveCode::DeniedOld;
        }
        if m.ttl_remaining(env.now) <= 0.0 && m.to() != self.host {
            return ReceiveCode::DeniedTtl;
        }
        if !self.make_room(m.size(), env) {
            return ReceiveCode::DeniedNoSpace;
        }
        ReceiveCode::Ok
    }

    fn begin_receiving(&mut self, m: &Message, from: HostId, env: &mut PeerEnv) {
        let mut copy = m.clone();
        copy.add_hop(self.host);
        env.events.transfer_started(m, from, self.host, env.now);
        self.incoming.insert((m.id().to_string(), from), copy);
    }

    fn take_incoming(&mut self, id: &str, from: HostId) -> SimResult<Message> {
        self.incoming
            .remove(&(id.to_string(), from))
            .ok_or_else(|| SimError::NotInIncoming {
                host: self.host,
                id: id.to_string(),
            })
    }

    /// Drop expired messages, at most once per check interval and only while idle
    pub fn sweep_expired(&mut self, env: &mut PeerEnv) {
        if env.now - self.last_ttl_check < TTL_CHECK_INTERVAL
            || !self.sending.is_empty()
            || !self.incoming.is_empty()
        {
            return;
        }
        let expired: Vec<String> = self
            .buffer
            .iter()
            .filter(|m| m.ttl_remaining(env.now) <= 0.0)
            .map(|m| m.id().to_string())
            .collect();
        for id in expired {
            debug!(host = %self.host, msg = %id, "TTL expired");
            self.delete_message(&id, true, env);
        }
        self.last_ttl_check = env.now;
    }

    /// Sort `items` by the send queue mode
    pub fn order_by_queue<T>(&self, items: &mut [T], id_of: impl Fn(&T) -> &str, now: f64) {
        match self.settings.send_queue {
            SendQueueMode::Random => {
                let mut rng = StdRng::seed_from_u64(now as u64);
                items.shuffle(&mut rng);
            }
            SendQueueMode::Fifo => {
                let key = |id: &str| {
                    self.message(id)
                        .map(|m| m.receive_time().unwrap_or(m.creation_time()))
                        .unwrap_or(f64::INFINITY)
                };
                items.sort_by(|a, b| key(id_of(a)).total_cmp(&key(id_of(b))));
            }
        }
    }

    /// Ids of the buffered messages in queue order
    pub fn queued_messages(&self, now: f64) -> Vec<String> {
        let mut ids: Vec<String> = self.buffer.iter().map(|m| m.id().to_string()).collect();
        self.order_by_queue(&mut ids, |id| id.as_str(), now);
        ids
    }

    /// Offer `id` over `conn`; on OK the transfer is put on the wire
    ///
    /// Non-OK answers are passed to `hooks` after the delete-delivered rule.
    pub fn start_transfer(
        &mut self,
        hooks: &mut dyn TransferHooks,
        id: &str,
        conn: ConnectionId,
        env: &mut RouterEnv,
    ) -> SimResult<ReceiveCode> {
        let link = env
            .network
            .connection(conn)
            .ok_or(SimError::UnknownConnection(conn))?;
        if !link.is_ready_for_transfer() {
            return Ok(ReceiveCode::TryLaterBusy);
        }
        let peer = link.other_host(self.host);
        let m = self.message(id).cloned().ok_or_else(|| {
            SimError::Invariant(format!("{} offered {id} without holding it", self.host))
        })?;

        let code = {
            let receiver = env
                .routers
                .get_mut(peer)
                .ok_or(SimError::RouterUnavailable(peer))?;
            let mut penv = PeerEnv {
                now: env.now,
                network: &*env.network,
                events: &mut *env.events,
            };
            receiver.receive_message(&m, self.host, &mut penv)
        };
        trace!(host = %self.host, peer = %peer, msg = id, %code, "Offered message");

        if code.is_ok() {
            env.network
                .connection_mut(conn)
                .ok_or(SimError::UnknownConnection(conn))?
                .begin_transfer(self.host, m, env.now)?;
            self.sending.push((conn, id.to_string()));
            debug!(host = %self.host, peer = %peer, msg = id, "Transfer started");
            return Ok(code);
        }

        let peer_router = env.routers.get(peer);
        let mut penv = PeerEnv {
            now: env.now,
            network: &*env.network,
            events: &mut *env.events,
        };
        if self.settings.delete_delivered && code == ReceiveCode::DeniedOld && m.to() == peer {
            self.delete_message(id, false, &mut penv);
        }
        hooks.transfer_refused(self, &m, peer, peer_router, code, &mut penv);
        Ok(code)
    }

    /// Try (message, connection) pairs in order until one starts
    pub fn try_messages_for_connected(
        &mut self,
        hooks: &mut dyn TransferHooks,
        pairs: &[(String, ConnectionId)],
        env: &mut RouterEnv,
    ) -> SimResult<Option<(String, ConnectionId)>> {
        for (id, conn) in pairs {
            if !self.has_message(id) {
                continue;
            }
            if self.start_transfer(hooks, id, *conn, env)?.is_ok() {
                return Ok(Some((id.clone(), *conn)));
            }
        }
        Ok(None)
    }

    /// Try `ids` in order over one connection
    ///
    /// Stops at the first accepted message or at a try-later answer.
    pub fn try_all_messages(
        &mut self,
        hooks: &mut dyn TransferHooks,
        conn: ConnectionId,
        ids: &[String],
        env: &mut RouterEnv,
    ) -> SimResult<Option<String>> {
        for id in ids {
            if !self.has_message(id) {
                continue;
            }
            let code = self.start_transfer(hooks, id, conn, env)?;
            if code.is_ok() {
                return Ok(Some(id.clone()));
            }
            if code.is_try_later() {
                return Ok(None);
            }
        }
        Ok(None)
    }

    /// Try `ids` over every connection in turn
    pub fn try_messages_to_connections(
        &mut self,
        hooks: &mut dyn TransferHooks,
        ids: &[String],
        conns: &[ConnectionId],
        env: &mut RouterEnv,
    ) -> SimResult<Option<ConnectionId>> {
        for &conn in conns {
            if self.try_all_messages(hooks, conn, ids, env)?.is_some() {
                return Ok(Some(conn));
            }
        }
        Ok(None)
    }

    /// Flood: every buffered message, in queue order, to every connection
    pub fn try_all_messages_to_all_connections(
        &mut self,
        hooks: &mut dyn TransferHooks,
        env: &mut RouterEnv,
    ) -> SimResult<Option<ConnectionId>> {
        let conns = self.connections(env.network);
        if conns.is_empty() || self.buffer.is_empty() {
            return Ok(None);
        }
        let ids = self.queued_messages(env.now);
        self.try_messages_to_connections(hooks, &ids, &conns, env)
    }

    /// Messages whose destination is a current peer, in queue order
    pub fn deliverable_messages(&self, network: &Network, now: f64) -> Vec<(String, ConnectionId)> {
        let mut pairs = Vec::new();
        for conn in self.connections(network) {
            let Some(link) = network.connection(conn) else {
                continue;
            };
            let peer = link.other_host(self.host);
            for m in self.buffer.iter().filter(|m| m.to() == peer) {
                pairs.push((m.id().to_string(), conn));
            }
        }
        self.order_by_queue(&mut pairs, |(id, _)| id.as_str(), now);
        pairs
    }

    /// Hand messages straight to connected destinations
    pub fn exchange_deliverable_messages(
        &mut self,
        hooks: &mut dyn TransferHooks,
        env: &mut RouterEnv,
    ) -> SimResult<Option<ConnectionId>> {
        let pairs = self.deliverable_messages(env.network, env.now);
        if pairs.is_empty() {
            return Ok(None);
        }
        Ok(self
            .try_messages_for_connected(hooks, &pairs, env)?
            .map(|(_, conn)| conn))
    }
}

/// Sender-side reaction to a refused offer
pub trait TransferHooks {
    /// `peer` answered `code` to the offer of `m`
    fn transfer_refused(
        &mut self,
        core: &mut RouterCore,
        m: &Message,
        peer: HostId,
        peer_router: Option<&dyn MessageRouter>,
        code: ReceiveCode,
        env: &mut PeerEnv,
    ) {
        let _ = (core, m, peer, peer_router, code, env);
    }
}

/// Forwarding half of a router built on [`ActiveRouter`]
pub trait ForwardingPolicy: TransferHooks + std::fmt::Debug + Sized + 'static {
    /// Router name used in logs
    const NAME: &'static str;

    /// Fresh policy state for `host`, configured like this prototype
    fn replicate(&self, host: HostId) -> Self;

    /// Refusal decided before the standard admission checks
    fn screen_incoming(
        &self,
        core: &RouterCore,
        m: &Message,
        from: HostId,
        env: &PeerEnv,
    ) -> Option<ReceiveCode> {
        let _ = (core, m, from, env);
        None
    }

    /// Prepare or veto a message originated at this host
    fn accept_new_message(&mut self, core: &RouterCore, m: &mut Message, env: &PeerEnv) -> bool {
        let _ = (core, m, env);
        true
    }

    /// Decide finality and retention of a completely received copy
    fn classify_received(&mut self, core: &RouterCore, m: &mut Message) -> Disposition {
        let final_recipient = m.to() == core.host();
        Disposition {
            final_recipient,
            keep: !final_recipient,
        }
    }

    /// Runs on the receiver after a copy has been stored and reported
    fn after_received(
        &mut self,
        core: &mut RouterCore,
        m: &Message,
        disposition: Disposition,
        env: &mut PeerEnv,
    ) {
        let _ = (core, m, disposition, env);
    }

    /// Runs on the sender once `peer` holds `received`, its copy of `id`
    fn transfer_done(
        &mut self,
        core: &mut RouterCore,
        id: &str,
        peer: HostId,
        peer_router: Option<&dyn MessageRouter>,
        received: &Message,
        env: &mut PeerEnv,
    ) {
        let _ = (core, id, peer, peer_router, received, env);
    }

    fn transfer_aborted(&mut self, core: &mut RouterCore, id: &str, peer: HostId) {
        let _ = (core, id, peer);
    }

    fn changed_connection(
        &mut self,
        core: &mut RouterCore,
        conn: ConnectionId,
        peer: HostId,
        state: LinkState,
        env: &mut RouterEnv,
    ) {
        let _ = (core, conn, peer, state, env);
    }

    /// Start new transfers
    fn forward(&mut self, core: &mut RouterCore, env: &mut RouterEnv) -> SimResult<()>;

    fn decision_engine(&self) -> Option<&dyn DecisionEngine> {
        None
    }

    fn decision_engine_mut(&mut self) -> Option<&mut dyn DecisionEngine> {
        None
    }
}

/// A router assembled from the shared transport and a forwarding policy
#[derive(Debug, Clone)]
pub struct ActiveRouter<P: ForwardingPolicy> {
    core: RouterCore,
    policy: P,
}

impl<P: ForwardingPolicy> ActiveRouter<P> {
    pub fn new(host: HostId, settings: RouterSettings, policy: P) -> Self {
        Self {
            core: RouterCore::new(host, settings),
            policy,
        }
    }

    pub fn core(&self) -> &RouterCore {
        &self.core
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut P {
        &mut self.policy
    }

    /// Finalize completed transfers and abort those on dead links
    fn advance_transfers(&mut self, env: &mut RouterEnv) -> SimResult<()> {
        let host = self.core.host;
        let pending = self.core.sending.clone();
        for entry in pending {
            let (conn, ref id) = entry;
            let link = env
                .network
                .connection(conn)
                .ok_or(SimError::UnknownConnection(conn))?;
            let peer = link.other_host(host);

            if link.is_message_transferred(env.now) {
                env.network
                    .connection_mut(conn)
                    .ok_or(SimError::UnknownConnection(conn))?
                    .take_transfer();
                let received = {
                    let receiver = env
                        .routers
                        .get_mut(peer)
                        .ok_or(SimError::RouterUnavailable(peer))?;
                    let mut penv = PeerEnv {
                        now: env.now,
                        network: &*env.network,
                        events: &mut *env.events,
                    };
                    receiver.message_transferred(id, host, &mut penv)?
                };
                self.core.sending.retain(|e| *e != entry);
                debug!(router = P::NAME, host = %host, peer = %peer, msg = %id, "Transfer done");
                let peer_router = env.routers.get(peer);
                let mut penv = PeerEnv {
                    now: env.now,
                    network: &*env.network,
                    events: &mut *env.events,
                };
                self.policy
                    .transfer_done(&mut self.core, id, peer, peer_router, &received, &mut penv);
            } else if !link.is_up() {
                self.core.sending.retain(|e| *e != entry);
                self.policy.transfer_aborted(&mut self.core, id, peer);
                let in_flight = env
                    .network
                    .connection_mut(conn)
                    .ok_or(SimError::UnknownConnection(conn))?
                    .take_transfer();
                if in_flight.is_some() {
                    let receiver = env
                        .routers
                        .get_mut(peer)
                        .ok_or(SimError::RouterUnavailable(peer))?;
                    let mut penv = PeerEnv {
                        now: env.now,
                        network: &*env.network,
                        events: &mut *env.events,
                    };
                    receiver.message_aborted(id, host, &mut penv)?;
                }
                debug!(router = P::NAME, host = %host, peer = %peer, msg = %id, "Transfer aborted");
            } else {
                continue;
            }

            if self.core.free_space().is_some_and(|free| free < 0) {
                self.core.make_room(0, &mut env.peer_env());
            }
        }
        Ok(())
    }
}

impl<P: ForwardingPolicy> MessageRouter for ActiveRouter<P> {
    fn host(&self) -> HostId {
        self.core.host
    }

    fn messages(&self) -> &[Message] {
        &self.core.buffer
    }

    fn is_delivered(&self, id: &str) -> bool {
        self.core.is_delivered(id)
    }

    fn is_transferring(&self, network: &Network) -> bool {
        self.core.is_transferring(network)
    }

    fn receive_message(&mut self, m: &Message, from: HostId, env: &mut PeerEnv) -> ReceiveCode {
        if let Some(code) = self.policy.screen_incoming(&self.core, m, from, env) {
            return code;
        }
        let code = self.core.check_receiving(m, env);
        if code.is_ok() {
            self.core.begin_receiving(m, from, env);
        }
        code
    }

    fn message_transferred(&mut self, id: &str, from: HostId, env: &mut PeerEnv) -> SimResult<Message> {
        let host = self.core.host;
        let mut m = self.core.take_incoming(id, from)?;
        m.set_receive_time(env.now);

        let disposition = self.policy.classify_received(&self.core, &mut m);
        let first_delivery = disposition.final_recipient && !self.core.is_delivered(id);
        if disposition.keep {
            self.core.add_to_buffer(m.clone(), false, env);
        }
        if first_delivery {
            self.core.delivered.insert(id.to_string());
        }
        env.events.transferred(&m, from, host, first_delivery, env.now);

        if first_delivery && m.response_size() > 0 {
            let reply = m.response(env.now);
            debug!(host = %host, msg = reply.id(), "Creating response");
            self.create_new_message(reply, env);
        }
        self.policy.after_received(&mut self.core, &m, disposition, env);
        Ok(m)
    }

    fn message_aborted(&mut self, id: &str, from: HostId, env: &mut PeerEnv) -> SimResult<()> {
        let m = self.core.take_incoming(id, from)?;
        env.events.transfer_aborted(&m, from, self.core.host, env.now);
        Ok(())
    }

    fn create_new_message(&mut self, mut m: Message, env: &mut PeerEnv) -> bool {
        if m.ttl().is_none() {
            m.set_ttl(self.core.settings.msg_ttl);
        }
        if !self.policy.accept_new_message(&self.core, &mut m, env) {
            debug!(router = P::NAME, host = %self.core.host, msg = m.id(), "New message vetoed");
            return false;
        }
        if !self.core.make_room(m.size(), env) {
            debug!(host = %self.core.host, msg = m.id(), "No room for new message");
            return false;
        }
        self.core.add_to_buffer(m, true, env);
        true
    }

    fn delete_message(&mut self, id: &str, dropped: bool, env: &mut PeerEnv) -> bool {
        self.core.delete_message(id, dropped, env)
    }

    fn changed_connection(&mut self, conn: ConnectionId, state: LinkState, env: &mut RouterEnv) {
        let Some(peer) = env
            .network
            .connection(conn)
            .map(|c| c.other_host(self.core.host))
        else {
            return;
        };
        self.policy
            .changed_connection(&mut self.core, conn, peer, state, env);
    }

    fn update(&mut self, env: &mut RouterEnv) -> SimResult<()> {
        self.advance_transfers(env)?;
        self.core.sweep_expired(&mut env.peer_env());
        self.policy.forward(&mut self.core, env)
    }

    fn replicate(&self, host: HostId, _rng: &mut StdRng) -> Box<dyn MessageRouter> {
        Box::new(ActiveRouter {
            core: RouterCore::new(host, self.core.settings.clone()),
            policy: self.policy.replicate(host),
        })
    }

    fn decision_engine(&self) -> Option<&dyn DecisionEngine> {
        self.policy.decision_engine()
    }

    fn decision_engine_mut(&mut self) -> Option<&mut dyn DecisionEngine> {
        self.policy.decision_engine_mut()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
