//! Decision-engine router
//!
//! A single transport for many forwarding strategies: every policy question
//! (accept, save, forward, delete) is answered by a pluggable
//! [`DecisionEngine`]. When a link comes up, the engine on the link's
//! exchange side is handed the peer's engine so that both sides can be
//! updated in one step.

use std::any::Any;
use std::collections::{BTreeSet, HashSet};
use std::fmt::Debug;

use dtnsim_core::{ConnectionId, Coord, HostId, Message, SimResult};
use tracing::{trace, warn};

use crate::active::{ActiveRouter, Disposition, ForwardingPolicy, RouterCore, TransferHooks};
use crate::codes::ReceiveCode;
use crate::env::{PeerEnv, RouterEnv};
use crate::router::{LinkState, MessageRouter};

/// What both sides of a new link know when exchanging state
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExchangeContext {
    pub conn: ConnectionId,
    pub me: HostId,
    pub peer: HostId,
    pub now: f64,
    pub my_location: Coord,
    pub peer_location: Coord,
    pub my_speed: f64,
    pub peer_speed: f64,
}

/// Forwarding strategy plugged into a [`DecisionEngineRouter`]
pub trait DecisionEngine: Debug + Any {
    /// Link to `peer` came up; runs on both sides
    fn connection_up(&mut self, me: HostId, peer: HostId, now: f64);

    /// Link to `peer` went down; runs on both sides
    fn connection_down(
        &mut self,
        me: HostId,
        peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
        now: f64,
    );

    /// Symmetric state exchange; runs once per link on the exchange side
    fn do_exchange_for_new_connection(&mut self, ctx: &ExchangeContext, peer: &mut dyn DecisionEngine);

    /// Accept, and possibly annotate, a message originated at this host
    fn new_message(&mut self, m: &mut Message) -> bool;

    fn is_final_dest(&mut self, m: &mut Message, host: HostId) -> bool;

    fn should_save_received_message(&self, m: &Message, host: HostId) -> bool;

    /// Forwarding predicate; must not change engine state
    fn should_send_message_to_host(
        &self,
        m: &Message,
        peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
        now: f64,
    ) -> bool;

    /// After `m` reached `peer`; may also update the kept copy
    fn should_delete_sent_message(
        &mut self,
        m: &mut Message,
        peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
    ) -> bool;

    /// `reporter` answered that it already has `m`
    fn should_delete_old_message(
        &self,
        m: &Message,
        reporter: HostId,
        reporter_engine: Option<&dyn DecisionEngine>,
    ) -> bool;

    fn replicate(&self, host: HostId) -> Box<dyn DecisionEngine>;

    /// Local community of community-aware engines
    fn local_community(&self) -> Option<&BTreeSet<HostId>> {
        None
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Router whose forwarding is decided by a [`DecisionEngine`]
pub type DecisionEngineRouter = ActiveRouter<DecisionPolicy>;

#[derive(Debug)]
pub struct DecisionPolicy {
    name: &'static str,
    engine: Box<dyn DecisionEngine>,
    /// Ids reported delivered by other hosts
    tombstones: HashSet<String>,
    /// Answer offers of delivered or tombstoned ids with a cure
    cures: bool,
}

impl DecisionPolicy {
    pub fn new(engine: Box<dyn DecisionEngine>) -> Self {
        Self::named("DecisionEngineRouter", engine)
    }

    /// Policy reported under another router name
    pub fn named(name: &'static str, engine: Box<dyn DecisionEngine>) -> Self {
        Self {
            name,
            engine,
            tombstones: HashSet::new(),
            cures: true,
        }
    }

    /// Never answer with [`ReceiveCode::DeniedDelivered`]
    ///
    /// Used where one id has many final recipients, as with topics.
    pub fn without_cures(mut self) -> Self {
        self.cures = false;
        self
    }

    pub fn spreads_cures(&self) -> bool {
        self.cures
    }

    /// Router name this policy was configured under
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn engine(&self) -> &dyn DecisionEngine {
        self.engine.as_ref()
    }

    pub fn is_tombstoned(&self, id: &str) -> bool {
        self.tombstones.contains(id)
    }
}

impl TransferHooks for DecisionPolicy {
    fn transfer_refused(
        &mut self,
        core: &mut RouterCore,
        m: &Message,
        peer: HostId,
        peer_router: Option<&dyn MessageRouter>,
        code: ReceiveCode,
        env: &mut PeerEnv,
    ) {
        match code {
            ReceiveCode::DeniedDelivered => {
                self.tombstones.insert(m.id().to_string());
                core.delete_message(m.id(), false, env);
            }
            ReceiveCode::DeniedOld => {
                let peer_engine = peer_router.and_then(|r| r.decision_engine());
                if self.engine.should_delete_old_message(m, peer, peer_engine) {
                    core.delete_message(m.id(), false, env);
                }
            }
            _ => {}
        }
    }
}

impl ForwardingPolicy for DecisionPolicy {
    const NAME: &'static str = "DecisionEngineRouter";

    fn replicate(&self, host: HostId) -> Self {
        Self {
            cures: self.cures,
            ..Self::named(self.name, self.engine.replicate(host))
        }
    }

    fn screen_incoming(
        &self,
        core: &RouterCore,
        m: &Message,
        _from: HostId,
        _env: &PeerEnv,
    ) -> Option<ReceiveCode> {
        (self.cures && (core.is_delivered(m.id()) || self.tombstones.contains(m.id())))
            .then_some(ReceiveCode::DeniedDelivered)
    }

    fn accept_new_message(&mut self, _core: &RouterCore, m: &mut Message, _env: &PeerEnv) -> bool {
        self.engine.new_message(m)
    }

    fn classify_received(&mut self, core: &RouterCore, m: &mut Message) -> Disposition {
        let final_recipient = self.engine.is_final_dest(m, core.host());
        Disposition {
            final_recipient,
            keep: self.engine.should_save_received_message(m, core.host()),
        }
    }

    fn transfer_done(
        &mut self,
        core: &mut RouterCore,
        id: &str,
        peer: HostId,
        peer_router: Option<&dyn MessageRouter>,
        _received: &Message,
        env: &mut PeerEnv,
    ) {
        let peer_engine = peer_router.and_then(|r| r.decision_engine());
        let delete = match core.message_mut(id) {
            Some(m) => self.engine.should_delete_sent_message(m, peer, peer_engine),
            None => return,
        };
        if delete {
            core.delete_message(id, false, env);
        }
    }

    fn changed_connection(
        &mut self,
        core: &mut RouterCore,
        conn: ConnectionId,
        peer: HostId,
        state: LinkState,
        env: &mut RouterEnv,
    ) {
        let me = core.host();
        match state {
            LinkState::Up { exchange } => {
                self.engine.connection_up(me, peer, env.now);
                if !exchange {
                    return;
                }
                let (Some(mine), Some(theirs)) = (env.network.host(me), env.network.host(peer)) else {
                    return;
                };
                let ctx = ExchangeContext {
                    conn,
                    me,
                    peer,
                    now: env.now,
                    my_location: mine.location(),
                    peer_location: theirs.location(),
                    my_speed: mine.speed(),
                    peer_speed: theirs.speed(),
                };
                match env.routers.get_mut(peer).and_then(|r| r.decision_engine_mut()) {
                    Some(peer_engine) => self.engine.do_exchange_for_new_connection(&ctx, peer_engine),
                    None => warn!(host = %me, peer = %peer, "Peer has no decision engine"),
                }
            }
            LinkState::Down => {
                let peer_engine = env.routers.get(peer).and_then(|r| r.decision_engine());
                self.engine.connection_down(me, peer, peer_engine, env.now);
            }
        }
    }

    fn forward(&mut self, core: &mut RouterCore, env: &mut RouterEnv) -> SimResult<()> {
        if core.is_transferring(env.network) || !core.can_start_transfer(env.network) {
            return Ok(());
        }
        let me = core.host();
        let mut deliverable = Vec::new();
        let mut others = Vec::new();
        for conn in core.connections(env.network) {
            let Some(peer) = env.network.connection(conn).map(|c| c.other_host(me)) else {
                continue;
            };
            let peer_engine = env.routers.get(peer).and_then(|r| r.decision_engine());
            for m in core.messages() {
                if !self
                    .engine
                    .should_send_message_to_host(m, peer, peer_engine, env.now)
                {
                    continue;
                }
                trace!(host = %me, peer = %peer, msg = m.id(), "Forwarding candidate");
                let candidate = (m.id().to_string(), conn);
                if m.to() == peer {
                    deliverable.push(candidate);
                } else {
                    others.push(candidate);
                }
            }
        }
        deliverable.extend(others);

        for (id, conn) in deliverable {
            let ready = env
                .network
                .connection(conn)
                .is_some_and(|c| c.is_ready_for_transfer());
            if !ready || !core.has_message(&id) {
                continue;
            }
            if core.start_transfer(self, &id, conn, env)?.is_ok() {
                break;
            }
        }
        Ok(())
    }

    fn decision_engine(&self) -> Option<&dyn DecisionEngine> {
        Some(self.engine.as_ref())
    }

    fn decision_engine_mut(&mut self) -> Option<&mut dyn DecisionEngine> {
        Some(self.engine.as_mut())
    }
}
