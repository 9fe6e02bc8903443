//! The contract every router honors

use std::any::Any;
use std::fmt::Debug;

use dtnsim_core::{ConnectionId, HostId, Message, SimResult};
use dtnsim_net::Network;
use rand::rngs::StdRng;

use crate::codes::ReceiveCode;
use crate::decision::DecisionEngine;
use crate::env::{PeerEnv, RouterEnv};

/// State change of one of the router's links
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// Link came up; `exchange` is true on exactly one side of the link
    Up { exchange: bool },
    Down,
}

/// Per-host message router
///
/// Calls that only touch the router's own state and one peer take a
/// [`PeerEnv`]; calls that drive transfers take the full [`RouterEnv`].
pub trait MessageRouter: Debug + Any {
    /// Host this router serves
    fn host(&self) -> HostId;

    /// Buffered messages
    fn messages(&self) -> &[Message];

    fn message(&self, id: &str) -> Option<&Message> {
        self.messages().iter().find(|m| m.id() == id)
    }

    fn has_message(&self, id: &str) -> bool {
        self.message(id).is_some()
    }

    /// Whether this host has been the final recipient of `id`
    fn is_delivered(&self, id: &str) -> bool;

    /// Whether this router is sending or any link of its host is busy
    fn is_transferring(&self, network: &Network) -> bool;

    /// Offer of a message copy by `from`; on OK the copy waits in the
    /// incoming buffer until the transfer completes or aborts
    fn receive_message(&mut self, m: &Message, from: HostId, env: &mut PeerEnv) -> ReceiveCode;

    /// Transfer of `id` from `from` completed; returns the received copy
    fn message_transferred(&mut self, id: &str, from: HostId, env: &mut PeerEnv) -> SimResult<Message>;

    /// Transfer of `id` from `from` was cut off
    fn message_aborted(&mut self, id: &str, from: HostId, env: &mut PeerEnv) -> SimResult<()>;

    /// Enqueue a message originated at this host
    ///
    /// Returns false when a forwarding policy rejects it.
    fn create_new_message(&mut self, m: Message, env: &mut PeerEnv) -> bool;

    /// Remove `id` from the buffer; returns whether it was there
    fn delete_message(&mut self, id: &str, dropped: bool, env: &mut PeerEnv) -> bool;

    fn changed_connection(&mut self, conn: ConnectionId, state: LinkState, env: &mut RouterEnv);

    /// Per-tick step
    fn update(&mut self, env: &mut RouterEnv) -> SimResult<()>;

    /// Fresh router for `host` configured like this prototype
    fn replicate(&self, host: HostId, rng: &mut StdRng) -> Box<dyn MessageRouter>;

    fn decision_engine(&self) -> Option<&dyn DecisionEngine> {
        None
    }

    fn decision_engine_mut(&mut self) -> Option<&mut dyn DecisionEngine> {
        None
    }

    fn as_any(&self) -> &dyn Any;
}
