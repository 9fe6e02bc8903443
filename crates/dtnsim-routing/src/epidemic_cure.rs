//! Epidemic routing with delivery cures
//!
//! Every message is flooded to every peer. A node that delivered a message,
//! or learned that it was delivered, records the id in its finished set and
//! answers further offers with [`ReceiveCode::DeniedDelivered`]; the offering
//! node then learns the cure and drops its copy.

use std::collections::BTreeSet;

use dtnsim_core::{HostId, Message, SimResult};
use tracing::debug;

use crate::active::{ActiveRouter, Disposition, ForwardingPolicy, RouterCore, TransferHooks};
use crate::codes::ReceiveCode;
use crate::env::{PeerEnv, RouterEnv};
use crate::router::MessageRouter;

/// Flooding router that spreads cures for delivered messages
pub type EpidemicWithCureRouter = ActiveRouter<EpidemicWithCure>;

#[derive(Debug, Clone, Default)]
pub struct EpidemicWithCure {
    finished: BTreeSet<String>,
}

impl EpidemicWithCure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids known to have reached their destination
    pub fn finished(&self) -> &BTreeSet<String> {
        &self.finished
    }

    pub fn is_finished(&self, id: &str) -> bool {
        self.finished.contains(id)
    }
}

impl TransferHooks for EpidemicWithCure {
    fn transfer_refused(
        &mut self,
        core: &mut RouterCore,
        m: &Message,
        peer: HostId,
        _peer_router: Option<&dyn MessageRouter>,
        code: ReceiveCode,
        env: &mut PeerEnv,
    ) {
        if code == ReceiveCode::DeniedDelivered {
            debug!(host = %core.host(), peer = %peer, msg = m.id(), "Cured");
            self.finished.insert(m.id().to_string());
            core.delete_message(m.id(), false, env);
        }
    }
}

impl ForwardingPolicy for EpidemicWithCure {
    const NAME: &'static str = "EpidemicWithCureRouter";

    fn replicate(&self, _host: HostId) -> Self {
        Self::new()
    }

    fn screen_incoming(
        &self,
        _core: &RouterCore,
        m: &Message,
        _from: HostId,
        _env: &PeerEnv,
    ) -> Option<ReceiveCode> {
        self.is_finished(m.id()).then_some(ReceiveCode::DeniedDelivered)
    }

    fn after_received(
        &mut self,
        core: &mut RouterCore,
        m: &Message,
        _disposition: Disposition,
        _env: &mut PeerEnv,
    ) {
        if core.is_delivered(m.id()) {
            self.finished.insert(m.id().to_string());
        }
    }

    fn forward(&mut self, core: &mut RouterCore, env: &mut RouterEnv) -> SimResult<()> {
        if core.is_transferring(env.network) || !core.can_start_transfer(env.network) {
            return Ok(());
        }
        if core.exchange_deliverable_messages(self, env)?.is_some() {
            return Ok(());
        }
        core.try_all_messages_to_all_connections(self, env)?;
        Ok(())
    }
}
