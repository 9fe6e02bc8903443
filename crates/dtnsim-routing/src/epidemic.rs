//! Plain epidemic routing
//!
//! Every buffered message is offered to every peer. The sender keeps its
//! copy after a transfer and ignores refusals, so a copy only leaves the
//! buffer through TTL expiry, eviction or the `deleteDelivered` rule.

use dtnsim_core::{HostId, SimResult};

use crate::active::{ActiveRouter, ForwardingPolicy, RouterCore, TransferHooks};
use crate::env::RouterEnv;

/// Flooding router without delivery cures
pub type EpidemicRouter = ActiveRouter<Epidemic>;

#[derive(Debug, Clone, Copy, Default)]
pub struct Epidemic;

impl Epidemic {
    pub fn new() -> Self {
        Self
    }
}

impl TransferHooks for Epidemic {}

impl ForwardingPolicy for Epidemic {
    const NAME: &'static str = "EpidemicRouter";

    fn replicate(&self, _host: HostId) -> Self {
        Self
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
