use std::collections::BTreeMap;
use std::fmt::Write;

use dtnsim_core::{ConnectionListener, HostId, Message, MessageListener};

use super::{Report, ReportContext, Warmup};

/// How often each host relayed a message that was later delivered
///
/// Counted from the hop list of the first delivered copy; the source and
/// the destination are not relays.
#[derive(Debug, Default)]
pub struct DeliveryCentralityReport {
    warmup: Warmup,
    relays: BTreeMap<HostId, u64>,
}

impl DeliveryCentralityReport {
    pub fn new(warmup: f64) -> Self {
        Self {
            warmup: Warmup::new(warmup),
            relays: BTreeMap::new(),
        }
    }

    pub fn relay_count(&self, host: HostId) -> u64 {
        self.relays.get(&host).copied().unwrap_or(0)
    }
}

impl ConnectionListener for DeliveryCentralityReport {}

impl MessageListener for DeliveryCentralityReport {
    fn new_message(&mut self, m: &Message, time: f64) {
        self.warmup.admit(m, time);
    }

    fn transferred(&mut self, m: &Message, _from: HostId, _to: HostId, first: bool, _time: f64) {
        if !first || self.warmup.is_ignored(m) {
            return;
        }
        let hops = m.hops();
        if hops.len() < 3 {
            return;
        }
        for &relay in &hops[1..hops.len() - 1] {
            *self.relays.entry(relay).or_default() += 1;
        }
    }
}

impl Report for DeliveryCentralityReport {
    fn name(&self) -> &'static str {
        "DeliveryCentralityReport"
    }

    fn done(&mut self, ctx: &ReportContext) -> String {
        let mut out = String::new();
        for host in ctx.network.hosts() {
            let _ = writeln!(out, "{} {}", host.id(), self.relay_count(host.id()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_only_intermediate_hops() {
        let mut r = DeliveryCentralityReport::new(0.0);
        let mut m = Message::new(HostId(0), HostId(3), "m", 10, 0.0);
        r.new_message(&m, 0.0);
        for h in 1..=3 {
            m.add_hop(HostId(h));
        }
        r.transferred(&m, HostId(2), HostId(3), true, 5.0);
        r.transferred(&m, HostId(2), HostId(3), false, 6.0);
        assert_eq!(r.relay_count(HostId(0)), 0);
        assert_eq!(r.relay_count(HostId(1)), 1);
        assert_eq!(r.relay_count(HostId(2)), 1);
        assert_eq!(r.relay_count(HostId(3)), 0);
    }
}
