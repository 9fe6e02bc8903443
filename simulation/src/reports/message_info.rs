use std::collections::BTreeMap;
use std::fmt::Write;

use dtnsim_core::{ConnectionListener, HostId, Message, MessageListener};

use super::{Report, ReportContext, Warmup};

/// Delay and hop count of every message, one line each
///
/// Undelivered messages are listed at the end with delay `inf` and hop
/// count `-1`.
#[derive(Debug, Default)]
pub struct MessageInfoReport {
    warmup: Warmup,
    /// id -> creation time, in creation order
    created: Vec<(String, f64)>,
    delivered: BTreeMap<String, (f64, usize)>,
    lines: Vec<String>,
}

impl MessageInfoReport {
    pub fn new(warmup: f64) -> Self {
        Self {
            warmup: Warmup::new(warmup),
            ..Self::default()
        }
    }

    /// Delivery delay and hop count of `id`, if delivered
    pub fn delivery(&self, id: &str) -> Option<(f64, usize)> {
        self.delivered.get(id).copied()
    }
}

impl ConnectionListener for MessageInfoReport {}

impl MessageListener for MessageInfoReport {
    fn new_message(&mut self, m: &Message, time: f64) {
        if self.warmup.admit(m, time) {
            self.created.push((m.id().to_string(), m.creation_time()));
        }
    }

    fn transferred(&mut self, m: &Message, _from: HostId, _to: HostId, first: bool, time: f64) {
        if !first || self.warmup.is_ignored(m) || self.delivered.contains_key(m.id()) {
            return;
        }
        let delay = time - m.creation_time();
        self.delivered.insert(m.id().to_string(), (delay, m.hop_count()));
        self.lines.push(format!(
            "{} {} {} {}",
            m.id(),
            m.creation_time(),
            delay,
            m.hop_count()
        ));
    }
}

impl Report for MessageInfoReport {
    fn name(&self) -> &'static str {
        "MessageInfoReport"
    }

    fn done(&mut self, _ctx: &ReportContext) -> String {
        let mut out = String::from("ID CreateTime Delay HopCount\n");
        for line in &self.lines {
            let _ = writeln!(out, "{line}");
        }
        for (id, created) in &self.created {
            if !self.delivered.contains_key(id) {
                let _ = writeln!(out, "{id} {created} inf -1");
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtnsim_net::Network;
    use dtnsim_routing::RouterTable;

    #[test]
    fn test_lists_delivered_then_undelivered() {
        let mut r = MessageInfoReport::new(0.0);
        let a = Message::new(HostId(0), HostId(1), "a", 10, 0.0);
        let b = Message::new(HostId(0), HostId(2), "b", 10, 1.0);
        r.new_message(&a, 0.0);
        r.new_message(&b, 1.0);

        let mut copy = a.clone();
        copy.add_hop(HostId(1));
        r.transferred(&copy, HostId(0), HostId(1), true, 4.0);
        r.transferred(&copy, HostId(0), HostId(1), true, 9.0);

        let net = Network::new();
        let routers = RouterTable::new();
        let ctx = ReportContext {
            scenario: "t",
            now: 10.0,
            network: &net,
            routers: &routers,
        };
        let text = r.done(&ctx);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines, vec!["ID CreateTime Delay HopCount", "a 0 4 1", "b 1 inf -1"]);
        assert_eq!(r.delivery("a"), Some((4.0, 1)));
    }
}
