use dtnsim_core::{ConnectionListener, HostId, Message, MessageListener, SimEvent};
use serde::Serialize;
use tracing::warn;

use super::{Report, ReportContext};

#[derive(Debug, Serialize)]
struct LogHeader<'a> {
    scenario: &'a str,
    generated_at: String,
    events: usize,
}

/// Every connection and message event as JSON lines
///
/// The first line is a header naming the scenario; each following line is
/// one [`SimEvent`] tagged by its `event` field.
#[derive(Debug, Default)]
pub struct EventLogReport {
    events: Vec<SimEvent>,
}

impl EventLogReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[SimEvent] {
        &self.events
    }
}

impl ConnectionListener for EventLogReport {
    fn hosts_connected(&mut self, a: HostId, b: HostId, time: f64) {
        self.events.push(SimEvent::HostsConnected { a, b, time });
    }

    fn hosts_disconnected(&mut self, a: HostId, b: HostId, time: f64) {
        self.events.push(SimEvent::HostsDisconnected { a, b, time });
    }
}

impl MessageListener for EventLogReport {
    fn new_message(&mut self, m: &Message, time: f64) {
        self.events.push(SimEvent::MessageCreated {
            id: m.id().to_string(),
            host: m.from(),
            time,
        });
    }

    fn transfer_started(&mut self, m: &Message, from: HostId, to: HostId, time: f64) {
        self.events.push(SimEvent::TransferStarted {
            id: m.id().to_string(),
            from,
            to,
            time,
        });
    }

    fn transferred(&mut self, m: &Message, from: HostId, to: HostId, first: bool, time: f64) {
        self.events.push(SimEvent::MessageTransferred {
            id: m.id().to_string(),
            from,
            to,
            first_delivery: first,
            hops: m.hops().to_vec(),
            time,
        });
    }

    fn deleted(&mut self, m: &Message, at: HostId, dropped: bool, time: f64) {
        self.events.push(SimEvent::MessageDeleted {
            id: m.id().to_string(),
            host: at,
            dropped,
            time,
        });
    }

    fn transfer_aborted(&mut self, m: &Message, from: HostId, to: HostId, time: f64) {
        self.events.push(SimEvent::TransferAborted {
            id: m.id().to_string(),
            from,
            to,
            time,
        });
    }
}

impl Report for EventLogReport {
    fn name(&self) -> &'static str {
        "EventLogReport"
    }

    fn extension(&self) -> &'static str {
        "jsonl"
    }

    fn done(&mut self, ctx: &ReportContext) -> String {
        let header = LogHeader {
            scenario: ctx.scenario,
            generated_at: chrono::Utc::now().to_rfc3339(),
            events: self.events.len(),
        };
        let mut out = String::new();
        let lines = std::iter::once(serde_json::to_string(&header))
            .chain(self.events.iter().map(serde_json::to_string));
        for line in lines {
            match line {
                Ok(json) => {
                    out.push_str(&json);
                    out.push('\n');
                }
                Err(e) => warn!(error = %e, "Skipping unserializable event"),
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
    fn test_writes_header_then_one_event_per_line() {
        let mut r = EventLogReport::new();
        r.hosts_connected(HostId(0), HostId(1), 0.0);
        let m = Message::new(HostId(0), HostId(1), "m", 10, 0.0);
        r.new_message(&m, 0.0);

        let net = Network::new();
        let routers = RouterTable::new();
        let ctx = ReportContext {
            scenario: "s",
            now: 1.0,
            network: &net,
            routers: &routers,
        };
        let text = r.done(&ctx);
        let mut lines = text.lines();
        let header: serde_json::Value = serde_json::from_str(lines.next().unwrap()).unwrap();
        assert_eq!(header["events"], 2);
        let events: Vec<SimEvent> = lines.map(|l| serde_json::from_str(l).unwrap()).collect();
        assert_eq!(events, r.events());
    }
}
