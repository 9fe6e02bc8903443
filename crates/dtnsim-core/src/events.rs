//! Connection and message lifecycle events
//!
//! Routers and the driver publish through an [`EventBus`]. Listeners are
//! registered once before the run; reports that need to be read back after
//! the run are shared as `Rc<RefCell<_>>`.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::ids::HostId;
use crate::message::Message;

/// Observer of link formation and teardown
pub trait ConnectionListener {
    fn hosts_connected(&mut self, _a: HostId, _b: HostId, _time: f64) {}
    fn hosts_disconnected(&mut self, _a: HostId, _b: HostId, _time: f64) {}
}

/// Observer of the message lifecycle
pub trait MessageListener {
    fn new_message(&mut self, _m: &Message, _time: f64) {}
    fn transfer_started(&mut self, _m: &Message, _from: HostId, _to: HostId, _time: f64) {}
    fn transferred(
        &mut self,
        _m: &Message,
        _from: HostId,
        _to: HostId,
        _first_delivery: bool,
        _time: f64,
    ) {
    }
    fn deleted(&mut self, _m: &Message, _at: HostId, _dropped: bool, _time: f64) {}
    fn transfer_aborted(&mut self, _m: &Message, _from: HostId, _to: HostId, _time: f64) {}
}

impl<T: ConnectionListener + ?Sized> ConnectionListener for Rc<RefCell<T>> {
    fn hosts_connected(&mut self, a: HostId, b: HostId, time: f64) {
        self.borrow_mut().hosts_connected(a, b, time);
    }

    fn hosts_disconnected(&mut self, a: HostId, b: HostId, time: f64) {
        self.borrow_mut().hosts_disconnected(a, b, time);
    }
}

impl<T: MessageListener + ?Sized> MessageListener for Rc<RefCell<T>> {
    fn new_message(&mut self, m: &Message, time: f64) {
        self.borrow_mut().new_message(m, time);
    }

    fn transfer_started(&mut self, m: &Message, from: HostId, to: HostId, time: f64) {
        self.borrow_mut().transfer_started(m, from, to, time);
    }

    fn transferred(&mut self, m: &Message, from: HostId, to: HostId, first: bool, time: f64) {
        self.borrow_mut().transferred(m, from, to, first, time);
    }

    fn deleted(&mut self, m: &Message, at: HostId, dropped: bool, time: f64) {
        self.borrow_mut().deleted(m, at, dropped, time);
    }

    fn transfer_aborted(&mut self, m: &Message, from: HostId, to: HostId, time: f64) {
        self.borrow_mut().transfer_aborted(m, from, to, time);
    }
}

/// A recorded simulation event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum SimEvent {
    HostsConnected {
        a: HostId,
        b: HostId,
        time: f64,
    },
    HostsDisconnected {
        a: HostId,
        b: HostId,
        time: f64,
    },
    MessageCreated {
        id: String,
        host: HostId,
        time: f64,
    },
    TransferStarted {
        id: String,
        from: HostId,
        to: HostId,
        time: f64,
    },
    MessageTransferred {
        id: String,
        from: HostId,
        to: HostId,
        first_delivery: bool,
        hops: Vec<HostId>,
        time: f64,
    },
    MessageDeleted {
        id: String,
        host: HostId,
        dropped: bool,
        time: f64,
    },
    TransferAborted {
        id: String,
        from: HostId,
        to: HostId,
        time: f64,
    },
}

impl SimEvent {
    pub fn time(&self) -> f64 {
        match self {
            SimEvent::HostsConnected { time, .. }
            | SimEvent::HostsDisconnected { time, .. }
            | SimEvent::MessageCreated { time, .. }
            | SimEvent::TransferStarted { time, .. }
            | SimEvent::MessageTransferred { time, .. }
            | SimEvent::MessageDeleted { time, .. }
            | SimEvent::TransferAborted { time, .. } => *time,
        }
    }

    /// Message id for message events
    pub fn message_id(&self) -> Option<&str> {
        match self {
            SimEvent::MessageCreated { id, .. }
            | SimEvent::TransferStarted { id, .. }
            | SimEvent::MessageTransferred { id, .. }
            | SimEvent::MessageDeleted { id, .. }
            | SimEvent::TransferAborted { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// Fan-out point for connection and message events
#[derive(Default)]
pub struct EventBus {
    connection_listeners: Vec<Box<dyn ConnectionListener>>,
    message_listeners: Vec<Box<dyn MessageListener>>,
    log: Option<Vec<SimEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bus that also keeps every event in memory
    pub fn with_log() -> Self {
        Self {
            log: Some(Vec::new()),
            ..Self::default()
        }
    }

    pub fn add_connection_listener(&mut self, listener: Box<dyn ConnectionListener>) {
        self.connection_listeners.push(listener);
    }

    pub fn add_message_listener(&mut self, listener: Box<dyn MessageListener>) {
        self.message_listeners.push(listener);
    }

    /// Recorded events, if logging is enabled
    pub fn log(&self) -> &[SimEvent] {
        self.log.as_deref().unwrap_or(&[])
    }

    fn record(&mut self, event: SimEvent) {
        if let Some(log) = &mut self.log {
            log.push(event);
        }
    }

    pub fn hosts_connected(&mut self, a: HostId, b: HostId, time: f64) {
        trace!(%a, %b, time, "hosts connected");
        self.record(SimEvent::HostsConnected { a, b, time });
        for l in &mut self.connection_listeners {
            l.hosts_connected(a, b, time);
        }
    }

    pub fn hosts_disconnected(&mut self, a: HostId, b: HostId, time: f64) {
        trace!(%a, %b, time, "hosts disconnected");
        self.record(SimEvent::HostsDisconnected { a, b, time });
        for l in &mut self.connection_listeners {
            l.hosts_disconnected(a, b, time);
        }
    }

    pub fn new_message(&mut self, m: &Message, time: f64) {
        self.record(SimEvent::MessageCreated {
            id: m.id().to_string(),
            host: m.from(),
            time,
        });
        for l in &mut self.message_listeners {
            l.new_message(m, time);
        }
    }

    pub fn transfer_started(&mut self, m: &Message, from: HostId, to: HostId, time: f64) {
        self.record(SimEvent::TransferStarted {
            id: m.id().to_string(),
            from,
            to,
            time,
        });
        for l in &mut self.message_listeners {
            l.transfer_started(m, from, to, time);
        }
    }

    pub fn transferred(&mut self, m: &Message, from: HostId, to: HostId, first: bool, time: f64) {
        self.record(SimEvent::MessageTransferred {
            id: m.id().to_string(),
            from,
            to,
            first_delivery: first,
            hops: m.hops().to_vec(),
            time,
        });
        for l in &mut self.message_listeners {
            l.transferred(m, from, to, first, time);
        }
    }

    pub fn deleted(&mut self, m: &Message, at: HostId, dropped: bool, time: f64) {
        self.record(SimEvent::MessageDeleted {
            id: m.id().to_string(),
            host: at,
            dropped,
            time,
        });
        for l in &mut self.message_listeners {
            l.deleted(m, at, dropped, time);
        }
    }

    pub fn transfer_aborted(&mut self, m: &Message, from: HostId, to: HostId, time: f64) {
        self.record(SimEvent::TransferAborted {
            id: m.id().to_string(),
            from,
            to,
            time,
        });
        for l in &mut self.message_listeners {
            l.transfer_aborted(m, from, to, time);
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("connection_listeners", &self.connection_listeners.len())
            .field("message_listeners", &self.message_listeners.len())
            .field("logged", &self.log().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Counter {
        delivered: usize,
        links: usize,
    }

    impl MessageListener for Counter {
        fn transferred(&mut self, _m: &Message, _f: HostId, _t: HostId, first: bool, _time: f64) {
            if first {
                self.delivered += 1;
            }
        }
    }

    impl ConnectionListener for Counter {
        fn hosts_connected(&mut self, _a: HostId, _b: HostId, _time: f64) {
            self.links += 1;
        }
    }

    #[test]
    fn test_shared_listener_sees_events() {
        let counter = Rc::new(RefCell::new(Counter::default()));
        let mut bus = EventBus::with_log();
        bus.add_message_listener(Box::new(Rc::clone(&counter)));
        bus.add_connection_listener(Box::new(Rc::clone(&counter)));

        let m = Message::new(HostId(0), HostId(1), "m0", 10, 0.0);
        bus.hosts_connected(HostId(0), HostId(1), 0.0);
        bus.transferred(&m, HostId(0), HostId(1), true, 1.0);
        bus.transferred(&m, HostId(0), HostId(1), false, 2.0);

        assert_eq!(counter.borrow().delivered, 1);
        assert_eq!(counter.borrow().links, 1);
        assert_eq!(bus.log().len(), 3);
        assert_eq!(bus.log()[1].message_id(), Some("m0"));
    }

    #[test]
    fn test_event_serializes_as_tagged_json() {
        let ev = SimEvent::MessageDeleted {
            id: "m1".to_string(),
            host: HostId(4),
            dropped: true,
            time: 60.0,
        };
        let json = serde_json::to_string(&ev).unwrap();
        assert!(json.contains("\"event\":\"MessageDeleted\""));
        let back: SimEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ev);
    }

    #[test]
    fn test_log_disabled_by_default() {
        let mut bus = EventBus::new();
        bus.hosts_connected(HostId(0), HostId(1), 0.0);
        assert!(bus.log().is_empty());
    }
}
