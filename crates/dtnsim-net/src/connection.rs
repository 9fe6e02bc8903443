//! Links between interfaces
//!
//! A connection is created up and idle. Starting a transfer fixes its end
//! time from the link speed; the sender's router later finalizes or aborts
//! it. Proxied connections join two mobiles through their access points:
//! routing sees the two mobiles, while [`Connection::other_interface`]
//! returns the access point on the caller's side.

use dtnsim_core::{ConnectionId, HostId, InterfaceId, Message, SimError, SimResult};

/// Access points bridging a proxied connection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Proxy {
    /// Access point next to the `from` endpoint
    pub from_ap: InterfaceId,
    /// Access point next to the `to` endpoint
    pub to_ap: InterfaceId,
}

/// A message on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer {
    pub sender: HostId,
    pub message: Message,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    id: ConnectionId,
    from_host: HostId,
    from_iface: InterfaceId,
    to_host: HostId,
    to_iface: InterfaceId,
    proxy: Option<Proxy>,
    /// Bytes per second
    speed: u64,
    up: bool,
    transfer: Option<Transfer>,
}

impl Connection {
    pub fn new(
        id: ConnectionId,
        (from_host, from_iface): (HostId, InterfaceId),
        (to_host, to_iface): (HostId, InterfaceId),
        speed: u64,
    ) -> Self {
        Self {
            id,
            from_host,
            from_iface,
            to_host,
            to_iface,
            proxy: None,
            speed,
            up: true,
            transfer: None,
        }
    }

    /// Connection bridged by two access points
    pub fn proxied(
        id: ConnectionId,
        from: (HostId, InterfaceId),
        to: (HostId, InterfaceId),
        proxy: Proxy,
        speed: u64,
    ) -> Self {
        Self {
            proxy: Some(proxy),
            ..Self::new(id, from, to, speed)
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn from_host(&self) -> HostId {
        self.from_host
    }

    pub fn to_host(&self) -> HostId {
        self.to_host
    }

    pub fn endpoints(&self) -> (InterfaceId, InterfaceId) {
        (self.from_iface, self.to_iface)
    }

    pub fn proxy(&self) -> Option<Proxy> {
        self.proxy
    }

    pub fn speed(&self) -> u64 {
        self.speed
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn set_down(&mut self) {
        self.up = false;
    }

    /// The end-to-end peer of `host`
    pub fn other_host(&self, host: HostId) -> HostId {
        if host == self.from_host {
            self.to_host
        } else {
            self.from_host
        }
    }

    /// The interface `iface` sees across this link; the access point on
    /// its side for proxied connections
    pub fn other_interface(&self, iface: InterfaceId) -> InterfaceId {
        match self.proxy {
            Some(p) if iface == self.from_iface => p.from_ap,
            Some(p) => p.to_ap,
            None => self.endpoint_interface(iface),
        }
    }

    /// The opposite true endpoint of `iface`
    pub fn endpoint_interface(&self, iface: InterfaceId) -> InterfaceId {
        if iface == self.from_iface {
            self.to_iface
        } else {
            self.from_iface
        }
    }

    /// Interface of this connection that belongs to `host`
    pub fn interface_of(&self, host: HostId) -> InterfaceId {
        if host == self.from_host {
            self.from_iface
        } else {
            self.to_iface
        }
    }

    pub fn is_ready_for_transfer(&self) -> bool {
        self.up && self.transfer.is_none()
    }

    pub fn transfer(&self) -> Option<&Transfer> {
        self.transfer.as_ref()
    }

    /// Message in flight, if any
    pub fn message(&self) -> Option<&Message> {
        self.transfer.as_ref().map(|t| &t.message)
    }

    /// Put a message on the wire; it completes `ceil(size/speed)` seconds later
    pub fn begin_transfer(&mut self, sender: HostId, message: Message, now: f64) -> SimResult<()> {
        if !self.up || self.transfer.is_some() {
            return Err(SimError::ConnectionBusy(self.id));
        }
        let duration = if self.speed == 0 {
            f64::INFINITY
        } else {
            (message.size() as f64 / self.speed as f64).ceil()
        };
        self.transfer = Some(Transfer {
            sender,
            message,
            start: now,
            end: now + duration,
        });
        Ok(())
    }

    /// Whether the message in flight has fully arrived
    pub fn is_message_transferred(&self, now: f64) -> bool {
        self.transfer.as_ref().is_some_and(|t| now >= t.end)
    }

    /// Bytes still to send at `now`
    pub fn remaining_bytes(&self, now: f64) -> u64 {
        match &self.transfer {
            Some(t) if now < t.end => ((t.end - now) * self.speed as f64).ceil() as u64,
            _ => 0,
        }
    }

    /// Clear the message slot, returning what was in flight
    pub fn take_transfer(&mut self) -> Option<Transfer> {
        self.transfer.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(speed: u64) -> Connection {
        Connection::new(
            ConnectionId(0),
            (HostId(0), InterfaceId(0)),
            (HostId(1), InterfaceId(1)),
            speed,
        )
    }

    #[test]
    fn test_transfer_end_time_rounds_up() {
        let mut c = link(100);
        let m = Message::new(HostId(0), HostId(1), "m0", 450, 0.0);
        c.begin_transfer(HostId(0), m, 10.0).unwrap();
        assert_eq!(c.transfer().unwrap().end, 15.0);
        assert!(!c.is_message_transferred(14.0));
        assert!(c.is_message_transferred(15.0));
        assert_eq!(c.remaining_bytes(14.0), 100);
    }

    #[test]
    fn test_one_message_at_a_time() {
        let mut c = link(100);
        let m = Message::new(HostId(0), HostId(1), "m0", 10, 0.0);
        c.begin_transfer(HostId(0), m.clone(), 0.0).unwrap();
        assert!(!c.is_ready_for_transfer());
        assert!(matches!(
            c.begin_transfer(HostId(0), m, 0.0),
            Err(SimError::ConnectionBusy(_))
        ));
        assert_eq!(c.take_transfer().unwrap().message.id(), "m0");
        assert!(c.is_ready_for_transfer());
    }

    #[test]
    fn test_down_link_refuses_transfers() {
        let mut c = link(100);
        c.set_down();
        let m = Message::new(HostId(0), HostId(1), "m0", 10, 0.0);
        assert!(c.begin_transfer(HostId(0), m, 0.0).is_err());
    }

    #[test]
    fn test_proxied_views() {
        let c = Connection::proxied(
            ConnectionId(3),
            (HostId(0), InterfaceId(0)),
            (HostId(3), InterfaceId(3)),
            Proxy {
                from_ap: InterfaceId(1),
                to_ap: InterfaceId(2),
            },
            50,
        );
        assert_eq!(c.other_host(HostId(0)), HostId(3));
        assert_eq!(c.other_interface(InterfaceId(0)), InterfaceId(1));
        assert_eq!(c.other_interface(InterfaceId(3)), InterfaceId(2));
        assert_eq!(c.endpoint_interface(InterfaceId(0)), InterfaceId(3));
        assert_eq!(c.interface_of(HostId(3)), InterfaceId(3));
    }
}
