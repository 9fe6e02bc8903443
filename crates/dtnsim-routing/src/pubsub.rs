//! Publish/subscribe messaging
//!
//! Pub/sub messages carry two properties: the publication (topic) name and
//! the message kind. Subscribe and unsubscribe messages never leave their
//! host; they only change the local engine's subscriptions. Data messages
//! are routed towards every subscriber of their topic.
//!
//! Messages without pub/sub properties are routed to their destination
//! host, so a pub/sub router also carries ordinary traffic.

use derive_more::Display;
use dtnsim_core::{HostId, Message, PropertyValue};

pub const PUBNAME_PROP: &str = "PubSub-pubname";
pub const MSGTYPE_PROP: &str = "PubSub-msgType";

/// Router name of the publish/subscribe router
pub const PUBSUB_ROUTER: &str = "PubSubRouter";

/// Kind of a pub/sub message, stored as its integer code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PubSubKind {
    /// Announces a publication; consumed locally
    Create,
    Subscribe,
    Unsubscribe,
    /// Content for the subscribers of a topic
    Data,
}

impl PubSubKind {
    pub fn code(self) -> i64 {
        match self {
            PubSubKind::Create => 1,
            PubSubKind::Subscribe => 2,
            PubSubKind::Unsubscribe => 3,
            PubSubKind::Data => 4,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(PubSubKind::Create),
            2 => Some(PubSubKind::Subscribe),
            3 => Some(PubSubKind::Unsubscribe),
            4 => Some(PubSubKind::Data),
            _ => None,
        }
    }

    /// Control messages are consumed by the local engine
    pub fn is_control(self) -> bool {
        self != PubSubKind::Data
    }
}

/// A pub/sub annotation: what kind of message, for which topic
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    pub kind: PubSubKind,
    pub topic: String,
}

impl Publication {
    pub fn new(kind: PubSubKind, topic: impl Into<String>) -> Self {
        Self {
            kind,
            topic: topic.into(),
        }
    }

    /// Attach this annotation to `m`
    pub fn tag(&self, m: &mut Message) {
        m.set_property(PUBNAME_PROP, PropertyValue::Text(self.topic.clone()));
        m.set_property(MSGTYPE_PROP, PropertyValue::Int(self.kind.code()));
    }

    /// Annotation of `m`, if it carries a valid one
    pub fn of(m: &Message) -> Option<Self> {
        let topic = match m.property(PUBNAME_PROP)? {
            PropertyValue::Text(t) => t.clone(),
            _ => return None,
        };
        let kind = PubSubKind::from_code(m.int_property(MSGTYPE_PROP)?)?;
        Some(Self { kind, topic })
    }

    /// A message of this kind from `host`, addressed to itself
    pub fn message(&self, host: HostId, id: impl Into<String>, size: u64, now: f64) -> Message {
        let mut m = Message::new(host, host, id, size, now);
        self.tag(&mut m);
        m
    }
}

/// What a message is routed towards
#[derive(Debug, Display, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum DestinationKey {
    #[display("{_0}")]
    Host(HostId),
    #[display("topic:{_0}")]
    Topic(String),
}

impl DestinationKey {
    /// Topic of a pub/sub message, destination host otherwise
    pub fn of(m: &Message) -> Self {
        match m.property(PUBNAME_PROP) {
            Some(PropertyValue::Text(t)) => DestinationKey::Topic(t.clone()),
            _ => DestinationKey::Host(m.to()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_and_read_back() {
        let p = Publication::new(PubSubKind::Data, "news");
        let m = p.message(HostId(3), "d1", 100, 0.0);
        assert_eq!(m.to(), HostId(3));
        assert_eq!(Publication::of(&m), Some(p));
        assert_eq!(DestinationKey::of(&m), DestinationKey::Topic("news".to_string()));
    }

    #[test]
    fn test_plain_message_is_host_keyed() {
        let m = Message::new(HostId(0), HostId(7), "m", 1, 0.0);
        assert_eq!(Publication::of(&m), None);
        assert_eq!(DestinationKey::of(&m), DestinationKey::Host(HostId(7)));
    }

    #[test]
    fn test_unknown_kind_code_is_ignored() {
        let mut m = Message::new(HostId(0), HostId(0), "m", 1, 0.0);
        m.set_property(PUBNAME_PROP, PropertyValue::Text("t".to_string()));
        m.set_property(MSGTYPE_PROP, PropertyValue::Int(9));
        assert_eq!(Publication::of(&m), None);
        assert!(PubSubKind::Subscribe.is_control());
        assert!(!PubSubKind::Data.is_control());
    }
}
