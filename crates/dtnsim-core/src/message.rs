//! Messages carried through the network
//!
//! Every hop holds its own copy of a message. Copies share the id and
//! diverge in receive time, hop list and router-attached properties.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::coord::Coord;
use crate::ids::HostId;

/// Opaque router state attached to a message copy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Location(Coord),
}

/// A store-carry-forward message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    id: String,
    from: HostId,
    to: HostId,
    size: u64,
    created: f64,
    received: Option<f64>,
    /// Time to live in minutes from creation; `None` never expires
    ttl: Option<f64>,
    response_size: u64,
    request: Option<String>,
    hops: Vec<HostId>,
    properties: BTreeMap<String, PropertyValue>,
}

impl Message {
    /// New message created at `from` at time `now`
    pub fn new(from: HostId, to: HostId, id: impl Into<String>, size: u64, now: f64) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            size,
            created: now,
            received: None,
            ttl: None,
            response_size: 0,
            request: None,
            hops: vec![from],
            properties: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn from(&self) -> HostId {
        self.from
    }

    pub fn to(&self) -> HostId {
        self.to
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn creation_time(&self) -> f64 {
        self.created
    }

    /// Time this copy arrived over its last hop; `None` for originals
    pub fn receive_time(&self) -> Option<f64> {
        self.received
    }

    pub fn set_receive_time(&mut self, time: f64) {
        self.received = Some(time);
    }

    pub fn ttl(&self) -> Option<f64> {
        self.ttl
    }

    pub fn set_ttl(&mut self, minutes: Option<f64>) {
        self.ttl = minutes;
    }

    /// Remaining lifetime in minutes at `now`; infinite without a TTL
    pub fn ttl_remaining(&self, now: f64) -> f64 {
        match self.ttl {
            Some(ttl) => ttl - (now - self.created) / 60.0,
            None => f64::INFINITY,
        }
    }

    pub fn response_size(&self) -> u64 {
        self.response_size
    }

    pub fn set_response_size(&mut self, size: u64) {
        self.response_size = size;
    }

    /// Id of the request this message answers
    pub fn request(&self) -> Option<&str> {
        self.request.as_deref()
    }

    pub fn is_response(&self) -> bool {
        self.request.is_some()
    }

    /// Build the automatic reply to this message, sent from `self.to`
    pub fn response(&self, now: f64) -> Message {
        let mut reply = Message::new(
            self.to,
            self.from,
            format!("R_{}", self.id),
            self.response_size,
            now,
        );
        reply.request = Some(self.id.clone());
        reply
    }

    pub fn hops(&self) -> &[HostId] {
        &self.hops
    }

    pub fn hop_count(&self) -> usize {
        self.hops.len() - 1
    }

    /// Current holder of this copy
    pub fn holder(&self) -> HostId {
        self.hops.last().copied().unwrap_or(self.from)
    }

    pub fn add_hop(&mut self, host: HostId) {
        self.hops.push(host);
    }

    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.properties.insert(key.into(), value);
    }

    pub fn remove_property(&mut self, key: &str) -> Option<PropertyValue> {
        self.properties.remove(key)
    }

    pub fn int_property(&self, key: &str) -> Option<i64> {
        match self.properties.get(key) {
            Some(PropertyValue::Int(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn float_property(&self, key: &str) -> Option<f64> {
        match self.properties.get(key) {
            Some(PropertyValue::Float(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn bool_property(&self, key: &str) -> Option<bool> {
        match self.properties.get(key) {
            Some(PropertyValue::Bool(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn location_property(&self, key: &str) -> Option<Coord> {
        match self.properties.get(key) {
            Some(PropertyValue::Location(c)) => Some(*c),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_message_hops_start_at_source() {
        let m = Message::new(HostId(0), HostId(1), "m0", 500, 0.0);
        assert_eq!(m.hops(), &[HostId(0)]);
        assert_eq!(m.holder(), HostId(0));
        assert_eq!(m.hop_count(), 0);
        assert!(m.receive_time().is_none());
    }

    #[test]
    fn test_ttl_in_minutes() {
        let mut m = Message::new(HostId(0), HostId(1), "m0", 1, 30.0);
        assert_eq!(m.ttl_remaining(1e9), f64::INFINITY);
        m.set_ttl(Some(5.0));
        assert_eq!(m.ttl_remaining(30.0), 5.0);
        assert_eq!(m.ttl_remaining(330.0), 0.0);
    }

    #[test]
    fn test_response_reverses_direction() {
        let mut m = Message::new(HostId(2), HostId(5), "q1", 100, 0.0);
        m.set_response_size(40);
        let r = m.response(12.0);
        assert_eq!(r.id(), "R_q1");
        assert_eq!(r.from(), HostId(5));
        assert_eq!(r.to(), HostId(2));
        assert_eq!(r.size(), 40);
        assert_eq!(r.request(), Some("q1"));
    }

    #[test]
    fn test_typed_properties() {
        let mut m = Message::new(HostId(0), HostId(1), "m", 1, 0.0);
        m.set_property("copies", PropertyValue::Int(8));
        m.set_property("focus", PropertyValue::Location(Coord::new(1.0, 2.0)));
        assert_eq!(m.int_property("copies"), Some(8));
        assert_eq!(m.float_property("copies"), None);
        assert_eq!(m.location_property("focus"), Some(Coord::new(1.0, 2.0)));
        assert!(m.remove_property("copies").is_some());
        assert_eq!(m.int_property("copies"), None);
    }
}
