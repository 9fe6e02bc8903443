//! Per-host module communication bus
//!
//! Modules publish named values; subscribers receive change notifications
//! which their owner drains and applies between updates.

use std::collections::BTreeMap;

/// Scan interval of every interface on the host, in seconds
pub const SCAN_INTERVAL_ID: &str = "Network.scanInterval";
/// Transmit range of every interface on the host, in meters
pub const RANGE_ID: &str = "Network.radioRange";
/// Transmit speed of every interface on the host, in bytes per second
pub const SPEED_ID: &str = "Network.speed";

/// Identifier a subscriber registers under
pub type SubscriberId = u32;

/// A property change waiting to be applied by a subscriber
#[derive(Debug, Clone, PartialEq)]
pub struct BusNotice {
    pub subscriber: SubscriberId,
    pub key: String,
    pub value: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleCommBus {
    properties: BTreeMap<String, f64>,
    subscribers: BTreeMap<String, Vec<SubscriberId>>,
    pending: Vec<BusNotice>,
}

impl ModuleCommBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a property with its initial value
    pub fn add_property(&mut self, key: impl Into<String>, value: f64) {
        self.properties.entry(key.into()).or_insert(value);
    }

    pub fn property(&self, key: &str) -> Option<f64> {
        self.properties.get(key).copied()
    }

    pub fn subscribe(&mut self, key: impl Into<String>, subscriber: SubscriberId) {
        let subs = self.subscribers.entry(key.into()).or_default();
        if !subs.contains(&subscriber) {
            subs.push(subscriber);
        }
    }

    /// Change a property and queue a notice for each subscriber
    pub fn update_property(&mut self, key: &str, value: f64) {
        self.properties.insert(key.to_string(), value);
        if let Some(subs) = self.subscribers.get(key) {
            self.pending.extend(subs.iter().map(|&subscriber| BusNotice {
                subscriber,
                key: key.to_string(),
                value,
            }));
        }
    }

    /// Add `delta` to a numeric property, creating it at `delta`
    pub fn update_double(&mut self, key: &str, delta: f64) -> f64 {
        let value = self.property(key).unwrap_or(0.0) + delta;
        self.update_property(key, value);
        value
    }

    /// Take every queued notice
    pub fn drain_notices(&mut self) -> Vec<BusNotice> {
        std::mem::take(&mut self.pending)
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribers_are_notified_once_per_change() {
        let mut bus = ModuleCommBus::new();
        bus.add_property(RANGE_ID, 10.0);
        bus.subscribe(RANGE_ID, 1);
        bus.subscribe(RANGE_ID, 1);
        bus.subscribe(RANGE_ID, 2);
        bus.update_property(RANGE_ID, 25.0);

        let notices = bus.drain_notices();
        assert_eq!(notices.len(), 2);
        assert!(notices.iter().all(|n| n.value == 25.0));
        assert!(!bus.has_pending());
        assert_eq!(bus.property(RANGE_ID), Some(25.0));
    }

    #[test]
    fn test_unsubscribed_changes_are_silent() {
        let mut bus = ModuleCommBus::new();
        bus.update_property(SPEED_ID, 1.0);
        assert_eq!(bus.update_double(SPEED_ID, 2.5), 3.5);
        assert!(bus.drain_notices().is_empty());
    }
}
