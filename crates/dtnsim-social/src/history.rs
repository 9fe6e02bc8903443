//! Per-host record of contacts

use std::collections::BTreeMap;

use dtnsim_core::HostId;

/// A closed contact with positive length
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContactInterval {
    pub start: f64,
    pub end: f64,
}

impl ContactInterval {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

/// Contacts of one host, keyed by peer
///
/// Intervals per peer are appended in time order and never overlap.
/// A peer only appears in [`ContactHistory::peers`] once a contact with it
/// has closed.
#[derive(Debug, Clone, Default)]
pub struct ContactHistory {
    closed: BTreeMap<HostId, Vec<ContactInterval>>,
    open: BTreeMap<HostId, f64>,
}

impl ContactHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of a contact; a contact already open keeps its start
    pub fn open_contact(&mut self, peer: HostId, now: f64) {
        self.open.entry(peer).or_insert(now);
    }

    /// Close the open contact with `peer`, returning the new interval
    ///
    /// Zero-length contacts are discarded.
    pub fn close_contact(&mut self, peer: HostId, now: f64) -> Option<ContactInterval> {
        let start = self.open.remove(&peer)?;
        if now <= start {
            return None;
        }
        let interval = ContactInterval { start, end: now };
        self.closed.entry(peer).or_default().push(interval);
        Some(interval)
    }

    pub fn is_open(&self, peer: HostId) -> bool {
        self.open.contains_key(&peer)
    }

    pub fn open_since(&self, peer: HostId) -> Option<f64> {
        self.open.get(&peer).copied()
    }

    /// Closed intervals with `peer`, oldest first
    pub fn intervals(&self, peer: HostId) -> &[ContactInterval] {
        self.closed.get(&peer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Sum of closed contact time with `peer`
    pub fn total_duration(&self, peer: HostId) -> f64 {
        self.intervals(peer).iter().map(ContactInterval::duration).sum()
    }

    /// Peers with at least one closed contact
    pub fn peers(&self) -> impl Iterator<Item = HostId> + '_ {
        self.closed.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.closed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closed.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (HostId, &[ContactInterval])> {
        self.closed.iter().map(|(h, v)| (*h, v.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_accumulate() {
        let mut h = ContactHistory::new();
        h.open_contact(HostId(1), 10.0);
        h.open_contact(HostId(1), 12.0);
        assert_eq!(h.close_contact(HostId(1), 20.0).unwrap().duration(), 10.0);
        h.open_contact(HostId(1), 30.0);
        h.close_contact(HostId(1), 35.0);
        assert_eq!(h.intervals(HostId(1)).len(), 2);
        assert_eq!(h.total_duration(HostId(1)), 15.0);
        assert!(!h.is_open(HostId(1)));
    }

    #[test]
    fn test_zero_length_contact_is_dropped() {
        let mut h = ContactHistory::new();
        h.open_contact(HostId(2), 5.0);
        assert!(h.close_contact(HostId(2), 5.0).is_none());
        assert!(h.is_empty());
        assert!(h.intervals(HostId(2)).is_empty());
    }

    #[test]
    fn test_close_without_open() {
        let mut h = ContactHistory::new();
        assert!(h.close_contact(HostId(3), 1.0).is_none());
    }
}
