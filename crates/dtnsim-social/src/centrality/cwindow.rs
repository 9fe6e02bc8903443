use super::{Centrality, CentralityCache, average, epoch_degrees};
use crate::community::CommunityDetection;
use crate::history::ContactHistory;

/// Mean unique-peer count over the last `epochs` windows
#[derive(Debug, Clone)]
pub struct CWindowCentrality {
    window: f64,
    epochs: usize,
    cache: CentralityCache,
}

impl CWindowCentrality {
    pub fn new(window: f64, compute_interval: f64, epochs: usize) -> Self {
        Self {
            window,
            epochs,
            cache: CentralityCache::new(compute_interval),
        }
    }
}

impl Centrality for CWindowCentrality {
    fn global(&self, history: &ContactHistory, now: f64) -> f64 {
        self.cache.global(now, |t| {
            average(&epoch_degrees(history.iter(), t, self.window, self.epochs))
        })
    }

    fn local(&self, history: &ContactHistory, community: &dyn CommunityDetection, now: f64) -> f64 {
        self.cache.local(now, |t| {
            let members = history
                .iter()
                .filter(|(h, _)| community.is_host_in_community(*h));
            average(&epoch_degrees(members, t, self.window, self.epochs))
        })
    }

    fn replicate(&self) -> Box<dyn Centrality> {
        Box::new(Self::new(self.window, self.cache.interval(), self.epochs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtnsim_core::HostId;

    #[test]
    fn test_average_over_epochs() {
        let mut h = ContactHistory::new();
        // epoch 0: peers 1 and 2; epoch 1: peer 1
        h.open_contact(HostId(1), 0.0);
        h.close_contact(HostId(1), 50.0);
        h.open_contact(HostId(1), 150.0);
        h.close_contact(HostId(1), 160.0);
        h.open_contact(HostId(2), 170.0);
        h.close_contact(HostId(2), 180.0);
        let c = CWindowCentrality::new(100.0, 600.0, 2);
        assert_eq!(c.global(&h, 200.0), 1.5);
    }

    #[test]
    fn test_contacts_beyond_lookback_ignored() {
        let mut h = ContactHistory::new();
        h.open_contact(HostId(1), 0.0);
        h.close_contact(HostId(1), 10.0);
        let c = CWindowCentrality::new(100.0, 600.0, 5);
        assert_eq!(c.global(&h, 1000.0), 0.0);
    }
}
