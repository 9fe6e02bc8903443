use super::{Centrality, CentralityCache, average, epoch_degrees};
use crate::community::CommunityDetection;
use crate::history::ContactHistory;

/// Mean unique-peer count over every full window since the start of the run
#[derive(Debug, Clone)]
pub struct AvgDegreeCentrality {
    window: f64,
    cache: CentralityCache,
}

impl AvgDegreeCentrality {
    pub fn new(window: f64, compute_interval: f64) -> Self {
        Self {
            window,
            cache: CentralityCache::new(compute_interval),
        }
    }

    fn epochs(&self, now: f64) -> usize {
        if self.window <= 0.0 {
            return 0;
        }
        (now / self.window).floor() as usize
    }
}

impl Centrality for AvgDegreeCentrality {
    fn global(&self, history: &ContactHistory, now: f64) -> f64 {
        self.cache.global(now, |t| {
            average(&epoch_degrees(history.iter(), t, self.window, self.epochs(t)))
        })
    }

    fn local(&self, history: &ContactHistory, community: &dyn CommunityDetection, now: f64) -> f64 {
        self.cache.local(now, |t| {
            let members = history
                .iter()
                .filter(|(h, _)| community.is_host_in_community(*h));
            average(&epoch_degrees(members, t, self.window, self.epochs(t)))
        })
    }

    fn replicate(&self) -> Box<dyn Centrality> {
        Box::new(Self::new(self.window, self.cache.interval()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtnsim_core::HostId;

    #[test]
    fn test_zero_before_first_window() {
        let mut h = ContactHistory::new();
        h.open_contact(HostId(1), 0.0);
        h.close_contact(HostId(1), 10.0);
        assert_eq!(AvgDegreeCentrality::new(100.0, 600.0).global(&h, 50.0), 0.0);
    }

    #[test]
    fn test_lookback_grows_with_time() {
        let mut h = ContactHistory::new();
        h.open_contact(HostId(1), 0.0);
        h.close_contact(HostId(1), 10.0);
        h.open_contact(HostId(2), 250.0);
        h.close_contact(HostId(2), 260.0);
        // four windows at t=400: peer 2 in epoch 1, peer 1 in epoch 3
        assert_eq!(AvgDegreeCentrality::new(100.0, 600.0).global(&h, 400.0), 0.5);
    }
}
