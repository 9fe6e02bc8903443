use super::{Centrality, CentralityCache};
use crate::community::CommunityDetection;
use crate::history::ContactHistory;

/// Peers whose most recent contact ended within the last `window` seconds
#[derive(Debug, Clone)]
pub struct SWindowCentrality {
    window: f64,
    cache: CentralityCache,
}

impl SWindowCentrality {
    pub fn new(window: f64, compute_interval: f64) -> Self {
        Self {
            window,
            cache: CentralityCache::new(compute_interval),
        }
    }

    fn recent_peers<'a>(
        &'a self,
        history: &'a ContactHistory,
        now: f64,
    ) -> impl Iterator<Item = dtnsim_core::HostId> + 'a {
        history.iter().filter_map(move |(peer, intervals)| {
            let last = intervals.last()?;
            (now - last.end < self.window).then_some(peer)
        })
    }
}

impl Centrality for SWindowCentrality {
    fn global(&self, history: &ContactHistory, now: f64) -> f64 {
        self.cache
            .global(now, |t| self.recent_peers(history, t).count() as f64)
    }

    fn local(&self, history: &ContactHistory, community: &dyn CommunityDetection, now: f64) -> f64 {
        self.cache.local(now, |t| {
            self.recent_peers(history, t)
                .filter(|h| community.is_host_in_community(*h))
                .count() as f64
        })
    }

    fn replicate(&self) -> Box<dyn Centrality> {
        Box::new(Self::new(self.window, self.cache.interval()))
    }
}
