use dtnsim_core::HostId;

use super::Centrality;
use crate::community::CommunityDetection;
use crate::history::ContactHistory;

/// Number of distinct peers ever met
#[derive(Debug, Clone, Copy, Default)]
pub struct DegreeCentrality;

impl Centrality for DegreeCentrality {
    fn global(&self, history: &ContactHistory, _now: f64) -> f64 {
        history.len() as f64
    }

    fn local(&self, history: &ContactHistory, community: &dyn CommunityDetection, _now: f64) -> f64 {
        history
            .peers()
            .filter(|h: &HostId| community.is_host_in_community(*h))
            .count() as f64
    }

    fn replicate(&self) -> Box<dyn Centrality> {
        Box::new(*self)
    }
}
