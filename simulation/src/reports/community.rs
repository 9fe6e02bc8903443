use std::collections::BTreeSet;
use std::fmt::Write;

use dtnsim_core::{ConnectionListener, HostId, MessageListener};
use dtnsim_routing::RouterTable;

use super::{Report, ReportContext};

/// Distinct local communities of community-aware routers
#[derive(Debug, Default)]
pub struct CommunityDetectionReport;

impl CommunityDetectionReport {
    pub fn new() -> Self {
        Self
    }
}

/// Distinct non-empty local communities, in first-seen host order
pub fn distinct_communities(routers: &RouterTable) -> Vec<BTreeSet<HostId>> {
    let mut seen: Vec<BTreeSet<HostId>> = Vec::new();
    for router in routers.iter() {
        let Some(community) = router.decision_engine().and_then(|e| e.local_community()) else {
            continue;
        };
        if !community.is_empty() && !seen.contains(community) {
            seen.push(community.clone());
        }
    }
    seen
}

impl ConnectionListener for CommunityDetectionReport {}
impl MessageListener for CommunityDetectionReport {}

impl Report for CommunityDetectionReport {
    fn name(&self) -> &'static str {
        "CommunityDetectionReport"
    }

    fn done(&mut self, ctx: &ReportContext) -> String {
        let mut out = String::new();
        for community in distinct_communities(ctx.routers) {
            let members: Vec<String> = community.iter().map(ToString::to_string).collect();
            let _ = writeln!(out, "{} [{}]", community.len(), members.join(", "));
        }
        out
    }
}
