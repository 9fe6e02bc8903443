//! Post-run reports
//!
//! Reports subscribe to the world's event bus as listeners and write their
//! result once the run ends. Each report is shared between the bus and the
//! world through `Rc<RefCell<_>>`, so the world can call [`Report::done`]
//! after the bus has fed it the whole run.
//!
//! Messages created before `Report.warmup` are ignored by message reports.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt::Debug;
use std::rc::Rc;

use dtnsim_core::{ConfigError, ConfigResult, ConnectionListener, Message, MessageListener, Settings};
use dtnsim_net::Network;
use dtnsim_routing::RouterTable;

mod community;
mod delivery_centrality;
mod event_log;
mod message_info;
mod message_stats;

pub use community::{CommunityDetectionReport, distinct_communities};
pub use delivery_centrality::DeliveryCentralityReport;
pub use event_log::EventLogReport;
pub use message_info::MessageInfoReport;
pub use message_stats::{MessageStats, MessageStatsReport};

/// Namespace of report settings
pub const REPORT_NS: &str = "Report";

/// Read-only view of the world handed to [`Report::done`]
pub struct ReportContext<'a> {
    pub scenario: &'a str,
    pub now: f64,
    pub network: &'a Network,
    pub routers: &'a RouterTable,
}

pub trait Report: ConnectionListener + MessageListener + Debug {
    /// Class name, also used in the output file name
    fn name(&self) -> &'static str;

    fn extension(&self) -> &'static str {
        "txt"
    }

    /// Render the report at the end of the run
    fn done(&mut self, ctx: &ReportContext) -> String;
}

/// A report shared between the event bus and the world
pub type SharedReport = Rc<RefCell<dyn Report>>;

fn shared<R: Report + 'static>(report: R) -> SharedReport {
    Rc::new(RefCell::new(report))
}

/// Build a report by class name
pub fn report_from_settings(class: &str, settings: &Settings) -> ConfigResult<SharedReport> {
    let warmup = settings.scoped(REPORT_NS).get_non_negative_or("warmup", 0.0)?;
    let report = match class.rsplit('.').next().unwrap_or(class) {
        "MessageInfoReport" => shared(MessageInfoReport::new(warmup)),
        "MessageStatsReport" => shared(MessageStatsReport::new(warmup)),
        "CommunityDetectionReport" => shared(CommunityDetectionReport::new()),
        "DeliveryCentralityReport" => shared(DeliveryCentralityReport::new(warmup)),
        "EventLogReport" => shared(EventLogReport::new()),
        other => {
            return Err(ConfigError::UnknownClass {
                kind: "report",
                name: other.to_string(),
            });
        }
    };
    Ok(report)
}

/// Warm-up filter shared by the message reports
#[derive(Debug, Clone, Default)]
pub(crate) struct Warmup {
    until: f64,
    ignored: HashSet<String>,
}

impl Warmup {
    pub(crate) fn new(until: f64) -> Self {
        Self {
            until,
            ignored: HashSet::new(),
        }
    }

    /// Record a creation; false when it falls inside the warm-up period
    pub(crate) fn admit(&mut self, m: &Message, time: f64) -> bool {
        if time < self.until {
            self.ignored.insert(m.id().to_string());
            return false;
        }
        true
    }

    pub(crate) fn is_ignored(&self, m: &Message) -> bool {
        self.ignored.contains(m.id())
    }
}

/// Ratio, `NaN` when the denominator is zero
pub(crate) fn ratio(num: f64, den: f64) -> f64 {
    if den == 0.0 { f64::NAN } else { num / den }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtnsim_core::HostId;

    #[test]
    fn test_registry_knows_all_reports() {
        let s = Settings::new();
        for class in [
            "MessageInfoReport",
            "report.MessageStatsReport",
            "CommunityDetectionReport",
            "DeliveryCentralityReport",
            "EventLogReport",
        ] {
            let r = report_from_settings(class, &s).unwrap();
            assert!(class.ends_with(r.borrow().name()));
        }
        assert!(report_from_settings("ContactTimesReport", &s).is_err());
    }

    #[test]
    fn test_warmup_ignores_early_messages() {
        let mut w = Warmup::new(100.0);
        let early = Message::new(HostId(0), HostId(1), "a", 1, 50.0);
        let late = Message::new(HostId(0), HostId(1), "b", 1, 150.0);
        assert!(!w.admit(&early, 50.0));
        assert!(w.admit(&late, 150.0));
        assert!(w.is_ignored(&early));
        assert!(!w.is_ignored(&late));
    }
}
