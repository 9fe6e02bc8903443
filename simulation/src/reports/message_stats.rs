use std::collections::HashMap;
use std::fmt::Write;

use dtnsim_core::{ConnectionListener, HostId, Message, MessageListener};
use serde::Serialize;

use super::{Report, ReportContext, Warmup, ratio};

/// Totals collected by [`MessageStatsReport`]
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MessageStats {
    pub created: u64,
    pub started: u64,
    pub relayed: u64,
    pub aborted: u64,
    pub dropped: u64,
    pub removed: u64,
    pub delivered: u64,
    pub response_delivered: u64,
    pub latencies: Vec<f64>,
    pub hop_counts: Vec<usize>,
}

impl MessageStats {
    pub fn delivery_prob(&self) -> f64 {
        ratio(self.delivered as f64, self.created as f64)
    }

    /// Relays spent per delivery beyond the delivering one
    pub fn overhead_ratio(&self) -> f64 {
        ratio(self.relayed as f64 - self.delivered as f64, self.delivered as f64)
    }

    pub fn latency_avg(&self) -> f64 {
        ratio(self.latencies.iter().sum(), self.latencies.len() as f64)
    }

    pub fn latency_median(&self) -> f64 {
        median(&self.latencies)
    }

    pub fn hop_count_avg(&self) -> f64 {
        ratio(
            self.hop_counts.iter().sum::<usize>() as f64,
            self.hop_counts.len() as f64,
        )
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Aggregate message statistics for the whole run
#[derive(Debug, Default)]
pub struct MessageStatsReport {
    warmup: Warmup,
    stats: MessageStats,
    creation: HashMap<String, f64>,
}

impl MessageStatsReport {
    pub fn new(warmup: f64) -> Self {
        Self {
            warmup: Warmup::new(warmup),
            ..Self::default()
        }
    }

    pub fn stats(&self) -> &MessageStats {
        &self.stats
    }
}

impl ConnectionListener for MessageStatsReport {}

impl MessageListener for MessageStatsReport {
    fn new_message(&mut self, m: &Message, time: f64) {
        if !self.warmup.admit(m, time) {
            return;
        }
        self.stats.created += 1;
        self.creation.insert(m.id().to_string(), time);
    }

    fn transfer_started(&mut self, m: &Message, _from: HostId, _to: HostId, _time: f64) {
        if !self.warmup.is_ignored(m) {
            self.stats.started += 1;
        }
    }

    fn transferred(&mut self, m: &Message, _from: HostId, _to: HostId, first: bool, time: f64) {
        if self.warmup.is_ignored(m) {
            return;
        }
        self.stats.relayed += 1;
        if !first {
            return;
        }
        self.stats.delivered += 1;
        self.stats.hop_counts.push(m.hop_count());
        if let Some(created) = self.creation.get(m.id()) {
            self.stats.latencies.push(time - created);
        }
        if m.is_response() {
            self.stats.response_delivered += 1;
        }
    }

    fn deleted(&mut self, m: &Message, _at: HostId, dropped: bool, _time: f64) {
        if self.warmup.is_ignored(m) {
            return;
        }
        if dropped {
            self.stats.dropped += 1;
        } else {
            self.stats.removed += 1;
        }
    }

    fn transfer_aborted(&mut self, m: &Message, _from: HostId, _to: HostId, _time: f64) {
        if !self.warmup.is_ignored(m) {
            self.stats.aborted += 1;
        }
    }
}

impl Report for MessageStatsReport {
    fn name(&self) -> &'static str {
        "MessageStatsReport"
    }

    fn done(&mut self, ctx: &ReportContext) -> String {
        let s = &self.stats;
        let mut out = format!("Message stats for scenario {}\nsim_time: {:.4}\n", ctx.scenario, ctx.now);
        let _ = writeln!(out, "created: {}", s.created);
        let _ = writeln!(out, "started: {}", s.started);
        let _ = writeln!(out, "relayed: {}", s.relayed);
        let _ = writeln!(out, "aborted: {}", s.aborted);
        let _ = writeln!(out, "dropped: {}", s.dropped);
        let _ = writeln!(out, "removed: {}", s.removed);
        let _ = writeln!(out, "delivered: {}", s.delivered);
        let _ = writeln!(out, "delivery_prob: {:.4}", s.delivery_prob());
        let _ = writeln!(out, "response_delivered: {}", s.response_delivered);
        let _ = writeln!(out, "overhead_ratio: {:.4}", s.overhead_ratio());
        let _ = writeln!(out, "latency_avg: {:.4}", s.latency_avg());
        let _ = writeln!(out, "latency_med: {:.4}", s.latency_median());
        let _ = writeln!(out, "hopcount_avg: {:.4}", s.hop_count_avg());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_median() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
        assert_eq!(median(&[4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(median(&[]).is_nan());
    }

    #[test]
    fn test_counts_relays_and_deliveries() {
        let mut r = MessageStatsReport::new(10.0);
        let early = Message::new(HostId(0), HostId(2), "early", 10, 0.0);
        let m = Message::new(HostId(0), HostId(2), "m", 10, 20.0);
        r.new_message(&early, 0.0);
        r.new_message(&m, 20.0);

        let mut hop1 = m.clone();
        hop1.add_hop(HostId(1));
        r.transfer_started(&m, HostId(0), HostId(1), 20.0);
        r.transferred(&hop1, HostId(0), HostId(1), false, 21.0);
        let mut hop2 = hop1.clone();
        hop2.add_hop(HostId(2));
        r.transferred(&hop2, HostId(1), HostId(2), true, 30.0);
        r.transferred(&early, HostId(0), HostId(2), true, 30.0);
        r.deleted(&m, HostId(0), true, 40.0);

        let s = r.stats();
        assert_eq!(s.created, 1);
        assert_eq!(s.started, 1);
        assert_eq!(s.relayed, 2);
        assert_eq!(s.delivered, 1);
        assert_eq!(s.dropped, 1);
        assert_eq!(s.delivery_prob(), 1.0);
        assert_eq!(s.overhead_ratio(), 1.0);
        assert_eq!(s.latency_avg(), 10.0);
        assert_eq!(s.hop_count_avg(), 2.0);
    }
}
