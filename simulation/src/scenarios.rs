//! Built-in scenarios
//!
//! Small literal worlds with seed 0 whose outcome is known in advance. Each
//! one is written as settings text and goes through the same builder as a
//! configuration file. Hosts get one group each, so a host named `A0` is
//! address 0 of group `A`.

use std::fmt::Display;

use dtnsim_core::{ConfigError, HostId, Settings, SimEvent, SimResult};
use dtnsim_routing::{PubSubKind, Publication};

use crate::reports::distinct_communities;
use crate::scenario::Scenario;
use crate::world::World;

/// Names accepted by [`builtin`]
pub const BUILTIN_SCENARIOS: &[&str] = &[
    "two_nodes",
    "two_nodes_snf",
    "out_of_range",
    "bridge",
    "epidemic_cure",
    "community_formation",
    "spray_and_focus_halving",
    "pubsub",
];

/// Where a host sits over time
enum Placement {
    At(f64, f64),
    /// `(t, x, y)` waypoints
    Script(Vec<(f64, f64, f64)>),
}

/// Settings text of a scenario with one host per group
struct ScenarioText {
    lines: Vec<String>,
    groups: usize,
}

impl ScenarioText {
    fn new(name: &str, end_time: f64) -> Self {
        let mut text = Self {
            lines: Vec::new(),
            groups: 0,
        };
        text.set("Scenario.name", name);
        text.set("Scenario.endTime", end_time);
        text.set("Scenario.keepEventLog", true);
        text.set("Group.nrofHosts", 1);
        text.set("Report.nrofReports", 2);
        text.set("Report.report1", "MessageStatsReport");
        text.set("Report.report2", "MessageInfoReport");
        text
    }

    fn set(&mut self, key: &str, value: impl Display) -> &mut Self {
        self.lines.push(format!("{key} = {value}"));
        self
    }

    /// Radio shared by every host unless a group overrides its interfaces
    fn radio(&mut self, range: f64, speed: u64) -> &mut Self {
        self.set("Group.nrofInterfaces", 1)
            .set("Group.interface1", "radio")
            .set("radio.type", "SimpleBroadcastInterface")
            .set("radio.transmitRange", range)
            .set("radio.transmitSpeed", speed)
    }

    /// Add a one-host group; returns its group index
    fn host(&mut self, id: &str, placement: Placement) -> usize {
        self.groups += 1;
        let g = format!("Group{}", self.groups);
        self.set(&format!("{g}.groupID"), id);
        match placement {
            Placement::At(x, y) => {
                self.set(&format!("{g}.movementModel"), "StationaryMovement");
                self.set(&format!("{g}.nodeLocation"), format!("{x},{y}"));
            }
            Placement::Script(points) => {
                let csv: Vec<String> = points
                    .iter()
                    .map(|(t, x, y)| format!("{t},{x},{y}"))
                    .collect();
                self.set(&format!("{g}.movementModel"), "ScriptedMovement");
                self.set(&format!("{g}.waypoints"), csv.join(","));
            }
        }
        self.groups
    }

    fn build(mut self) -> SimResult<World> {
        let groups = self.groups;
        self.set("Scenario.nrofHostGroups", groups);
        let settings = Settings::parse(&self.lines.join("\n"))?;
        Ok(Scenario::from_settings(&settings)?.world)
    }
}

/// Build a built-in scenario, ready to run
pub fn builtin(name: &str) -> SimResult<World> {
    match name {
        "two_nodes" => two_nodes(5.0, false),
        "two_nodes_snf" => two_nodes(5.0, true),
        "out_of_range" => out_of_range(),
        "bridge" => bridge(),
        "epidemic_cure" => epidemic_cure(),
        "community_formation" => community_formation(),
        "spray_and_focus_halving" => spray_and_focus_halving(),
        "pubsub" => pubsub(),
        other => Err(ConfigError::UnknownClass {
            kind: "scenario",
            name: other.to_string(),
        }
        .into()),
    }
}

/// Two hosts 5 m apart; A sends a 500-byte message to B at t=0
///
/// With spray-and-focus at one copy the sender gives its only copy away.
pub fn two_nodes(distance: f64, spray_and_focus: bool) -> SimResult<World> {
    let name = if spray_and_focus { "two_nodes_snf" } else { "two_nodes" };
    let mut text = ScenarioText::new(name, 20.0);
    text.radio(10.0, 100);
    if spray_and_focus {
        text.set("Group.router", "SprayAndFocusRouter")
            .set("SprayAndFocusRouter.nrofCopies", 1);
    } else {
        text.set("Group.router", "EpidemicRouter");
    }
    text.host("A", Placement::At(0.0, 0.0));
    text.host("B", Placement::At(distance, 0.0));
    let mut world = text.build()?;
    world.schedule_message(0.0, HostId(0), HostId(1), "m0", 500);
    Ok(world)
}

/// Like [`two_nodes`] with B out of range and a one-minute TTL
pub fn out_of_range() -> SimResult<World> {
    let mut text = ScenarioText::new("out_of_range", 100.0);
    text.radio(10.0, 100)
        .set("Group.router", "EpidemicRouter")
        .set("Group.msgTtl", 1);
    text.host("A", Placement::At(0.0, 0.0));
    text.host("B", Placement::At(20.0, 0.0));
    let mut world = text.build()?;
    world.schedule_message(0.0, HostId(0), HostId(1), "m0", 500);
    Ok(world)
}

/// Two mobiles joined through access points on a wired mesh
///
/// Hosts: `M0` and `M3` are the mobiles, `AP1` and `AP2` their access
/// points, a kilometer apart.
pub fn bridge() -> SimResult<World> {
    let mut text = ScenarioText::new("bridge", 30.0);
    text.set("Group.router", "EpidemicWithCureRouter")
        .set("Group.nrofInterfaces", 1)
        .set("Group.interface1", "wlan")
        .set("wlan.type", "SimpleBroadcastInterface")
        .set("wlan.transmitRange", 5)
        .set("wlan.transmitSpeed", 1000)
        .set("ap.type", "APInterface")
        .set("ap.transmitRange", 5)
        .set("ap.transmitSpeed", 1000)
        .set("ap.interfaceCount", 1)
        .set("ap.interface1", "wlan")
        .set("wire.type", "InternetInterface")
        .set("wire.transmitSpeed", "10M");
    text.host("M", Placement::At(0.0, 0.0));
    for x in [2.0, 1000.0] {
        let g = text.host("AP", Placement::At(x, 0.0));
        text.set(&format!("Group{g}.nrofInterfaces"), 2)
            .set(&format!("Group{g}.interface1"), "ap")
            .set(&format!("Group{g}.interface2"), "wire");
    }
    text.host("M", Placement::At(1002.0, 0.0));
    let mut world = text.build()?;
    world.schedule_message(0.0, HostId(0), HostId(3), "m0", 500);
    Ok(world)
}

/// A meets B at t=0, B meets C at t=10, C meets A at t=20; A sends to C
pub fn epidemic_cure() -> SimResult<World> {
    let mut text = ScenarioText::new("epidemic_cure", 40.0);
    text.radio(10.0, 100)
        .set("Group.router", "EpidemicWithCureRouter");
    text.host("A", Placement::Script(vec![(0.0, 0.0, 0.0), (20.0, 495.0, 0.0)]));
    text.host(
        "B",
        Placement::Script(vec![(0.0, 5.0, 0.0), (10.0, 505.0, 0.0), (20.0, -1000.0, 0.0)]),
    );
    text.host("C", Placement::At(500.0, 0.0));
    let mut world = text.build()?;
    world.schedule_message(0.0, HostId(0), HostId(2), "m", 100);
    Ok(world)
}

/// Ten hosts in two clusters of five, then a few scripted meetings
///
/// The clusters stay together for 300 s, far beyond the 100 s familiar
/// threshold, then disperse. Afterwards: `4` briefly meets `5` (400 s),
/// `0` meets `1` (500 s), `0` meets `4` (530 s), `4` meets `5` (560 s)
/// and `5` meets `9` (590 s). A message from `0` to `9` is created at
/// 450 s.
pub fn community_formation() -> SimResult<World> {
    let mut text = ScenarioText::new("community_formation", 700.0);
    text.radio(10.0, 1000)
        .set("Group.router", "DecisionEngineRouter")
        .set("DecisionEngineRouter.decisionEngine", "DistributedBubbleRap")
        .set("DistributedBubbleRap.communityDetectAlg", "SimpleCommunityDetection")
        .set("DistributedBubbleRap.centralityAlg", "DegreeCentrality")
        .set("DistributedBubbleRap.familiarThreshold", 100)
        .set("Report.nrofReports", 3)
        .set("Report.report3", "CommunityDetectionReport");

    const SLOTS: [(f64, f64); 5] = [(0.0, 0.0), (2.0, 0.0), (4.0, 0.0), (0.0, 2.0), (2.0, 2.0)];
    let meet_p = (5000.0, 5000.0);
    let meet_q = (-5000.0, 5000.0);
    let meet_r = (0.0, 5000.0);
    let meet_s = (9000.0, 5000.0);
    for i in 0..10 {
        let (sx, sy) = SLOTS[i % 5];
        let cx = if i < 5 { 0.0 } else { 1000.0 };
        let away = (10000.0 + 1000.0 * i as f64, 0.0);
        let mut points = vec![(0.0, cx + sx, sy), (300.0, away.0, away.1)];
        // (time, spot, x offset)
        let meetings: Vec<(f64, (f64, f64), f64)> = match i {
            0 => vec![(500.0, meet_q, 0.0), (530.0, meet_r, 0.0)],
            1 => vec![(500.0, meet_q, 5.0)],
            4 => vec![(400.0, meet_p, 0.0), (530.0, meet_r, 5.0), (560.0, meet_p, 0.0)],
            5 => vec![(400.0, meet_p, 5.0), (560.0, meet_p, 5.0), (590.0, meet_s, 0.0)],
            9 => vec![(590.0, meet_s, 5.0)],
            _ => Vec::new(),
        };
        for (t, (x, y), dx) in meetings {
            points.push((t, x + dx, y));
            points.push((t + 20.0, away.0, away.1));
        }
        text.host("n", Placement::Script(points));
    }
    let mut world = text.build()?;
    world.schedule_message(450.0, HostId(0), HostId(9), "m", 100);
    Ok(world)
}

/// A spray-and-focus source with 8 copies meets three relays in turn
pub fn spray_and_focus_halving() -> SimResult<World> {
    let mut text = ScenarioText::new("spray_and_focus_halving", 60.0);
    text.radio(10.0, 100)
        .set("Group.router", "SprayAndFocusRouter")
        .set("SprayAndFocusRouter.nrofCopies", 8);
    text.host("S", Placement::At(0.0, 0.0));
    for (k, name) in ["B", "C", "D"].into_iter().enumerate() {
        let meet = 20.0 * k as f64;
        let away = 10000.0 * (k as f64 + 1.0);
        let mut points = vec![(0.0, away, 0.0), (meet, 5.0, 0.0), (meet + 10.0, away, 0.0)];
        if meet == 0.0 {
            points.remove(0);
        }
        text.host(name, Placement::Script(points));
    }
    text.host("E", Placement::At(90000.0, 0.0));
    let mut world = text.build()?;
    world.schedule_message(0.0, HostId(0), HostId(4), "m", 100);
    Ok(world)
}

/// Topic data reaches two subscribers, one through a relay
///
/// `S2` and `S3` subscribe to `news` at t=0 while relay `R1` sits next to
/// `S2`. `R1` visits publisher `P0` at t=10, after `P0` published at t=5,
/// and returns to `S2` at t=20. `S3` walks up to `P0` at t=40.
pub fn pubsub() -> SimResult<World> {
    let mut text = ScenarioText::new("pubsub", 60.0);
    text.radio(10.0, 100)
        .set("Group.router", "PubSubRouter")
        .set("PubSubRouter.decisionEngine", "ProphetDecisionEngine");
    text.host("P", Placement::At(0.0, 0.0));
    text.host(
        "R",
        Placement::Script(vec![
            (0.0, 505.0, 0.0),
            (10.0, 5.0, 0.0),
            (20.0, 505.0, 0.0),
            (30.0, 10000.0, 0.0),
        ]),
    );
    text.host("S", Placement::At(500.0, 0.0));
    text.host("S", Placement::Script(vec![(0.0, -500.0, 0.0), (40.0, -5.0, 0.0)]));
    let mut world = text.build()?;
    for (i, host) in [HostId(2), HostId(3)].into_iter().enumerate() {
        let subscribe = Publication::new(PubSubKind::Subscribe, "news");
        world.schedule_publication(0.0, host, subscribe, &format!("sub{i}"), 0);
    }
    let data = Publication::new(PubSubKind::Data, "news");
    world.schedule_publication(5.0, HostId(0), data, "d", 100);
    Ok(world)
}

// ============================================================================
// Running and summaries
// ============================================================================

/// Build, run and summarize a built-in scenario
pub fn run_builtin(name: &str) -> SimResult<World> {
    println!("=== Scenario: {name} ===\n");
    let mut world = builtin(name)?;
    for host in world.network().hosts() {
        println!("  {} ({}) at {}", host.name(), host.id(), host.location());
    }
    world.run()?;
    world.check_invariants()?;
    print_summary(&world);
    Ok(world)
}

/// Print deliveries, holdings and communities of a finished world
pub fn print_summary(world: &World) {
    println!("\n=== Deliveries ===");
    for e in world.events().log() {
        if let SimEvent::MessageTransferred {
            id,
            from,
            to,
            first_delivery: true,
            hops,
            time,
        } = e
        {
            println!("  t={time:>6.1}  {id}: {from} -> {to}  hops {hops:?}");
        }
    }

    println!("\n=== Buffers ===");
    for router in world.routers().iter() {
        let ids: Vec<&str> = router.messages().iter().map(|m| m.id()).collect();
        println!("  {}: {:?}", router.host(), ids);
    }

    let communities = distinct_communities(world.routers());
    if !communities.is_empty() {
        println!("\n=== Communities ===");
        for c in communities {
            println!("  {c:?}");
        }
    }

    println!("\n=== Final Statistics ===");
    for report in world.render_reports() {
        if report.name == "MessageStatsReport" {
            for line in report.text.lines().skip(2) {
                println!("  {line}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_builtin_builds() {
        for name in BUILTIN_SCENARIOS {
            let world = builtin(name).unwrap();
            assert_eq!(world.name(), *name);
        }
        assert!(builtin("nope").is_err());
    }

    #[test]
    fn test_host_names_follow_groups() {
        let world = bridge().unwrap();
        let names: Vec<&str> = world.network().hosts().iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["M0", "AP1", "AP2", "M3"]);
    }
}
