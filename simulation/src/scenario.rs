//! World construction from settings
//!
//! ```text
//! Scenario.name = two_nodes
//! Scenario.endTime = 100
//! Scenario.updateInterval = 1
//! Scenario.nrofHostGroups = 1
//!
//! Group.router = EpidemicWithCureRouter
//! Group.nrofInterfaces = 1
//! Group.interface1 = bt
//! Group1.groupID = n
//! Group1.nrofHosts = 2
//! Group1.movementModel = RandomWaypoint
//!
//! bt.type = SimpleBroadcastInterface
//! bt.transmitRange = 10
//! bt.transmitSpeed = 250k
//! ```
//!
//! `Group{i}` settings fall back to `Group`, then to the root. Event
//! generators are read from `Events{i}` and reports from `Report.report{i}`.

use std::path::{Path, PathBuf};

use dtnsim_core::{ConfigError, ConfigResult, Settings, SimContext, SimResult};
use dtnsim_net::{InterfaceConfig, Network};
use dtnsim_routing::{MessageRouter, router_from_settings};
use tracing::{debug, info};

use crate::events::event_source_from_settings;
use crate::movement::{MovementModel, movement_from_settings};
use crate::reports::{REPORT_NS, report_from_settings};
use crate::world::{World, WorldConfig};

pub const SCENARIO_NS: &str = "Scenario";
pub const GROUP_NS: &str = "Group";
pub const EVENTS_NS: &str = "Events";
pub const OPTIMIZATION_NS: &str = "Optimization";

/// Default directory for report files
pub const DEFAULT_REPORT_DIR: &str = "reports";

/// A world built from settings, with the report destination
pub struct Scenario {
    pub world: World,
    pub report_dir: PathBuf,
}

/// Everything needed to add the hosts of one group
struct GroupPlan {
    id: String,
    interfaces: Vec<InterfaceConfig>,
    router: Box<dyn MessageRouter>,
    movements: Vec<Box<dyn MovementModel>>,
}

impl Scenario {
    /// Parse and build the scenario in `path`
    pub fn load(path: impl AsRef<Path>) -> SimResult<Self> {
        let settings = Settings::load(path)?;
        Self::from_settings(&settings)
    }

    pub fn from_settings(settings: &Settings) -> SimResult<Self> {
        let sc = settings.scoped(SCENARIO_NS);
        let config = WorldConfig {
            name: sc.get_or("name", "default_scenario").to_string(),
            end_time: sc.get_non_negative("endTime")?,
            update_interval: positive(&sc, "updateInterval", 1.0)?,
            keep_event_log: sc.get_bool_or("keepEventLog", false)?,
        };
        let mut ctx = SimContext::new(sc.get_u64_or("rngSeed", dtnsim_core::DEFAULT_SEED)?);

        let mult = settings
            .scoped(OPTIMIZATION_NS)
            .get_f64_or("cellSizeMult", 1.0)?;
        if mult < 1.0 {
            return Err(ConfigError::InvalidValue {
                key: format!("{OPTIMIZATION_NS}.cellSizeMult"),
                value: mult.to_string(),
                reason: "must be at least 1".to_string(),
            }
            .into());
        }

        let nrof_groups = sc.get_u64("nrofHostGroups")?;
        let mut plans = Vec::new();
        for i in 1..=nrof_groups {
            plans.push(plan_group(settings, i, &mut ctx)?);
        }

        let nrof_events = settings.scoped(EVENTS_NS).get_u64_or("nrof", 0)?;
        let mut sources = Vec::new();
        for i in 1..=nrof_events {
            sources.push(event_source_from_settings(settings, i as usize, &mut ctx.rng)?);
        }

        let rs = settings.scoped(REPORT_NS);
        let mut reports = Vec::new();
        for i in 1..=rs.get_u64_or("nrofReports", 0)? {
            let class = rs.get(&format!("report{i}"))?;
            reports.push(report_from_settings(class, settings)?);
        }
        let report_dir = PathBuf::from(rs.get_or("reportDir", DEFAULT_REPORT_DIR));

        let network = Network::new().with_cell_size_mult(mult);
        let mut world = World::new(config, network, ctx);
        for plan in plans {
            for movement in plan.movements {
                let name = format!("{}{}", plan.id, world.host_count());
                world.add_host(name, &plan.id, movement, &plan.interfaces, plan.router.as_ref())?;
            }
        }
        for source in sources {
            world.add_event_source(source);
        }
        for report in reports {
            world.add_shared_report(report);
        }
        info!(
            scenario = %world.name(),
            hosts = world.host_count(),
            groups = nrof_groups,
            "Scenario built"
        );
        Ok(Self { world, report_dir })
    }
}

fn plan_group(root: &Settings, index: u64, ctx: &mut SimContext) -> ConfigResult<GroupPlan> {
    let g = root.scoped(format!("{GROUP_NS}{index}")).with_secondary(GROUP_NS);
    let id = g.get_or("groupID", "n").to_string();
    let nrof_hosts = g.get_u64("nrofHosts")?;

    let mut interfaces = Vec::new();
    for j in 1..=g.get_u64("nrofInterfaces")? {
        let ns = g.get(&format!("interface{j}"))?;
        interfaces.push(InterfaceConfig::from_settings(root, ns, &mut ctx.rng)?);
    }

    let router = router_from_settings(g.get("router")?, &g, root)?;
    let prototype = movement_from_settings(&g, root)?;
    let movements = (0..nrof_hosts)
        .map(|_| prototype.replicate(&mut ctx.rng))
        .collect();
    debug!(group = %id, hosts = nrof_hosts, interfaces = interfaces.len(), "Group planned");
    Ok(GroupPlan {
        id,
        interfaces,
        router,
        movements,
    })
}

fn positive(s: &Settings, key: &str, default: f64) -> ConfigResult<f64> {
    let value = s.get_f64_or(key, default)?;
    if value <= 0.0 {
        return Err(ConfigError::InvalidValue {
            key: s.full_key(key),
            value: value.to_string(),
            reason: "must be positive".to_string(),
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtnsim_core::HostId;

    const TWO_GROUPS: &str = "
        Scenario.name = grouped
        Scenario.endTime = 10
        Scenario.nrofHostGroups = 2
        Group.router = EpidemicWithCureRouter
        Group.nrofInterfaces = 1
        Group.interface1 = bt
        Group.movementModel = StationaryMovement
        Group1.groupID = a
        Group1.nrofHosts = 2
        Group1.nodeLocation = 0,0
        Group2.groupID = b
        Group2.nrofHosts = 1
        Group2.nodeLocation = 5,0
        bt.type = SimpleBroadcastInterface
        bt.transmitRange = 10
        bt.transmitSpeed = 1k
        Report.nrofReports = 1
        Report.report1 = MessageStatsReport
        Report.reportDir = out
    ";

    #[test]
    fn test_builds_groups_in_order() {
        let s = Settings::parse(TWO_GROUPS).unwrap();
        let scenario = Scenario::from_settings(&s).unwrap();
        let w = &scenario.world;
        assert_eq!(w.name(), "grouped");
        assert_eq!(w.host_count(), 3);
        let names: Vec<&str> = w.network().hosts().iter().map(|h| h.name()).collect();
        assert_eq!(names, vec!["a0", "a1", "b2"]);
        assert_eq!(w.network().host(HostId(2)).unwrap().group(), "b");
        assert_eq!(scenario.report_dir, PathBuf::from("out"));
    }

    #[test]
    fn test_missing_setting_is_named() {
        let mut s = Settings::parse(TWO_GROUPS).unwrap();
        s.set("Group2.router", "NoSuchRouter");
        let err = Scenario::from_settings(&s).err().unwrap();
        assert!(err.to_string().contains("NoSuchRouter"));
    }

    #[test]
    fn test_rejects_small_cell_multiplier() {
        let mut s = Settings::parse(TWO_GROUPS).unwrap();
        s.set("Optimization.cellSizeMult", 0.5);
        assert!(Scenario::from_settings(&s).is_err());
    }

    #[test]
    fn test_rejects_zero_tick() {
        let mut s = Settings::parse(TWO_GROUPS).unwrap();
        s.set("Scenario.updateInterval", 0);
        assert!(Scenario::from_settings(&s).is_err());
    }
}
