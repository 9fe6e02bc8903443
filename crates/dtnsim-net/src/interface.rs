//! Network interfaces and their link policies
//!
//! Each host interface is instantiated from a group-wide [`InterfaceConfig`]
//! prototype. The medium type is the name of the settings namespace the
//! prototype was read from; interfaces of different media never link.

use dtnsim_core::{
    Activeness, ConfigError, ConfigResult, ConnectionId, HostId, InterfaceId, Settings,
    activeness_from_settings,
};
use rand::Rng;
use rand::rngs::StdRng;

pub const TYPE_SETTING: &str = "type";
pub const RANGE_SETTING: &str = "transmitRange";
pub const SPEED_SETTING: &str = "transmitSpeed";
pub const SCAN_INTERVAL_SETTING: &str = "scanInterval";
pub const INTERFACE_COUNT_SETTING: &str = "interfaceCount";

const SCENARIO_NS: &str = "Scenario";
const GROUP_NS: &str = "Group";
const NROF_HOST_GROUPS_SETTING: &str = "nrofHostGroups";
const NROF_INTERFACES_SETTING: &str = "nrofInterfaces";

/// How an interface forms and keeps links
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkPolicy {
    /// Ad-hoc radio: links to scanning-visible peers within range
    SimpleBroadcast,
    /// Static wired backbone: links once to every member of its medium
    Internet,
    /// Bridge proxying mobiles on the listed media to each other
    AccessPoint { media: Vec<String> },
}

/// Group-wide interface prototype
#[derive(Debug)]
pub struct InterfaceConfig {
    pub medium: String,
    pub policy: LinkPolicy,
    pub range: f64,
    pub speed: u64,
    pub scan_interval: f64,
    pub activeness: Option<Box<dyn Activeness>>,
}

impl InterfaceConfig {
    pub fn simple_broadcast(medium: impl Into<String>, range: f64, speed: u64) -> Self {
        Self {
            medium: medium.into(),
            policy: LinkPolicy::SimpleBroadcast,
            range,
            speed,
            scan_interval: 0.0,
            activeness: None,
        }
    }

    pub fn internet(medium: impl Into<String>, speed: u64) -> Self {
        Self {
            medium: medium.into(),
            policy: LinkPolicy::Internet,
            range: 0.0,
            speed,
            scan_interval: 0.0,
            activeness: None,
        }
    }

    /// Access point serving mobiles on `media`
    pub fn access_point(
        medium: impl Into<String>,
        media: Vec<String>,
        range: f64,
        speed: u64,
    ) -> Self {
        Self {
            medium: medium.into(),
            policy: LinkPolicy::AccessPoint { media },
            range,
            speed,
            scan_interval: 0.0,
            activeness: None,
        }
    }

    pub fn with_scan_interval(mut self, interval: f64) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn with_activeness(mut self, model: Box<dyn Activeness>) -> Self {
        self.activeness = Some(model);
        self
    }

    /// Read the prototype declared under `namespace`
    pub fn from_settings(root: &Settings, namespace: &str, rng: &mut StdRng) -> ConfigResult<Self> {
        let s = root.scoped(namespace);
        let class = s.get(TYPE_SETTING)?;
        let policy = match class.rsplit('.').next().unwrap_or(class) {
            "SimpleBroadcastInterface" => LinkPolicy::SimpleBroadcast,
            "InternetInterface" => LinkPolicy::Internet,
            "APInterface" => {
                let media = if s.contains(INTERFACE_COUNT_SETTING) {
                    let count = s.get_u64(INTERFACE_COUNT_SETTING)? as usize;
                    let mut media = Vec::with_capacity(count);
                    for i in 0..count {
                        media.push(s.get(&format!("interface{}", i + 1))?.to_string());
                    }
                    media
                } else {
                    let mut media = declared_interfaces(root)?;
                    media.retain(|m| m != namespace);
                    media
                };
                LinkPolicy::AccessPoint { media }
            }
            other => {
                return Err(ConfigError::UnknownClass {
                    kind: "interface",
                    name: other.to_string(),
                });
            }
        };
        let range = match policy {
            LinkPolicy::Internet => s.get_non_negative_or(RANGE_SETTING, 0.0)?,
            _ => s.get_non_negative(RANGE_SETTING)?,
        };
        let speed = s.get_non_negative(SPEED_SETTING)? as u64;
        let scan_interval = s.get_non_negative_or(SCAN_INTERVAL_SETTING, 0.0)?;
        Ok(Self {
            medium: namespace.to_string(),
            policy,
            range,
            speed,
            scan_interval,
            activeness: activeness_from_settings(&s, rng)?,
        })
    }
}

/// Distinct interface namespaces named by any host group, in declaration order
///
/// Access points without an explicit `interfaceCount` serve all of them.
pub fn declared_interfaces(root: &Settings) -> ConfigResult<Vec<String>> {
    let groups = root.scoped(SCENARIO_NS).get_u64(NROF_HOST_GROUPS_SETTING)?;
    let mut names: Vec<String> = Vec::new();
    for i in 1..=groups {
        let g = root.scoped(format!("{GROUP_NS}{i}")).with_secondary(GROUP_NS);
        for j in 1..=g.get_u64(NROF_INTERFACES_SETTING)? {
            let name = g.get(&format!("interface{j}"))?;
            if !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

/// An interface bound to a host
#[derive(Debug)]
pub struct NetworkInterface {
    pub(crate) id: InterfaceId,
    pub(crate) host: HostId,
    pub(crate) medium: String,
    pub(crate) policy: LinkPolicy,
    pub(crate) range: f64,
    pub(crate) speed: u64,
    pub(crate) scan_interval: f64,
    pub(crate) last_scan: f64,
    pub(crate) activeness: Option<Box<dyn Activeness>>,
    pub(crate) connections: Vec<ConnectionId>,
    pub(crate) mesh_formed: bool,
}

impl NetworkInterface {
    /// Instantiate a prototype for `host`; the scan phase is drawn from `rng`
    pub fn from_config(
        config: &InterfaceConfig,
        id: InterfaceId,
        host: HostId,
        rng: &mut StdRng,
    ) -> Self {
        Self {
            id,
            host,
            medium: config.medium.clone(),
            policy: config.policy.clone(),
            range: config.range,
            speed: config.speed,
            scan_interval: config.scan_interval,
            last_scan: rng.random::<f64>() * config.scan_interval,
            activeness: config.activeness.as_ref().map(|a| a.replicate(rng)),
            connections: Vec::new(),
            mesh_formed: false,
        }
    }

    pub fn id(&self) -> InterfaceId {
        self.id
    }

    pub fn host(&self) -> HostId {
        self.host
    }

    pub fn medium(&self) -> &str {
        &self.medium
    }

    pub fn policy(&self) -> &LinkPolicy {
        &self.policy
    }

    pub fn is_access_point(&self) -> bool {
        matches!(self.policy, LinkPolicy::AccessPoint { .. })
    }

    pub fn range(&self) -> f64 {
        self.range
    }

    pub fn speed(&self) -> u64 {
        self.speed
    }

    pub fn scan_interval(&self) -> f64 {
        self.scan_interval
    }

    /// Live connections of this interface
    pub fn connections(&self) -> &[ConnectionId] {
        &self.connections
    }

    /// True in the first tick of each scan round
    pub fn is_scanning(&mut self, now: f64) -> bool {
        if self.scan_interval > 0.0 {
            if now < self.last_scan {
                return false;
            }
            if now > self.last_scan + self.scan_interval {
                self.last_scan = now;
                return true;
            }
            if now != self.last_scan {
                return false;
            }
        }
        true
    }

    pub fn is_active(&mut self, now: f64, rng: &mut StdRng) -> bool {
        if self.is_access_point() {
            return true;
        }
        match &mut self.activeness {
            Some(model) => model.is_active(now, rng),
            None => true,
        }
    }

    /// Access points never terminate links themselves
    pub fn accepting_connections(&mut self, now: f64, rng: &mut StdRng) -> bool {
        !self.is_access_point() && self.is_active(now, rng)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn bound(config: &InterfaceConfig) -> NetworkInterface {
        let mut rng = StdRng::seed_from_u64(0);
        NetworkInterface::from_config(config, InterfaceId(0), HostId(0), &mut rng)
    }

    #[test]
    fn test_zero_interval_always_scans() {
        let mut iface = bound(&InterfaceConfig::simple_broadcast("bt", 10.0, 100));
        assert!(iface.is_scanning(0.0));
        assert!(iface.is_scanning(0.5));
    }

    #[test]
    fn test_scan_rounds() {
        let mut iface = bound(&InterfaceConfig::simple_broadcast("bt", 10.0, 100).with_scan_interval(10.0));
        iface.last_scan = 2.0;
        assert!(!iface.is_scanning(1.0));
        assert!(iface.is_scanning(2.0));
        assert!(!iface.is_scanning(5.0));
        assert!(iface.is_scanning(13.0));
        // every query in the same tick of a round agrees
        assert!(iface.is_scanning(13.0));
        assert!(!iface.is_scanning(14.0));
    }

    #[test]
    fn test_scan_phase_within_interval() {
        let iface = bound(&InterfaceConfig::simple_broadcast("bt", 10.0, 100).with_scan_interval(30.0));
        assert!((0.0..=30.0).contains(&iface.last_scan));
    }

    #[test]
    fn test_access_point_is_active_but_not_accepting() {
        let mut rng = StdRng::seed_from_u64(0);
        let mut ap = bound(&InterfaceConfig::access_point("ap", vec!["bt".into()], 5.0, 100));
        assert!(ap.is_active(0.0, &mut rng));
        assert!(!ap.accepting_connections(0.0, &mut rng));
    }

    #[test]
    fn test_from_settings() {
        let mut rng = StdRng::seed_from_u64(0);
        let s = Settings::parse(
            "bt.type = SimpleBroadcastInterface\nbt.transmitRange = 10\nbt.transmitSpeed = 250k\n\
             ap.type = interfaces.APInterface\nap.transmitRange = 5\nap.transmitSpeed = 1M\n\
             ap.interfaceCount = 2\nap.interface1 = bt\nap.interface2 = wifi\n\
             bad.type = SimpleBroadcastInterface\nbad.transmitRange = -1\nbad.transmitSpeed = 1\n",
        )
        .unwrap();
        let bt = InterfaceConfig::from_settings(&s, "bt", &mut rng).unwrap();
        assert_eq!(bt.medium, "bt");
        assert_eq!(bt.speed, 250_000);
        let ap = InterfaceConfig::from_settings(&s, "ap", &mut rng).unwrap();
        assert_eq!(
            ap.policy,
            LinkPolicy::AccessPoint {
                media: vec!["bt".to_string(), "wifi".to_string()]
            }
        );
        let err = InterfaceConfig::from_settings(&s, "bad", &mut rng).unwrap_err();
        assert!(matches!(err, ConfigError::NegativeValue { .. }));
    }

    #[test]
    fn test_access_point_defaults_to_declared_interfaces() {
        let mut rng = StdRng::seed_from_u64(0);
        let s = Settings::parse(
            "Scenario.nrofHostGroups = 3
             Group.nrofInterfaces = 1
Group.interface1 = bt
             Group2.nrofInterfaces = 2
Group2.interface1 = ap
Group2.interface2 = wire
             Group3.nrofInterfaces = 2
Group3.interface1 = wifi
Group3.interface2 = bt
             ap.type = APInterface
ap.transmitRange = 5
ap.transmitSpeed = 1M
",
        )
        .unwrap();
        assert_eq!(declared_interfaces(&s).unwrap(), vec!["bt", "ap", "wire", "wifi"]);

        let ap = InterfaceConfig::from_settings(&s, "ap", &mut rng).unwrap();
        assert_eq!(
            ap.policy,
            LinkPolicy::AccessPoint {
                media: vec!["bt".to_string(), "wire".to_string(), "wifi".to_string()]
            }
        );
    }

    #[test]
    fn test_access_point_without_groups_is_config_error() {
        let mut rng = StdRng::seed_from_u64(0);
        let s = Settings::parse("ap.type = APInterface
ap.transmitRange = 5
ap.transmitSpeed = 1
").unwrap();
        let err = InterfaceConfig::from_settings(&s, "ap", &mut rng).unwrap_err();
        assert!(matches!(err, ConfigError::MissingSetting { key } if key == "Scenario.nrofHostGroups"));
    }
}
