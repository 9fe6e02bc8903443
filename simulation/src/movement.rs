//! Movement models
//!
//! The world asks every host's model for `location_at(t)` once per tick,
//! with `t` non-decreasing. Models are built once per group as prototypes
//! and replicated for each host of the group.

use std::fmt::Debug;

use dtnsim_core::{ConfigError, ConfigResult, Coord, Settings};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Group setting naming the movement model class
pub const MOVEMENT_MODEL_SETTING: &str = "movementModel";
/// Namespace of settings shared by every movement model
pub const MOVEMENT_MODEL_NS: &str = "MovementModel";

pub trait MovementModel: Debug {
    /// Location of the host at time `t`
    fn location_at(&mut self, t: f64) -> Coord;

    /// Current speed, in m/s
    fn speed(&self) -> f64;

    /// Fresh model for another host of the same group
    fn replicate(&self, rng: &mut StdRng) -> Box<dyn MovementModel>;
}

/// Build the prototype model for a group namespace
pub fn movement_from_settings(
    group: &Settings,
    root: &Settings,
) -> ConfigResult<Box<dyn MovementModel>> {
    let class = group.get_or(MOVEMENT_MODEL_SETTING, "StationaryMovement");
    match class.rsplit('.').next().unwrap_or(class) {
        "StationaryMovement" => Ok(Box::new(StationaryMovement::from_settings(group)?)),
        "ScriptedMovement" => Ok(Box::new(ScriptedMovement::from_settings(group)?)),
        "RandomWaypoint" => Ok(Box::new(RandomWaypoint::from_settings(
            group,
            &root.scoped(MOVEMENT_MODEL_NS),
        )?)),
        other => Err(ConfigError::UnknownClass {
            kind: "movement model",
            name: other.to_string(),
        }),
    }
}

fn uniform(rng: &mut StdRng, min: f64, max: f64) -> f64 {
    min + (max - min) * rng.random::<f64>()
}

/// `min,max` pair; a single value means a fixed draw
fn range_setting(s: &Settings, key: &str, default: (f64, f64)) -> ConfigResult<(f64, f64)> {
    if !s.contains(key) {
        return Ok(default);
    }
    let values = s.get_csv_f64(key, None)?;
    match values.as_slice() {
        [v] => Ok((*v, *v)),
        [min, max] if min <= max => Ok((*min, *max)),
        _ => Err(ConfigError::InvalidValue {
            key: s.full_key(key),
            value: s.get(key)?.to_string(),
            reason: "expected min,max".to_string(),
        }),
    }
}

// ============================================================================
// Stationary
// ============================================================================

/// A host that never moves
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StationaryMovement {
    location: Coord,
}

impl StationaryMovement {
    pub fn new(location: Coord) -> Self {
        Self { location }
    }

    pub fn from_settings(s: &Settings) -> ConfigResult<Self> {
        let xy = s.get_csv_f64("nodeLocation", Some(2))?;
        Ok(Self::new(Coord::new(xy[0], xy[1])))
    }
}

impl MovementModel for StationaryMovement {
    fn location_at(&mut self, _t: f64) -> Coord {
        self.location
    }

    fn speed(&self) -> f64 {
        0.0
    }

    fn replicate(&self, _rng: &mut StdRng) -> Box<dyn MovementModel> {
        Box::new(*self)
    }
}

// ============================================================================
// Scripted
// ============================================================================

/// Piecewise-constant positions read from `waypoints = t,x,y,...`
///
/// Before the first waypoint time the host sits at the first waypoint.
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptedMovement {
    waypoints: Vec<(f64, Coord)>,
}

impl ScriptedMovement {
    pub fn new(mut waypoints: Vec<(f64, Coord)>) -> Self {
        waypoints.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self { waypoints }
    }

    pub fn from_settings(s: &Settings) -> ConfigResult<Self> {
        let raw = s.get_csv_f64("waypoints", None)?;
        if raw.is_empty() || raw.len() % 3 != 0 {
            return Err(ConfigError::InvalidValue {
                key: s.full_key("waypoints"),
                value: s.get("waypoints")?.to_string(),
                reason: "expected t,x,y triples".to_string(),
            });
        }
        Ok(Self::new(
            raw.chunks_exact(3)
                .map(|w| (w[0], Coord::new(w[1], w[2])))
                .collect(),
        ))
    }
}

impl MovementModel for ScriptedMovement {
    fn location_at(&mut self, t: f64) -> Coord {
        self.waypoints
            .iter()
            .take_while(|(at, _)| *at <= t)
            .last()
            .or_else(|| self.waypoints.first())
            .map(|(_, c)| *c)
            .unwrap_or_default()
    }

    fn speed(&self) -> f64 {
        0.0
    }

    fn replicate(&self, _rng: &mut StdRng) -> Box<dyn MovementModel> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Random waypoint
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
enum Leg {
    Waiting { until: f64 },
    Moving { from: Coord, to: Coord, start: f64, speed: f64 },
}

/// Straight legs to uniform destinations with uniform pauses between them
#[derive(Debug, Clone)]
pub struct RandomWaypoint {
    world: (f64, f64),
    speed: (f64, f64),
    wait: (f64, f64),
    rng: StdRng,
    location: Coord,
    leg: Leg,
}

impl RandomWaypoint {
    pub fn new(world: (f64, f64), speed: (f64, f64), wait: (f64, f64), seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let location = Coord::new(uniform(&mut rng, 0.0, world.0), uniform(&mut rng, 0.0, world.1));
        Self {
            world,
            speed,
            wait,
            rng,
            location,
            leg: Leg::Waiting { until: 0.0 },
        }
    }

    pub fn from_settings(group: &Settings, shared: &Settings) -> ConfigResult<Self> {
        let size = shared.get_csv_f64("worldSize", Some(2))?;
        let speed = range_setting(group, "speed", (0.5, 1.5))?;
        if speed.0 <= 0.0 {
            return Err(ConfigError::InvalidValue {
                key: group.full_key("speed"),
                value: speed.0.to_string(),
                reason: "speed must be positive".to_string(),
            });
        }
        let wait = range_setting(group, "waitTime", (0.0, 120.0))?;
        Ok(Self::new((size[0], size[1]), speed, wait, 0))
    }

    fn next_leg(&mut self, now: f64) {
        self.leg = match self.leg {
            Leg::Waiting { .. } => {
                let to = Coord::new(
                    uniform(&mut self.rng, 0.0, self.world.0),
                    uniform(&mut self.rng, 0.0, self.world.1),
                );
                let speed = uniform(&mut self.rng, self.speed.0, self.speed.1);
                Leg::Moving { from: self.location, to, start: now, speed }
            }
            Leg::Moving { .. } => Leg::Waiting {
                until: now + uniform(&mut self.rng, self.wait.0, self.wait.1),
            },
        };
    }
}

impl MovementModel for RandomWaypoint {
    fn location_at(&mut self, t: f64) -> Coord {
        loop {
            match self.leg {
                Leg::Waiting { until } if t < until => return self.location,
                Leg::Waiting { until } => self.next_leg(until),
                Leg::Moving { from, to, start, speed } => {
                    let duration = from.distance(&to) / speed;
                    if t < start + duration {
                        self.location = from.lerp(&to, (t - start) / duration);
                        return self.location;
                    }
                    self.location = to;
                    self.next_leg(start + duration);
                }
            }
        }
    }

    fn speed(&self) -> f64 {
        match self.leg {
            Leg::Moving { speed, .. } => speed,
            Leg::Waiting { .. } => 0.0,
        }
    }

    fn replicate(&self, rng: &mut StdRng) -> Box<dyn MovementModel> {
        Box::new(Self::new(self.world, self.speed, self.wait, rng.random()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_is_piecewise_constant() {
        let mut m = ScriptedMovement::new(vec![
            (10.0, Coord::new(5.0, 0.0)),
            (0.0, Coord::new(0.0, 0.0)),
        ]);
        assert_eq!(m.location_at(0.0), Coord::new(0.0, 0.0));
        assert_eq!(m.location_at(9.9), Coord::new(0.0, 0.0));
        assert_eq!(m.location_at(10.0), Coord::new(5.0, 0.0));
        assert_eq!(m.location_at(1e6), Coord::new(5.0, 0.0));
    }

    #[test]
    fn test_scripted_from_settings_needs_triples() {
        let s = Settings::parse("G.waypoints = 0,1,2,5,3").unwrap();
        assert!(ScriptedMovement::from_settings(&s.scoped("G")).is_err());
    }

    #[test]
    fn test_random_waypoint_stays_in_world() {
        let mut m = RandomWaypoint::new((100.0, 50.0), (1.0, 2.0), (0.0, 5.0), 7);
        for t in 0..2000 {
            let c = m.location_at(t as f64);
            assert!((0.0..=100.0).contains(&c.x));
            assert!((0.0..=50.0).contains(&c.y));
        }
    }

    #[test]
    fn test_random_waypoint_speed_bounded() {
        let mut m = RandomWaypoint::new((100.0, 100.0), (1.0, 2.0), (0.0, 0.0), 3);
        let mut last = m.location_at(0.0);
        for t in 1..500 {
            let c = m.location_at(t as f64);
            assert!(last.distance(&c) <= 2.0 + 1e-9);
            last = c;
        }
    }

    #[test]
    fn test_registry_rejects_unknown_class() {
        let s = Settings::parse("Group.movementModel = MapRouteMovement").unwrap();
        let err = movement_from_settings(&s.scoped("Group"), &s).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownClass { .. }));
    }

    #[test]
    fn test_replicas_diverge() {
        let proto = RandomWaypoint::new((1000.0, 1000.0), (1.0, 1.0), (0.0, 0.0), 0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut a = proto.replicate(&mut rng);
        let mut b = proto.replicate(&mut rng);
        assert_ne!(a.location_at(0.0), b.location_at(0.0));
    }
}
