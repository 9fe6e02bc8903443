//! External events: message creation
//!
//! Generators are polled by the world at the start of every tick and hand
//! back the creations due by then, in time order.

use std::collections::VecDeque;

use dtnsim_core::{ConfigError, ConfigResult, HostId, Settings};
use dtnsim_routing::Publication;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Root setting with the number of event generators
pub const NROF_EVENTS_SETTING: &str = "Events.nrof";

/// A message to be created at `time`
#[derive(Debug, Clone, PartialEq)]
pub struct MessageCreation {
    pub time: f64,
    pub from: HostId,
    pub to: HostId,
    pub id: String,
    pub size: u64,
    pub response_size: u64,
    /// Pub/sub annotation; `to` is ignored when present
    pub publication: Option<Publication>,
}

/// Source of message creations polled once per tick
pub trait EventSource: std::fmt::Debug {
    /// Creations due at or before `now`
    fn due(&mut self, now: f64) -> Vec<MessageCreation>;

    /// Time of the next pending creation, if any
    fn next_time(&self) -> Option<f64>;
}

/// Build event generator `Events{index}`
pub fn event_source_from_settings(
    root: &Settings,
    index: usize,
    rng: &mut StdRng,
) -> ConfigResult<Box<dyn EventSource>> {
    let s = root.scoped(format!("Events{index}"));
    let class = s.get("class")?;
    match class.rsplit('.').next().unwrap_or(class) {
        "MessageEventGenerator" => Ok(Box::new(MessageEventGenerator::from_settings(&s, rng.random())?)),
        other => Err(ConfigError::UnknownClass {
            kind: "event generator",
            name: other.to_string(),
        }),
    }
}

// ============================================================================
// Generator
// ============================================================================

/// Parameters of a [`MessageEventGenerator`]
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    /// Seconds between creations, drawn from `[min, max]`
    pub interval: (f64, f64),
    /// Bytes, drawn from `[min, max]`
    pub size: (u64, u64),
    /// Source addresses `[min, max)`
    pub hosts: (u32, u32),
    /// Destination addresses `[min, max)`; defaults to `hosts`
    pub to_hosts: Option<(u32, u32)>,
    pub prefix: String,
    /// Active window `[start, end]`
    pub time: Option<(f64, f64)>,
    pub response_size: u64,
}

/// Random message traffic between address ranges
#[derive(Debug, Clone)]
pub struct MessageEventGenerator {
    config: GeneratorConfig,
    rng: StdRng,
    next: f64,
    counter: u64,
}

impl MessageEventGenerator {
    pub fn new(config: GeneratorConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let start = config.time.map_or(0.0, |(s, _)| s);
        let next = start + draw_f64(&mut rng, config.interval);
        Self {
            config,
            rng,
            next,
            counter: 0,
        }
    }

    pub fn from_settings(s: &Settings, seed: u64) -> ConfigResult<Self> {
        let interval = pair_f64(s, "interval")?;
        let size = pair_f64(s, "size")?;
        let hosts = host_range(s, "hosts")?;
        let to_hosts = if s.contains("tohosts") {
            Some(host_range(s, "tohosts")?)
        } else {
            None
        };
        let time = if s.contains("time") {
            Some(pair_f64(s, "time")?)
        } else {
            None
        };
        if hosts.1 - hosts.0 < 2 && to_hosts.is_none() {
            return Err(ConfigError::InvalidValue {
                key: s.full_key("hosts"),
                value: s.get("hosts")?.to_string(),
                reason: "need at least two hosts".to_string(),
            });
        }
        let config = GeneratorConfig {
            interval,
            size: (size.0 as u64, size.1 as u64),
            hosts,
            to_hosts,
            prefix: s.get_or("prefix", "M").to_string(),
            time,
            response_size: s.get_u64_or("responseSize", 0)?,
        };
        Ok(Self::new(config, seed))
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    fn pick(&mut self, range: (u32, u32)) -> HostId {
        HostId(self.rng.random_range(range.0..range.1))
    }

    fn next_creation(&mut self) -> Option<MessageCreation> {
        let from = self.pick(self.config.hosts);
        let targets = self.config.to_hosts.unwrap_or(self.config.hosts);
        let mut to = self.pick(targets);
        // redraw a self-addressed message a bounded number of times
        for _ in 0..16 {
            if to != from {
                break;
            }
            to = self.pick(targets);
        }
        if to == from {
            return None;
        }
        self.counter += 1;
        let size = self.rng.random_range(self.config.size.0..=self.config.size.1);
        Some(MessageCreation {
            time: self.next,
            from,
            to,
            id: format!("{}{}", self.config.prefix, self.counter),
            size,
            response_size: self.config.response_size,
            publication: None,
        })
    }
}

impl EventSource for MessageEventGenerator {
    fn due(&mut self, now: f64) -> Vec<MessageCreation> {
        let mut out = Vec::new();
        while self.next_time().is_some_and(|t| t <= now) {
            out.extend(self.next_creation());
            self.next += draw_f64(&mut self.rng, self.config.interval);
        }
        out
    }

    fn next_time(&self) -> Option<f64> {
        match self.config.time {
            Some((_, end)) if self.next > end => None,
            _ => Some(self.next),
        }
    }
}

fn draw_f64(rng: &mut StdRng, (min, max): (f64, f64)) -> f64 {
    min + (max - min) * rng.random::<f64>()
}

fn pair_f64(s: &Settings, key: &str) -> ConfigResult<(f64, f64)> {
    let v = s.get_csv_f64(key, None)?;
    match v.as_slice() {
        [x] if *x >= 0.0 => Ok((*x, *x)),
        [a, b] if *a >= 0.0 && a <= b => Ok((*a, *b)),
        _ => Err(ConfigError::InvalidValue {
            key: s.full_key(key),
            value: s.get(key)?.to_string(),
            reason: "expected non-negative min,max".to_string(),
        }),
    }
}

fn host_range(s: &Settings, key: &str) -> ConfigResult<(u32, u32)> {
    let v = s.get_csv_i64(key, Some(2))?;
    if v[0] < 0 || v[1] <= v[0] {
        return Err(ConfigError::InvalidValue {
            key: s.full_key(key),
            value: s.get(key)?.to_string(),
            reason: "expected an address range min,max with min < max".to_string(),
        });
    }
    Ok((v[0] as u32, v[1] as u32))
}

// ============================================================================
// Scripted queue
// ============================================================================

/// Creations scheduled by hand, released in time order
#[derive(Debug, Clone, Default)]
pub struct ScheduledEvents {
    queue: VecDeque<MessageCreation>,
}

impl ScheduledEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert keeping the queue ordered; equal times keep insertion order
    pub fn push(&mut self, event: MessageCreation) {
        let at = self.queue.partition_point(|e| e.time <= event.time);
        self.queue.insert(at, event);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

impl EventSource for ScheduledEvents {
    fn due(&mut self, now: f64) -> Vec<MessageCreation> {
        let n = self.queue.partition_point(|e| e.time <= now);
        self.queue.drain(..n).collect()
    }

    fn next_time(&self) -> Option<f64> {
        self.queue.front().map(|e| e.time)
    }
}
