//! Centrality estimators
//!
//! Windowed estimators recompute at most once per `computeInterval`
//! seconds of integer simulation time and return the cached value in
//! between. A fresh replica computes on its first query.

mod avg_degree;
mod cwindow;
mod degree;
mod swindow;

pub use avg_degree::AvgDegreeCentrality;
pub use cwindow::CWindowCentrality;
pub use degree::DegreeCentrality;
pub use swindow::SWindowCentrality;

use std::cell::Cell;
use std::collections::BTreeSet;
use std::fmt::Debug;

use dtnsim_core::{ConfigError, ConfigResult, HostId, Settings};

use crate::community::CommunityDetection;
use crate::history::{ContactHistory, ContactInterval};

pub const WINDOW_SETTING: &str = "timeWindow";
pub const COMPUTE_INTERVAL_SETTING: &str = "computeInterval";
pub const EPOCH_COUNT_SETTING: &str = "nrOfEpochsToAvg";

pub const DEFAULT_WINDOW: f64 = 21_600.0;
pub const DEFAULT_COMPUTE_INTERVAL: f64 = 600.0;
pub const DEFAULT_EPOCH_COUNT: u64 = 5;

pub trait Centrality: Debug {
    /// Centrality over every peer in `history`
    fn global(&self, history: &ContactHistory, now: f64) -> f64;

    /// Centrality restricted to members of `community`
    fn local(&self, history: &ContactHistory, community: &dyn CommunityDetection, now: f64) -> f64;

    /// Fresh per-host instance with an empty cache
    fn replicate(&self) -> Box<dyn Centrality>;
}

/// Last computed global and local values
#[derive(Debug, Clone)]
pub struct CentralityCache {
    interval: f64,
    global_at: Cell<f64>,
    global: Cell<f64>,
    local_at: Cell<f64>,
    local: Cell<f64>,
}

impl CentralityCache {
    pub fn new(interval: f64) -> Self {
        Self {
            interval,
            global_at: Cell::new(-interval),
            global: Cell::new(0.0),
            local_at: Cell::new(-interval),
            local: Cell::new(0.0),
        }
    }

    pub fn interval(&self) -> f64 {
        self.interval
    }

    fn cached(at: &Cell<f64>, value: &Cell<f64>, interval: f64, now: f64, compute: impl FnOnce(f64) -> f64) -> f64 {
        let now = now.floor();
        if now - at.get() < interval {
            return value.get();
        }
        let fresh = compute(now);
        at.set(now);
        value.set(fresh);
        fresh
    }

    pub fn global(&self, now: f64, compute: impl FnOnce(f64) -> f64) -> f64 {
        Self::cached(&self.global_at, &self.global, self.interval, now, compute)
    }

    pub fn local(&self, now: f64, compute: impl FnOnce(f64) -> f64) -> f64 {
        Self::cached(&self.local_at, &self.local, self.interval, now, compute)
    }
}

/// Unique peers per epoch of `window` seconds, for the newest `epochs`
/// epochs before `now`
pub(crate) fn epoch_degrees<'a>(
    contacts: impl Iterator<Item = (HostId, &'a [ContactInterval])>,
    now: f64,
    window: f64,
    epochs: usize,
) -> Vec<usize> {
    let mut counted: Vec<BTreeSet<HostId>> = vec![BTreeSet::new(); epochs];
    if window <= 0.0 {
        return vec![0; epochs];
    }
    for (peer, intervals) in contacts {
        for d in intervals {
            let passed = (now - d.end).floor();
            if passed < 0.0 || passed > window * epochs as f64 {
                continue;
            }
            let epoch = (passed / window) as usize;
            if epoch < epochs {
                counted[epoch].insert(peer);
            }
        }
    }
    counted.iter().map(BTreeSet::len).collect()
}

pub(crate) fn average(degrees: &[usize]) -> f64 {
    if degrees.is_empty() {
        return 0.0;
    }
    degrees.iter().sum::<usize>() as f64 / degrees.len() as f64
}

/// Build the prototype named by `class` from the engine's settings
pub fn centrality_from_settings(class: &str, settings: &Settings) -> ConfigResult<Box<dyn Centrality>> {
    let window = settings.get_non_negative_or(WINDOW_SETTING, DEFAULT_WINDOW)?;
    let interval = settings.get_non_negative_or(COMPUTE_INTERVAL_SETTING, DEFAULT_COMPUTE_INTERVAL)?;
    let prototype: Box<dyn Centrality> = match class.rsplit('.').next().unwrap_or(class) {
        "DegreeCentrality" => Box::new(DegreeCentrality),
        "SWindowCentrality" => Box::new(SWindowCentrality::new(window, interval)),
        "CWindowCentrality" => {
            let epochs = settings.get_u64_or(EPOCH_COUNT_SETTING, DEFAULT_EPOCH_COUNT)?;
            Box::new(CWindowCentrality::new(window, interval, epochs as usize))
        }
        "AvgDegreeCentrality" => Box::new(AvgDegreeCentrality::new(window, interval)),
        other => {
            return Err(ConfigError::UnknownClass {
                kind: "centrality",
                name: other.to_string(),
            });
        }
    };
    Ok(prototype)
}
