//! Per-run simulation context
//!
//! Holds the state that would otherwise be process-wide: the seeded RNG and
//! the address counters. A fresh context is built for every run.

use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::ids::{HostId, InterfaceId};

/// Default seed of the run RNG
pub const DEFAULT_SEED: u64 = 0;

#[derive(Debug, Clone)]
pub struct SimContext {
    pub rng: StdRng,
    seed: u64,
    next_host: u32,
    next_interface: u32,
}

impl SimContext {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed,
            next_host: 0,
            next_interface: 0,
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Next unused host address
    pub fn next_host_address(&mut self) -> HostId {
        let id = HostId(self.next_host);
        self.next_host += 1;
        id
    }

    /// Next unused interface address
    pub fn next_interface_address(&mut self) -> InterfaceId {
        let id = InterfaceId(self.next_interface);
        self.next_interface += 1;
        id
    }

    /// Restart counters and RNG for a new run
    pub fn reset(&mut self) {
        *self = Self::new(self.seed);
    }
}

impl Default for SimContext {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn test_addresses_are_monotonic() {
        let mut ctx = SimContext::default();
        assert_eq!(ctx.next_host_address(), HostId(0));
        assert_eq!(ctx.next_host_address(), HostId(1));
        assert_eq!(ctx.next_interface_address(), InterfaceId(0));
    }

    #[test]
    fn test_reset_replays_rng() {
        let mut ctx = SimContext::new(42);
        let first: f64 = ctx.rng.random();
        ctx.next_host_address();
        ctx.reset();
        let again: f64 = ctx.rng.random();
        assert_eq!(first, again);
        assert_eq!(ctx.next_host_address(), HostId(0));
    }
}
