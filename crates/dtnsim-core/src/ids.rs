//! Typed arena handles

use derive_more::Display;
use serde::{Deserialize, Serialize};

/// Address of a host; also its index in every per-host arena
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("h{_0}")]
pub struct HostId(pub u32);

impl HostId {
    /// Arena index of this host
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Address of a network interface
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("if{_0}")]
pub struct InterfaceId(pub u32);

impl InterfaceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle of a connection; connections are never reused
#[derive(
    Debug, Display, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[display("c{_0}")]
pub struct ConnectionId(pub u32);

impl ConnectionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
