//! # dtnsim Core
//!
//! Entities shared by every layer of the dtnsim delay-tolerant network
//! simulator.
//!
//! ## Key Types
//!
//! - [`HostId`], [`InterfaceId`], [`ConnectionId`]: typed arena handles
//! - [`Coord`]: 2-D location with euclidean distance
//! - [`SimClock`]: virtual time advanced by the driver
//! - [`Settings`]: hierarchical, namespace-scoped configuration
//! - [`Message`]: the store-carry-forward unit with hop list and properties
//! - [`EventBus`]: connection and message listener fan-out plus event log
//! - [`ModuleCommBus`]: per-host mailbox for runtime interface tuning
//! - [`Activeness`]: per-interface on/off models
//! - [`SimContext`]: per-run RNG and counters

pub mod activeness;
pub mod clock;
pub mod comm_bus;
pub mod context;
pub mod coord;
pub mod error;
pub mod events;
pub mod ids;
pub mod message;
pub mod settings;

pub use activeness::*;
pub use clock::*;
pub use comm_bus::*;
pub use context::*;
pub use coord::*;
pub use error::*;
pub use events::*;
pub use ids::*;
pub use message::*;
pub use settings::*;
