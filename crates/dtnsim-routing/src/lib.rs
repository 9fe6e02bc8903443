//! Message routing for dtnsim
//!
//! Routers implement the [`MessageRouter`] contract. Most of them are built
//! from the [`ActiveRouter`] template, which owns the buffer, admission
//! control, TTL sweeps and in-flight transfer tracking, and delegates the
//! forwarding decision to a [`ForwardingPolicy`]:
//!
//! - [`Epidemic`]: plain flooding
//! - [`EpidemicWithCure`]: flooding with delivery cures
//! - [`GeoPolicy`]: geographic routing towards virtual repositories
//! - [`DecisionPolicy`]: a transport for pluggable [`DecisionEngine`]s
//!   (PRoPHET, spray-and-focus, LABEL, Distributed Bubble Rap); the
//!   publish/subscribe router is one of them, routing topic data to
//!   subscribers
//!
//! Routers of all hosts live in a [`RouterTable`]. The router being updated
//! is taken out of the table for the duration of the call, so it can reach
//! its peers' routers through [`RouterEnv`] without aliasing itself.

pub mod active;
pub mod codes;
pub mod decision;
pub mod engines;
pub mod env;
pub mod epidemic;
pub mod epidemic_cure;
pub mod geo;
pub mod pubsub;
pub mod registry;
pub mod router;

pub use active::*;
pub use codes::*;
pub use decision::*;
pub use engines::*;
pub use env::*;
pub use epidemic::*;
pub use epidemic_cure::*;
pub use geo::*;
pub use pubsub::*;
pub use registry::*;
pub use router::*;
