//! # dtnsim Simulation
//!
//! Drives the simulator layers through time: the [`World`] owns the
//! network, the routers, the event bus and the per-run context, and
//! advances them in fixed ticks.
//!
//! ## Architecture
//!
//! - **World** (`world.rs`): tick loop, link dispatch, scripted control, invariant checks
//! - **Scenario** (`scenario.rs`): builds a world from a settings file
//! - **Movement** (`movement.rs`): stationary, scripted and random-waypoint hosts
//! - **Events** (`events.rs`): message generators and scheduled creations
//! - **Reports** (`reports/`): listeners that write their results after the run
//! - **Scenarios** (`scenarios.rs`): built-in worlds with known outcomes
//!
//! ## Example
//!
//! ```rust,ignore
//! use dtnsim_simulation::*;
//!
//! let mut world = scenarios::two_nodes(5.0, false)?;
//! world.run()?;
//! assert!(world.router(HostId(1)).unwrap().is_delivered("m0"));
//! ```

pub mod events;
pub mod movement;
pub mod reports;
pub mod scenario;
pub mod scenarios;
pub mod world;

pub use events::*;
pub use movement::*;
pub use reports::{Report, ReportContext, SharedReport, report_from_settings};
pub use scenario::*;
pub use world::*;

pub use dtnsim_core::HostId;
