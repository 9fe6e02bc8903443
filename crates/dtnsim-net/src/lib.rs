//! # dtnsim Net
//!
//! The connectivity engine: which interfaces can hear each other, and the
//! links formed between them.
//!
//! ## Components
//!
//! - [`ConnectivityGrid`]: uniform-cell spatial index per medium type
//! - [`Connection`]: a bidirectional link carrying at most one transfer,
//!   optionally proxied through two access points
//! - [`NetworkInterface`]: radio parameters plus the link policy variant
//!   (simple broadcast, wired internet, access-point bridge)
//! - [`Network`]: arena of hosts, interfaces and connections; queues
//!   [`LinkChange`]s for the driver to dispatch

pub mod connection;
pub mod grid;
pub mod interface;
pub mod network;

pub use connection::*;
pub use grid::*;
pub use interface::*;
pub use network::*;
