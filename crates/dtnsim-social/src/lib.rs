//! Social sensing for dtnsim
//!
//! Every host running a social decision engine accumulates a
//! [`ContactHistory`] of closed contact intervals. Two families of
//! estimators consume it:
//!
//! - **Community detection** ([`CommunityDetection`]): distributed
//!   algorithms that grow a subjective local community from familiar
//!   contacts (SIMPLE, K-clique, modularity)
//! - **Centrality** ([`Centrality`]): windowed degree estimates of how
//!   well connected a host is, globally or within its community
//!
//! Both are instantiated per host from a prototype built from settings
//! (see [`community_from_settings`] and [`centrality_from_settings`]).

pub mod centrality;
pub mod community;
pub mod history;

pub use centrality::*;
pub use community::*;
pub use history::*;
