//! Construction of routers and decision engines by class name
//!
//! Group settings name a router class (`Group.router = DecisionEngineRouter`).
//! Only the last `.`-separated segment of a class name is significant, so
//! fully-qualified names from older configuration files still resolve.
//! Routers are built once per group as prototypes bound to `HostId(0)`; the
//! world replicates them for every host of the group.
//!
//! The publish/subscribe router resolves its engine separately:
//! `ProphetDecisionEngine` under `PubSubRouter` names the topic-keyed
//! variant.

use dtnsim_core::{ConfigError, ConfigResult, HostId, Settings};
use tracing::debug;

use crate::active::{ActiveRouter, RouterSettings};
use crate::decision::{DecisionEngine, DecisionPolicy};
use crate::engines::{
    DistributedBubbleRap, LabelDecisionEngine, ProphetConfig, ProphetDecisionEngine,
    PubSubProphetDecisionEngine, SprayAndFocusDecisionEngine,
};
use crate::epidemic::Epidemic;
use crate::epidemic_cure::EpidemicWithCure;
use crate::geo::{GEO_NS, GeoConfig, GeoPolicy};
use crate::pubsub::PUBSUB_ROUTER;
use crate::router::MessageRouter;

/// Namespace holding the engine class of decision-engine routers
pub const DECISION_ENGINE_NS: &str = "DecisionEngineRouter";
pub const DECISION_ENGINE_SETTING: &str = "decisionEngine";
/// Router name under which spray-and-focus is exposed directly
pub const SPRAY_AND_FOCUS_ROUTER: &str = "SprayAndFocusRouter";

/// Router classes understood by [`router_from_settings`]
pub const ROUTER_CLASSES: &[&str] = &[
    "EpidemicRouter",
    "EpidemicWithCureRouter",
    "GeoRouter",
    "DecisionEngineRouter",
    SPRAY_AND_FOCUS_ROUTER,
    PUBSUB_ROUTER,
];

/// Engine classes understood by [`engine_from_settings`]
pub const ENGINE_CLASSES: &[&str] = &[
    "ProphetDecisionEngine",
    "SprayAndFocusDecisionEngine",
    "SnFDecisionEngine",
    "LABELDecisionEngine",
    "DistributedBubbleRap",
    "PubSubProphetDecisionEngine",
];

fn short_name(class: &str) -> &str {
    class.rsplit('.').next().unwrap_or(class)
}

/// Build the router prototype of a host group
///
/// `group` is the group's scoped view (buffer and queue keys), `root` the
/// unscoped table used to reach router and engine namespaces.
pub fn router_from_settings(
    class: &str,
    group: &Settings,
    root: &Settings,
) -> ConfigResult<Box<dyn MessageRouter>> {
    let settings = RouterSettings::from_settings(group)?;
    let host = HostId(0);
    let name = short_name(class);
    let router: Box<dyn MessageRouter> = match name {
        "EpidemicRouter" => Box::new(ActiveRouter::new(host, settings, Epidemic::new())),
        "EpidemicWithCureRouter" => {
            Box::new(ActiveRouter::new(host, settings, EpidemicWithCure::new()))
        }
        "GeoRouter" => {
            let config = GeoConfig::from_settings(&root.scoped(GEO_NS))?;
            Box::new(ActiveRouter::new(host, settings, GeoPolicy::new(host, config)))
        }
        "DecisionEngineRouter" => {
            let ns = root.scoped(DECISION_ENGINE_NS);
            let engine_class = ns.get(DECISION_ENGINE_SETTING)?;
            let engine = engine_from_settings(engine_class, root)?;
            Box::new(ActiveRouter::new(host, settings, DecisionPolicy::new(engine)))
        }
        SPRAY_AND_FOCUS_ROUTER => {
            let engine = SprayAndFocusDecisionEngine::from_settings(&root.scoped(SPRAY_AND_FOCUS_ROUTER))?;
            let policy = DecisionPolicy::named(SPRAY_AND_FOCUS_ROUTER, Box::new(engine));
            Box::new(ActiveRouter::new(host, settings, policy))
        }
        PUBSUB_ROUTER => {
            let ns = root.scoped(PUBSUB_ROUTER);
            let engine_class = ns.get(DECISION_ENGINE_SETTING)?;
            let engine = pubsub_engine_from_settings(engine_class, root)?;
            let policy = DecisionPolicy::named(PUBSUB_ROUTER, engine).without_cures();
            Box::new(ActiveRouter::new(host, settings, policy))
        }
        other => {
            return Err(ConfigError::UnknownClass {
                kind: "router",
                name: other.to_string(),
            });
        }
    };
    debug!(class = name, "Built router prototype");
    Ok(router)
}

/// Build a decision-engine prototype; parameters live in the engine's namespace
pub fn engine_from_settings(class: &str, root: &Settings) -> ConfigResult<Box<dyn DecisionEngine>> {
    let name = short_name(class);
    let s = root.scoped(name);
    let engine: Box<dyn DecisionEngine> = match name {
        "ProphetDecisionEngine" => Box::new(ProphetDecisionEngine::new(
            HostId(0),
            ProphetConfig::from_settings(&s)?,
        )),
        "SprayAndFocusDecisionEngine" | "SnFDecisionEngine" => {
            Box::new(SprayAndFocusDecisionEngine::from_settings(&s)?)
        }
        "LABELDecisionEngine" => Box::new(LabelDecisionEngine::from_settings(&s)?),
        "DistributedBubbleRap" => Box::new(DistributedBubbleRap::from_settings(&s)?),
        "PubSubProphetDecisionEngine" => {
            Box::new(PubSubProphetDecisionEngine::from_settings(HostId(0), &s)?)
        }
        other => {
            return Err(ConfigError::UnknownClass {
                kind: "decision engine",
                name: other.to_string(),
            });
        }
    };
    Ok(engine)
}

/// Engines understood by the publish/subscribe router
pub fn pubsub_engine_from_settings(class: &str, root: &Settings) -> ConfigResult<Box<dyn DecisionEngine>> {
    let name = short_name(class);
    match name {
        "ProphetDecisionEngine" | "PubSubProphetDecisionEngine" => Ok(Box::new(
            PubSubProphetDecisionEngine::from_settings(HostId(0), &root.scoped(name))?,
        )),
        other => Err(ConfigError::UnknownClass {
            kind: "publish/subscribe engine",
            name: other.to_string(),
        }),
    }
}
