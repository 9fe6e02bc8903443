//! The world driver
//!
//! Owns every piece of run state and advances it in fixed ticks. Per tick:
//!
//! 1. release due external events (message creations)
//! 2. move every host to its model's location for the tick
//! 3. for each host in address order: apply comm-bus updates and update its
//!    interfaces, dispatch the resulting link changes, run its router
//!
//! Link changes go to listeners first, then to both routers. The
//! connection's `from` side runs the state exchange of decision engines.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use dtnsim_core::{
    ConnectionId, EventBus, HostId, InterfaceId, Message, SimClock, SimContext, SimError, SimResult,
};
use dtnsim_net::{InterfaceConfig, LinkChange, LinkPolicy, Network};
use dtnsim_routing::{
    ContactTracker, DecisionEngine, DecisionEngineRouter, DistributedBubbleRap, EpidemicRouter,
    EpidemicWithCureRouter, GeoRouter, LabelDecisionEngine, LinkState, MessageRouter, Publication,
    RouterCore, RouterEnv, RouterTable,
};
use tracing::{debug, info, info_span};

use crate::events::{EventSource, MessageCreation, ScheduledEvents};
use crate::movement::MovementModel;
use crate::reports::{Report, ReportContext, SharedReport};

/// Run-wide parameters of a [`World`]
#[derive(Debug, Clone, PartialEq)]
pub struct WorldConfig {
    pub name: String,
    /// Last simulated time, inclusive
    pub end_time: f64,
    /// Tick length in seconds
    pub update_interval: f64,
    /// Keep every event in memory, see [`EventBus::log`]
    pub keep_event_log: bool,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "default_scenario".to_string(),
            end_time: 43200.0,
            update_interval: 1.0,
            keep_event_log: false,
        }
    }
}

/// A finished report, ready to be written
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedReport {
    pub name: &'static str,
    pub extension: &'static str,
    pub text: String,
}

pub struct World {
    config: WorldConfig,
    clock: SimClock,
    ctx: SimContext,
    network: Network,
    routers: RouterTable,
    events: EventBus,
    movement: Vec<Box<dyn MovementModel>>,
    sources: Vec<Box<dyn EventSource>>,
    scheduled: ScheduledEvents,
    reports: Vec<SharedReport>,
}

impl World {
    pub fn new(config: WorldConfig, network: Network, ctx: SimContext) -> Self {
        let events = if config.keep_event_log {
            EventBus::with_log()
        } else {
            EventBus::new()
        };
        Self {
            config,
            clock: SimClock::new(),
            ctx,
            network,
            routers: RouterTable::new(),
            events,
            movement: Vec::new(),
            sources: Vec::new(),
            scheduled: ScheduledEvents::new(),
            reports: Vec::new(),
        }
    }

    // ========================================================================
    // Construction
    // ========================================================================

    /// Add a host with the next free address
    ///
    /// The movement model places the host at its time-zero location; the
    /// router is replicated from `router`.
    pub fn add_host(
        &mut self,
        name: impl Into<String>,
        group: impl Into<String>,
        mut movement: Box<dyn MovementModel>,
        interfaces: &[InterfaceConfig],
        router: &dyn MessageRouter,
    ) -> SimResult<HostId> {
        let id = self.ctx.next_host_address();
        let location = movement.location_at(self.clock.time());
        self.network.add_host(id, name, group, location)?;
        self.network.set_location(id, location, movement.speed());
        for config in interfaces {
            let iface = self.ctx.next_interface_address();
            self.network.add_interface(id, iface, config, &mut self.ctx.rng)?;
        }
        self.routers.insert(id, router.replicate(id, &mut self.ctx.rng));
        self.movement.push(movement);
        Ok(id)
    }

    pub fn add_event_source(&mut self, source: Box<dyn EventSource>) {
        self.sources.push(source);
    }

    /// Subscribe a report to the event bus and keep it for [`World::finish`]
    pub fn add_shared_report(&mut self, report: SharedReport) {
        self.events.add_connection_listener(Box::new(Rc::clone(&report)));
        self.events.add_message_listener(Box::new(Rc::clone(&report)));
        self.reports.push(report);
    }

    /// Typed variant of [`World::add_shared_report`]; the handle stays
    /// readable while the world runs
    pub fn add_report<R: Report + 'static>(&mut self, report: R) -> Rc<RefCell<R>> {
        let handle = Rc::new(RefCell::new(report));
        self.add_shared_report(handle.clone());
        handle
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn now(&self) -> f64 {
        self.clock.time()
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn routers(&self) -> &RouterTable {
        &self.routers
    }

    pub fn router(&self, host: HostId) -> Option<&dyn MessageRouter> {
        self.routers.get(host)
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn host_count(&self) -> usize {
        self.network.host_count()
    }

    /// Host address by name
    pub fn host_named(&self, name: &str) -> Option<HostId> {
        self.network.hosts().iter().find(|h| h.name() == name).map(|h| h.id())
    }

    pub fn context(&self) -> &SimContext {
        &self.ctx
    }

    // ========================================================================
    // Scripted control
    // ========================================================================

    /// Create a message at `from` now; false when its router rejects it
    pub fn create_message(
        &mut self,
        from: HostId,
        to: HostId,
        id: &str,
        size: u64,
        response_size: u64,
    ) -> SimResult<bool> {
        let now = self.clock.time();
        let mut m = Message::new(from, to, id, size, now);
        if response_size > 0 {
            m.set_response_size(response_size);
        }
        self.with_router(from, |router, env| router.create_new_message(m, &mut env.peer_env()))
    }

    /// Queue a message creation for a later tick
    pub fn schedule_message(&mut self, time: f64, from: HostId, to: HostId, id: &str, size: u64) {
        self.scheduled.push(MessageCreation {
            time,
            from,
            to,
            id: id.to_string(),
            size,
            response_size: 0,
            publication: None,
        });
    }

    /// Hand a pub/sub message to the router of `host` now
    ///
    /// Subscribe and unsubscribe messages only change the host's
    /// subscriptions and are reported as not created.
    pub fn create_publication(
        &mut self,
        host: HostId,
        publication: &Publication,
        id: &str,
        size: u64,
    ) -> SimResult<bool> {
        let m = publication.message(host, id, size, self.clock.time());
        self.with_router(host, |router, env| router.create_new_message(m, &mut env.peer_env()))
    }

    /// Queue a pub/sub message for a later tick
    pub fn schedule_publication(
        &mut self,
        time: f64,
        host: HostId,
        publication: Publication,
        id: &str,
        size: u64,
    ) {
        self.scheduled.push(MessageCreation {
            time,
            from: host,
            to: host,
            id: id.to_string(),
            size,
            response_size: 0,
            publication: Some(publication),
        });
    }

    /// Link the first interfaces of `a` and `b` that share a medium,
    /// skipping range and activeness checks
    pub fn connect_hosts(&mut self, a: HostId, b: HostId) -> SimResult<()> {
        let (ia, ib) = self
            .matching_interfaces(a, b)
            .ok_or_else(|| SimError::Invariant(format!("{a} and {b} share no medium")))?;
        let now = self.clock.time();
        self.network.create_connection(ia, ib, now, &mut self.ctx.rng);
        self.dispatch_link_changes(now)
    }

    /// Tear down every link between `a` and `b`
    pub fn disconnect_hosts(&mut self, a: HostId, b: HostId) -> SimResult<()> {
        let ifaces = self
            .network
            .host(a)
            .ok_or(SimError::UnknownHost(a))?
            .interfaces()
            .to_vec();
        for iface in ifaces {
            self.network.destroy_connection(iface, b);
        }
        self.dispatch_link_changes(self.clock.time())
    }

    fn matching_interfaces(
        &self,
        a: HostId,
        b: HostId,
    ) -> Option<(InterfaceId, InterfaceId)> {
        let (ha, hb) = (self.network.host(a)?, self.network.host(b)?);
        for &ia in ha.interfaces() {
            let medium = self.network.interface(ia)?.medium();
            for &ib in hb.interfaces() {
                if self.network.interface(ib)?.medium() == medium {
                    return Some((ia, ib));
                }
            }
        }
        None
    }

    // ========================================================================
    // Stepping
    // ========================================================================

    /// Advance the world by one tick
    pub fn step(&mut self) -> SimResult<()> {
        let now = self.clock.time();
        let _span = info_span!("tick", t = now).entered();

        // 1. External events
        self.create_due_messages(now)?;

        // 2. Movement
        for (i, model) in self.movement.iter_mut().enumerate() {
            let location = model.location_at(now);
            self.network.set_location(HostId(i as u32), location, model.speed());
        }

        // 3. Interfaces, link dispatch, routers
        for i in 0..self.network.host_count() {
            let host = HostId(i as u32);
            self.network.update_host(host, now, &mut self.ctx.rng);
            self.dispatch_link_changes(now)?;
            self.with_router(host, |router, env| router.update(env))??;
        }

        self.clock.advance(self.config.update_interval);
        Ok(())
    }

    /// Step until the clock passes the configured end time
    pub fn run(&mut self) -> SimResult<()> {
        self.run_until(self.config.end_time)
    }

    /// Step until the clock passes `end`
    pub fn run_until(&mut self, end: f64) -> SimResult<()> {
        info!(
            scenario = %self.config.name,
            hosts = self.network.host_count(),
            from = self.clock.time(),
            end,
            "Running simulation"
        );
        while self.clock.time() <= end {
            self.step()?;
        }
        info!(scenario = %self.config.name, t = self.clock.time(), "Simulation finished");
        Ok(())
    }

    fn create_due_messages(&mut self, now: f64) -> SimResult<()> {
        let mut due = self.scheduled.due(now);
        for source in &mut self.sources {
            due.extend(source.due(now));
        }
        for c in due {
            if self.routers.get(c.from).is_none() {
                return Err(SimError::UnknownHost(c.from));
            }
            let created = match &c.publication {
                Some(p) => self.create_publication(c.from, p, &c.id, c.size)?,
                None => self.create_message(c.from, c.to, &c.id, c.size, c.response_size)?,
            };
            debug!(id = %c.id, from = %c.from, to = %c.to, size = c.size, created, "Message event");
        }
        Ok(())
    }

    fn dispatch_link_changes(&mut self, now: f64) -> SimResult<()> {
        for change in self.network.drain_changes() {
            match change {
                LinkChange::Up { conn, from, to } => {
                    self.events.hosts_connected(from, to, now);
                    self.notify(from, conn, LinkState::Up { exchange: true })?;
                    self.notify(to, conn, LinkState::Up { exchange: false })?;
                }
                LinkChange::Down { conn, from, to } => {
                    self.events.hosts_disconnected(from, to, now);
                    self.notify(from, conn, LinkState::Down)?;
                    self.notify(to, conn, LinkState::Down)?;
                }
            }
        }
        Ok(())
    }

    fn notify(&mut self, host: HostId, conn: ConnectionId, state: LinkState) -> SimResult<()> {
        self.with_router(host, |router, env| router.changed_connection(conn, state, env))
    }

    /// Run `f` on the router of `host` while it is out of the table
    fn with_router<T>(
        &mut self,
        host: HostId,
        f: impl FnOnce(&mut dyn MessageRouter, &mut RouterEnv) -> T,
    ) -> SimResult<T> {
        let mut router = self
            .routers
            .take(host)
            .ok_or(SimError::RouterUnavailable(host))?;
        let mut env = RouterEnv {
            now: self.clock.time(),
            network: &mut self.network,
            routers: &mut self.routers,
            events: &mut self.events,
            rng: &mut self.ctx.rng,
        };
        let out = f(router.as_mut(), &mut env);
        self.routers.restore(router);
        Ok(out)
    }

    // ========================================================================
    // Reports
    // ========================================================================

    /// Render every report at the current time
    pub fn render_reports(&self) -> Vec<RenderedReport> {
        let ctx = ReportContext {
            scenario: &self.config.name,
            now: self.clock.time(),
            network: &self.network,
            routers: &self.routers,
        };
        self.reports
            .iter()
            .map(|r| {
                let mut report = r.borrow_mut();
                RenderedReport {
                    name: report.name(),
                    extension: report.extension(),
                    text: report.done(&ctx),
                }
            })
            .collect()
    }

    /// Write every report to `dir` as `<scenario>_<report>.<ext>`
    pub fn finish(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        fs::create_dir_all(dir)?;
        let mut written = Vec::new();
        for report in self.render_reports() {
            let path = dir.join(format!(
                "{}_{}.{}",
                self.config.name, report.name, report.extension
            ));
            fs::write(&path, report.text)?;
            info!(path = %path.display(), "Report written");
            written.push(path);
        }
        Ok(written)
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    /// Check the state invariants that must hold between ticks
    ///
    /// Covers link symmetry, range of scanned links, buffer limits, hop
    /// lists of buffered messages, contact histories and community
    /// containment.
    pub fn check_invariants(&self) -> SimResult<()> {
        self.check_links()?;
        for router in self.routers.iter() {
            check_router(router)?;
            if let Some(tracker) = router.decision_engine().and_then(tracker_of) {
                check_tracker(router.host(), tracker)?;
            }
        }
        Ok(())
    }

    fn check_links(&self) -> SimResult<()> {
        for iface in self.network.interfaces() {
            for &c in iface.connections() {
                let conn = self
                    .network
                    .connection(c)
                    .ok_or(SimError::UnknownConnection(c))?;
                if !conn.is_up() {
                    return Err(SimError::Invariant(format!("{} lists down link {c}", iface.id())));
                }
                let other = conn.endpoint_interface(iface.id());
                let mirrored = self
                    .network
                    .interface(other)
                    .is_some_and(|o| o.connections().contains(&c));
                if !mirrored {
                    return Err(SimError::Invariant(format!("{c} missing at {other}")));
                }
                let scanned = conn.proxy().is_none()
                    && matches!(iface.policy(), LinkPolicy::SimpleBroadcast)
                    && self
                        .network
                        .interface(other)
                        .is_some_and(|o| matches!(o.policy(), LinkPolicy::SimpleBroadcast));
                if scanned && !self.network.within_range(iface.id(), other) {
                    return Err(SimError::Invariant(format!("{c} is out of range")));
                }
            }
        }
        Ok(())
    }
}

fn router_core(router: &dyn MessageRouter) -> Option<&RouterCore> {
    let any = router.as_any();
    any.downcast_ref::<EpidemicRouter>()
        .map(|r| r.core())
        .or_else(|| any.downcast_ref::<EpidemicWithCureRouter>().map(|r| r.core()))
        .or_else(|| any.downcast_ref::<DecisionEngineRouter>().map(|r| r.core()))
        .or_else(|| any.downcast_ref::<GeoRouter>().map(|r| r.core()))
}

fn tracker_of(engine: &dyn DecisionEngine) -> Option<&ContactTracker> {
    let any = engine.as_any();
    any.downcast_ref::<LabelDecisionEngine>()
        .map(|e| e.tracker())
        .or_else(|| any.downcast_ref::<DistributedBubbleRap>().map(|e| e.tracker()))
}

fn check_router(router: &dyn MessageRouter) -> SimResult<()> {
    let host = router.host();
    if let Some(core) = router_core(router) {
        if let Some(limit) = core.settings().buffer_size {
            if core.occupancy() > limit {
                return Err(SimError::Invariant(format!(
                    "{host} holds {} of {limit} bytes",
                    core.occupancy()
                )));
            }
        }
    }
    for m in router.messages() {
        let hops = m.hops();
        if hops.first() != Some(&m.from()) || hops.last() != Some(&host) {
            return Err(SimError::Invariant(format!(
                "{} at {host} has hops {hops:?}",
                m.id()
            )));
        }
    }
    Ok(())
}

fn check_tracker(host: HostId, tracker: &ContactTracker) -> SimResult<()> {
    for (peer, intervals) in tracker.history().iter() {
        let ordered = intervals.windows(2).all(|w| w[0].end <= w[1].start);
        if !ordered || intervals.iter().any(|i| i.duration() <= 0.0) {
            return Err(SimError::Invariant(format!(
                "{host} has bad contact history with {peer}"
            )));
        }
    }
    let cd = tracker.community();
    let community = cd.local_community();
    if !community.contains(&host) || !cd.familiar_set().is_subset(community) {
        return Err(SimError::Invariant(format!(
            "{host} community {community:?} misses itself or a familiar peer"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::movement::StationaryMovement;
    use crate::reports::MessageStatsReport;
    use dtnsim_core::Coord;
    use dtnsim_routing::{ActiveRouter, EpidemicWithCure, RouterSettings};

    fn world() -> World {
        let config = WorldConfig {
            name: "t".to_string(),
            end_time: 20.0,
            keep_event_log: true,
            ..WorldConfig::default()
        };
        World::new(config, Network::new(), SimContext::default())
    }

    fn place(world: &mut World, x: f64) -> HostId {
        let proto = ActiveRouter::new(HostId(0), RouterSettings::default(), EpidemicWithCure::new());
        let radio = InterfaceConfig::simple_broadcast("bt", 10.0, 100);
        world
            .add_host(
                format!("n{x}"),
                "n",
                Box::new(StationaryMovement::new(Coord::new(x, 0.0))),
                &[radio],
                &proto,
            )
            .unwrap()
    }

    #[test]
    fn test_hosts_get_sequential_addresses() {
        let mut w = world();
        assert_eq!(place(&mut w, 0.0), HostId(0));
        assert_eq!(place(&mut w, 5.0), HostId(1));
        assert_eq!(w.host_named("n5"), Some(HostId(1)));
        assert_eq!(w.router(HostId(1)).unwrap().host(), HostId(1));
    }

    #[test]
    fn test_scheduled_message_is_delivered() {
        let mut w = world();
        let a = place(&mut w, 0.0);
        let b = place(&mut w, 5.0);
        let stats = w.add_report(MessageStatsReport::new(0.0));
        w.schedule_message(2.0, a, b, "m", 200);
        w.run().unwrap();
        w.check_invariants().unwrap();

        assert_eq!(stats.borrow().stats().created, 1);
        assert_eq!(stats.borrow().stats().delivered, 1);
        assert!(w.now() > 20.0);
        assert_eq!(w.render_reports().len(), 1);
    }

    #[test]
    fn test_scripted_links() {
        let mut w = world();
        let a = place(&mut w, 0.0);
        let b = place(&mut w, 500.0);
        w.connect_hosts(a, b).unwrap();
        assert!(w.network().connection_between(a, b).is_some());
        w.disconnect_hosts(a, b).unwrap();
        assert!(w.network().connection_between(a, b).is_none());
        let kinds: Vec<_> = w
            .events()
            .log()
            .iter()
            .map(|e| matches!(e, dtnsim_core::SimEvent::HostsConnected { .. }))
            .collect();
        assert_eq!(kinds, vec![true, false]);
    }

    #[test]
    fn test_unknown_sender_aborts_run() {
        let mut w = world();
        place(&mut w, 0.0);
        w.schedule_message(0.0, HostId(7), HostId(0), "m", 10);
        assert!(matches!(w.step(), Err(SimError::UnknownHost(_))));
    }
}
