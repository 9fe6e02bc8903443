//! End-to-end runs of the built-in scenarios
//!
//! Every world is stepped by hand so the universal invariants can be
//! checked after each tick.

use std::collections::{BTreeMap, BTreeSet};

use dtnsim_core::{HostId, Settings, SimEvent};
use dtnsim_routing::{PubSubProphetDecisionEngine, copies};
use dtnsim_simulation::scenario::Scenario;
use dtnsim_simulation::scenarios;
use dtnsim_simulation::world::World;

fn run_checked(world: &mut World) {
    let end = world.config().end_time;
    while world.now() <= end {
        world.step().unwrap();
        world.check_invariants().unwrap();
    }
}

fn deliveries<'a>(world: &'a World, id: &str) -> Vec<&'a SimEvent> {
    world
        .events()
        .log()
        .iter()
        .filter(|e| {
            matches!(e, SimEvent::MessageTransferred { id: m, first_delivery: true, .. } if m == id)
        })
        .collect()
}

fn holds(world: &World, host: u32, id: &str) -> bool {
    world.router(HostId(host)).unwrap().has_message(id)
}

fn assert_delivered_once(world: &World) {
    let mut seen: BTreeMap<(String, HostId), usize> = BTreeMap::new();
    for e in world.events().log() {
        if let SimEvent::MessageTransferred {
            id,
            to,
            first_delivery: true,
            ..
        } = e
        {
            *seen.entry((id.clone(), *to)).or_default() += 1;
        }
    }
    for (key, n) in seen {
        assert_eq!(n, 1, "{key:?} delivered {n} times");
    }
}

// ============================================================================
// Two nodes
// ============================================================================

#[test]
fn test_two_nodes_epidemic_delivers_and_keeps_copy() {
    let mut world = scenarios::two_nodes(5.0, false).unwrap();
    run_checked(&mut world);

    let log = world.events().log();
    assert!(log.iter().any(|e| matches!(
        e,
        SimEvent::HostsConnected { a, b, time }
            if *time == 0.0 && BTreeSet::from([*a, *b]) == BTreeSet::from([HostId(0), HostId(1)])
    )));

    let delivered = deliveries(&world, "m0");
    assert_eq!(delivered.len(), 1);
    match delivered[0] {
        SimEvent::MessageTransferred { from, to, hops, time, .. } => {
            assert_eq!(*from, HostId(0));
            assert_eq!(*to, HostId(1));
            assert_eq!(hops, &vec![HostId(0), HostId(1)]);
            assert!((5.0..=6.0).contains(time), "delivered at {time}");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert!(holds(&world, 0, "m0"));
    assert!(world.router(HostId(1)).unwrap().is_delivered("m0"));
}

#[test]
fn test_two_nodes_epidemic_keeps_copy_after_repeated_offers() {
    let mut world = scenarios::two_nodes(5.0, false).unwrap();
    world.run_until(7.0).unwrap();
    assert_eq!(deliveries(&world, "m0").len(), 1);

    // A keeps offering m0 to B, which refuses it as already delivered
    for _ in 0..8 {
        world.step().unwrap();
        world.check_invariants().unwrap();
        assert!(holds(&world, 0, "m0"), "A lost m0 at {}", world.now());
    }
    assert!(!world.events().log().iter().any(|e| matches!(
        e,
        SimEvent::MessageDeleted { id, host, .. } if id == "m0" && *host == HostId(0)
    )));
    assert_delivered_once(&world);
}

#[test]
fn test_two_nodes_spray_and_focus_gives_last_copy_away() {
    let mut world = scenarios::two_nodes(5.0, true).unwrap();
    run_checked(&mut world);

    assert_eq!(deliveries(&world, "m0").len(), 1);
    assert!(!holds(&world, 0, "m0"));
}

// ============================================================================
// Out of range
// ============================================================================

#[test]
fn test_out_of_range_never_connects_and_expires() {
    let mut world = scenarios::out_of_range().unwrap();
    run_checked(&mut world);

    let log = world.events().log();
    assert!(!log.iter().any(|e| matches!(e, SimEvent::HostsConnected { .. })));
    assert!(deliveries(&world, "m0").is_empty());

    let deleted: Vec<_> = log
        .iter()
        .filter_map(|e| match e {
            SimEvent::MessageDeleted { id, host, dropped, time } if id == "m0" => {
                Some((*host, *dropped, *time))
            }
            _ => None,
        })
        .collect();
    assert_eq!(deleted.len(), 1);
    let (host, dropped, time) = deleted[0];
    assert_eq!(host, HostId(0));
    assert!(dropped);
    assert!((60.0..61.0).contains(&time), "expired at {time}");
    assert!(!holds(&world, 0, "m0"));
}

// ============================================================================
// Bridge
// ============================================================================

#[test]
fn test_bridge_proxies_mobiles_through_access_points() {
    let mut world = scenarios::bridge().unwrap();
    world.step().unwrap();
    world.check_invariants().unwrap();

    let proxied = world
        .network()
        .connection_between(HostId(0), HostId(3))
        .expect("mobiles linked through the mesh");
    assert!(world.network().connection(proxied).unwrap().is_up());

    run_checked(&mut world);
    let delivered = deliveries(&world, "m0");
    assert_eq!(delivered.len(), 1);
    match delivered[0] {
        SimEvent::MessageTransferred { from, to, hops, .. } => {
            assert_eq!(*from, HostId(0));
            assert_eq!(*to, HostId(3));
            assert_eq!(hops, &vec![HostId(0), HostId(3)]);
        }
        other => panic!("unexpected event {other:?}"),
    }
    // access points relay links, not messages
    assert!(!holds(&world, 1, "m0"));
    assert!(!holds(&world, 2, "m0"));
}

// ============================================================================
// Epidemic cure
// ============================================================================

#[test]
fn test_epidemic_cure_stops_the_flood() {
    let mut world = scenarios::epidemic_cure().unwrap();
    run_checked(&mut world);

    let delivered = deliveries(&world, "m");
    assert_eq!(delivered.len(), 1);
    match delivered[0] {
        SimEvent::MessageTransferred { from, to, hops, time, .. } => {
            assert_eq!(*from, HostId(1));
            assert_eq!(*to, HostId(2));
            assert_eq!(hops, &vec![HostId(0), HostId(1), HostId(2)]);
            assert!((10.0..=11.0).contains(time), "delivered at {time}");
        }
        other => panic!("unexpected event {other:?}"),
    }

    let log = world.events().log();
    let cured = log
        .iter()
        .position(|e| {
            matches!(
                e,
                SimEvent::MessageDeleted { id, host, dropped: false, .. }
                    if id == "m" && *host == HostId(0)
            )
        })
        .expect("A learns the cure");
    assert!((20.0..21.0).contains(&log[cured].time()));
    assert!(!holds(&world, 0, "m"));

    let after: Vec<_> = log[cured + 1..]
        .iter()
        .filter(|e| e.message_id() == Some("m"))
        .collect();
    assert!(after.is_empty(), "events after the cure: {after:?}");
    assert_delivered_once(&world);
}

// ============================================================================
// Community formation
// ============================================================================

#[test]
fn test_community_formation_finds_clusters() {
    let mut world = scenarios::community_formation().unwrap();
    run_checked(&mut world);

    let first: BTreeSet<HostId> = (0..5).map(HostId).collect();
    let second: BTreeSet<HostId> = (5..10).map(HostId).collect();
    for i in 0..10 {
        let engine = world.router(HostId(i)).unwrap().decision_engine().unwrap();
        let community = engine.local_community().unwrap();
        let expected = if i < 5 { &first } else { &second };
        assert_eq!(community, expected, "community of host {i}");
    }
}

#[test]
fn test_bubble_rap_climbs_centrality_across_clusters() {
    let mut world = scenarios::community_formation().unwrap();
    run_checked(&mut world);

    let delivered = deliveries(&world, "m");
    assert_eq!(delivered.len(), 1);
    match delivered[0] {
        SimEvent::MessageTransferred { hops, .. } => {
            assert_eq!(hops, &vec![HostId(0), HostId(4), HostId(5), HostId(9)]);
        }
        other => panic!("unexpected event {other:?}"),
    }
    // 1 is no more central than 0, so the meeting at 500 s moves nothing
    assert!(!world.events().log().iter().any(|e| matches!(
        e,
        SimEvent::MessageTransferred { id, from, to, .. }
            if id == "m" && *from == HostId(0) && *to == HostId(1)
    )));
}

// ============================================================================
// Spray and focus
// ============================================================================

#[test]
fn test_spray_and_focus_halves_copies() {
    let mut world = scenarios::spray_and_focus_halving().unwrap();
    run_checked(&mut world);

    let held: Vec<i64> = (1..=3)
        .map(|h| copies(world.router(HostId(h)).unwrap().message("m").unwrap()))
        .collect();
    assert_eq!(held, vec![4, 2, 1]);

    let source = copies(world.router(HostId(0)).unwrap().message("m").unwrap());
    assert_eq!(source, 1);
    assert_eq!(source + held.iter().sum::<i64>(), 8);
    assert!(deliveries(&world, "m").is_empty());
}

// ============================================================================
// Publish/subscribe
// ============================================================================

#[test]
fn test_pubsub_delivers_topic_to_every_subscriber() {
    let mut world = scenarios::pubsub().unwrap();
    run_checked(&mut world);

    let mut reached: Vec<(HostId, Vec<HostId>)> = deliveries(&world, "d")
        .into_iter()
        .filter_map(|e| match e {
            SimEvent::MessageTransferred { to, hops, .. } => Some((*to, hops.clone())),
            _ => None,
        })
        .collect();
    reached.sort();
    assert_eq!(
        reached,
        vec![
            (HostId(2), vec![HostId(0), HostId(1), HostId(2)]),
            (HostId(3), vec![HostId(0), HostId(3)]),
        ]
    );
    // carriers drop their copy once a subscriber has it
    assert!(!holds(&world, 0, "d"));
    assert!(!holds(&world, 1, "d"));
    // subscribers consume the data instead of carrying it
    assert!(!holds(&world, 2, "d"));
    assert!(!holds(&world, 3, "d"));
    assert_delivered_once(&world);
}

#[test]
fn test_pubsub_subscriptions_stay_local() {
    let mut world = scenarios::pubsub().unwrap();
    run_checked(&mut world);

    let log = world.events().log();
    assert!(!log
        .iter()
        .any(|e| matches!(e, SimEvent::MessageCreated { id, .. } if id.starts_with("sub"))));
    assert!(log
        .iter()
        .any(|e| matches!(e, SimEvent::MessageCreated { id, .. } if id == "d")));
    for host in [2, 3] {
        let engine = world
            .router(HostId(host))
            .unwrap()
            .decision_engine()
            .and_then(|e| e.as_any().downcast_ref::<PubSubProphetDecisionEngine>())
            .unwrap();
        assert!(engine.is_subscribed("news"));
    }
}

// ============================================================================
// Invariants under random traffic
// ============================================================================

const RANDOM_WORLD: &str = "
    Scenario.name = random_world
    Scenario.endTime = 600
    Scenario.updateInterval = 1
    Scenario.keepEventLog = true
    Scenario.nrofHostGroups = 2
    MovementModel.worldSize = 200,200
    Group.nrofInterfaces = 1
    Group.interface1 = bt
    Group.movementModel = RandomWaypoint
    Group.speed = 1,5
    Group.waitTime = 0,20
    Group.bufferSize = 5k
    Group.msgTtl = 5
    Group1.groupID = e
    Group1.nrofHosts = 6
    Group1.router = EpidemicWithCureRouter
    Group2.groupID = s
    Group2.nrofHosts = 6
    Group2.router = SprayAndFocusRouter
    SprayAndFocusRouter.nrofCopies = 4
    bt.type = SimpleBroadcastInterface
    bt.transmitRange = 30
    bt.transmitSpeed = 1k
    Events.nrof = 1
    Events1.class = MessageEventGenerator
    Events1.interval = 5,15
    Events1.size = 200,900
    Events1.hosts = 0,12
    Events1.prefix = R
";

#[test]
fn test_invariants_hold_under_random_traffic() {
    let settings = Settings::parse(RANDOM_WORLD).unwrap();
    let mut world = Scenario::from_settings(&settings).unwrap().world;
    assert_eq!(world.host_count(), 12);
    run_checked(&mut world);

    let log = world.events().log();
    assert!(log.iter().any(|e| matches!(e, SimEvent::HostsConnected { .. })));
    assert!(log.iter().any(|e| matches!(e, SimEvent::MessageCreated { .. })));
    assert_delivered_once(&world);
}

#[test]
fn test_same_seed_same_run() {
    let settings = Settings::parse(RANDOM_WORLD).unwrap();
    let mut a = Scenario::from_settings(&settings).unwrap().world;
    let mut b = Scenario::from_settings(&settings).unwrap().world;
    a.run_until(200.0).unwrap();
    b.run_until(200.0).unwrap();
    assert_eq!(a.events().log(), b.events().log());
}

#[test]
fn test_every_builtin_scenario_builds() {
    for name in scenarios::BUILTIN_SCENARIOS {
        let world = scenarios::builtin(name).unwrap();
        assert_eq!(world.name(), *name);
    }
}
