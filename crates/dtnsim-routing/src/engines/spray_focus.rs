//! Spray-and-focus
//!
//! A new message carries `nrofCopies` forwarding tokens. While a holder has
//! more than one, every transfer splits them: the receiver takes the floor
//! half and the sender keeps the ceiling half. A holder left with a single
//! token switches to the focus phase and only hands the message to peers
//! that met the destination more recently, by more than a threshold.
//!
//! Last-encounter times propagate transitively on contact, shifted by the
//! time the holder would need to travel the distance between the two hosts.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};

use dtnsim_core::{ConfigError, ConfigResult, HostId, Message, PropertyValue, Settings};
use tracing::warn;

use super::peer_engine_as;
use crate::decision::{DecisionEngine, ExchangeContext};

pub const NROF_COPIES_SETTING: &str = "nrofCopies";
pub const TIMER_THRESHOLD_SETTING: &str = "timerThreshold";
/// Alternative key for the timer threshold
pub const TRANSITIVITY_THRESHOLD_SETTING: &str = "transitivityTimerThreshold";
pub const COPIES_PROPERTY: &str = "SprayAndFocus.copies";

pub const DEFAULT_TIMER_THRESHOLD: f64 = 60.0;
/// Transitive time offset used when the holder does not move
pub const DEFAULT_TIMEDIFF: f64 = 300.0;

/// Copies carried by `m`; a message without the property counts as one
pub fn copies(m: &Message) -> i64 {
    m.int_property(COPIES_PROPERTY).unwrap_or(1)
}

fn set_copies(m: &mut Message, n: i64) {
    m.set_property(COPIES_PROPERTY, PropertyValue::Int(n));
}

#[derive(Debug, Clone)]
pub struct SprayAndFocusDecisionEngine {
    initial_copies: i64,
    timer_threshold: f64,
    /// Last time each host was (transitively) met
    recent_encounters: BTreeMap<HostId, f64>,
}

impl SprayAndFocusDecisionEngine {
    pub fn new(initial_copies: i64, timer_threshold: f64) -> Self {
        Self {
            initial_copies,
            timer_threshold,
            recent_encounters: BTreeMap::new(),
        }
    }

    /// `nrofCopies` is required and must be at least one
    pub fn from_settings(s: &Settings) -> ConfigResult<Self> {
        let initial_copies = s.get_i64(NROF_COPIES_SETTING)?;
        if initial_copies < 1 {
            return Err(ConfigError::InvalidValue {
                key: s.full_key(NROF_COPIES_SETTING),
                value: initial_copies.to_string(),
                reason: "at least one copy is needed".to_string(),
            });
        }
        let timer_threshold = if s.contains(TIMER_THRESHOLD_SETTING) {
            s.get_non_negative(TIMER_THRESHOLD_SETTING)?
        } else {
            s.get_non_negative_or(TRANSITIVITY_THRESHOLD_SETTING, DEFAULT_TIMER_THRESHOLD)?
        };
        Ok(Self::new(initial_copies, timer_threshold))
    }

    pub fn initial_copies(&self) -> i64 {
        self.initial_copies
    }

    pub fn last_encounter(&self, host: HostId) -> Option<f64> {
        self.recent_encounters.get(&host).copied()
    }
}

impl DecisionEngine for SprayAndFocusDecisionEngine {
    fn connection_up(&mut self, _me: HostId, _peer: HostId, _now: f64) {}

    fn connection_down(
        &mut self,
        _me: HostId,
        _peer: HostId,
        _peer_engine: Option<&dyn DecisionEngine>,
        _now: f64,
    ) {
    }

    fn do_exchange_for_new_connection(&mut self, ctx: &ExchangeContext, peer: &mut dyn DecisionEngine) {
        let Some(other) = peer.as_any_mut().downcast_mut::<SprayAndFocusDecisionEngine>() else {
            warn!(host = %ctx.me, peer = %ctx.peer, "Peer does not run spray-and-focus");
            return;
        };
        let distance = ctx.my_location.distance(&ctx.peer_location);
        let timediff = |speed: f64| {
            if speed == 0.0 {
                DEFAULT_TIMEDIFF
            } else {
                distance / speed
            }
        };
        let my_diff = timediff(ctx.my_speed);
        let peer_diff = timediff(ctx.peer_speed);

        self.recent_encounters.insert(ctx.peer, ctx.now);
        other.recent_encounters.insert(ctx.me, ctx.now);

        let hosts: BTreeSet<HostId> = self
            .recent_encounters
            .keys()
            .chain(other.recent_encounters.keys())
            .copied()
            .collect();
        for h in hosts {
            let mine = self.last_encounter(h).unwrap_or(-1.0);
            let theirs = other.last_encounter(h).unwrap_or(-1.0);
            if mine < 0.0 || mine + my_diff < theirs {
                self.recent_encounters.insert(h, theirs - my_diff);
            }
            if theirs < 0.0 || theirs + peer_diff < mine {
                other.recent_encounters.insert(h, mine - peer_diff);
            }
        }
    }

    fn new_message(&mut self, m: &mut Message) -> bool {
        set_copies(m, self.initial_copies);
        true
    }

    /// The received copy takes the floor half of the tokens
    fn is_final_dest(&mut self, m: &mut Message, host: HostId) -> bool {
        let n = copies(m);
        set_copies(m, if n > 1 { n / 2 } else { 1 });
        m.to() == host
    }

    fn should_save_received_message(&self, m: &Message, host: HostId) -> bool {
        m.to() != host
    }

    fn should_send_message_to_host(
        &self,
        m: &Message,
        peer: HostId,
        peer_engine: Option<&dyn DecisionEngine>,
        _now: f64,
    ) -> bool {
        if m.to() == peer || copies(m) > 1 {
            return true;
        }
        let Some(other) = peer_engine_as::<SprayAndFocusDecisionEngine>(peer_engine) else {
            return false;
        };
        match (other.last_encounter(m.to()), self.last_encounter(m.to())) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(theirs), Some(mine)) => theirs > mine + self.timer_threshold,
        }
    }

    /// The sender keeps the ceiling half; a last copy moves on
    fn should_delete_sent_message(
        &mut self,
        m: &mut Message,
        _peer: HostId,
        _peer_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        let n = copies(m);
        if n > 1 {
            set_copies(m, (n + 1) / 2);
            false
        } else {
            true
        }
    }

    fn should_delete_old_message(
        &self,
        m: &Message,
        reporter: HostId,
        _reporter_engine: Option<&dyn DecisionEngine>,
    ) -> bool {
        m.to() == reporter
    }

    fn replicate(&self, _host: HostId) -> Box<dyn DecisionEngine> {
        Box::new(Self::new(self.initial_copies, self.timer_threshold))
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dtnsim_core::{ConnectionId, Coord};

    fn ctx(me: u32, peer: u32, now: f64, my_speed: f64) -> ExchangeContext {
        ExchangeContext {
            conn: ConnectionId(0),
            me: HostId(me),
            peer: HostId(peer),
            now,
            my_location: Coord::new(0.0, 0.0),
            peer_location: Coord::new(10.0, 0.0),
            my_speed,
            peer_speed: 0.0,
        }
    }

    #[test]
    fn test_copy_count_must_be_positive() {
        for bad in ["0", "-3"] {
            let s = Settings::parse(&format!("SnF.nrofCopies = {bad}\n")).unwrap();
            let err = SprayAndFocusDecisionEngine::from_settings(&s.scoped("SnF")).unwrap_err();
            assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "SnF.nrofCopies"));
        }
        let s = Settings::parse("SnF.nrofCopies = 1\n").unwrap();
        let engine = SprayAndFocusDecisionEngine::from_settings(&s.scoped("SnF")).unwrap();
        assert_eq!(engine.initial_copies(), 1);
    }

    #[test]
    fn test_copies_split_on_transfer() {
        let mut sender = SprayAndFocusDecisionEngine::new(8, 60.0);
        let mut receiver = SprayAndFocusDecisionEngine::new(8, 60.0);
        let mut m = Message::new(HostId(0), HostId(9), "m", 1, 0.0);
        sender.new_message(&mut m);
        assert_eq!(copies(&m), 8);

        let mut copy = m.clone();
        assert!(!receiver.is_final_dest(&mut copy, HostId(1)));
        assert_eq!(copies(&copy), 4);
        assert!(!sender.should_delete_sent_message(&mut m, HostId(1), None));
        assert_eq!(copies(&m), 4);
    }

    #[test]
    fn test_odd_split_favors_sender() {
        let mut e = SprayAndFocusDecisionEngine::new(3, 60.0);
        let mut m = Message::new(HostId(0), HostId(9), "m", 1, 0.0);
        e.new_message(&mut m);
        let mut copy = m.clone();
        e.is_final_dest(&mut copy, HostId(1));
        assert_eq!(copies(&copy), 1);
        e.should_delete_sent_message(&mut m, HostId(1), None);
        assert_eq!(copies(&m), 2);
    }

    #[test]
    fn test_last_copy_moves() {
        let mut e = SprayAndFocusDecisionEngine::new(1, 60.0);
        let mut m = Message::new(HostId(0), HostId(9), "m", 1, 0.0);
        e.new_message(&mut m);
        let mut copy = m.clone();
        e.is_final_dest(&mut copy, HostId(1));
        assert_eq!(copies(&copy), 1);
        assert!(e.should_delete_sent_message(&mut m, HostId(1), None));
    }

    #[test]
    fn test_transitive_encounter_times() {
        let mut a = SprayAndFocusDecisionEngine::new(1, 60.0);
        let mut b = SprayAndFocusDecisionEngine::new(1, 60.0);
        let mut c = SprayAndFocusDecisionEngine::new(1, 60.0);

        b.do_exchange_for_new_connection(&ctx(1, 2, 100.0, 0.0), &mut c);
        assert_eq!(b.last_encounter(HostId(2)), Some(100.0));
        assert_eq!(c.last_encounter(HostId(1)), Some(100.0));

        // a moves at 2 m/s, 10 m from b: learns c's time shifted by 5 s
        a.do_exchange_for_new_connection(&ctx(0, 1, 200.0, 2.0), &mut b);
        assert_eq!(a.last_encounter(HostId(1)), Some(200.0));
        assert_eq!(a.last_encounter(HostId(2)), Some(95.0));
        // direct encounters are recorded unshifted
        assert_eq!(b.last_encounter(HostId(0)), Some(200.0));
    }

    fn as_dyn(e: &SprayAndFocusDecisionEngine) -> Option<&dyn DecisionEngine> {
        Some(e)
    }

    #[test]
    fn test_focus_phase_uses_threshold() {
        let mut me = SprayAndFocusDecisionEngine::new(1, 60.0);
        let mut peer = SprayAndFocusDecisionEngine::new(1, 60.0);
        let m = Message::new(HostId(0), HostId(9), "m", 1, 0.0);

        assert!(!me.should_send_message_to_host(&m, HostId(1), as_dyn(&peer), 0.0));
        peer.recent_encounters.insert(HostId(9), 100.0);
        assert!(me.should_send_message_to_host(&m, HostId(1), as_dyn(&peer), 0.0));
        me.recent_encounters.insert(HostId(9), 50.0);
        assert!(!me.should_send_message_to_host(&m, HostId(1), as_dyn(&peer), 0.0));
        me.recent_encounters.insert(HostId(9), 39.0);
        assert!(me.should_send_message_to_host(&m, HostId(1), as_dyn(&peer), 0.0));
        assert!(me.should_send_message_to_host(&m, HostId(9), None, 0.0));
    }

    #[test]
    fn test_settings() {
        let s = Settings::parse("SprayAndFocusRouter.nrofCopies = 6\n").unwrap();
        let e = SprayAndFocusDecisionEngine::from_settings(&s.scoped("SprayAndFocusRouter")).unwrap();
        assert_eq!(e.initial_copies(), 6);
        assert_eq!(e.timer_threshold, DEFAULT_TIMER_THRESHOLD);
        assert!(SprayAndFocusDecisionEngine::from_settings(&Settings::new()).is_err());
    }
}
