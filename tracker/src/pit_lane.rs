//! Pit lane zone detection
//!
//! The pit lane is bounded by two checkpoints placed in the layout. Which
//! one was crossed, and in which direction, decides entry or exit:
//!
//! | checkpoint | forward | reverse |
//! |------------|---------|---------|
//! | first      | entry   | exit    |
//! | second     | exit    | entry   |
//!
//! Cars that spawn in the pits cross a circle at the pit start point
//! instead. That notification can arrive before the player's join has been
//! processed, so the entry is deferred by a short settling delay and then
//! re-checked against the registry.
//!
//! Membership only ever holds players the registry knows about.

use crate::effects::{command, message, schedule, Effect, Timer};
use crate::penalty::PenaltyEngine;
use crate::registry::Registry;
use log::{debug, warn};
use shared::{CrossingAction, ZoneKind, CHECKPOINT_FLAG_1, CHECKPOINT_FLAG_2};
use std::collections::{HashMap, HashSet};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Checkpoint {
    First,
    Second,
}

impl Checkpoint {
    /// Exactly one of the two flag bits identifies a pit lane checkpoint
    pub fn from_flags(flags: u8) -> Option<Self> {
        let first = flags & CHECKPOINT_FLAG_1 != 0;
        let second = flags & CHECKPOINT_FLAG_2 != 0;
        match (first, second) {
            (true, false) => Some(Checkpoint::First),
            (false, true) => Some(Checkpoint::Second),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneEvent {
    Entry,
    Exit,
    /// Pit start circle entered; entry follows after settling
    PitStart,
    Ignored,
}

pub fn checkpoint_event(checkpoint: Checkpoint, direction: Direction) -> ZoneEvent {
    match (checkpoint, direction) {
        (Checkpoint::First, Direction::Forward) | (Checkpoint::Second, Direction::Reverse) => {
            ZoneEvent::Entry
        }
        (Checkpoint::Second, Direction::Forward) | (Checkpoint::First, Direction::Reverse) => {
            ZoneEvent::Exit
        }
    }
}

/// Classifies a crossing notification
pub fn classify_crossing(
    action: CrossingAction,
    zone: ZoneKind,
    flags: u8,
    heading: u8,
    pit_start_circle: u8,
) -> ZoneEvent {
    match (zone, action) {
        (ZoneKind::Checkpoint, CrossingAction::CheckpointForward) => Checkpoint::from_flags(flags)
            .map(|checkpoint| checkpoint_event(checkpoint, Direction::Forward))
            .unwrap_or(ZoneEvent::Ignored),
        (ZoneKind::Checkpoint, CrossingAction::CheckpointReverse) => Checkpoint::from_flags(flags)
            .map(|checkpoint| checkpoint_event(checkpoint, Direction::Reverse))
            .unwrap_or(ZoneEvent::Ignored),
        (ZoneKind::Circle, CrossingAction::CircleEnter) if heading == pit_start_circle => {
            ZoneEvent::PitStart
        }
        _ => ZoneEvent::Ignored,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PitLaneConfig {
    pub settle_delay: Duration,
    pub message_timeout: Duration,
    pub pit_start_circle: u8,
}

impl Default for PitLaneConfig {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_millis(500),
            message_timeout: Duration::from_millis(3000),
            pit_start_circle: 1,
        }
    }
}

/// Players currently inside the pit lane and the timers tied to them
#[derive(Debug, Default)]
pub struct PitLane {
    config: PitLaneConfig,
    members: HashSet<u8>,
    /// Outstanding settle timer token per player
    settling: HashMap<u8, u64>,
    /// Token of the one live speed message clear timer
    message_token: Option<u64>,
    next_token: u64,
}

impl PitLane {
    pub fn new(config: PitLaneConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn contains(&self, player_id: u8) -> bool {
        self.members.contains(&player_id)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_settling(&self, player_id: u8) -> bool {
        self.settling.contains_key(&player_id)
    }

    #[allow(clippy::too_many_arguments)]
    pub fn handle_crossing(
        &mut self,
        registry: &mut Registry,
        penalties: &PenaltyEngine,
        player_id: u8,
        action: CrossingAction,
        zone: ZoneKind,
        flags: u8,
        heading: u8,
        out: &mut Vec<Effect>,
    ) {
        match classify_crossing(action, zone, flags, heading, self.config.pit_start_circle) {
            ZoneEvent::Entry => self.enter(registry, penalties, player_id, out),
            ZoneEvent::Exit => self.exit(registry, penalties, player_id, out),
            ZoneEvent::PitStart => self.start_settling(registry, penalties, player_id, out),
            ZoneEvent::Ignored => {}
        }
    }

    pub fn enter(
        &mut self,
        registry: &Registry,
        penalties: &PenaltyEngine,
        player_id: u8,
        out: &mut Vec<Effect>,
    ) {
        self.settling.remove(&player_id);

        let Some(player) = registry.player(player_id) else {
            warn!("Pit lane entry for unknown player {}", player_id);
            return;
        };

        if !self.members.insert(player_id) {
            debug!("{} is already in the pit lane", player.display_name);
            return;
        }

        message(out, format!("{}^8 entered the pit lane", player.display_name));
        penalties.note_entry(registry, player_id);

        let reminder = (penalties.speed_limit_kmh(), registry.human_login(player_id));
        if let (Some(limit), Some(login)) = reminder {
            command(out, format!("/rcm ^3Pit lane speed limit ^7{} km/h", limit));
            command(out, format!("/rcm_ply {}", login));

            let token = self.next_token();
            self.message_token = Some(token);
            schedule(out, self.config.message_timeout, Timer::ClearSpeedMessage { token });
        }
    }

    pub fn exit(
        &mut self,
        registry: &mut Registry,
        penalties: &PenaltyEngine,
        player_id: u8,
        out: &mut Vec<Effect>,
    ) {
        if !self.leave(registry, player_id, out) {
            debug!("Pit lane exit for player {} who was not inside", player_id);
            return;
        }

        penalties.resolve_exit(registry, player_id, out);
    }

    /// Removes a player from the pit lane without resolving penalties
    ///
    /// Used for exits through the checkpoints as well as for players that
    /// left the track or were moved to the garage. Returns true if the
    /// player was a member.
    pub fn leave(&mut self, registry: &Registry, player_id: u8, out: &mut Vec<Effect>) -> bool {
        self.settling.remove(&player_id);

        if !self.members.remove(&player_id) {
            return false;
        }

        self.message_token = None;

        match registry.player(player_id) {
            Some(player) => message(out, format!("{}^8 left the pit lane", player.display_name)),
            None => message(out, format!("Player {}^8 left the pit lane", player_id)),
        }

        if let Some(login) = registry.human_login(player_id) {
            command(out, format!("/rcc_ply {}", login));
        }

        true
    }

    fn start_settling(
        &mut self,
        registry: &Registry,
        penalties: &PenaltyEngine,
        player_id: u8,
        out: &mut Vec<Effect>,
    ) {
        if self.config.settle_delay.is_zero() {
            self.enter(registry, penalties, player_id, out);
            return;
        }

        let token = self.next_token();
        self.settling.insert(player_id, token);
        debug!("Player {} at pit start point, settling", player_id);
        schedule(out, self.config.settle_delay, Timer::PitSettle { player_id, token });
    }

    /// Completes a deferred pit start entry unless it was superseded
    pub fn settle_elapsed(
        &mut self,
        registry: &Registry,
        penalties: &PenaltyEngine,
        player_id: u8,
        token: u64,
        out: &mut Vec<Effect>,
    ) {
        if self.settling.get(&player_id) != Some(&token) {
            debug!("Discarding stale pit start timer for player {}", player_id);
            return;
        }

        self.enter(registry, penalties, player_id, out);
    }

    pub fn message_timeout_elapsed(&mut self, token: u64, out: &mut Vec<Effect>) {
        if self.message_token != Some(token) {
            debug!("Discarding stale speed message timer");
            return;
        }

        self.message_token = None;
        command(out, "/rcc_all".to_string());
    }

    pub fn clear(&mut self) {
        self.members.clear();
        self.settling.clear();
        self.message_token = None;
        debug!("Cleared pit lane");
    }

    fn next_token(&mut self) -> u64 {
        self.next_token += 1;
        self.next_token
    }
}
