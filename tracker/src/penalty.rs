//! Pit lane speeding penalties
//!
//! Penalties are tracked per player as a tagged state rather than the raw
//! server codes, so that "issued but not yet taken" and "taken" can be told
//! apart. The zone detector confirms a penalty as served when the player
//! leaves the pit lane; speeding while the penalty is being served reopens
//! it.
//!
//! Transitions on a speed sample, with `final` meaning the player is within
//! the last laps of a lap-based race:
//!
//! | current              | mild overspeed            | severe overspeed          |
//! |----------------------|---------------------------|---------------------------|
//! | none                 | 30s if final, else DT     | 45s if final, else SG     |
//! | drive-through pend.  | -                         | stop-go pending           |
//! | drive-through served | drive-through pending     | drive-through pending     |
//! | stop-go pending      | -                         | -                         |
//! | stop-go served       | stop-go pending           | stop-go pending           |
//! | 30s                  | -                         | 45s if final              |
//! | 45s                  | -                         | -                         |

use crate::effects::{command, message, Effect};
use crate::race_state::RaceState;
use crate::registry::Registry;
use log::{debug, warn};
use shared::{penalty_value, PenaltyReason};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Pending,
    Served,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Penalty {
    #[default]
    None,
    DriveThrough(Stage),
    StopGo(Stage),
    Seconds30,
    Seconds45,
}

impl Penalty {
    /// Maps a server penalty value; the server's "valid" variants are served
    pub fn from_wire(value: u8) -> Option<Self> {
        match value {
            penalty_value::NONE => Some(Penalty::None),
            penalty_value::DRIVE_THROUGH => Some(Penalty::DriveThrough(Stage::Pending)),
            penalty_value::DRIVE_THROUGH_VALID => Some(Penalty::DriveThrough(Stage::Served)),
            penalty_value::STOP_GO => Some(Penalty::StopGo(Stage::Pending)),
            penalty_value::STOP_GO_VALID => Some(Penalty::StopGo(Stage::Served)),
            penalty_value::SECONDS_30 => Some(Penalty::Seconds30),
            penalty_value::SECONDS_45 => Some(Penalty::Seconds45),
            _ => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(
            self,
            Penalty::DriveThrough(Stage::Pending) | Penalty::StopGo(Stage::Pending)
        )
    }

    pub fn is_served(&self) -> bool {
        matches!(
            self,
            Penalty::DriveThrough(Stage::Served) | Penalty::StopGo(Stage::Served)
        )
    }

    /// Served penalties reopened as pending; anything else unchanged
    pub fn reopened(self) -> Self {
        match self {
            Penalty::DriveThrough(Stage::Served) => Penalty::DriveThrough(Stage::Pending),
            Penalty::StopGo(Stage::Served) => Penalty::StopGo(Stage::Pending),
            other => other,
        }
    }

    fn served(self) -> Self {
        match self {
            Penalty::DriveThrough(Stage::Pending) => Penalty::DriveThrough(Stage::Served),
            Penalty::StopGo(Stage::Pending) => Penalty::StopGo(Stage::Served),
            other => other,
        }
    }
}

/// Administrative penalty commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PenaltyCommand {
    DriveThrough,
    StopGo,
    Seconds30,
    Seconds45,
    Clear,
}

impl PenaltyCommand {
    pub fn text(&self, target: &str) -> String {
        let verb = match self {
            PenaltyCommand::DriveThrough => "/p_dt",
            PenaltyCommand::StopGo => "/p_sg",
            PenaltyCommand::Seconds30 => "/p_30",
            PenaltyCommand::Seconds45 => "/p_45",
            PenaltyCommand::Clear => "/p_clear",
        };
        format!("{} {}", verb, target)
    }

    /// Penalty state the command puts the player in
    fn outcome(&self) -> Penalty {
        match self {
            PenaltyCommand::DriveThrough => Penalty::DriveThrough(Stage::Pending),
            PenaltyCommand::StopGo => Penalty::StopGo(Stage::Pending),
            PenaltyCommand::Seconds30 => Penalty::Seconds30,
            PenaltyCommand::Seconds45 => Penalty::Seconds45,
            PenaltyCommand::Clear => Penalty::None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Violation {
    None,
    Mild,
    Severe,
}

/// Chooses the command for a violation, if the current penalty calls for one
pub fn escalate(
    current: Penalty,
    violation: Violation,
    final_laps: bool,
) -> Option<PenaltyCommand> {
    use PenaltyCommand as C;

    match (violation, current) {
        (Violation::None, _) => None,

        (Violation::Severe, Penalty::None) if final_laps => Some(C::Seconds45),
        (Violation::Severe, Penalty::None) => Some(C::StopGo),
        (Violation::Severe, Penalty::DriveThrough(Stage::Served)) => Some(C::DriveThrough),
        (Violation::Severe, Penalty::DriveThrough(Stage::Pending)) => Some(C::StopGo),
        (Violation::Severe, Penalty::StopGo(Stage::Served)) => Some(C::StopGo),
        (Violation::Severe, Penalty::Seconds30) if final_laps => Some(C::Seconds45),

        (Violation::Mild, Penalty::None) if final_laps => Some(C::Seconds30),
        (Violation::Mild, Penalty::None) => Some(C::DriveThrough),
        (Violation::Mild, Penalty::DriveThrough(Stage::Served)) => Some(C::DriveThrough),
        (Violation::Mild, Penalty::StopGo(Stage::Served)) => Some(C::StopGo),

        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PenaltyRules {
    pub speed_limit_kmh: f64,
    /// Margin above the limit beyond which speeding is severe
    pub overspeed_margin_kmh: f64,
    /// Laps before the end of a race in which time penalties replace pit penalties
    pub final_laps_window: u32,
}

impl PenaltyRules {
    pub fn new(speed_limit_kmh: f64) -> Self {
        Self {
            speed_limit_kmh,
            overspeed_margin_kmh: 20.0,
            final_laps_window: 2,
        }
    }

    pub fn classify(&self, speed_kmh: f64) -> Violation {
        if speed_kmh > self.speed_limit_kmh + self.overspeed_margin_kmh {
            Violation::Severe
        } else if speed_kmh > self.speed_limit_kmh {
            Violation::Mild
        } else {
            Violation::None
        }
    }
}

/// Applies penalty transitions to players held in the registry
///
/// Without rules no speed limit is enforced, but penalty updates and exit
/// resolution are still tracked.
#[derive(Debug, Clone, Default)]
pub struct PenaltyEngine {
    rules: Option<PenaltyRules>,
}

impl PenaltyEngine {
    pub fn new(rules: Option<PenaltyRules>) -> Self {
        Self { rules }
    }

    pub fn speed_limit_kmh(&self) -> Option<f64> {
        self.rules.as_ref().map(|rules| rules.speed_limit_kmh)
    }

    /// Evaluates one speed sample of a player inside the pit lane
    pub fn evaluate_speed(
        &self,
        registry: &mut Registry,
        race: &RaceState,
        player_id: u8,
        speed_kmh: f64,
        out: &mut Vec<Effect>,
    ) {
        let Some(rules) = &self.rules else {
            return;
        };

        let violation = rules.classify(speed_kmh);
        if violation == Violation::None {
            return;
        }

        let Some(player) = registry.player(player_id) else {
            warn!("Speed sample for unknown player {}", player_id);
            return;
        };

        let final_laps = race.in_final_laps(player.laps_done, rules.final_laps_window);
        let Some(penalty_command) = escalate(player.penalty, violation, final_laps) else {
            return;
        };

        let name = player.display_name.clone();
        let Some(target) = registry.command_target(player_id) else {
            warn!("No command target for player {}", player_id);
            return;
        };

        match violation {
            Violation::Severe => message(
                out,
                format!(
                    "{}^8 is speeding more than {} over the speed limit of {} km/h in pit lane",
                    name, rules.overspeed_margin_kmh, rules.speed_limit_kmh
                ),
            ),
            _ => message(
                out,
                format!(
                    "{}^8 is going more than {} km/h in pit lane",
                    name, rules.speed_limit_kmh
                ),
            ),
        }

        command(out, penalty_command.text(&target));

        if let Some(player) = registry.player_mut(player_id) {
            debug!(
                "Penalty for {}: {:?} -> {:?} ({:.1} km/h)",
                name,
                player.penalty,
                penalty_command.outcome(),
                speed_kmh
            );
            player.penalty = penalty_command.outcome();
            player.penalty_reason = PenaltyReason::Speeding;
        }
    }

    /// Records a penalty change reported by the server
    ///
    /// The server's value always wins, except that a served penalty reported
    /// while the player is still inside the pit lane is kept pending until
    /// they leave it.
    pub fn apply_update(
        &self,
        registry: &mut Registry,
        in_pit_lane: bool,
        player_id: u8,
        new_value: u8,
        reason: u8,
    ) -> bool {
        let Some(penalty) = Penalty::from_wire(new_value) else {
            warn!(
                "Ignoring penalty update for player {} with unknown value {}",
                player_id, new_value
            );
            return false;
        };

        let Some(player) = registry.player_mut(player_id) else {
            warn!("Failed to update penalty - player {} not found", player_id);
            return false;
        };

        let penalty = if in_pit_lane { penalty.reopened() } else { penalty };
        let reason = PenaltyReason::from(reason);

        if player.penalty == penalty && player.penalty_reason == reason {
            debug!("Penalty for {} unchanged: {:?}", player.display_name, penalty);
            return false;
        }

        debug!(
            "Penalty for {} updated: {:?} -> {:?} ({:?})",
            player.display_name, player.penalty, penalty, reason
        );
        player.penalty = penalty;
        player.penalty_reason = reason;
        true
    }

    /// Notes a pit lane entry; serving is only confirmed on exit
    pub fn note_entry(&self, registry: &Registry, player_id: u8) {
        if let Some(player) = registry.player(player_id) {
            if player.penalty.is_pending() {
                debug!(
                    "{} entered the pit lane with {:?}",
                    player.display_name, player.penalty
                );
            }
        }
    }

    /// Resolves a player's penalty as they leave the pit lane
    pub fn resolve_exit(&self, registry: &mut Registry, player_id: u8, out: &mut Vec<Effect>) {
        let Some(current) = registry.player(player_id).map(|player| player.penalty) else {
            return;
        };

        if current.is_served() {
            let Some(target) = registry.command_target(player_id) else {
                return;
            };
            if let Some(player) = registry.player_mut(player_id) {
                player.penalty = Penalty::None;
                message(out, format!("{}^8 served their penalty", player.display_name));
            }
            command(out, PenaltyCommand::Clear.text(&target));
        } else if current.is_pending() {
            if let Some(player) = registry.player_mut(player_id) {
                player.penalty = current.served();
                debug!("{} is serving {:?}", player.display_name, player.penalty);
            }
        }
    }
}
