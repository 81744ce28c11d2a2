use crate::effects::{Effect, Timer};
use crate::penalty::{PenaltyEngine, PenaltyRules};
use crate::pit_lane::{PitLane, PitLaneConfig};
use crate::race_state::RaceState;
use crate::registry::{PlayerJoin, Registry};
use log::{debug, error, info};
use shared::{Outbound, Packet, SyncRequest, VERSION_REQUEST_ID};

#[derive(Debug, Clone, Default)]
pub struct SessionConfig {
    /// `None` disables speed limit enforcement
    pub penalty_rules: Option<PenaltyRules>,
    pub pit_lane: PitLaneConfig,
}

/// Tracked state of one server session
///
/// Packets and fired timers are applied one at a time; each call returns the
/// effects it produced, in order.
#[derive(Debug)]
pub struct Session {
    registry: Registry,
    race: RaceState,
    pit_lane: PitLane,
    penalties: PenaltyEngine,
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        Self {
            registry: Registry::new(),
            race: RaceState::new(),
            pit_lane: PitLane::new(config.pit_lane),
            penalties: PenaltyEngine::new(config.penalty_rules),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn race_state(&self) -> &RaceState {
        &self.race
    }

    pub fn pit_lane(&self) -> &PitLane {
        &self.pit_lane
    }

    pub fn handle_packet(&mut self, packet: Packet) -> Vec<Effect> {
        let mut out = Vec::new();

        match packet {
            Packet::Version {
                request_id,
                product,
                version,
            } => {
                if request_id != VERSION_REQUEST_ID {
                    return out;
                }

                info!("Connected to {} {}", product, version);
                debug!("Requesting all players, connections and session state");
                request(&mut out, SyncRequest::Connections);
                request(&mut out, SyncRequest::Players);
                request(&mut out, SyncRequest::State);
            }

            Packet::MultiplayerStarted { request_id } => {
                if request_id > 0 {
                    return out;
                }

                self.registry.reset();
                self.pit_lane.clear();
                self.race.reset();
                request(&mut out, SyncRequest::Connections);
                request(&mut out, SyncRequest::Players);
                request(&mut out, SyncRequest::State);
            }

            Packet::SessionCleared => {
                self.registry.clear_all();
                self.pit_lane.clear();
            }

            Packet::ConnectionJoined {
                connection_id,
                login,
                display_name,
                admin,
                flags,
            } => {
                self.registry
                    .upsert_connection(connection_id, &login, &display_name, admin, flags);
            }

            Packet::ConnectionLeft { connection_id } => {
                self.registry.remove_connection(connection_id);
            }

            Packet::PlayerJoined {
                player_id,
                connection_id,
                display_name,
                raw_name,
                player_type,
                flags,
                plate,
            } => {
                self.registry.upsert_player(PlayerJoin {
                    player_id,
                    connection_id,
                    display_name,
                    raw_name,
                    player_type,
                    flags,
                    plate,
                });
            }

            Packet::PlayerLeft { player_id } => {
                self.pit_lane.leave(&self.registry, player_id, &mut out);
                self.registry.remove_player(player_id);
            }

            Packet::PlayerPitted { player_id } => {
                self.pit_lane.leave(&self.registry, player_id, &mut out);
            }

            Packet::PlayerRenamed {
                connection_id,
                display_name,
                plate,
            } => {
                self.registry.rename_player(connection_id, &display_name, &plate);
            }

            Packet::PlayerTookOver {
                player_id,
                new_connection_id,
            } => {
                self.registry.takeover(player_id, new_connection_id);
            }

            Packet::LapCompleted {
                player_id,
                laps_done,
            } => {
                self.registry.record_lap(player_id, laps_done);
            }

            Packet::SessionState { race_laps } => {
                self.race.update(race_laps);
            }

            Packet::ZoneCrossing {
                player_id,
                action,
                zone,
                flags,
                heading,
            } => {
                self.pit_lane.handle_crossing(
                    &mut self.registry,
                    &self.penalties,
                    player_id,
                    action,
                    zone,
                    flags,
                    heading,
                    &mut out,
                );
            }

            Packet::MultiCarInfo { cars } => {
                for car in cars {
                    if !self.pit_lane.contains(car.player_id) {
                        continue;
                    }

                    if !self.registry.contains_player(car.player_id) {
                        error!("Player {} in pit lane not found", car.player_id);
                        continue;
                    }

                    self.penalties.evaluate_speed(
                        &mut self.registry,
                        &self.race,
                        car.player_id,
                        car.speed_kmh(),
                        &mut out,
                    );
                }
            }

            Packet::PenaltyUpdate {
                player_id,
                old_value,
                new_value,
                reason,
            } => {
                debug!(
                    "Penalty update for player {}: {} -> {}",
                    player_id, old_value, new_value
                );
                let in_pit_lane = self.pit_lane.contains(player_id);
                self.penalties
                    .apply_update(&mut self.registry, in_pit_lane, player_id, new_value, reason);
            }
        }

        out
    }

    pub fn handle_timer(&mut self, timer: Timer) -> Vec<Effect> {
        let mut out = Vec::new();

        match timer {
            Timer::PitSettle { player_id, token } => {
                self.pit_lane
                    .settle_elapsed(&self.registry, &self.penalties, player_id, token, &mut out);
            }
            Timer::ClearSpeedMessage { token } => {
                self.pit_lane.message_timeout_elapsed(token, &mut out);
            }
        }

        out
    }
}

fn request(out: &mut Vec<Effect>, request: SyncRequest) {
    out.push(Effect::Send(Outbound::Request(request)));
}
