//! Connection and player registry for the tracked server session
//!
//! This module owns the lifecycle of everything the server reports as
//! joined:
//! - Connections (a client session, possibly controlling several cars)
//! - Players (a car on track, human or AI controlled)
//! - The player → connection link, which survives takeovers and renames
//!
//! Players refer to their connection by id only. Anything that needs the
//! connection's login resolves it through the registry at the moment it is
//! used, so a connection that has left can never be addressed through a
//! stale copy.

use crate::names::sanitize_name;
use crate::penalty::Penalty;
use log::{debug, warn};
use shared::{is_ai, PenaltyReason};
use std::collections::HashMap;

/// A client session on the server
#[derive(Debug, Clone, PartialEq)]
pub struct Connection {
    pub id: u8,
    /// Server login, unique per connection
    pub login: String,
    pub display_name: String,
    pub admin: bool,
    pub flags: u8,
    /// Player ids currently controlled by this connection, in join order
    pub players: Vec<u8>,
}

/// A car on track
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: u8,
    /// Owning connection, `None` once the connection is gone or was never known
    pub connection_id: Option<u8>,
    /// Connection reported at join time that was not known yet
    pub awaiting_connection: Option<u8>,
    /// Sanitized name used in messages
    pub display_name: String,
    /// Name exactly as reported by the server
    pub raw_name: String,
    pub player_type: u8,
    pub flags: u16,
    pub plate: String,
    pub penalty: Penalty,
    pub penalty_reason: PenaltyReason,
    pub laps_done: u16,
}

impl Player {
    pub fn is_ai(&self) -> bool {
        is_ai(self.player_type)
    }
}

/// Player details carried by a join notification
#[derive(Debug, Clone)]
pub struct PlayerJoin {
    pub player_id: u8,
    pub connection_id: u8,
    pub display_name: String,
    pub raw_name: String,
    pub player_type: u8,
    pub flags: u16,
    pub plate: String,
}

/// Live view of connections and players
///
/// Every operation that names an unknown id logs a warning and leaves the
/// registry untouched; nothing here fails loudly.
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<u8, Connection>,
    players: HashMap<u8, Player>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a connection, or refreshes its details if it is already known
    ///
    /// A refresh keeps the list of players the connection controls, since
    /// the server re-sends connection listings on request. Players that
    /// joined before the connection was known are linked to it here.
    pub fn upsert_connection(
        &mut self,
        id: u8,
        login: &str,
        display_name: &str,
        admin: bool,
        flags: u8,
    ) {
        let mut players = self
            .connections
            .remove(&id)
            .map(|existing| existing.players)
            .unwrap_or_default();

        for player in self.players.values_mut() {
            if player.awaiting_connection == Some(id) {
                player.awaiting_connection = None;
                player.connection_id = Some(id);
                players.push(player.id);
                debug!("Linked {} to connection {}", player.display_name, id);
            }
        }

        self.connections.insert(
            id,
            Connection {
                id,
                login: login.to_string(),
                display_name: sanitize_name(display_name),
                admin,
                flags,
                players,
            },
        );

        debug!("New connection: {} (connection {})", login, id);
    }

    /// Removes a connection and orphans any players still linked to it
    pub fn remove_connection(&mut self, id: u8) -> bool {
        let Some(connection) = self.connections.remove(&id) else {
            warn!("Failed to delete connection - connection {} not found", id);
            return false;
        };

        for player_id in &connection.players {
            if let Some(player) = self.players.get_mut(player_id) {
                if player.connection_id == Some(id) {
                    player.connection_id = None;
                }
            }
        }

        debug!("Connection left: {} (connection {})", connection.login, id);
        true
    }

    /// Adds a player, replacing any previous record with the same id
    ///
    /// Penalty state and lap count start fresh. If the owning connection is
    /// unknown the player is still tracked, but without a connection link.
    pub fn upsert_player(&mut self, join: PlayerJoin) {
        if let Some(previous) = self.players.remove(&join.player_id) {
            self.unlink(previous.id, previous.connection_id);
        }

        let (connection_id, awaiting_connection) =
            match self.connections.get_mut(&join.connection_id) {
                Some(connection) => {
                    if !connection.players.contains(&join.player_id) {
                        connection.players.push(join.player_id);
                    }
                    (Some(join.connection_id), None)
                }
                None => {
                    warn!(
                        "Player {} joined from unknown connection {}",
                        join.player_id, join.connection_id
                    );
                    (None, Some(join.connection_id))
                }
            };

        let player = Player {
            id: join.player_id,
            connection_id,
            awaiting_connection,
            display_name: sanitize_name(&join.display_name),
            raw_name: join.raw_name,
            player_type: join.player_type,
            flags: join.flags,
            plate: join.plate,
            penalty: Penalty::None,
            penalty_reason: PenaltyReason::Unknown,
            laps_done: 0,
        };

        debug!(
            "New player: {} (connection {}, player {})",
            player.display_name, join.connection_id, player.id
        );
        self.players.insert(player.id, player);
    }

    pub fn remove_player(&mut self, id: u8) -> Option<Player> {
        let Some(player) = self.players.remove(&id) else {
            warn!("Failed to delete player - player {} not found", id);
            return None;
        };

        self.unlink(player.id, player.connection_id);
        debug!("Player left: {} (player {})", player.display_name, id);
        Some(player)
    }

    /// Applies a rename to a connection and its human player
    ///
    /// AI players controlled by the same connection keep their names.
    /// Returns the id of the renamed player, if one was found.
    pub fn rename_player(
        &mut self,
        connection_id: u8,
        display_name: &str,
        plate: &str,
    ) -> Option<u8> {
        let Some(connection) = self.connections.get_mut(&connection_id) else {
            warn!(
                "Failed to rename connection players - connection {} not found",
                connection_id
            );
            return None;
        };

        let display_name = sanitize_name(display_name);
        connection.display_name = display_name.clone();

        let human = connection.players.iter().copied().find(|player_id| {
            self.players
                .get(player_id)
                .map(|player| !player.is_ai())
                .unwrap_or(false)
        });

        let Some(player) = human.and_then(|player_id| self.players.get_mut(&player_id)) else {
            warn!(
                "Failed to rename player - human player not found for connection {}",
                connection_id
            );
            return None;
        };

        player.display_name = display_name;
        player.plate = plate.to_string();

        debug!(
            "Player renamed: {} (connection {}, player {})",
            player.display_name, connection_id, player.id
        );
        Some(player.id)
    }

    /// Moves a player to a new controlling connection
    pub fn takeover(&mut self, player_id: u8, new_connection_id: u8) -> bool {
        if !self.players.contains_key(&player_id) {
            warn!(
                "Failed to update player after takeover - player {} not found",
                player_id
            );
            return false;
        }

        if !self.connections.contains_key(&new_connection_id) {
            warn!(
                "Failed to update player's connection after takeover - connection {} not found",
                new_connection_id
            );
            return false;
        }

        let old_connection_id = self.players.get(&player_id).and_then(|p| p.connection_id);
        self.unlink(player_id, old_connection_id);

        if let Some(connection) = self.connections.get_mut(&new_connection_id) {
            connection.players.push(player_id);
        }

        if let Some(player) = self.players.get_mut(&player_id) {
            player.connection_id = Some(new_connection_id);
            player.awaiting_connection = None;
            debug!(
                "Player took over: {} (connection {}, player {})",
                player.display_name, new_connection_id, player_id
            );
        }

        true
    }

    /// Records a completed lap count
    ///
    /// Lap counts only move forward; a report lower than the recorded
    /// count is dropped.
    pub fn record_lap(&mut self, player_id: u8, laps_done: u16) -> bool {
        let Some(player) = self.players.get_mut(&player_id) else {
            warn!("Failed to update player after lap - player {} not found", player_id);
            return false;
        };

        if laps_done < player.laps_done {
            warn!(
                "Ignoring lap report for {}: {} lap(s) reported after {}",
                player.display_name, laps_done, player.laps_done
            );
            return false;
        }

        player.laps_done = laps_done;
        debug!("{} has completed {} lap(s)", player.display_name, laps_done);
        true
    }

    /// Drops every player while keeping connections
    pub fn clear_all(&mut self) {
        self.players.clear();
        for connection in self.connections.values_mut() {
            connection.players.clear();
        }
        debug!("Cleared players");
    }

    /// Drops every connection and player
    pub fn reset(&mut self) {
        self.players.clear();
        self.connections.clear();
        debug!("Cleared players and connections");
    }

    pub fn player(&self, id: u8) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: u8) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    pub fn connection(&self, id: u8) -> Option<&Connection> {
        self.connections.get(&id)
    }

    pub fn contains_player(&self, id: u8) -> bool {
        self.players.contains_key(&id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Login of the connection currently controlling a human player
    pub fn human_login(&self, player_id: u8) -> Option<&str> {
        let player = self.players.get(&player_id)?;
        if player.is_ai() {
            return None;
        }
        let connection = self.connections.get(&player.connection_id?)?;
        Some(connection.login.as_str())
    }

    /// Identity to address a mutating command at
    ///
    /// Human players are addressed by their current connection's login.
    /// AI or orphaned players fall back to the raw player name.
    pub fn command_target(&self, player_id: u8) -> Option<String> {
        if let Some(login) = self.human_login(player_id) {
            return Some(login.to_string());
        }
        self.players.get(&player_id).map(|player| player.raw_name.clone())
    }

    fn unlink(&mut self, player_id: u8, connection_id: Option<u8>) {
        if let Some(connection) = connection_id.and_then(|id| self.connections.get_mut(&id)) {
            connection.players.retain(|id| *id != player_id);
        }
    }
}
