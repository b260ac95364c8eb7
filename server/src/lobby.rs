//! A single lobby: up to two attached connections and their match
//!
//! Everything in here runs under the lobby's own mutex, which is what
//! serializes a session's purchases, submissions and round resolution.
//! Different lobbies never share a lock.

use crate::error::GameError;
use crate::game::{MatchState, RoundEnd};
use crate::map_gen::ResourceMap;
use log::{info, warn};
use shared::{Role, ServerMessage};
use std::fmt;
use tokio::sync::mpsc;

pub type LobbyId = String;

pub const MAX_PLAYERS: usize = 2;

/// Seed reported to the Bandit. The real seed would rebuild the hidden interior.
pub const WITHHELD_SEED: u64 = 0;

/// Server-assigned identity of one transport connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Handle for pushing messages to one client
///
/// The receiving half is drained by the connection's writer task, so sending
/// never waits on a slow client.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: ConnectionId,
    outbox: mpsc::UnboundedSender<ServerMessage>,
}

impl Connection {
    pub fn new(id: ConnectionId, outbox: mpsc::UnboundedSender<ServerMessage>) -> Self {
        Self { id, outbox }
    }

    /// Queues a message. Returns false once the client is gone.
    pub fn send(&self, message: ServerMessage) -> bool {
        if self.outbox.send(message).is_err() {
            warn!("Dropping message for closed connection {}", self.id);
            return false;
        }
        true
    }
}

#[derive(Debug)]
pub struct Player {
    pub connection: Connection,
    pub role: Role,
}

/// How a lobby came to be, which decides how roles are dealt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LobbyKind {
    Private,
    Random,
}

#[derive(Debug)]
pub struct Lobby {
    pub id: LobbyId,
    pub kind: LobbyKind,
    players: Vec<Player>,
    pub state: MatchState,
}

impl Lobby {
    pub fn new(id: LobbyId, kind: LobbyKind) -> Self {
        Self {
            id,
            kind,
            players: Vec::with_capacity(MAX_PLAYERS),
            state: MatchState::new(),
        }
    }

    /// A lobby seated with the connection that opened it.
    pub fn hosted(id: LobbyId, kind: LobbyKind, host: Connection) -> Self {
        let mut lobby = Self::new(id, kind);
        lobby.players.push(Player {
            connection: host,
            role: Role::Unassigned,
        });
        lobby
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= MAX_PLAYERS
    }

    pub fn add_player(&mut self, connection: Connection) -> Result<(), GameError> {
        if self.is_full() {
            return Err(GameError::SessionFull(self.id.clone()));
        }
        info!("Connection {} joined lobby {}", connection.id, self.id);
        self.players.push(Player {
            connection,
            role: Role::Unassigned,
        });
        Ok(())
    }

    pub fn remove_player(&mut self, id: ConnectionId) -> Option<Player> {
        let index = self.players.iter().position(|p| p.connection.id == id)?;
        Some(self.players.remove(index))
    }

    pub fn role_of(&self, id: ConnectionId) -> Option<Role> {
        self.players
            .iter()
            .find(|p| p.connection.id == id)
            .map(|p| p.role)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        self.players.iter().map(|p| p.connection.id).collect()
    }

    pub fn send_to(&self, role: Role, message: ServerMessage) {
        if let Some(player) = self.players.iter().find(|p| p.role == role) {
            player.connection.send(message);
        }
    }

    pub fn broadcast(&self, message: &ServerMessage) {
        for player in &self.players {
            player.connection.send(message.clone());
        }
    }

    fn send_resources(&self) {
        for player in &self.players {
            let resources = self.state.resources_of(player.role);
            player
                .connection
                .send(ServerMessage::ResourceUpdate(resources));
        }
    }

    /// Deals roles, sends each side its view of the map and opens the first
    /// King planning phase. `king` must be one of the two attached players.
    pub fn start_match(&mut self, map: ResourceMap, king: ConnectionId) -> Result<(), GameError> {
        if self.state.is_game_over() {
            self.state.reset();
        }
        self.state.start(map)?;

        for player in &mut self.players {
            player.role = if player.connection.id == king {
                Role::King
            } else {
                Role::Bandit
            };
        }

        let Some(map) = self.state.map() else {
            return Ok(());
        };
        info!(
            "Match started in lobby {} with seed {} (king: {})",
            self.id,
            map.seed(),
            king
        );

        for player in &self.players {
            let (seed, visible) = match player.role {
                Role::King => (map.seed(), map.assignments().to_vec()),
                _ => (WITHHELD_SEED, map.reserved_view()),
            };
            player.connection.send(ServerMessage::MatchCreated { role: player.role });
            player.connection.send(ServerMessage::ResourceMap { seed, map: visible });
        }

        self.send_resources();
        self.announce_king_turn();
        Ok(())
    }

    fn announce_king_turn(&self) {
        self.send_to(Role::King, ServerMessage::KingTurnStart);
        self.send_to(
            Role::Bandit,
            ServerMessage::turn_status("The King is planning"),
        );
    }

    /// Sends `game_over` to everyone, telling each whether they won.
    pub fn announce_game_over(&self, winner: Role, reason: &str) {
        for player in &self.players {
            player.connection.send(ServerMessage::GameOver {
                winner,
                reason: reason.to_string(),
                am_i_winner: player.role == winner,
            });
        }
    }

    /// The delayed half of a round: runs once the theater pause is over.
    pub fn complete_round(&mut self, generation: u64) {
        let Some(end) = self.state.complete_round(generation) else {
            return;
        };

        self.send_resources();
        match end {
            RoundEnd::Finished(verdict) => {
                info!(
                    "Lobby {}: {:?} wins ({})",
                    self.id, verdict.winner, verdict.reason
                );
                self.announce_game_over(verdict.winner, &verdict.reason);
            }
            RoundEnd::NextRound(round_number) => {
                for player in &self.players {
                    player.connection.send(ServerMessage::NewRound {
                        round_number,
                        resources: self.state.resources_of(player.role),
                    });
                }
                self.announce_king_turn();
            }
        }
    }

    /// Detaches a connection. A match still in progress is reset to Setup and
    /// the remaining player waits for a replacement; a finished match is left
    /// as it is.
    pub fn detach(&mut self, id: ConnectionId) -> Option<Player> {
        let player = self.remove_player(id)?;
        info!("Connection {} left lobby {}", id, self.id);

        if self.state.is_in_progress() && !self.is_empty() {
            self.state.reset();
            for remaining in &mut self.players {
                remaining.role = Role::Unassigned;
            }
            self.broadcast(&ServerMessage::info(
                "Your opponent disconnected. Waiting for a new player to join.",
            ));
        }

        Some(player)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Phase;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn connection(id: u64) -> (Connection, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(ConnectionId(id), tx), rx)
    }

    fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = rx.try_recv() {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn test_hosted_lobby_seats_its_host() {
        let (host, _rx) = connection(7);
        let lobby = Lobby::hosted("H".to_string(), LobbyKind::Random, host);
        assert_eq!(lobby.len(), 1);
        assert!(!lobby.is_full());
        assert_eq!(lobby.role_of(ConnectionId(7)), Some(Role::Unassigned));
        assert_eq!(lobby.connection_ids(), vec![ConnectionId(7)]);
    }

    #[test]
    fn test_lobby_capacity() {
        let mut lobby = Lobby::new("ABC123".to_string(), LobbyKind::Private);
        let (a, _ra) = connection(1);
        let (b, _rb) = connection(2);
        let (c, _rc) = connection(3);

        assert!(lobby.add_player(a).is_ok());
        assert!(lobby.add_player(b).is_ok());
        assert!(lobby.is_full());
        assert_eq!(
            lobby.add_player(c),
            Err(GameError::SessionFull("ABC123".to_string()))
        );
        assert_eq!(lobby.len(), 2);
    }

    #[test]
    fn test_start_match_sends_role_specific_maps() {
        let mut lobby = Lobby::new("L".to_string(), LobbyKind::Private);
        let (king, mut king_rx) = connection(1);
        let (bandit, mut bandit_rx) = connection(2);
        lobby.add_player(king).unwrap();
        lobby.add_player(bandit).unwrap();

        lobby
            .start_match(ResourceMap::generate(3, 3), ConnectionId(1))
            .unwrap();
        assert_eq!(lobby.role_of(ConnectionId(1)), Some(Role::King));
        assert_eq!(lobby.role_of(ConnectionId(2)), Some(Role::Bandit));
        assert_eq!(lobby.state.phase(), Phase::KingPlanning);

        let king_messages = drain(&mut king_rx);
        assert_eq!(
            king_messages[0],
            ServerMessage::MatchCreated { role: Role::King }
        );
        let king_map = match &king_messages[1] {
            ServerMessage::ResourceMap { seed, map } => {
                assert_eq!(*seed, 3);
                assert_eq!(map.len(), 37);
                map.clone()
            }
            other => panic!("Unexpected message {:?}", other),
        };
        assert!(king_messages.contains(&ServerMessage::KingTurnStart));

        let bandit_messages = drain(&mut bandit_rx);
        match &bandit_messages[1] {
            ServerMessage::ResourceMap { seed, map } => {
                assert_eq!(map.len(), 7);
                assert!(map.iter().all(|a| a.field_type.is_reserved()));
                // The Bandit's seed must not rebuild the King's interior.
                assert_eq!(*seed, WITHHELD_SEED);
                assert_ne!(ResourceMap::generate(*seed, 3).assignments(), &king_map[..]);
            }
            other => panic!("Unexpected message {:?}", other),
        }
        assert!(!bandit_messages.contains(&ServerMessage::KingTurnStart));
    }

    #[test]
    fn test_detach_mid_match_resets_and_keeps_survivor() {
        let mut lobby = Lobby::new("L".to_string(), LobbyKind::Private);
        let (king, _king_rx) = connection(1);
        let (bandit, mut bandit_rx) = connection(2);
        lobby.add_player(king).unwrap();
        lobby.add_player(bandit).unwrap();
        lobby
            .start_match(ResourceMap::generate(3, 3), ConnectionId(1))
            .unwrap();
        drain(&mut bandit_rx);

        assert!(lobby.detach(ConnectionId(1)).is_some());
        assert_eq!(lobby.len(), 1);
        assert_eq!(lobby.state.phase(), Phase::Setup);
        assert_eq!(lobby.role_of(ConnectionId(2)), Some(Role::Unassigned));
        assert!(matches!(
            drain(&mut bandit_rx).as_slice(),
            [ServerMessage::Info { .. }]
        ));

        assert!(lobby.detach(ConnectionId(1)).is_none());
    }

    #[test]
    fn test_detach_after_game_over_keeps_state() {
        let mut lobby = Lobby::new("L".to_string(), LobbyKind::Private);
        let (king, _king_rx) = connection(1);
        let (bandit, _bandit_rx) = connection(2);
        lobby.add_player(king).unwrap();
        lobby.add_player(bandit).unwrap();
        lobby
            .start_match(ResourceMap::generate(3, 3), ConnectionId(1))
            .unwrap();
        lobby.state.quit(Role::Bandit).unwrap();

        lobby.detach(ConnectionId(2));
        assert!(lobby.state.is_game_over());
        assert_eq!(lobby.role_of(ConnectionId(1)), Some(Role::King));
    }

    #[test]
    fn test_send_to_closed_connection_is_harmless() {
        let (conn, rx) = connection(9);
        drop(rx);
        assert!(!conn.send(ServerMessage::info("hello")));
    }
}
