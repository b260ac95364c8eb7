//! Lobby bookkeeping shared by every connection
//!
//! The registry owns the lobby table, the connection -> lobby index and the
//! queue of random lobbies still waiting for a second player. Its own mutex
//! is always taken before a lobby mutex, never the other way round.

use crate::error::GameError;
use crate::lobby::{Connection, ConnectionId, Lobby, LobbyId, LobbyKind};
use crate::map_gen::{fresh_seed, ResourceMap};
use log::{debug, info};
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::ServerMessage;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Mutex;

pub const LOBBY_ID_LENGTH: usize = 6;

pub type SharedLobby = Arc<Mutex<Lobby>>;

#[derive(Default)]
struct RegistryState {
    lobbies: HashMap<LobbyId, SharedLobby>,
    memberships: HashMap<ConnectionId, LobbyId>,
    random_queue: VecDeque<LobbyId>,
}

impl RegistryState {
    fn fresh_lobby_id(&self) -> LobbyId {
        loop {
            let id = generate_lobby_id();
            if !self.lobbies.contains_key(&id) {
                return id;
            }
        }
    }

    fn ensure_unattached(&self, id: ConnectionId) -> Result<(), GameError> {
        if self.memberships.contains_key(&id) {
            return Err(GameError::AlreadyInLobby);
        }
        Ok(())
    }

    fn open_lobby(&mut self, kind: LobbyKind, connection: Connection) -> LobbyId {
        let id = self.fresh_lobby_id();
        let conn_id = connection.id;
        let lobby = Lobby::hosted(id.clone(), kind, connection);

        self.lobbies.insert(id.clone(), Arc::new(Mutex::new(lobby)));
        self.memberships.insert(conn_id, id.clone());
        info!("Lobby {} created by connection {} ({:?})", id, conn_id, kind);
        id
    }
}

/// Six uppercase alphanumeric characters.
pub fn generate_lobby_id() -> LobbyId {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(LOBBY_ID_LENGTH)
        .map(|b| (b as char).to_ascii_uppercase())
        .collect()
}

/// Table of live lobbies, safe to share between connection tasks
pub struct SessionRegistry {
    map_radius: u32,
    state: Mutex<RegistryState>,
}

impl SessionRegistry {
    pub fn new(map_radius: u32) -> Self {
        Self {
            map_radius,
            state: Mutex::new(RegistryState::default()),
        }
    }

    pub async fn lobby_count(&self) -> usize {
        self.state.lock().await.lobbies.len()
    }

    pub async fn random_queue_len(&self) -> usize {
        self.state.lock().await.random_queue.len()
    }

    /// Lobby the connection currently sits in, if any.
    pub async fn lobby_of(&self, id: ConnectionId) -> Option<SharedLobby> {
        let state = self.state.lock().await;
        let lobby_id = state.memberships.get(&id)?;
        state.lobbies.get(lobby_id).cloned()
    }

    pub async fn lookup(&self, lobby_id: &str) -> Option<SharedLobby> {
        self.state.lock().await.lobbies.get(lobby_id).cloned()
    }

    /// Opens a private lobby and answers with `lobby_created`.
    pub async fn create_private(&self, connection: &Connection) -> Result<LobbyId, GameError> {
        let mut state = self.state.lock().await;
        state.ensure_unattached(connection.id)?;

        let id = state.open_lobby(LobbyKind::Private, connection.clone());
        connection.send(ServerMessage::LobbyCreated {
            lobby_id: id.clone(),
        });
        Ok(id)
    }

    /// Joins a lobby by id. The player already waiting there becomes the King.
    pub async fn join_by_id(&self, connection: &Connection, lobby_id: &str) -> Result<(), GameError> {
        let mut state = self.state.lock().await;
        state.ensure_unattached(connection.id)?;

        let lobby = state
            .lobbies
            .get(lobby_id)
            .cloned()
            .ok_or_else(|| GameError::SessionNotFound(lobby_id.to_string()))?;
        let mut lobby = lobby.lock().await;
        lobby.add_player(connection.clone())?;

        state.memberships.insert(connection.id, lobby.id.clone());
        state.random_queue.retain(|queued| queued != &lobby.id);
        drop(state);

        connection.send(ServerMessage::LobbyJoinedById {
            lobby_id: lobby.id.clone(),
            queued: false,
        });

        let waiting = lobby
            .connection_ids()
            .into_iter()
            .find(|id| *id != connection.id);
        if let Some(king) = waiting {
            self.start(&mut lobby, king)?;
        }
        Ok(())
    }

    /// Pairs the caller with the oldest random lobby still waiting, or opens
    /// a new one and queues it. Roles are dealt by coin flip.
    pub async fn join_random(&self, connection: &Connection) -> Result<LobbyId, GameError> {
        let mut state = self.state.lock().await;
        state.ensure_unattached(connection.id)?;

        while let Some(candidate) = state.random_queue.pop_front() {
            let Some(lobby) = state.lobbies.get(&candidate).cloned() else {
                continue;
            };
            let mut lobby = lobby.lock().await;
            if lobby.is_full() {
                continue;
            }
            lobby.add_player(connection.clone())?;
            state.memberships.insert(connection.id, candidate.clone());
            drop(state);

            lobby.broadcast(&ServerMessage::LobbyRandomlyJoined {
                lobby_id: candidate.clone(),
                queued: false,
            });

            let ids = lobby.connection_ids();
            let king = if rand::random::<bool>() {
                ids.first()
            } else {
                ids.last()
            };
            if let Some(&king) = king {
                self.start(&mut lobby, king)?;
            }
            return Ok(candidate);
        }

        let id = state.open_lobby(LobbyKind::Random, connection.clone());
        state.random_queue.push_back(id.clone());
        connection.send(ServerMessage::LobbyRandomlyJoined {
            lobby_id: id.clone(),
            queued: true,
        });
        Ok(id)
    }

    fn start(&self, lobby: &mut Lobby, king: ConnectionId) -> Result<(), GameError> {
        let map = ResourceMap::generate(fresh_seed(), self.map_radius);
        lobby.start_match(map, king)
    }

    /// Removes a connection from its lobby. Empty lobbies are destroyed; a
    /// random lobby left with one waiting player goes back into the queue.
    pub async fn detach(&self, id: ConnectionId) {
        let mut state = self.state.lock().await;
        let Some(lobby_id) = state.memberships.remove(&id) else {
            return;
        };
        let Some(lobby) = state.lobbies.get(&lobby_id).cloned() else {
            return;
        };
        let mut lobby = lobby.lock().await;
        lobby.detach(id);

        if lobby.is_empty() {
            state.lobbies.remove(&lobby_id);
            state.random_queue.retain(|queued| queued != &lobby_id);
            info!("Lobby {} closed", lobby_id);
            return;
        }

        let waiting = lobby.kind == LobbyKind::Random
            && !lobby.state.is_game_over()
            && !state.random_queue.contains(&lobby_id);
        if waiting {
            debug!("Lobby {} requeued for random matching", lobby_id);
            state.random_queue.push_back(lobby_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::Phase;
    use shared::Role;
    use tokio::sync::mpsc::{self, UnboundedReceiver};
    use tokio_test::{assert_err, assert_ok};

    fn connection(id: u64) -> (Connection, UnboundedReceiver<ServerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(ConnectionId(id), tx), rx)
    }

    #[test]
    fn test_lobby_id_format() {
        for _ in 0..50 {
            let id = generate_lobby_id();
            assert_eq!(id.len(), LOBBY_ID_LENGTH);
            assert!(id
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn test_private_lobby_flow() {
        let registry = SessionRegistry::new(3);
        let (host, mut host_rx) = connection(1);
        let (guest, mut guest_rx) = connection(2);

        let id = assert_ok!(registry.create_private(&host).await);
        assert_eq!(
            host_rx.try_recv().unwrap(),
            ServerMessage::LobbyCreated {
                lobby_id: id.clone()
            }
        );

        assert_ok!(registry.join_by_id(&guest, &id).await);
        assert_eq!(
            guest_rx.try_recv().unwrap(),
            ServerMessage::LobbyJoinedById {
                lobby_id: id.clone(),
                queued: false
            }
        );
        assert_eq!(
            host_rx.try_recv().unwrap(),
            ServerMessage::MatchCreated { role: Role::King }
        );
        assert_eq!(
            guest_rx.try_recv().unwrap(),
            ServerMessage::MatchCreated { role: Role::Bandit }
        );

        let lobby = registry.lookup(&id).await.unwrap();
        assert_eq!(lobby.lock().await.state.phase(), Phase::KingPlanning);
    }

    #[tokio::test]
    async fn test_join_errors() {
        let registry = SessionRegistry::new(3);
        let (a, _ra) = connection(1);
        let (b, _rb) = connection(2);
        let (c, _rc) = connection(3);

        assert_eq!(
            registry.join_by_id(&a, "NOPE00").await,
            Err(GameError::SessionNotFound("NOPE00".to_string()))
        );

        let id = registry.create_private(&a).await.unwrap();
        assert_eq!(
            registry.create_private(&a).await,
            Err(GameError::AlreadyInLobby)
        );
        assert_ok!(registry.join_by_id(&b, &id).await);
        let err = assert_err!(registry.join_by_id(&c, &id).await);
        assert_eq!(err, GameError::SessionFull(id.clone()));
        assert!(registry.lobby_of(ConnectionId(3)).await.is_none());
    }

    #[tokio::test]
    async fn test_random_matching_pairs_in_order() {
        let registry = SessionRegistry::new(3);
        let (a, mut ra) = connection(1);
        let (b, mut rb) = connection(2);
        let (c, mut rc) = connection(3);

        let first = registry.join_random(&a).await.unwrap();
        assert_eq!(
            ra.try_recv().unwrap(),
            ServerMessage::LobbyRandomlyJoined {
                lobby_id: first.clone(),
                queued: true
            }
        );
        assert_eq!(registry.random_queue_len().await, 1);

        let second = registry.join_random(&b).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(
            rb.try_recv().unwrap(),
            ServerMessage::LobbyRandomlyJoined {
                lobby_id: first.clone(),
                queued: false
            }
        );
        assert_eq!(registry.random_queue_len().await, 0);
        assert_eq!(
            ra.try_recv().unwrap(),
            ServerMessage::LobbyRandomlyJoined {
                lobby_id: first.clone(),
                queued: false
            }
        );

        let role_a = match ra.try_recv().unwrap() {
            ServerMessage::MatchCreated { role } => role,
            other => panic!("Unexpected message {:?}", other),
        };
        let role_b = match rb.try_recv().unwrap() {
            ServerMessage::MatchCreated { role } => role,
            other => panic!("Unexpected message {:?}", other),
        };
        assert_eq!(role_a.opponent(), role_b);

        let third = registry.join_random(&c).await.unwrap();
        assert_ne!(third, first);
        assert!(matches!(
            rc.try_recv().unwrap(),
            ServerMessage::LobbyRandomlyJoined { queued: true, .. }
        ));
    }

    #[tokio::test]
    async fn test_detach_destroys_empty_lobby() {
        let registry = SessionRegistry::new(3);
        let (a, _ra) = connection(1);

        registry.join_random(&a).await.unwrap();
        assert_eq!(registry.lobby_count().await, 1);

        registry.detach(ConnectionId(1)).await;
        assert_eq!(registry.lobby_count().await, 0);
        assert_eq!(registry.random_queue_len().await, 0);

        // Unknown connections are ignored.
        registry.detach(ConnectionId(99)).await;
    }

    #[tokio::test]
    async fn test_survivor_waits_and_rematches_as_king() {
        let registry = SessionRegistry::new(3);
        let (a, _ra) = connection(1);
        let (b, _rb) = connection(2);
        let (c, mut rc) = connection(3);

        let id = registry.create_private(&a).await.unwrap();
        registry.join_by_id(&b, &id).await.unwrap();

        registry.detach(ConnectionId(1)).await;
        {
            let lobby = registry.lookup(&id).await.unwrap();
            let lobby = lobby.lock().await;
            assert_eq!(lobby.state.phase(), Phase::Setup);
            assert_eq!(lobby.len(), 1);
        }

        registry.join_by_id(&c, &id).await.unwrap();
        let lobby = registry.lookup(&id).await.unwrap();
        let lobby = lobby.lock().await;
        assert_eq!(lobby.role_of(ConnectionId(2)), Some(Role::King));
        assert_eq!(lobby.role_of(ConnectionId(3)), Some(Role::Bandit));
        assert_eq!(lobby.state.phase(), Phase::KingPlanning);
        drop(lobby);

        rc.try_recv().unwrap();
        assert_eq!(
            rc.try_recv().unwrap(),
            ServerMessage::MatchCreated { role: Role::Bandit }
        );
    }

    #[tokio::test]
    async fn test_abandoned_random_lobby_is_requeued() {
        let registry = SessionRegistry::new(3);
        let (a, _ra) = connection(1);
        let (b, _rb) = connection(2);

        registry.join_random(&a).await.unwrap();
        registry.join_random(&b).await.unwrap();
        assert_eq!(registry.random_queue_len().await, 0);

        registry.detach(ConnectionId(2)).await;
        assert_eq!(registry.random_queue_len().await, 1);
    }
}
