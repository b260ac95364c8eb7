//! Routes decoded client messages to the registry or to the sender's lobby
//!
//! Every fault a client can cause comes back as a [`GameError`] and is sent
//! to that client alone as an `error` frame. Nothing here panics on input.

use crate::config::ServerConfig;
use crate::error::GameError;
use crate::game::Purchase;
use crate::lobby::{Connection, ConnectionId, Lobby};
use crate::registry::{SessionRegistry, SharedLobby};
use log::{debug, info, warn};
use shared::{ClientMessage, Role, ServerMessage};
use std::sync::Arc;

#[derive(Clone)]
pub struct ProtocolRouter {
    registry: Arc<SessionRegistry>,
    config: ServerConfig,
}

impl ProtocolRouter {
    pub fn new(config: ServerConfig) -> Self {
        let registry = Arc::new(SessionRegistry::new(config.map_radius));
        Self { registry, config }
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Decodes one text frame and handles it, answering faults with `error`.
    pub async fn handle_text(&self, connection: &Connection, text: &str) {
        let result = match ClientMessage::decode(text) {
            Ok(message) => self.handle(connection, message).await,
            Err(err) => Err(err.into()),
        };

        if let Err(err) = result {
            warn!("Connection {}: {}", connection.id, err);
            connection.send(ServerMessage::error(err.to_string()));
        }
    }

    pub async fn handle(&self, connection: &Connection, message: ClientMessage) -> Result<(), GameError> {
        debug!("Connection {} sent {}", connection.id, message.kind());

        match message {
            ClientMessage::CreateLobby => {
                self.registry.create_private(connection).await?;
                Ok(())
            }
            ClientMessage::JoinLobbyById(payload) => {
                self.registry
                    .join_by_id(connection, payload.lobby_id.trim())
                    .await
            }
            ClientMessage::JoinRandom => {
                self.registry.join_random(connection).await?;
                Ok(())
            }
            message => {
                let lobby = self
                    .registry
                    .lobby_of(connection.id)
                    .await
                    .ok_or(GameError::NotInLobby)?;
                self.handle_in_lobby(connection, &lobby, message).await
            }
        }
    }

    async fn handle_in_lobby(
        &self,
        connection: &Connection,
        shared_lobby: &SharedLobby,
        message: ClientMessage,
    ) -> Result<(), GameError> {
        let mut lobby = shared_lobby.lock().await;
        let role = lobby.role_of(connection.id).unwrap_or(Role::Unassigned);

        match message {
            ClientMessage::BuyWorker(_) => {
                match lobby.state.buy_worker(role)? {
                    Purchase::Approved(counts) => {
                        connection.send(ServerMessage::WorkerApproved {
                            purchased_workers: counts.purchased,
                            wagon_workers: counts.wagon,
                        });
                        send_resources(connection, &lobby, role);
                    }
                    Purchase::Denied(reason) => {
                        connection.send(ServerMessage::WorkerDenied { reason });
                    }
                }
            }
            ClientMessage::UpgradeWorkerWagon(_) => {
                match lobby.state.upgrade_worker_to_wagon(role)? {
                    Purchase::Approved(counts) => {
                        connection.send(ServerMessage::WagonUpgradeApproved {
                            wagon_workers: counts.wagon,
                        });
                        send_resources(connection, &lobby, role);
                    }
                    Purchase::Denied(reason) => {
                        connection.send(ServerMessage::WagonUpgradeDenied { reason });
                    }
                }
            }
            ClientMessage::DeletePath(payload) => {
                if let Some(index) = payload.path_index {
                    debug!("Connection {} deleted drafted path {}", connection.id, index);
                }
                let counts = lobby.state.delete_path(role, payload.is_wagon_worker)?;
                connection.send(ServerMessage::DeletePathApproved {
                    purchased_workers: counts.purchased,
                    wagon_workers: counts.wagon,
                });
                send_resources(connection, &lobby, role);
            }
            ClientMessage::BuyAmbush(payload) => match lobby.state.buy_ambush(role)? {
                Purchase::Approved(receipt) => {
                    if payload.resource_type.is_some_and(|kind| kind != receipt.paid_with) {
                        debug!(
                            "Connection {} asked to pay with {:?}, charged {:?}",
                            connection.id, payload.resource_type, receipt.paid_with
                        );
                    }
                    connection.send(ServerMessage::AmbushApproved {
                        resource_type: receipt.paid_with,
                        purchased_ambushes: receipt.purchased,
                    });
                    send_resources(connection, &lobby, role);
                }
                Purchase::Denied(reason) => {
                    connection.send(ServerMessage::AmbushDenied { reason });
                }
            },
            ClientMessage::DeleteAmbush => {
                let receipt = lobby.state.delete_ambush(role)?;
                connection.send(ServerMessage::DeleteAmbushApproved {
                    resource_type: receipt.paid_with,
                    purchased_ambushes: receipt.purchased,
                });
                send_resources(connection, &lobby, role);
            }
            ClientMessage::PlaceWorkers(payload) => {
                let worker_locations = lobby.state.submit_paths(role, payload.paths)?;
                info!(
                    "Lobby {}: King sent {} workers in round {}",
                    lobby.id,
                    worker_locations.len(),
                    lobby.state.round_number()
                );
                lobby.send_to(Role::Bandit, ServerMessage::BanditTurnStart { worker_locations });
                lobby.send_to(
                    Role::King,
                    ServerMessage::turn_status("The Bandit is planning"),
                );
            }
            ClientMessage::PlaceAmbushes(payload) => {
                let report = lobby.state.submit_ambushes(role, payload.ambushes)?;
                lobby.broadcast(&ServerMessage::ExecuteRound(report));
                self.schedule_round_end(Arc::clone(shared_lobby), lobby.state.generation());
            }
            ClientMessage::QuitGame => {
                let verdict = lobby.state.quit(role)?;
                info!("Lobby {}: {:?} quit", lobby.id, role);
                lobby.announce_game_over(verdict.winner, &verdict.reason);
            }
            ClientMessage::CreateLobby | ClientMessage::JoinLobbyById(_) | ClientMessage::JoinRandom => {
                return Err(GameError::AlreadyInLobby);
            }
        }
        Ok(())
    }

    /// Finishes the round once clients have had time to play back the result.
    fn schedule_round_end(&self, lobby: SharedLobby, generation: u64) {
        let delay = self.config.theater_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            lobby.lock().await.complete_round(generation);
        });
    }

    /// Called once the transport is gone.
    pub async fn disconnect(&self, id: ConnectionId) {
        self.registry.detach(id).await;
    }
}

fn send_resources(connection: &Connection, lobby: &Lobby, role: Role) {
    connection.send(ServerMessage::ResourceUpdate(lobby.state.resources_of(role)));
}
