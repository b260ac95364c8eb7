//! JSON message envelopes exchanged over the game WebSocket
//!
//! Every frame is `{"type": <string>, "payload": <object>}`. Inbound frames are
//! decoded exactly once, at the connection boundary, into [`ClientMessage`];
//! nothing past that point looks at the `type` string again.

use crate::{
    AmbushEdge, FieldAssignment, HexCoord, PathSubmission, ResourceKind, Resources, Role,
    RoundReport,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("malformed message: {0}")]
    MalformedJson(String),
    #[error("unknown message type '{0}'")]
    UnknownType(String),
    #[error("invalid payload for '{kind}': {reason}")]
    InvalidPayload { kind: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinLobbyPayload {
    pub lobby_id: String,
}

/// Costs the client believes it is paying. The server keeps its own prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyWorkerPayload {
    #[serde(default)]
    pub grain_cost: Option<u32>,
    #[serde(default)]
    pub wood_cost: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpgradeWagonPayload {
    #[serde(default)]
    pub wood_cost: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceWorkersPayload {
    pub paths: Vec<PathSubmission>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePathPayload {
    #[serde(default)]
    pub is_wagon_worker: bool,
    #[serde(default)]
    pub path_index: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyAmbushPayload {
    #[serde(default)]
    pub cost: Option<u32>,
    #[serde(default)]
    pub resource_type: Option<ResourceKind>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceAmbushesPayload {
    pub ambushes: Vec<AmbushEdge>,
}

/// Messages a client may send
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum ClientMessage {
    #[serde(rename = "create_lobby")]
    CreateLobby,
    #[serde(rename = "join_lobbyById")]
    JoinLobbyById(JoinLobbyPayload),
    #[serde(rename = "join_random")]
    JoinRandom,
    #[serde(rename = "buy_worker")]
    BuyWorker(BuyWorkerPayload),
    #[serde(rename = "upgrade_worker_wagon")]
    UpgradeWorkerWagon(UpgradeWagonPayload),
    #[serde(rename = "place_workers")]
    PlaceWorkers(PlaceWorkersPayload),
    #[serde(rename = "delete_path")]
    DeletePath(DeletePathPayload),
    #[serde(rename = "buy_ambush")]
    BuyAmbush(BuyAmbushPayload),
    #[serde(rename = "delete_ambush")]
    DeleteAmbush,
    #[serde(rename = "place_ambushes")]
    PlaceAmbushes(PlaceAmbushesPayload),
    #[serde(rename = "quit_game")]
    QuitGame,
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

fn payload<T: DeserializeOwned>(kind: &str, payload: Value) -> Result<T, ProtocolError> {
    // Clients send `{}` or nothing at all for payload-less messages.
    let payload = if payload.is_null() {
        Value::Object(Default::default())
    } else {
        payload
    };
    serde_json::from_value(payload).map_err(|e| ProtocolError::InvalidPayload {
        kind: kind.to_string(),
        reason: e.to_string(),
    })
}

impl ClientMessage {
    /// Parses one text frame.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        let Envelope { kind, payload: body } =
            serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))?;

        let message = match kind.as_str() {
            "create_lobby" => ClientMessage::CreateLobby,
            "join_lobbyById" => ClientMessage::JoinLobbyById(payload(&kind, body)?),
            "join_random" => ClientMessage::JoinRandom,
            "buy_worker" => ClientMessage::BuyWorker(payload(&kind, body)?),
            "upgrade_worker_wagon" => ClientMessage::UpgradeWorkerWagon(payload(&kind, body)?),
            "place_workers" => ClientMessage::PlaceWorkers(payload(&kind, body)?),
            "delete_path" => ClientMessage::DeletePath(payload(&kind, body)?),
            "buy_ambush" => ClientMessage::BuyAmbush(payload(&kind, body)?),
            "delete_ambush" => ClientMessage::DeleteAmbush,
            "place_ambushes" => ClientMessage::PlaceAmbushes(payload(&kind, body)?),
            "quit_game" => ClientMessage::QuitGame,
            _ => return Err(ProtocolError::UnknownType(kind)),
        };

        Ok(message)
    }

    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Wire name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::CreateLobby => "create_lobby",
            ClientMessage::JoinLobbyById(_) => "join_lobbyById",
            ClientMessage::JoinRandom => "join_random",
            ClientMessage::BuyWorker(_) => "buy_worker",
            ClientMessage::UpgradeWorkerWagon(_) => "upgrade_worker_wagon",
            ClientMessage::PlaceWorkers(_) => "place_workers",
            ClientMessage::DeletePath(_) => "delete_path",
            ClientMessage::BuyAmbush(_) => "buy_ambush",
            ClientMessage::DeleteAmbush => "delete_ambush",
            ClientMessage::PlaceAmbushes(_) => "place_ambushes",
            ClientMessage::QuitGame => "quit_game",
        }
    }
}

/// Messages the server sends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload")]
pub enum ServerMessage {
    #[serde(rename = "lobby_created")]
    LobbyCreated { lobby_id: String },
    #[serde(rename = "lobby_joinedById")]
    LobbyJoinedById { lobby_id: String, queued: bool },
    #[serde(rename = "lobby_randomly_joined")]
    LobbyRandomlyJoined { lobby_id: String, queued: bool },
    #[serde(rename = "match_created")]
    MatchCreated { role: Role },
    #[serde(rename = "resource_map")]
    ResourceMap {
        seed: u64,
        map: Vec<FieldAssignment>,
    },
    #[serde(rename = "king_turn_start")]
    KingTurnStart,
    #[serde(rename = "bandit_turn_start")]
    BanditTurnStart {
        #[serde(rename = "workerLocations")]
        worker_locations: Vec<HexCoord>,
    },
    #[serde(rename = "turn_status")]
    TurnStatus { message: String },
    #[serde(rename = "worker_approved")]
    WorkerApproved {
        #[serde(rename = "purchasedWorkers")]
        purchased_workers: u32,
        #[serde(rename = "wagonWorkers")]
        wagon_workers: u32,
    },
    #[serde(rename = "worker_denied")]
    WorkerDenied { reason: String },
    #[serde(rename = "wagon_upgrade_approved")]
    WagonUpgradeApproved {
        #[serde(rename = "wagonWorkers")]
        wagon_workers: u32,
    },
    #[serde(rename = "wagon_upgrade_denied")]
    WagonUpgradeDenied { reason: String },
    #[serde(rename = "ambush_approved")]
    AmbushApproved {
        #[serde(rename = "resourceType")]
        resource_type: ResourceKind,
        #[serde(rename = "purchasedAmbushes")]
        purchased_ambushes: u32,
    },
    #[serde(rename = "ambush_denied")]
    AmbushDenied { reason: String },
    #[serde(rename = "delete_path_approved")]
    DeletePathApproved {
        #[serde(rename = "purchasedWorkers")]
        purchased_workers: u32,
        #[serde(rename = "wagonWorkers")]
        wagon_workers: u32,
    },
    #[serde(rename = "delete_ambush_approved")]
    DeleteAmbushApproved {
        #[serde(rename = "resourceType")]
        resource_type: ResourceKind,
        #[serde(rename = "purchasedAmbushes")]
        purchased_ambushes: u32,
    },
    #[serde(rename = "resource_update")]
    ResourceUpdate(Resources),
    #[serde(rename = "execute_round")]
    ExecuteRound(RoundReport),
    #[serde(rename = "new_round")]
    NewRound {
        #[serde(rename = "roundNumber")]
        round_number: u32,
        resources: Resources,
    },
    #[serde(rename = "game_over")]
    GameOver {
        winner: Role,
        reason: String,
        #[serde(rename = "amIWinner")]
        am_i_winner: bool,
    },
    #[serde(rename = "info")]
    Info { message: String },
    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerMessage {
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(|e| ProtocolError::MalformedJson(e.to_string()))
    }

    pub fn info(message: impl Into<String>) -> Self {
        ServerMessage::Info {
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
        }
    }

    pub fn turn_status(message: impl Into<String>) -> Self {
        ServerMessage::TurnStatus {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Corner, FieldType, HexVertex, OriginField};
    use serde_json::json;

    #[test]
    fn test_decode_payloadless_messages() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"create_lobby"}"#),
            Ok(ClientMessage::CreateLobby)
        );
        assert_eq!(
            ClientMessage::decode(r#"{"type":"quit_game","payload":{}}"#),
            Ok(ClientMessage::QuitGame)
        );
        assert_eq!(
            ClientMessage::decode(r#"{"type":"join_random","payload":null}"#),
            Ok(ClientMessage::JoinRandom)
        );
    }

    #[test]
    fn test_decode_join_by_id() {
        let msg =
            ClientMessage::decode(r#"{"type":"join_lobbyById","payload":{"lobby_id":"AB12CD"}}"#)
                .unwrap();
        assert_eq!(
            msg,
            ClientMessage::JoinLobbyById(JoinLobbyPayload {
                lobby_id: "AB12CD".to_string()
            })
        );
    }

    #[test]
    fn test_decode_buy_ambush_with_client_costs() {
        let msg = ClientMessage::decode(
            r#"{"type":"buy_ambush","payload":{"cost":12,"resourceType":"grain"}}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::BuyAmbush(p) => {
                assert_eq!(p.cost, Some(12));
                assert_eq!(p.resource_type, Some(ResourceKind::Grain));
            }
            other => panic!("Unexpected message {:?}", other),
        }
    }

    #[test]
    fn test_decode_errors() {
        assert!(matches!(
            ClientMessage::decode("not json"),
            Err(ProtocolError::MalformedJson(_))
        ));
        assert_eq!(
            ClientMessage::decode(r#"{"type":"teleport"}"#),
            Err(ProtocolError::UnknownType("teleport".to_string()))
        );
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"join_lobbyById","payload":{}}"#),
            Err(ProtocolError::InvalidPayload { .. })
        ));
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"place_workers","payload":{"paths":[{"vertices":5}]}}"#),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_decode_rejects_coordinates_out_of_range() {
        let ambush = |q: i64| {
            json!({
                "type": "place_ambushes",
                "payload": { "ambushes": [{
                    "cornerA": { "q": q, "r": 0, "direction": "NE" },
                    "cornerB": { "q": q, "r": 0, "direction": "N" },
                }]}
            })
            .to_string()
        };
        for q in [i64::from(i32::MAX), i64::from(i32::MIN)] {
            assert!(matches!(
                ClientMessage::decode(&ambush(q)),
                Err(ProtocolError::InvalidPayload { ref kind, .. }) if kind == "place_ambushes"
            ));
        }

        let workers = json!({
            "type": "place_workers",
            "payload": { "paths": [{
                "vertices": [
                    { "q": 2, "r": -1, "direction": "N" },
                    { "q": i32::MIN, "r": -1, "direction": "NW" },
                ],
                "originField": { "q": 2, "r": -1, "fieldType": "wood" },
                "isWagonWorker": false,
            }]}
        });
        assert!(matches!(
            ClientMessage::decode(&workers.to_string()),
            Err(ProtocolError::InvalidPayload { .. })
        ));

        let origin = json!({
            "type": "place_workers",
            "payload": { "paths": [{
                "vertices": [],
                "originField": { "q": i32::MAX, "r": 0, "fieldType": "wood" },
                "isWagonWorker": false,
            }]}
        });
        assert!(matches!(
            ClientMessage::decode(&origin.to_string()),
            Err(ProtocolError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_client_encode_decodes_back() {
        let messages = vec![
            ClientMessage::CreateLobby,
            ClientMessage::DeleteAmbush,
            ClientMessage::BuyWorker(BuyWorkerPayload {
                grain_cost: Some(20),
                wood_cost: Some(8),
            }),
            ClientMessage::PlaceWorkers(PlaceWorkersPayload {
                paths: vec![PathSubmission {
                    vertices: vec![
                        HexVertex::new(2, 0, Corner::NW),
                        HexVertex::new(2, 0, Corner::N),
                    ],
                    origin_field: OriginField {
                        q: 2,
                        r: 0,
                        field_type: FieldType::Ore,
                    },
                    is_wagon_worker: false,
                }],
            }),
            ClientMessage::PlaceAmbushes(PlaceAmbushesPayload {
                ambushes: vec![AmbushEdge::new(
                    HexVertex::new(0, 0, Corner::N),
                    HexVertex::new(0, 0, Corner::NE),
                )],
            }),
        ];

        for message in messages {
            let text = message.encode().unwrap();
            assert_eq!(ClientMessage::decode(&text).unwrap(), message);
        }
    }

    #[test]
    fn test_server_message_envelope_shape() {
        let value = serde_json::to_value(ServerMessage::GameOver {
            winner: Role::King,
            reason: "King collected 200 gold".to_string(),
            am_i_winner: true,
        })
        .unwrap();
        assert_eq!(
            value,
            json!({
                "type": "game_over",
                "payload": {"winner": "king", "reason": "King collected 200 gold", "amIWinner": true}
            })
        );

        let value = serde_json::to_value(ServerMessage::ResourceUpdate(Resources::new(1, 2, 3)))
            .unwrap();
        assert_eq!(
            value,
            json!({"type": "resource_update", "payload": {"gold": 1, "wood": 2, "grain": 3}})
        );

        let value = serde_json::to_value(ServerMessage::KingTurnStart).unwrap();
        assert_eq!(value, json!({"type": "king_turn_start"}));
    }

    #[test]
    fn test_server_message_decode() {
        let msg = ServerMessage::decode(
            r#"{"type":"bandit_turn_start","payload":{"workerLocations":[{"q":3,"r":-1}]}}"#,
        )
        .unwrap();
        assert_eq!(
            msg,
            ServerMessage::BanditTurnStart {
                worker_locations: vec![HexCoord::new(3, -1)]
            }
        );
    }
}
