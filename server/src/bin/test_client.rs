//! Minimal scripted client for poking a running server by hand.
//!
//! Joins or creates a lobby, then finalizes every turn with nothing placed,
//! printing each frame it receives. Quits after `--rounds` rounds.

use clap::Parser;
use futures_util::{SinkExt, StreamExt};
use shared::protocol::{JoinLobbyPayload, PlaceAmbushesPayload, PlaceWorkersPayload};
use shared::{ClientMessage, ServerMessage};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server WebSocket URL
    #[clap(short, long, default_value = "ws://127.0.0.1:8080")]
    url: String,
    /// Join this lobby instead of creating one
    #[clap(short, long)]
    join: Option<String>,
    /// Use random matchmaking
    #[clap(short, long)]
    random: bool,
    /// Quit after this many rounds
    #[clap(long, default_value = "3")]
    rounds: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    println!("Connecting to {}", args.url);
    let (ws_stream, _) = connect_async(args.url.as_str()).await?;
    let (mut write, mut read) = ws_stream.split();

    let opening = match (&args.join, args.random) {
        (Some(lobby_id), _) => ClientMessage::JoinLobbyById(JoinLobbyPayload {
            lobby_id: lobby_id.clone(),
        }),
        (None, true) => ClientMessage::JoinRandom,
        (None, false) => ClientMessage::CreateLobby,
    };
    write.send(Message::Text(opening.encode()?)).await?;

    while let Some(frame) = read.next().await {
        let text = match frame? {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let message = match ServerMessage::decode(&text) {
            Ok(message) => message,
            Err(e) => {
                println!("Undecodable frame ({}): {}", e, text);
                continue;
            }
        };
        println!("<- {:?}", message);

        let reply = match message {
            ServerMessage::LobbyCreated { lobby_id } => {
                println!("Share this lobby id: {}", lobby_id);
                None
            }
            ServerMessage::KingTurnStart => Some(ClientMessage::PlaceWorkers(PlaceWorkersPayload {
                paths: Vec::new(),
            })),
            ServerMessage::BanditTurnStart { .. } => {
                Some(ClientMessage::PlaceAmbushes(PlaceAmbushesPayload {
                    ambushes: Vec::new(),
                }))
            }
            ServerMessage::NewRound { round_number, .. } if round_number > args.rounds => {
                Some(ClientMessage::QuitGame)
            }
            ServerMessage::GameOver { am_i_winner, .. } => {
                println!("{}", if am_i_winner { "Won" } else { "Lost" });
                break;
            }
            _ => None,
        };

        if let Some(reply) = reply {
            println!("-> {}", reply.kind());
            write.send(Message::Text(reply.encode()?)).await?;
        }
    }

    write.send(Message::Close(None)).await.ok();
    Ok(())
}
