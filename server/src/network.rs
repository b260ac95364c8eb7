//! WebSocket transport: accepts connections and pumps frames through the router
//!
//! Each connection gets two tasks. The reader decodes text frames and hands
//! them to the [`ProtocolRouter`] one at a time; the writer drains the
//! connection's outbox so game code never blocks on a slow socket.

use crate::config::ServerConfig;
use crate::lobby::{Connection, ConnectionId};
use crate::router::ProtocolRouter;
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::ServerMessage;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

pub type ServerError = Box<dyn std::error::Error + Send + Sync>;

/// Listening game server
pub struct Server {
    listener: TcpListener,
    router: ProtocolRouter,
    next_connection_id: u64,
}

impl Server {
    pub async fn bind(addr: &str, config: ServerConfig) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            router: ProtocolRouter::new(config),
            next_connection_id: 1,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn router(&self) -> &ProtocolRouter {
        &self.router
    }

    /// Accept loop. Only returns if the listener itself fails for good.
    pub async fn run(mut self) -> Result<(), ServerError> {
        info!(
            "Server started (theater delay {:?}, map radius {})",
            self.router.config().theater_delay,
            self.router.config().map_radius
        );

        loop {
            match self.listener.accept().await {
                Ok((stream, addr)) => {
                    let id = ConnectionId(self.next_connection_id);
                    self.next_connection_id += 1;

                    let router = self.router.clone();
                    tokio::spawn(async move {
                        handle_connection(stream, addr, id, router).await;
                    });
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, id: ConnectionId, router: ProtocolRouter) {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return;
        }
    };
    info!("Connection {} opened from {}", id, addr);

    let (mut write, mut read) = ws_stream.split();
    let (outbox, mut pending) = mpsc::unbounded_channel::<ServerMessage>();
    let connection = Connection::new(id, outbox);

    let writer = tokio::spawn(async move {
        while let Some(message) = pending.recv().await {
            let text = match message.encode() {
                Ok(text) => text,
                Err(e) => {
                    error!("Failed to encode message for connection {}: {}", id, e);
                    continue;
                }
            };
            if let Err(e) = write.send(Message::Text(text)).await {
                debug!("Write to connection {} failed: {}", id, e);
                break;
            }
        }
    });

    while let Some(frame) = read.next().await {
        match frame {
            Ok(Message::Text(text)) => router.handle_text(&connection, &text).await,
            Ok(Message::Binary(_)) => {
                connection.send(ServerMessage::error("binary frames are not supported"));
            }
            Ok(Message::Close(_)) => break,
            // Ping/pong is answered by tungstenite itself.
            Ok(_) => {}
            Err(e) => {
                warn!("Connection {} read error: {}", id, e);
                break;
            }
        }
    }

    router.disconnect(id).await;
    writer.abort();
    info!("Connection {} closed", id);
}
