//! # King vs Bandit Game Server
//!
//! Authoritative server for a two-player, turn-based strategy game played on a
//! hexagonal resource map. The King sends workers along vertex paths from
//! resource fields towards the castle; the Bandit places ambushes on edges to
//! intercept them. The server owns every rule: clients only render.
//!
//! ## Architecture
//!
//! ### Transport (`network`)
//! WebSocket listener. Every connection gets a reader task that feeds text
//! frames to the router and a writer task that drains an unbounded outbox.
//!
//! ### Routing (`router`)
//! Decodes JSON envelopes into typed messages, dispatches them to the
//! registry or the sender's lobby and turns every fault into an `error` frame.
//!
//! ### Sessions (`registry`, `lobby`)
//! The registry maps lobby ids and connections to lobbies and pairs random
//! players first come, first served. Each lobby sits behind its own mutex, so
//! work in one match never waits on another.
//!
//! ### Rules (`game`, `resolver`, `victory`, `map_gen`)
//! The match state machine with its purchase ledger, the deterministic round
//! resolver, the win conditions and seeded map generation. None of these
//! know about sockets and all are tested in isolation.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = Server::bind("127.0.0.1:8080", ServerConfig::default()).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod game;
pub mod lobby;
pub mod map_gen;
pub mod network;
pub mod registry;
pub mod resolver;
pub mod router;
pub mod victory;
