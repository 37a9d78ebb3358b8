//! # Game Data Sync Server
//!
//! This library hosts lobbies of a multiplayer game and keeps the networked
//! objects of every lobby in sync. Clients own the simulation; the server
//! tracks who is in which game, who holds host authority, and which objects
//! exist, and relays object traffic to the rest of the lobby.
//!
//! ## Core Responsibilities
//!
//! ### Object Synchronization
//! GameData payloads carry spawns, despawns, state deltas and remote calls
//! for networked objects. The server decodes every sub-message, applies it
//! to its own copy of the object, checks that the sender was allowed to do
//! it, and forwards the untouched bytes to the other players.
//!
//! ### Host Authority
//! The first player in a game is its host. Only the host may spawn objects,
//! start or end a match, change privacy, or kick. When the host leaves,
//! authority moves to the longest-seated remaining player.
//!
//! ### Lobby Lifecycle
//! Games move through NotStarted, Started, Ended and Destroyed. Players that
//! rejoin after a match wait in limbo until the host is back, then are
//! re-synchronized.
//!
//! ## Module Organization
//!
//! - `network`: UDP front-end, session handshake, timeouts and routing of
//!   root messages to games.
//! - `client_manager`: connection directory and id assignment.
//! - `game_manager`: directory of running games and the observer hooks.
//! - `game`: per-game roster, lifecycle and the GameData dispatcher.
//! - `registry`: handle-indexed object arena with generation-checked keys.
//! - `net_objects`: the closed set of networked object kinds.
//! - `spawn_catalog`: prefab id to component list table.
//! - `config`: runtime settings.
//!
//! ## Concurrency
//!
//! Each game sits behind its own `tokio::sync::Mutex`. Game operations are
//! synchronous and record what they want sent in an [`game::Outbox`]; the
//! network layer sends after the lock is released, so a slow peer never
//! stalls a game.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::game_manager::LoggingObserver;
//! use server::network::Server;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         bind_addr: "0.0.0.0:22023".to_string(),
//!         ..ServerConfig::default()
//!     };
//!
//!     let mut server = Server::new(config, Arc::new(LoggingObserver)).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod config;
pub mod game;
pub mod game_manager;
pub mod net_objects;
pub mod network;
pub mod registry;
pub mod spawn_catalog;
