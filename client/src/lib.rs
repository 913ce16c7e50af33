//! # Pixel Arena Sync Client
//!
//! This library keeps a local mirror of a remote, authoritative pixel-arena
//! game server and tells anyone who cares when that mirror changes. It is the
//! synchronization core only: drawing the map, moving a camera or reading the
//! mouse belong to whoever subscribes to its events.
//!
//! ## Architecture Overview
//!
//! The server speaks two dialects. Full snapshots of the game come back from
//! plain HTTP requests, while a WebSocket streams small pixel deltas as rounds
//! advance. The client merges both into one consistent view.
//!
//! ### Snapshots Win
//! A snapshot replaces the map, the players, the round and the phase in one
//! step. It is the recovery path after a reconnect or any suspected drift,
//! and applying the same snapshot twice changes nothing.
//!
//! ### Deltas Patch
//! A delta batch overwrites single cells in list order and moves the round
//! marker. Cells that fall outside the known map are dropped one by one; the
//! rest of the batch still lands. An optional guard refuses batches whose
//! round is behind the mirror.
//!
//! ### Apply, Then Emit
//! Every change is fully applied before its event goes out, so a handler
//! that reads the mirror never sees a half-applied update.
//!
//! ## Module Organization
//!
//! ### Events Module (`events`)
//! Typed, synchronous publish/subscribe hub:
//! - Closed set of event kinds
//! - Ordered delivery in subscription order
//! - Safe unsubscription while an event is being delivered
//!
//! ### Network Module (`network`)
//! The connection state machine and the session around it:
//! - WebSocket lifecycle for the observer and player feeds
//! - Frame decoding and translation into events
//! - The cooperative `run` loop multiplexing frames, HTTP responses and
//!   operator commands
//!
//! ### Game Module (`game`)
//! The state mirror and its reconciliation rules.
//!
//! ### Commands Module (`commands`)
//! Which commands the local player may issue this turn, and where.
//!
//! ### HTTP Module (`http`)
//! The `game-state`, `start` and `stop` endpoints.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::{ClientConfig, Role};
//! use client::events::{EventKind, GameEvent};
//! use client::network::{Client, SessionCommand};
//! use tokio::sync::mpsc;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new(ClientConfig::for_server("127.0.0.1:3000", Role::Observer));
//!
//!     client.events().subscribe(EventKind::Update, |event| {
//!         if let GameEvent::Update { round, changes } = event {
//!             println!("round {}: {} cells changed", round, changes.len());
//!         }
//!     });
//!
//!     client.connect().await?;
//!     client.sync().await?;
//!
//!     let (commands, rx) = mpsc::unbounded_channel();
//!     commands.send(SessionCommand::Start)?;
//!     client.run(rx).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Concurrency
//!
//! One client is one logical thread. Shared state lives in `Rc<RefCell<_>>`
//! and the session must run on a current-thread runtime or a `LocalSet`.
//! HTTP requests issued from the loop stay in flight while frames keep being
//! processed; each response is applied when it arrives.

pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod http;
pub mod network;

pub use error::{ClientError, Result};
