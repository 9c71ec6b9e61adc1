//! # Presence Relay Library
//!
//! The relay is the central process every presence client talks to. It does
//! no simulation: it assigns participant ids, remembers each participant's
//! last reported position so newcomers can be backfilled, and fans events out
//! to everyone else.
//!
//! ## Wire Contract
//!
//! | Inbound from a client | Relay reaction |
//! |---|---|
//! | `Connect` | reply `Connected { id }`, then `CurrentPlayers`; broadcast `NewPlayer` to the others |
//! | `PlayerMove { x, y }` | store it; broadcast `UpdatePlayer` to the others |
//! | `Heartbeat` | refresh liveness; reply `Heartbeat` |
//! | `Disconnect` or silence past the timeout | broadcast `PlayerDisconnected` |
//!
//! A full relay or an unknown client version answers `Rejected`.
//!
//! ## Architecture
//!
//! A single relay loop handles every inbound packet in arrival order, so the
//! events a given client observes are causally ordered per sender. Internal
//! tokio tasks do the I/O:
//! - **Network Receiver**: decodes datagrams and forwards them to the loop
//! - **Network Sender**: drains the outbound queue, expanding broadcasts
//! - **Timeout Checker**: evicts silent participants
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut relay = Server::new("127.0.0.1:3000", 32, Duration::from_secs(5)).await?;
//!     relay.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod network;
