//! # Presence Client Library
//!
//! Client side of the multiplayer presence layer. Every participant steers one
//! avatar in a shared 800x600 scene; the relay fans position changes out to
//! everyone else. This crate keeps the local picture of who is where and
//! decides what to tell the relay.
//!
//! ## Module Organization
//!
//! ### Sync Module (`sync`)
//! The protocol core. [`sync::SyncController`] consumes relay events, keeps
//! the [`registry::PlayerRegistry`] consistent under arbitrary interleavings
//! of join/move/leave, applies local moves optimistically and emits them.
//! Nothing is processed until the scene-ready gate opens, and nothing after
//! teardown.
//!
//! ### Transport Module (`transport`)
//! [`transport::TransportSession`] owns one relay connection: connection
//! state, the relay-assigned participant id, named-event subscriptions and
//! best-effort emission. It drives any [`transport::Link`].
//!
//! ### Network Module (`network`)
//! [`network::UdpLink`], the production link: bincode datagrams over UDP on a
//! background tokio runtime, with heartbeats and a silence timeout.
//!
//! ### Loopback Module (`loopback`)
//! An in-process link used to script relay traffic in tests. Only compiled
//! for unit tests or with the `test-util` feature.
//!
//! ### Input, Rendering and App Modules
//! The macroquad adapter: keyboard intent in, one rectangle per registry entry
//! out, and the frame loop that pumps the controller once per frame.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::network::UdpLink;
//! use client::sync::SyncController;
//! use client::transport::TransportSession;
//! use shared::Position;
//!
//! let mut sync = SyncController::new(TransportSession::new(UdpLink::new()));
//! sync.connect("127.0.0.1:3000");
//! sync.mark_ready();
//!
//! // Once per frame:
//! sync.pump();
//! sync.request_local_move(Position::new(2.0, 0.0));
//! for (id, pos) in sync.registry().iter() {
//!     println!("{} at ({}, {})", id, pos.x, pos.y);
//! }
//!
//! sync.teardown();
//! ```

pub mod app;
pub mod input;
#[cfg(any(test, feature = "test-util"))]
pub mod loopback;
pub mod network;
pub mod registry;
pub mod rendering;
pub mod sync;
pub mod transport;
