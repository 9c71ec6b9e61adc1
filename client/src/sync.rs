//! Presence synchronization: merges relay events into the local registry
//!
//! The controller owns the transport session, the player registry and the
//! local participant id. It moves through three phases:
//!
//! - `Uninitialized`: handlers are registered but every inbound event is
//!   dropped. Events that arrive before the scene is ready are not queued.
//! - `Active`: inbound events mutate the registry; local moves are applied
//!   and emitted.
//! - `Terminated`: after [`SyncController::teardown`]. Absorbing.
//!
//! The relay may interleave join/move/leave events arbitrarily relative to
//! our own initialization, so each handler is defensive: joins are
//! idempotent, moves and leaves for unknown ids are dropped, and bulk
//! backfill never overwrites an entry that is already present.

use crate::registry::PlayerRegistry;
use crate::transport::{ConnectionState, Link, SubscriptionHandle, TransportSession};
use log::{debug, info, trace};
use shared::{Event, EventKind, Packet, ParticipantId, Position};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Uninitialized,
    Active,
    Terminated,
}

/// Names the controller method a subscription dispatches to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handler {
    Connected,
    Disconnected,
    CurrentPlayers,
    PlayerJoined,
    PlayerMoved,
    PlayerLeft,
}

const SUBSCRIPTIONS: [(EventKind, Handler); 6] = [
    (EventKind::Connect, Handler::Connected),
    (EventKind::Disconnect, Handler::Disconnected),
    (EventKind::CurrentPlayers, Handler::CurrentPlayers),
    (EventKind::NewPlayer, Handler::PlayerJoined),
    (EventKind::UpdatePlayer, Handler::PlayerMoved),
    (EventKind::PlayerDisconnected, Handler::PlayerLeft),
];

pub struct SyncController<L: Link> {
    session: TransportSession<L, Handler>,
    registry: PlayerRegistry,
    local_id: Option<ParticipantId>,
    phase: Phase,
    subscriptions: Vec<SubscriptionHandle>,
}

impl<L: Link> SyncController<L> {
    /// Takes ownership of `session` and subscribes to every relay event.
    pub fn new(mut session: TransportSession<L, Handler>) -> Self {
        let subscriptions = SUBSCRIPTIONS
            .iter()
            .map(|(kind, handler)| session.on(*kind, *handler))
            .collect();

        Self {
            session,
            registry: PlayerRegistry::new(),
            local_id: None,
            phase: Phase::Uninitialized,
            subscriptions,
        }
    }

    /// Initiates the relay connection. Returns immediately.
    pub fn connect(&mut self, endpoint: &str) {
        if self.phase == Phase::Terminated {
            debug!("connect after teardown ignored");
            return;
        }
        self.session.connect(endpoint);
    }

    /// Opens the scene-ready gate. Only the first call has an effect.
    pub fn mark_ready(&mut self) {
        if self.phase != Phase::Uninitialized {
            return;
        }
        self.phase = Phase::Active;
        // A `connect` that beat the gate was dropped; the session still
        // knows which id the relay gave us.
        if self.local_id.is_none() {
            self.local_id = self.session.local_id().cloned();
        }
        info!("Scene ready");
    }

    fn is_active(&self) -> bool {
        self.phase == Phase::Active
    }

    /// Delivers every event the session has queued since the last call.
    pub fn pump(&mut self) {
        if self.phase == Phase::Terminated {
            return;
        }

        for delivery in self.session.poll() {
            self.dispatch(delivery.handler, delivery.event);
        }
    }

    fn dispatch(&mut self, handler: Handler, event: Event) {
        match (handler, event) {
            (Handler::Connected, Event::Connect { id }) => self.on_connected(id),
            (Handler::Disconnected, Event::Disconnect { .. }) => self.on_disconnected(),
            (Handler::CurrentPlayers, Event::CurrentPlayers { players }) => {
                self.on_current_players(players)
            }
            (Handler::PlayerJoined, Event::NewPlayer { id, position }) => {
                self.on_player_joined(id, position)
            }
            (Handler::PlayerMoved, Event::UpdatePlayer { id, position }) => {
                self.on_player_moved(&id, position)
            }
            (Handler::PlayerLeft, Event::PlayerDisconnected { id }) => self.on_player_left(&id),
            (handler, event) => {
                debug!("{:?} cannot handle {} event", handler, event.kind());
            }
        }
    }

    pub fn on_connected(&mut self, local_id: ParticipantId) {
        if !self.is_active() {
            trace!("connect for {} before ready, dropped", local_id);
            return;
        }

        // Rejoining under a new id: the entries kept from the previous
        // connection are stale, and the relay follows up with a snapshot.
        if let Some(previous) = self.local_id.as_ref().filter(|prev| **prev != local_id) {
            info!(
                "Rejoined as {} (was {}), dropping {} stale participants",
                local_id,
                previous,
                self.registry.len()
            );
            self.registry.clear();
        }

        info!("Local participant is {}", local_id);
        self.local_id = Some(local_id);
    }

    /// The relay connection is gone. The registry and local id are kept
    /// until teardown; local moves keep applying but are no longer emitted.
    pub fn on_disconnected(&mut self) {
        if !self.is_active() {
            return;
        }
        info!(
            "Relay connection lost with {} participants known",
            self.registry.len()
        );
    }

    pub fn on_current_players(&mut self, snapshot: HashMap<ParticipantId, Position>) {
        if !self.is_active() {
            trace!("currentPlayers before ready, dropped");
            return;
        }

        let total = snapshot.len();
        let mut added = 0;
        for (id, position) in snapshot {
            if self.registry.insert_if_absent(id, position) {
                added += 1;
            }
        }
        debug!("Backfilled {} of {} participants", added, total);
    }

    pub fn on_player_joined(&mut self, id: ParticipantId, position: Position) {
        if !self.is_active() {
            trace!("newPlayer {} before ready, dropped", id);
            return;
        }

        let label = id.to_string();
        if self.registry.insert_if_absent(id, position) {
            debug!("Participant {} joined at ({}, {})", label, position.x, position.y);
        } else {
            debug!("Duplicate join for {} ignored", label);
        }
    }

    pub fn on_player_moved(&mut self, id: &ParticipantId, position: Position) {
        if !self.is_active() {
            return;
        }

        if !self.registry.update_existing(id, position) {
            debug!("Move for unknown participant {} dropped", id);
        }
    }

    pub fn on_player_left(&mut self, id: &ParticipantId) {
        if !self.is_active() {
            return;
        }

        if self.registry.remove(id) {
            debug!("Participant {} left", id);
        } else {
            debug!("Leave for unknown participant {} ignored", id);
        }
    }

    /// Applies `delta` to the local avatar immediately and, when connected,
    /// tells the relay the new absolute position. Returns the new position,
    /// or `None` if the local avatar has no registry entry yet.
    pub fn request_local_move(&mut self, delta: Position) -> Option<Position> {
        if !self.is_active() {
            return None;
        }

        let local_id = self.local_id.as_ref()?;
        let position = self.registry.offset(local_id, delta)?;

        if self.session.is_connected() {
            self.session.emit(Packet::PlayerMove {
                x: position.x,
                y: position.y,
            });
        }

        Some(position)
    }

    /// Unsubscribes, disconnects and clears all state. Safe to call in any
    /// phase and more than once.
    pub fn teardown(&mut self) {
        if self.phase == Phase::Terminated {
            return;
        }

        for handle in self.subscriptions.drain(..) {
            self.session.off(handle);
        }
        self.session.disconnect();
        self.registry.clear();
        self.local_id = None;
        self.phase = Phase::Terminated;
        info!("Sync controller torn down");
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn registry(&self) -> &PlayerRegistry {
        &self.registry
    }

    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.local_id.as_ref()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.session.state()
    }

    pub fn session(&self) -> &TransportSession<L, Handler> {
        &self.session
    }
}

impl<L: Link> Drop for SyncController<L> {
    fn drop(&mut self) {
        self.teardown();
    }
}
