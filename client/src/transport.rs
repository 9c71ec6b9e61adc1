//! Transport session: one relay connection with named-event subscriptions
//!
//! The session sits between a [`Link`] (the raw datagram connection) and the
//! code that reacts to relay events. It owns the connection state machine
//! (`Disconnected -> Connecting -> Connected`), remembers the participant id
//! the relay assigned, and fans each inbound event out to every subscription
//! registered for that event name.
//!
//! Delivery is pull-based to fit the single-threaded frame loop: [`poll`]
//! drains whatever the link has queued and returns one [`Delivery`] per
//! (event, matching subscription) pair. Events keep their receipt order; for
//! a single event, subscriptions are visited in registration order.
//!
//! Outbound traffic is best-effort. [`emit`] silently drops packets unless the
//! session is connected, since a stale position is worthless once a newer one
//! exists.
//!
//! [`poll`]: TransportSession::poll
//! [`emit`]: TransportSession::emit

use log::{debug, info, trace, warn};
use shared::{Event, EventKind, Packet, ParticipantId, CLIENT_VERSION};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("invalid relay endpoint {0:?}")]
    InvalidEndpoint(String),
    #[error("link is not open")]
    NotOpen,
    #[error("relay unreachable: {0}")]
    Unreachable(String),
    #[error("failed to encode {event} packet: {source}")]
    Encode {
        event: &'static str,
        #[source]
        source: bincode::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What a link hands back to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkEvent {
    Packet(Packet),
    /// The link gave up on the relay (socket error, keep-alive timeout).
    Lost { reason: String },
}

/// Underlying bidirectional connection driven by a [`TransportSession`].
///
/// Implementations must never block: `open` only starts connecting and
/// `try_recv` returns `None` when nothing is queued.
pub trait Link {
    fn open(&mut self, endpoint: &str) -> Result<(), TransportError>;
    fn send(&mut self, packet: &Packet) -> Result<(), TransportError>;
    fn try_recv(&mut self) -> Option<LinkEvent>;
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(u64);

struct Subscription<H> {
    handle: SubscriptionHandle,
    kind: EventKind,
    handler: H,
}

/// One event routed to one subscription.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery<H> {
    pub handle: SubscriptionHandle,
    pub handler: H,
    pub event: Event,
}

pub struct TransportSession<L: Link, H> {
    link: L,
    state: ConnectionState,
    local_id: Option<ParticipantId>,
    subscriptions: Vec<Subscription<H>>,
    next_handle: u64,
}

impl<L: Link, H: Clone> TransportSession<L, H> {
    pub fn new(link: L) -> Self {
        Self {
            link,
            state: ConnectionState::Disconnected,
            local_id: None,
            subscriptions: Vec::new(),
            next_handle: 1,
        }
    }

    /// Starts connecting to `endpoint` and returns immediately. The outcome
    /// arrives later as a `connect` or `disconnect` event.
    pub fn connect(&mut self, endpoint: &str) {
        if self.state != ConnectionState::Disconnected {
            debug!("connect({}) ignored while {:?}", endpoint, self.state);
            return;
        }

        info!("Connecting to relay at {}", endpoint);
        self.state = ConnectionState::Connecting;

        if let Err(e) = self.link.open(endpoint) {
            warn!("Failed to open link to {}: {}", endpoint, e);
            self.state = ConnectionState::Disconnected;
            return;
        }

        let hello = Packet::Connect {
            client_version: CLIENT_VERSION,
        };
        if let Err(e) = self.link.send(&hello) {
            warn!("Failed to send hello to {}: {}", endpoint, e);
            self.link.close();
            self.state = ConnectionState::Disconnected;
        }
    }

    /// Registers `handler` for `kind` and returns the handle to remove it with.
    pub fn on(&mut self, kind: EventKind, handler: H) -> SubscriptionHandle {
        let handle = SubscriptionHandle(self.next_handle);
        self.next_handle += 1;
        self.subscriptions.push(Subscription {
            handle,
            kind,
            handler,
        });
        trace!("Subscribed {:?} to {}", handle, kind);
        handle
    }

    /// Removes a subscription. Unknown or already-removed handles are ignored.
    pub fn off(&mut self, handle: SubscriptionHandle) {
        self.subscriptions.retain(|sub| sub.handle != handle);
    }

    /// Sends `packet` if connected, otherwise drops it.
    pub fn emit(&mut self, packet: Packet) {
        if self.state != ConnectionState::Connected {
            debug!("Dropping {} while {:?}", packet.name(), self.state);
            return;
        }

        if let Err(e) = self.link.send(&packet) {
            warn!("Failed to send {}: {}", packet.name(), e);
        }
    }

    pub fn disconnect(&mut self) {
        if self.state == ConnectionState::Disconnected {
            return;
        }

        if self.state == ConnectionState::Connected {
            if let Err(e) = self.link.send(&Packet::Disconnect) {
                debug!("Failed to send goodbye: {}", e);
            }
        }

        self.link.close();
        self.state = ConnectionState::Disconnected;
        self.local_id = None;
        info!("Disconnected from relay");
    }

    /// Drains the link and returns every delivery due, in receipt order.
    pub fn poll(&mut self) -> Vec<Delivery<H>> {
        let mut deliveries = Vec::new();

        while self.state != ConnectionState::Disconnected {
            let Some(link_event) = self.link.try_recv() else {
                break;
            };

            let event = match link_event {
                LinkEvent::Packet(packet) => match Event::try_from(packet) {
                    Ok(event) => event,
                    Err(other) => {
                        trace!("Ignoring {} packet", other.name());
                        continue;
                    }
                },
                LinkEvent::Lost { reason } => Event::Disconnect { reason },
            };

            if self.apply_transition(&event) {
                self.route(event, &mut deliveries);
            }
        }

        deliveries
    }

    /// Updates connection state for transport-level events. Returns false if
    /// the event should not reach subscribers.
    fn apply_transition(&mut self, event: &Event) -> bool {
        match event {
            Event::Connect { id } => {
                if self.state == ConnectionState::Connected {
                    debug!("Duplicate connect for {} ignored", id);
                    return false;
                }
                info!("Connected to relay as {}", id);
                self.state = ConnectionState::Connected;
                self.local_id = Some(id.clone());
                true
            }
            Event::Disconnect { reason } => {
                warn!("Connection to relay lost: {}", reason);
                self.link.close();
                self.state = ConnectionState::Disconnected;
                self.local_id = None;
                true
            }
            _ => true,
        }
    }

    fn route(&self, event: Event, deliveries: &mut Vec<Delivery<H>>) {
        let kind = event.kind();
        let mut matched = false;

        for sub in self.subscriptions.iter().filter(|sub| sub.kind == kind) {
            matched = true;
            deliveries.push(Delivery {
                handle: sub.handle,
                handler: sub.handler.clone(),
                event: event.clone(),
            });
        }

        if !matched {
            trace!("No subscribers for {}", kind);
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn local_id(&self) -> Option<&ParticipantId> {
        self.local_id.as_ref()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }
}
