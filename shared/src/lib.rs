use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::ops::{Add, AddAssign};

pub const WORLD_WIDTH: f32 = 800.0;
pub const WORLD_HEIGHT: f32 = 600.0;
pub const PLAYER_SIZE: f32 = 40.0;
/// Scene units moved per frame while a direction key is held.
pub const PLAYER_SPEED: f32 = 2.0;
pub const CLIENT_VERSION: u32 = 1;

/// Opaque relay-assigned participant identifier.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ParticipantId(pub String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ParticipantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Avatar position in scene coordinates. Values outside the nominal
/// 800x600 scene are legal and are rendered as-is.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Default)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Position {
    type Output = Position;

    fn add(self, rhs: Position) -> Position {
        Position::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl AddAssign for Position {
    fn add_assign(&mut self, rhs: Position) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // client -> relay
    Connect {
        client_version: u32,
    },
    PlayerMove {
        x: f32,
        y: f32,
    },
    Disconnect,

    // both directions
    Heartbeat,

    // relay -> client
    Connected {
        id: ParticipantId,
    },
    Rejected {
        reason: String,
    },
    CurrentPlayers {
        players: HashMap<ParticipantId, Position>,
    },
    NewPlayer {
        id: ParticipantId,
        x: f32,
        y: f32,
    },
    UpdatePlayer {
        id: ParticipantId,
        pos: Position,
    },
    PlayerDisconnected {
        id: ParticipantId,
    },
}

impl Packet {
    /// Wire name of the event this packet carries.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Connect { .. } => "hello",
            Packet::PlayerMove { .. } => "playerMove",
            Packet::Disconnect => "goodbye",
            Packet::Heartbeat => "heartbeat",
            Packet::Connected { .. } => EventKind::Connect.name(),
            Packet::Rejected { .. } => EventKind::Disconnect.name(),
            Packet::CurrentPlayers { .. } => EventKind::CurrentPlayers.name(),
            Packet::NewPlayer { .. } => EventKind::NewPlayer.name(),
            Packet::UpdatePlayer { .. } => EventKind::UpdatePlayer.name(),
            Packet::PlayerDisconnected { .. } => EventKind::PlayerDisconnected.name(),
        }
    }

    pub fn encode(&self) -> bincode::Result<Vec<u8>> {
        bincode::serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> bincode::Result<Packet> {
        bincode::deserialize(bytes)
    }
}

/// Inbound event names a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Connect,
    Disconnect,
    CurrentPlayers,
    NewPlayer,
    UpdatePlayer,
    PlayerDisconnected,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::Connect => "connect",
            EventKind::Disconnect => "disconnect",
            EventKind::CurrentPlayers => "currentPlayers",
            EventKind::NewPlayer => "newPlayer",
            EventKind::UpdatePlayer => "updatePlayer",
            EventKind::PlayerDisconnected => "playerDisconnected",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Decoded inbound event as seen by subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Connect { id: ParticipantId },
    Disconnect { reason: String },
    CurrentPlayers { players: HashMap<ParticipantId, Position> },
    NewPlayer { id: ParticipantId, position: Position },
    UpdatePlayer { id: ParticipantId, position: Position },
    PlayerDisconnected { id: ParticipantId },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::Connect { .. } => EventKind::Connect,
            Event::Disconnect { .. } => EventKind::Disconnect,
            Event::CurrentPlayers { .. } => EventKind::CurrentPlayers,
            Event::NewPlayer { .. } => EventKind::NewPlayer,
            Event::UpdatePlayer { .. } => EventKind::UpdatePlayer,
            Event::PlayerDisconnected { .. } => EventKind::PlayerDisconnected,
        }
    }
}

impl TryFrom<Packet> for Event {
    type Error = Packet;

    /// Maps relay->client packets onto subscriber events. Packets that are
    /// not subscribable (client->relay traffic, keep-alives) are handed back.
    fn try_from(packet: Packet) -> Result<Self, Self::Error> {
        match packet {
            Packet::Connected { id } => Ok(Event::Connect { id }),
            Packet::Rejected { reason } => Ok(Event::Disconnect { reason }),
            Packet::CurrentPlayers { players } => Ok(Event::CurrentPlayers { players }),
            Packet::NewPlayer { id, x, y } => Ok(Event::NewPlayer {
                id,
                position: Position::new(x, y),
            }),
            Packet::UpdatePlayer { id, pos } => Ok(Event::UpdatePlayer { id, position: pos }),
            Packet::PlayerDisconnected { id } => Ok(Event::PlayerDisconnected { id }),
            other => Err(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_position_add() {
        let mut pos = Position::new(10.0, 20.0);
        pos += Position::new(-2.0, 2.0);
        assert_approx_eq!(pos.x, 8.0);
        assert_approx_eq!(pos.y, 22.0);

        let moved = pos + Position::new(1.5, 0.0);
        assert_approx_eq!(moved.x, 9.5);
    }

    #[test]
    fn test_position_out_of_bounds_is_finite() {
        let pos = Position::new(-50.0, WORLD_HEIGHT + 100.0);
        assert!(pos.is_finite());
        assert!(!Position::new(f32::NAN, 0.0).is_finite());
    }

    #[test]
    fn test_participant_id_display() {
        let id = ParticipantId::new("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_str(), "abc123");
        assert_eq!(ParticipantId::from("abc123"), id);
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Packet::PlayerMove { x: 0.0, y: 0.0 }.name(), "playerMove");
        assert_eq!(
            Packet::UpdatePlayer {
                id: "a".into(),
                pos: Position::default()
            }
            .name(),
            "updatePlayer"
        );
        assert_eq!(
            Packet::PlayerDisconnected { id: "a".into() }.name(),
            "playerDisconnected"
        );
        assert_eq!(EventKind::CurrentPlayers.to_string(), "currentPlayers");
        assert_eq!(EventKind::NewPlayer.name(), "newPlayer");
    }

    #[test]
    fn test_packet_serialization_current_players() {
        let mut players = HashMap::new();
        players.insert(ParticipantId::new("p1"), Position::new(10.0, 20.0));
        players.insert(ParticipantId::new("p2"), Position::new(300.0, 400.0));

        let packet = Packet::CurrentPlayers { players };
        let bytes = packet.encode().unwrap();
        let decoded = Packet::decode(&bytes).unwrap();

        match decoded {
            Packet::CurrentPlayers { players } => {
                assert_eq!(players.len(), 2);
                assert_eq!(
                    players.get(&ParticipantId::new("p1")),
                    Some(&Position::new(10.0, 20.0))
                );
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_decode_garbage_fails() {
        assert!(Packet::decode(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }

    #[test]
    fn test_event_from_new_player_packet() {
        let event = Event::try_from(Packet::NewPlayer {
            id: "p2".into(),
            x: 3.0,
            y: 4.0,
        })
        .unwrap();

        assert_eq!(event.kind(), EventKind::NewPlayer);
        assert_eq!(
            event,
            Event::NewPlayer {
                id: "p2".into(),
                position: Position::new(3.0, 4.0),
            }
        );
    }

    #[test]
    fn test_event_from_rejected_is_disconnect() {
        let event = Event::try_from(Packet::Rejected {
            reason: "Relay full".to_string(),
        })
        .unwrap();
        assert_eq!(event.kind(), EventKind::Disconnect);
    }

    #[test]
    fn test_outbound_packets_are_not_events() {
        assert!(Event::try_from(Packet::PlayerMove { x: 1.0, y: 1.0 }).is_err());
        assert!(Event::try_from(Packet::Heartbeat).is_err());
        assert!(Event::try_from(Packet::Connect { client_version: 1 }).is_err());
    }
}
