//! Participant roster for the relay
//!
//! This module tracks every connected participant:
//! - Connection lifecycle (join, leave, timeout)
//! - Relay-assigned participant ids and spawn positions
//! - Last known avatar position, used to backfill newcomers
//! - Address lookup for routing inbound datagrams
//!
//! The relay never simulates anything; a position is stored exactly as the
//! owning client reported it.

use log::info;
use rand::distributions::Alphanumeric;
use rand::Rng;
use shared::{ParticipantId, Position, PLAYER_SIZE, WORLD_HEIGHT, WORLD_WIDTH};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

pub const PARTICIPANT_ID_LEN: usize = 20;

/// A connected participant as seen by the relay
#[derive(Debug)]
pub struct Client {
    /// Relay-assigned identifier, unique while the connection is live
    pub id: ParticipantId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Last position the client reported
    pub position: Position,
}

impl Client {
    pub fn new(id: ParticipantId, addr: SocketAddr, position: Position) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            position,
        }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Returns true if nothing has been heard from this client for longer
    /// than `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected participants
///
/// Enforces the capacity limit and guarantees id uniqueness among live
/// connections.
pub struct ClientManager {
    clients: HashMap<ParticipantId, Client>,
    max_clients: usize,
}

impl ClientManager {
    pub fn new(max_clients: usize) -> Self {
        Self {
            clients: HashMap::new(),
            max_clients,
        }
    }

    /// Registers a new participant at a random spawn point.
    ///
    /// Returns the assigned id and spawn position, or None if the relay is
    /// at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<(ParticipantId, Position)> {
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let mut rng = rand::thread_rng();
        let id = loop {
            let candidate = generate_id(&mut rng);
            if !self.clients.contains_key(&candidate) {
                break candidate;
            }
        };
        let position = random_spawn(&mut rng);

        info!("Participant {} connected from {}", id, addr);
        self.clients
            .insert(id.clone(), Client::new(id.clone(), addr, position));

        Some((id, position))
    }

    /// Removes a participant. Returns the removed entry, or None if they
    /// were already gone.
    pub fn remove_client(&mut self, id: &ParticipantId) -> Option<Client> {
        let client = self.clients.remove(id)?;
        info!("Participant {} disconnected", client.id);
        Some(client)
    }

    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<ParticipantId> {
        self.clients
            .values()
            .find(|client| client.addr == addr)
            .map(|client| client.id.clone())
    }

    /// Marks the participant as alive. Returns false for unknown ids.
    pub fn touch(&mut self, id: &ParticipantId) -> bool {
        match self.clients.get_mut(id) {
            Some(client) => {
                client.touch();
                true
            }
            None => false,
        }
    }

    /// Stores a reported position. Returns false for unknown ids.
    pub fn update_position(&mut self, id: &ParticipantId, position: Position) -> bool {
        match self.clients.get_mut(id) {
            Some(client) => {
                client.touch();
                client.position = position;
                true
            }
            None => false,
        }
    }

    pub fn position(&self, id: &ParticipantId) -> Option<Position> {
        self.clients.get(id).map(|client| client.position)
    }

    /// Every participant's last known position, as sent in `currentPlayers`.
    pub fn positions(&self) -> HashMap<ParticipantId, Position> {
        self.clients
            .iter()
            .map(|(id, client)| (id.clone(), client.position))
            .collect()
    }

    /// Removes and returns the ids of participants silent for longer than
    /// `timeout`.
    pub fn check_timeouts(&mut self, timeout: Duration) -> Vec<ParticipantId> {
        let timed_out: Vec<ParticipantId> = self
            .clients
            .values()
            .filter(|client| client.is_timed_out(timeout))
            .map(|client| client.id.clone())
            .collect();

        for id in &timed_out {
            self.clients.remove(id);
            info!("Participant {} timed out", id);
        }

        timed_out
    }

    pub fn get_client_addrs(&self) -> Vec<(ParticipantId, SocketAddr)> {
        self.clients
            .values()
            .map(|client| (client.id.clone(), client.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

fn generate_id<R: Rng>(rng: &mut R) -> ParticipantId {
    let id: String = rng
        .sample_iter(&Alphanumeric)
        .take(PARTICIPANT_ID_LEN)
        .map(char::from)
        .collect();
    ParticipantId(id)
}

/// Spawn points keep the whole avatar inside the scene.
fn random_spawn<R: Rng>(rng: &mut R) -> Position {
    let half = PLAYER_SIZE / 2.0;
    Position::new(
        rng.gen_range(half..WORLD_WIDTH - half),
        rng.gen_range(half..WORLD_HEIGHT - half),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:8080".parse().unwrap()
    }

    fn test_addr2() -> SocketAddr {
        "127.0.0.1:8081".parse().unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = Client::new(ParticipantId::new("p1"), test_addr(), Position::new(1.0, 2.0));
        assert_eq!(client.id, ParticipantId::new("p1"));
        assert_eq!(client.addr, test_addr());
        assert_eq!(client.position, Position::new(1.0, 2.0));
        assert!(!client.is_timed_out(Duration::from_secs(1)));
    }

    #[test]
    fn test_client_timeout() {
        let mut client = Client::new(ParticipantId::new("p1"), test_addr(), Position::default());
        client.last_seen = Instant::now() - Duration::from_secs(10);
        assert!(client.is_timed_out(Duration::from_secs(5)));

        client.touch();
        assert!(!client.is_timed_out(Duration::from_secs(5)));
    }

    #[test]
    fn test_add_client() {
        let mut manager = ClientManager::new(2);
        let (id, position) = manager.add_client(test_addr()).unwrap();

        assert_eq!(id.as_str().len(), PARTICIPANT_ID_LEN);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
        assert!(position.x >= PLAYER_SIZE / 2.0 && position.x <= WORLD_WIDTH - PLAYER_SIZE / 2.0);
        assert!(position.y >= PLAYER_SIZE / 2.0 && position.y <= WORLD_HEIGHT - PLAYER_SIZE / 2.0);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.position(&id), Some(position));
    }

    #[test]
    fn test_add_multiple_clients_get_distinct_ids() {
        let mut manager = ClientManager::new(2);
        let (id1, _) = manager.add_client(test_addr()).unwrap();
        let (id2, _) = manager.add_client(test_addr2()).unwrap();

        assert_ne!(id1, id2);
        assert_eq!(manager.len(), 2);
    }

    #[test]
    fn test_add_client_max_capacity() {
        let mut manager = ClientManager::new(1);
        assert!(manager.add_client(test_addr()).is_some());
        assert!(manager.add_client(test_addr2()).is_none());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_remove_client() {
        let mut manager = ClientManager::new(2);
        let (id, _) = manager.add_client(test_addr()).unwrap();

        let removed = manager.remove_client(&id).unwrap();
        assert_eq!(removed.addr, test_addr());
        assert!(manager.is_empty());
        assert!(manager.remove_client(&id).is_none());
    }

    #[test]
    fn test_find_client_by_addr() {
        let mut manager = ClientManager::new(2);
        let (id1, _) = manager.add_client(test_addr()).unwrap();
        let _ = manager.add_client(test_addr2()).unwrap();

        assert_eq!(manager.find_client_by_addr(test_addr()), Some(id1));

        let unknown_addr: SocketAddr = "192.168.1.1:9999".parse().unwrap();
        assert_eq!(manager.find_client_by_addr(unknown_addr), None);
    }

    #[test]
    fn test_update_position() {
        let mut manager = ClientManager::new(2);
        let (id, _) = manager.add_client(test_addr()).unwrap();

        assert!(manager.update_position(&id, Position::new(-20.0, 900.0)));
        assert_eq!(manager.position(&id), Some(Position::new(-20.0, 900.0)));
        assert!(!manager.update_position(&ParticipantId::new("ghost"), Position::default()));
    }

    #[test]
    fn test_positions_snapshot() {
        let mut manager = ClientManager::new(3);
        let (id1, pos1) = manager.add_client(test_addr()).unwrap();
        let (id2, pos2) = manager.add_client(test_addr2()).unwrap();

        let positions = manager.positions();
        assert_eq!(positions.len(), 2);
        assert_eq!(positions.get(&id1), Some(&pos1));
        assert_eq!(positions.get(&id2), Some(&pos2));
    }

    #[test]
    fn test_check_timeouts() {
        let mut manager = ClientManager::new(3);
        let (stale, _) = manager.add_client(test_addr()).unwrap();
        let (fresh, _) = manager.add_client(test_addr2()).unwrap();

        if let Some(client) = manager.clients.get_mut(&stale) {
            client.last_seen = Instant::now() - Duration::from_secs(10);
        }

        let timed_out = manager.check_timeouts(Duration::from_secs(5));
        assert_eq!(timed_out, vec![stale.clone()]);
        assert_eq!(manager.len(), 1);
        assert!(manager.touch(&fresh));
        assert!(!manager.touch(&stale));
    }
}
