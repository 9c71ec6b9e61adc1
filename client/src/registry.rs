//! Local view of every participant's avatar position

use shared::{ParticipantId, Position};
use std::collections::HashMap;

/// Participant id -> position, as currently believed by the sync controller.
///
/// Mutation is crate-private: only [`crate::sync::SyncController`] writes to
/// the registry. Renderers borrow it immutably for the duration of a frame.
#[derive(Debug, Clone, Default)]
pub struct PlayerRegistry {
    players: HashMap<ParticipantId, Position>,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self {
            players: HashMap::new(),
        }
    }

    /// Inserts `position` for `id` unless an entry already exists.
    /// Returns true if the entry was created.
    pub(crate) fn insert_if_absent(&mut self, id: ParticipantId, position: Position) -> bool {
        if self.players.contains_key(&id) {
            return false;
        }
        self.players.insert(id, position);
        true
    }

    /// Overwrites the position of an existing entry. Unknown ids are left
    /// absent and false is returned.
    pub(crate) fn update_existing(&mut self, id: &ParticipantId, position: Position) -> bool {
        match self.players.get_mut(id) {
            Some(current) => {
                *current = position;
                true
            }
            None => false,
        }
    }

    /// Applies `delta` to an existing entry and returns the new position.
    pub(crate) fn offset(&mut self, id: &ParticipantId, delta: Position) -> Option<Position> {
        let current = self.players.get_mut(id)?;
        *current += delta;
        Some(*current)
    }

    pub(crate) fn remove(&mut self, id: &ParticipantId) -> bool {
        self.players.remove(id).is_some()
    }

    pub(crate) fn clear(&mut self) {
        self.players.clear();
    }

    pub fn get(&self, id: &ParticipantId) -> Option<Position> {
        self.players.get(id).copied()
    }

    pub fn contains(&self, id: &ParticipantId) -> bool {
        self.players.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ParticipantId, &Position)> {
        self.players.iter()
    }

    /// Owned copy of all entries, sorted by id so frames draw in a stable order.
    pub fn snapshot(&self) -> Vec<(ParticipantId, Position)> {
        let mut entries: Vec<(ParticipantId, Position)> = self
            .players
            .iter()
            .map(|(id, pos)| (id.clone(), *pos))
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    fn id(s: &str) -> ParticipantId {
        ParticipantId::new(s)
    }

    #[test]
    fn test_insert_if_absent_keeps_first_writer() {
        let mut registry = PlayerRegistry::new();
        assert!(registry.insert_if_absent(id("p1"), Position::new(1.0, 2.0)));
        assert!(!registry.insert_if_absent(id("p1"), Position::new(9.0, 9.0)));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get(&id("p1")), Some(Position::new(1.0, 2.0)));
    }

    #[test]
    fn test_update_existing_ignores_unknown() {
        let mut registry = PlayerRegistry::new();
        assert!(!registry.update_existing(&id("ghost"), Position::new(1.0, 1.0)));
        assert!(registry.is_empty());

        registry.insert_if_absent(id("p1"), Position::new(0.0, 0.0));
        assert!(registry.update_existing(&id("p1"), Position::new(5.0, 6.0)));
        assert_eq!(registry.get(&id("p1")), Some(Position::new(5.0, 6.0)));
    }

    #[test]
    fn test_offset() {
        let mut registry = PlayerRegistry::new();
        assert_eq!(registry.offset(&id("p1"), Position::new(2.0, 0.0)), None);
        assert!(registry.is_empty());

        registry.insert_if_absent(id("p1"), Position::new(100.0, 100.0));
        let moved = registry.offset(&id("p1"), Position::new(-2.0, 2.0)).unwrap();
        assert_approx_eq!(moved.x, 98.0);
        assert_approx_eq!(moved.y, 102.0);
        assert_eq!(registry.get(&id("p1")), Some(moved));
    }

    #[test]
    fn test_remove_and_clear() {
        let mut registry = PlayerRegistry::new();
        registry.insert_if_absent(id("p1"), Position::default());
        registry.insert_if_absent(id("p2"), Position::default());

        assert!(registry.remove(&id("p1")));
        assert!(!registry.remove(&id("p1")));
        assert!(!registry.contains(&id("p1")));
        assert_eq!(registry.len(), 1);

        registry.clear();
        assert!(registry.is_empty());
    }

    #[test]
    fn test_snapshot_sorted_by_id() {
        let mut registry = PlayerRegistry::new();
        registry.insert_if_absent(id("zed"), Position::new(3.0, 3.0));
        registry.insert_if_absent(id("abe"), Position::new(1.0, 1.0));
        registry.insert_if_absent(id("mia"), Position::new(2.0, 2.0));

        let ids: Vec<String> = registry
            .snapshot()
            .into_iter()
            .map(|(id, _)| id.0)
            .collect();
        assert_eq!(ids, vec!["abe", "mia", "zed"]);
    }
}
