//! Per-frame keyboard sampling into movement intent and control events

use macroquad::prelude::*;
use shared::Position;

/// Directions held this frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveIntent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

impl MoveIntent {
    pub fn is_idle(&self) -> bool {
        !(self.up || self.down || self.left || self.right)
    }

    /// Converts the held directions into a scene-space delta of `speed`
    /// units per axis. Left wins over right and up over down; the two axes
    /// combine freely.
    pub fn delta(&self, speed: f32) -> Position {
        let dx = if self.left {
            -speed
        } else if self.right {
            speed
        } else {
            0.0
        };

        let dy = if self.up {
            -speed
        } else if self.down {
            speed
        } else {
            0.0
        };

        Position::new(dx, dy)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputFrame {
    pub intent: MoveIntent,
    pub reconnect: bool,
    pub quit: bool,
}

pub struct InputManager {
    // Previous frame key state for edge detection
    prev_key_r: bool,
}

impl InputManager {
    pub fn new() -> Self {
        Self { prev_key_r: false }
    }

    /// Samples the keyboard. Must be called from inside the macroquad loop.
    pub fn update(&mut self) -> InputFrame {
        let intent = MoveIntent {
            up: is_key_down(KeyCode::Up) || is_key_down(KeyCode::W),
            down: is_key_down(KeyCode::Down) || is_key_down(KeyCode::S),
            left: is_key_down(KeyCode::Left) || is_key_down(KeyCode::A),
            right: is_key_down(KeyCode::Right) || is_key_down(KeyCode::D),
        };

        InputFrame {
            intent,
            reconnect: rising_edge(is_key_down(KeyCode::R), &mut self.prev_key_r),
            quit: is_key_down(KeyCode::Escape),
        }
    }
}

impl Default for InputManager {
    fn default() -> Self {
        Self::new()
    }
}

/// True only on the frame `current` goes from released to held.
fn rising_edge(current: bool, previous: &mut bool) -> bool {
    let pressed = current && !*previous;
    *previous = current;
    pressed
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_idle_intent() {
        let intent = MoveIntent::default();
        assert!(intent.is_idle());
        assert_eq!(intent.delta(2.0), Position::new(0.0, 0.0));
    }

    #[test]
    fn test_diagonal_combines() {
        let intent = MoveIntent {
            up: true,
            right: true,
            ..Default::default()
        };
        assert!(!intent.is_idle());

        let delta = intent.delta(2.0);
        assert_approx_eq!(delta.x, 2.0);
        assert_approx_eq!(delta.y, -2.0);
    }

    #[test]
    fn test_opposing_keys_prefer_left_and_up() {
        let intent = MoveIntent {
            up: true,
            down: true,
            left: true,
            right: true,
        };

        let delta = intent.delta(3.0);
        assert_approx_eq!(delta.x, -3.0);
        assert_approx_eq!(delta.y, -3.0);
    }

    #[test]
    fn test_rising_edge() {
        let mut prev = false;
        assert!(!rising_edge(false, &mut prev));
        assert!(rising_edge(true, &mut prev));
        assert!(!rising_edge(true, &mut prev));
        assert!(!rising_edge(false, &mut prev));
        assert!(rising_edge(true, &mut prev));
    }

    #[test]
    fn test_input_manager_creation() {
        let input_manager = InputManager::new();
        assert!(!input_manager.prev_key_r);
    }
}
