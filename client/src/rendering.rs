use crate::registry::PlayerRegistry;
use crate::transport::ConnectionState;
use macroquad::prelude::*;
use shared::{ParticipantId, Position, PLAYER_SIZE};

#[derive(Debug, Clone)]
pub struct RenderConfig<'a> {
    pub local_id: Option<&'a ParticipantId>,
    pub connection: ConnectionState,
}

pub struct Renderer {
    width: f32,
    height: f32,
}

impl Renderer {
    pub fn new(width: usize, height: usize) -> Self {
        Renderer {
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn render(&mut self, registry: &PlayerRegistry, config: RenderConfig<'_>) {
        clear_background(Color::from_rgba(34, 34, 34, 255));

        self.draw_bounds();

        for (id, position) in registry.snapshot() {
            let is_local_player = Some(&id) == config.local_id;
            let color = if is_local_player {
                GREEN
            } else {
                Color::from_rgba(255, 68, 68, 255)
            };

            self.draw_player(position, color);
            self.draw_player_marker(&id, position);
        }

        self.draw_ui(config.connection, registry.len());
    }

    fn draw_bounds(&mut self) {
        draw_rectangle_lines(
            0.0,
            0.0,
            self.width,
            self.height,
            1.0,
            Color::from_rgba(68, 68, 68, 255),
        );
    }

    /// Avatars are centred on their position.
    fn draw_player(&mut self, position: Position, color: Color) {
        let x = position.x - PLAYER_SIZE / 2.0;
        let y = position.y - PLAYER_SIZE / 2.0;

        draw_rectangle(x, y, PLAYER_SIZE, PLAYER_SIZE, color);
        draw_rectangle_lines(x, y, PLAYER_SIZE, PLAYER_SIZE, 2.0, WHITE);
    }

    fn draw_player_marker(&mut self, id: &ParticipantId, position: Position) {
        let marker_x = position.x - 2.0;
        let marker_y = position.y - PLAYER_SIZE / 2.0 - 8.0;

        draw_rectangle(marker_x, marker_y, 4.0, 4.0, marker_color(id));
    }

    fn draw_ui(&mut self, connection: ConnectionState, player_count: usize) {
        let y_start = 10.0;

        let (connection_color, label) = match connection {
            ConnectionState::Connected => (GREEN, "CON"),
            ConnectionState::Connecting => (YELLOW, "..."),
            ConnectionState::Disconnected => (RED, "OFF"),
        };
        draw_rectangle(10.0, y_start, 8.0, 8.0, connection_color);
        draw_text(label, 20.0, y_start + 8.0, 12.0, WHITE);

        let player_y = y_start + 15.0;
        for i in 0..(player_count.min(8)) {
            draw_rectangle(
                10.0 + (i as f32) * 4.0,
                player_y,
                3.0,
                3.0,
                Color::from_rgba(0, 170, 255, 255),
            );
        }
        let player_text = format!("{} players", player_count);
        draw_text(&player_text, 45.0, player_y + 3.0, 12.0, WHITE);
    }
}

/// Stable per-participant colour so the same id always gets the same marker.
fn marker_color(id: &ParticipantId) -> Color {
    let bucket = id
        .as_str()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

    match bucket % 8 {
        0 => WHITE,
        1 => RED,
        2 => GREEN,
        3 => BLUE,
        4 => YELLOW,
        5 => MAGENTA,
        6 => Color::from_rgba(0, 255, 255, 255),
        _ => Color::from_rgba(136, 136, 136, 255),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_color_is_stable() {
        let id = ParticipantId::new("xK3pQ9aZ");
        let first = marker_color(&id);
        let second = marker_color(&ParticipantId::new("xK3pQ9aZ"));
        assert_eq!(first, second);
    }

    #[test]
    fn test_marker_color_empty_id() {
        assert_eq!(marker_color(&ParticipantId::new("")), WHITE);
    }
}
