//! Frame loop tying input, the sync controller and rendering together

use crate::input::InputManager;
use crate::network::UdpLink;
use crate::rendering::{RenderConfig, Renderer};
use crate::sync::SyncController;
use crate::transport::TransportSession;
use log::info;
use macroquad::prelude::next_frame;

pub struct AppConfig {
    pub server: String,
    pub width: usize,
    pub height: usize,
    pub speed: f32,
}

pub struct App {
    sync: SyncController<UdpLink>,
    input_manager: InputManager,
    renderer: Renderer,
    server: String,
    speed: f32,
}

impl App {
    pub fn new(config: AppConfig) -> Self {
        Self {
            sync: start_session(&config.server),
            input_manager: InputManager::new(),
            renderer: Renderer::new(config.width, config.height),
            server: config.server,
            speed: config.speed,
        }
    }

    fn reconnect(&mut self) {
        info!("Reconnecting to {}", self.server);
        self.sync.teardown();
        self.sync = start_session(&self.server);
    }

    /// Runs until the user quits. Each frame first drains relay events,
    /// then applies local input, then draws.
    pub async fn run(&mut self) {
        loop {
            self.sync.pump();

            let frame = self.input_manager.update();
            if frame.quit {
                break;
            }
            if frame.reconnect {
                self.reconnect();
            }

            if !frame.intent.is_idle() {
                self.sync.request_local_move(frame.intent.delta(self.speed));
            }

            self.renderer.render(
                self.sync.registry(),
                RenderConfig {
                    local_id: self.sync.local_id(),
                    connection: self.sync.connection_state(),
                },
            );

            next_frame().await;
        }

        self.sync.teardown();
    }
}

fn start_session(server: &str) -> SyncController<UdpLink> {
    let mut sync = SyncController::new(TransportSession::new(UdpLink::new()));
    sync.connect(server);
    sync.mark_ready();
    sync
}
