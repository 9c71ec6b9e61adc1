use clap::Parser;
use client::app::{App, AppConfig};
use log::info;
use macroquad::prelude::Conf;
use shared::PLAYER_SPEED;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Relay address to connect to
    #[arg(short = 's', long, default_value = "127.0.0.1:3000")]
    server: String,

    /// Window width
    #[arg(short = 'w', long, default_value = "800")]
    width: usize,

    /// Window height (no short flag to avoid conflict with --help)
    #[arg(long, default_value = "600")]
    height: usize,

    /// Scene units moved per frame while a direction key is held
    #[arg(long, default_value_t = PLAYER_SPEED)]
    speed: f32,
}

fn window_conf() -> Conf {
    let args = Args::parse();
    Conf {
        window_title: "Presence".to_owned(),
        window_width: args.width as i32,
        window_height: args.height as i32,
        window_resizable: false,
        ..Default::default()
    }
}

#[macroquad::main(window_conf)]
async fn main() {
    env_logger::init();

    if std::env::var("RUST_LOG").is_err() {
        eprintln!("Set RUST_LOG=info for detailed logging");
    }

    let args = Args::parse();

    info!("Starting client...");
    info!("Connecting to: {}", args.server);
    info!("Controls: arrows/WASD to move, R to reconnect, Esc to quit");

    let mut app = App::new(AppConfig {
        server: args.server,
        width: args.width,
        height: args.height,
        speed: args.speed,
    });

    app.run().await;
}
